// Database module
// LanceDB-backed storage for FAQ questions and their embeddings

pub mod lancedb;

pub use self::lancedb::{QueryHit, RawHit, VectorStore};

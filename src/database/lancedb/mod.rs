// LanceDB vector database module
// Handles vector storage and similarity search for FAQ questions


pub mod vector_store;

use serde_json::{Map, Value};
use tracing::warn;

pub use vector_store::VectorStore;

/// Columns that may hold the stored text, in lookup order. Tables written by
/// this crate use `document`; the others appear in tables written by other
/// vector clients.
pub const TEXT_COLUMNS: [&str; 3] = ["document", "text", "payload"];

/// A result row as read from a table, before normalization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawHit {
    pub id: String,
    pub document: Option<String>,
    pub text: Option<String>,
    pub payload: Option<String>,
    /// JSON-encoded metadata object
    pub metadata: Option<String>,
    pub distance: Option<f32>,
}

/// A nearest-neighbor result in canonical form
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub id: String,
    /// The stored text this row was embedded from
    pub document: String,
    pub metadata: Map<String, Value>,
    /// Distance to the query vector under the table's metric (lower is closer)
    pub distance: f32,
}

impl QueryHit {
    /// Similarity score in `(0, 1]`, higher is better. Exact matches score 1.
    ///
    /// The default metric is squared L2, which is unbounded, so the distance
    /// is mapped through `1 / (1 + d)` rather than subtracted from one.
    #[inline]
    pub fn score(&self) -> f32 {
        1.0 / (1.0 + self.distance.max(0.0))
    }

    /// String value of a metadata field, if present and a string
    #[inline]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

impl From<RawHit> for QueryHit {
    fn from(raw: RawHit) -> Self {
        let document = raw
            .document
            .or(raw.text)
            .or(raw.payload)
            .unwrap_or_else(|| format!("<id {}>", raw.id));

        let metadata = match raw.metadata.as_deref().map(serde_json::from_str::<Value>) {
            Some(Ok(Value::Object(map))) => map,
            Some(Ok(other)) => {
                warn!("Ignoring non-object metadata on row {}: {}", raw.id, other);
                Map::new()
            }
            Some(Err(e)) => {
                warn!("Ignoring unparsable metadata on row {}: {}", raw.id, e);
                Map::new()
            }
            None => Map::new(),
        };

        Self {
            id: raw.id,
            document,
            metadata,
            distance: raw.distance.unwrap_or(0.0),
        }
    }
}

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FaqError>;

#[derive(Error, Debug)]
pub enum FaqError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Ingest error: {0}")]
    Ingest(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod ingest;
pub mod launcher;
pub mod query;
pub mod server;

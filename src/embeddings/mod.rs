// Embeddings module
// Providers that turn text into fixed-length vectors, plus the LRU cache

pub mod bedrock;
pub mod cache;
pub mod ollama;

#[cfg(test)]
pub(crate) mod testing;
#[cfg(test)]
mod tests;

use anyhow::{Context, Result, anyhow};
use std::sync::Arc;
use tracing::info;

use crate::FaqError;
use crate::config::{EmbeddingConfig, EmbeddingProvider};

pub use bedrock::BedrockClient;
pub use cache::CachedEmbedder;
pub use ollama::OllamaClient;

/// A text embedding model.
///
/// Calls block on network I/O; async code should go through [`embed_text`]
/// and [`embed_texts`], which run them on the blocking pool.
pub trait Embedder: Send + Sync {
    /// Embed a single non-empty text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, returning vectors in input order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    /// Length of every vector this embedder returns
    fn dimension(&self) -> usize;
}

/// Build the configured provider, wrapped in a cache unless capacity is 0
#[inline]
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let inner: Box<dyn Embedder> = match config.provider {
        EmbeddingProvider::Bedrock => Box::new(
            BedrockClient::new(config).context("Failed to initialize Bedrock client")?,
        ),
        EmbeddingProvider::Ollama => Box::new(
            OllamaClient::new(config).context("Failed to initialize Ollama client")?,
        ),
    };

    info!(
        "Using {:?} embeddings with model {} ({} dimensions)",
        config.provider,
        config.model_id(),
        config.dimension
    );

    if config.cache_capacity == 0 {
        return Ok(Arc::from(inner));
    }

    Ok(Arc::new(CachedEmbedder::new(inner, config.cache_capacity)))
}

/// Reject vectors that do not match the configured dimension
pub(crate) fn check_dimension(embedding: &[f32], expected: usize) -> Result<()> {
    if embedding.len() != expected {
        return Err(anyhow!(
            "Embedding has {} dimensions, expected {}",
            embedding.len(),
            expected
        ));
    }
    Ok(())
}

/// Embed one text on the blocking pool
#[inline]
pub async fn embed_text(embedder: &Arc<dyn Embedder>, text: &str) -> Result<Vec<f32>, FaqError> {
    let embedder = Arc::clone(embedder);
    let text = text.to_string();

    tokio::task::spawn_blocking(move || embedder.embed(&text))
        .await
        .map_err(|e| FaqError::Embedding(format!("Embedding task failed: {}", e)))?
        .map_err(|e| FaqError::Embedding(format!("{:#}", e)))
}

/// Embed a batch of texts on the blocking pool
#[inline]
pub async fn embed_texts(
    embedder: &Arc<dyn Embedder>,
    texts: Vec<String>,
) -> Result<Vec<Vec<f32>>, FaqError> {
    let embedder = Arc::clone(embedder);

    tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
        .await
        .map_err(|e| FaqError::Embedding(format!("Embedding task failed: {}", e)))?
        .map_err(|e| FaqError::Embedding(format!("{:#}", e)))
}


use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{Embedder, check_dimension};
use crate::config::EmbeddingConfig;

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    batch_size: u32,
    dimension: usize,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    #[serde(rename = "input")]
    inputs: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Entry of `GET /api/tags`
#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = config
            .ollama
            .ollama_url()
            .context("Invalid Ollama address in config")?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build()
            .into();

        Ok(Self {
            base_url,
            model: config.model_id().to_string(),
            batch_size: config.batch_size,
            dimension: config.dimension as usize,
            agent,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Invalid Ollama endpoint {}{}", self.base_url, path))
    }

    /// Fail unless the server answers and has the configured model pulled
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        let models = self.list_models()?;
        let names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();

        if !names.contains(&self.model.as_str()) {
            warn!("Ollama at {} lacks model {}", self.base_url, self.model);
            return Err(anyhow!(
                "Model '{}' is not pulled on {} (have: {})",
                self.model,
                self.base_url,
                names.join(", ")
            ));
        }

        info!("Ollama at {} serves {}", self.base_url, self.model);
        Ok(())
    }

    /// Models pulled on the server (`GET /api/tags`)
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("/api/tags")?;

        let body = self
            .agent
            .get(url.as_str())
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .with_context(|| format!("Ollama unreachable at {}", self.base_url))?;

        let tags: ModelsResponse =
            serde_json::from_str(&body).context("Unexpected /api/tags response")?;
        debug!("Ollama lists {} models", tags.models.len());
        Ok(tags.models)
    }

    /// One `/api/embed` round trip for `texts`
    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = self.endpoint("/api/embed")?;
        let payload = serde_json::to_string(&EmbedRequest {
            model: &self.model,
            inputs: texts,
        })
        .context("Failed to encode Ollama embed request")?;

        let body = match self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(&payload)
            .and_then(|mut resp| resp.body_mut().read_to_string())
        {
            Ok(body) => body,
            Err(ureq::Error::StatusCode(status)) => {
                return Err(anyhow!(
                    "Ollama refused to embed with {}: HTTP {}",
                    self.model,
                    status
                ));
            }
            Err(e) => return Err(anyhow!("Ollama embed call failed: {}", e)),
        };

        let EmbedResponse { embeddings } =
            serde_json::from_str(&body).context("Unexpected /api/embed response")?;

        if embeddings.len() != texts.len() {
            return Err(anyhow!(
                "Ollama returned {} embeddings for {} inputs",
                embeddings.len(),
                texts.len()
            ));
        }
        embeddings
            .iter()
            .try_for_each(|embedding| check_dimension(embedding, self.dimension))?;

        Ok(embeddings)
    }
}

impl Embedder for OllamaClient {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_chunk(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow!("Ollama returned no embedding"))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for (index, chunk) in texts.chunks(self.batch_size.max(1) as usize).enumerate() {
            debug!("Ollama chunk {} ({} texts)", index, chunk.len());
            vectors.extend(
                self.embed_chunk(chunk)
                    .with_context(|| format!("Ollama chunk {} failed", index))?,
            );
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

use anyhow::Result;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use super::Embedder;

/// Memoizes embeddings by exact input text.
///
/// Holds at most `capacity` vectors and evicts the least recently used one
/// when full. At 1024 floats per entry the default capacity of 256 costs
/// about 1 MiB.
pub struct CachedEmbedder {
    inner: Box<dyn Embedder>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl CachedEmbedder {
    /// Wrap `inner`; a capacity of 0 is treated as 1
    #[inline]
    pub fn new(inner: Box<dyn Embedder>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of cached embeddings
    #[inline]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, Vec<f32>>> {
        // A panic mid-insert cannot leave a half-written entry behind
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Embedder for CachedEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let cached = self.lock().get(text).cloned();
        if let Some(hit) = cached {
            debug!("Embedding cache hit (text length: {})", text.len());
            return Ok(hit);
        }

        let embedding = self.inner.embed(text)?;
        self.lock().put(text.to_string(), embedding.clone());
        Ok(embedding)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results: Vec<Option<Vec<f32>>> = {
            let mut cache = self.lock();
            texts.iter().map(|text| cache.get(text).cloned()).collect()
        };

        let misses: Vec<String> = texts
            .iter()
            .zip(&results)
            .filter(|(_, cached)| cached.is_none())
            .map(|(text, _)| text.clone())
            .collect();

        debug!(
            "Embedding batch of {}: {} cached, {} to fetch",
            texts.len(),
            texts.len() - misses.len(),
            misses.len()
        );

        if !misses.is_empty() {
            let fetched = self.inner.embed_batch(&misses)?;
            let mut fetched = misses.into_iter().zip(fetched);
            let mut cache = self.lock();
            for slot in results.iter_mut().filter(|slot| slot.is_none()) {
                if let Some((text, embedding)) = fetched.next() {
                    cache.put(text, embedding.clone());
                    *slot = Some(embedding);
                }
            }
        }

        results
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| anyhow::anyhow!("Embedding provider returned too few vectors"))
            })
            .collect()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

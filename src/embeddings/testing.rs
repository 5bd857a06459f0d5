//! Offline embedders for unit tests

use anyhow::{Result, anyhow};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::Embedder;

/// Bag-of-words embedder: identical texts map to identical vectors and
/// texts sharing words land close together.
pub(crate) struct KeywordEmbedder {
    dimension: usize,
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub(crate) fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for KeywordEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut vector = vec![0.0_f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let slot = (hasher.finish() % self.dimension as u64) as usize;
            vector[slot] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Embedder whose every call fails, standing in for an unreachable provider
pub(crate) struct UnreachableEmbedder;

impl Embedder for UnreachableEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(anyhow!("connection refused"))
    }

    fn dimension(&self) -> usize {
        8
    }
}

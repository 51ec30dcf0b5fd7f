//! Embedding provider trait and the offline hash embedder.

use crate::error::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// A provider that turns text into a fixed-length vector.
///
/// Remote providers are slow, rate-limited and fallible; callers wrap each
/// call with a timeout and retries (see [`Indexer`](crate::Indexer)).
///
/// # Example
///
/// ```rust
/// use dishx_index::{EmbeddingProvider, HashEmbedder};
///
/// # tokio_test_block(async {
/// let provider = HashEmbedder::new(64);
/// let embedding = provider.embed("wood-fired pizza").await.unwrap();
/// assert_eq!(embedding.len(), provider.dimensions());
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Dimensionality of the vectors this provider returns.
    fn dimensions(&self) -> usize;

    /// Short provider name used in logs and run reports.
    fn name(&self) -> &str;
}

/// Deterministic, offline embedder based on feature hashing.
///
/// Character trigrams and whole words are hashed to vector positions
/// (words weigh double) and the result is L2-normalized. Texts sharing
/// vocabulary land close together, which is enough for local runs and
/// tests without network access.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub const DEFAULT_DIMENSIONS: usize = 256;

    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(&self, feature: &str) -> usize {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(bytes) % self.dimensions as u64) as usize
    }

    /// The embedding, computed synchronously.
    pub fn hash_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let normalized = text.to_lowercase();

        for trigram in trigrams(&normalized) {
            vector[self.bucket(&trigram)] += 1.0;
        }

        for word in normalized.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            vector[self.bucket(word)] += 2.0;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSIONS)
    }
}

fn trigrams(s: &str) -> BTreeSet<String> {
    let padded = format!("  {}  ", s);
    let chars: Vec<char> = padded.chars().collect();
    chars.windows(3).map(|w| w.iter().collect::<String>()).collect()
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.hash_text(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hash"
    }
}

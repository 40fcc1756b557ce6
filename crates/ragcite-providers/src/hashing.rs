//! Offline feature-hashing embedder.
//!
//! [`HashingEmbedder`] maps lowercase word tokens into a fixed number of
//! buckets with blake3, so texts that share words get similar vectors. It
//! needs no network or model files, which makes it the default for local runs
//! and tests.

use async_trait::async_trait;
use ragcite_core::{EmbedError, Embedder, EmbeddingConfig, EmbeddingOutput};

const DEFAULT_DIMENSION: usize = 384;

/// Bag-of-words embedder using signed feature hashing.
///
/// # Example
///
/// ```rust
/// use ragcite_providers::HashingEmbedder;
/// use ragcite_core::{Embedder, EmbeddingConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let embedder = HashingEmbedder::new();
/// let outputs = embedder
///     .embed_text(&["revenue rose", "revenue fell"], &EmbeddingConfig::default())
///     .await?;
///
/// assert_eq!(outputs.len(), 2);
/// assert_eq!(outputs[0].embedding.len(), 384);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// Create a hashing embedder with the default dimension (384).
    #[must_use]
    pub fn new() -> Self {
        Self::with_dimension(DEFAULT_DIMENSION)
    }

    /// Create a hashing embedder with a custom dimension.
    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_one(&self, text: &str, normalize: bool) -> EmbeddingOutput {
        let mut embedding = vec![0.0f32; self.dimension];
        let mut token_count = 0;

        for token in tokens(text) {
            token_count += 1;
            let hash = blake3::hash(token.as_bytes());
            let bytes = hash.as_bytes();
            let bucket = u64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]) as usize
                % self.dimension;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }

        if normalize {
            let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > 0.0 {
                for v in &mut embedding {
                    *v /= norm;
                }
            }
        }

        EmbeddingOutput {
            embedding,
            token_count,
        }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hashing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_text(
        &self,
        texts: &[&str],
        config: &EmbeddingConfig,
    ) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        Ok(texts
            .iter()
            .map(|text| self.embed_one(text, config.normalize))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_hashing_new() {
        let embedder = HashingEmbedder::new();
        assert_eq!(embedder.dimension(), 384);
        assert_eq!(embedder.model_name(), "hashing");
    }

    #[test]
    fn test_hashing_with_dimension() {
        assert_eq!(HashingEmbedder::with_dimension(64).dimension(), 64);
        assert_eq!(HashingEmbedder::with_dimension(0).dimension(), 1);
    }

    #[tokio::test]
    async fn test_embeddings_are_deterministic_and_normalized() {
        let embedder = HashingEmbedder::with_dimension(64);
        let config = EmbeddingConfig::default();

        let a = embedder.embed_text(&["Revenue rose"], &config).await.unwrap();
        let b = embedder.embed_text(&["revenue ROSE!"], &config).await.unwrap();

        assert_eq!(a[0].embedding, b[0].embedding);
        assert_eq!(a[0].token_count, 2);
        let norm = cosine(&a[0].embedding, &a[0].embedding).sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_shared_words_score_higher() {
        let embedder = HashingEmbedder::new();
        let config = EmbeddingConfig::default();

        let outputs = embedder
            .embed_text(
                &[
                    "quarterly revenue growth",
                    "revenue growth in the quarter",
                    "penguins live in antarctica",
                ],
                &config,
            )
            .await
            .unwrap();

        let related = cosine(&outputs[0].embedding, &outputs[1].embedding);
        let unrelated = cosine(&outputs[0].embedding, &outputs[2].embedding);
        assert!(related > unrelated);
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::with_dimension(16);
        let outputs = embedder
            .embed_text(&[""], &EmbeddingConfig::default())
            .await
            .unwrap();
        assert!(outputs[0].embedding.iter().all(|&v| v == 0.0));
        assert_eq!(outputs[0].token_count, 0);
    }

    #[tokio::test]
    async fn test_embed_query_uses_same_space() {
        let embedder = HashingEmbedder::with_dimension(32);
        let config = EmbeddingConfig::default();
        let doc = embedder.embed_text(&["alpha beta"], &config).await.unwrap();
        let query = embedder.embed_query("alpha beta", &config).await.unwrap();
        assert_eq!(doc[0].embedding, query.embedding);
    }
}

//! Embedder pool with concurrency limiting and call pacing.

use ragcite_core::{EmbedError, Embedder, EmbeddingConfig, EmbeddingOutput};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::trace;

/// Pool of embedder calls with concurrency control and a minimum interval
/// between consecutive provider calls.
pub struct EmbedderPool {
    /// Wrapped embedder
    embedder: Arc<dyn Embedder>,
    /// Semaphore to limit concurrent provider calls
    semaphore: Semaphore,
    /// Maximum concurrent operations
    max_concurrent: usize,
    /// Minimum time between the starts of two provider calls
    min_interval: Duration,
    /// Start time of the most recent call
    last_call: Mutex<Option<Instant>>,
}

impl EmbedderPool {
    /// Create a new embedder pool without pacing.
    pub fn new(embedder: Arc<dyn Embedder>, max_concurrent: usize) -> Self {
        Self::with_min_interval(embedder, max_concurrent, Duration::ZERO)
    }

    /// Create a pool that waits at least `min_interval` between provider calls.
    pub fn with_min_interval(
        embedder: Arc<dyn Embedder>,
        max_concurrent: usize,
        min_interval: Duration,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            embedder,
            semaphore: Semaphore::new(max_concurrent),
            max_concurrent,
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Get the embedding dimension.
    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    /// Get the model name.
    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Get the underlying embedder.
    pub fn embedder(&self) -> Arc<dyn Embedder> {
        Arc::clone(&self.embedder)
    }

    /// Embed a batch of texts in one provider call.
    pub async fn embed_batch(
        &self,
        texts: &[&str],
        config: &EmbeddingConfig,
    ) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| EmbedError::Inference(format!("semaphore error: {e}")))?;
        self.pace().await;

        self.embedder.embed_text(texts, config).await
    }

    /// Embed a single document text in one provider call.
    pub async fn embed_one(
        &self,
        text: &str,
        config: &EmbeddingConfig,
    ) -> Result<EmbeddingOutput, EmbedError> {
        self.embed_batch(&[text], config)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Inference("empty embedding result".to_string()))
    }

    /// Embed a single query.
    pub async fn embed_query(
        &self,
        query: &str,
        config: &EmbeddingConfig,
    ) -> Result<EmbeddingOutput, EmbedError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| EmbedError::Inference(format!("semaphore error: {e}")))?;
        self.pace().await;

        self.embedder.embed_query(query, config).await
    }

    /// Wait until `min_interval` has passed since the previous call started.
    async fn pace(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let mut last = self.last_call.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            if ready_at > Instant::now() {
                trace!("Pacing embedding call");
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Get pool statistics.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Get max concurrent operations.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Configured minimum interval between calls.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TEST_DIM: usize = 8;

    /// Mock embedder for testing.
    struct MockEmbedder {
        dimension: usize,
        calls: AtomicUsize,
    }

    impl MockEmbedder {
        fn new(dimension: usize) -> Self {
            Self {
                dimension,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for MockEmbedder {
        fn model_name(&self) -> &'static str {
            "mock-embedder"
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        async fn embed_text(
            &self,
            texts: &[&str],
            _config: &EmbeddingConfig,
        ) -> Result<Vec<EmbeddingOutput>, EmbedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Return deterministic embeddings based on text length
            Ok(texts
                .iter()
                .map(|text| {
                    let embedding: Vec<f32> = (0..self.dimension)
                        .map(|i| ((i + text.len()) as f32 * 0.1).sin())
                        .collect();
                    EmbeddingOutput {
                        embedding,
                        token_count: text.split_whitespace().count(),
                    }
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_pool_creation() {
        let pool = EmbedderPool::new(Arc::new(MockEmbedder::new(TEST_DIM)), 4);

        assert_eq!(pool.dimension(), TEST_DIM);
        assert_eq!(pool.model_name(), "mock-embedder");
        assert_eq!(pool.max_concurrent(), 4);
        assert_eq!(pool.available_permits(), 4);
        assert!(pool.min_interval().is_zero());
    }

    #[tokio::test]
    async fn test_zero_concurrency_is_clamped() {
        let pool = EmbedderPool::new(Arc::new(MockEmbedder::new(TEST_DIM)), 0);
        assert_eq!(pool.max_concurrent(), 1);
    }

    #[tokio::test]
    async fn test_embed_batch() {
        let pool = EmbedderPool::new(Arc::new(MockEmbedder::new(TEST_DIM)), 4);
        let config = EmbeddingConfig::default();

        let results = pool
            .embed_batch(&["hello world", "test embedding"], &config)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].embedding.len(), TEST_DIM);
    }

    #[tokio::test]
    async fn test_embed_one_and_query() {
        let pool = EmbedderPool::new(Arc::new(MockEmbedder::new(TEST_DIM)), 4);
        let config = EmbeddingConfig::default();

        let doc = pool.embed_one("some document text", &config).await.unwrap();
        assert_eq!(doc.embedding.len(), TEST_DIM);

        let query = pool.embed_query("search query", &config).await.unwrap();
        assert_eq!(query.token_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_are_paced() {
        let embedder = Arc::new(MockEmbedder::new(TEST_DIM));
        let pool = EmbedderPool::with_min_interval(
            Arc::clone(&embedder) as Arc<dyn Embedder>,
            4,
            Duration::from_millis(100),
        );
        let config = EmbeddingConfig::default();

        let started = Instant::now();
        for text in ["one", "two", "three"] {
            pool.embed_one(text, &config).await.unwrap();
        }

        // First call goes immediately, the next two wait one interval each.
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permits_returned_after_concurrent_calls() {
        let pool = Arc::new(EmbedderPool::new(Arc::new(MockEmbedder::new(TEST_DIM)), 2));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let pool = Arc::clone(&pool);
                tokio::spawn(async move {
                    let _ = pool
                        .embed_query(&format!("query{i}"), &EmbeddingConfig::default())
                        .await;
                })
            })
            .collect();
        for handle in handles {
            let _ = handle.await;
        }

        assert_eq!(pool.available_permits(), 2);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let pool = EmbedderPool::new(Arc::new(MockEmbedder::new(TEST_DIM)), 4);
        let results = pool
            .embed_batch(&[], &EmbeddingConfig::default())
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}

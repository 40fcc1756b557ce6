//! Vector similarity index.
//!
//! [`VectorIndex`] ties an embedder pool to a vector backend. Mutations for a
//! single document run one at a time; searches and mutations of different
//! documents run concurrently.

use ragcite_core::{
    Chunk, EmbedError, EmbeddingConfig, EmbeddingRecord, Error, Result, ScopeFilter,
    SearchResult, StoreStats, VectorBackend,
};
use ragcite_providers::EmbedderPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

/// Embeds chunks and queries, and keeps their vectors in a backend.
pub struct VectorIndex {
    /// Vector backend, fixed for the lifetime of the index
    backend: Arc<dyn VectorBackend>,
    /// Paced embedder
    embedder: Arc<EmbedderPool>,
    /// Embedding configuration
    embed_config: EmbeddingConfig,
    /// Per-document mutation locks
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl VectorIndex {
    /// Create a new index.
    pub fn new(backend: Arc<dyn VectorBackend>, embedder: Arc<EmbedderPool>) -> Self {
        Self {
            backend,
            embedder,
            embed_config: EmbeddingConfig::default(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Use a custom embedding configuration.
    #[must_use]
    pub fn with_embedding_config(mut self, config: EmbeddingConfig) -> Self {
        self.embed_config = config;
        self
    }

    /// Embedding dimension of every stored vector.
    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    /// Name of the backend in use.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Embed and upsert `chunks` for `document_id`.
    ///
    /// Returns the number of records written. Re-storing the same chunks
    /// overwrites them.
    pub async fn store(&self, document_id: &str, chunks: &[Chunk]) -> Result<u32> {
        validate_document_id(document_id)?;
        let _guard = self.lock(document_id).await;
        self.store_locked(document_id, chunks).await
    }

    /// Delete every record of `document_id`, then store `chunks`, under one lock.
    pub async fn replace(&self, document_id: &str, chunks: &[Chunk]) -> Result<u32> {
        validate_document_id(document_id)?;
        let _guard = self.lock(document_id).await;
        self.backend
            .delete(&ScopeFilter::document(document_id))
            .await?;
        self.store_locked(document_id, chunks).await
    }

    /// Delete every record of `document_id`. Unknown documents are a no-op.
    ///
    /// Returns the number of records removed when the backend reports one.
    pub async fn delete(&self, document_id: &str) -> Result<Option<u64>> {
        validate_document_id(document_id)?;
        let _guard = self.lock(document_id).await;
        let deleted = self
            .backend
            .delete(&ScopeFilter::document(document_id))
            .await?;
        match deleted {
            Some(count) => info!("Deleted {} records for document {}", count, document_id),
            None => info!("Deleted records for document {}", document_id),
        }
        Ok(deleted)
    }

    /// The `limit` chunks most similar to `query`, best first.
    ///
    /// Each returned chunk carries its score in `metadata.similarity_score`.
    pub async fn search(
        &self,
        query: &str,
        filter: Option<&ScopeFilter>,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        if limit == 0 {
            return Err(Error::Validation("search limit must be > 0".to_string()));
        }
        if let Some(filter) = filter {
            filter.validate()?;
        }

        debug!("Searching for: {}", query);
        let embedding = self.embedder.embed_query(query, &self.embed_config).await?;
        self.check_dimension(&embedding.embedding)?;

        let mut results = self
            .backend
            .query(&embedding.embedding, filter, limit)
            .await?;
        for result in &mut results {
            result.chunk.metadata.similarity_score = Some(result.score);
        }

        debug!("Found {} results", results.len());
        Ok(results)
    }

    /// Backend statistics.
    pub async fn stats(&self) -> Result<StoreStats> {
        Ok(self.backend.stats().await?)
    }

    async fn lock(&self, document_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Drop locks nobody else holds
            locks.retain(|id, lock| id == document_id || Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(document_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    async fn store_locked(&self, document_id: &str, chunks: &[Chunk]) -> Result<u32> {
        let batch_size = self.backend.max_batch_size().unwrap_or(chunks.len()).max(1);
        let mut batch = Vec::with_capacity(batch_size.min(chunks.len()));
        let mut stored = 0u32;

        for chunk in chunks {
            let output = self
                .embedder
                .embed_one(&chunk.content, &self.embed_config)
                .await?;
            self.check_dimension(&output.embedding)?;

            let mut chunk = chunk.clone();
            chunk.document_id = document_id.to_string();
            batch.push(EmbeddingRecord::new(chunk, output.embedding));

            if batch.len() == batch_size {
                self.backend.upsert(&batch).await?;
                stored += batch.len() as u32;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.backend.upsert(&batch).await?;
            stored += batch.len() as u32;
        }

        info!("Stored {} chunks for document {}", stored, document_id);
        Ok(stored)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        let expected = self.dimension();
        if vector.len() != expected {
            return Err(EmbedError::DimensionMismatch {
                expected,
                actual: vector.len(),
            }
            .into());
        }
        Ok(())
    }
}

fn validate_document_id(document_id: &str) -> Result<()> {
    if document_id.trim().is_empty() {
        return Err(Error::Validation("document id must not be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ragcite_core::{ChunkMetadata, Embedder, EmbeddingOutput, StoreError};
    use ragcite_providers::HashingEmbedder;
    use ragcite_store::MemoryBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TEST_DIM: usize = 64;

    fn chunk(document_id: &str, index: u32, content: &str) -> Chunk {
        Chunk {
            id: format!("{document_id}_chunk_{index}"),
            document_id: document_id.to_string(),
            content: content.to_string(),
            chunk_index: index,
            start_offset: None,
            end_offset: None,
            metadata: ChunkMetadata::default(),
        }
    }

    fn index_with(backend: Arc<dyn VectorBackend>) -> VectorIndex {
        let pool = EmbedderPool::new(Arc::new(HashingEmbedder::with_dimension(TEST_DIM)), 4);
        VectorIndex::new(backend, Arc::new(pool))
    }

    fn memory_index() -> VectorIndex {
        index_with(Arc::new(MemoryBackend::new(TEST_DIM)))
    }

    // ==================== Store Tests ====================

    #[tokio::test]
    async fn test_store_and_search() {
        let index = memory_index();
        let chunks = vec![
            chunk("doc-1", 0, "quarterly revenue grew strongly"),
            chunk("doc-1", 1, "penguins live in antarctica"),
        ];
        assert_eq!(index.store("doc-1", &chunks).await.unwrap(), 2);

        let results = index.search("revenue growth", None, 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.id, "doc-1_chunk_0");
        assert!(results[0].score >= results[1].score);
        assert_eq!(results[0].chunk.metadata.similarity_score, Some(results[0].score));
    }

    #[tokio::test]
    async fn test_store_is_idempotent() {
        let index = memory_index();
        let chunks = vec![chunk("doc-1", 0, "alpha beta")];
        index.store("doc-1", &chunks).await.unwrap();
        index.store("doc-1", &chunks).await.unwrap();
        assert_eq!(index.stats().await.unwrap().total_records, 1);
    }

    #[tokio::test]
    async fn test_store_empty_document_id_rejected() {
        let index = memory_index();
        let err = index.store(" ", &[chunk("x", 0, "text")]).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_replace_drops_old_chunks() {
        let index = memory_index();
        index
            .store(
                "doc-1",
                &[chunk("doc-1", 0, "old text"), chunk("doc-1", 1, "more old text")],
            )
            .await
            .unwrap();
        index
            .replace("doc-1", &[chunk("doc-1", 0, "new text")])
            .await
            .unwrap();

        let stats = index.stats().await.unwrap();
        assert_eq!(stats.total_records, 1);
        let results = index.search("new text", None, 5).await.unwrap();
        assert_eq!(results[0].chunk.content, "new text");
    }

    // ==================== Search Tests ====================

    #[tokio::test]
    async fn test_search_zero_limit_rejected() {
        let index = memory_index();
        let err = index.search("q", None, 0).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_search_invalid_filter_rejected() {
        let index = memory_index();
        let err = index
            .search("q", Some(&ScopeFilter::document("")), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_search_respects_limit_and_scope() {
        let index = memory_index();
        for doc in ["doc-1", "doc-2"] {
            let chunks: Vec<_> = (0..4)
                .map(|i| chunk(doc, i, &format!("shared words number {i}")))
                .collect();
            index.store(doc, &chunks).await.unwrap();
        }

        let results = index.search("shared words", None, 3).await.unwrap();
        assert_eq!(results.len(), 3);

        let filter = ScopeFilter::document("doc-2");
        let results = index.search("shared words", Some(&filter), 10).await.unwrap();
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.chunk.document_id == "doc-2"));
    }

    // ==================== Delete Tests ====================

    #[tokio::test]
    async fn test_delete_removes_document_from_results() {
        let index = memory_index();
        index
            .store("doc-1", &[chunk("doc-1", 0, "shared text")])
            .await
            .unwrap();
        index
            .store("doc-2", &[chunk("doc-2", 0, "shared text")])
            .await
            .unwrap();

        assert_eq!(index.delete("doc-1").await.unwrap(), Some(1));
        let results = index.search("shared text", None, 10).await.unwrap();
        assert!(results.iter().all(|r| r.chunk.document_id != "doc-1"));

        assert_eq!(index.delete("doc-1").await.unwrap(), Some(0));
        assert_eq!(index.delete("never-stored").await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_delete_without_backend_count_reports_none() {
        let backend = Arc::new(RecordingBackend::new(10, false).without_delete_counts());
        let index = index_with(backend.clone());
        index
            .store("doc-1", &[chunk("doc-1", 0, "shared text")])
            .await
            .unwrap();

        assert_eq!(index.delete("doc-1").await.unwrap(), None);
        assert_eq!(index.stats().await.unwrap().total_records, 0);
    }

    // ==================== Batching and Failure Tests ====================

    /// Backend that records upsert batch sizes and can be told to fail.
    struct RecordingBackend {
        inner: MemoryBackend,
        batch_limit: usize,
        batches: std::sync::Mutex<Vec<usize>>,
        fail_upsert: bool,
        count_deletes: bool,
    }

    impl RecordingBackend {
        fn new(batch_limit: usize, fail_upsert: bool) -> Self {
            Self {
                inner: MemoryBackend::new(TEST_DIM),
                batch_limit,
                batches: std::sync::Mutex::new(Vec::new()),
                fail_upsert,
                count_deletes: true,
            }
        }

        fn without_delete_counts(mut self) -> Self {
            self.count_deletes = false;
            self
        }
    }

    #[async_trait]
    impl VectorBackend for RecordingBackend {
        fn name(&self) -> &str {
            "recording"
        }

        fn max_batch_size(&self) -> Option<usize> {
            Some(self.batch_limit)
        }

        async fn init(&self) -> std::result::Result<(), StoreError> {
            Ok(())
        }

        async fn upsert(&self, records: &[EmbeddingRecord]) -> std::result::Result<(), StoreError> {
            if self.fail_upsert {
                return Err(StoreError::Upsert("service unavailable".to_string()));
            }
            self.batches.lock().unwrap().push(records.len());
            self.inner.upsert(records).await
        }

        async fn query(
            &self,
            vector: &[f32],
            filter: Option<&ScopeFilter>,
            k: usize,
        ) -> std::result::Result<Vec<SearchResult>, StoreError> {
            self.inner.query(vector, filter, k).await
        }

        async fn delete(
            &self,
            filter: &ScopeFilter,
        ) -> std::result::Result<Option<u64>, StoreError> {
            let deleted = self.inner.delete(filter).await?;
            Ok(deleted.filter(|_| self.count_deletes))
        }

        async fn stats(&self) -> std::result::Result<StoreStats, StoreError> {
            self.inner.stats().await
        }
    }

    #[tokio::test]
    async fn test_upserts_respect_backend_batch_limit() {
        let backend = Arc::new(RecordingBackend::new(2, false));
        let index = index_with(backend.clone());
        let chunks: Vec<_> = (0..5).map(|i| chunk("doc-1", i, &format!("text {i}"))).collect();

        assert_eq!(index.store("doc-1", &chunks).await.unwrap(), 5);
        assert_eq!(*backend.batches.lock().unwrap(), vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_backend_failure_is_provider_error() {
        let index = index_with(Arc::new(RecordingBackend::new(10, true)));
        let err = index
            .store("doc-1", &[chunk("doc-1", 0, "text")])
            .await
            .unwrap_err();
        assert!(err.is_provider());
        assert!(matches!(err, Error::Store(StoreError::Upsert(_))));
    }

    /// Embedder that reports one dimension and returns another.
    struct LyingEmbedder;

    #[async_trait]
    impl Embedder for LyingEmbedder {
        fn model_name(&self) -> &str {
            "lying"
        }

        fn dimension(&self) -> usize {
            TEST_DIM
        }

        async fn embed_text(
            &self,
            texts: &[&str],
            _config: &EmbeddingConfig,
        ) -> std::result::Result<Vec<EmbeddingOutput>, EmbedError> {
            Ok(texts
                .iter()
                .map(|_| EmbeddingOutput {
                    embedding: vec![1.0; 3],
                    token_count: 1,
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_wrong_dimension_is_embedding_error() {
        let pool = EmbedderPool::new(Arc::new(LyingEmbedder), 1);
        let index = VectorIndex::new(Arc::new(MemoryBackend::new(TEST_DIM)), Arc::new(pool));

        let err = index
            .store("doc-1", &[chunk("doc-1", 0, "text")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Embedding(EmbedError::DimensionMismatch {
                expected: TEST_DIM,
                actual: 3
            })
        ));
    }

    /// Embedder that counts calls and tracks how many run at once.
    struct CountingEmbedder {
        calls: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting"
        }

        fn dimension(&self) -> usize {
            TEST_DIM
        }

        async fn embed_text(
            &self,
            texts: &[&str],
            _config: &EmbeddingConfig,
        ) -> std::result::Result<Vec<EmbeddingOutput>, EmbedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|_| EmbeddingOutput {
                    embedding: vec![0.5; TEST_DIM],
                    token_count: 1,
                })
                .collect())
        }
    }

    fn counting_embedder() -> Arc<CountingEmbedder> {
        Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_embedding_call_per_chunk_and_serialized_per_document() {
        let embedder = counting_embedder();
        let pool = EmbedderPool::new(embedder.clone(), 8);
        let index = Arc::new(VectorIndex::new(
            Arc::new(MemoryBackend::new(TEST_DIM)),
            Arc::new(pool),
        ));

        let chunks: Vec<_> = (0..3).map(|i| chunk("doc-1", i, "text")).collect();
        let a = {
            let index = Arc::clone(&index);
            let chunks = chunks.clone();
            tokio::spawn(async move { index.store("doc-1", &chunks).await })
        };
        let b = {
            let index = Arc::clone(&index);
            let chunks = chunks.clone();
            tokio::spawn(async move { index.replace("doc-1", &chunks).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(embedder.calls.load(Ordering::SeqCst), 6);
        // Same-document mutations never overlap
        assert_eq!(embedder.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(index.stats().await.unwrap().total_records, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_documents_store_concurrently() {
        let embedder = counting_embedder();
        let pool = EmbedderPool::new(embedder.clone(), 8);
        let index = VectorIndex::new(Arc::new(MemoryBackend::new(TEST_DIM)), Arc::new(pool));

        let first: Vec<_> = (0..3).map(|i| chunk("doc-1", i, "text")).collect();
        let second: Vec<_> = (0..3).map(|i| chunk("doc-2", i, "text")).collect();
        let (a, b) = tokio::join!(index.store("doc-1", &first), index.store("doc-2", &second));
        assert_eq!(a.unwrap(), 3);
        assert_eq!(b.unwrap(), 3);

        assert_eq!(embedder.calls.load(Ordering::SeqCst), 6);
        // Each document holds only its own lock, so their embeddings overlap
        assert_eq!(embedder.max_active.load(Ordering::SeqCst), 2);
        assert_eq!(index.stats().await.unwrap().total_records, 6);
    }
}

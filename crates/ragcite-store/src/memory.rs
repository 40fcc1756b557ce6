//! In-memory vector backend.
//!
//! This module provides a [`MemoryBackend`] that keeps every record in memory
//! and answers queries with a brute-force cosine similarity scan. Records keep
//! their first insertion position, so equal scores come back in insertion
//! order.

use async_trait::async_trait;
use indexmap::IndexMap;
use ragcite_core::{EmbeddingRecord, ScopeFilter, SearchResult, StoreError, StoreStats, VectorBackend};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Compute cosine similarity between two vectors.
///
/// Returns `0.0` when the lengths differ or either vector has zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// In-memory linear-scan vector backend.
///
/// # Example
///
/// ```rust
/// use ragcite_store::MemoryBackend;
/// use ragcite_core::VectorBackend;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MemoryBackend::new(384);
/// backend.init().await?;
///
/// let stats = backend.stats().await?;
/// assert_eq!(stats.total_records, 0);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MemoryBackend {
    dimension: usize,
    records: Arc<RwLock<IndexMap<String, EmbeddingRecord>>>,
}

impl MemoryBackend {
    /// Create a new in-memory backend with the given embedding dimension.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            records: Arc::new(RwLock::new(IndexMap::new())),
        }
    }

    /// Embedding dimension accepted by this backend.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the backend holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl VectorBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn init(&self) -> Result<(), StoreError> {
        debug!("MemoryBackend initialized (dimension: {})", self.dimension);
        Ok(())
    }

    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<(), StoreError> {
        if let Some(bad) = records.iter().find(|r| r.vector.len() != self.dimension) {
            return Err(StoreError::Upsert(format!(
                "record {} has dimension {}, expected {}",
                bad.id,
                bad.vector.len(),
                self.dimension
            )));
        }

        let mut store = self.records.write().await;
        for record in records {
            store.insert(record.id.clone(), record.clone());
        }
        debug!("Upserted {} records", records.len());
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        filter: Option<&ScopeFilter>,
        k: usize,
    ) -> Result<Vec<SearchResult>, StoreError> {
        let records = self.records.read().await;

        // Brute force search with cosine similarity
        let mut scored: Vec<(f32, &EmbeddingRecord)> = records
            .values()
            .filter(|record| filter.is_none_or(|f| f.matches(&record.chunk)))
            .map(|record| (cosine_similarity(vector, &record.vector), record))
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, record)| SearchResult {
                chunk: record.chunk.clone(),
                score,
            })
            .collect())
    }

    async fn delete(&self, filter: &ScopeFilter) -> Result<Option<u64>, StoreError> {
        let mut records = self.records.write().await;

        let before = records.len();
        records.retain(|_, record| !filter.matches(&record.chunk));
        let deleted = (before - records.len()) as u64;

        debug!("Deleted {} records matching {:?}", deleted, filter);
        Ok(Some(deleted))
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let records = self.records.read().await;
        Ok(StoreStats {
            backend: self.name().to_string(),
            total_records: records.len() as u64,
            dimension: Some(self.dimension),
        })
    }
}

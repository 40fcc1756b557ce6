//! Core traits for ragcite components.
//!
//! This module defines the capability seams the rest of the workspace plugs into:
//!
//! - [`Chunker`]: Split document text into chunks
//! - [`Embedder`]: Generate vector embeddings
//! - [`CompletionProvider`]: Generate answers, optionally streamed
//! - [`VectorBackend`]: Store and search vectors
//! - [`DocumentLookup`]: Read-only document details
//! - [`Repository`]: Keyed storage for documents and conversations
//!
//! These traits enable a pluggable architecture where different implementations
//! can be swapped without changing the rest of the system.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::error::{CompletionError, EmbedError, StoreError};
use crate::types::{
    Chunk, CompletionRequest, DocumentInfo, EmbeddingConfig, EmbeddingOutput, EmbeddingRecord,
    ScopeFilter, SearchResult, StoreStats, StreamEvent,
};

// ============================================================================
// Chunking
// ============================================================================

/// Trait for splitting document text into chunks.
///
/// Chunking is pure and synchronous; it never fails once the chunker is built.
pub trait Chunker: Send + Sync {
    /// Name of this chunking strategy.
    fn name(&self) -> &str;

    /// Chunk a document's text.
    fn chunk(&self, document_id: &str, text: &str) -> Vec<Chunk>;
}

// ============================================================================
// Embedding
// ============================================================================

/// Trait for generating embeddings.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model name/identifier.
    fn model_name(&self) -> &str;

    /// Embedding dimension.
    fn dimension(&self) -> usize;

    /// Embed text content.
    async fn embed_text(
        &self,
        texts: &[&str],
        config: &EmbeddingConfig,
    ) -> Result<Vec<EmbeddingOutput>, EmbedError>;

    /// Embed a query (may use different instruction).
    async fn embed_query(
        &self,
        query: &str,
        config: &EmbeddingConfig,
    ) -> Result<EmbeddingOutput, EmbedError> {
        let results = self.embed_text(&[query], config).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Inference("empty embedding result".to_string()))
    }
}

// ============================================================================
// Completion
// ============================================================================

/// Ordered stream of completion fragments, terminated by [`StreamEvent::Done`].
pub type CompletionStream = BoxStream<'static, Result<StreamEvent, CompletionError>>;

/// Trait for chat completion providers.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider/model identifier.
    fn name(&self) -> &str;

    /// Produce a full completion.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;

    /// Produce a streamed completion.
    ///
    /// The default implementation yields the full completion as one fragment.
    async fn complete_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionStream, CompletionError> {
        let text = self.complete(request).await?;
        let events = vec![Ok(StreamEvent::Fragment(text)), Ok(StreamEvent::Done)];
        Ok(stream::iter(events).boxed())
    }
}

// ============================================================================
// Vector Storage
// ============================================================================

/// Trait for vector backends.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Backend name for logs and stats.
    fn name(&self) -> &str;

    /// Largest number of records accepted by a single upsert, if bounded.
    fn max_batch_size(&self) -> Option<usize> {
        None
    }

    /// Initialize the backend.
    async fn init(&self) -> Result<(), StoreError>;

    /// Insert or overwrite records by id.
    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<(), StoreError>;

    /// The `k` records nearest to `vector` by cosine similarity, best first.
    async fn query(
        &self,
        vector: &[f32],
        filter: Option<&ScopeFilter>,
        k: usize,
    ) -> Result<Vec<SearchResult>, StoreError>;

    /// Delete every record matching `filter`.
    ///
    /// Returns how many records were removed, or `None` when the backend
    /// does not report a count.
    async fn delete(&self, filter: &ScopeFilter) -> Result<Option<u64>, StoreError>;

    /// Get backend statistics.
    async fn stats(&self) -> Result<StoreStats, StoreError>;
}

// ============================================================================
// Collaborators
// ============================================================================

/// Read-only lookup of document details.
#[async_trait]
pub trait DocumentLookup: Send + Sync {
    /// Details for a document, or `None` when unknown.
    async fn lookup(&self, document_id: &str) -> Option<DocumentInfo>;
}

/// Keyed storage capability.
#[async_trait]
pub trait Repository<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Get a value by key.
    async fn get(&self, key: &str) -> crate::Result<Option<V>>;

    /// Insert or replace a value.
    async fn put(&self, key: &str, value: V) -> crate::Result<()>;

    /// Remove a value, returning whether it existed.
    async fn delete(&self, key: &str) -> crate::Result<bool>;

    /// All stored values.
    async fn list(&self) -> crate::Result<Vec<V>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoProvider;

    #[async_trait]
    impl CompletionProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
            Ok(request.user_message.clone())
        }
    }

    #[tokio::test]
    async fn test_default_complete_stream_ends_with_done() {
        let request = CompletionRequest {
            system_prompt: String::new(),
            history: Vec::new(),
            user_message: "hello".to_string(),
            max_tokens: 16,
            temperature: 0.0,
        };

        let events: Vec<_> = EchoProvider
            .complete_stream(&request)
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::Fragment("hello".to_string())
        );
        assert_eq!(events[1].as_ref().unwrap(), &StreamEvent::Done);
    }
}

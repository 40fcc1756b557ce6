//! Integration tests for the full ragcite pipeline.
//!
//! Tests the complete flow: read → chunk → embed → store → search → answer → cite.

use async_trait::async_trait;
use ragcite_chunker::HierarchicalChunker;
use ragcite_core::{
    ChunkOptions, Chunker, CompletionError, CompletionProvider, CompletionRequest, EmbedError,
    Embedder, EmbeddingConfig, EmbeddingOutput, QuoteType, ScopeFilter, VectorBackend,
};
use ragcite_index::{AnswerRequest, NewDocument, RetrievalPipeline, VectorIndex};
use ragcite_providers::EmbedderPool;
use ragcite_store::{Backend, BackendConfig};
use std::sync::Arc;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

const TEST_DIM: usize = 384;

/// Mock embedder for testing (no network access).
struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    fn model_name(&self) -> &str {
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
        // Generate deterministic embeddings based on text content
        Ok(texts
            .iter()
            .map(|text| {
                let hash = blake3::hash(text.as_bytes());
                let bytes = hash.as_bytes();
                let embedding: Vec<f32> = (0..self.dimension)
                    .map(|i| {
                        let byte_idx = i % 32;
                        (f32::from(bytes[byte_idx]) / 255.0) - 0.5
                    })
                    .collect();
                EmbeddingOutput {
                    embedding,
                    token_count: text.split_whitespace().count(),
                }
            })
            .collect())
    }
}

/// Completion provider returning a fixed, cited answer.
struct CitingCompletion {
    response: String,
}

#[async_trait]
impl CompletionProvider for CitingCompletion {
    fn name(&self) -> &str {
        "citing"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        assert!(request.system_prompt.contains("[1] Document:"));
        Ok(self.response.clone())
    }
}

const ML_TEXT: &str = "This is a document about machine learning and neural networks. \
    Neural networks are a subset of machine learning algorithms. \
    They are inspired by the structure of the human brain.";
const DB_TEXT: &str = "This document discusses database systems and SQL. \
    SQL is used for querying relational databases. \
    PostgreSQL and MySQL are popular database systems.";
const SECURITY_TEXT: &str = "Authentication and authorization are important security concepts. \
    OAuth2 is a popular authentication protocol. \
    JWT tokens are often used for API authentication.";

fn chunk_options() -> ChunkOptions {
    ChunkOptions {
        chunk_size: 200,
        chunk_overlap: 50,
        min_chunk_size: 20,
        max_chunk_size: 400,
        ..Default::default()
    }
}

async fn create_pipeline(response: &str) -> RetrievalPipeline {
    let backend = Backend::connect(&BackendConfig::Memory, TEST_DIM)
        .await
        .unwrap();
    let pool = EmbedderPool::new(Arc::new(MockEmbedder::new(TEST_DIM)), 2);
    let index = VectorIndex::new(Arc::new(backend) as Arc<dyn VectorBackend>, Arc::new(pool));
    let chunker = HierarchicalChunker::new(chunk_options()).unwrap();
    let completion = CitingCompletion {
        response: response.to_string(),
    };
    RetrievalPipeline::new(
        Arc::new(chunker) as Arc<dyn Chunker>,
        Arc::new(index),
        Arc::new(completion) as Arc<dyn CompletionProvider>,
    )
}

/// Write the three sample documents and ingest them from disk.
async fn ingest_samples(pipeline: &RetrievalPipeline) {
    let source_dir = tempdir().unwrap();
    let files = [
        ("ml.txt", ML_TEXT, "kb-ai"),
        ("database.txt", DB_TEXT, "kb-data"),
        ("security.txt", SECURITY_TEXT, "kb-data"),
    ];

    for (name, content, kb) in files {
        let path = source_dir.path().join(name);
        std::fs::write(&path, content).unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let id = name.trim_end_matches(".txt");
        let document = NewDocument::new(id, name, text).with_knowledge_base(kb);
        let record = pipeline.ingest(document).await.unwrap();
        assert!(record.chunk_count > 0);
    }
}

#[tokio::test]
async fn test_full_pipeline_chunk_embed_store_search() {
    let pipeline = create_pipeline("unused").await;
    ingest_samples(&pipeline).await;

    let stats = pipeline.index().stats().await.unwrap();
    assert_eq!(stats.backend, "memory");
    assert!(stats.total_records >= 3, "Should have stored chunks");
    assert_eq!(stats.dimension, Some(TEST_DIM));

    // Identical text hashes to the identical vector, so the ML chunk ranks first
    let results = pipeline.index().search(ML_TEXT, None, 5).await.unwrap();
    assert!(!results.is_empty(), "Should find results");
    assert_eq!(results[0].chunk.document_id, "ml");
    assert!((results[0].score - 1.0).abs() < 1e-5);
    assert_eq!(results[0].chunk.metadata.document_name.as_deref(), Some("ml.txt"));
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    // Scoped search never leaves the knowledge base
    let scope = ScopeFilter::knowledge_base("kb-data");
    let results = pipeline
        .index()
        .search(ML_TEXT, Some(&scope), 5)
        .await
        .unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.chunk.document_id != "ml"));
}

#[tokio::test]
async fn test_answer_cites_retrieved_chunks() {
    let response = "Neural networks are a subset of machine learning [1]. \
        The study notes > \"inspired by the structure of the human brain\" [1]. \
        Ignore [9].";
    let pipeline = create_pipeline(response).await;
    ingest_samples(&pipeline).await;

    let request = AnswerRequest::new(ML_TEXT).with_scope(ScopeFilter::document("ml"));
    let answer = pipeline
        .answer(request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(answer.response, response);
    assert!(answer.has_annotations);
    let annotated = answer.annotated_response.as_ref().unwrap();
    assert_eq!(annotated.annotations.len(), 2);
    assert!(
        annotated
            .annotations
            .iter()
            .all(|a| a.citation_number == 1 && a.location.document_id == "ml")
    );
    assert!(
        annotated
            .annotations
            .iter()
            .any(|a| a.quote_type == QuoteType::Quote)
    );
    assert_eq!(annotated.citation_map.len(), 1);
    assert!(annotated.formatted_text.contains("[9]"));

    assert_eq!(answer.block_quotes.len(), 1);
    assert_eq!(
        answer.block_quotes[0].content,
        "inspired by the structure of the human brain"
    );

    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].document_name, "ml.txt");
    assert_eq!(answer.sources[0].citation_count, 2);

    let conversation = pipeline
        .conversation(&answer.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conversation.messages.len(), 2);
}

#[tokio::test]
async fn test_deleted_document_is_not_retrieved() {
    let pipeline = create_pipeline("unused").await;
    ingest_samples(&pipeline).await;

    assert!(pipeline.delete_document("ml").await.unwrap());
    let results = pipeline.index().search(ML_TEXT, None, 10).await.unwrap();
    assert!(results.iter().all(|r| r.chunk.document_id != "ml"));
    assert!(pipeline.document("ml").await.unwrap().is_none());
    assert_eq!(pipeline.documents().await.unwrap().len(), 2);
}

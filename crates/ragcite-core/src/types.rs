//! Core types for ragcite.
//!
//! This module contains all shared data structures used across ragcite:
//!
//! ## Chunks
//! - [`Chunk`]: A bounded segment of a document's text
//! - [`ChunkMetadata`]: Section, method tag, page and score information
//! - [`ChunkOptions`]: Size bounds and boundary preferences for chunking
//!
//! ## Embeddings
//! - [`EmbeddingConfig`]: Configuration for embedding generation
//! - [`EmbeddingOutput`]: Result of embedding a text
//! - [`EmbeddingRecord`]: A chunk paired with its vector, as stored in a backend
//!
//! ## Search
//! - [`ScopeFilter`]: Restriction narrowing a search to a subset of records
//! - [`SearchResult`]: A matching chunk with similarity score
//! - [`StoreStats`]: Backend statistics
//!
//! ## Citations
//! - [`Annotation`], [`AnnotatedText`], [`BlockQuote`], [`SourceCitation`]
//!
//! ## Documents and conversations
//! - [`DocumentRecord`], [`DocumentStatus`], [`DocumentInfo`]
//! - [`Conversation`], [`ChatMessage`], [`CompletionRequest`], [`StreamEvent`]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::ChunkError;

// ============================================================================
// Chunks
// ============================================================================

/// A chunk of a document's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk identifier
    pub id: String,
    /// Owning document identifier
    pub document_id: String,
    /// The actual content (never empty)
    pub content: String,
    /// Position in document (0-indexed, gap-free)
    pub chunk_index: u32,
    /// Character offset of the first character in the normalized text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_offset: Option<usize>,
    /// Character offset one past the last character in the normalized text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_offset: Option<usize>,
    /// Additional metadata
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Content length in characters.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// How a chunk was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkMethod {
    /// A whole section that fit in one chunk
    SectionIntact,
    /// Paragraphs accumulated up to the target size
    ParagraphBoundary,
    /// An oversized paragraph split at sentence ends
    SentenceBoundary,
    /// An oversized sentence split at word boundaries
    ArbitrarySplit,
    /// Sliding window fallback
    SimpleOverlap,
}

impl ChunkMethod {
    /// Tag used in metadata and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SectionIntact => "section_intact",
            Self::ParagraphBoundary => "paragraph_boundary",
            Self::SentenceBoundary => "sentence_boundary",
            Self::ArbitrarySplit => "arbitrary_split",
            Self::SimpleOverlap => "simple_overlap",
        }
    }
}

/// Metadata associated with a chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Section index within the document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<u32>,
    /// Section heading or label, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
    /// Chunking method tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<ChunkMethod>,
    /// Page number in the source document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    /// Human-readable document name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
    /// Knowledge base the document belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_base_id: Option<String>,
    /// Set when this chunk is the union of two adjacent chunks
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub merged: bool,
    /// Cosine similarity to the query, set on search results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f32>,
    /// Additional key-value metadata
    #[serde(flatten)]
    pub extra: HashMap<String, String>,
}

impl ChunkMetadata {
    /// Union with `other`; values present in `other` win.
    pub fn union(&mut self, other: &Self) {
        if other.section.is_some() {
            self.section = other.section;
        }
        if other.section_title.is_some() {
            self.section_title.clone_from(&other.section_title);
        }
        if other.method.is_some() {
            self.method = other.method;
        }
        if other.page_number.is_some() {
            self.page_number = other.page_number;
        }
        if other.document_name.is_some() {
            self.document_name.clone_from(&other.document_name);
        }
        if other.knowledge_base_id.is_some() {
            self.knowledge_base_id.clone_from(&other.knowledge_base_id);
        }
        if other.similarity_score.is_some() {
            self.similarity_score = other.similarity_score;
        }
        self.merged |= other.merged;
        self.extra
            .extend(other.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Look up a metadata value by key, covering both typed fields and `extra`.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<String> {
        match key {
            "section" => self.section.map(|s| s.to_string()),
            "section_title" => self.section_title.clone(),
            "method" => self.method.map(|m| m.as_str().to_string()),
            "page_number" => self.page_number.map(|p| p.to_string()),
            "document_name" => self.document_name.clone(),
            "knowledge_base_id" => self.knowledge_base_id.clone(),
            "merged" => Some(self.merged.to_string()),
            _ => self.extra.get(key).cloned(),
        }
    }
}

/// Size bounds and boundary preferences for chunking.
///
/// All sizes are measured in characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkOptions {
    /// Target chunk size
    pub chunk_size: usize,
    /// Overlap between consecutive sliding windows
    pub chunk_overlap: usize,
    /// Chunks below this size are merged or trigger the window fallback
    pub min_chunk_size: usize,
    /// Hard upper bound on chunk size
    pub max_chunk_size: usize,
    /// Split oversized paragraphs at sentence ends before words
    pub respect_sentence_boundaries: bool,
    /// Split sections at blank lines
    pub respect_paragraph_boundaries: bool,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            min_chunk_size: 100,
            max_chunk_size: 2000,
            respect_sentence_boundaries: true,
            respect_paragraph_boundaries: true,
        }
    }
}

impl ChunkOptions {
    /// Check the size relations the chunker depends on.
    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.chunk_size == 0 {
            return Err(ChunkError::InvalidConfig(
                "chunk_size must be > 0".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ChunkError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.min_chunk_size > self.chunk_size {
            return Err(ChunkError::InvalidConfig(format!(
                "min_chunk_size ({}) must not exceed chunk_size ({})",
                self.min_chunk_size, self.chunk_size
            )));
        }
        if self.chunk_size > self.max_chunk_size {
            return Err(ChunkError::InvalidConfig(format!(
                "chunk_size ({}) must not exceed max_chunk_size ({})",
                self.chunk_size, self.max_chunk_size
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Embedding
// ============================================================================

/// Configuration for embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Normalize embeddings to unit length
    pub normalize: bool,
    /// Instruction prefix for models that support it
    pub instruction: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            normalize: true,
            instruction: None,
        }
    }
}

/// Output from embedding.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    /// The embedding vector
    pub embedding: Vec<f32>,
    /// Number of tokens in input
    pub token_count: usize,
}

/// A chunk and its vector, as held by a vector backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Record id (same as the chunk id)
    pub id: String,
    /// Embedding vector
    pub vector: Vec<f32>,
    /// The embedded chunk, carrying `document_id` and metadata
    pub chunk: Chunk,
}

impl EmbeddingRecord {
    /// Pair a chunk with its vector.
    #[must_use]
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: chunk.id.clone(),
            vector,
            chunk,
        }
    }

    /// Owning document identifier.
    #[must_use]
    pub fn document_id(&self) -> &str {
        &self.chunk.document_id
    }
}

// ============================================================================
// Search
// ============================================================================

/// Restriction narrowing a similarity search or delete to a subset of records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScopeFilter {
    /// Records of one document
    Document { document_id: String },
    /// Records of one knowledge base
    KnowledgeBase { knowledge_base_id: String },
    /// Records whose metadata key equals a value
    Metadata { key: String, value: String },
}

impl ScopeFilter {
    /// Filter by document id.
    pub fn document(id: impl Into<String>) -> Self {
        Self::Document {
            document_id: id.into(),
        }
    }

    /// Filter by knowledge base id.
    pub fn knowledge_base(id: impl Into<String>) -> Self {
        Self::KnowledgeBase {
            knowledge_base_id: id.into(),
        }
    }

    /// Reject filters with empty identifiers.
    pub fn validate(&self) -> crate::Result<()> {
        let empty = match self {
            Self::Document { document_id } => document_id.is_empty(),
            Self::KnowledgeBase { knowledge_base_id } => knowledge_base_id.is_empty(),
            Self::Metadata { key, value } => key.is_empty() || value.is_empty(),
        };
        if empty {
            return Err(crate::Error::Validation(format!(
                "scope filter has an empty identifier: {self:?}"
            )));
        }
        Ok(())
    }

    /// Check whether a chunk falls inside this scope.
    #[must_use]
    pub fn matches(&self, chunk: &Chunk) -> bool {
        match self {
            Self::Document { document_id } => chunk.document_id == *document_id,
            Self::KnowledgeBase { knowledge_base_id } => {
                chunk.metadata.knowledge_base_id.as_deref() == Some(knowledge_base_id.as_str())
            }
            Self::Metadata { key, value } => {
                if key == "document_id" {
                    return chunk.document_id == *value;
                }
                chunk.metadata.lookup(key).as_deref() == Some(value.as_str())
            }
        }
    }
}

/// A search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Matching chunk; `metadata.similarity_score` carries the score
    pub chunk: Chunk,
    /// Cosine similarity score
    pub score: f32,
}

/// Vector backend statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    /// Backend name
    pub backend: String,
    /// Total number of stored records
    pub total_records: u64,
    /// Vector dimension, once known
    pub dimension: Option<usize>,
}

// ============================================================================
// Citations
// ============================================================================

/// Whether an annotation came from a block quote or an inline reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteType {
    Quote,
    Reference,
}

/// Where a cited passage lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationLocation {
    pub document_id: String,
    pub document_name: String,
    pub chunk_id: String,
    pub page_number: Option<u32>,
    pub section: Option<String>,
    pub start_char: Option<usize>,
    pub end_char: Option<usize>,
}

/// One resolved citation marker occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Generated id, `annotation_<8 hex>`
    pub id: String,
    /// 1-based position in the ranked chunk list
    pub citation_number: u32,
    pub text_snippet: String,
    pub source_content: String,
    pub location: CitationLocation,
    /// Relevance in `[0, 1]`
    pub relevance_score: f32,
    pub quote_type: QuoteType,
}

/// Generated text with its citation markers resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedText {
    pub raw_text: String,
    pub formatted_text: String,
    pub annotations: Vec<Annotation>,
    /// Citation number to the first annotation id seen for it
    pub citation_map: BTreeMap<u32, String>,
}

/// A verbatim quote pulled from a response, with surrounding context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockQuote {
    /// Generated id, `quote_<8 hex>`
    pub id: String,
    pub content: String,
    pub location: CitationLocation,
    pub context_before: Option<String>,
    pub context_after: Option<String>,
}

/// Per-source summary of how an answer used a retrieved chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub document_id: String,
    pub document_name: String,
    pub chunk_id: String,
    /// Content preview
    pub content: String,
    pub relevance_score: f32,
    pub page_number: Option<u32>,
    pub section: Option<String>,
    /// Number of annotations pointing at this source
    pub citation_count: u32,
    /// Ids of those annotations
    pub used_in_annotations: Vec<String>,
}

// ============================================================================
// Documents
// ============================================================================

/// Document ingestion status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Waiting to be processed
    Pending,
    /// Chunking and embedding in progress
    Processing,
    /// Stored in the index
    Completed,
    /// Ingestion failed (terminal)
    Failed,
    /// Ingestion aborted by its cancellation token
    Cancelled,
}

impl DocumentStatus {
    /// True for states no further transition leaves.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// A document known to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub name: String,
    pub status: DocumentStatus,
    pub chunk_count: u32,
    pub knowledge_base_id: Option<String>,
    pub page_count: Option<u32>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// A new pending record.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            status: DocumentStatus::Pending,
            chunk_count: 0,
            knowledge_base_id: None,
            page_count: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Read-only document details used to enrich chunk and citation metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub name: String,
    pub page: Option<u32>,
    pub section: Option<String>,
}

// ============================================================================
// Conversations and completion
// ============================================================================

/// Chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// An ordered conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The last `n` messages, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.updated_at = message.timestamp;
        self.messages.push(message);
    }
}

/// A request to a completion provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub history: Vec<ChatMessage>,
    pub user_message: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// One event of a streamed completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A text fragment, in order
    Fragment(String),
    /// End of stream
    Done,
}

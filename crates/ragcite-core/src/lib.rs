//! # ragcite-core
//!
//! Core types and traits for ragcite, a retrieval pipeline that grounds
//! generated answers in document passages and cites them.
//!
//! This crate provides the foundational abstractions used throughout ragcite:
//!
//! - **Document Chunking**: [`Chunker`] trait for splitting text into bounded chunks
//! - **Embedding Generation**: [`Embedder`] trait for converting text to vectors
//! - **Completion**: [`CompletionProvider`] trait for generating answers
//! - **Vector Storage**: [`VectorBackend`] trait for storing and searching embeddings
//! - **Collaborators**: [`DocumentLookup`] and [`Repository`] for data the core reads or keeps
//!
//! ## Architecture
//!
//! ```text
//! ingest: text -> Chunker -> Embedder -> VectorBackend
//! answer: question -> Embedder -> VectorBackend -> CompletionProvider -> citation parser
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Chunk`] | A bounded segment of document text |
//! | [`EmbeddingRecord`] | A chunk with its vector |
//! | [`ScopeFilter`] | Restriction on searches and deletes |
//! | [`Annotation`] | A resolved citation marker |
//! | [`AnnotatedText`] | A response with its markers resolved |
//!
//! ## Related Crates
//!
//! - `ragcite-chunker`: Hierarchical chunker
//! - `ragcite-providers`: Embedding and completion providers
//! - `ragcite-store`: Vector backends and repositories
//! - `ragcite-cite`: Citation parsing
//! - `ragcite-index`: Vector index and retrieval pipeline

pub mod error;
pub mod traits;
pub mod types;

pub use error::{ChunkError, CompletionError, EmbedError, Error, Result, StoreError};
pub use traits::*;
pub use types::*;

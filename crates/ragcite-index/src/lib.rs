//! Vector index and retrieval pipeline for ragcite.
//!
//! # Components
//!
//! - [`VectorIndex`]: embeds chunks through a paced [`EmbedderPool`](ragcite_providers::EmbedderPool)
//!   and keeps them in a [`VectorBackend`](ragcite_core::VectorBackend)
//! - [`RetrievalPipeline`]: ingestion (chunk → store) and answering
//!   (search → context → completion → citations)
//! - [`IngestionHandle`]: status and cancellation for background ingestion
//!
//! # Example
//!
//! ```rust,ignore
//! use ragcite_index::{AnswerRequest, NewDocument, RetrievalPipeline, VectorIndex};
//! use tokio_util::sync::CancellationToken;
//!
//! let pipeline = RetrievalPipeline::new(chunker, Arc::new(index), completion);
//!
//! let handle = pipeline.spawn_ingest(NewDocument::new("doc-1", "report.pdf", text));
//! handle.wait().await?;
//!
//! let answer = pipeline
//!     .answer(AnswerRequest::new("How did revenue change?"), &CancellationToken::new())
//!     .await?;
//! ```

pub mod index;
pub mod ingest;
pub mod pipeline;
pub mod prompt;

pub use index::VectorIndex;
pub use ingest::{IngestionHandle, NewDocument};
pub use pipeline::{Answer, AnswerEvent, AnswerRequest, PipelineConfig, RetrievalPipeline};

//! # ragcite-providers
//!
//! Embedding and completion providers for ragcite.
//!
//! ## Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`EmbedderPool`] | Concurrency limiting and call pacing around any [`Embedder`](ragcite_core::Embedder) |
//! | [`HashingEmbedder`] | Offline feature-hashing embedder |
//! | [`OpenAiEmbedder`] | OpenAI-compatible `/embeddings` client |
//! | [`OpenAiCompletion`] | OpenAI-compatible `/chat/completions` client with streaming |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ragcite_providers::{EmbedderPool, HashingEmbedder};
//! use std::{sync::Arc, time::Duration};
//!
//! let pool = EmbedderPool::with_min_interval(
//!     Arc::new(HashingEmbedder::new()),
//!     4,
//!     Duration::from_millis(100),
//! );
//! let vector = pool.embed_one("Revenue rose", &Default::default()).await?;
//! ```

pub mod hashing;
pub mod openai;
pub mod pool;
pub mod sse;

pub use hashing::HashingEmbedder;
pub use openai::{OpenAiCompletion, OpenAiEmbedder, OpenAiSettings};
pub use pool::EmbedderPool;

//! Vector backends and keyed repositories for ragcite.
//!
//! This crate implements [`VectorBackend`](ragcite_core::VectorBackend) twice:
//! an in-memory linear scan and a client for a hosted ANN index. [`Backend`]
//! wraps the two so the index picks one at startup and never branches on it
//! again.
//!
//! # Example
//!
//! ```rust,ignore
//! use ragcite_store::{Backend, BackendConfig};
//! use ragcite_core::VectorBackend;
//!
//! let backend = Backend::connect(&BackendConfig::Memory, 384).await?;
//! backend.upsert(&records).await?;
//! let results = backend.query(&query_vector, None, 5).await?;
//! ```

pub mod backend;
pub mod memory;
pub mod remote;
pub mod repository;

pub use backend::{Backend, BackendConfig};
pub use memory::{MemoryBackend, cosine_similarity};
pub use remote::{RemoteBackend, RemoteSettings};
pub use repository::MemoryRepository;

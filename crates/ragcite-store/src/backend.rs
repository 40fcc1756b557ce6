//! Backend selection.
//!
//! [`Backend`] is a closed set of vector backends chosen once when the index
//! is built. Callers only see [`VectorBackend`]; a remote index that cannot be
//! reached at startup may fall back to memory, but nothing switches backends
//! after that.

use async_trait::async_trait;
use ragcite_core::{
    EmbeddingRecord, ScopeFilter, SearchResult, StoreError, StoreStats, VectorBackend,
};
use tracing::{info, warn};

use crate::memory::MemoryBackend;
use crate::remote::{RemoteBackend, RemoteSettings};

/// Which backend to build.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    /// In-process linear scan
    Memory,
    /// Hosted ANN index
    Remote {
        settings: RemoteSettings,
        /// Use the in-memory backend when the remote index fails to initialize
        fallback_to_memory: bool,
    },
}

/// A vector backend selected at construction time.
pub enum Backend {
    Memory(MemoryBackend),
    Remote(RemoteBackend),
}

impl Backend {
    /// Build and initialize the configured backend.
    pub async fn connect(config: &BackendConfig, dimension: usize) -> Result<Self, StoreError> {
        match config {
            BackendConfig::Memory => {
                let backend = MemoryBackend::new(dimension);
                backend.init().await?;
                info!("Using in-memory vector backend");
                Ok(Self::Memory(backend))
            }
            BackendConfig::Remote {
                settings,
                fallback_to_memory,
            } => {
                match connect_remote(settings, dimension).await {
                    Ok(remote) => {
                        info!("Using remote vector backend at {}", settings.url);
                        Ok(Self::Remote(remote))
                    }
                    Err(e) if *fallback_to_memory => {
                        warn!("Remote vector backend unavailable, using memory: {e}");
                        let backend = MemoryBackend::new(dimension);
                        backend.init().await?;
                        Ok(Self::Memory(backend))
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    fn inner(&self) -> &dyn VectorBackend {
        match self {
            Self::Memory(backend) => backend,
            Self::Remote(backend) => backend,
        }
    }
}

impl From<MemoryBackend> for Backend {
    fn from(backend: MemoryBackend) -> Self {
        Self::Memory(backend)
    }
}

async fn connect_remote(
    settings: &RemoteSettings,
    dimension: usize,
) -> Result<RemoteBackend, StoreError> {
    let remote = RemoteBackend::new(settings, dimension)?;
    remote.init().await?;
    Ok(remote)
}

#[async_trait]
impl VectorBackend for Backend {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn max_batch_size(&self) -> Option<usize> {
        self.inner().max_batch_size()
    }

    async fn init(&self) -> Result<(), StoreError> {
        self.inner().init().await
    }

    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<(), StoreError> {
        self.inner().upsert(records).await
    }

    async fn query(
        &self,
        vector: &[f32],
        filter: Option<&ScopeFilter>,
        k: usize,
    ) -> Result<Vec<SearchResult>, StoreError> {
        self.inner().query(vector, filter, k).await
    }

    async fn delete(&self, filter: &ScopeFilter) -> Result<Option<u64>, StoreError> {
        self.inner().delete(filter).await
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        self.inner().stats().await
    }
}

//! In-process keyed storage.

use async_trait::async_trait;
use indexmap::IndexMap;
use ragcite_core::{Repository, Result};
use std::sync::Arc;
use tokio::sync::RwLock;

/// [`Repository`] kept in memory, listing values in insertion order.
#[derive(Clone)]
pub struct MemoryRepository<V> {
    entries: Arc<RwLock<IndexMap<String, V>>>,
}

impl<V> MemoryRepository<V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(IndexMap::new())),
        }
    }
}

impl<V> Default for MemoryRepository<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V> Repository<V> for MemoryRepository<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: V) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().await.shift_remove(key).is_some())
    }

    async fn list(&self) -> Result<Vec<V>> {
        Ok(self.entries.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragcite_core::{DocumentRecord, DocumentStatus};

    #[tokio::test]
    async fn test_put_get_delete() {
        let repo = MemoryRepository::new();
        repo.put("doc-1", DocumentRecord::new("doc-1", "report.pdf"))
            .await
            .unwrap();

        let record = repo.get("doc-1").await.unwrap().unwrap();
        assert_eq!(record.name, "report.pdf");
        assert_eq!(record.status, DocumentStatus::Pending);

        assert!(repo.delete("doc-1").await.unwrap());
        assert!(!repo.delete("doc-1").await.unwrap());
        assert!(repo.get("doc-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_and_list_keeps_order() {
        let repo: MemoryRepository<u32> = MemoryRepository::default();
        repo.put("b", 1).await.unwrap();
        repo.put("a", 2).await.unwrap();
        repo.put("b", 3).await.unwrap();

        assert_eq!(repo.list().await.unwrap(), vec![3, 2]);
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let repo: MemoryRepository<String> = MemoryRepository::new();
        let other = repo.clone();
        repo.put("k", "v".to_string()).await.unwrap();
        assert_eq!(other.get("k").await.unwrap().as_deref(), Some("v"));
    }
}

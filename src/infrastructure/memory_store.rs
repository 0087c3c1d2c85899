// In-memory results store
use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::application::results_store::{ResultsStore, StoreEntry, StoreError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<usize, StoreEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultsStore for MemoryStore {
    async fn get(&self, index: usize) -> Result<Option<StoreEntry>, StoreError> {
        Ok(self.entries.read().await.get(&index).cloned())
    }

    async fn put(&self, index: usize, entry: StoreEntry) -> Result<(), StoreError> {
        self.entries.write().await.insert(index, entry);
        Ok(())
    }

    async fn entries(&self) -> Result<BTreeMap<usize, StoreEntry>, StoreError> {
        Ok(self.entries.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::tests::sample_result;

    #[tokio::test]
    async fn test_failed_entry_is_distinct_from_absent() {
        let store = MemoryStore::new();
        store.put(1, StoreEntry::Failed).await.unwrap();

        assert_eq!(store.get(0).await.unwrap(), None);
        assert_eq!(store.get(1).await.unwrap(), Some(StoreEntry::Failed));
        assert_eq!(store.processed(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = MemoryStore::new();
        store.put(0, StoreEntry::Failed).await.unwrap();
        store
            .put(0, StoreEntry::Processed(Box::new(sample_result(0, 10.0))))
            .await
            .unwrap();

        let entries = store.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(store.processed(0).await.unwrap().unwrap().annual_metrics.energy_kwh, 10.0);
    }
}

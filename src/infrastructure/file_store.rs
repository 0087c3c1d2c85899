// JSON-file results store: index -> result or null, rewritten on every put
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::application::results_store::{ResultsStore, StoreEntry, StoreError};
use crate::domain::result::ProcessingResult;

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<usize, StoreEntry>>,
}

impl FileStore {
    /// Open the store at `path`, loading existing entries. A missing file is
    /// an empty store.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let raw: BTreeMap<usize, Option<ProcessingResult>> = serde_json::from_slice(&bytes)?;
                raw.into_iter()
                    .map(|(index, value)| (index, StoreEntry::from_option(value)))
                    .collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::info!("Opened results store {} with {} entries", path.display(), entries.len());
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    async fn persist(&self, entries: &BTreeMap<usize, StoreEntry>) -> Result<(), StoreError> {
        let raw: BTreeMap<usize, Option<&ProcessingResult>> = entries
            .iter()
            .map(|(index, entry)| (*index, entry.result()))
            .collect();
        let bytes = serde_json::to_vec_pretty(&raw)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl ResultsStore for FileStore {
    async fn get(&self, index: usize) -> Result<Option<StoreEntry>, StoreError> {
        Ok(self.entries.read().await.get(&index).cloned())
    }

    async fn put(&self, index: usize, entry: StoreEntry) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        let mut next = entries.clone();
        next.insert(index, entry);
        if let Err(e) = self.persist(&next).await {
            tracing::error!("Failed to persist results to {}: {}", self.path.display(), e);
            return Err(e);
        }
        *entries = next;
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

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("rooftop-pv-{}-{}.json", name, std::process::id()))
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let path = temp_path("reopen");
        let _ = std::fs::remove_file(&path);

        let store = FileStore::open(&path).await.unwrap();
        store
            .put(0, StoreEntry::Processed(Box::new(sample_result(0, 321.5))))
            .await
            .unwrap();
        store.put(2, StoreEntry::Failed).await.unwrap();
        drop(store);

        let reopened = FileStore::open(&path).await.unwrap();
        let entries = reopened.entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[&2], StoreEntry::Failed);
        let result = reopened.processed(0).await.unwrap().unwrap();
        assert_eq!(result.building_id, "b0");
        assert_eq!(result.annual_metrics.energy_kwh, 321.5);
        assert_eq!(reopened.get(1).await.unwrap(), None);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"2\": null"));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_store() {
        let path = temp_path("missing");
        let _ = std::fs::remove_file(&path);
        let store = FileStore::open(&path).await.unwrap();
        assert!(store.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_entry_absent() {
        let path = temp_path("unwritable");
        let tmp = path.with_extension("json.tmp");
        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_dir_all(&tmp);
        // A directory in place of the temp file makes every write fail.
        std::fs::create_dir_all(&tmp).unwrap();

        let store = FileStore::open(&path).await.unwrap();
        let put = store
            .put(0, StoreEntry::Processed(Box::new(sample_result(0, 10.0))))
            .await;

        assert!(matches!(put, Err(StoreError::Io(_))));
        assert_eq!(store.get(0).await.unwrap(), None);
        assert!(store.entries().await.unwrap().is_empty());
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let path = temp_path("corrupt");
        std::fs::write(&path, b"{not json").unwrap();
        assert!(matches!(FileStore::open(&path).await, Err(StoreError::Serde(_))));
        let _ = std::fs::remove_file(&path);
    }
}

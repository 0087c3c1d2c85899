// Results store seam: building index -> processed result or recorded failure
use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::result::ProcessingResult;

/// A stored outcome. An index without an entry has not been attempted yet.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEntry {
    Processed(Box<ProcessingResult>),
    Failed,
}

impl StoreEntry {
    pub fn result(&self) -> Option<&ProcessingResult> {
        match self {
            StoreEntry::Processed(result) => Some(result),
            StoreEntry::Failed => None,
        }
    }

    pub fn into_option(self) -> Option<ProcessingResult> {
        match self {
            StoreEntry::Processed(result) => Some(*result),
            StoreEntry::Failed => None,
        }
    }

    pub fn from_option(value: Option<ProcessingResult>) -> Self {
        match value {
            Some(result) => StoreEntry::Processed(Box::new(result)),
            None => StoreEntry::Failed,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("results store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("results store encoding error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[async_trait]
pub trait ResultsStore: Send + Sync {
    async fn get(&self, index: usize) -> Result<Option<StoreEntry>, StoreError>;

    async fn put(&self, index: usize, entry: StoreEntry) -> Result<(), StoreError>;

    /// Every recorded entry in index order.
    async fn entries(&self) -> Result<BTreeMap<usize, StoreEntry>, StoreError>;

    /// Processed result for `index`, ignoring failures and absent entries.
    async fn processed(&self, index: usize) -> Result<Option<ProcessingResult>, StoreError> {
        Ok(self.get(index).await?.and_then(StoreEntry::into_option))
    }
}

use crate::models::{DestinationKey, VisitLog, VisitRecord, VisitRecordInput};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("stored visit log under '{key}' is not valid JSON")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Every visit log, keyed and ordered by destination key
pub type VisitLogs = BTreeMap<DestinationKey, VisitLog>;

/// Durable string key-value persistence
#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    /// Initialize the backend (create tables, etc.)
    async fn init(&self) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or overwrite
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// All keys starting with `prefix`, in no particular order
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

#[async_trait]
pub trait VisitStore: Send + Sync {
    /// Stamp `input` with the current time and append it to the log of `key`.
    async fn append(&self, key: &DestinationKey, input: VisitRecordInput)
        -> StorageResult<VisitRecord>;

    /// Every log in this store's namespace, sorted by key
    async fn list_all(&self) -> StorageResult<VisitLogs>;
}

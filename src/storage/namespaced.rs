use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::{DestinationKey, VisitLog, VisitRecord, VisitRecordInput};
use crate::storage::{KeyValueBackend, StorageError, StorageResult, VisitLogs, VisitStore};

/// Key prefix shared by every visit log
pub const NAMESPACE: &str = "trackly_";

/// Visit store that keeps each log as one JSON array under `trackly_<key>`.
///
/// Appends are read-modify-write. Writers in this process are serialized per key; separate
/// processes sharing one database can still lose a visit when they append to the same key at
/// the same moment.
pub struct NamespacedVisitStore {
    backend: Arc<dyn KeyValueBackend>,
    write_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl NamespacedVisitStore {
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self {
            backend,
            write_locks: DashMap::new(),
        }
    }

    pub async fn init(&self) -> Result<()> {
        self.backend.init().await
    }

    fn storage_key(key: &DestinationKey) -> String {
        format!("{}{}", NAMESPACE, key)
    }

    fn write_lock(&self, storage_key: &str) -> Arc<Mutex<()>> {
        self.write_locks
            .entry(storage_key.to_string())
            .or_default()
            .clone()
    }

    /// Read-modify-write of one log. The caller holds the key's write lock.
    async fn append_locked(
        &self,
        key: &DestinationKey,
        storage_key: &str,
        input: VisitRecordInput,
    ) -> StorageResult<VisitRecord> {
        let mut log = self.read_log(storage_key).await?;

        // Keep the log chronological even if the wall clock stepped backwards.
        let now = Utc::now();
        let timestamp = match log.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };

        let record = VisitRecord::stamped(input, timestamp);
        log.push(record.clone());

        let serialized = serde_json::to_string(&log).map_err(anyhow::Error::from)?;
        self.backend.set(storage_key, &serialized).await?;

        tracing::debug!(key = %key, visits = log.len(), "appended visit");
        Ok(record)
    }

    /// Drop the lock entry once no writer holds or waits on it.
    fn release_write_lock(&self, storage_key: &str) {
        self.write_locks
            .remove_if(storage_key, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn read_log(&self, storage_key: &str) -> StorageResult<VisitLog> {
        match self.backend.get(storage_key).await? {
            Some(raw) => serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt {
                key: storage_key.to_string(),
                source,
            }),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl VisitStore for NamespacedVisitStore {
    async fn append(
        &self,
        key: &DestinationKey,
        input: VisitRecordInput,
    ) -> StorageResult<VisitRecord> {
        let storage_key = Self::storage_key(key);
        let lock = self.write_lock(&storage_key);
        let result = {
            let _guard = lock.lock().await;
            self.append_locked(key, &storage_key, input).await
        };

        drop(lock);
        self.release_write_lock(&storage_key);
        result
    }

    async fn list_all(&self) -> StorageResult<VisitLogs> {
        let mut logs = VisitLogs::new();

        for storage_key in self.backend.keys_with_prefix(NAMESPACE).await? {
            let Some(raw_key) = storage_key.strip_prefix(NAMESPACE) else {
                continue;
            };

            match self.read_log(&storage_key).await {
                Ok(log) => {
                    logs.insert(DestinationKey::new(raw_key), log);
                }
                Err(StorageError::Corrupt { key, source }) => {
                    tracing::warn!(key = %key, error = %source, "skipping unreadable visit log");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoInfo;
    use crate::storage::MemoryBackend;

    fn store_with_backend() -> (NamespacedVisitStore, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        (NamespacedVisitStore::new(backend.clone()), backend)
    }

    fn visit(ip: &str) -> GeoInfo {
        GeoInfo {
            ip: Some(ip.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_list_all_empty() {
        let (store, _) = store_with_backend();
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_uses_namespaced_key() {
        let (store, backend) = store_with_backend();
        let key = DestinationKey::new("https%3A%2F%2Fexample.com");

        store.append(&key, visit("1.2.3.4")).await.unwrap();

        let raw = backend
            .get("trackly_https%3A%2F%2Fexample.com")
            .await
            .unwrap()
            .expect("log should be stored under the namespaced key");
        let log: VisitLog = serde_json::from_str(&raw).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].ip.as_deref(), Some("1.2.3.4"));
    }

    #[tokio::test]
    async fn test_append_preserves_order_and_timestamps() {
        let (store, _) = store_with_backend();
        let key = DestinationKey::new("k");

        for i in 0..5 {
            store.append(&key, visit(&format!("10.0.0.{i}"))).await.unwrap();
        }

        let logs = store.list_all().await.unwrap();
        let log = &logs[&key];
        assert_eq!(log.len(), 5);
        for (i, record) in log.iter().enumerate() {
            assert_eq!(record.ip.as_deref(), Some(format!("10.0.0.{i}").as_str()));
        }
        assert!(log.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn test_timestamp_never_goes_backwards() {
        let (store, backend) = store_with_backend();
        let future = Utc::now() + chrono::Duration::hours(1);
        let seeded = vec![VisitRecord::stamped(visit("1.1.1.1"), future)];
        backend
            .set("trackly_k", &serde_json::to_string(&seeded).unwrap())
            .await
            .unwrap();

        let record = store
            .append(&DestinationKey::new("k"), visit("2.2.2.2"))
            .await
            .unwrap();
        assert_eq!(record.timestamp, future);
    }

    #[tokio::test]
    async fn test_list_all_sorted_and_scoped_to_namespace() {
        let (store, backend) = store_with_backend();
        backend.set("unrelated", "[]").await.unwrap();
        for key in ["b", "a", "c"] {
            store.append(&DestinationKey::new(key), visit("1.1.1.1")).await.unwrap();
        }

        let keys: Vec<_> = store
            .list_all()
            .await
            .unwrap()
            .into_keys()
            .map(|k| k.as_str().to_string())
            .collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_corrupt_log_is_skipped_and_not_overwritten() {
        let (store, backend) = store_with_backend();
        backend.set("trackly_broken", "{not json").await.unwrap();
        store.append(&DestinationKey::new("ok"), visit("1.1.1.1")).await.unwrap();

        let logs = store.list_all().await.unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs.contains_key(&DestinationKey::new("ok")));

        let err = store
            .append(&DestinationKey::new("broken"), visit("1.1.1.1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
        assert_eq!(
            backend.get("trackly_broken").await.unwrap().as_deref(),
            Some("{not json")
        );
    }

    #[tokio::test]
    async fn test_concurrent_appends_in_process_are_not_lost() {
        let (store, _) = store_with_backend();
        let store = Arc::new(store);
        let key = DestinationKey::new("hot");

        let mut handles = vec![];
        for i in 0..20 {
            let store = Arc::clone(&store);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                store.append(&key, visit(&format!("10.0.0.{i}"))).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.list_all().await.unwrap()[&key].len(), 20);
        assert!(store.write_locks.is_empty());
    }

    #[tokio::test]
    async fn test_write_locks_released_after_append() {
        let (store, backend) = store_with_backend();
        for i in 0..10 {
            store
                .append(&DestinationKey::new(format!("key-{i}")), visit("1.1.1.1"))
                .await
                .unwrap();
        }
        assert!(store.write_locks.is_empty());

        backend.set("trackly_broken", "{bad").await.unwrap();
        assert!(store
            .append(&DestinationKey::new("broken"), visit("1.1.1.1"))
            .await
            .is_err());
        assert!(store.write_locks.is_empty());
    }
}

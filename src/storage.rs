//! Local key-value persistence for store state and the auth token

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;

pub const FAVORITES_KEY: &str = "favorites";
pub const COLLECTIONS_KEY: &str = "collections";
pub const AUTH_TOKEN_KEY: &str = "auth_token";

/// String-valued persistent storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Read a JSON value; a missing key is `Ok(None)`.
pub async fn read_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub async fn write_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, raw).await
}

/// One `<key>.json` file per key inside a cache directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let dir = self.dir.clone();
        let path = self.path_for(key);
        let target = path.clone();

        // Every write gets its own temp file, renamed over the target once complete
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            std::fs::create_dir_all(&dir)?;
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(value.as_bytes())?;
            tmp.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(std::io::Error::other)??;

        tracing::trace!(key, path = %path.display(), "Persisted value");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory storage, used when persistence is disabled and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn file_store_round_trips_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));

        assert_eq!(store.get("favorites").await.unwrap(), None);

        let ids: BTreeSet<u64> = [7, 42].into_iter().collect();
        write_json(&store, FAVORITES_KEY, &ids).await.unwrap();
        let loaded: Option<BTreeSet<u64>> = read_json(&store, FAVORITES_KEY).await.unwrap();
        assert_eq!(loaded, Some(ids));

        store.remove(FAVORITES_KEY).await.unwrap();
        store.remove(FAVORITES_KEY).await.unwrap();
        assert_eq!(store.get(FAVORITES_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.set(FAVORITES_KEY, "not json".to_string()).await.unwrap();

        let result: Result<Option<Vec<u64>>, _> = read_json(&store, FAVORITES_KEY).await;
        assert!(matches!(result, Err(StorageError::Corrupt(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_to_one_key_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::new(dir.path()));

        for round in 0..100u64 {
            let writers: Vec<_> = (0..2u64)
                .map(|writer| {
                    let store = store.clone();
                    tokio::spawn(async move { write_json(store.as_ref(), FAVORITES_KEY, &[round, writer]).await })
                })
                .collect();
            for writer in writers {
                writer.await.unwrap().unwrap();
            }

            let stored: Vec<u64> = read_json(store.as_ref(), FAVORITES_KEY).await.unwrap().unwrap();
            assert_eq!(stored[0], round);
            assert!(stored[1] < 2);
        }

        // No temp files are left behind
        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }
}

//! JSON-file backend for [`KvStore`]
//!
//! Persists the whole key space as one pretty-printed JSON document.
//! Writes go through a temporary file and an atomic rename so a crash
//! mid-write leaves the previous snapshot intact.

use crate::kv::{KvStore, StoreError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// File-backed key-value store
#[derive(Debug)]
pub struct JsonFileKv {
    path: PathBuf,
    state: Mutex<BTreeMap<String, String>>,
}

impl JsonFileKv {
    /// Open a store at `path`, loading any existing snapshot
    ///
    /// # Errors
    /// - `StoreError::Io` if the file exists but cannot be read
    /// - `StoreError::Corrupt` if the file is not a JSON object of strings
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                key: path.display().to_string(),
                message: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Path of the backing file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, state: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|e| StoreError::Io(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for JsonFileKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.state.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.insert(key.to_string(), value.to_string());
        self.flush(&state).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.remove(key).is_some() {
            self.flush(&state).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let kv = JsonFileKv::open(&path).await.unwrap();
            kv.set("entity/task/7", "{\"status\":\"PENDING\"}")
                .await
                .unwrap();
        }

        let kv = JsonFileKv::open(&path).await.unwrap();
        assert_eq!(
            kv.get("entity/task/7").await.unwrap().as_deref(),
            Some("{\"status\":\"PENDING\"}")
        );
    }

    #[tokio::test]
    async fn remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let kv = JsonFileKv::open(&path).await.unwrap();
        kv.set("a", "1").await.unwrap();
        kv.remove("a").await.unwrap();
        drop(kv);

        let kv = JsonFileKv::open(&path).await.unwrap();
        assert_eq!(kv.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_file_reports_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let err = JsonFileKv::open(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let kv = JsonFileKv::open(dir.path().join("fresh.json"))
            .await
            .unwrap();
        assert_eq!(kv.get("anything").await.unwrap(), None);
    }
}

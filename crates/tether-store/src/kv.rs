//! Durable key-value collaborator
//!
//! The storage API the cache and session stores are built on. Values are
//! JSON strings; keys are slash-separated paths owned by the caller.

use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt;

/// Storage failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Underlying storage could not be read or written
    #[error("storage io failure: {0}")]
    Io(String),

    /// A stored value could not be decoded
    #[error("corrupt stored value at {key}: {message}")]
    Corrupt {
        /// Key whose value failed to decode
        key: String,
        /// Decoder message
        message: String,
    },
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

/// Durable key-value storage
///
/// Implementations must be safe for concurrent use; callers treat every
/// operation as fallible and non-fatal (see the cache store's degraded
/// mode).
#[async_trait]
pub trait KvStore: Send + Sync + fmt::Debug {
    /// Read a value
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a value; removing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory backend
///
/// The default for tests and for hosts that provide no durable storage.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: DashMap<String, String>,
}

impl MemoryKv {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check for the empty store
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn memory_kv_roundtrip() {
        let kv = MemoryKv::new();
        assert_ok!(kv.set("session", "{\"token\":null}").await);

        let value = kv.get("session").await.unwrap();
        assert_eq!(value.as_deref(), Some("{\"token\":null}"));

        assert_ok!(kv.remove("session").await);
        assert_eq!(kv.get("session").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_kv_remove_missing_is_ok() {
        let kv = MemoryKv::new();
        assert_ok!(kv.remove("never-set").await);
    }

    #[tokio::test]
    async fn memory_kv_overwrites() {
        let kv = MemoryKv::new();
        kv.set("k", "a").await.unwrap();
        kv.set("k", "b").await.unwrap();
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("b"));
        assert_eq!(kv.len(), 1);
    }
}

//! Entity cache store
//!
//! Durable key to snapshot map. Reads are synchronous against the
//! in-memory map; every mutation is written through to the [`KvStore`].
//! A storage write failure is reported and flips the degraded-mode flag,
//! but the in-memory value stands: the synchronizer keeps operating on
//! cached data while persistence is unavailable.
//!
//! The store itself never expires entries; staleness is a caller decision
//! made against [`CacheEntry::stored_at`].

use crate::kv::{KvStore, StoreError};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tether_model::{CacheEntry, Entity, EntityRef, EntityType};

/// Key under which the set of cached refs is persisted
const INDEX_KEY: &str = "entity/index";

fn storage_key(reference: &EntityRef) -> String {
    format!("entity/{}/{}", reference.entity_type, reference.id)
}

/// Ordering rule for refreshes: server revision when both sides carry one,
/// else modification timestamp.
fn is_newer(candidate: &Entity, existing: &Entity) -> bool {
    match (candidate.version, existing.version) {
        (Some(a), Some(b)) if a != b => a > b,
        _ => candidate.last_modified > existing.last_modified,
    }
}

/// Durable key to snapshot map with write-through persistence
#[derive(Debug)]
pub struct EntityCache {
    entries: DashMap<EntityRef, CacheEntry>,
    kv: Arc<dyn KvStore>,
    degraded: AtomicBool,
}

impl EntityCache {
    /// Create a cache over a storage backend
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            entries: DashMap::new(),
            kv,
            degraded: AtomicBool::new(false),
        }
    }

    /// Restore persisted entries, returning how many were loaded
    ///
    /// Corrupt entries are skipped with a warning rather than failing the
    /// whole restore.
    ///
    /// # Errors
    /// - `StoreError::Io` if the index itself cannot be read
    pub async fn load(&self) -> Result<usize, StoreError> {
        let Some(raw_index) = self.kv.get(INDEX_KEY).await? else {
            return Ok(0);
        };
        let refs: Vec<EntityRef> = match serde_json::from_str(&raw_index) {
            Ok(refs) => refs,
            Err(e) => {
                tracing::warn!("discarding corrupt cache index: {e}");
                return Ok(0);
            }
        };

        let mut loaded = 0;
        for reference in refs {
            let key = storage_key(&reference);
            match self.kv.get(&key).await? {
                Some(raw) => match serde_json::from_str::<CacheEntry>(&raw) {
                    Ok(entry) => {
                        self.entries.insert(reference, entry);
                        loaded += 1;
                    }
                    Err(e) => {
                        tracing::warn!(%reference, "skipping corrupt cache entry: {e}");
                    }
                },
                None => {
                    tracing::debug!(%reference, "indexed cache entry missing from storage");
                }
            }
        }
        tracing::debug!(loaded, "restored entity cache");
        Ok(loaded)
    }

    /// Last snapshot put for this ref, if any
    #[must_use]
    pub fn get(&self, reference: &EntityRef) -> Option<CacheEntry> {
        self.entries.get(reference).map(|e| e.value().clone())
    }

    /// Store a snapshot unconditionally
    ///
    /// This is the write path's entry point; rollback relies on it
    /// restoring an older snapshot exactly. Refreshes must use
    /// [`EntityCache::put_if_newer`] instead.
    pub async fn put(&self, entry: CacheEntry) {
        let reference = entry.entity.reference();
        self.entries.insert(reference.clone(), entry.clone());
        self.persist(&reference, &entry).await;
    }

    /// Store a snapshot only if it is newer than the cached one
    ///
    /// Returns whether the cache changed. Last writer wins by server
    /// revision when both sides have one, else by `last_modified`; the
    /// cached timestamp never regresses through this path.
    pub async fn put_if_newer(&self, entry: CacheEntry) -> bool {
        let reference = entry.entity.reference();
        if let Some(existing) = self.entries.get(&reference) {
            if !is_newer(&entry.entity, &existing.entity) {
                tracing::debug!(%reference, "refresh older than cached snapshot, ignored");
                return false;
            }
        }
        self.entries.insert(reference.clone(), entry.clone());
        self.persist(&reference, &entry).await;
        true
    }

    /// Evict a snapshot, returning whether one was present
    pub async fn delete(&self, reference: &EntityRef) -> bool {
        let existed = self.entries.remove(reference).is_some();
        if existed {
            if let Err(e) = self.kv.remove(&storage_key(reference)).await {
                self.report_storage_failure("remove", &e);
            }
            self.persist_index().await;
        }
        existed
    }

    /// All cached snapshots of one type
    #[must_use]
    pub fn list_by_type(&self, entity_type: EntityType) -> Vec<CacheEntry> {
        self.entries
            .iter()
            .filter(|e| e.key().entity_type == entity_type)
            .map(|e| e.value().clone())
            .collect()
    }

    /// Evict everything (logout / session invalidation)
    pub async fn clear(&self) {
        let keys: Vec<EntityRef> = self.entries.iter().map(|e| e.key().clone()).collect();
        self.entries.clear();
        for reference in &keys {
            if let Err(e) = self.kv.remove(&storage_key(reference)).await {
                self.report_storage_failure("remove", &e);
            }
        }
        if let Err(e) = self.kv.remove(INDEX_KEY).await {
            self.report_storage_failure("remove", &e);
        }
        tracing::debug!(evicted = keys.len(), "cleared entity cache");
    }

    /// Number of cached snapshots
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check for the empty cache
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a storage write has failed since startup
    ///
    /// In degraded mode the in-memory cache keeps working but snapshots
    /// may not survive a restart.
    #[inline]
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    async fn persist(&self, reference: &EntityRef, entry: &CacheEntry) {
        match serde_json::to_string(entry) {
            Ok(raw) => {
                if let Err(e) = self.kv.set(&storage_key(reference), &raw).await {
                    self.report_storage_failure("set", &e);
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(%reference, "failed to encode cache entry: {e}");
                return;
            }
        }
        self.persist_index().await;
    }

    async fn persist_index(&self) {
        let refs: Vec<EntityRef> = self.entries.iter().map(|e| e.key().clone()).collect();
        match serde_json::to_string(&refs) {
            Ok(raw) => {
                if let Err(e) = self.kv.set(INDEX_KEY, &raw).await {
                    self.report_storage_failure("set", &e);
                }
            }
            Err(e) => tracing::warn!("failed to encode cache index: {e}"),
        }
    }

    fn report_storage_failure(&self, op: &str, err: &StoreError) {
        self.degraded.store(true, Ordering::Relaxed);
        tracing::warn!("cache storage {op} failed, continuing degraded: {err}");
    }
}

//! Cache-first read path and background refresh
//!
//! Reads never block on the network when an acceptable cache entry exists;
//! the network is consulted in the background instead. Remote results are
//! always applied under the entity's lock with last-writer-wins ordering,
//! so a refresh landing while a mutation is pending is buffered until the
//! mutation resolves and can never clobber an unresolved optimistic write.

use crate::config::SyncConfig;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tether_gateway::RemoteGateway;
use tether_model::{
    BusEvent, CacheEntry, Entity, EntityEvent, EntityRef, EntityType, ErrorKind, SyncError,
};
use tether_store::{EntityCache, EventBus};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Options for [`Synchronizer::read`]
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Accept a cache entry older than the freshness window
    pub allow_stale: bool,
    /// Abandon the wait without touching the cache
    pub cancel: Option<CancellationToken>,
}

impl ReadOptions {
    /// Options accepting stale cache entries
    #[inline]
    #[must_use]
    pub fn allow_stale() -> Self {
        Self {
            allow_stale: true,
            cancel: None,
        }
    }

    /// With a cancellation token
    #[inline]
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// A read outcome: the snapshot plus whether it missed the freshness window
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResult {
    /// The snapshot served
    pub entity: Entity,
    /// Whether the snapshot is older than the freshness window
    pub stale: bool,
}

/// Shared state behind a cloneable [`Synchronizer`] handle
pub(crate) struct Core {
    pub(crate) cache: Arc<EntityCache>,
    pub(crate) gateway: Arc<RemoteGateway>,
    pub(crate) bus: EventBus,
    pub(crate) config: SyncConfig,
    /// Per-entity mutation locks, held from optimistic apply to settle
    pub(crate) locks: DashMap<EntityRef, Arc<Mutex<()>>>,
    /// Entities with a refresh already scheduled inside the debounce window
    refresh_marks: moka::sync::Cache<EntityRef, ()>,
}

impl std::fmt::Debug for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("config", &self.config)
            .field("locks", &self.locks.len())
            .finish_non_exhaustive()
    }
}

/// Orchestrates cache-first reads and optimistic writes
///
/// Cheap to clone; all clones share one lock table and one cache.
#[derive(Debug, Clone)]
pub struct Synchronizer {
    pub(crate) core: Arc<Core>,
}

impl Synchronizer {
    /// Create a synchronizer over its collaborators
    #[must_use]
    pub fn new(
        cache: Arc<EntityCache>,
        gateway: Arc<RemoteGateway>,
        bus: EventBus,
        config: SyncConfig,
    ) -> Self {
        let refresh_marks = moka::sync::Cache::builder()
            .max_capacity(10_000)
            .time_to_live(config.refresh_debounce)
            .build();
        Self {
            core: Arc::new(Core {
                cache,
                gateway,
                bus,
                config,
                locks: DashMap::new(),
                refresh_marks,
            }),
        }
    }

    /// Read an entity, cache first
    ///
    /// A fresh (or allowed-stale) cache hit returns immediately and
    /// schedules a non-blocking background refresh. Otherwise the remote
    /// is awaited; on failure any cached value is served marked stale
    /// before the error would propagate.
    pub async fn read(
        &self,
        reference: &EntityRef,
        options: ReadOptions,
    ) -> Result<ReadResult, SyncError> {
        if let Some(entry) = self.core.cache.get(reference) {
            let fresh = entry.is_fresh(self.core.config.freshness_ttl, Utc::now());
            if fresh || options.allow_stale {
                tracing::debug!(%reference, fresh, "read served from cache");
                self.schedule_refresh(reference);
                return Ok(ReadResult {
                    entity: entry.entity,
                    stale: !fresh,
                });
            }
        }

        let outcome = match &options.cancel {
            Some(token) if token.is_cancelled() => {
                return Err(SyncError::Unknown("cancelled".into()));
            }
            Some(token) => tokio::select! {
                biased;
                () = token.cancelled() => {
                    tracing::debug!(%reference, "read cancelled by caller");
                    return Err(SyncError::Unknown("cancelled".into()));
                }
                outcome = self.fetch_authoritative(reference) => outcome,
            },
            None => self.fetch_authoritative(reference).await,
        };

        match outcome {
            Ok(entity) => Ok(ReadResult {
                entity,
                stale: false,
            }),
            Err(err) => self.read_fallback(reference, err),
        }
    }

    /// Serve a degraded cached value if the failure allows it
    fn read_fallback(&self, reference: &EntityRef, err: SyncError) -> Result<ReadResult, SyncError> {
        match err.kind() {
            // session (and with it the cache) is already cleared
            ErrorKind::Unauthorized => Err(err),
            // remote confirmed the entity is gone
            ErrorKind::NotFound => Err(err),
            _ => match self.core.cache.get(reference) {
                Some(entry) => {
                    tracing::warn!(%reference, "remote unreachable, serving cached value: {err}");
                    Ok(ReadResult {
                        entity: entry.entity,
                        stale: true,
                    })
                }
                None => Err(err),
            },
        }
    }

    /// Read everything cached of one type and refresh each in the background
    #[must_use]
    pub fn list(&self, entity_type: EntityType) -> Vec<ReadResult> {
        let now = Utc::now();
        let entries = self.core.cache.list_by_type(entity_type);
        let results: Vec<ReadResult> = entries
            .into_iter()
            .map(|entry| ReadResult {
                stale: !entry.is_fresh(self.core.config.freshness_ttl, now),
                entity: entry.entity,
            })
            .collect();

        let refreshes: Vec<_> = results
            .iter()
            .filter_map(|r| self.claim_refresh(&r.entity.reference()))
            .collect();
        if !refreshes.is_empty() {
            let sync = self.clone();
            tokio::spawn(async move {
                let outcomes = futures::future::join_all(
                    refreshes.iter().map(|reference| sync.refresh_now(reference)),
                )
                .await;
                let failed = outcomes.iter().filter(|o| o.is_err()).count();
                if failed > 0 {
                    tracing::debug!(failed, "background list refresh had failures");
                }
            });
        }
        results
    }

    /// Explicitly evict an entity (e.g. remote-confirmed deletion)
    pub async fn invalidate(&self, reference: &EntityRef) {
        if self.core.cache.delete(reference).await {
            self.core
                .bus
                .publish(BusEvent::Entity(EntityEvent::evicted(reference.clone())));
        }
    }

    /// Whether cache persistence has failed and only in-memory data is safe
    #[inline]
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.core.cache.is_degraded()
    }

    /// Configuration in effect
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.core.config
    }

    /// Subscribe to entity and session events
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<BusEvent> {
        self.core.bus.subscribe()
    }

    // ---- internals ----------------------------------------------------

    pub(crate) fn lock_for(&self, reference: &EntityRef) -> Arc<Mutex<()>> {
        self.core
            .locks
            .entry(reference.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Fetch from the remote and reconcile into the cache, returning the
    /// winning snapshot
    async fn fetch_authoritative(&self, reference: &EntityRef) -> Result<Entity, SyncError> {
        match self.core.gateway.fetch(reference).await {
            Ok(entity) => Ok(self.apply_remote(entity).await),
            Err(err) => {
                if err.kind() == ErrorKind::NotFound {
                    self.invalidate(reference).await;
                }
                Err(err)
            }
        }
    }

    /// Apply a remote snapshot under the entity lock with last-writer-wins
    ///
    /// Waiting on the lock is what buffers refreshes behind an in-flight
    /// mutation. Returns the snapshot that ended up cached.
    pub(crate) async fn apply_remote(&self, entity: Entity) -> Entity {
        let reference = entity.reference();
        let lock = self.lock_for(&reference);
        let _guard = lock.lock().await;

        let changed = self.core.cache.put_if_newer(CacheEntry::new(entity.clone())).await;
        if changed {
            self.core
                .bus
                .publish(BusEvent::Entity(EntityEvent::changed(entity.clone())));
            return entity;
        }
        self.core
            .cache
            .get(&reference)
            .map_or(entity, |entry| entry.entity)
    }

    /// Reserve a refresh slot; `None` when one is already scheduled inside
    /// the debounce window
    fn claim_refresh(&self, reference: &EntityRef) -> Option<EntityRef> {
        if self.core.refresh_marks.contains_key(reference) {
            return None;
        }
        self.core.refresh_marks.insert(reference.clone(), ());
        Some(reference.clone())
    }

    /// Kick off a debounced, non-blocking refresh
    pub(crate) fn schedule_refresh(&self, reference: &EntityRef) {
        let Some(reference) = self.claim_refresh(reference) else {
            return;
        };
        let sync = self.clone();
        tokio::spawn(async move {
            if let Err(err) = sync.refresh_now(&reference).await {
                tracing::debug!(%reference, "background refresh failed: {err}");
            }
        });
    }

    /// One refresh round trip; failures are the caller's to report
    pub(crate) async fn refresh_now(&self, reference: &EntityRef) -> Result<(), SyncError> {
        self.fetch_authoritative(reference).await.map(|_| ())
    }
}

//! Session and token store
//!
//! Holds the current credential and user snapshot. Reads are synchronous;
//! writes persist to the [`KvStore`] and broadcast a [`SessionEvent`].
//! Clearing the session cascades to eviction of all cached entities, since
//! every cache entry is scoped to the authenticated session.

use crate::bus::EventBus;
use crate::cache::EntityCache;
use crate::kv::KvStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tether_model::{BusEvent, SessionEvent, UserSnapshot};

/// Key under which the session snapshot is persisted
const SESSION_KEY: &str = "session/state";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SessionState {
    token: Option<String>,
    user: Option<UserSnapshot>,
}

/// Credential and user snapshot with synchronous reads
#[derive(Debug)]
pub struct SessionStore {
    state: RwLock<SessionState>,
    kv: Arc<dyn KvStore>,
    cache: Arc<EntityCache>,
    bus: EventBus,
}

impl SessionStore {
    /// Create a session store wired to its cascade target
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>, cache: Arc<EntityCache>, bus: EventBus) -> Self {
        Self {
            state: RwLock::new(SessionState::default()),
            kv,
            cache,
            bus,
        }
    }

    /// Restore token and user from durable storage
    ///
    /// A corrupt snapshot starts the session clean rather than failing
    /// startup.
    pub async fn init(&self) {
        match self.kv.get(SESSION_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<SessionState>(&raw) {
                Ok(restored) => {
                    let authenticated = restored.token.is_some();
                    *self.state.write() = restored;
                    tracing::debug!(authenticated, "restored session");
                }
                Err(e) => tracing::warn!("discarding corrupt session snapshot: {e}"),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!("session restore failed, starting clean: {e}"),
        }
    }

    /// Current token, if any
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.state.read().token.clone()
    }

    /// Synchronous check for a present credential
    #[inline]
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.read().token.is_some()
    }

    /// Current user snapshot, if any
    #[must_use]
    pub fn user(&self) -> Option<UserSnapshot> {
        self.state.read().user.clone()
    }

    /// Replace the token, persist, and broadcast
    pub async fn set_token(&self, token: impl Into<String>) {
        {
            self.state.write().token = Some(token.into());
        }
        self.persist().await;
        self.bus.publish(BusEvent::Session(SessionEvent::TokenChanged {
            authenticated: true,
        }));
    }

    /// Replace the user snapshot, persist, and broadcast
    pub async fn set_user(&self, user: UserSnapshot) {
        {
            self.state.write().user = Some(user);
        }
        self.persist().await;
        self.bus.publish(BusEvent::Session(SessionEvent::UserChanged));
    }

    /// Wipe the session and evict all session-scoped cache entries
    ///
    /// Invoked on explicit logout and by the gateway when the remote
    /// answers unauthorized.
    pub async fn clear(&self) {
        {
            *self.state.write() = SessionState::default();
        }
        if let Err(e) = self.kv.remove(SESSION_KEY).await {
            tracing::warn!("failed to remove persisted session: {e}");
        }
        self.cache.clear().await;
        self.bus.publish(BusEvent::Session(SessionEvent::Cleared));
        tracing::info!("session cleared");
    }

    async fn persist(&self) {
        let snapshot = self.state.read().clone();
        match serde_json::to_string(&snapshot) {
            Ok(raw) => {
                if let Err(e) = self.kv.set(SESSION_KEY, &raw).await {
                    tracing::warn!("failed to persist session: {e}");
                }
            }
            Err(e) => tracing::warn!("failed to encode session: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use tether_model::{CacheEntry, Entity, EntityType, Payload};

    fn fixture() -> (Arc<dyn KvStore>, Arc<EntityCache>, EventBus) {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let cache = Arc::new(EntityCache::new(Arc::clone(&kv)));
        (kv, cache, EventBus::default())
    }

    #[tokio::test]
    async fn starts_unauthenticated() {
        let (kv, cache, bus) = fixture();
        let session = SessionStore::new(kv, cache, bus);
        session.init().await;

        assert!(!session.is_authenticated());
        assert_eq!(session.token(), None);
        assert_eq!(session.user(), None);
    }

    #[tokio::test]
    async fn token_survives_restart() {
        let (kv, cache, bus) = fixture();

        let session = SessionStore::new(Arc::clone(&kv), Arc::clone(&cache), bus.clone());
        session.set_token("bearer-abc").await;
        session.set_user(UserSnapshot::new("u1")).await;
        drop(session);

        let restored = SessionStore::new(kv, cache, bus);
        restored.init().await;
        assert!(restored.is_authenticated());
        assert_eq!(restored.token().as_deref(), Some("bearer-abc"));
        assert_eq!(restored.user().unwrap().id, "u1");
    }

    #[tokio::test]
    async fn clear_cascades_to_cache() {
        let (kv, cache, bus) = fixture();
        let mut rx = bus.subscribe();

        cache
            .put(CacheEntry::new(Entity::new(
                EntityType::Task,
                "7",
                Payload::new(),
            )))
            .await;

        let session = SessionStore::new(kv, Arc::clone(&cache), bus);
        session.set_token("bearer-abc").await;
        session.clear().await;

        assert!(!session.is_authenticated());
        assert!(cache.is_empty());

        // TokenChanged then Cleared
        assert!(matches!(
            rx.recv().await.unwrap(),
            BusEvent::Session(SessionEvent::TokenChanged { authenticated: true })
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            BusEvent::Session(SessionEvent::Cleared)
        ));
    }

    #[tokio::test]
    async fn corrupt_snapshot_starts_clean() {
        let (kv, cache, bus) = fixture();
        kv.set(SESSION_KEY, "{malformed").await.unwrap();

        let session = SessionStore::new(kv, cache, bus);
        session.init().await;
        assert!(!session.is_authenticated());
    }
}

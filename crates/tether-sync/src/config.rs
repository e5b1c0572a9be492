//! Synchronizer configuration
//!
//! Freshness and debounce windows plus the per-type policy for writes
//! arriving while another mutation is in flight.

use std::collections::HashMap;
use std::time::Duration;
use tether_model::EntityType;

/// What to do with a write while another mutation holds the entity lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    /// Wait and apply atop the resolved state - default
    #[default]
    Queue,
    /// Fail fast with `Conflict`
    Reject,
}

/// Synchronizer configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How long a cache entry counts as fresh
    pub freshness_ttl: Duration,
    /// Window during which repeat background refreshes of one entity are
    /// coalesced
    pub refresh_debounce: Duration,
    /// Policy for types not listed in `write_policies`
    pub default_write_policy: WritePolicy,
    write_policies: HashMap<EntityType, WritePolicy>,
}

impl SyncConfig {
    /// Create the default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a freshness window
    #[inline]
    #[must_use]
    pub fn with_freshness_ttl(mut self, ttl: Duration) -> Self {
        self.freshness_ttl = ttl;
        self
    }

    /// With a refresh debounce window
    #[inline]
    #[must_use]
    pub fn with_refresh_debounce(mut self, window: Duration) -> Self {
        self.refresh_debounce = window;
        self
    }

    /// With a policy for one entity type
    #[must_use]
    pub fn with_write_policy(mut self, entity_type: EntityType, policy: WritePolicy) -> Self {
        self.write_policies.insert(entity_type, policy);
        self
    }

    /// With a fallback policy
    #[inline]
    #[must_use]
    pub fn with_default_write_policy(mut self, policy: WritePolicy) -> Self {
        self.default_write_policy = policy;
        self
    }

    /// Policy in effect for an entity type
    #[must_use]
    pub fn write_policy(&self, entity_type: EntityType) -> WritePolicy {
        self.write_policies
            .get(&entity_type)
            .copied()
            .unwrap_or(self.default_write_policy)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            freshness_ttl: Duration::from_secs(30),
            refresh_debounce: Duration::from_secs(5),
            default_write_policy: WritePolicy::Queue,
            write_policies: HashMap::new(),
        }
    }
}

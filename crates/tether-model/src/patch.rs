//! Patches merged into entities by the write path
//!
//! A patch is the unit of mutation: a partial field map plus an optional
//! status change. Patches are merged over the cached snapshot for
//! optimistic application and sent to the remote verbatim.

use crate::entity::Entity;
use crate::status::Status;
use serde::{Deserialize, Serialize};

/// Partial mutation of an entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    /// Canonical fields to overwrite
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub fields: serde_json::Map<String, serde_json::Value>,
    /// Status to move to, if this patch drives the workflow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl Patch {
    /// Create an empty patch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field overwrite
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Add a status change
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    /// Patch that only moves the workflow status
    #[inline]
    #[must_use]
    pub fn status_only(status: Status) -> Self {
        Self::new().with_status(status)
    }

    /// Check whether this patch changes the workflow status
    #[inline]
    #[must_use]
    pub fn changes_status(&self) -> bool {
        self.status.is_some()
    }

    /// Check whether this patch does nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.status.is_none()
    }

    /// Merge this patch over a snapshot, producing the optimistic entity
    ///
    /// The result is marked pending; `last_modified` is left untouched so
    /// a later refresh cannot be shadowed by a local guess.
    #[must_use]
    pub fn apply_to(&self, base: &Entity) -> Entity {
        let mut next = base.clone();
        next.payload.merge(&self.fields);
        if let Some(status) = self.status {
            next.status = Some(status);
        }
        next.pending = true;
        next
    }
}

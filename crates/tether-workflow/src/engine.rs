//! Workflow engine
//!
//! Thin by design: certification lives in the transition table, mutation
//! in the synchronizer's write path. The engine ties the two together and
//! owns the failure semantics for remotely rejected transitions.

use tether_model::{Entity, EntityRef, ErrorKind, Patch, Status, SyncError};
use tether_sync::{Synchronizer, WriteOptions};

/// Applies certified status transitions through the synchronizer
#[derive(Debug, Clone)]
pub struct WorkflowEngine {
    sync: Synchronizer,
}

impl WorkflowEngine {
    /// Create an engine over a synchronizer
    #[inline]
    #[must_use]
    pub fn new(sync: Synchronizer) -> Self {
        Self { sync }
    }

    /// Check a transition against the table without applying anything
    #[inline]
    #[must_use]
    pub fn can_transition(current: Status, target: Status) -> bool {
        current.can_transition(target)
    }

    /// Move an entity to `target`, optimistically
    ///
    /// An illegal transition rejects locally with `InvalidTransition` and
    /// no network traffic. A remote rejection of a legal transition rolls
    /// the cache back; when another actor already moved the entity
    /// (`Conflict`) the synchronizer additionally forces a fresh
    /// authoritative re-read before the error surfaces, so the UI
    /// reconciles instead of retrying blind.
    pub async fn apply_transition(
        &self,
        reference: &EntityRef,
        target: Status,
    ) -> Result<Entity, SyncError> {
        tracing::debug!(%reference, %target, "applying workflow transition");
        let pending = self
            .sync
            .write(
                reference,
                Patch::status_only(target),
                WriteOptions::default(),
            )
            .await?;

        match pending.settled().await {
            Ok(confirmed) => Ok(confirmed),
            Err(err) => {
                if err.kind() == ErrorKind::Conflict {
                    tracing::info!(%reference, "transition lost to another actor, state re-read");
                }
                Err(err)
            }
        }
    }

    /// The synchronizer this engine writes through
    #[inline]
    #[must_use]
    pub fn synchronizer(&self) -> &Synchronizer {
        &self.sync
    }
}

//! Optimistic write path
//!
//! One generic write path serves every entity type: snapshot the pre-image
//! into an undo buffer, merge the patch, publish, then settle against the
//! remote. Rollback restores the undo snapshot exactly - same payload,
//! same timestamps - so a failed write is indistinguishable from one that
//! never happened.
//!
//! The per-entity lock is held from optimistic apply until the remote
//! settles, serializing logically concurrent mutations of one entity.

use crate::config::WritePolicy;
use crate::synchronizer::Synchronizer;
use tether_model::{
    BusEvent, CacheEntry, Entity, EntityEvent, EntityRef, ErrorKind, Patch, Payload, Status,
    SyncError,
};
use tokio::sync::{oneshot, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

/// Options for [`Synchronizer::write`]
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Apply locally before remote confirmation (default)
    pub optimistic: bool,
    /// Suppress completion delivery to a no-longer-interested caller; the
    /// remote round trip and commit/rollback still run to completion
    pub cancel: Option<CancellationToken>,
}

impl WriteOptions {
    /// Await the remote before touching the cache
    #[inline]
    #[must_use]
    pub fn remote_first() -> Self {
        Self {
            optimistic: false,
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

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            optimistic: true,
            cancel: None,
        }
    }
}

/// A write that has been applied locally and awaits remote settlement
///
/// Dropping the handle abandons interest in the outcome without affecting
/// the commit/rollback logic.
#[derive(Debug)]
pub struct PendingWrite {
    applied: Entity,
    rx: oneshot::Receiver<Result<Entity, SyncError>>,
}

impl PendingWrite {
    /// The snapshot visible in the cache right now
    ///
    /// Optimistic writes: the locally merged entity, marked pending.
    /// Remote-first writes: the server-confirmed entity.
    #[inline]
    #[must_use]
    pub fn applied(&self) -> &Entity {
        &self.applied
    }

    /// Await the remote outcome
    ///
    /// Resolves with the server-confirmed entity, or the classified error
    /// after rollback has restored the pre-write snapshot.
    pub async fn settled(self) -> Result<Entity, SyncError> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(SyncError::Unknown("write completion suppressed".into())),
        }
    }
}

impl Synchronizer {
    /// Mutate an entity through the one generic write path
    ///
    /// Status-changing patches are certified against the transition table
    /// first; an illegal transition rejects immediately with zero gateway
    /// calls. Writes to an entity with a mutation already in flight either
    /// queue or reject per the type's [`WritePolicy`].
    pub async fn write(
        &self,
        reference: &EntityRef,
        patch: Patch,
        options: WriteOptions,
    ) -> Result<PendingWrite, SyncError> {
        if patch.is_empty() {
            return Err(SyncError::validation("empty patch"));
        }

        let lock = self.lock_for(reference);
        let guard = match self.core.config.write_policy(reference.entity_type) {
            WritePolicy::Queue => lock.lock_owned().await,
            WritePolicy::Reject => lock.try_lock_owned().map_err(|_| {
                SyncError::Conflict(format!("mutation already in flight for {reference}"))
            })?,
        };

        // Pre-image: undo buffer, certification input, and optimistic base.
        let undo = match self.core.cache.get(reference) {
            Some(entry) => Some(entry),
            None if patch.changes_status() && !reference.id.is_local() => {
                // The transition must be certified against the current
                // status, so an unknown entity is read through first.
                let fetched = self.core.gateway.fetch(reference).await?;
                let entry = CacheEntry::new(fetched);
                self.core.cache.put_if_newer(entry.clone()).await;
                Some(entry)
            }
            None => None,
        };

        if let Some(target) = patch.status {
            self.certify_transition(reference, undo.as_ref(), target)?;
        }

        if options.optimistic {
            let base = undo.as_ref().map_or_else(
                || Entity::new(reference.entity_type, reference.id.clone(), Payload::new()),
                |entry| entry.entity.clone(),
            );
            let optimistic = patch.apply_to(&base);
            self.core.cache.put(CacheEntry::new(optimistic.clone())).await;
            self.core
                .bus
                .publish(BusEvent::Entity(EntityEvent::changed(optimistic.clone())));
            tracing::debug!(%reference, "optimistic write applied, settling in background");

            let (tx, rx) = oneshot::channel();
            let sync = self.clone();
            let reference = reference.clone();
            tokio::spawn(async move {
                sync.settle(guard, reference, patch, undo, options.cancel, tx)
                    .await;
            });
            Ok(PendingWrite {
                applied: optimistic,
                rx,
            })
        } else {
            let outcome = self.core.gateway.mutate(reference, &patch).await;
            match outcome {
                Ok(confirmed) => {
                    self.commit_confirmed(reference, &confirmed).await;
                    drop(guard);
                    let (tx, rx) = oneshot::channel();
                    let _ = tx.send(Ok(confirmed.clone()));
                    Ok(PendingWrite {
                        applied: confirmed,
                        rx,
                    })
                }
                Err(err) => {
                    // remote-first: the cache was never touched
                    drop(guard);
                    if err.kind() == ErrorKind::Conflict {
                        self.reconcile_after_conflict(reference).await;
                    }
                    Err(err)
                }
            }
        }
    }

    /// Certify a status change against the transition table
    ///
    /// A patch restating the current status is not a change and passes;
    /// entities without a status yet may only enter at `Pending`.
    fn certify_transition(
        &self,
        reference: &EntityRef,
        current: Option<&CacheEntry>,
        target: Status,
    ) -> Result<(), SyncError> {
        if !reference.entity_type.has_workflow() {
            return Err(SyncError::validation(format!(
                "{} entities carry no workflow status",
                reference.entity_type
            )));
        }
        let current = current.and_then(|entry| entry.entity.status);
        if current == Some(target) {
            return Ok(());
        }
        let legal = match current {
            Some(status) => status.can_transition(target),
            None => target == Status::Pending,
        };
        if legal {
            Ok(())
        } else {
            tracing::debug!(%reference, ?current, %target, "transition rejected locally");
            Err(SyncError::InvalidTransition {
                from: current,
                to: target,
            })
        }
    }

    /// Resolve an optimistic write against the remote
    async fn settle(
        &self,
        guard: OwnedMutexGuard<()>,
        reference: EntityRef,
        patch: Patch,
        undo: Option<CacheEntry>,
        cancel: Option<CancellationToken>,
        tx: oneshot::Sender<Result<Entity, SyncError>>,
    ) {
        let outcome = match self.core.gateway.mutate(&reference, &patch).await {
            Ok(confirmed) => {
                self.commit_confirmed(&reference, &confirmed).await;
                tracing::debug!(%reference, "optimistic write confirmed");
                Ok(confirmed)
            }
            Err(err) => {
                self.rollback(&reference, undo, &err).await;
                tracing::warn!(%reference, "optimistic write rolled back: {err}");
                Err(err)
            }
        };

        let conflicted = matches!(&outcome, Err(e) if e.kind() == ErrorKind::Conflict);
        drop(guard);
        if conflicted {
            self.reconcile_after_conflict(&reference).await;
        }

        if cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            tracing::debug!(%reference, "write completion suppressed after cancellation");
        } else {
            let _ = tx.send(outcome);
        }
    }

    /// Replace the optimistic entry with the server-confirmed snapshot,
    /// re-keying entities whose tentative id the server replaced
    async fn commit_confirmed(&self, original: &EntityRef, confirmed: &Entity) {
        let confirmed_ref = confirmed.reference();
        if confirmed_ref != *original && self.core.cache.delete(original).await {
            self.core
                .bus
                .publish(BusEvent::Entity(EntityEvent::evicted(original.clone())));
        }
        self.core.cache.put(CacheEntry::new(confirmed.clone())).await;
        self.core
            .bus
            .publish(BusEvent::Entity(EntityEvent::changed(confirmed.clone())));
    }

    /// Restore the undo buffer exactly and publish the reverted state
    async fn rollback(&self, reference: &EntityRef, undo: Option<CacheEntry>, err: &SyncError) {
        if err.kind() == ErrorKind::Unauthorized {
            // the session cascade already evicted everything; resurrecting
            // the pre-image would outlive the session it belonged to
            return;
        }
        match undo {
            Some(entry) => {
                let reverted = entry.entity.clone();
                self.core.cache.put(entry).await;
                self.core
                    .bus
                    .publish(BusEvent::Entity(EntityEvent::changed(reverted)));
            }
            None => {
                if self.core.cache.delete(reference).await {
                    self.core
                        .bus
                        .publish(BusEvent::Entity(EntityEvent::evicted(reference.clone())));
                }
            }
        }
    }

    /// Another actor won: re-read authoritatively so the UI reconciles
    /// instead of retrying blind
    async fn reconcile_after_conflict(&self, reference: &EntityRef) {
        if let Err(err) = self.refresh_now(reference).await {
            tracing::debug!(%reference, "post-conflict re-read failed: {err}");
        }
    }
}

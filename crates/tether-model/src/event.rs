//! Change events published on the bus
//!
//! The synchronizer and session store broadcast these so UI code can react
//! to entity and auth changes without polling.

use crate::entity::{Entity, EntityRef};
use serde::{Deserialize, Serialize};

/// Any event carried by the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BusEvent {
    /// An entity snapshot changed or was evicted
    Entity(EntityEvent),
    /// The session changed
    Session(SessionEvent),
}

/// Entity change notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEvent {
    /// Which entity changed
    pub reference: EntityRef,
    /// The new snapshot, or `None` when the entry was evicted
    pub snapshot: Option<Entity>,
}

impl EntityEvent {
    /// Notification that an entity now has this snapshot
    #[must_use]
    pub fn changed(entity: Entity) -> Self {
        Self {
            reference: entity.reference(),
            snapshot: Some(entity),
        }
    }

    /// Notification that an entity was evicted
    #[must_use]
    pub fn evicted(reference: EntityRef) -> Self {
        Self {
            reference,
            snapshot: None,
        }
    }
}

/// Session change notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// Token was set or replaced
    TokenChanged {
        /// Whether a token is now present
        authenticated: bool,
    },
    /// User snapshot was set or replaced
    UserChanged,
    /// Session wiped (logout or unauthorized signal)
    Cleared,
}

//! Tether Model - canonical entity shapes shared across the workspace
//!
//! Defines the types every other crate agrees on:
//! - Entity identity (`EntityId`, `EntityType`, `EntityRef`)
//! - Entity snapshots and cache entries
//! - Patches merged into entities by the write path
//! - The status graph for task/document workflows
//! - The error taxonomy
//! - Change events published on the bus

pub mod entity;
pub mod error;
pub mod event;
pub mod patch;
pub mod status;

// Re-exports for convenience
pub use entity::{CacheEntry, Entity, EntityId, EntityRef, EntityType, Payload, UserSnapshot};
pub use error::{ErrorKind, FieldError, SyncError};
pub use event::{BusEvent, EntityEvent, SessionEvent};
pub use patch::Patch;
pub use status::Status;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with tether entities
    pub use crate::{
        BusEvent, CacheEntry, Entity, EntityEvent, EntityId, EntityRef, EntityType, ErrorKind,
        Patch, Payload, Status, SyncError,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

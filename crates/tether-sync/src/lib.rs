//! Tether Sync - the synchronizer
//!
//! The orchestration layer between UI code and the two leaves:
//! - Cache-first reads with stale fallback and debounced background
//!   refresh
//! - Optimistic writes with an undo buffer, byte-exact rollback, and
//!   per-entity serialization
//! - Last-writer-wins reconciliation so a refresh can never clobber an
//!   unresolved optimistic write
//!
//! # Example
//!
//! ```rust,ignore
//! use tether_sync::{ReadOptions, SyncConfig, Synchronizer, WriteOptions};
//! use tether_model::{EntityRef, Patch, Status};
//!
//! # async fn example(sync: Synchronizer) -> Result<(), tether_model::SyncError> {
//! let read = sync.read(&EntityRef::task("7"), ReadOptions::default()).await?;
//! println!("stale: {}", read.stale);
//!
//! let write = sync
//!     .write(&EntityRef::task("7"), Patch::status_only(Status::Accepted), WriteOptions::default())
//!     .await?;
//! let confirmed = write.settled().await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod config;
pub mod synchronizer;
pub mod write;

// Re-exports for convenience
pub use config::{SyncConfig, WritePolicy};
pub use synchronizer::{ReadOptions, ReadResult, Synchronizer};
pub use write::{PendingWrite, WriteOptions};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

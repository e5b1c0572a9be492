//! Tether Store - local persistence and broadcast
//!
//! The two durable leaves of the synchronization core plus the event bus:
//! - [`KvStore`] - durable key-value collaborator with in-memory and
//!   JSON-file backends
//! - [`EntityCache`] - key to snapshot map with write-through persistence
//!   and a degraded-mode flag
//! - [`SessionStore`] - credential and user snapshot with synchronous
//!   reads and cascading clear
//! - [`EventBus`] - broadcast channel informing UI code of changes

pub mod bus;
pub mod cache;
pub mod file;
pub mod kv;
pub mod session;

// Re-exports for convenience
pub use bus::EventBus;
pub use cache::EntityCache;
pub use file::JsonFileKv;
pub use kv::{KvStore, MemoryKv, StoreError};
pub use session::SessionStore;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

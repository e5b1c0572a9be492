//! Tether Gateway - the remote boundary
//!
//! Everything that touches the wire lives here:
//! - [`Transport`] - the seam over the host HTTP client
//! - [`RemoteGateway`] - authenticated fetch/mutate with per-category
//!   timeouts and error classification
//! - payload normalization into the canonical entity shape
//!
//! Higher layers never see raw status codes or wire field names; they see
//! [`tether_model::Entity`] values and [`tether_model::SyncError`] kinds.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod gateway;
pub mod normalize;
pub mod transport;

#[cfg(feature = "http")]
pub mod http;

// Re-exports for convenience
pub use gateway::{GatewayConfig, RemoteGateway};
pub use normalize::entity_from_body;
pub use transport::{Method, Transport, TransportError, TransportRequest, TransportResponse};

#[cfg(feature = "http")]
pub use http::HttpTransport;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Transport seam over the host HTTP client
//!
//! The gateway is generic over anything that can turn a request into a
//! status code plus JSON body. Timeouts are NOT a transport concern; the
//! gateway enforces them so no implementation can hang the core.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Request verb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Read an entity
    Get,
    /// Create an entity
    Post,
    /// Partially update an entity
    Patch,
}

impl Method {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single authenticated call
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    /// Verb
    pub method: Method,
    /// Path below the transport's base URL, e.g. `/api/tasks/7`
    pub path: String,
    /// Bearer token attached by the gateway, when a session exists
    pub token: Option<String>,
    /// JSON body for writes
    pub body: Option<Value>,
}

/// What came back
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Decoded JSON body; `Value::Null` when the response had none
    pub body: Value,
}

impl TransportResponse {
    /// Shorthand for a response
    #[must_use]
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }
}

/// Transport-level failures; classified as `Network` by the gateway
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Connection, DNS, or protocol failure
    #[error("transport failure: {0}")]
    Io(String),
}

/// Executes authenticated JSON requests
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Perform one call
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_wire_names() {
        assert_eq!(Method::Get.as_str(), "GET");
        assert_eq!(Method::Patch.to_string(), "PATCH");
    }
}

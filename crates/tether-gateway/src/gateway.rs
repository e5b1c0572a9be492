//! Authenticated remote gateway
//!
//! One place owns the wire rules: the session token rides on every call,
//! stalls become classified `Network` errors instead of hangs, and status
//! codes map onto the error taxonomy. On 401 the session store is cleared
//! before the error propagates, so callers observing `Unauthorized` can
//! already trust `is_authenticated()` to be false.

use crate::normalize::entity_from_body;
use crate::transport::{Method, Transport, TransportError, TransportRequest, TransportResponse};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tether_model::{Entity, EntityRef, FieldError, Patch, SyncError};
use tether_store::SessionStore;

/// Wire configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Path prefix for all routes
    pub base_path: String,
    /// Timeout for reads
    pub read_timeout: Duration,
    /// Timeout for writes
    pub write_timeout: Duration,
}

impl GatewayConfig {
    /// Create the default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a path prefix
    #[inline]
    #[must_use]
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// With a read timeout
    #[inline]
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// With a write timeout
    #[inline]
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_path: "/api".to_string(),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(15),
        }
    }
}

/// Performs authenticated fetch/mutate calls against the remote
#[derive(Debug)]
pub struct RemoteGateway {
    transport: Arc<dyn Transport>,
    session: Arc<SessionStore>,
    config: GatewayConfig,
}

impl RemoteGateway {
    /// Create a gateway
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        session: Arc<SessionStore>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            transport,
            session,
            config,
        }
    }

    /// Fetch the authoritative snapshot of an entity
    pub async fn fetch(&self, reference: &EntityRef) -> Result<Entity, SyncError> {
        let request = TransportRequest {
            method: Method::Get,
            path: self.item_path(reference),
            token: self.session.token(),
            body: None,
        };
        tracing::debug!(%reference, "gateway fetch");
        let response = self.execute(request, self.config.read_timeout).await?;
        self.classify(reference, response).await
    }

    /// Apply a patch remotely, returning the server-confirmed snapshot
    ///
    /// Tentative (`local-`) ids create via the collection route; concrete
    /// ids update via the item route.
    pub async fn mutate(&self, reference: &EntityRef, patch: &Patch) -> Result<Entity, SyncError> {
        let (method, path) = if reference.id.is_local() {
            (Method::Post, self.collection_path(reference))
        } else {
            (Method::Patch, self.item_path(reference))
        };
        let request = TransportRequest {
            method,
            path,
            token: self.session.token(),
            body: Some(patch_body(patch)),
        };
        tracing::debug!(%reference, %method, "gateway mutate");
        let response = self.execute(request, self.config.write_timeout).await?;
        self.classify(reference, response).await
    }

    fn item_path(&self, reference: &EntityRef) -> String {
        format!(
            "{}/{}/{}",
            self.config.base_path,
            reference.entity_type.collection(),
            reference.id
        )
    }

    fn collection_path(&self, reference: &EntityRef) -> String {
        format!(
            "{}/{}",
            self.config.base_path,
            reference.entity_type.collection()
        )
    }

    async fn execute(
        &self,
        request: TransportRequest,
        timeout: Duration,
    ) -> Result<TransportResponse, SyncError> {
        match tokio::time::timeout(timeout, self.transport.execute(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(TransportError::Io(message))) => Err(SyncError::Network(message)),
            Err(_) => Err(SyncError::network(format!(
                "request timed out after {}s",
                timeout.as_secs()
            ))),
        }
    }

    /// Map a wire response onto the error taxonomy
    async fn classify(
        &self,
        reference: &EntityRef,
        response: TransportResponse,
    ) -> Result<Entity, SyncError> {
        let TransportResponse { status, body } = response;
        match status {
            200..=299 => entity_from_body(reference, body),
            401 => {
                // Clear centrally first; redirect decisions belong to the UI.
                tracing::warn!(%reference, "remote answered unauthorized, clearing session");
                self.session.clear().await;
                Err(SyncError::Unauthorized(message_of(
                    &body,
                    "session rejected by remote",
                )))
            }
            404 => Err(SyncError::NotFound(format!("{reference}"))),
            409 => Err(SyncError::Conflict(message_of(
                &body,
                "entity changed remotely",
            ))),
            400 | 422 => Err(SyncError::Validation {
                message: message_of(&body, "payload rejected by remote"),
                field_errors: field_errors_of(&body),
            }),
            500..=599 => Err(SyncError::ServerError(message_of(
                &body,
                &format!("remote failed with status {status}"),
            ))),
            other => Err(SyncError::Unknown(format!(
                "unexpected status {other} for {reference}"
            ))),
        }
    }
}

/// Wire body for a patch: canonical fields plus the status wire name
fn patch_body(patch: &Patch) -> Value {
    let mut body: Map<String, Value> = patch.fields.clone();
    if let Some(status) = patch.status {
        body.insert("status".to_string(), Value::String(status.as_str().into()));
    }
    Value::Object(body)
}

fn message_of(body: &Value, fallback: &str) -> String {
    body.get("message")
        .or_else(|| body.get("error"))
        .and_then(Value::as_str)
        .unwrap_or(fallback)
        .to_string()
}

/// Field errors arrive either itemized or as a flat map
fn field_errors_of(body: &Value) -> Vec<FieldError> {
    if let Some(items) = body.get("errors").and_then(Value::as_array) {
        return items
            .iter()
            .filter_map(|item| {
                Some(FieldError::new(
                    item.get("field")?.as_str()?,
                    item.get("message")?.as_str()?,
                ))
            })
            .collect();
    }
    for key in ["field_errors", "fieldErrors"] {
        if let Some(map) = body.get(key).and_then(Value::as_object) {
            return map
                .iter()
                .filter_map(|(field, message)| {
                    Some(FieldError::new(field.clone(), message.as_str()?))
                })
                .collect();
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_body_carries_status_wire_name() {
        let patch = Patch::new()
            .field("title", "x")
            .with_status(tether_model::Status::InProgress);
        let body = patch_body(&patch);
        assert_eq!(body["status"], "IN_PROGRESS");
        assert_eq!(body["title"], "x");
    }

    #[test]
    fn field_errors_parse_both_shapes() {
        let itemized = json!({
            "message": "rejected",
            "errors": [{"field": "title", "message": "required"}],
        });
        assert_eq!(field_errors_of(&itemized).len(), 1);

        let flat = json!({"fieldErrors": {"due_date": "must be in the future"}});
        let errors = field_errors_of(&flat);
        assert_eq!(errors[0].field, "due_date");

        assert!(field_errors_of(&json!({"message": "x"})).is_empty());
    }

    #[test]
    fn message_prefers_message_then_error() {
        assert_eq!(message_of(&json!({"message": "a"}), "f"), "a");
        assert_eq!(message_of(&json!({"error": "b"}), "f"), "b");
        assert_eq!(message_of(&json!({}), "f"), "f");
    }
}

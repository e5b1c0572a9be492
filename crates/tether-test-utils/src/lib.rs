//! Testing utilities for the tether workspace
//!
//! A scripted transport standing in for the remote, canonical wire-body
//! fixtures, and a tracing initializer for tests that want log output.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tether_gateway::{Transport, TransportError, TransportRequest, TransportResponse};
use tether_model::Status;

/// One scripted exchange
#[derive(Debug)]
struct Scripted {
    delay: Option<Duration>,
    result: Result<TransportResponse, TransportError>,
}

/// Deterministic transport: responses are played back in the order they
/// were enqueued, every request is captured, and calls are counted.
///
/// An exhausted script answers with a transport failure rather than
/// panicking, so stray background calls surface as classified errors
/// instead of killing the test task.
#[derive(Debug, Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<TransportRequest>>,
    calls: AtomicUsize,
}

impl MockTransport {
    /// Create an empty-script transport
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a successful JSON response
    pub fn enqueue_ok(&self, body: Value) {
        self.enqueue_status(200, body);
    }

    /// Enqueue a response with an explicit status code
    pub fn enqueue_status(&self, status: u16, body: Value) {
        self.script.lock().push_back(Scripted {
            delay: None,
            result: Ok(TransportResponse::new(status, body)),
        });
    }

    /// Enqueue a transport-level failure (connection refused, DNS, ...)
    pub fn enqueue_io_error(&self, message: impl Into<String>) {
        self.script.lock().push_back(Scripted {
            delay: None,
            result: Err(TransportError::Io(message.into())),
        });
    }

    /// Enqueue a response that stalls first; pair with a short gateway
    /// timeout to exercise the timeout-to-Network conversion
    pub fn enqueue_delayed(&self, delay: Duration, status: u16, body: Value) {
        self.script.lock().push_back(Scripted {
            delay: Some(delay),
            result: Ok(TransportResponse::new(status, body)),
        });
    }

    /// How many calls reached the transport
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request seen so far, in order
    #[must_use]
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }

    /// The most recent request, if any
    #[must_use]
    pub fn last_request(&self) -> Option<TransportRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request);

        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(Scripted { delay, result }) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                result
            }
            None => Err(TransportError::Io("mock script exhausted".into())),
        }
    }
}

/// Canonical wire body for a task, stamped now
#[must_use]
pub fn task_body(id: &str, status: Status) -> Value {
    json!({
        "id": id,
        "status": status.as_str(),
        "updatedAt": Utc::now().to_rfc3339(),
    })
}

/// Wire body for a task with extra payload fields
#[must_use]
pub fn task_body_with(id: &str, status: Status, fields: &[(&str, Value)]) -> Value {
    let mut body = task_body(id, status);
    for (name, value) in fields {
        body[*name] = value.clone();
    }
    body
}

/// Wire body for a profile
#[must_use]
pub fn profile_body(id: &str, display_name: &str) -> Value {
    json!({
        "id": id,
        "displayName": display_name,
        "updatedAt": Utc::now().to_rfc3339(),
    })
}

/// Initialize test logging once; honors `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

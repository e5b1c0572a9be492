//! Gateway classification, auth, and normalization against a scripted
//! transport

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tether_gateway::{GatewayConfig, Method, RemoteGateway, Transport};
use tether_model::{EntityRef, ErrorKind, Patch, Status};
use tether_store::{EntityCache, EventBus, KvStore, MemoryKv, SessionStore};
use tether_test_utils::{profile_body, task_body, MockTransport};

struct Rig {
    transport: Arc<MockTransport>,
    session: Arc<SessionStore>,
    cache: Arc<EntityCache>,
    gateway: RemoteGateway,
}

fn rig(config: GatewayConfig) -> Rig {
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
    let cache = Arc::new(EntityCache::new(Arc::clone(&kv)));
    let session = Arc::new(SessionStore::new(
        kv,
        Arc::clone(&cache),
        EventBus::default(),
    ));
    let transport = Arc::new(MockTransport::new());
    let gateway = RemoteGateway::new(
        Arc::clone(&transport) as Arc<dyn Transport>,
        Arc::clone(&session),
        config,
    );
    Rig {
        transport,
        session,
        cache,
        gateway,
    }
}

#[tokio::test]
async fn fetch_attaches_token_and_routes() {
    let r = rig(GatewayConfig::default());
    r.session.set_token("bearer-abc").await;
    r.transport.enqueue_ok(task_body("7", Status::Pending));

    let entity = r.gateway.fetch(&EntityRef::task("7")).await.unwrap();
    assert_eq!(entity.status, Some(Status::Pending));

    let request = r.transport.last_request().unwrap();
    assert_eq!(request.method, Method::Get);
    assert_eq!(request.path, "/api/tasks/7");
    assert_eq!(request.token.as_deref(), Some("bearer-abc"));
}

#[tokio::test]
async fn fetch_without_session_sends_no_token() {
    let r = rig(GatewayConfig::default());
    r.transport.enqueue_ok(task_body("7", Status::Pending));

    r.gateway.fetch(&EntityRef::task("7")).await.unwrap();
    assert_eq!(r.transport.last_request().unwrap().token, None);
}

#[tokio::test]
async fn unauthorized_clears_session_before_returning() {
    let r = rig(GatewayConfig::default());
    r.session.set_token("bearer-abc").await;
    r.transport
        .enqueue_status(401, json!({"message": "token expired"}));

    let err = r.gateway.fetch(&EntityRef::task("7")).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert!(!r.session.is_authenticated());
    assert!(r.cache.is_empty());
    assert!(err.to_string().contains("token expired"));
}

#[tokio::test]
async fn status_codes_map_onto_the_taxonomy() {
    let r = rig(GatewayConfig::default());
    let reference = EntityRef::task("7");

    let cases: [(u16, ErrorKind); 4] = [
        (404, ErrorKind::NotFound),
        (409, ErrorKind::Conflict),
        (500, ErrorKind::ServerError),
        (418, ErrorKind::Unknown),
    ];
    for (status, expected) in cases {
        r.transport.enqueue_status(status, json!({}));
        let err = r.gateway.fetch(&reference).await.unwrap_err();
        assert_eq!(err.kind(), expected, "status {status}");
    }
}

#[tokio::test]
async fn server_error_message_survives_intact() {
    let r = rig(GatewayConfig::default());
    r.transport
        .enqueue_status(503, json!({"message": "maintenance window until 04:00"}));

    let err = r.gateway.fetch(&EntityRef::task("7")).await.unwrap_err();
    assert_eq!(err.to_string(), "server error: maintenance window until 04:00");
}

#[tokio::test]
async fn validation_carries_parsed_field_errors() {
    let r = rig(GatewayConfig::default());
    r.transport.enqueue_status(
        422,
        json!({
            "message": "2 fields rejected",
            "errors": [
                {"field": "title", "message": "required"},
                {"field": "due_date", "message": "must be in the future"},
            ],
        }),
    );

    let err = r
        .gateway
        .mutate(&EntityRef::task("7"), &Patch::new().field("title", ""))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    let fields: Vec<&str> = err.field_errors().iter().map(|f| f.field.as_str()).collect();
    assert_eq!(fields, vec!["title", "due_date"]);
}

#[tokio::test]
async fn mutate_sends_patch_with_wire_status() {
    let r = rig(GatewayConfig::default());
    r.transport.enqueue_ok(task_body("7", Status::Accepted));

    r.gateway
        .mutate(
            &EntityRef::task("7"),
            &Patch::new().field("title", "x").with_status(Status::Accepted),
        )
        .await
        .unwrap();

    let request = r.transport.last_request().unwrap();
    assert_eq!(request.method, Method::Patch);
    assert_eq!(request.path, "/api/tasks/7");
    let body = request.body.unwrap();
    assert_eq!(body["status"], "ACCEPTED");
    assert_eq!(body["title"], "x");
}

#[tokio::test]
async fn stall_converts_to_network_error() {
    let r = rig(GatewayConfig::default().with_write_timeout(Duration::from_millis(20)));
    r.transport.enqueue_delayed(
        Duration::from_millis(500),
        200,
        task_body("7", Status::Accepted),
    );

    let err = r
        .gateway
        .mutate(&EntityRef::task("7"), &Patch::new().field("a", 1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[tokio::test]
async fn io_failure_converts_to_network_error() {
    let r = rig(GatewayConfig::default());
    r.transport.enqueue_io_error("dns lookup failed");

    let err = r.gateway.fetch(&EntityRef::task("7")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(err.to_string().contains("dns lookup failed"));
}

#[tokio::test]
async fn profile_aliases_normalize_at_the_boundary() {
    let r = rig(GatewayConfig::default());
    let mut body = profile_body("u1", "Ada Lovelace");
    body["avatar"] = json!("https://cdn/ada.png");
    r.transport.enqueue_ok(body);

    let entity = r.gateway.fetch(&EntityRef::profile("u1")).await.unwrap();

    // multi-named wire fields arrive under one canonical name
    assert_eq!(entity.payload.get_str("display_name"), Some("Ada Lovelace"));
    assert_eq!(
        entity.payload.get_str("avatar_url"),
        Some("https://cdn/ada.png")
    );
    assert!(entity.payload.get("displayName").is_none());
    assert!(entity.payload.get("avatar").is_none());
}

#[tokio::test]
async fn custom_base_path_is_honored() {
    let r = rig(GatewayConfig::default().with_base_path("/v2"));
    r.transport.enqueue_ok(task_body("7", Status::Pending));

    r.gateway.fetch(&EntityRef::task("7")).await.unwrap();
    assert_eq!(r.transport.last_request().unwrap().path, "/v2/tasks/7");
}

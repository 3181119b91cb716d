//! End-to-end pipeline tests against a local mock API over real HTTP.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use console_gateway::config::{ApiConfig, TransportConfig};
use console_gateway::error::{PipelineError, TransportError, UnauthorizedSource};
use console_gateway::http::{AbortController, ApiClient, RequestDescriptor};
use console_gateway::session::{FileStore, Navigator, SessionStore, TeardownAndRedirect};
use console_gateway::HttpTransport;

mod common;

#[derive(Default)]
struct RecordingNavigator {
    visits: Mutex<Vec<String>>,
}

impl Navigator for RecordingNavigator {
    fn redirect_to_login(&self, return_path: &str) {
        self.visits.lock().unwrap().push(return_path.to_string());
    }
}

struct Harness {
    client: ApiClient,
    store: Arc<SessionStore>,
    navigator: Arc<RecordingNavigator>,
}

fn harness(addr: SocketAddr, store: SessionStore) -> Harness {
    let store = Arc::new(store);
    let navigator = Arc::new(RecordingNavigator::default());
    let api = ApiConfig {
        base_url: format!("http://{}/api", addr),
        ..ApiConfig::default()
    };
    let transport = HttpTransport::new(&TransportConfig::default()).unwrap();
    let client = ApiClient::builder(&api, transport)
        .session(store.clone())
        .on_session_expired(Arc::new(TeardownAndRedirect::new(store.clone(), navigator.clone())))
        .build()
        .unwrap();

    Harness {
        client,
        store,
        navigator,
    }
}

fn logged_in(token: &str) -> SessionStore {
    let store = SessionStore::in_memory();
    store.login(token, None).unwrap();
    store
}

#[tokio::test]
async fn test_bearer_and_request_id_reach_backend() {
    let (addr, log) = common::start_mock_backend(200, r#"{"code":0,"data":[]}"#).await;
    let h = harness(addr, logged_in("tok-42"));

    h.client.send(RequestDescriptor::get("/orders")).await.unwrap();

    let seen = log.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].header("authorization"), Some("Bearer tok-42"));
    assert!(seen[0].header("x-request-id").is_some_and(|v| !v.is_empty()));
    assert_eq!(seen[0].target, "/api/orders");
}

#[tokio::test]
async fn test_anonymous_request_has_no_authorization() {
    let (addr, log) = common::start_mock_backend(200, r#"{"code":0}"#).await;
    let h = harness(addr, SessionStore::in_memory());

    h.client.send(RequestDescriptor::get("/public/notice")).await.unwrap();
    assert_eq!(log.lock().unwrap()[0].header("authorization"), None);
}

#[tokio::test]
async fn test_get_query_is_cleaned_on_the_wire() {
    let (addr, log) = common::start_mock_backend(200, r#"{"code":0}"#).await;
    let h = harness(addr, SessionStore::in_memory());

    h.client
        .send(
            RequestDescriptor::get("/orders?status=paid,shipped&keyword=")
                .query("shop_id", Value::Null)
                .query("remark", "undefined")
                .query("page", 1),
        )
        .await
        .unwrap();

    let seen = log.lock().unwrap();
    assert_eq!(seen[0].method, "GET");
    assert_eq!(seen[0].target, "/api/orders?status=paid&status=shipped&page=1");
}

#[tokio::test]
async fn test_json_body_is_cleaned_on_the_wire() {
    let (addr, log) = common::start_mock_backend(200, r#"{"code":0,"data":{"id":9}}"#).await;
    let h = harness(addr, logged_in("t"));

    #[derive(Deserialize)]
    struct Created {
        id: u64,
    }

    let created: Created = h
        .client
        .send_json(RequestDescriptor::post("/goods").json(&json!({
            "name": "Oolong",
            "barcode": "",
            "category": null,
            "skus": [{"price": 10, "stock": null}]
        })))
        .await
        .unwrap();
    assert_eq!(created.id, 9);

    let seen = log.lock().unwrap();
    let body: Value = serde_json::from_str(&seen[0].body).unwrap();
    assert_eq!(body, json!({"name": "Oolong", "skus": [{"price": 10}]}));
    assert_eq!(seen[0].header("content-type"), Some("application/json"));
}

#[tokio::test]
async fn test_http_401_tears_down_persisted_session() {
    let (addr, _) = common::start_mock_backend(401, "").await;
    let path = std::env::temp_dir().join(format!("console-gateway-it-{}.json", std::process::id()));
    let backend = Arc::new(FileStore::open(&path).unwrap());
    let store = SessionStore::load(backend, "session").unwrap();
    store.login("expired-token", Some(1)).unwrap();

    let h = harness(addr, store);
    let err = h
        .client
        .send(RequestDescriptor::get("/orders").location("/orders?tab=refund"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Unauthorized(UnauthorizedSource::Status)));
    assert!(!h.store.snapshot().is_authenticated());
    assert_eq!(*h.navigator.visits.lock().unwrap(), vec!["/orders?tab=refund".to_string()]);

    let reopened = SessionStore::load(Arc::new(FileStore::open(&path).unwrap()), "session").unwrap();
    assert!(!reopened.snapshot().is_authenticated());
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_envelope_401_behaves_like_http_401() {
    let (addr, _) = common::start_mock_backend(200, r#"{"code":401,"message":"login expired"}"#).await;
    let h = harness(addr, logged_in("t"));

    let err = h.client.send(RequestDescriptor::get("/shop/info")).await.unwrap_err();

    assert!(matches!(err, PipelineError::Unauthorized(UnauthorizedSource::Envelope)));
    assert!(!h.store.snapshot().is_authenticated());
    assert_eq!(*h.navigator.visits.lock().unwrap(), vec!["/api/shop/info".to_string()]);
}

#[tokio::test]
async fn test_application_error_keeps_session() {
    let (addr, _) = common::start_mock_backend(200, r#"{"code":1,"message":"stock insufficient"}"#).await;
    let h = harness(addr, logged_in("t"));

    let err = h
        .client
        .send_json::<Value>(RequestDescriptor::post("/orders").json(&json!({"sku": 3})))
        .await
        .unwrap_err();

    match err {
        PipelineError::Application { code, message } => {
            assert_eq!(code, 1);
            assert_eq!(message, "stock insufficient");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(h.store.snapshot().is_authenticated());
    assert!(h.navigator.visits.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_success_resolves_data() {
    let (addr, _) = common::start_mock_backend(200, r#"{"code":0,"message":"ok","data":{"foo":1}}"#).await;
    let h = harness(addr, logged_in("t"));

    let data: Value = h.client.send_json(RequestDescriptor::get("/foo")).await.unwrap();
    assert_eq!(data["foo"], 1);
}

#[tokio::test]
async fn test_non_envelope_error_status() {
    let (addr, _) = common::start_mock_backend(502, "upstream down").await;
    let h = harness(addr, logged_in("t"));

    let err = h.client.send(RequestDescriptor::get("/orders")).await.unwrap_err();
    assert!(matches!(err, PipelineError::Status { status } if status.as_u16() == 502));
    assert!(h.store.snapshot().is_authenticated());
}

#[tokio::test]
async fn test_success_status_without_envelope_rejects() {
    for body in ["<html>maintenance</html>", "{}", ""] {
        let (addr, _) = common::start_mock_backend(200, body).await;
        let h = harness(addr, logged_in("t"));

        let err = h.client.send(RequestDescriptor::get("/orders")).await.unwrap_err();
        assert!(
            matches!(err, PipelineError::Malformed { status } if status.as_u16() == 200),
            "body {:?} resolved as {:?}",
            body,
            err
        );
        assert!(h.store.snapshot().is_authenticated());
    }
}

#[tokio::test]
async fn test_string_code_envelope_is_application_error() {
    let (addr, _) = common::start_mock_backend(200, r#"{"code":"1","message":"stock insufficient"}"#).await;
    let h = harness(addr, logged_in("t"));

    let err = h.client.send(RequestDescriptor::get("/orders")).await.unwrap_err();
    assert!(matches!(err, PipelineError::Application { code: 1, ref message } if message == "stock insufficient"));
}

#[tokio::test]
async fn test_success_code_on_server_error_rejects() {
    let (addr, _) = common::start_mock_backend(500, r#"{"code":0,"data":{"foo":1}}"#).await;
    let h = harness(addr, logged_in("t"));

    let err = h.client.send(RequestDescriptor::get("/foo")).await.unwrap_err();
    assert!(matches!(err, PipelineError::Status { status } if status.as_u16() == 500));
}

#[tokio::test]
async fn test_abort_slow_backend_without_teardown() {
    let (addr, log) = common::start_programmable_backend(|_req| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        (200, r#"{"code":0}"#.to_string())
    })
    .await;
    let h = harness(addr, logged_in("t"));
    let controller = AbortController::new();

    let client = Arc::new(h.client);
    let call = tokio::spawn({
        let client = client.clone();
        let descriptor = RequestDescriptor::get("/reports/export").abort_signal(controller.signal());
        async move { client.send(descriptor).await }
    });

    // Wait until the backend has the request in hand.
    for _ in 0..100 {
        if !log.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    controller.abort();

    let err = tokio::time::timeout(Duration::from_secs(2), call)
        .await
        .expect("aborted call should settle quickly")
        .unwrap()
        .unwrap_err();

    assert!(matches!(err, PipelineError::Transport(TransportError::Aborted)));
    assert!(h.store.snapshot().is_authenticated());
    assert!(h.navigator.visits.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let h = harness(addr, logged_in("t"));

    let err = h.client.send(RequestDescriptor::get("/orders")).await.unwrap_err();
    assert!(matches!(err, PipelineError::Transport(TransportError::Connect(_))));
    assert!(h.store.snapshot().is_authenticated());
}

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use mcp_hub::{
    adapters::http_backend::HttpDiscoveryBackend,
    app::discovery::{DiscoveryBackend, DiscoveryClient, DiscoveryError},
    domain::connection::{ConnectionDescriptor, Transport},
    shared::types::DiscoveryRequest,
};
use parking_lot::Mutex;
use reqwest::Url;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct Seen(Arc<Mutex<Vec<Value>>>);

async fn tools_handler(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
    seen.0.lock().push(body);
    Json(json!({
        "success": true,
        "tools": [{
            "name": "search",
            "description": "Full text search",
            "inputSchema": {
                "properties": {"query": {"type": "string"}, "limit": {"type": "integer"}},
                "required": ["query"]
            }
        }]
    }))
}

async fn broken_handler() -> impl IntoResponse {
    (StatusCode::BAD_GATEWAY, "upstream exploded")
}

async fn garbage_handler() -> impl IntoResponse {
    (StatusCode::OK, "<html>definitely not json</html>")
}

async fn spawn_backend() -> (Url, Seen) {
    let seen = Seen::default();
    let app = Router::new()
        .route("/api/mcp/discover", post(tools_handler))
        .route("/broken", post(broken_handler))
        .route("/garbage", post(garbage_handler))
        .with_state(seen.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (Url::parse(&format!("http://{addr}")).unwrap(), seen)
}

fn remote() -> ConnectionDescriptor {
    ConnectionDescriptor::remote(Transport::sse(), "http://localhost:3001/sse")
}

#[tokio::test]
async fn posts_the_request_and_normalizes_tools() {
    let (base, seen) = spawn_backend().await;
    let backend = HttpDiscoveryBackend::new(base.join("/api/mcp/discover").unwrap());
    let client = DiscoveryClient::new(backend);

    let tools = client.discover_tools(&remote()).await;

    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].parameter_summary(), "query*, limit");
    let bodies = seen.0.lock().clone();
    assert_eq!(
        bodies,
        vec![json!({"url": "http://localhost:3001/sse", "protocol": "sse"})]
    );
}

#[tokio::test]
async fn non_success_status_is_a_transport_failure() {
    let (base, _) = spawn_backend().await;
    let backend = HttpDiscoveryBackend::new(base.join("/broken").unwrap());

    let err = backend
        .discover(&DiscoveryRequest {
            url: "http://localhost:3001/sse".into(),
            protocol: "sse".into(),
            ..DiscoveryRequest::default()
        })
        .await
        .unwrap_err();

    match err {
        DiscoveryError::TransportFailure(message) => {
            assert!(message.contains("502"), "{message}");
            assert!(message.contains("upstream exploded"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let (base, _) = spawn_backend().await;
    let client = DiscoveryClient::new(HttpDiscoveryBackend::new(base.join("/garbage").unwrap()));

    let err = client.try_discover_tools(&remote()).await.unwrap_err();

    assert!(matches!(err, DiscoveryError::MalformedResponse(_)));
    assert!(err.is_transport_failure());
    assert!(client.discover_tools(&remote()).await.is_empty());
}

#[tokio::test]
async fn unreachable_backend_yields_nothing() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = DiscoveryClient::new(HttpDiscoveryBackend::new(
        Url::parse(&format!("http://{addr}/api/mcp/discover")).unwrap(),
    ));

    let err = client.try_discover_tools(&remote()).await.unwrap_err();

    assert_eq!(err.kind(), "transport_failure");
}

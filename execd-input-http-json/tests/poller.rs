//! End-to-end tests against a local HTTP server.

use std::future::pending;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use execd_bridge_framework::{BridgeError, BridgeRunner, StopReason};
use execd_input_http_json::config::HttpConfig;
use execd_input_http_json::poller::producer;
use serde_json::{Value, json};

async fn status(State(hits): State<Arc<AtomicU64>>) -> Json<Value> {
    hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "mode": 2, "unused": null }))
}

async fn power(State(hits): State<Arc<AtomicU64>>) -> Json<Value> {
    hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "power": 1200 }))
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Start a server on a random port and return its address and request count.
async fn start_server() -> (SocketAddr, Arc<AtomicU64>) {
    let hits = Arc::new(AtomicU64::new(0));
    let app = Router::new()
        .route("/api/v1/status", get(status))
        .route("/api/v1/power", get(power))
        .route("/broken", get(broken))
        .with_state(hits.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, hits)
}

fn config(addr: SocketAddr, paths: &[&str]) -> HttpConfig {
    let mut config = HttpConfig {
        urls: paths.iter().map(|p| format!("http://{}{}", addr, p)).collect(),
        measurement: "azrouter".to_string(),
        timeout_secs: 5,
        ..Default::default()
    };
    config.tags.insert("location".to_string(), "garage".to_string());
    config
}

#[tokio::test]
async fn test_one_round_of_requests_per_trigger() {
    let (addr, hits) = start_server().await;
    let producer = producer(config(addr, &["/api/v1/status", "/api/v1/power"]));
    let input: &[u8] = b"\n\n";
    let mut runner = BridgeRunner::new("http-json", producer, input, Vec::new());

    let summary = runner.run_until(pending()).await.unwrap();

    assert_eq!(summary.reason, StopReason::InputClosed);
    assert_eq!(summary.lines, 2);
    assert_eq!(hits.load(Ordering::SeqCst), 4);
    assert_eq!(
        String::from_utf8_lossy(runner.writer()),
        "azrouter,location=garage mode=2i,power=1200i\n\
         azrouter,location=garage mode=2i,power=1200i\n"
    );
}

#[tokio::test]
async fn test_no_request_without_trigger() {
    let (addr, hits) = start_server().await;
    let producer = producer(config(addr, &["/api/v1/status"]));
    let input: &[u8] = b"";
    let mut runner = BridgeRunner::new("http-json", producer, input, Vec::new());

    runner.run_until(pending()).await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(runner.writer().is_empty());
}

#[tokio::test]
async fn test_server_error_fails_the_run() {
    let (addr, _hits) = start_server().await;
    let producer = producer(config(addr, &["/api/v1/status", "/broken"]));
    let input: &[u8] = b"\n\n";
    let mut runner = BridgeRunner::new("http-json", producer, input, Vec::new());

    let err = runner.run_until(pending()).await.unwrap_err();

    assert!(matches!(err, BridgeError::Producer(_)));
    assert!(err.to_string().contains("/broken"));
    assert!(runner.writer().is_empty());
}

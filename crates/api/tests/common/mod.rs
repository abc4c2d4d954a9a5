#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use wecode_api::config::{ServerConfig, StoreBackend};
use wecode_api::router::build_app_router;
use wecode_api::state::AppState;
use wecode_jobs::{JobStore, MemoryJobStore};

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as the only allowed origin (matching the
/// dev default) and the in-memory job store.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        store_backend: StoreBackend::Memory,
        redis_url: String::new(),
        job_queue: "code-queue".to_string(),
        ws_heartbeat_secs: 30,
        log_json: false,
    }
}

/// Application state over `store`, exposed so tests can play the worker.
pub fn test_state(store: Arc<MemoryJobStore>) -> AppState {
    let store: Arc<dyn JobStore> = store;
    AppState::new(test_config(), store)
}

/// Build the full application router, with all middleware layers, on a
/// fresh in-memory store.
pub fn build_test_app() -> Router {
    build_app_router(test_state(Arc::new(MemoryJobStore::new())))
}

/// Same as [`build_test_app`] but over the caller's store.
pub fn build_test_app_with_store(store: Arc<MemoryJobStore>) -> Router {
    build_app_router(test_state(store))
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

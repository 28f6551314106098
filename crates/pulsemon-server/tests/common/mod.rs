use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use std::sync::Arc;

use pulsemon_server::app::build_router;
use pulsemon_server::state::AppState;
use pulsemon_storage::memory::MemStorage;
use pulsemon_storage::MetricStorage;

/// Router over a fresh in-memory store; returns the storage handle so
/// tests can inspect state directly.
pub fn test_app() -> (Router, Arc<MemStorage>) {
    let storage = Arc::new(MemStorage::new());
    let app = build_router(AppState::new(storage.clone()));
    (app, storage)
}

/// Router whose state is customized by the caller.
pub fn test_app_with(
    configure: impl FnOnce(AppState) -> AppState,
) -> (Router, Arc<dyn MetricStorage>) {
    let storage: Arc<dyn MetricStorage> = Arc::new(MemStorage::new());
    let app = build_router(configure(AppState::new(storage.clone())));
    (app, storage)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "text/plain")
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: impl Into<Vec<u8>>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.into()))
        .unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_string(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

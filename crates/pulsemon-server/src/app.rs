use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::CompressionLevel;

use crate::handlers;
use crate::middleware::{request_logging, request_stats, sync_snapshot, verify_signature};
use crate::state::AppState;

/// Assembles the HTTP surface.
///
/// Layer order, outermost first: request logging → request stats →
/// signature verification (over the raw body, before any decompression)
/// → response compression → request decompression → handlers. The sync
/// snapshot layer wraps only the mutating routes and is attached only
/// when synchronous persistence is configured.
pub fn build_router(state: AppState) -> Router {
    let mut mutating = Router::new()
        .route("/update/{kind}/{id}/{value}", post(handlers::update_raw))
        .route("/update/", post(handlers::update_json))
        .route("/updates/", post(handlers::update_batch));
    if state.sync_snapshot_path.is_some() {
        mutating = mutating.route_layer(from_fn_with_state(state.clone(), sync_snapshot));
    }

    Router::new()
        .merge(mutating)
        .route("/value/{kind}/{id}", get(handlers::value_raw))
        .route("/value", post(handlers::value_json))
        .route("/value/", post(handlers::value_json))
        .route("/ping", get(handlers::ping))
        .route("/ping/", get(handlers::ping))
        .route("/", get(handlers::dashboard))
        .layer(RequestDecompressionLayer::new())
        .layer(CompressionLayer::new().quality(CompressionLevel::Fastest))
        .layer(from_fn_with_state(state.clone(), verify_signature))
        .layer(from_fn_with_state(state.clone(), request_stats))
        .layer(from_fn(request_logging))
        .with_state(state)
}

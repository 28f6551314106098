use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::time::Instant;

use pulsemon_common::sign;

use crate::durability;
use crate::state::AppState;

/// Logs every request with method, path, remote address, status, and
/// duration.
pub async fn request_logging(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let remote = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.to_string());
    let start = Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        remote = remote.as_deref().unwrap_or("-"),
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        "request completed"
    );
    response
}

/// Feeds the per-router request statistics.
pub async fn request_stats(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().to_string();
    let response = next.run(req).await;
    state.stats.record(&method, response.status().as_u16());
    response
}

/// Verifies the request-body signature when a key is configured and the
/// client sent one. The check covers the body bytes as received, before
/// any decompression, because the client signs what it actually sends.
pub async fn verify_signature(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(key) = state.key.as_deref() else {
        return next.run(req).await;
    };
    let Some(provided) = req
        .headers()
        .get(sign::SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
    else {
        return next.run(req).await;
    };

    let (parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "cannot read request body");
            return (StatusCode::BAD_REQUEST, "cannot read request body").into_response();
        }
    };

    if !sign::verify(key, &bytes, &provided) {
        tracing::error!("request signature mismatch");
        return (StatusCode::BAD_REQUEST, "signature mismatch").into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// Synchronous durability: after every successful mutation, rewrite the
/// snapshot file before the response is released. Attached only to the
/// mutating routes, and only when the store interval is zero and the
/// file backend is active.
pub async fn sync_snapshot(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let response = next.run(req).await;
    if response.status().is_success() {
        if let Some(path) = &state.sync_snapshot_path {
            if let Err(e) = durability::save_snapshot(state.storage.as_ref(), path).await {
                tracing::error!(error = %e, file = %path.display(), "cannot save snapshot");
            }
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::middleware::from_fn_with_state;
    use axum::routing::post;
    use axum::Router;
    use std::sync::Arc;
    use tower::ServiceExt;

    use pulsemon_storage::memory::MemStorage;

    async fn echo(body: axum::body::Bytes) -> Vec<u8> {
        body.to_vec()
    }

    fn signed_app(key: &str) -> Router {
        let state = AppState::new(Arc::new(MemStorage::new())).with_key(Some(key.to_string()));
        Router::new()
            .route("/echo", post(echo))
            .layer(from_fn_with_state(state.clone(), verify_signature))
            .with_state(state)
    }

    fn request(body: &[u8], signature: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().method("POST").uri("/echo");
        if let Some(signature) = signature {
            builder = builder.header(sign::SIGNATURE_HEADER, signature);
        }
        builder.body(Body::from(body.to_vec())).unwrap()
    }

    #[tokio::test]
    async fn valid_signature_passes_and_body_survives() {
        let app = signed_app("secret");
        let body = b"payload";
        let signature = sign::signature("secret", body);
        let response = app.oneshot(request(body, Some(&signature))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let echoed = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&echoed[..], body);
    }

    #[tokio::test]
    async fn tampered_signature_is_rejected() {
        let app = signed_app("secret");
        let body = b"payload";
        let mut signature = sign::signature("secret", body);
        signature.replace_range(0..1, if signature.starts_with('0') { "1" } else { "0" });
        let response = app.oneshot(request(body, Some(&signature))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unsigned_request_passes_through() {
        let app = signed_app("secret");
        let response = app.oneshot(request(b"payload", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn no_key_disables_verification() {
        let state = AppState::new(Arc::new(MemStorage::new()));
        let app = Router::new()
            .route("/echo", post(echo))
            .layer(from_fn_with_state(state.clone(), verify_signature))
            .with_state(state);
        let response = app
            .oneshot(request(b"payload", Some("not-a-signature")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

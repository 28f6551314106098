mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use std::sync::Arc;
use tower::ServiceExt;

use pulsemon_common::types::{MetricKind, MetricValue};
use pulsemon_common::{compress, sign};
use pulsemon_server::app::build_router;
use pulsemon_server::durability;
use pulsemon_server::state::AppState;
use pulsemon_storage::memory::MemStorage;
use pulsemon_storage::relational::SqliteStorage;
use pulsemon_storage::MetricStorage;

use common::{body_bytes, body_string, get, post, post_json, test_app, test_app_with};

#[tokio::test]
async fn single_gauge_raw_update_then_read() {
    let (app, _storage) = test_app();

    let response = app
        .clone()
        .oneshot(post("/update/gauge/Alloc/3.14"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/value/gauge/Alloc")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "3.14");
}

#[tokio::test]
async fn counter_accumulates_over_raw_updates() {
    let (app, _storage) = test_app();

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(post("/update/counter/PollCount/1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.oneshot(get("/value/counter/PollCount")).await.unwrap();
    assert_eq!(body_string(response).await, "3");
}

#[tokio::test]
async fn batch_update_applies_gauges_and_counters() {
    let (app, storage) = test_app();

    let body = r#"[
        {"id":"g","type":"gauge","value":1.0},
        {"id":"c","type":"counter","delta":5},
        {"id":"c","type":"counter","delta":7}
    ]"#;
    let response = app.oneshot(post_json("/updates/", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(
        storage.get(MetricKind::Counter, "c").unwrap(),
        MetricValue::Counter(12)
    );
    assert_eq!(
        storage.get(MetricKind::Gauge, "g").unwrap(),
        MetricValue::Gauge(1.0)
    );
}

#[tokio::test]
async fn gzipped_request_body_is_inflated() {
    let (app, storage) = test_app();

    let body = compress::compress(br#"[{"id":"x","type":"gauge","value":2.5}]"#).unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/updates/")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_ENCODING, "gzip")
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        storage.get(MetricKind::Gauge, "x").unwrap(),
        MetricValue::Gauge(2.5)
    );
}

#[tokio::test]
async fn signed_batch_is_accepted_and_tampering_is_rejected() {
    let (app, _storage) = test_app_with(|state| state.with_key(Some("secret".to_string())));

    let body: &[u8] = br#"[{"id":"c","type":"counter","delta":5}]"#;
    let good = sign::signature("secret", body);

    let request = Request::builder()
        .method("POST")
        .uri("/updates/")
        .header(header::CONTENT_TYPE, "application/json")
        .header(sign::SIGNATURE_HEADER, &good)
        .body(Body::from(body))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut tampered = good.clone();
    tampered.replace_range(0..1, if good.starts_with('f') { "0" } else { "f" });
    let request = Request::builder()
        .method("POST")
        .uri("/updates/")
        .header(header::CONTENT_TYPE, "application/json")
        .header(sign::SIGNATURE_HEADER, &tampered)
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn signature_covers_the_compressed_bytes() {
    let (app, storage) = test_app_with(|state| state.with_key(Some("secret".to_string())));

    let compressed = compress::compress(br#"[{"id":"z","type":"gauge","value":4.5}]"#).unwrap();
    let signature = sign::signature("secret", &compressed);
    let request = Request::builder()
        .method("POST")
        .uri("/updates/")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_ENCODING, "gzip")
        .header(sign::SIGNATURE_HEADER, &signature)
        .body(Body::from(compressed))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        storage.get(MetricKind::Gauge, "z").unwrap(),
        MetricValue::Gauge(4.5)
    );
}

#[tokio::test]
async fn sync_snapshot_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("metrics.dat");

    let storage = Arc::new(MemStorage::new());
    let app = build_router(
        AppState::new(storage.clone()).with_sync_snapshot(Some(path.clone())),
    );

    for uri in [
        "/update/gauge/g1/1.5",
        "/update/gauge/g2/2.5",
        "/update/gauge/g3/3.5",
        "/update/counter/c1/10",
        "/update/counter/c2/20",
    ] {
        let response = app.clone().oneshot(post(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // simulated restart: fresh storage restored from the snapshot file
    let restored = MemStorage::new();
    durability::restore(&restored, &path).await.unwrap();
    assert_eq!(restored.get_all().unwrap(), storage.get_all().unwrap());
}

#[tokio::test]
async fn raw_path_of_256_bytes_is_accepted_and_257_rejected() {
    let (app, _storage) = test_app();

    // "/update/counter/" + id + "/1"
    let id_256 = "a".repeat(256 - "/update/counter/".len() - "/1".len());
    let response = app
        .clone()
        .oneshot(post(&format!("/update/counter/{id_256}/1")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let id_257 = "a".repeat(257 - "/update/counter/".len() - "/1".len());
    let response = app
        .oneshot(post(&format!("/update/counter/{id_257}/1")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_raw_paths_are_not_found() {
    let (app, _storage) = test_app();

    for uri in ["/update/gauge/onlyname", "/update/gauge", "/update/gauge//1"] {
        let response = app.clone().oneshot(post(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "uri: {uri}");
    }
}

#[tokio::test]
async fn bad_kind_or_value_in_raw_update_is_bad_request() {
    let (app, _storage) = test_app();

    let response = app
        .clone()
        .oneshot(post("/update/histogram/x/1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(post("/update/gauge/x/not-a-number"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // counters take integers only
    let response = app
        .oneshot(post("/update/counter/x/3.14"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn json_update_validation_maps_to_status_codes() {
    let (app, _storage) = test_app();

    // empty name
    let response = app
        .clone()
        .oneshot(post_json("/update/", r#"{"id":"","type":"gauge","value":1.0}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // missing value for the declared kind
    let response = app
        .clone()
        .oneshot(post_json("/update/", r#"{"id":"c","type":"counter"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // body that is not an envelope at all
    let response = app
        .oneshot(post_json("/update/", "{not json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn json_update_answers_with_the_accumulated_counter() {
    let (app, _storage) = test_app();

    let response = app
        .clone()
        .oneshot(post_json("/update/", r#"{"id":"c","type":"counter","delta":1}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(post_json("/update/", r#"{"id":"c","type":"counter","delta":2}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let answer: serde_json::Value =
        serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(answer["id"], "c");
    assert_eq!(answer["type"], "counter");
    assert_eq!(answer["delta"], 3);
    assert!(answer.get("value").is_none());
}

#[tokio::test]
async fn json_value_query_returns_the_stored_value() {
    let (app, storage) = test_app();
    storage.update_gauge("Alloc", 7.25).unwrap();

    let response = app
        .clone()
        .oneshot(post_json("/value/", r#"{"id":"Alloc","type":"gauge"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let answer: serde_json::Value =
        serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(answer["value"], 7.25);

    let response = app
        .oneshot(post_json("/value/", r#"{"id":"missing","type":"gauge"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_metric_reads_are_not_found() {
    let (app, _storage) = test_app();

    let response = app
        .clone()
        .oneshot(get("/value/gauge/missing"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(get("/value/histogram/x")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ping_succeeds_on_a_healthy_store() {
    let (app, _storage) = test_app();
    let response = app.clone().oneshot(get("/ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.oneshot(get("/ping/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn dashboard_lists_current_values_as_html() {
    let (app, storage) = test_app();
    storage.update_gauge("Alloc", 3.5).unwrap();
    storage.add_counter("PollCount", 4).unwrap();

    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/html"));
    let page = body_string(response).await;
    assert!(page.contains("Alloc"));
    assert!(page.contains("PollCount"));
}

#[tokio::test]
async fn responses_negotiate_gzip() {
    let (app, storage) = test_app();
    storage.update_gauge("Alloc", 1.0).unwrap();

    let request = Request::builder()
        .method("GET")
        .uri("/")
        .header(header::ACCEPT_ENCODING, "gzip")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok()),
        Some("gzip")
    );
    let page = compress::decompress(&body_bytes(response).await).unwrap();
    assert!(String::from_utf8(page).unwrap().contains("Metrics Table"));
}

#[tokio::test]
async fn relational_backend_serves_the_same_surface() {
    let dir = tempfile::TempDir::new().unwrap();
    let storage = Arc::new(SqliteStorage::open(dir.path().join("metrics.db")).unwrap());
    let app = build_router(AppState::new(storage.clone()));

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(post("/update/counter/hits/5"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app
        .clone()
        .oneshot(post("/update/gauge/load/0.75"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(get("/value/counter/hits")).await.unwrap();
    assert_eq!(body_string(response).await, "10");
    let response = app.oneshot(get("/value/gauge/load")).await.unwrap();
    assert_eq!(body_string(response).await, "0.75");
}

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use std::fmt::Write;
use std::time::Duration;
use tokio::time::timeout;

use pulsemon_common::types::{Metric, MetricEnvelope, MetricKind, MetricValue};
use pulsemon_storage::retry::with_retry;
use pulsemon_storage::{AllMetrics, StorageError};

use crate::state::AppState;

/// Raw-URL updates longer than this are rejected outright.
const MAX_RAW_PATH_LEN: usize = 256;

const UPDATE_DEADLINE: Duration = Duration::from_secs(1);
const BATCH_DEADLINE: Duration = Duration::from_secs(3);
const PING_DEADLINE: Duration = Duration::from_secs(3);

/// Runs a retry-wrapped storage operation under a deadline.
async fn run_storage<T, F>(deadline: Duration, op: F) -> Result<T, StorageError>
where
    F: FnMut() -> Result<T, StorageError>,
{
    match timeout(deadline, with_retry(op)).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::Timeout),
    }
}

/// `POST /update/<kind>/<id>/<value>`
pub async fn update_raw(
    State(state): State<AppState>,
    uri: Uri,
    Path((kind, id, raw)): Path<(String, String, String)>,
) -> Response {
    if uri.path().len() > MAX_RAW_PATH_LEN {
        tracing::error!(length = uri.path().len(), "query string too long");
        return (StatusCode::BAD_REQUEST, "query string too long").into_response();
    }
    let kind = match kind.parse::<MetricKind>() {
        Ok(kind) => kind,
        Err(e) => {
            tracing::error!(error = %e, "invalid type in update query");
            return (StatusCode::BAD_REQUEST, "invalid type or value").into_response();
        }
    };
    if id.is_empty() {
        return (StatusCode::NOT_FOUND, "metric name not found").into_response();
    }

    let result = match kind {
        MetricKind::Gauge => match raw.parse::<f64>() {
            Ok(value) => {
                run_storage(UPDATE_DEADLINE, || state.storage.update_gauge(&id, value)).await
            }
            Err(_) => {
                tracing::error!(value = %raw, "gauge value parsing error");
                return (StatusCode::BAD_REQUEST, "the value is not of the specified type")
                    .into_response();
            }
        },
        MetricKind::Counter => match raw.parse::<i64>() {
            Ok(delta) => {
                run_storage(UPDATE_DEADLINE, || state.storage.add_counter(&id, delta)).await
            }
            Err(_) => {
                tracing::error!(value = %raw, "counter value parsing error");
                return (StatusCode::BAD_REQUEST, "the value is not of the specified type")
                    .into_response();
            }
        },
    };

    match result {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            tracing::error!(%kind, id = %id, error = %e, "metric update error");
            (StatusCode::INTERNAL_SERVER_ERROR, "metric update error").into_response()
        }
    }
}

/// `POST /update/` — one JSON envelope; responds with the envelope as
/// stored, so counters report the accumulated total.
pub async fn update_json(State(state): State<AppState>, body: Bytes) -> Response {
    let envelope: MetricEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::error!(error = %e, "cannot decode update request");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };
    if envelope.id.is_empty() {
        tracing::error!("metric name not found in update request");
        return (StatusCode::NOT_FOUND, "metric name not found").into_response();
    }
    let metric = match envelope.into_metric() {
        Ok(metric) => metric,
        Err(e) => {
            tracing::error!(error = %e, "cannot update metric");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let updated = match metric.value {
        MetricValue::Gauge(value) => {
            run_storage(UPDATE_DEADLINE, || state.storage.update_gauge(&metric.id, value)).await
        }
        MetricValue::Counter(delta) => {
            run_storage(UPDATE_DEADLINE, || state.storage.add_counter(&metric.id, delta)).await
        }
    };
    if let Err(e) = updated {
        tracing::error!(id = %metric.id, error = %e, "metric update error");
        return (StatusCode::INTERNAL_SERVER_ERROR, "metric update error").into_response();
    }

    match run_storage(UPDATE_DEADLINE, || state.storage.get(metric.kind(), &metric.id)).await {
        Ok(value) => Json(Metric {
            id: metric.id,
            value,
        })
        .into_response(),
        Err(e) => {
            tracing::error!(id = %metric.id, error = %e, "get metric from storage error");
            (StatusCode::INTERNAL_SERVER_ERROR, "get metric from storage error").into_response()
        }
    }
}

/// `POST /updates/` — JSON array applied as one batched update: gauges
/// first, then counters, preserving array order within each kind.
pub async fn update_batch(State(state): State<AppState>, body: Bytes) -> Response {
    let envelopes: Vec<MetricEnvelope> = match serde_json::from_slice(&body) {
        Ok(envelopes) => envelopes,
        Err(e) => {
            tracing::error!(error = %e, "cannot decode batch update request");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let mut gauges = Vec::new();
    let mut counters = Vec::new();
    for envelope in envelopes {
        match envelope.into_metric() {
            Ok(metric) => match metric.value {
                MetricValue::Gauge(value) => gauges.push((metric.id, value)),
                MetricValue::Counter(delta) => counters.push((metric.id, delta)),
            },
            Err(e) => {
                tracing::error!(error = %e, "invalid metric in batch");
                return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
            }
        }
    }
    tracing::debug!(gauges = gauges.len(), counters = counters.len(), "batch update");

    if let Err(e) = run_storage(BATCH_DEADLINE, || state.storage.update_batch_gauge(&gauges)).await
    {
        tracing::error!(error = %e, "updating gauge batch");
        return (StatusCode::INTERNAL_SERVER_ERROR, "batch update error").into_response();
    }
    if let Err(e) =
        run_storage(BATCH_DEADLINE, || state.storage.add_batch_counter(&counters)).await
    {
        tracing::error!(error = %e, "updating counter batch");
        return (StatusCode::INTERNAL_SERVER_ERROR, "batch update error").into_response();
    }
    StatusCode::OK.into_response()
}

/// `GET /value/<kind>/<id>` — current value as plain text.
pub async fn value_raw(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> Response {
    let Ok(kind) = kind.parse::<MetricKind>() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match run_storage(UPDATE_DEADLINE, || state.storage.get(kind, &id)).await {
        Ok(value) => value.to_string().into_response(),
        Err(e) => {
            tracing::error!(%kind, id = %id, error = %e, "cannot get metric");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// `POST /value/` — envelope with `(id, kind)`; the response carries the
/// stored value in the matching field.
pub async fn value_json(State(state): State<AppState>, body: Bytes) -> Response {
    let envelope: MetricEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::error!(error = %e, "cannot decode value request");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };
    match run_storage(UPDATE_DEADLINE, || {
        state.storage.get(envelope.kind, &envelope.id)
    })
    .await
    {
        Ok(value) => Json(Metric {
            id: envelope.id,
            value,
        })
        .into_response(),
        Err(e) => {
            tracing::error!(kind = %envelope.kind, id = %envelope.id, error = %e, "cannot get metric");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// `GET /` — HTML table of every current value.
pub async fn dashboard(State(state): State<AppState>) -> Response {
    let all = run_storage(UPDATE_DEADLINE, || state.storage.get_all())
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "cannot read metrics for the dashboard");
            AllMetrics::default()
        });
    Html(render_dashboard(&all)).into_response()
}

/// `GET /ping` — succeeds iff storage answers within the deadline.
pub async fn ping(State(state): State<AppState>) -> Response {
    match run_storage(PING_DEADLINE, || state.storage.ping()).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "storage ping failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn render_dashboard(all: &AllMetrics) -> String {
    let mut page = String::from(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Metrics Table</title>
    <style>
        body { font-family: Arial, sans-serif; margin: 40px; }
        table { width: 70%; margin: 0 auto; border-collapse: collapse; }
        th, td { padding: 12px; text-align: left; border-bottom: 1px solid #ddd; }
        th { background-color: #4CAF50; color: white; }
    </style>
</head>
<body>
    <h2 style="text-align:center;">Metrics Table</h2>
    <table>
        <thead>
            <tr><th>Metric Name</th><th>Metric Value</th></tr>
        </thead>
        <tbody>
"#,
    );
    for (id, value) in &all.gauges {
        let _ = writeln!(page, "            <tr><td>{id}</td><td>{value}</td></tr>");
    }
    for (id, delta) in &all.counters {
        let _ = writeln!(page, "            <tr><td>{id}</td><td>{delta}</td></tr>");
    }
    page.push_str(
        r#"        </tbody>
    </table>
</body>
</html>
"#,
    );
    page
}

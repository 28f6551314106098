use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use pulsemon_storage::MetricStorage;

/// How many requests between stats log lines.
pub const STATS_LOG_INTERVAL: u64 = 10;

#[derive(Debug, Default)]
struct StatsInner {
    counter: u64,
    by_method: HashMap<String, u64>,
    by_status: HashMap<u16, u64>,
}

/// Per-router request statistics, populated by the stats middleware.
/// Owned by the application state rather than living as a process-wide
/// singleton.
#[derive(Debug)]
pub struct RequestStats {
    inner: Mutex<StatsInner>,
    log_interval: u64,
}

impl RequestStats {
    pub fn new(log_interval: u64) -> Self {
        Self {
            inner: Mutex::new(StatsInner::default()),
            log_interval: log_interval.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StatsInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, method: &str, status: u16) {
        let mut inner = self.lock();
        inner.counter += 1;
        *inner.by_method.entry(method.to_string()).or_insert(0) += 1;
        *inner.by_status.entry(status).or_insert(0) += 1;
        if inner.counter % self.log_interval == 0 {
            tracing::info!(
                requests = inner.counter,
                methods = ?inner.by_method,
                statuses = ?inner.by_status,
                "request stats"
            );
        }
    }

    pub fn request_count(&self) -> u64 {
        self.lock().counter
    }
}

/// Shared application state threaded through the router.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn MetricStorage>,
    pub stats: Arc<RequestStats>,
    /// Request verification key; `None` disables signature checks.
    pub key: Option<String>,
    /// Set only in synchronous-snapshot mode: every successful mutation
    /// rewrites this file.
    pub sync_snapshot_path: Option<PathBuf>,
}

impl AppState {
    pub fn new(storage: Arc<dyn MetricStorage>) -> Self {
        Self {
            storage,
            stats: Arc::new(RequestStats::new(STATS_LOG_INTERVAL)),
            key: None,
            sync_snapshot_path: None,
        }
    }

    pub fn with_key(mut self, key: Option<String>) -> Self {
        self.key = key;
        self
    }

    pub fn with_sync_snapshot(mut self, path: Option<PathBuf>) -> Self {
        self.sync_snapshot_path = path;
        self
    }
}

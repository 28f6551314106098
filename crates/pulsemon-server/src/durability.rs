use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, timeout};

use pulsemon_storage::retry::with_retry;
use pulsemon_storage::{AllMetrics, MetricStorage};

/// Deadline for the clear/read/write steps of snapshot handling.
const SNAPSHOT_DEADLINE: Duration = Duration::from_secs(3);

/// On-disk snapshot: every current value plus the moment it was taken.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub metrics: AllMetrics,
}

/// Writes the current state to `path`, truncating any previous snapshot.
pub async fn save_snapshot(storage: &dyn MetricStorage, path: &Path) -> anyhow::Result<()> {
    let metrics = timeout(SNAPSHOT_DEADLINE, with_retry(|| storage.get_all()))
        .await
        .context("reading metrics for the snapshot timed out")??;
    let snapshot = Snapshot {
        timestamp: Utc::now(),
        metrics,
    };
    let data = serde_json::to_vec_pretty(&snapshot)?;

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o666);
    }
    let mut file = options
        .open(path)
        .with_context(|| format!("cannot open {} for writing", path.display()))?;
    file.write_all(&data)?;
    tracing::debug!(file = %path.display(), "snapshot written");
    Ok(())
}

/// Reads a snapshot written by [`save_snapshot`].
pub fn load_snapshot(path: &Path) -> anyhow::Result<Snapshot> {
    let data =
        std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_slice(&data).context("cannot decode snapshot")
}

/// Startup restore: clears the storage, then replays the snapshot file.
/// A missing or malformed file is reported as an error; the caller logs
/// it and continues with empty state.
pub async fn restore(storage: &dyn MetricStorage, path: &Path) -> anyhow::Result<()> {
    timeout(SNAPSHOT_DEADLINE, with_retry(|| storage.clear()))
        .await
        .context("clearing storage before restore timed out")??;

    let snapshot = load_snapshot(path)?;
    for (id, value) in &snapshot.metrics.gauges {
        with_retry(|| storage.update_gauge(id, *value))
            .await
            .with_context(|| format!("restoring gauge {id}"))?;
    }
    for (id, delta) in &snapshot.metrics.counters {
        with_retry(|| storage.add_counter(id, *delta))
            .await
            .with_context(|| format!("restoring counter {id}"))?;
    }
    tracing::info!(
        origin = %snapshot.timestamp,
        gauges = snapshot.metrics.gauges.len(),
        counters = snapshot.metrics.counters.len(),
        "metrics restored from snapshot"
    );
    Ok(())
}

/// Periodic persistence: writes a snapshot every `every` until aborted.
pub async fn run_ticker(storage: Arc<dyn MetricStorage>, path: PathBuf, every: Duration) {
    let mut tick = interval(every);
    // the first tick fires immediately; skip it so writes follow the cadence
    tick.tick().await;
    loop {
        tick.tick().await;
        if let Err(e) = save_snapshot(storage.as_ref(), &path).await {
            tracing::error!(error = %e, file = %path.display(), "cannot save snapshot");
        }
    }
}

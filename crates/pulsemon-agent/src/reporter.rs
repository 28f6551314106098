use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval, sleep, Duration};

use pulsemon_common::types::Metric;

use crate::config::AgentConfig;
use crate::transport::Transport;

const JOB_QUEUE_CAPACITY: usize = 128;
const CHANNEL_STATS_PERIOD: Duration = Duration::from_millis(500);

struct Job {
    id: u64,
    metrics: Vec<Metric>,
}

struct JobResult {
    job_id: u64,
    worker_id: usize,
    outcome: anyhow::Result<()>,
}

/// Single-consumer mode: drains the metric channel on every report tick
/// and sends each drained batch in turn. Exits once the channel is
/// closed and empty.
pub async fn run_single(
    config: AgentConfig,
    transport: Transport,
    mut rx: mpsc::Receiver<Vec<Metric>>,
    metric_watch: mpsc::WeakSender<Vec<Metric>>,
) {
    spawn_channel_stats(metric_watch, None, None);

    let mut tick = interval(Duration::from_secs(config.report_interval_secs.max(1)));
    let mut report_counter: u64 = 0;
    loop {
        tick.tick().await;
        loop {
            match rx.try_recv() {
                Ok(metrics) => {
                    tracing::info!(report_counter, count = metrics.len(), "report");
                    if let Err(e) = transport.report(&metrics).await {
                        tracing::error!(error = %e, "sending metrics failed, sample dropped");
                    }
                }
                Err(mpsc::error::TryRecvError::Empty) => {
                    if rx.is_closed() {
                        tracing::info!("reporting stopped");
                        return;
                    }
                    break;
                }
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    tracing::info!("reporting stopped");
                    return;
                }
            }
        }
        report_counter += 1;
    }
}

/// Worker-pool mode: a dispatcher packs every drained batch into a job,
/// exactly `rate_limit` workers consume the jobs channel, and a
/// collector task logs the results. Closing the metric channel closes
/// jobs; workers exiting closes results; the collector then exits.
pub async fn run_pool(
    config: AgentConfig,
    transport: Transport,
    mut rx: mpsc::Receiver<Vec<Metric>>,
    metric_watch: mpsc::WeakSender<Vec<Metric>>,
) {
    tracing::info!(workers = config.rate_limit, "starting report dispatcher");
    let (jobs_tx, jobs_rx) = mpsc::channel::<Job>(JOB_QUEUE_CAPACITY);
    let (results_tx, results_rx) = mpsc::channel::<JobResult>(JOB_QUEUE_CAPACITY);
    let jobs_rx = Arc::new(Mutex::new(jobs_rx));

    spawn_channel_stats(
        metric_watch,
        Some(jobs_tx.downgrade()),
        Some(results_tx.downgrade()),
    );

    let mut workers = Vec::with_capacity(config.rate_limit);
    for worker_id in 1..=config.rate_limit {
        workers.push(tokio::spawn(worker(
            worker_id,
            config.clone(),
            transport.clone(),
            jobs_rx.clone(),
            results_tx.clone(),
        )));
    }
    drop(results_tx);

    let collector = tokio::spawn(collect_results(results_rx));

    let mut job_id: u64 = 0;
    while let Some(metrics) = rx.recv().await {
        if jobs_tx.send(Job { id: job_id, metrics }).await.is_err() {
            break;
        }
        job_id += 1;
    }
    tracing::info!("metric channel closed");
    drop(jobs_tx);

    for handle in workers {
        let _ = handle.await;
    }
    let _ = collector.await;
    tracing::info!("report dispatcher stopped");
}

async fn worker(
    worker_id: usize,
    config: AgentConfig,
    transport: Transport,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    results: mpsc::Sender<JobResult>,
) {
    tracing::info!(worker_id, "worker started");
    loop {
        let job = { jobs.lock().await.recv().await };
        let Some(job) = job else { break };
        tracing::debug!(job_id = job.id, worker_id, "job accepted");
        sleep(Duration::from_secs(config.report_interval_secs)).await;
        let outcome = transport.report(&job.metrics).await;
        let result = JobResult {
            job_id: job.id,
            worker_id,
            outcome,
        };
        if results.send(result).await.is_err() {
            break;
        }
    }
    tracing::info!(worker_id, "worker stopped");
}

async fn collect_results(mut results: mpsc::Receiver<JobResult>) {
    while let Some(result) = results.recv().await {
        match result.outcome {
            Ok(()) => {
                tracing::info!(job_id = result.job_id, worker_id = result.worker_id, "job done")
            }
            Err(e) => tracing::error!(
                job_id = result.job_id,
                worker_id = result.worker_id,
                error = %e,
                "job failed"
            ),
        }
    }
    tracing::info!("stopped collecting results");
}

/// Diagnostic task: logs channel occupancy every 500 ms and terminates
/// itself once every watched channel has closed.
fn spawn_channel_stats(
    metrics: mpsc::WeakSender<Vec<Metric>>,
    jobs: Option<mpsc::WeakSender<Job>>,
    results: Option<mpsc::WeakSender<JobResult>>,
) {
    tokio::spawn(async move {
        let mut tick = interval(CHANNEL_STATS_PERIOD);
        loop {
            tick.tick().await;
            let mut live = false;
            if let Some(ch) = metrics.upgrade() {
                live = true;
                tracing::debug!(
                    queued = ch.max_capacity() - ch.capacity(),
                    capacity = ch.max_capacity(),
                    "metric channel"
                );
            }
            if let Some(ch) = jobs.as_ref().and_then(|w| w.upgrade()) {
                live = true;
                tracing::debug!(
                    queued = ch.max_capacity() - ch.capacity(),
                    capacity = ch.max_capacity(),
                    "jobs channel"
                );
            }
            if let Some(ch) = results.as_ref().and_then(|w| w.upgrade()) {
                live = true;
                tracing::debug!(
                    queued = ch.max_capacity() - ch.capacity(),
                    capacity = ch.max_capacity(),
                    "results channel"
                );
            }
            if !live {
                break;
            }
        }
        tracing::debug!("channel stats task stopped");
    });
}

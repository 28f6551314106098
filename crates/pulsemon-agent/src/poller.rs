use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Duration};

use pulsemon_collector::cpu::CpuCollector;
use pulsemon_collector::memory::MemoryCollector;
use pulsemon_collector::random::RandomCollector;
use pulsemon_collector::runtime::RuntimeCollector;
use pulsemon_collector::Collector;
use pulsemon_common::types::Metric;

use crate::config::AgentConfig;

pub fn collectors() -> Vec<Box<dyn Collector>> {
    vec![
        Box::new(RuntimeCollector::new()),
        Box::new(MemoryCollector::new()),
        Box::new(CpuCollector::new()),
        Box::new(RandomCollector),
    ]
}

/// Builds one poll batch: the PollCount counter first, then everything
/// the collectors produce. A failing probe skips its metrics and logs;
/// the tick itself never fails.
pub fn collect_batch(poll_counter: i64, collectors: &mut [Box<dyn Collector>]) -> Vec<Metric> {
    let mut batch = vec![Metric::counter("PollCount", poll_counter)];
    for collector in collectors.iter_mut() {
        match collector.collect() {
            Ok(metrics) => batch.extend(metrics),
            Err(e) => {
                tracing::warn!(collector = collector.name(), error = %e, "collection failed")
            }
        }
    }
    batch
}

/// Samples metrics on every poll tick and pushes the batch into the
/// bounded channel. A full channel is logged at error level but the
/// batch is still pushed, blocking until the reporter drains. Dropping
/// the sender on exit closes the channel, which is the reporter's
/// termination signal.
pub async fn run(
    config: AgentConfig,
    tx: mpsc::Sender<Vec<Metric>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut collectors = collectors();
    let mut tick = interval(Duration::from_secs(config.poll_interval_secs.max(1)));
    let mut poll_counter: i64 = 0;

    loop {
        tokio::select! {
            _ = tick.tick() => {
                tracing::info!(poll_counter, "poll");
                let batch = collect_batch(poll_counter, &mut collectors);
                if tx.capacity() == 0 {
                    tracing::error!("metric channel is full");
                }
                if tx.send(batch).await.is_err() {
                    tracing::error!("metric channel closed, stopping poller");
                    break;
                }
                poll_counter += 1;
            }
            _ = shutdown.changed() => {
                tracing::info!("polling stopped");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsemon_common::types::MetricValue;

    #[test]
    fn poll_count_leads_the_batch_with_the_running_counter() {
        let mut collectors = collectors();
        for expected in [0, 1, 2] {
            let batch = collect_batch(expected, &mut collectors);
            assert_eq!(batch[0].id, "PollCount");
            assert_eq!(batch[0].value, MetricValue::Counter(expected));
        }
    }

    #[test]
    fn batch_contains_runtime_host_and_random_gauges() {
        let mut collectors = collectors();
        let batch = collect_batch(0, &mut collectors);
        let has = |name: &str| batch.iter().any(|m| m.id == name);
        assert!(has("Alloc"));
        assert!(has("TotalAlloc"));
        assert!(has("TotalMemory"));
        assert!(has("FreeMemory"));
        assert!(has("CPUutilization1"));
        assert!(has("RandomValue"));
    }
}

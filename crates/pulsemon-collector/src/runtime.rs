use crate::Collector;
use anyhow::Result;
use pulsemon_common::types::Metric;
use sysinfo::{Pid, ProcessesToUpdate, System};

/// The fixed set of runtime gauges reported on every poll, in emission
/// order. The server and dashboards key on these names.
pub const RUNTIME_GAUGES: [&str; 27] = [
    "Alloc",
    "BuckHashSys",
    "Frees",
    "GCCPUFraction",
    "GCSys",
    "HeapAlloc",
    "HeapIdle",
    "HeapInuse",
    "HeapObjects",
    "HeapReleased",
    "HeapSys",
    "LastGC",
    "Lookups",
    "MCacheInuse",
    "MCacheSys",
    "MSpanInuse",
    "MSpanSys",
    "Mallocs",
    "NextGC",
    "NumForcedGC",
    "NumGC",
    "OtherSys",
    "PauseTotalNs",
    "StackInuse",
    "StackSys",
    "Sys",
    "TotalAlloc",
];

/// Samples the agent's own process.
///
/// The heap and address-space figures come from the OS view of the
/// process (resident and virtual memory); `TotalAlloc` accumulates the
/// resident size across polls. Allocator internals the process cannot
/// observe from outside report zero.
pub struct RuntimeCollector {
    system: System,
    pid: Pid,
    cumulative_resident: f64,
}

impl RuntimeCollector {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            pid: Pid::from_u32(std::process::id()),
            cumulative_resident: 0.0,
        }
    }
}

impl Collector for RuntimeCollector {
    fn name(&self) -> &str {
        "runtime"
    }

    fn collect(&mut self) -> Result<Vec<Metric>> {
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        let process = self
            .system
            .process(self.pid)
            .ok_or_else(|| anyhow::anyhow!("own process {} is not visible", self.pid))?;

        let resident = process.memory() as f64;
        let virtual_mem = process.virtual_memory() as f64;
        let idle = (virtual_mem - resident).max(0.0);
        self.cumulative_resident += resident;

        let out = RUNTIME_GAUGES
            .iter()
            .map(|&name| {
                let value = match name {
                    "Alloc" | "HeapAlloc" | "HeapInuse" => resident,
                    "HeapSys" | "Sys" => virtual_mem,
                    "HeapIdle" => idle,
                    "TotalAlloc" => self.cumulative_resident,
                    _ => 0.0,
                };
                Metric::gauge(name, value)
            })
            .collect();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsemon_common::types::MetricValue;

    #[test]
    fn emits_every_runtime_gauge_in_order() {
        let mut collector = RuntimeCollector::new();
        let metrics = collector.collect().unwrap();
        assert_eq!(metrics.len(), RUNTIME_GAUGES.len());
        for (metric, name) in metrics.iter().zip(RUNTIME_GAUGES) {
            assert_eq!(metric.id, name);
            assert!(matches!(metric.value, MetricValue::Gauge(_)));
        }
    }

    #[test]
    fn total_alloc_is_monotonic() {
        let mut collector = RuntimeCollector::new();
        let first = collector.collect().unwrap();
        let second = collector.collect().unwrap();
        let total = |metrics: &[Metric]| {
            metrics
                .iter()
                .find(|m| m.id == "TotalAlloc")
                .map(|m| match m.value {
                    MetricValue::Gauge(v) => v,
                    MetricValue::Counter(d) => d as f64,
                })
                .unwrap()
        };
        assert!(total(&second) >= total(&first));
    }

    #[test]
    fn resident_memory_is_positive() {
        let mut collector = RuntimeCollector::new();
        let metrics = collector.collect().unwrap();
        let alloc = metrics.iter().find(|m| m.id == "Alloc").unwrap();
        assert!(matches!(alloc.value, MetricValue::Gauge(v) if v > 0.0));
    }
}

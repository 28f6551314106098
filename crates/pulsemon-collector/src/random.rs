use crate::Collector;
use anyhow::Result;
use pulsemon_common::types::Metric;

/// Emits the `RandomValue` gauge, a fresh sample in `[0, 1)` per poll.
pub struct RandomCollector;

impl Collector for RandomCollector {
    fn name(&self) -> &str {
        "random"
    }

    fn collect(&mut self) -> Result<Vec<Metric>> {
        Ok(vec![Metric::gauge("RandomValue", rand::random::<f64>())])
    }
}

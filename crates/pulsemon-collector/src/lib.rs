//! Metric collectors for the agent: process runtime statistics, host
//! memory, per-CPU utilization, and the random gauge.

pub mod cpu;
pub mod memory;
pub mod random;
pub mod runtime;

use anyhow::Result;
use pulsemon_common::types::Metric;

pub trait Collector: Send + Sync {
    fn name(&self) -> &str;
    fn collect(&mut self) -> Result<Vec<Metric>>;
}

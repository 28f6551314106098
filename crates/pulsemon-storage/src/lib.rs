//! Metric storage layer with two interchangeable backends behind one
//! contract: an in-memory map store ([`memory::MemStorage`]) and a
//! relational store ([`relational::SqliteStorage`]) that keeps an
//! append-only history and answers with the latest row per metric.

pub mod error;
pub mod memory;
pub mod relational;
pub mod retry;


use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use pulsemon_common::types::{MetricKind, MetricValue};

pub use error::StorageError;

/// The current value of every metric, one ordered mapping per kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllMetrics {
    pub gauges: BTreeMap<String, f64>,
    pub counters: BTreeMap<String, i64>,
}

/// The storage contract shared by both backends.
///
/// Implementations must be safe to share across threads (`Send + Sync`)
/// because concurrent requests hit storage in parallel. Batch operations
/// are atomic per backend; counter updates accumulate
/// (`new = previous + delta`, with `previous = 0` when absent).
pub trait MetricStorage: Send + Sync {
    /// Returns the current value of `(kind, id)`.
    fn get(&self, kind: MetricKind, id: &str) -> Result<MetricValue, StorageError>;

    /// Replaces the gauge `id` with `value`, creating it when absent.
    fn update_gauge(&self, id: &str, value: f64) -> Result<(), StorageError>;

    /// Adds `delta` to the counter `id`, creating it when absent.
    fn add_counter(&self, id: &str, delta: i64) -> Result<(), StorageError>;

    /// Applies a batch of gauge updates atomically, in order.
    fn update_batch_gauge(&self, batch: &[(String, f64)]) -> Result<(), StorageError>;

    /// Applies a batch of counter deltas atomically, in order.
    fn add_batch_counter(&self, batch: &[(String, i64)]) -> Result<(), StorageError>;

    /// Returns a consistent snapshot of every current value.
    fn get_all(&self) -> Result<AllMetrics, StorageError>;

    /// Removes every stored metric. Used before a snapshot restore.
    fn clear(&self) -> Result<(), StorageError>;

    /// Checks that the backend is reachable.
    fn ping(&self) -> Result<(), StorageError>;

    /// Releases backend resources.
    fn close(&self) -> Result<(), StorageError>;
}

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use pulsemon_common::types::{MetricKind, MetricValue};

use crate::{AllMetrics, MetricStorage, StorageError};

#[derive(Debug, Default)]
struct Inner {
    gauges: BTreeMap<String, f64>,
    counters: BTreeMap<String, i64>,
}

/// In-memory backend: two mappings guarded by one mutex.
///
/// Coarse but sufficient for the expected load; `close` clears the maps
/// and `ping` always succeeds.
#[derive(Debug, Default)]
pub struct MemStorage {
    inner: Mutex<Inner>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MetricStorage for MemStorage {
    fn get(&self, kind: MetricKind, id: &str) -> Result<MetricValue, StorageError> {
        let inner = self.lock();
        let not_found = || StorageError::NotFound {
            kind,
            id: id.to_string(),
        };
        match kind {
            MetricKind::Gauge => inner
                .gauges
                .get(id)
                .copied()
                .map(MetricValue::Gauge)
                .ok_or_else(not_found),
            MetricKind::Counter => inner
                .counters
                .get(id)
                .copied()
                .map(MetricValue::Counter)
                .ok_or_else(not_found),
        }
    }

    fn update_gauge(&self, id: &str, value: f64) -> Result<(), StorageError> {
        self.lock().gauges.insert(id.to_string(), value);
        Ok(())
    }

    fn add_counter(&self, id: &str, delta: i64) -> Result<(), StorageError> {
        let mut inner = self.lock();
        let current = inner.counters.entry(id.to_string()).or_insert(0);
        *current = current.wrapping_add(delta);
        Ok(())
    }

    fn update_batch_gauge(&self, batch: &[(String, f64)]) -> Result<(), StorageError> {
        let mut inner = self.lock();
        for (id, value) in batch {
            inner.gauges.insert(id.clone(), *value);
        }
        Ok(())
    }

    fn add_batch_counter(&self, batch: &[(String, i64)]) -> Result<(), StorageError> {
        let mut inner = self.lock();
        for (id, delta) in batch {
            let current = inner.counters.entry(id.clone()).or_insert(0);
            *current = current.wrapping_add(*delta);
        }
        Ok(())
    }

    fn get_all(&self) -> Result<AllMetrics, StorageError> {
        let inner = self.lock();
        Ok(AllMetrics {
            gauges: inner.gauges.clone(),
            counters: inner.counters.clone(),
        })
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut inner = self.lock();
        inner.gauges.clear();
        inner.counters.clear();
        Ok(())
    }

    fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn close(&self) -> Result<(), StorageError> {
        self.clear()
    }
}

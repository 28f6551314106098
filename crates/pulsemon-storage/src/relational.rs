use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use pulsemon_common::types::{MetricKind, MetricValue};

use crate::{AllMetrics, MetricStorage, StorageError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS gauges (
    metric_id TEXT NOT NULL,
    metric_value REAL NOT NULL,
    metric_timestamp INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_gauges_id_time ON gauges(metric_id, metric_timestamp);
CREATE TABLE IF NOT EXISTS counters (
    metric_id TEXT NOT NULL,
    metric_delta INTEGER NOT NULL,
    metric_timestamp INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_counters_id_time ON counters(metric_id, metric_timestamp);
";

/// Relational backend over SQLite.
///
/// Both tables are append-only: every update inserts a new timestamped
/// row and the current value is the row with the largest timestamp
/// (insertion order breaks ties). Counter updates read the current value
/// and insert the accumulated total inside one transaction; the mutex
/// serializes writers in addition to the transaction.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Opens (or creates) the database at `path` and prepares the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(1))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn now_micros() -> i64 {
        Utc::now().timestamp_micros()
    }

    fn latest_counter(conn: &Connection, id: &str) -> Result<Option<i64>, StorageError> {
        let delta = conn
            .prepare_cached(
                "SELECT metric_delta FROM counters WHERE metric_id = ?1
                 ORDER BY metric_timestamp DESC, rowid DESC LIMIT 1",
            )?
            .query_row([id], |row| row.get::<_, i64>(0))
            .optional()?;
        Ok(delta)
    }

    fn insert_counter(conn: &Connection, id: &str, delta: i64) -> Result<(), StorageError> {
        conn.prepare_cached(
            "INSERT INTO counters (metric_id, metric_delta, metric_timestamp) VALUES (?1, ?2, ?3)",
        )?
        .execute(rusqlite::params![id, delta, Self::now_micros()])?;
        Ok(())
    }

    fn insert_gauge(conn: &Connection, id: &str, value: f64) -> Result<(), StorageError> {
        conn.prepare_cached(
            "INSERT INTO gauges (metric_id, metric_value, metric_timestamp) VALUES (?1, ?2, ?3)",
        )?
        .execute(rusqlite::params![id, value, Self::now_micros()])?;
        Ok(())
    }

    fn accumulate_counter(conn: &Connection, id: &str, delta: i64) -> Result<(), StorageError> {
        let next = match Self::latest_counter(conn, id)? {
            Some(current) => current.wrapping_add(delta),
            None => delta,
        };
        Self::insert_counter(conn, id, next)
    }
}

impl MetricStorage for SqliteStorage {
    fn get(&self, kind: MetricKind, id: &str) -> Result<MetricValue, StorageError> {
        let conn = self.lock();
        let not_found = || StorageError::NotFound {
            kind,
            id: id.to_string(),
        };
        match kind {
            MetricKind::Gauge => {
                let value = conn
                    .prepare_cached(
                        "SELECT metric_value FROM gauges WHERE metric_id = ?1
                         ORDER BY metric_timestamp DESC, rowid DESC LIMIT 1",
                    )?
                    .query_row([id], |row| row.get::<_, f64>(0))
                    .optional()?;
                value.map(MetricValue::Gauge).ok_or_else(not_found)
            }
            MetricKind::Counter => Self::latest_counter(&conn, id)?
                .map(MetricValue::Counter)
                .ok_or_else(not_found),
        }
    }

    fn update_gauge(&self, id: &str, value: f64) -> Result<(), StorageError> {
        let conn = self.lock();
        Self::insert_gauge(&conn, id, value)
    }

    fn add_counter(&self, id: &str, delta: i64) -> Result<(), StorageError> {
        let conn = self.lock();
        let tx = conn.unchecked_transaction()?;
        Self::accumulate_counter(&tx, id, delta)?;
        tx.commit()?;
        Ok(())
    }

    fn update_batch_gauge(&self, batch: &[(String, f64)]) -> Result<(), StorageError> {
        let conn = self.lock();
        let tx = conn.unchecked_transaction()?;
        for (id, value) in batch {
            Self::insert_gauge(&tx, id, *value)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn add_batch_counter(&self, batch: &[(String, i64)]) -> Result<(), StorageError> {
        let conn = self.lock();
        let tx = conn.unchecked_transaction()?;
        for (id, delta) in batch {
            Self::accumulate_counter(&tx, id, *delta)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_all(&self) -> Result<AllMetrics, StorageError> {
        let conn = self.lock();
        let mut all = AllMetrics::default();

        // Latest row per id with the same tiebreak as `get`: equal
        // timestamps are possible within one batch transaction, so the
        // rowid decides.
        let mut stmt = conn.prepare_cached(
            "SELECT metric_id, metric_value FROM gauges AS g
             WHERE rowid = (
                 SELECT rowid FROM gauges WHERE metric_id = g.metric_id
                 ORDER BY metric_timestamp DESC, rowid DESC LIMIT 1
             )",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?;
        for row in rows {
            let (id, value) = row?;
            all.gauges.insert(id, value);
        }

        let mut stmt = conn.prepare_cached(
            "SELECT metric_id, metric_delta FROM counters AS c
             WHERE rowid = (
                 SELECT rowid FROM counters WHERE metric_id = c.metric_id
                 ORDER BY metric_timestamp DESC, rowid DESC LIMIT 1
             )",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (id, delta) = row?;
            all.counters.insert(id, delta);
        }

        Ok(all)
    }

    fn clear(&self) -> Result<(), StorageError> {
        let conn = self.lock();
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM gauges", [])?;
        tx.execute("DELETE FROM counters", [])?;
        tx.commit()?;
        Ok(())
    }

    fn ping(&self) -> Result<(), StorageError> {
        let conn = self.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    fn close(&self) -> Result<(), StorageError> {
        let conn = self.lock();
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }
}

use pulsemon_common::types::MetricKind;

/// Errors surfaced by the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested `(kind, id)` has never been stored.
    #[error("unknown metric: {kind} {id}")]
    NotFound { kind: MetricKind, id: String },

    /// An underlying SQLite error from the relational backend.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The operation did not finish within its deadline.
    #[error("storage operation timed out")]
    Timeout,
}

impl StorageError {
    /// Whether the error is worth retrying: lock contention and
    /// connection-level failures are; everything else fails immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy
                    | rusqlite::ErrorCode::DatabaseLocked
                    | rusqlite::ErrorCode::CannotOpen
            ),
            _ => false,
        }
    }
}

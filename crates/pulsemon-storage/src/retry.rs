use pulsemon_common::retry::{backoff_delay, MAX_ATTEMPTS};

use crate::StorageError;

/// Runs a storage operation up to three times, sleeping 1 s / 3 s between
/// attempts. Only errors classified transient by
/// [`StorageError::is_transient`] are retried; anything else fails
/// immediately.
pub async fn with_retry<T, F>(mut op: F) -> Result<T, StorageError>
where
    F: FnMut() -> Result<T, StorageError>,
{
    let mut attempt: u32 = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < MAX_ATTEMPTS => {
                tracing::warn!(attempt, error = %err, "transient storage error, retrying");
                tokio::time::sleep(backoff_delay(attempt)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

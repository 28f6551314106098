use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Attempts made before giving up, including the first one.
pub const MAX_ATTEMPTS: u32 = 3;

/// Sleep taken after the i-th failed attempt (0-based): 1 s, 3 s, 5 s.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(u64::from(2 * attempt + 1))
}

/// Runs an async operation up to [`MAX_ATTEMPTS`] times, sleeping
/// [`backoff_delay`] between attempts. Every error is considered worth
/// retrying; the last error is returned when the attempts are exhausted.
///
/// This is the wrapper for outbound HTTP requests. Storage operations use
/// their own wrapper, which consults the error classification first.
pub async fn with_backoff<T, E, F, Fut>(mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 < MAX_ATTEMPTS => {
                tracing::warn!(attempt, error = %err, "request failed, retrying");
                tokio::time::sleep(backoff_delay(attempt)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

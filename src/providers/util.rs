use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Retries an async operation with configurable attempts and delays
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay`: Pause between retry attempts
///
/// # Returns
/// Either the successful result or the error of the last attempt
pub async fn with_retry<F, Fut, T, E>(mut operation: F, retries: usize, delay: Duration) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, retries, err
                );
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
        }
    }
}

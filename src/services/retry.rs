use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Runs `op` up to `max_attempts` times, sleeping `attempt x base_delay`
/// between failures (1s, 2s, ... with the default delay). The last error is
/// returned once attempts are exhausted. Used for both AI call sites.
pub async fn with_retry<T, E, F, Fut>(
    max_attempts: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                log::warn!("Attempt {} failed: {}", attempt, err);
                if attempt >= max_attempts {
                    return Err(err);
                }
                tokio::time::sleep(base_delay * attempt).await;
            }
        }
    }
}

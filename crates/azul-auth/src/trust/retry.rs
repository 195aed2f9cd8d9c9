//! Bounded retry for discovery and JWKS fetches.
//!
//! Retries only on transport errors (connection failures, timeouts). A
//! response with any status code is returned to the caller as-is. There is
//! no state carried between calls: every fetch starts with the full budget.

use std::time::Duration;

/// Pause between attempts.
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Send a request, retrying up to `max_retries` times on transport errors.
///
/// The closure `f` is called at most `max_retries + 1` times.
pub(crate) async fn retry_send<F, Fut>(
    max_retries: u32,
    f: F,
) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    for attempt in 0..max_retries {
        match f().await {
            Ok(resp) => return Ok(resp),
            Err(e) => {
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries,
                    error = %e,
                    "trust material request failed, retrying"
                );
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }
    f().await
}

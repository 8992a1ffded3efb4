use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::FetchError;

/// Bounded retry for lookups that may race resource creation.
///
/// The first attempt is followed by at most `max_retries` retries. Retry
/// `n` (1-based) waits `n * delay_ms` milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            delay_ms: 250,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            delay_ms: delay.as_millis() as u64,
        }
    }

    pub fn delay_for(&self, retry: u32) -> Duration {
        Duration::from_millis(self.delay_ms.saturating_mul(u64::from(retry)))
    }
}

/// Invokes `fetch`, retrying while it fails with a not-found error.
///
/// Other errors are returned immediately. Once retries are exhausted the
/// final not-found error is returned unchanged.
pub async fn with_retry_on_404<T, F, Fut>(
    policy: &RetryPolicy,
    description: &str,
    mut fetch: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut retry = 0;

    loop {
        match fetch().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_not_found() && retry < policy.max_retries => {
                retry += 1;
                let delay = policy.delay_for(retry);
                debug!(
                    description,
                    retry,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "resource not found, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                if err.is_not_found() {
                    warn!(description, retries = retry, "giving up after repeated 404s");
                }
                return Err(err);
            }
        }
    }
}

//! Miscellaneous helper utilities.

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing_subscriber::{EnvFilter, fmt};

use crate::errors::{AppError, Result};

/// Initialize `tracing` subscriber with env-based filter.
///
/// If `RUST_LOG` is not set, defaults to `info` level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

/// Current wall-clock time as epoch milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Retry schedule for a fallible async operation.
///
/// `max_attempts` counts the initial attempt; attempt `k` (1-based) is
/// followed by a `k * base_delay` sleep before the next one, so the
/// backoff grows linearly.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay to wait after the given 1-based failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Drive `op` until it succeeds or the policy's attempt budget runs out,
/// sleeping per the policy between attempts. Returns the last error on
/// exhaustion.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;
    for attempt in 1..=policy.max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                last_err = Some(e);
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.delay_for(attempt)).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| AppError::Config("retry policy allows zero attempts".into())))
}

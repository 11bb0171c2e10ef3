use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

use crate::error::StoreError;

/// Bounded exponential backoff for acquiring the store's write lock.
///
/// Attempts are numbered from 1; after failed attempt `k` the caller sleeps
/// `base_delay_ms * factor^k` milliseconds. With the defaults that is
/// 10, 100, 1000 and 10000 ms between the five attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub factor: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, base_delay_ms: 1, factor: 10 }
    }
}

impl RetryPolicy {
    pub fn attempts(&self) -> u32 { self.max_attempts.max(1) }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        let ms = self.base_delay_ms.saturating_mul(self.factor.saturating_pow(attempt));
        Duration::from_millis(ms)
    }

    /// Sleeps between consecutive attempts, in order.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.attempts()).map(|a| self.delay_after(a)).collect()
    }
}

/// Runs `op` until it succeeds, fails with something other than
/// [`StoreError::Locked`], or the attempt budget is spent. The last lock
/// error is returned on exhaustion; there is no sleep after the final attempt.
pub fn retry_on_lock<T, F>(policy: &RetryPolicy, subject: &str, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Result<T, StoreError>,
{
    let attempts = policy.attempts();
    let mut attempt = 1;
    loop {
        match op() {
            Err(e) if e.is_locked() && attempt < attempts => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(subject, attempt, delay_ms = delay.as_millis() as u64, "store locked, backing off");
                thread::sleep(delay);
                attempt += 1;
            }
            Err(e) if e.is_locked() => {
                tracing::warn!(subject, attempts, "store lock retry budget exhausted");
                return Err(e);
            }
            other => return other,
        }
    }
}

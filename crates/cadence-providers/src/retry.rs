// SPDX-License-Identifier: GPL-3.0-or-later

use rand::Rng;
use tokio::time::{sleep, Duration};
use tracing::warn;

use crate::error::ProviderError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_factor: f64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay_secs: f64, max_delay_secs: f64, jitter_factor: f64) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_secs_f64(base_delay_secs),
            max_delay: Duration::from_secs_f64(max_delay_secs),
            jitter_factor,
        }
    }

    /// `delay = min(max_delay, base_delay^(attempt+1) + uniform(0, jitter))`,
    /// honoring a provider's `Retry-After` hint as a floor when present.
    fn delay_for_attempt(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let base = self.base_delay.as_secs_f64().powi(attempt as i32 + 1);
        let jitter = rand::thread_rng().gen_range(0.0..self.jitter_factor.max(f64::EPSILON));
        let exponential = Duration::from_secs_f64(base + jitter);
        let floored = match retry_after {
            Some(hint) => exponential.max(hint),
            None => exponential,
        };
        floored.min(self.max_delay)
    }

    /// Run `attempt` until it succeeds, exhausts retries, or fails with a
    /// non-retryable error. Sleeps between attempts using the policy above.
    pub async fn run<F, Fut, T>(&self, mut attempt: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ProviderError>>,
    {
        let mut last_error = None;
        for attempt_index in 0..=self.max_retries {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !error.is_retryable() || attempt_index == self.max_retries {
                        return Err(error);
                    }
                    let retry_after = match &error {
                        ProviderError::RateLimited(hint) => *hint,
                        _ => None,
                    };
                    let delay = self.delay_for_attempt(attempt_index, retry_after);
                    warn!(
                        target: "lyrics::retry",
                        attempt = attempt_index,
                        ?delay,
                        error = %error,
                        "retrying after provider failure"
                    );
                    last_error = Some(error);
                    sleep(delay).await;
                }
            }
        }
        Err(last_error.expect("loop always runs at least one attempt"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let policy = RetryPolicy::new(3, 0.01, 1.0, 0.001);
        let calls = AtomicU32::new(0);
        let result = policy
            .run(|| {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(ProviderError::RateLimited(None))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_errors_stop_immediately() {
        let policy = RetryPolicy::new(5, 0.01, 1.0, 0.001);
        let calls = AtomicU32::new(0);
        let result: Result<(), ProviderError> = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::NotFound { provider: "lrclib" }) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_retries_returns_last_error() {
        let policy = RetryPolicy::new(2, 0.01, 1.0, 0.001);
        let calls = AtomicU32::new(0);
        let result: Result<(), ProviderError> = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::RateLimited(None)) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}

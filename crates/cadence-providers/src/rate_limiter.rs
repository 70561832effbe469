// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::time::{sleep, Duration, Instant};

/// Fractional-token bucket. Tokens refill continuously at `refill_rate` per
/// second up to `capacity`; a request consumes one token and is only
/// admitted once at least one whole token is available.
#[derive(Debug)]
struct TokenBucketState {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucketState {
    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

#[derive(Debug)]
pub struct TokenBucket {
    state: Mutex<TokenBucketState>,
}

impl TokenBucket {
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        Self {
            state: Mutex::new(TokenBucketState {
                tokens: capacity as f64,
                capacity: capacity as f64,
                refill_rate,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Attempt to consume `tokens`. Returns `true` and deducts them if
    /// enough whole tokens are available, otherwise leaves the bucket
    /// untouched and returns `false`.
    pub fn try_consume(&self, tokens: f64) -> bool {
        if tokens < 0.0 {
            return false;
        }
        let mut state = self.state.lock().expect("token bucket poisoned");
        state.refill(Instant::now());
        if state.tokens >= tokens {
            state.tokens -= tokens;
            true
        } else {
            false
        }
    }

    pub fn available_tokens(&self) -> f64 {
        let mut state = self.state.lock().expect("token bucket poisoned");
        state.refill(Instant::now());
        state.tokens
    }

    pub fn time_until_available(&self, tokens: f64) -> Duration {
        let mut state = self.state.lock().expect("token bucket poisoned");
        state.refill(Instant::now());
        if state.tokens >= tokens {
            return Duration::ZERO;
        }
        let deficit = tokens - state.tokens;
        Duration::from_secs_f64((deficit / state.refill_rate).max(0.0))
    }

    pub fn reset(&self) {
        let mut state = self.state.lock().expect("token bucket poisoned");
        state.tokens = state.capacity;
        state.last_refill = Instant::now();
    }
}

/// Sliding window of request timestamps: at most `max_requests` are allowed
/// to have occurred in the trailing `window`.
#[derive(Debug)]
struct SlidingWindowState {
    timestamps: VecDeque<Instant>,
}

#[derive(Debug)]
pub struct SlidingWindowTracker {
    window: Duration,
    max_requests: u32,
    state: Mutex<SlidingWindowState>,
}

impl SlidingWindowTracker {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            state: Mutex::new(SlidingWindowState {
                timestamps: VecDeque::new(),
            }),
        }
    }

    fn cleanup(&self, state: &mut SlidingWindowState, now: Instant) {
        while let Some(&front) = state.timestamps.front() {
            if now.duration_since(front) > self.window {
                state.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn can_make_request(&self) -> bool {
        let mut state = self.state.lock().expect("sliding window poisoned");
        self.cleanup(&mut state, Instant::now());
        (state.timestamps.len() as u32) < self.max_requests
    }

    pub fn record_request(&self) {
        let mut state = self.state.lock().expect("sliding window poisoned");
        state.timestamps.push_back(Instant::now());
    }

    pub fn current_request_count(&self) -> u32 {
        let mut state = self.state.lock().expect("sliding window poisoned");
        self.cleanup(&mut state, Instant::now());
        state.timestamps.len() as u32
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn time_until_next_available(&self) -> Duration {
        let mut state = self.state.lock().expect("sliding window poisoned");
        let now = Instant::now();
        self.cleanup(&mut state, now);
        if (state.timestamps.len() as u32) < self.max_requests {
            return Duration::ZERO;
        }
        let oldest = state.timestamps.front().copied().unwrap_or(now);
        self.window.saturating_sub(now.duration_since(oldest))
    }

    pub fn reset(&self) {
        let mut state = self.state.lock().expect("sliding window poisoned");
        state.timestamps.clear();
    }
}

/// Combined rate limiter guarding the Genius provider (the only provider
/// the pipeline rate-limits; LRCLib and Lyrics.ovh are left to their own
/// HTTP error handling).
#[derive(Debug)]
pub struct GeniusRateLimiter {
    bucket: TokenBucket,
    window: SlidingWindowTracker,
}

impl GeniusRateLimiter {
    pub fn new(
        token_bucket_capacity: u32,
        token_bucket_refill_rate: f64,
        window_size: Duration,
        max_requests: u32,
    ) -> Self {
        Self {
            bucket: TokenBucket::new(token_bucket_capacity, token_bucket_refill_rate),
            window: SlidingWindowTracker::new(window_size, max_requests),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.bucket.available_tokens() < 1.0 || !self.window.can_make_request()
    }

    pub fn approaching_limit(&self, threshold: f64) -> bool {
        let ratio = self.window.current_request_count() as f64 / self.window.max_requests() as f64;
        ratio >= threshold
    }

    /// Block until both mechanisms admit a request, then record it.
    pub async fn acquire(&self) {
        loop {
            let bucket_wait = self.bucket.time_until_available(1.0);
            let window_wait = self.window.time_until_next_available();
            let wait = bucket_wait.max(window_wait);
            if wait == Duration::ZERO {
                if self.bucket.try_consume(1.0) && self.window.can_make_request() {
                    self.window.record_request();
                    return;
                }
                // lost a race with another caller; retry immediately
                continue;
            }
            tracing::trace!(target: "lyrics::rate_limit", ?wait, "waiting for genius rate limit");
            sleep(wait).await;
        }
    }

    pub fn reset(&self) {
        self.bucket.reset();
        self.window.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_bucket_starts_full() {
        let bucket = TokenBucket::new(10, 1.0);
        assert_eq!(bucket.available_tokens(), 10.0);
    }

    #[test]
    fn token_bucket_denies_when_empty() {
        let bucket = TokenBucket::new(1, 0.0);
        assert!(bucket.try_consume(1.0));
        assert!(!bucket.try_consume(1.0));
    }

    #[test]
    fn token_bucket_rejects_negative_consumption_without_crediting_tokens() {
        let bucket = TokenBucket::new(5, 0.0);
        assert!(!bucket.try_consume(-1.0));
        assert_eq!(bucket.available_tokens(), 5.0);
    }

    #[test]
    fn sliding_window_denies_past_max_requests() {
        let tracker = SlidingWindowTracker::new(Duration::from_secs(60), 2);
        assert!(tracker.can_make_request());
        tracker.record_request();
        assert!(tracker.can_make_request());
        tracker.record_request();
        assert!(!tracker.can_make_request());
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_waits_for_token_refill() {
        let limiter = GeniusRateLimiter::new(1, 1.0, Duration::from_secs(60), 60);
        limiter.acquire().await;
        assert!(limiter.bucket.available_tokens() < 1.0);

        let start = Instant::now();
        limiter.acquire().await;
        assert!(Instant::now().duration_since(start) >= Duration::from_millis(900));
    }
}

//! Oracle call budget using a token bucket
//!
//! One [`RateLimiter`] is shared by every validation unit in the process. A unit
//! awaits a permit before each oracle call, so an exhausted budget slows the
//! pipeline down instead of failing calls.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Process-wide call limiter shared across all validation units
///
/// - One token is one oracle call
/// - Tokens refill continuously at `limit_per_sec`
/// - The bucket holds at most one second worth of calls (burst = limit)
/// - A limit of 0 means unlimited
#[derive(Clone)]
pub struct RateLimiter {
    /// Calls per second (0 = unlimited)
    limit_per_sec: Arc<AtomicU64>,
    /// Calls that may be made right now
    tokens: Arc<AtomicU64>,
    /// Last refill timestamp (nanoseconds since arbitrary epoch)
    last_refill: Arc<AtomicU64>,
}

impl RateLimiter {
    /// Create a limiter allowing `limit_per_sec` calls per second (None = unlimited)
    ///
    /// ```
    /// use mailsieve::rate_limiter::RateLimiter;
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let limiter = RateLimiter::new(Some(14));
    /// let worker = limiter.clone();
    /// worker.acquire().await;
    /// # }
    /// ```
    #[must_use]
    pub fn new(limit_per_sec: Option<u64>) -> Self {
        let limit = limit_per_sec.unwrap_or(0);

        Self {
            limit_per_sec: Arc::new(AtomicU64::new(limit)),
            tokens: Arc::new(AtomicU64::new(limit)),
            last_refill: Arc::new(AtomicU64::new(Self::now_nanos())),
        }
    }

    /// Wait until one call may be made
    pub async fn acquire(&self) {
        loop {
            let limit = self.limit_per_sec.load(Ordering::Relaxed);
            if limit == 0 {
                return;
            }

            self.refill_tokens();

            let current = self.tokens.load(Ordering::SeqCst);
            if current > 0 {
                if self
                    .tokens
                    .compare_exchange(current, current - 1, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    return;
                }
                continue;
            }

            // Sleep roughly one token interval
            let wait_ms = 1000 / limit.max(1);
            tokio::time::sleep(Duration::from_millis(wait_ms.clamp(5, 100))).await;
        }
    }

    fn refill_tokens(&self) {
        let limit = self.limit_per_sec.load(Ordering::Relaxed);
        if limit == 0 {
            return;
        }

        let now = Self::now_nanos();
        let last = self.last_refill.load(Ordering::SeqCst);
        let elapsed_secs = now.saturating_sub(last) as f64 / 1_000_000_000.0;
        let tokens_to_add = (limit as f64 * elapsed_secs) as u64;

        // Only move the refill mark once a whole token has accrued, so fractional
        // progress keeps accumulating between polls
        if tokens_to_add > 0
            && self
                .last_refill
                .compare_exchange(last, now, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            let _ = self
                .tokens
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| {
                    Some((t + tokens_to_add).min(limit))
                });
        }
    }

    fn now_nanos() -> u64 {
        static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
        let start = START.get_or_init(Instant::now);
        start.elapsed().as_nanos() as u64
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_unlimited_returns_immediately() {
        let limiter = RateLimiter::new(None);
        let start = Instant::now();
        for _ in 0..1000 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_burst_then_backpressure() {
        let limiter = RateLimiter::new(Some(20));

        // The initial bucket covers one second worth of calls
        let start = Instant::now();
        for _ in 0..20 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));

        // The next five must wait for refill (~50ms per token at 20/s)
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(150),
            "expected backpressure, took {:?}",
            elapsed
        );
        assert!(elapsed < Duration::from_secs(2), "took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_clones_share_budget() {
        let limiter = RateLimiter::new(Some(2));
        let other = limiter.clone();
        limiter.acquire().await;
        other.acquire().await;
        assert_eq!(limiter.tokens.load(Ordering::SeqCst), 0);
        assert_eq!(other.tokens.load(Ordering::SeqCst), 0);
    }
}

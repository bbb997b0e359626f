//! Outbound call spacing.
//!
//! The pipeline issues at most one provider call at a time, so a single
//! serialized cursor is enough: no token bucket, no burst allowance. The
//! limiter remembers when the previous turn completed and makes the next
//! caller wait out the remainder of the configured interval.

use std::time::{Duration, Instant};

use crate::config::PipelineConfig;
use crate::error::{EnrichmentError, Result};
use crate::pipeline::progress::CancellationToken;

/// Longest single sleep before the cancellation token is polled again.
/// Bounds cancellation latency during an idle wait.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Enforces a minimum delay between consecutive outbound calls.
///
/// The first [`await_turn`](Self::await_turn) never waits; each subsequent
/// call waits until `min_interval` has elapsed since the previous call's
/// completion. Waits sleep in short slices and poll the cancellation token
/// between slices, so a stop request does not sit out a full idle interval.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_turn: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_turn: None,
        }
    }

    /// Derive the limiter from a call budget: `min_interval = 60/rpm` seconds.
    pub fn from_requests_per_minute(rpm: u32) -> Self {
        Self::new(Duration::from_secs_f64(60.0 / f64::from(rpm.max(1))))
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.min_interval())
    }

    /// The configured minimum spacing between calls.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Block until the minimum interval since the previous turn has elapsed.
    ///
    /// Returns `Err(EnrichmentError::Cancelled)` if the token is set before
    /// or during the wait; the turn is then not consumed.
    pub fn await_turn(&mut self, token: &CancellationToken) -> Result<()> {
        if token.is_cancelled() {
            return Err(EnrichmentError::Cancelled);
        }

        if let Some(last) = self.last_turn {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                self.sleep_cancellable(self.min_interval - elapsed, token)?;
            }
        }

        self.last_turn = Some(Instant::now());
        Ok(())
    }

    fn sleep_cancellable(&self, total: Duration, token: &CancellationToken) -> Result<()> {
        let deadline = Instant::now() + total;
        loop {
            if token.is_cancelled() {
                return Err(EnrichmentError::Cancelled);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(());
            }
            std::thread::sleep(remaining.min(SLEEP_SLICE));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_turn_does_not_wait() {
        let mut limiter = RateLimiter::from_requests_per_minute(1);
        let token = CancellationToken::new();

        let start = Instant::now();
        limiter.await_turn(&token).unwrap();
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_consecutive_turns_are_spaced() {
        // 600 rpm -> 100ms spacing; keeps the test fast while still
        // measurable above scheduler jitter.
        let mut limiter = RateLimiter::from_requests_per_minute(600);
        let token = CancellationToken::new();

        limiter.await_turn(&token).unwrap();
        let start = Instant::now();
        limiter.await_turn(&token).unwrap();

        assert!(
            start.elapsed() >= Duration::from_millis(90),
            "Second turn should wait out the interval, waited {:?}",
            start.elapsed()
        );
    }

    #[test]
    fn test_interval_from_rpm() {
        let limiter = RateLimiter::from_requests_per_minute(60);
        assert_eq!(limiter.min_interval(), Duration::from_secs(1));

        let limiter = RateLimiter::from_requests_per_minute(20);
        assert_eq!(limiter.min_interval(), Duration::from_secs(3));
    }

    #[test]
    fn test_no_wait_after_interval_already_elapsed() {
        let mut limiter = RateLimiter::new(Duration::from_millis(20));
        let token = CancellationToken::new();

        limiter.await_turn(&token).unwrap();
        std::thread::sleep(Duration::from_millis(30));

        let start = Instant::now();
        limiter.await_turn(&token).unwrap();
        assert!(start.elapsed() < Duration::from_millis(15));
    }

    #[test]
    fn test_pre_cancelled_token_rejects_immediately() {
        let mut limiter = RateLimiter::from_requests_per_minute(1);
        let token = CancellationToken::new();
        token.cancel();

        let start = Instant::now();
        let err = limiter.await_turn(&token).unwrap_err();
        assert!(err.is_cancelled());
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_cancellation_interrupts_wait() {
        // 2 rpm -> 30s interval; the wait must be cut short by the cancel.
        let mut limiter = RateLimiter::from_requests_per_minute(2);
        let token = CancellationToken::new();

        limiter.await_turn(&token).unwrap();

        let canceller = token.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            canceller.cancel();
        });

        let start = Instant::now();
        let err = limiter.await_turn(&token).unwrap_err();
        handle.join().unwrap();

        assert!(err.is_cancelled());
        assert!(
            start.elapsed() < Duration::from_secs(5),
            "Cancel should interrupt the wait promptly, waited {:?}",
            start.elapsed()
        );
    }
}

//! Delay policies for reconnection attempts

use std::time::Duration;

/// Maps an attempt number to the delay before the next reconnection attempt
///
/// Implementations must be monotonically non-decreasing in `attempt` and
/// capped at an upper bound so a long failure streak never produces
/// unbounded waits. Attempt numbers start at 1.
pub trait BackoffPolicy: Send + Sync {
    /// Delay to wait before reconnection attempt `attempt` (1-indexed)
    fn delay(&self, attempt: u32) -> Duration;
}

/// Exponential backoff with an upper bound
///
/// `delay(n) = min(max, initial * multiplier^(n-1))`. Jitter is available to
/// desynchronize many sessions retrying at once, at the cost of strict
/// monotonicity between adjacent attempts; it is off by default.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Delay for the first attempt
    pub initial: Duration,
    /// Upper bound on any delay
    pub max: Duration,
    /// Growth factor per attempt
    pub multiplier: f64,
    /// Add up to 25% jitter on top of the computed delay
    pub jitter: bool,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: false,
        }
    }
}

impl ExponentialBackoff {
    /// Create a policy with the given initial delay and cap
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            ..Default::default()
        }
    }

    /// Set the growth factor
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let max_ms = self.max.as_millis() as f64;

        let mut delay_ms =
            (self.initial.as_millis() as f64 * self.multiplier.powi(attempt as i32 - 1)).min(max_ms);

        if self.jitter {
            delay_ms = (delay_ms + time_jitter(delay_ms * 0.25)).min(max_ms);
        }

        Duration::from_millis(delay_ms as u64)
    }
}

/// Constant delay between attempts
#[derive(Debug, Clone)]
pub struct FixedBackoff(Duration);

impl FixedBackoff {
    /// Create a fixed-delay policy
    pub fn new(delay: Duration) -> Self {
        Self(delay)
    }
}

impl Default for FixedBackoff {
    fn default() -> Self {
        Self(Duration::from_secs(5))
    }
}

impl BackoffPolicy for FixedBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

/// Simple pseudo-random jitter using a time-based seed
fn time_jitter(max: f64) -> f64 {
    let seed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as f64;
    (seed % 1000.0) / 1000.0 * max
}

use rand::Rng;
use std::time::Duration;

/// Default jitter added on top of the capped exponential delay (25%)
pub const DEFAULT_JITTER_RATIO: f64 = 0.25;

/// Trait for defining reconnection strategies
///
/// The supervisor asks for a delay once per failed attempt. `attempt` is the
/// retry counter *before* it is incremented for this episode step, so the
/// first failure after a live session asks for attempt 0.
pub trait ReconnectionStrategy: Send + Sync {
    /// Get the delay before the next reconnection attempt
    ///
    /// # Returns
    /// * `Some(duration)` - Wait this long before reconnecting
    /// * `None` - Retry ceiling reached, give up
    fn next_delay(&self, attempt: usize) -> Option<Duration>;

    /// Check if we should continue reconnecting
    fn should_reconnect(&self, attempt: usize) -> bool;
}

/// Exponential backoff with additive jitter
///
/// `delay = min(max_delay, initial_delay * 2^attempt)` plus a uniformly drawn
/// extra in `[0, jitter_ratio * delay]`.
#[derive(Debug, Clone)]
pub struct JitteredBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    max_retries: Option<usize>,
    jitter_ratio: f64,
}

impl JitteredBackoff {
    /// Create a new backoff strategy with the default 25% jitter
    ///
    /// # Arguments
    /// * `initial_delay` - Delay for the first retry of an episode
    /// * `max_delay` - Cap applied before jitter
    /// * `max_retries` - Retry ceiling (None = unlimited)
    pub fn new(initial_delay: Duration, max_delay: Duration, max_retries: Option<usize>) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_retries,
            jitter_ratio: DEFAULT_JITTER_RATIO,
        }
    }

    /// Override the jitter ratio (clamped to `[0, 1]`)
    pub fn with_jitter_ratio(mut self, ratio: f64) -> Self {
        self.jitter_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// The capped exponential delay for `attempt`, before jitter
    pub fn base_delay(&self, attempt: usize) -> Duration {
        let initial_ms = self.initial_delay.as_millis() as u64;
        let factor = 1u64.checked_shl(attempt.min(63) as u32).unwrap_or(u64::MAX);
        let delay_ms = initial_ms.saturating_mul(factor);
        Duration::from_millis(delay_ms.min(self.max_delay.as_millis() as u64))
    }

    /// Inclusive bounds every delay for `attempt` falls into
    pub fn delay_bounds(&self, attempt: usize) -> (Duration, Duration) {
        let base = self.base_delay(attempt);
        (base, base.mul_f64(1.0 + self.jitter_ratio))
    }

    pub fn max_retries(&self) -> Option<usize> {
        self.max_retries
    }
}

impl ReconnectionStrategy for JitteredBackoff {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }

        let base = self.base_delay(attempt);
        let jitter = if self.jitter_ratio > 0.0 {
            rand::thread_rng().gen_range(0.0..=self.jitter_ratio)
        } else {
            0.0
        };
        Some(base.mul_f64(1.0 + jitter))
    }

    fn should_reconnect(&self, attempt: usize) -> bool {
        self.max_retries.map_or(true, |max| attempt < max)
    }
}

/// Fixed delay reconnection strategy
///
/// Always waits the same amount of time between reconnection attempts
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_retries: Option<usize>,
}

impl FixedDelay {
    pub fn new(delay: Duration, max_retries: Option<usize>) -> Self {
        Self { delay, max_retries }
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }
        Some(self.delay)
    }

    fn should_reconnect(&self, attempt: usize) -> bool {
        self.max_retries.map_or(true, |max| attempt < max)
    }
}

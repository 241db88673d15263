//! Reconnect delay policies.

use std::time::Duration;

/// Default wait between reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(6);

/// Decides how long to wait before the next connect attempt.
pub trait RetryPolicy: Send {
    /// Delay before the next attempt. Called once per failed or lost connection.
    fn next_delay(&mut self) -> Duration;

    /// Called when a connection reaches the established state.
    fn reset(&mut self);
}

/// Same delay every time, retried forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantDelay {
    delay: Duration,
}

impl ConstantDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for ConstantDelay {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_DELAY)
    }
}

impl RetryPolicy for ConstantDelay {
    fn next_delay(&mut self) -> Duration {
        self.delay
    }

    fn reset(&mut self) {}
}

/// Delay multiplied by `factor` after every attempt, capped at `max`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    factor: f64,
    current: Duration,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            factor: 2.0,
            current: initial,
        }
    }

    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor.max(1.0);
        self
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next_delay(&mut self) -> Duration {
        let delay = self.current.min(self.max);
        // Grow in f64: `Duration` arithmetic panics past `Duration::MAX`.
        let grown = self.current.as_secs_f64() * self.factor;
        self.current = Duration::try_from_secs_f64(grown)
            .map_or(self.max, |next| next.min(self.max));
        delay
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}

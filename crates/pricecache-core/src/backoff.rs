//! Exponential backoff policy.

use std::time::Duration;

/// Exponential backoff: `initial * multiplier^attempt`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(250),
            max: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            ..Self::default()
        }
    }

    /// Delay to wait after the `attempt`-th failure (0-based).
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use pricecache_core::Backoff;
    ///
    /// let backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(500));
    /// assert_eq!(backoff.delay(0), Duration::from_millis(100));
    /// assert_eq!(backoff.delay(2), Duration::from_millis(400));
    /// assert_eq!(backoff.delay(10), Duration::from_millis(500));
    /// ```
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(63) as i32);
        let secs = self.initial.as_secs_f64() * factor;

        if !secs.is_finite() || secs >= self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let backoff = Backoff::default();
        assert_eq!(backoff.initial, Duration::from_millis(250));
        assert_eq!(backoff.max, Duration::from_secs(30));
        assert_eq!(backoff.multiplier, 2.0);
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let backoff = Backoff::new(Duration::from_millis(50), Duration::from_secs(1));

        assert_eq!(backoff.delay(0), Duration::from_millis(50));
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(4), Duration::from_millis(800));
        assert_eq!(backoff.delay(5), Duration::from_secs(1));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(1));
    }
}

//! Reconnect backoff policy

use std::time::Duration;

use crate::config::{BackoffConfig, BackoffKind};

/// Delay before the next reconnect attempt.
///
/// Exponential backoff doubles on each consecutive failure up to `max` and
/// returns to `base` after a successful open.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    current: Duration,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            current: config.base,
            config,
        }
    }

    /// Delay to wait now; advances the policy for the next failure
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        if self.config.kind == BackoffKind::Exponential {
            self.current = self.current.saturating_mul(2).min(self.config.max);
        }
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.config.base;
    }

    pub fn peek(&self) -> Duration {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(kind: BackoffKind) -> BackoffConfig {
        BackoffConfig {
            kind,
            base: Duration::from_secs(5),
            max: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_exponential_doubles_to_cap() {
        let mut backoff = Backoff::new(config(BackoffKind::Exponential));
        let delays: Vec<u64> = (0..6).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![5, 10, 20, 40, 60, 60]);
    }

    #[test]
    fn test_reset_after_open() {
        let mut backoff = Backoff::new(config(BackoffKind::Exponential));
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.peek(), Duration::from_secs(20));
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_doubling_saturates_near_duration_max() {
        let mut backoff = Backoff::new(BackoffConfig {
            kind: BackoffKind::Exponential,
            base: Duration::from_secs(u64::MAX / 2 + 1),
            max: Duration::MAX,
        });
        backoff.next_delay();
        assert_eq!(backoff.next_delay(), Duration::MAX);
        assert_eq!(backoff.next_delay(), Duration::MAX);
    }

    #[test]
    fn test_fixed_never_grows() {
        let mut backoff = Backoff::new(config(BackoffKind::Fixed));
        for _ in 0..5 {
            assert_eq!(backoff.next_delay(), Duration::from_secs(5));
        }
    }
}

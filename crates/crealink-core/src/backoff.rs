// ── Reconnect policy ──
//
// Bounded exponential backoff with proportional jitter. One policy lives
// as long as its persistent channel; it is reset on every successful
// connect.

use std::ops::RangeInclusive;
use std::time::Duration;

use rand::Rng;

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Base unit of the exponential curve. Default: 1s.
    pub initial_delay: Duration,
    /// Upper bound on the pre-jitter delay. Default: 60s.
    pub max_delay: Duration,
    /// Retries after which the session gives up. Default: 10.
    pub max_attempts: u32,
    /// Extra delay as a fraction of the computed delay. Default: 0.1..=0.5.
    pub jitter: RangeInclusive<f64>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_attempts: 10,
            jitter: 0.1..=0.5,
        }
    }
}

/// Attempt counter plus the delay curve derived from a [`ReconnectConfig`].
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    /// Retries consumed since the last successful connect.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.config.max_attempts
    }

    /// `min(initial * 2^attempt, max)`, before jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt);
        self.config
            .initial_delay
            .saturating_mul(factor)
            .min(self.config.max_delay)
    }

    /// Consume one retry and return how long to wait before it, or `None`
    /// once the retry budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempts += 1;

        let base = self.base_delay(self.attempts);
        let jitter = self.sample_jitter();
        Some(base.mul_f64(1.0 + jitter))
    }

    /// Back to a fresh budget. Called on every successful connect.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    fn sample_jitter(&self) -> f64 {
        let range = &self.config.jitter;
        if range.is_empty() || *range.start() < 0.0 {
            return 0.0;
        }
        rand::thread_rng().gen_range(range.clone())
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(ReconnectConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(60));
        assert_eq!(config.max_attempts, 10);
    }

    #[test]
    fn base_delays_double_then_cap() {
        let policy = ReconnectPolicy::default();
        let secs: Vec<u64> = (1..=10).map(|a| policy.base_delay(a).as_secs()).collect();
        assert_eq!(secs, vec![2, 4, 8, 16, 32, 60, 60, 60, 60, 60]);
    }

    #[test]
    fn base_delay_saturates_for_huge_attempts() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.base_delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn jittered_delay_stays_within_bounds() {
        let mut policy = ReconnectPolicy::default();
        let mut previous_base = Duration::ZERO;

        while let Some(delay) = policy.next_delay() {
            let base = policy.base_delay(policy.attempts());
            assert!(base >= previous_base, "base delay must not decrease");
            assert!(delay >= base.mul_f64(1.1), "{delay:?} below {base:?} + 10%");
            assert!(delay <= base.mul_f64(1.5), "{delay:?} above {base:?} + 50%");
            previous_base = base;
        }
        assert_eq!(policy.attempts(), 10);
    }

    #[test]
    fn exhausts_after_max_attempts() {
        let mut policy = ReconnectPolicy::default();
        for _ in 0..10 {
            assert!(policy.next_delay().is_some());
        }
        assert!(policy.is_exhausted());
        assert!(policy.next_delay().is_none());
        assert_eq!(policy.attempts(), 10);
    }

    #[test]
    fn reset_restores_budget() {
        let mut policy = ReconnectPolicy::default();
        for _ in 0..10 {
            policy.next_delay();
        }
        policy.reset();
        assert_eq!(policy.attempts(), 0);
        assert!(!policy.is_exhausted());
        assert!(policy.next_delay().is_some());
    }

    #[test]
    fn zero_jitter_is_exact() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig {
            jitter: 0.0..=0.0,
            ..ReconnectConfig::default()
        });
        assert_eq!(policy.next_delay(), Some(Duration::from_secs(2)));
    }
}

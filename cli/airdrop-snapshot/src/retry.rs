use std::time::Duration;

/// How often, and how patiently, a failed log page is requested again.
///
/// The cursor is never advanced on failure; a retry always repeats the exact
/// request that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per page, `None` for no limit.
    pub max_attempts: Option<u32>,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(10),
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Keeps requesting the same page until it succeeds or fails fatally.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            ..Self::default()
        }
    }

    /// No sleeping between attempts.
    pub fn immediate(max_attempts: Option<u32>) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Whether another attempt may follow `failures` failed ones.
    pub fn allows(&self, failures: u32) -> bool {
        self.max_attempts.map_or(true, |max| failures < max)
    }

    /// Backoff before the attempt following failure number `failure` (1-based).
    pub fn delay_for(&self, failure: u32) -> Duration {
        let shift = failure.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}

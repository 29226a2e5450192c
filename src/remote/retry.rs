//! Backoff policy for a server that may be asleep.

use std::time::Duration;

/// Linear, capped backoff used by the gateway's read path while the service
/// warms up.
#[derive(Debug, Clone)]
pub struct ColdStartPolicy {
  /// Retries allowed after the first failed probe
  pub max_attempts: u32,
  pub base_delay: Duration,
  pub max_delay: Duration,
}

impl Default for ColdStartPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 5,
      base_delay: Duration::from_secs(2),
      max_delay: Duration::from_secs(10),
    }
  }
}

impl ColdStartPolicy {
  /// Delay before retry number `attempt` (1-based): `attempt * base_delay`,
  /// capped at `max_delay`.
  pub fn backoff(&self, attempt: u32) -> Duration {
    self.base_delay.saturating_mul(attempt).min(self.max_delay)
  }

  /// Whether another attempt is allowed after `attempt` failures.
  pub fn allows(&self, attempt: u32) -> bool {
    attempt <= self.max_attempts
  }

  /// Minimal delays for tests
  #[cfg(test)]
  pub fn test(max_attempts: u32) -> Self {
    Self {
      max_attempts,
      base_delay: Duration::from_millis(1),
      max_delay: Duration::from_millis(5),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_backoff_grows_then_caps() {
    let policy = ColdStartPolicy::default();
    assert_eq!(policy.backoff(1), Duration::from_secs(2));
    assert_eq!(policy.backoff(2), Duration::from_secs(4));
    assert_eq!(policy.backoff(4), Duration::from_secs(8));
    assert_eq!(policy.backoff(5), Duration::from_secs(10));
    assert_eq!(policy.backoff(50), Duration::from_secs(10));
  }

  #[test]
  fn test_backoff_is_monotonic() {
    let policy = ColdStartPolicy::default();
    let delays: Vec<_> = (1..=10).map(|a| policy.backoff(a)).collect();
    assert!(delays.windows(2).all(|w| w[0] <= w[1]));
  }

  #[test]
  fn test_attempt_ceiling() {
    let policy = ColdStartPolicy::test(2);
    assert!(policy.allows(1));
    assert!(policy.allows(2));
    assert!(!policy.allows(3));
  }
}

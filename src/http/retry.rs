//! Retry classification and exponential backoff with jitter.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Duration;

use crate::types::ClientConfig;

/// Statuses retried by the client: 429 and every 5xx.
pub fn is_retriable_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

/// Parse a `Retry-After` header: delta seconds or an HTTP date.
pub fn parse_retry_after(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(raw).ok()?;
    let delta = at.with_timezone(&Utc) - Utc::now();
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

/// `min(max, base * 2^(attempt-1))`, saturating.
pub fn exponential_delay(base: Duration, max: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    base.checked_mul(1u32 << exponent).unwrap_or(max).min(max)
}

/// Scale `delay` by a factor in `[1 - jitter, 1 + jitter)`; `unit` is in `[0, 1)`.
pub fn apply_jitter(delay: Duration, jitter: f64, unit: f64) -> Duration {
    let factor = 1.0 - jitter + 2.0 * jitter * unit.clamp(0.0, 1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * factor.max(0.0))
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Cap on the exponential term. A longer `Retry-After` ends the sequence.
    pub max_delay: Duration,
    /// Jitter factor in `[0, 1)`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: config.retry_base_delay,
            max_delay: config.retry_max_delay,
            jitter: config.retry_jitter,
        }
    }

    /// Fresh schedule for one request's retry sequence.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: self.clone(),
            previous: Duration::ZERO,
        }
    }
}

/// Delay schedule for one retry sequence. Never decreases between attempts,
/// and never waits less than a backend `Retry-After`.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    previous: Duration,
}

impl Backoff {
    /// Delay to wait after failed attempt number `attempt` (1-based), or
    /// `None` when the backend asks for longer than `max_delay`.
    pub fn next_delay(&mut self, attempt: u32, retry_after: Option<Duration>) -> Option<Duration> {
        let unit = rand::rng().random::<f64>();
        self.next_delay_with(attempt, retry_after, unit)
    }

    pub(crate) fn next_delay_with(
        &mut self,
        attempt: u32,
        retry_after: Option<Duration>,
        unit: f64,
    ) -> Option<Duration> {
        let wanted = match retry_after {
            Some(hint) if hint > self.policy.max_delay => return None,
            Some(hint) => hint,
            None => {
                let base =
                    exponential_delay(self.policy.base_delay, self.policy.max_delay, attempt);
                apply_jitter(base, self.policy.jitter, unit)
            }
        };
        let delay = wanted.max(self.previous);
        self.previous = delay;
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy(base_ms: u64, max_ms: u64, jitter: f64) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms),
            jitter,
        }
    }

    #[test]
    fn test_retriable_statuses() {
        for status in [429, 500, 502, 503, 504] {
            assert!(is_retriable_status(status), "{status}");
        }
        for status in [200, 400, 401, 403, 404, 409, 422] {
            assert!(!is_retriable_status(status), "{status}");
        }
    }

    #[test]
    fn test_exponential_formula() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(10);
        assert_eq!(exponential_delay(base, max, 1), Duration::from_secs(1));
        assert_eq!(exponential_delay(base, max, 2), Duration::from_secs(2));
        assert_eq!(exponential_delay(base, max, 3), Duration::from_secs(4));
        assert_eq!(exponential_delay(base, max, 4), Duration::from_secs(8));
        assert_eq!(exponential_delay(base, max, 5), Duration::from_secs(10));
        assert_eq!(exponential_delay(base, max, 200), Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_bounds() {
        let d = Duration::from_millis(1000);
        let close = |a: Duration, b: Duration| {
            let diff = if a > b { a - b } else { b - a };
            diff < Duration::from_micros(1)
        };
        assert!(close(apply_jitter(d, 0.1, 0.0), Duration::from_millis(900)));
        assert!(close(apply_jitter(d, 0.1, 0.5), Duration::from_millis(1000)));
        let high = apply_jitter(d, 0.1, 0.999);
        assert!(high > Duration::from_millis(1099) && high < Duration::from_millis(1100));
        assert!(close(apply_jitter(d, 0.0, 0.99), d));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("7"), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after(" 0 "), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("soon"), None);
        // A date in the past clamps to zero.
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_retry_after_is_never_shortened() {
        let mut backoff = policy(100, 2_000, 0.1).backoff();
        assert_eq!(
            backoff.next_delay_with(1, Some(Duration::from_millis(1_500)), 0.0),
            Some(Duration::from_millis(1_500))
        );
        // A shorter hint after a longer wait keeps the schedule non-decreasing.
        assert_eq!(
            backoff.next_delay_with(2, Some(Duration::from_millis(200)), 0.0),
            Some(Duration::from_millis(1_500))
        );
        assert_eq!(
            backoff.next_delay_with(3, Some(Duration::from_secs(60)), 0.0),
            None
        );
    }

    #[test]
    fn test_retry_after_at_cap_is_honored() {
        let mut backoff = policy(100, 2_000, 0.0).backoff();
        assert_eq!(
            backoff.next_delay_with(1, Some(Duration::from_secs(2)), 0.5),
            Some(Duration::from_secs(2))
        );
    }

    #[test]
    fn test_policy_from_config_floors_attempts() {
        let mut cfg = ClientConfig::default();
        cfg.max_retries = 0;
        assert_eq!(RetryPolicy::from_config(&cfg).max_attempts, 1);
    }

    proptest! {
        #[test]
        fn prop_schedule_never_decreases(
            base_ms in 1u64..2_000,
            extra_ms in 0u64..20_000,
            jitter in 0.0f64..0.99,
            units in proptest::collection::vec(0.0f64..1.0, 1..12),
        ) {
            let p = policy(base_ms, base_ms + extra_ms, jitter);
            let mut backoff = p.backoff();
            let mut previous = Duration::ZERO;
            for (i, unit) in units.iter().enumerate() {
                let delay = backoff.next_delay_with(i as u32 + 1, None, *unit).unwrap();
                prop_assert!(delay >= previous);
                prop_assert!(delay.as_secs_f64() <= p.max_delay.as_secs_f64() * (1.0 + jitter) + 1e-6);
                previous = delay;
            }
        }
    }
}

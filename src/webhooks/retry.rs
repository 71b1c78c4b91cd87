use std::time::Duration;

use crate::config::AppConfig;
use crate::types::{DeliveryAttempt, WebhookEvent};
use crate::webhooks::delivery;
use crate::webhooks::registry::Endpoint;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            base_delay_ms: config.retry_base_delay_ms,
            max_delay_ms: config.retry_max_delay_ms,
        }
    }
}

/// Delay before attempt `attempt_number` (1-based): none before the
/// first, then base * 2^(k-2) for attempt k, capped at the ceiling.
pub fn backoff_delay(policy: RetryPolicy, attempt_number: i64) -> Duration {
    if attempt_number <= 1 {
        return Duration::ZERO;
    }
    let exponent = (attempt_number - 2).clamp(0, 31) as u32;
    let delay_ms = policy
        .base_delay_ms
        .saturating_mul(1u64 << exponent)
        .min(policy.max_delay_ms);
    Duration::from_millis(delay_ms)
}

/// Drive one endpoint's delivery for one event: 1 initial attempt plus
/// up to `retry_count` retries. Returns the final attempt, successful
/// or not — the caller decides how to surface a still-failed result.
/// The sleeps only suspend this task, so concurrent deliveries to other
/// endpoints are unaffected.
pub async fn deliver_with_retry(
    client: &reqwest::Client,
    endpoint: &Endpoint,
    event: &WebhookEvent,
    policy: RetryPolicy,
) -> DeliveryAttempt {
    let max_attempts = endpoint.retry_count.max(0) + 1;
    let mut attempt_number = 1;

    loop {
        let attempt = delivery::deliver(client, endpoint, event, attempt_number).await;
        if attempt.outcome.is_success() || attempt_number >= max_attempts {
            return attempt;
        }

        attempt_number += 1;
        let delay = backoff_delay(policy, attempt_number);
        tracing::debug!(
            endpoint_id = %endpoint.id,
            event = %attempt.event,
            next_attempt = attempt_number,
            delay_ms = delay.as_millis() as u64,
            "delivery failed, backing off before retry"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: RetryPolicy = RetryPolicy {
        base_delay_ms: 1_000,
        max_delay_ms: 60_000,
    };

    #[test]
    fn no_delay_before_first_attempt() {
        assert_eq!(backoff_delay(POLICY, 1), Duration::ZERO);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(POLICY, 2), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(POLICY, 3), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(POLICY, 4), Duration::from_millis(4_000));
        assert_eq!(backoff_delay(POLICY, 5), Duration::from_millis(8_000));
    }

    #[test]
    fn backoff_is_non_decreasing_and_capped() {
        let mut previous = Duration::ZERO;
        for attempt_number in 1..=40 {
            let delay = backoff_delay(POLICY, attempt_number);
            assert!(delay >= previous);
            assert!(delay <= Duration::from_millis(POLICY.max_delay_ms));
            previous = delay;
        }
    }

    #[test]
    fn huge_attempt_numbers_do_not_overflow() {
        let delay = backoff_delay(POLICY, i64::MAX);
        assert_eq!(delay, Duration::from_millis(POLICY.max_delay_ms));
    }
}

//! Bounded retries with a pluggable backoff policy.

use std::time::Duration;

use sendloop_core::traits::MessageSender;
use sendloop_core::types::DeliveryResult;

/// Delay strategy between delivery attempts. `delay(attempt)` takes the
/// 1-based index of the attempt that just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// Same delay after every failure.
    Constant(Duration),
    /// `base × attempt` — the default (1s, 2s, 3s, …).
    Linear(Duration),
    /// `base × 2^(attempt−1)` (1s, 2s, 4s, …).
    Exponential(Duration),
}

impl BackoffPolicy {
    pub fn delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match self {
            Self::Constant(base) => *base,
            Self::Linear(base) => *base * attempt,
            Self::Exponential(base) => *base * 2u32.saturating_pow(attempt - 1),
        }
    }

    /// Build from the config strings; unknown strategies fall back to
    /// linear, the source behavior.
    pub fn from_settings(strategy: &str, base_ms: u64) -> Self {
        let base = Duration::from_millis(base_ms);
        match strategy.to_lowercase().as_str() {
            "constant" => Self::Constant(base),
            "exponential" => Self::Exponential(base),
            _ => Self::Linear(base),
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::Linear(Duration::from_millis(1000))
    }
}

/// Call the delivery client up to `max_attempts` times. Returns the first
/// success immediately; after the final failure, returns that last
/// failure's detail. Per-attempt logging is the delivery client's job.
pub async fn send_with_retry(
    sender: &dyn MessageSender,
    phone_number: &str,
    body: &str,
    max_attempts: u32,
    policy: BackoffPolicy,
) -> DeliveryResult {
    let max_attempts = max_attempts.max(1);
    let mut last = DeliveryResult::failed("no delivery attempts were made");

    for attempt in 1..=max_attempts {
        let result = sender.send(phone_number, body).await;
        if result.success {
            return result;
        }
        last = result;

        if attempt < max_attempts {
            tracing::debug!(
                "🔄 Retry attempt {}/{} for {}",
                attempt,
                max_attempts,
                phone_number
            );
            tokio::time::sleep(policy.delay(attempt)).await;
        }
    }

    last
}

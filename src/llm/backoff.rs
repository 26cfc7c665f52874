//! Retry policy for the completion endpoint.
//!
//! Rate-limit rejections wait `max(provider hint, base * 2^attempt)`;
//! transient network failures use a shorter, separately capped ladder.
//! Every wait gets ±25% jitter and a minimum floor.

use std::future::Future;
use std::time::Duration;

use reqwest::header::HeaderMap;
use tracing::warn;

use crate::error::LlmError;

/// Retry configuration for one completion backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts for rate-limited requests (first try included)
    pub rate_limit_attempts: u32,
    pub rate_limit_base: Duration,
    /// Total attempts for connection/timeout failures
    pub network_attempts: u32,
    pub network_base: Duration,
    pub network_max_doublings: u32,
    /// Lower bound applied after jitter
    pub min_delay: Duration,
    /// Symmetric jitter fraction (0.25 = ±25%)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rate_limit_attempts: 5,
            rate_limit_base: Duration::from_secs(5),
            network_attempts: 4,
            network_base: Duration::from_secs(1),
            network_max_doublings: 3,
            min_delay: Duration::from_secs(1),
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Exponential floor for the given zero-based retry attempt.
    pub fn rate_limit_floor(&self, attempt: u32) -> Duration {
        self.rate_limit_base
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Wait before retrying a rate-limited request, before jitter.
    ///
    /// A tiny provider hint never shortens the wait below the floor.
    pub fn rate_limit_wait(&self, attempt: u32, suggested: Option<Duration>) -> Duration {
        let floor = self.rate_limit_floor(attempt);
        match suggested {
            Some(hint) => hint.max(floor),
            None => floor,
        }
    }

    /// Wait before retrying after a network failure, before jitter.
    pub fn network_wait(&self, attempt: u32) -> Duration {
        let doublings = attempt.min(self.network_max_doublings);
        self.network_base
            .saturating_mul(2u32.saturating_pow(doublings))
    }

    /// Scale `wait` by a factor in `[1 - jitter, 1 + jitter]` chosen by
    /// `unit` in `[0, 1]`, then clamp to `min_delay`.
    pub fn jittered(&self, wait: Duration, unit: f64) -> Duration {
        let unit = unit.clamp(0.0, 1.0);
        let factor = 1.0 + self.jitter * (2.0 * unit - 1.0);
        let scaled = wait.mul_f64(factor.max(0.0));
        scaled.max(self.min_delay)
    }

    pub fn with_jitter(&self, wait: Duration) -> Duration {
        self.jittered(wait, fastrand::f64())
    }
}

/// Parse a "try again in 1.5s" / "try again in 250ms" hint from an error message.
pub fn parse_retry_after_text(message: &str) -> Option<Duration> {
    let lower = message.to_lowercase();
    let marker = "try again in";
    let start = lower.find(marker)? + marker.len();
    let rest = lower[start..].trim_start();

    let number_len = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    if number_len == 0 {
        return None;
    }
    let value: f64 = rest[..number_len].parse().ok()?;
    let unit = rest[number_len..].trim_start();

    if unit.starts_with("ms") {
        Some(Duration::from_secs_f64(value / 1000.0))
    } else if unit.starts_with('s') {
        Some(Duration::from_secs_f64(value))
    } else {
        None
    }
}

/// Read `retry-after-ms` or `retry-after` (seconds) from response headers.
pub fn parse_retry_after_headers(headers: &HeaderMap) -> Option<Duration> {
    let header_f64 = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v > 0.0)
    };

    if let Some(ms) = header_f64("retry-after-ms") {
        return Some(Duration::from_secs_f64(ms / 1000.0));
    }
    header_f64("retry-after")
        .filter(|secs| *secs < 600.0)
        .map(Duration::from_secs_f64)
}

/// Run `op` until it succeeds or the policy gives up.
///
/// Payload-too-large and non-transient errors return immediately. Exhausting
/// either attempt cap returns the last error unchanged.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut rate_limit_retries = 0u32;
    let mut network_retries = 0u32;

    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let wait = match &err {
            LlmError::RateLimited { retry_after, .. }
                if rate_limit_retries + 1 < policy.rate_limit_attempts =>
            {
                let wait = policy.rate_limit_wait(rate_limit_retries, *retry_after);
                rate_limit_retries += 1;
                wait
            }
            LlmError::Network(_) if network_retries + 1 < policy.network_attempts => {
                let wait = policy.network_wait(network_retries);
                network_retries += 1;
                wait
            }
            _ => return Err(err),
        };

        let wait = policy.with_jitter(wait);
        warn!(
            target: "sea_agents::llm",
            call = label,
            wait_ms = wait.as_millis() as u64,
            rate_limit_retries,
            network_retries,
            "Retrying after error: {}",
            err
        );
        tokio::time::sleep(wait).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn rate_limited(hint_ms: Option<u64>) -> LlmError {
        LlmError::RateLimited {
            message: "Rate limit reached".to_string(),
            retry_after: hint_ms.map(Duration::from_millis),
        }
    }

    #[test]
    fn test_tiny_hint_never_undercuts_floor() {
        let policy = RetryPolicy::default();
        let hint = parse_retry_after_text("Please try again in 250ms.");
        assert_eq!(hint, Some(Duration::from_millis(250)));
        for attempt in 0..policy.rate_limit_attempts {
            let wait = policy.rate_limit_wait(attempt, hint);
            assert!(wait >= policy.rate_limit_floor(attempt));
        }
        assert_eq!(policy.rate_limit_wait(0, hint), Duration::from_secs(5));
        assert_eq!(policy.rate_limit_wait(2, hint), Duration::from_secs(20));
    }

    #[test]
    fn test_large_hint_wins() {
        let policy = RetryPolicy::default();
        let wait = policy.rate_limit_wait(0, Some(Duration::from_secs(42)));
        assert_eq!(wait, Duration::from_secs(42));
    }

    #[test]
    fn test_network_backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.network_wait(0), Duration::from_secs(1));
        assert_eq!(policy.network_wait(2), Duration::from_secs(4));
        assert_eq!(policy.network_wait(3), Duration::from_secs(8));
        assert_eq!(policy.network_wait(9), Duration::from_secs(8));
    }

    #[test]
    fn test_jitter_bounds_and_floor() {
        let policy = RetryPolicy::default();
        let base = Duration::from_secs(8);
        assert_eq!(policy.jittered(base, 0.0), Duration::from_secs(6));
        assert_eq!(policy.jittered(base, 1.0), Duration::from_secs(10));
        assert_eq!(policy.jittered(base, 0.5), base);
        assert_eq!(
            policy.jittered(Duration::from_millis(200), 0.0),
            policy.min_delay
        );
        for _ in 0..100 {
            let w = policy.with_jitter(base);
            assert!(w >= Duration::from_secs(6) && w <= Duration::from_secs(10));
        }
    }

    #[test]
    fn test_parse_retry_after_text_variants() {
        assert_eq!(
            parse_retry_after_text("Rate limit reached. Please try again in 1.5s"),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(
            parse_retry_after_text("TRY AGAIN IN 20s"),
            Some(Duration::from_secs(20))
        );
        assert_eq!(parse_retry_after_text("try again in a moment"), None);
        assert_eq!(parse_retry_after_text("no hint here"), None);
    }

    #[test]
    fn test_parse_retry_after_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("7"));
        assert_eq!(parse_retry_after_headers(&headers), Some(Duration::from_secs(7)));
        headers.insert("retry-after-ms", HeaderValue::from_static("350"));
        assert_eq!(
            parse_retry_after_headers(&headers),
            Some(Duration::from_millis(350))
        );
        assert_eq!(parse_retry_after_headers(&HeaderMap::new()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_payload_too_large_is_never_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(&RetryPolicy::default(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::PayloadTooLarge("Request too large".to_string())) }
        })
        .await;
        assert!(matches!(result, Err(LlmError::PayloadTooLarge(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_exhaustion_returns_original_error() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(rate_limited(Some(250))) }
        })
        .await;
        assert!(result.as_ref().is_err_and(|e| e.is_rate_limit()));
        assert_eq!(calls.load(Ordering::SeqCst), policy.rate_limit_attempts);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(&RetryPolicy::default(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                match n {
                    0 => Err(LlmError::Network("connection reset".to_string())),
                    1 => Err(rate_limited(None)),
                    _ => Ok("done"),
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_api_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(&RetryPolicy::default(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(LlmError::Api {
                    status: 401,
                    message: "bad key".to_string(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(LlmError::Api { status: 401, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

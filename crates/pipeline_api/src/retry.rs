use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

/// Fixed delay between stream reconnect attempts. Reconnects repeat forever.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Maximum retry attempts for idempotent REST reads, after the first attempt.
pub const MAX_RETRIES: u32 = 3;
/// Base delay before the first REST retry.
pub const BASE_DELAY_MS: u64 = 1000;

fn transient_error_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)rate.?limit|overloaded|service.?unavailable|timed?.?out|connection.?(refused|reset)")
            .expect("retry regex must compile")
    })
}

/// Transient-failure policy for REST reads: retryable statuses or error text.
pub fn is_retryable_http_error(status: u16, error_text: &str) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504) || transient_error_regex().is_match(error_text)
}

/// Exponential backoff delay for REST retry `attempt` (zero-based).
pub fn retry_delay(attempt: u32) -> Duration {
    let exponent = attempt.min(30);
    Duration::from_millis(BASE_DELAY_MS.saturating_mul(2u64.saturating_pow(exponent)))
}

/// Stream reconnect schedule: the same delay for every attempt, no cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(RECONNECT_DELAY)
    }
}

impl ReconnectPolicy {
    #[must_use]
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay_for(&self, _attempt: u64) -> Duration {
        self.delay
    }
}

//! Outcomes of a rate limit check.

use serde::Serialize;

/// Error code carried in every rejection body.
pub const RATE_LIMIT_EXCEEDED: &str = "rate_limit_exceeded";

/// Result of checking one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Request may proceed
    Admit(Admission),
    /// Request must be answered with 429
    Reject(Rejection),
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admit(_))
    }
}

/// Quota state after an admitted request.
///
/// Attached to the request extensions so handlers can expose it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Requests admitted per window
    pub limit: u64,
    /// Requests left in the current window
    pub remaining: u64,
    /// When the current window closes, epoch milliseconds
    pub reset_time: u64,
}

impl Admission {
    /// `X-RateLimit-*` headers describing this admission.
    pub fn headers(&self) -> [(&'static str, String); 3] {
        [
            ("x-ratelimit-limit", self.limit.to_string()),
            ("x-ratelimit-remaining", self.remaining.to_string()),
            ("x-ratelimit-reset", self.reset_time.to_string()),
        ]
    }
}

/// Everything needed to answer a rejected request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Human-readable rejection text
    pub message: String,
    /// Seconds until the window closes, rounded up
    pub retry_after_secs: u64,
    /// Requests admitted per window
    pub limit: u64,
    /// Window length in milliseconds
    pub window_ms: u64,
    /// When the current window closes, epoch milliseconds
    pub reset_time: u64,
}

impl Rejection {
    /// HTTP status of a rejection.
    pub const STATUS: u16 = 429;

    /// Response headers of a rejection.
    pub fn headers(&self) -> [(&'static str, String); 4] {
        [
            ("retry-after", self.retry_after_secs.to_string()),
            ("x-ratelimit-limit", self.limit.to_string()),
            ("x-ratelimit-remaining", "0".to_string()),
            ("x-ratelimit-reset", self.reset_time.to_string()),
        ]
    }

    /// JSON body of a rejection.
    pub fn body(&self) -> RejectionBody<'_> {
        RejectionBody {
            error: RATE_LIMIT_EXCEEDED,
            message: &self.message,
            retry_after: self.retry_after_secs,
            limit: self.limit,
            window: window_seconds(self.window_ms),
        }
    }
}

/// Wire shape of the 429 body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionBody<'a> {
    pub error: &'static str,
    pub message: &'a str,
    pub retry_after: u64,
    pub limit: u64,
    pub window: serde_json::Number,
}

/// Window length in seconds, integral when the window is whole seconds.
fn window_seconds(window_ms: u64) -> serde_json::Number {
    if window_ms % 1000 == 0 {
        serde_json::Number::from(window_ms / 1000)
    } else {
        serde_json::Number::from_f64(window_ms as f64 / 1000.0)
            .unwrap_or_else(|| serde_json::Number::from(window_ms / 1000))
    }
}

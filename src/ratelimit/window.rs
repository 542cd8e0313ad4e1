//! Fixed-window record.

/// Per-key rate limit state for the currently open window.
///
/// Timestamps are epoch milliseconds. A record is only meaningful while
/// `reset_time > now`; afterwards it is stale and must be replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRecord {
    /// Requests observed in the current window
    pub count: u64,
    /// When the current window closes
    pub reset_time: u64,
}

impl WindowRecord {
    /// Open a fresh window starting at `now`.
    pub fn open(now: u64, window_ms: u64) -> Self {
        Self {
            count: 0,
            reset_time: now.saturating_add(window_ms),
        }
    }

    /// Whether the window has closed at `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        self.reset_time <= now
    }

    /// Milliseconds until the window closes, zero once expired.
    pub fn millis_until_reset(&self, now: u64) -> u64 {
        self.reset_time.saturating_sub(now)
    }

    /// Whole seconds until the window closes, rounded up.
    pub fn secs_until_reset(&self, now: u64) -> u64 {
        self.millis_until_reset(now).div_ceil(1000)
    }

    /// Requests left before the limit is hit.
    pub fn remaining(&self, limit: u64) -> u64 {
        limit.saturating_sub(self.count)
    }
}

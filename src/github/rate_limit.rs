//! Rate-limit window tracking.
//!
//! GitHub reports the token's quota on every response via `x-ratelimit-*`
//! headers. The tracker keeps the last complete window it saw so the executor
//! can refuse to spend a round-trip on a request that is known to be rejected.
//!
//! Partial header sets are ignored rather than merged: a window is only ever
//! replaced wholesale.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use http::HeaderMap;
use serde::{Deserialize, Serialize};

pub(crate) const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub(crate) const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
pub(crate) const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";
pub(crate) const RATE_LIMIT_USED: &str = "x-ratelimit-used";

/// Returns a header's value as trimmed text, if present and valid UTF-8.
pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
}

/// Parses an `x-ratelimit-reset` value. GitHub sends Unix seconds.
pub(crate) fn parse_reset(value: &str) -> Option<DateTime<Utc>> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// The provider-reported quota for the authenticated token.
///
/// `used + remaining == limit` is expected but not enforced; server values are
/// trusted as reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitWindow {
    pub remaining: u64,
    pub limit: u64,
    pub reset_time: DateTime<Utc>,
    pub used: u64,
}

impl RateLimitWindow {
    /// Builds a window from response headers.
    ///
    /// Returns `None` unless remaining, limit and reset are all present and
    /// parse. `used` falls back to `limit - remaining` when absent.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let remaining = header_str(headers, RATE_LIMIT_REMAINING)?.parse::<u64>().ok()?;
        let limit = header_str(headers, RATE_LIMIT_LIMIT)?.parse::<u64>().ok()?;
        let reset_time = parse_reset(header_str(headers, RATE_LIMIT_RESET)?)?;
        let used = match header_str(headers, RATE_LIMIT_USED) {
            Some(v) => v.parse::<u64>().ok()?,
            None => limit.saturating_sub(remaining),
        };

        Some(Self {
            remaining,
            limit,
            reset_time,
            used,
        })
    }

    /// True when the quota is spent and the reset is still ahead of `now`.
    pub fn is_exhausted_at(&self, now: DateTime<Utc>) -> bool {
        self.remaining == 0 && self.reset_time > now
    }
}

/// Process-local cache of the last known rate-limit window.
///
/// Owned by the client; shared by concurrent calls on that client. Staleness is
/// tolerated: a short-circuited call never refreshes the window, the next real
/// request does.
#[derive(Debug, Default)]
pub struct RateLimitTracker {
    window: RwLock<Option<RateLimitWindow>>,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the current window, if one has been observed.
    pub fn peek(&self) -> Option<RateLimitWindow> {
        *self.window.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Replaces the window from response headers.
    ///
    /// Incomplete or unparsable header sets leave the prior window unchanged.
    /// Returns whether the window was replaced.
    pub fn update(&self, headers: &HeaderMap) -> bool {
        let Some(window) = RateLimitWindow::from_headers(headers) else {
            return false;
        };
        tracing::trace!(
            remaining = window.remaining,
            limit = window.limit,
            reset = %window.reset_time,
            "Rate limit window updated"
        );
        *self.window.write().unwrap_or_else(|e| e.into_inner()) = Some(window);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use proptest::prelude::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    fn full_headers(remaining: u64, limit: u64, reset: i64) -> HeaderMap {
        headers(&[
            (RATE_LIMIT_REMAINING, &remaining.to_string()),
            (RATE_LIMIT_LIMIT, &limit.to_string()),
            (RATE_LIMIT_RESET, &reset.to_string()),
            (RATE_LIMIT_USED, &(limit - remaining).to_string()),
        ])
    }

    #[test]
    fn starts_absent() {
        assert_eq!(RateLimitTracker::new().peek(), None);
    }

    #[test]
    fn update_with_full_headers_replaces_window() {
        let tracker = RateLimitTracker::new();
        assert!(tracker.update(&full_headers(4990, 5000, 1_700_000_000)));

        let window = tracker.peek().unwrap();
        assert_eq!(window.remaining, 4990);
        assert_eq!(window.limit, 5000);
        assert_eq!(window.used, 10);
        assert_eq!(window.reset_time.timestamp(), 1_700_000_000);
    }

    #[test]
    fn partial_headers_keep_prior_window() {
        let tracker = RateLimitTracker::new();
        tracker.update(&full_headers(10, 5000, 1_700_000_000));
        let before = tracker.peek();

        let partial = headers(&[(RATE_LIMIT_REMAINING, "0"), (RATE_LIMIT_LIMIT, "5000")]);
        assert!(!tracker.update(&partial));
        assert_eq!(tracker.peek(), before);
    }

    #[test]
    fn unparsable_values_keep_prior_window() {
        let tracker = RateLimitTracker::new();
        tracker.update(&full_headers(10, 5000, 1_700_000_000));
        let before = tracker.peek();

        let garbage = headers(&[
            (RATE_LIMIT_REMAINING, "lots"),
            (RATE_LIMIT_LIMIT, "5000"),
            (RATE_LIMIT_RESET, "1700000000"),
        ]);
        assert!(!tracker.update(&garbage));
        assert_eq!(tracker.peek(), before);
    }

    #[test]
    fn missing_used_is_derived() {
        let h = headers(&[
            (RATE_LIMIT_REMAINING, "40"),
            (RATE_LIMIT_LIMIT, "60"),
            (RATE_LIMIT_RESET, "1700000000"),
        ]);
        assert_eq!(RateLimitWindow::from_headers(&h).unwrap().used, 20);
    }

    #[test]
    fn exhaustion_requires_future_reset() {
        let now = Utc::now();
        let window = RateLimitWindow {
            remaining: 0,
            limit: 60,
            reset_time: now + chrono::Duration::seconds(30),
            used: 60,
        };
        assert!(window.is_exhausted_at(now));
        assert!(!window.is_exhausted_at(now + chrono::Duration::seconds(31)));

        let with_quota = RateLimitWindow {
            remaining: 1,
            ..window
        };
        assert!(!with_quota.is_exhausted_at(now));
    }

    proptest! {
        #[test]
        fn reported_values_are_trusted(remaining in 0u64..10_000, limit in 1u64..10_000, reset in 0i64..4_000_000_000) {
            // No cross-field validation: used + remaining need not equal limit.
            let h = headers(&[
                (RATE_LIMIT_REMAINING, &remaining.to_string()),
                (RATE_LIMIT_LIMIT, &limit.to_string()),
                (RATE_LIMIT_RESET, &reset.to_string()),
                (RATE_LIMIT_USED, "7"),
            ]);
            let window = RateLimitWindow::from_headers(&h).unwrap();
            prop_assert_eq!(window.remaining, remaining);
            prop_assert_eq!(window.limit, limit);
            prop_assert_eq!(window.used, 7);
            prop_assert_eq!(window.reset_time.timestamp(), reset);
        }
    }
}

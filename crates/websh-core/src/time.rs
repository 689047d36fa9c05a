//! Time utilities for websh

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Get the current Unix timestamp in seconds.
///
/// Returns 0 if the system clock is set before the Unix epoch.
pub fn current_time_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Unix timestamp `ttl` from `now_secs`
pub fn expiry_secs(now_secs: u64, ttl: Duration) -> u64 {
    now_secs.saturating_add(ttl.as_secs())
}

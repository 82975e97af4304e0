//! Wall-clock helpers. Every ledger timestamp is Unix seconds.

/// Seconds in a day, for access-window arithmetic.
pub const DAY_SECS: u64 = 24 * 60 * 60;

/// Current Unix time in seconds.
pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Whole days from `now` until `until`, rounded up; zero once passed.
pub fn days_remaining(now: u64, until: u64) -> u64 {
    until.saturating_sub(now).div_ceil(DAY_SECS)
}

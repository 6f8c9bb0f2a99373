/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Milliseconds in one day
pub const DAY_MS: i64 = 86_400_000;

/// Timestamp `days` days before `now` (Unix millis)
pub fn days_before(now: i64, days: i64) -> i64 {
    now - days * DAY_MS
}

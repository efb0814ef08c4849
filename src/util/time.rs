//! Wall-clock helpers shared by the server and the client engine

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Seconds elapsed between two millisecond timestamps, capped at `max_secs`.
///
/// A clock that steps backwards yields zero rather than a negative delta.
pub fn delta_secs(prev_ms: u64, now_ms: u64, max_secs: f32) -> f32 {
    let dt = now_ms.saturating_sub(prev_ms) as f32 / 1000.0;
    dt.min(max_secs)
}

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Local};

/// Returns `None` if the timestamp cannot be represented on this platform.
pub fn unix_to_system_time(seconds: u64) -> Option<SystemTime> {
    UNIX_EPOCH.checked_add(Duration::from_secs(seconds))
}

/// Formats a timestamp in local time, e.g. `2024-02-01 13:05:17`.
pub fn format_system_time(time: SystemTime) -> String {
    let datetime: DateTime<Local> = time.into();
    datetime.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Time that remains from `now` until `deadline`, zero if the deadline has already passed.
pub fn remaining_until(deadline: SystemTime, now: SystemTime) -> Duration {
    deadline.duration_since(now).unwrap_or(Duration::ZERO)
}

#[cfg(not(test))]
pub fn now_wallclock() -> SystemTime {
    SystemTime::now()
}

#[cfg(test)]
pub use mock_time::now_wallclock;

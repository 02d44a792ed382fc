use std::time::SystemTime;
use chrono::{DateTime, Utc};
use crate::common::constants::{LOG_TIMESTAMP_FORMAT, MODTIME_FORMAT};

/// Formats a filesystem modification time the way `info` shelves store it.
///
/// Example: "2024-03-01 12:00:05"
pub fn format_modtime(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format(MODTIME_FORMAT).to_string()
}

/// Timestamp embedded in validation log names, e.g. "2024-03-01T12-00-05".
pub fn log_timestamp(time: DateTime<Utc>) -> String {
    time.format(LOG_TIMESTAMP_FORMAT).to_string()
}

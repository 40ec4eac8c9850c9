/// Core logging implementation with automatic filtering
///
/// Filtering rules:
/// 1. Errors are always shown
/// 2. Everything else is checked against the minimum level threshold

use super::levels::LogLevel;
use super::tags::LogTag;
use once_cell::sync::Lazy;
use std::sync::RwLock;

static MIN_LEVEL: Lazy<RwLock<LogLevel>> = Lazy::new(|| RwLock::new(LogLevel::Info));

/// Set the minimum level threshold (called once from `logger::init`)
pub fn set_min_level(level: LogLevel) {
    if let Ok(mut min) = MIN_LEVEL.write() {
        *min = level;
    }
}

pub fn min_level() -> LogLevel {
    MIN_LEVEL.read().map(|l| *l).unwrap_or(LogLevel::Info)
}

/// Check if a log message should be displayed
pub fn should_log(level: LogLevel) -> bool {
    if level == LogLevel::Error {
        return true;
    }
    level <= min_level()
}

/// Internal logging function with automatic filtering
pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(level) {
        return;
    }
    super::format::format_and_log(tag, level, message);
}

//! Structured logging for nregalens
//!
//! Standard log levels (Error/Warning/Info/Debug) with per-module tags and
//! colored console output.
//!
//! ## Usage
//!
//! ```rust
//! use nregalens::logger::{self, LogTag};
//!
//! logger::info(LogTag::Data, "Snapshot installed");
//! logger::warning(LogTag::Cache, "SQLite unavailable, using memory backend");
//! ```
//!
//! Call `logger::init(level)` once at startup, before any logging occurs.

mod core;
mod format;
mod levels;
mod tags;

pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger system
///
/// `level` is usually parsed from the config file or the NREGALENS_LOG
/// environment variable; the env var wins when both are set.
pub fn init(level: LogLevel) {
    let effective = std::env::var("NREGALENS_LOG")
        .ok()
        .and_then(|s| LogLevel::parse(&s))
        .unwrap_or(level);
    core::set_min_level(effective);
}

/// Log at ERROR level (always shown, critical issues)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level (important issues)
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level (detailed diagnostics)
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

//! Log formatting and output with ANSI colors
//!
//! Handles colorized console output with aligned tag and level columns.

use super::levels::LogLevel;
use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stdout, ErrorKind, Write};

/// Log format widths for alignment
const TAG_WIDTH: usize = 6;
const LEVEL_WIDTH: usize = 7;

/// Format and output a log message
pub fn format_and_log(tag: LogTag, level: LogLevel, message: &str) {
    let time = Local::now().format("%H:%M:%S").to_string();

    let tag_str = format!("{:<width$}", tag.as_str(), width = TAG_WIDTH)
        .color(tag.color())
        .bold();
    let level_str = format_level(level);

    let line = format!("{} [{}] [{}] {}", time.dimmed(), tag_str, level_str, message);
    print_stdout_safe(&line);
}

fn format_level(level: LogLevel) -> ColoredString {
    let padded = format!("{:<width$}", level.as_str(), width = LEVEL_WIDTH);
    match level {
        LogLevel::Error => padded.red().bold(),
        LogLevel::Warning => padded.yellow(),
        LogLevel::Info => padded.normal(),
        LogLevel::Debug => padded.dimmed(),
    }
}

/// Print to stdout, swallowing broken pipes so piped output (e.g. `| head`)
/// does not panic the process.
fn print_stdout_safe(line: &str) {
    let mut out = stdout();
    if let Err(e) = writeln!(out, "{}", line) {
        if e.kind() != ErrorKind::BrokenPipe {
            eprintln!("{}", line);
        }
    }
}

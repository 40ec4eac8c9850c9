/// Module tags for log attribution
///
/// Each subsystem logs under its own tag so output can be scanned
/// (and debug-filtered) per module.

use colored::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Data,
    Cache,
}

impl LogTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Config => "CONFIG",
            LogTag::Data => "DATA",
            LogTag::Cache => "CACHE",
        }
    }

    /// Console color for the tag bracket
    pub fn color(&self) -> Color {
        match self {
            LogTag::System => Color::Magenta,
            LogTag::Config => Color::Yellow,
            LogTag::Data => Color::Green,
            LogTag::Cache => Color::Cyan,
        }
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

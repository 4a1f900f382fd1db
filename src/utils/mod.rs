//! Utility functions and helpers

pub mod logging;

pub use logging::{init_logging, LogContext, LogFormat, LogLevel};

use std::time::Duration;

/// Parse a human-readable duration such as `30s` or `1m 30s`
pub fn parse_duration(s: &str) -> crate::Result<Duration> {
    humantime::parse_duration(s.trim())
        .map_err(|e| crate::Error::config(format!("invalid duration {:?}: {}", s, e)))
}

/// Format a duration the way [`parse_duration`] accepts it
pub fn format_duration(duration: Duration) -> String {
    humantime::format_duration(duration).to_string()
}

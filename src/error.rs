//! Failure classification and reporting
//!
//! Failures are one-shot: nothing here retries. A per-file or per-event
//! failure is categorized, logged, forwarded to the status sink, and then
//! processing moves on.

use crate::status::{StatusLine, StatusSink};

/// Categorized error types for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Reading, writing, stat-ing or removing a file
    FileSystem,

    /// Invalid configuration values (unparsable file, bad glob)
    Configuration,

    /// The filesystem watcher itself failed
    Watch,

    /// Unknown errors
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::FileSystem => "filesystem",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Watch => "watch",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

/// Categorize an error by the first recognizable cause in its chain.
pub fn categorize_error(error: &anyhow::Error) -> ErrorCategory {
    for cause in error.chain() {
        if cause.is::<notify::Error>() {
            return ErrorCategory::Watch;
        }
        if cause.is::<std::io::Error>() {
            return ErrorCategory::FileSystem;
        }
        if cause.is::<glob::PatternError>()
            || cause.is::<serde_json::Error>()
            || cause.is::<toml::de::Error>()
        {
            return ErrorCategory::Configuration;
        }
    }

    ErrorCategory::Unknown
}

/// Log `error` and forward it to `sink` as an `Error:` line.
pub fn report_failure(sink: &dyn StatusSink, error: &anyhow::Error) {
    let category = categorize_error(error);
    tracing::warn!(category = category.as_str(), "{error:#}");
    sink.emit(StatusLine::Error {
        message: format!("{error:#}"),
    });
}

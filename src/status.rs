//! Human-readable status lines
//!
//! The host supplies a [`StatusSink`]; the engine emits one [`StatusLine`]
//! per copy, removal, section start, skipped section and failure.

use colored::*;
use parking_lot::Mutex;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLine {
    Copy {
        source: PathBuf,
        destination: PathBuf,
    },
    Remove {
        path: PathBuf,
    },
    StartWatching {
        source: PathBuf,
        destination: PathBuf,
    },
    DestinationMissing {
        destination: PathBuf,
        section: String,
    },
    Error {
        message: String,
    },
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLine::Copy {
                source,
                destination,
            } => write!(f, "Copy {} => {}", source.display(), destination.display()),
            StatusLine::Remove { path } => write!(f, "Remove {}", path.display()),
            StatusLine::StartWatching {
                source,
                destination,
            } => write!(
                f,
                "Start watching copy from '{}' to '{}'",
                source.display(),
                destination.display()
            ),
            StatusLine::DestinationMissing {
                destination,
                section,
            } => write!(
                f,
                "Destination '{}' does not exist. {} not activated for this destination folder.",
                destination.display(),
                section
            ),
            StatusLine::Error { message } => write!(f, "Error:\n{message}"),
        }
    }
}

impl StatusLine {
    pub fn is_error(&self) -> bool {
        matches!(self, StatusLine::Error { .. })
    }
}

/// Receiver of status lines. Must tolerate calls from many tasks at once.
pub trait StatusSink: Send + Sync {
    fn emit(&self, line: StatusLine);
}

/// Prints status lines to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl StatusSink for ConsoleSink {
    fn emit(&self, line: StatusLine) {
        if line.is_error() {
            tracing::warn!(target: "dx_mirror::status", "{line}");
        } else {
            tracing::info!(target: "dx_mirror::status", "{line}");
        }

        let text = line.to_string();
        let styled = match &line {
            StatusLine::Copy { .. } => text.bright_green(),
            StatusLine::Remove { .. } => text.bright_red(),
            StatusLine::StartWatching { .. } => text.bright_cyan().bold(),
            StatusLine::DestinationMissing { .. } => text.bright_yellow(),
            StatusLine::Error { .. } => text.red().bold(),
        };
        println!("{styled}");
    }
}

/// Keeps every emitted line in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<StatusLine>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the lines emitted so far.
    pub fn lines(&self) -> Vec<StatusLine> {
        self.lines.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&StatusLine) -> bool) -> usize {
        self.lines.lock().iter().filter(|line| predicate(line)).count()
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl StatusSink for MemorySink {
    fn emit(&self, line: StatusLine) {
        self.lines.lock().push(line);
    }
}

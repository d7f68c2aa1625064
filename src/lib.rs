//! # DX Mirror - keep folders in sync in the background
//!
//! Mirrors a filtered subset of files from source trees into destination
//! trees: one bulk reconciliation pass at startup, then live copying driven
//! by a single workspace-wide file watcher.
//!
//! ## Features
//!
//! - **Glob filters**: every include pattern must match, any exclude pattern rejects
//! - **Modification-time decisions**: copy when missing or newer by more than 2 s
//! - **Two-way initial copy**: optionally pull newer destination files back first
//! - **Delete propagation**: opt-in per section
//! - **Per-path serialization**: overlapping events on one file never race
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dx_mirror::{ConsoleSink, MirrorConfig, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = MirrorConfig::from_toml(r#"
//!         [[sections]]
//!         source = "assets"
//!         destination = "dist/assets"
//!         include = ["**/*.png"]
//!         deleteEnabled = true
//!     "#)?;
//!
//!     let mut supervisor = Supervisor::start(".", &config, Arc::new(ConsoleSink)).await?;
//!     tokio::signal::ctrl_c().await?;
//!     supervisor.dispose();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod copy;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod paths;
pub mod scanner;
pub mod section;
pub mod status;
pub mod supervisor;
pub mod watcher;

// Re-export main types for library consumers
pub use config::{MirrorConfig, SectionConfig, SectionEntry};
pub use copy::{copy_if_newer, should_copy, CopyReport, PathLocks, SLACK};
pub use dispatcher::ChangeDispatcher;
pub use matcher::PathMatcher;
pub use paths::RelativePath;
pub use section::{InitReport, PassReport, SectionState, SyncOutcome, SyncSection};
pub use status::{ConsoleSink, MemorySink, StatusLine, StatusSink};
pub use supervisor::{ReconcileSummary, SectionPlan, Supervisor};
pub use watcher::{ChangeEvent, ChangeKind, FileWatcher, WatchMessage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

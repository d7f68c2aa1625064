//! One source root mirrored into one destination root
//!
//! A [`SyncSection`] owns its filters and flags, runs the initial
//! reconciliation, and then reacts to workspace change events. Events for
//! paths outside its source root are cheap no-ops.

use anyhow::{Context as _, Result};
use parking_lot::RwLock;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

use crate::config::SectionConfig;
use crate::copy::{copy_if_newer, PathLocks};
use crate::error::report_failure;
use crate::matcher::PathMatcher;
use crate::paths::{self, RelativePath};
use crate::scanner;
use crate::status::{StatusLine, StatusSink};
use crate::watcher::{ChangeEvent, ChangeKind};

/// Lifecycle of a section: `Idle → Initializing → Watching → Disposed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionState {
    Idle,
    Initializing,
    Watching,
    Disposed,
}

/// Result of handling one change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Outside this section, filtered out, or nothing to act on
    Ignored,
    /// Destination already current
    UpToDate,
    Copied,
    Removed,
    /// The operation failed and was reported
    Failed,
}

/// Counters for one reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    /// Files that passed the filters
    pub matched: usize,
    pub copied: usize,
    pub failed: usize,
}

/// Counters for [`SyncSection::initialize`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InitReport {
    /// Destination → source pass, only with two-way initial copy
    pub reverse: Option<PassReport>,
    pub forward: Option<PassReport>,
}

impl InitReport {
    pub fn copied(&self) -> usize {
        self.reverse.map_or(0, |r| r.copied) + self.forward.map_or(0, |r| r.copied)
    }

    pub fn failed(&self) -> usize {
        self.reverse.map_or(0, |r| r.failed) + self.forward.map_or(0, |r| r.failed)
    }
}

pub struct SyncSection {
    label: String,
    workspace_root: PathBuf,
    source_root: PathBuf,
    destination_root: PathBuf,
    destination_required: bool,
    initial_copy_enabled: bool,
    initial_copy_both_sides: bool,
    delete_enabled: bool,
    matcher: PathMatcher,
    state: RwLock<SectionState>,
    sink: Arc<dyn StatusSink>,
    locks: PathLocks,
}

impl std::fmt::Debug for SyncSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSection")
            .field("label", &self.label)
            .field("source_root", &self.source_root)
            .field("destination_root", &self.destination_root)
            .field("state", &*self.state.read())
            .field("sink", &"<dyn StatusSink>")
            .finish()
    }
}

impl SyncSection {
    /// Build a section, resolving its roots against `workspace_root`.
    ///
    /// Fails only when a filter pattern does not compile.
    pub fn new(
        workspace_root: &Path,
        config: &SectionConfig,
        sink: Arc<dyn StatusSink>,
        locks: PathLocks,
    ) -> Result<Self> {
        let workspace_root = paths::normalize(workspace_root);
        let matcher = PathMatcher::new(
            config.include_patterns.as_deref(),
            config.exclude_patterns.as_deref(),
        )
        .with_context(|| format!("{} has an invalid filter", config.label))?;

        Ok(Self {
            label: config.label.clone(),
            source_root: paths::resolve(&workspace_root, &config.source_root),
            destination_root: paths::resolve(&workspace_root, &config.destination_root),
            workspace_root,
            destination_required: config.destination_required,
            initial_copy_enabled: config.initial_copy_enabled,
            initial_copy_both_sides: config.initial_copy_both_sides,
            delete_enabled: config.delete_enabled,
            matcher,
            state: RwLock::new(SectionState::Idle),
            sink,
            locks,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn destination_root(&self) -> &Path {
        &self.destination_root
    }

    pub fn state(&self) -> SectionState {
        *self.state.read()
    }

    pub(crate) fn set_state(&self, state: SectionState) {
        *self.state.write() = state;
    }

    /// False only when the destination is required and is not a directory.
    pub async fn check_destination_exists(&self) -> bool {
        if !self.destination_required {
            return true;
        }
        fs::metadata(&self.destination_root)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
    }

    /// Run the initial reconciliation.
    ///
    /// With two-way initial copy the destination is first pulled back into
    /// the source, then the forward pass runs as usual. Files are processed
    /// one after another; failures are reported and counted, not returned.
    pub async fn initialize(&self) -> InitReport {
        self.set_state(SectionState::Initializing);

        let mut report = InitReport::default();
        if !self.initial_copy_enabled {
            return report;
        }

        if self.initial_copy_both_sides {
            report.reverse = Some(
                self.reconcile(&self.destination_root, &self.source_root)
                    .await,
            );
        }
        report.forward = Some(
            self.reconcile(&self.source_root, &self.destination_root)
                .await,
        );

        tracing::info!(
            section = %self.label,
            copied = report.copied(),
            failed = report.failed(),
            "initial copy finished"
        );
        report
    }

    async fn reconcile(&self, from_root: &Path, to_root: &Path) -> PassReport {
        let mut pass = PassReport::default();
        let mut scan = scanner::spawn_scan(from_root);
        // a target nested inside the scanned root would otherwise be mirrored into itself
        let nested = to_root.starts_with(from_root);

        while let Some(relative) = scan.recv().await {
            if !self.matcher.matches(&relative) {
                continue;
            }

            let from = relative.join_onto(from_root);
            if nested && from.starts_with(to_root) {
                continue;
            }
            let to = relative.join_onto(to_root);
            pass.matched += 1;

            match copy_if_newer(&from, &to).await {
                Ok(copy) if copy.copied => {
                    pass.copied += 1;
                    self.sink.emit(StatusLine::Copy {
                        source: from,
                        destination: to,
                    });
                }
                Ok(_) => tracing::debug!("up to date: {}", to.display()),
                Err(err) => {
                    pass.failed += 1;
                    report_failure(self.sink.as_ref(), &err);
                }
            }
        }

        pass
    }

    /// Relative path of `path` under the source root.
    ///
    /// `None` when the path lies outside the source root, inside the
    /// destination root, or is the source root itself.
    pub fn relative_path(&self, path: &Path) -> Option<RelativePath> {
        let absolute = paths::resolve(&self.workspace_root, path);
        if self.destination_root.starts_with(&self.source_root)
            && absolute.starts_with(&self.destination_root)
        {
            return None;
        }
        RelativePath::derive(&self.source_root, &absolute).filter(|relative| !relative.is_root())
    }

    fn tracked(&self, path: &Path) -> Option<RelativePath> {
        self.relative_path(path)
            .filter(|relative| self.matcher.matches(relative))
    }

    pub async fn handle(&self, event: &ChangeEvent) -> Result<SyncOutcome> {
        match event.kind {
            ChangeKind::Created => self.on_created(&event.path).await,
            ChangeKind::Modified => self.on_changed(&event.path).await,
            ChangeKind::Deleted => self.on_deleted(&event.path).await,
        }
    }

    pub async fn on_created(&self, path: &Path) -> Result<SyncOutcome> {
        self.mirror(path).await
    }

    pub async fn on_changed(&self, path: &Path) -> Result<SyncOutcome> {
        self.mirror(path).await
    }

    async fn mirror(&self, path: &Path) -> Result<SyncOutcome> {
        let Some(relative) = self.relative_path(path) else {
            return Ok(SyncOutcome::Ignored);
        };
        let source = relative.join_onto(&self.source_root);

        match fs::metadata(&source).await {
            Ok(meta) if meta.is_dir() => return Ok(self.mirror_directory(&source).await),
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(SyncOutcome::Ignored),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!("source vanished before copy: {}", source.display());
                return Ok(SyncOutcome::Ignored);
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to stat source {}", source.display()))
            }
        }

        if !self.matcher.matches(&relative) {
            return Ok(SyncOutcome::Ignored);
        }
        self.mirror_file(&relative).await
    }

    /// A directory appeared in one piece (moved in, extracted): mirror its files.
    async fn mirror_directory(&self, directory: &Path) -> SyncOutcome {
        let mut scan = scanner::spawn_scan(directory);
        let mut copied = false;

        while let Some(nested) = scan.recv().await {
            let Some(relative) = self.tracked(&nested.join_onto(directory)) else {
                continue;
            };
            match self.mirror_file(&relative).await {
                Ok(SyncOutcome::Copied) => copied = true,
                Ok(_) => {}
                Err(err) => report_failure(self.sink.as_ref(), &err),
            }
        }

        if copied {
            SyncOutcome::Copied
        } else {
            SyncOutcome::Ignored
        }
    }

    async fn mirror_file(&self, relative: &RelativePath) -> Result<SyncOutcome> {
        let source = relative.join_onto(&self.source_root);
        let destination = relative.join_onto(&self.destination_root);

        let _guard = self.locks.lock(&destination).await;
        let copy = copy_if_newer(&source, &destination).await?;
        if !copy.copied {
            return Ok(SyncOutcome::UpToDate);
        }

        self.sink.emit(StatusLine::Copy {
            source,
            destination,
        });
        Ok(SyncOutcome::Copied)
    }

    pub async fn on_deleted(&self, path: &Path) -> Result<SyncOutcome> {
        if !self.delete_enabled {
            return Ok(SyncOutcome::Ignored);
        }
        let Some(relative) = self.tracked(path) else {
            return Ok(SyncOutcome::Ignored);
        };
        let source = relative.join_onto(&self.source_root);
        let destination = relative.join_onto(&self.destination_root);

        let _guard = self.locks.lock(&destination).await;
        // a delete overtaken by a later create or rename-into-place is stale
        match fs::symlink_metadata(&source).await {
            Ok(_) => {
                tracing::debug!("source reappeared, keeping {}", destination.display());
                return Ok(SyncOutcome::Ignored);
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to stat source {}", source.display()))
            }
        }
        match fs::symlink_metadata(&destination).await {
            Ok(meta) if !meta.is_dir() => {}
            Ok(_) => return Ok(SyncOutcome::Ignored),
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(SyncOutcome::Ignored),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to stat destination {}", destination.display()))
            }
        }

        fs::remove_file(&destination)
            .await
            .with_context(|| format!("Failed to remove {}", destination.display()))?;

        self.sink.emit(StatusLine::Remove { path: destination });
        Ok(SyncOutcome::Removed)
    }
}

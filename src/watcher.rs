//! Workspace-wide filesystem watcher
//!
//! One debounced `notify` watcher covers the whole workspace tree. Its events
//! are flattened into [`ChangeEvent`]s (one per path) and pushed onto an
//! unbounded channel that the dispatcher drains.

use anyhow::{Context as _, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer_opt, DebounceEventResult, Debouncer, FileIdMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// Type of file change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// A change somewhere in the workspace; not scoped to any section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Path of the changed file, absolute or relative to the workspace root
    pub path: PathBuf,

    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Created)
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Modified)
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Deleted)
    }
}

/// What the event stream carries: a change, or a failure of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchMessage {
    Change(ChangeEvent),
    Failed(String),
}

/// Debounced recursive watcher over one root.
pub struct FileWatcher {
    root: PathBuf,
    debouncer: Option<Debouncer<RecommendedWatcher, FileIdMap>>,
}

impl FileWatcher {
    /// Start watching `root` recursively.
    pub fn new(
        root: impl AsRef<Path>,
        debounce: Duration,
    ) -> Result<(Self, mpsc::UnboundedReceiver<WatchMessage>)> {
        let root = root.as_ref().to_path_buf();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut debouncer = new_debouncer_opt::<_, RecommendedWatcher, FileIdMap>(
            debounce,
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    for debounced in events {
                        for change in translate(&debounced.event) {
                            if tx.send(WatchMessage::Change(change)).is_err() {
                                return;
                            }
                        }
                    }
                }
                Err(errors) => {
                    for error in errors {
                        let _ = tx.send(WatchMessage::Failed(error.to_string()));
                    }
                }
            },
            FileIdMap::new(),
            notify::Config::default(),
        )
        .context("Failed to create filesystem watcher")?;

        debouncer
            .watch(&root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch: {}", root.display()))?;

        tracing::info!("File watcher started: {}", root.display());

        Ok((
            Self {
                root,
                debouncer: Some(debouncer),
            },
            rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_running(&self) -> bool {
        self.debouncer.is_some()
    }

    /// Stop watching; the event channel closes once the debouncer is gone.
    pub fn stop(&mut self) {
        if self.debouncer.take().is_some() {
            tracing::info!("File watcher stopped: {}", self.root.display());
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Flatten a raw notify event into per-path changes.
///
/// Renames become a delete of the old path and a create of the new one.
/// Access and other kinds are dropped.
pub fn translate(event: &Event) -> Vec<ChangeEvent> {
    let each = |kind: ChangeKind| -> Vec<ChangeEvent> {
        event
            .paths
            .iter()
            .map(|path| ChangeEvent::new(path.clone(), kind))
            .collect()
    };

    match event.kind {
        EventKind::Create(_) => each(ChangeKind::Created),
        EventKind::Remove(_) => each(ChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => each(ChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => each(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut changes = Vec::with_capacity(event.paths.len());
            if let Some((from, rest)) = event.paths.split_first() {
                changes.push(ChangeEvent::deleted(from.clone()));
                changes.extend(rest.iter().map(|to| ChangeEvent::created(to.clone())));
            }
            changes
        }
        // direction unknown: decide by what is on disk now
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|path| {
                if path.exists() {
                    ChangeEvent::created(path.clone())
                } else {
                    ChangeEvent::deleted(path.clone())
                }
            })
            .collect(),
        EventKind::Modify(_) => each(ChangeKind::Modified),
        _ => Vec::new(),
    }
}

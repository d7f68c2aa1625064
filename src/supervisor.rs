//! Owner of the active sync sections
//!
//! The supervisor builds sections from configuration, skips the ones that
//! cannot run, initializes the rest one at a time, and then installs a single
//! workspace watcher whose events are fanned out to all of them.

use anyhow::{ensure, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::MirrorConfig;
use crate::copy::PathLocks;
use crate::dispatcher::ChangeDispatcher;
use crate::error::report_failure;
use crate::section::{SectionState, SyncSection};
use crate::status::{StatusLine, StatusSink};
use crate::watcher::{FileWatcher, WatchMessage};

/// Totals of the initialization phase.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Sections that passed validation and were initialized
    pub activated: usize,
    pub copied: usize,
    pub failed: usize,
}

/// What [`Supervisor::plan`] would do with one configured section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionPlan {
    Active {
        label: String,
        source: PathBuf,
        destination: PathBuf,
    },
    /// `source` or `destination` missing from the entry
    Skipped { index: usize },
    /// Destination required but absent
    NotActivated { label: String, destination: PathBuf },
    Invalid { label: String, message: String },
}

pub struct Supervisor {
    workspace_root: PathBuf,
    sink: Arc<dyn StatusSink>,
    locks: PathLocks,
    debounce: Duration,
    sections: Vec<Arc<SyncSection>>,
    watcher: Option<FileWatcher>,
    dispatch: Option<JoinHandle<()>>,
}

impl Supervisor {
    /// Create a supervisor for `workspace_root` with no sections yet.
    ///
    /// The root is canonicalized when it exists, so that its form matches the
    /// paths the OS watcher reports.
    pub fn new(workspace_root: impl Into<PathBuf>, sink: Arc<dyn StatusSink>) -> Self {
        let root: PathBuf = workspace_root.into();
        let workspace_root = root.canonicalize().unwrap_or(root);

        Self {
            workspace_root,
            sink,
            locks: PathLocks::new(),
            debounce: Duration::from_millis(100),
            sections: Vec::new(),
            watcher: None,
            dispatch: None,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Activate, initialize and start watching in one go.
    pub async fn start(
        workspace_root: impl Into<PathBuf>,
        config: &MirrorConfig,
        sink: Arc<dyn StatusSink>,
    ) -> Result<Self> {
        let mut supervisor =
            Self::new(workspace_root, sink).with_debounce(Duration::from_millis(config.debounce_ms));
        supervisor.activate(config).await?;
        supervisor.watch()?;
        Ok(supervisor)
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn sections(&self) -> &[Arc<SyncSection>] {
        &self.sections
    }

    pub fn is_watching(&self) -> bool {
        self.dispatch.is_some()
    }

    /// Build every valid section and run its initial reconciliation.
    ///
    /// Sections are initialized strictly one after another. Entries without
    /// source or destination are skipped silently; sections with a bad filter
    /// or a missing required destination are skipped with a status line.
    pub async fn activate(&mut self, config: &MirrorConfig) -> Result<ReconcileSummary> {
        ensure!(
            self.sections.is_empty() && self.dispatch.is_none(),
            "supervisor for {} is already active",
            self.workspace_root.display()
        );

        let mut summary = ReconcileSummary::default();

        for (index, entry) in config.sections.iter().enumerate() {
            let Some(section_config) = entry.resolve(index) else {
                tracing::debug!("section {} has no source or destination, skipping", index + 1);
                continue;
            };

            let section = match SyncSection::new(
                &self.workspace_root,
                &section_config,
                self.sink.clone(),
                self.locks.clone(),
            ) {
                Ok(section) => section,
                Err(err) => {
                    report_failure(self.sink.as_ref(), &err);
                    continue;
                }
            };

            if !section.check_destination_exists().await {
                tracing::warn!(
                    section = section.label(),
                    "destination {} does not exist, not activated",
                    section.destination_root().display()
                );
                self.sink.emit(StatusLine::DestinationMissing {
                    destination: section.destination_root().to_path_buf(),
                    section: section.label().to_string(),
                });
                continue;
            }

            let report = section.initialize().await;
            summary.activated += 1;
            summary.copied += report.copied();
            summary.failed += report.failed();
            self.sections.push(Arc::new(section));
        }

        Ok(summary)
    }

    /// Install the workspace watcher and start dispatching.
    ///
    /// Returns `false` without installing anything when no section is active.
    /// A watcher that cannot be installed (missing root, exhausted OS watch
    /// limit) is reported and also yields `false`; the sections keep their
    /// initial copy and stay out of `Watching`.
    pub fn watch(&mut self) -> Result<bool> {
        if self.sections.is_empty() || self.dispatch.is_some() {
            return Ok(false);
        }

        let (watcher, events) = match FileWatcher::new(&self.workspace_root, self.debounce) {
            Ok(installed) => installed,
            Err(err) => {
                report_failure(self.sink.as_ref(), &err);
                return Ok(false);
            }
        };
        self.watcher = Some(watcher);
        self.watch_stream(events);
        Ok(true)
    }

    /// Start dispatching from a caller-supplied event stream.
    ///
    /// Used by hosts that already own a watcher; [`Supervisor::watch`]
    /// goes through here as well.
    pub fn watch_stream(&mut self, events: mpsc::UnboundedReceiver<WatchMessage>) -> ChangeDispatcher {
        let dispatcher = ChangeDispatcher::new(self.sections.clone(), self.sink.clone());

        for section in &self.sections {
            section.set_state(SectionState::Watching);
        }
        for section in &self.sections {
            self.sink.emit(StatusLine::StartWatching {
                source: section.source_root().to_path_buf(),
                destination: section.destination_root().to_path_buf(),
            });
        }

        self.dispatch = Some(dispatcher.clone().spawn(events));
        dispatcher
    }

    /// Initialization only, no watcher (one-shot sync).
    pub async fn reconcile_once(
        workspace_root: impl Into<PathBuf>,
        config: &MirrorConfig,
        sink: Arc<dyn StatusSink>,
    ) -> Result<ReconcileSummary> {
        let mut supervisor = Self::new(workspace_root, sink);
        let summary = supervisor.activate(config).await?;
        supervisor.dispose();
        Ok(summary)
    }

    /// Describe what [`Supervisor::activate`] would do, without copying.
    pub async fn plan(&self, config: &MirrorConfig) -> Vec<SectionPlan> {
        let mut plans = Vec::with_capacity(config.sections.len());

        for (index, entry) in config.sections.iter().enumerate() {
            let Some(section_config) = entry.resolve(index) else {
                plans.push(SectionPlan::Skipped { index });
                continue;
            };

            let plan = match SyncSection::new(
                &self.workspace_root,
                &section_config,
                self.sink.clone(),
                self.locks.clone(),
            ) {
                Err(err) => SectionPlan::Invalid {
                    label: section_config.label.clone(),
                    message: format!("{err:#}"),
                },
                Ok(section) => {
                    if section.check_destination_exists().await {
                        SectionPlan::Active {
                            label: section.label().to_string(),
                            source: section.source_root().to_path_buf(),
                            destination: section.destination_root().to_path_buf(),
                        }
                    } else {
                        SectionPlan::NotActivated {
                            label: section.label().to_string(),
                            destination: section.destination_root().to_path_buf(),
                        }
                    }
                }
            };
            plans.push(plan);
        }

        plans
    }

    /// Release the watcher and drop all sections.
    ///
    /// Copies already in flight are not cancelled and may finish afterwards.
    pub fn dispose(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            watcher.stop();
        }
        if let Some(dispatch) = self.dispatch.take() {
            dispatch.abort();
        }
        for section in self.sections.drain(..) {
            section.set_state(SectionState::Disposed);
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.dispose();
    }
}

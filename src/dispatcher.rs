//! Fan-out of workspace change events to sync sections
//!
//! The dispatcher drains one event stream. Each event gets its own task,
//! which hands the event to every watching section concurrently; sections
//! that do not cover the path return immediately.

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::report_failure;
use crate::section::{SectionState, SyncOutcome, SyncSection};
use crate::status::{StatusLine, StatusSink};
use crate::watcher::{ChangeEvent, WatchMessage};

#[derive(Clone)]
pub struct ChangeDispatcher {
    sections: Arc<Vec<Arc<SyncSection>>>,
    sink: Arc<dyn StatusSink>,
}

impl ChangeDispatcher {
    pub fn new(sections: Vec<Arc<SyncSection>>, sink: Arc<dyn StatusSink>) -> Self {
        Self {
            sections: Arc::new(sections),
            sink,
        }
    }

    pub fn sections(&self) -> &[Arc<SyncSection>] {
        &self.sections
    }

    /// Apply `event` to every section in the `Watching` state.
    ///
    /// Returns one outcome per watching section, in section order. Failures
    /// are reported to the sink and show up as [`SyncOutcome::Failed`].
    pub async fn dispatch(&self, event: &ChangeEvent) -> Vec<SyncOutcome> {
        let work = self
            .sections
            .iter()
            .filter(|section| section.state() == SectionState::Watching)
            .map(|section| async move {
                match section.handle(event).await {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        report_failure(self.sink.as_ref(), &err);
                        SyncOutcome::Failed
                    }
                }
            });

        join_all(work).await
    }

    /// Drain `events` until the sender side closes.
    ///
    /// Every change is handled on its own task, so a slow copy never holds
    /// up the stream. Aborting the returned handle stops the loop but leaves
    /// already-started handlers running to completion.
    pub fn spawn(self, mut events: mpsc::UnboundedReceiver<WatchMessage>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(message) = events.recv().await {
                match message {
                    WatchMessage::Change(event) => {
                        let dispatcher = self.clone();
                        tokio::spawn(async move {
                            dispatcher.dispatch(&event).await;
                        });
                    }
                    WatchMessage::Failed(message) => {
                        tracing::error!("watch error: {message}");
                        self.sink.emit(StatusLine::Error { message });
                    }
                }
            }
            tracing::debug!("change stream closed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SectionConfig;
    use crate::copy::PathLocks;
    use crate::status::MemorySink;
    use std::path::Path;
    use tempfile::TempDir;

    fn watching(root: &Path, config: SectionConfig, sink: Arc<MemorySink>) -> Arc<SyncSection> {
        let section = SyncSection::new(root, &config, sink, PathLocks::new()).unwrap();
        section.set_state(SectionState::Watching);
        Arc::new(section)
    }

    #[tokio::test]
    async fn event_reaches_every_covering_section() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("src/a.txt"), "a").unwrap();

        let sink = Arc::new(MemorySink::new());
        let dispatcher = ChangeDispatcher::new(
            vec![
                watching(root, SectionConfig::new("src", "one", false), sink.clone()),
                watching(root, SectionConfig::new("src", "two", false), sink.clone()),
                watching(root, SectionConfig::new("other", "three", false), sink.clone()),
            ],
            sink.clone(),
        );

        let outcomes = dispatcher
            .dispatch(&ChangeEvent::created(root.join("src/a.txt")))
            .await;

        assert_eq!(
            outcomes,
            vec![SyncOutcome::Copied, SyncOutcome::Copied, SyncOutcome::Ignored]
        );
        assert!(root.join("one/a.txt").exists());
        assert!(root.join("two/a.txt").exists());
        assert!(!root.join("three").exists());
    }

    #[tokio::test]
    async fn sections_not_watching_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("src/a.txt"), "a").unwrap();

        let sink = Arc::new(MemorySink::new());
        let idle = Arc::new(
            SyncSection::new(
                root,
                &SectionConfig::new("src", "dst", false),
                sink.clone(),
                PathLocks::new(),
            )
            .unwrap(),
        );
        let dispatcher = ChangeDispatcher::new(vec![idle], sink.clone());

        let outcomes = dispatcher
            .dispatch(&ChangeEvent::modified(root.join("src/a.txt")))
            .await;
        assert!(outcomes.is_empty());
        assert!(!root.join("dst/a.txt").exists());
    }

    #[tokio::test]
    async fn stream_failures_are_reported_and_loop_ends_on_close() {
        let sink = Arc::new(MemorySink::new());
        let dispatcher = ChangeDispatcher::new(Vec::new(), sink.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = dispatcher.spawn(rx);
        tx.send(WatchMessage::Failed("inotify watch limit reached".into()))
            .unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(
            sink.lines(),
            vec![StatusLine::Error {
                message: "inotify watch limit reached".into()
            }]
        );
    }
}

//! Lazy enumeration of every file under a root

use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use walkdir::WalkDir;

use crate::paths::RelativePath;

/// Relative paths buffered ahead of the consumer by [`spawn_scan`].
const SCAN_BUFFER: usize = 256;

/// Single-use walk over the files below a root.
///
/// Directories are descended into but never yielded. Entries whose type
/// cannot be determined (permission errors, dangling links, races with
/// deletion) are skipped. Symbolic links are yielded when they resolve to a
/// regular file and skipped otherwise.
pub struct TreeScan {
    root: PathBuf,
    walker: walkdir::IntoIter,
}

/// Start a walk of `root`. A missing root yields nothing.
pub fn enumerate(root: &Path) -> TreeScan {
    TreeScan {
        root: root.to_path_buf(),
        walker: WalkDir::new(root).follow_links(false).into_iter(),
    }
}

impl Iterator for TreeScan {
    type Item = RelativePath;

    fn next(&mut self) -> Option<RelativePath> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::debug!("skipping unreadable entry: {err}");
                    continue;
                }
            };

            let file_type = entry.file_type();
            let is_file = if file_type.is_symlink() {
                std::fs::metadata(entry.path())
                    .map(|meta| meta.is_file())
                    .unwrap_or(false)
            } else {
                file_type.is_file()
            };
            if !is_file {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let relative = RelativePath::from_relative(relative);
            if !relative.is_root() {
                return Some(relative);
            }
        }
    }
}

/// Walk `root` on the blocking pool, handing paths over a bounded channel.
///
/// The walk only runs ahead of the consumer by a small buffer and stops as
/// soon as the receiver is dropped.
pub fn spawn_scan(root: &Path) -> mpsc::Receiver<RelativePath> {
    let (tx, rx) = mpsc::channel(SCAN_BUFFER);
    let root = root.to_path_buf();

    tokio::task::spawn_blocking(move || {
        for relative in enumerate(&root) {
            if tx.blocking_send(relative).is_err() {
                break;
            }
        }
    });

    rx
}

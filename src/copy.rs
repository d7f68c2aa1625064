//! Modification-time based copy decisions and the copy itself
//!
//! A copy happens when the destination is missing, or when the source is
//! newer than the destination by more than [`SLACK`]. After copying, the
//! destination mtime is pinned to the source mtime so the pair settles into
//! "up to date" until the source changes again.

use anyhow::{anyhow, Context as _, Result};
use dashmap::DashMap;
use filetime::FileTime;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Tolerance that masks mtime-resolution differences between filesystems.
pub const SLACK: Duration = Duration::from_millis(2000);

/// Outcome of [`copy_if_newer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyReport {
    pub copied: bool,
}

/// Pure copy decision.
///
/// `dst_mtime == None` means the destination does not exist.
pub fn should_copy(src_mtime: SystemTime, dst_mtime: Option<SystemTime>) -> bool {
    match dst_mtime {
        None => true,
        // Err means the destination is the newer side
        Some(dst) => match src_mtime.duration_since(dst) {
            Ok(ahead) => ahead > SLACK,
            Err(_) => false,
        },
    }
}

/// Copy `src` over `dst` when [`should_copy`] says so.
pub async fn copy_if_newer(src: &Path, dst: &Path) -> Result<CopyReport> {
    let src_meta = fs::metadata(src)
        .await
        .with_context(|| format!("Failed to stat source {}", src.display()))?;
    let src_mtime = src_meta
        .modified()
        .with_context(|| format!("No modification time for {}", src.display()))?;

    let dst_mtime = match fs::metadata(dst).await {
        Ok(meta) => Some(
            meta.modified()
                .with_context(|| format!("No modification time for {}", dst.display()))?,
        ),
        Err(err) if err.kind() == ErrorKind::NotFound => None,
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to stat destination {}", dst.display()))
        }
    };

    if !should_copy(src_mtime, dst_mtime) {
        return Ok(CopyReport { copied: false });
    }

    copy_file(src, dst, src_mtime).await?;
    Ok(CopyReport { copied: true })
}

/// Stream `src` into `dst`, then stamp `dst` with `mtime`.
///
/// Missing parent directories of `dst` are created. Both handles are scoped
/// to the transfer and released on every exit path; a failure midway can
/// leave a truncated `dst` behind, which is reported, not cleaned up.
pub async fn copy_file(src: &Path, dst: &Path, mtime: SystemTime) -> Result<u64> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let bytes = {
        let mut reader = fs::File::open(src)
            .await
            .with_context(|| format!("Failed to open {}", src.display()))?;
        let mut writer = fs::File::create(dst)
            .await
            .with_context(|| format!("Failed to create {}", dst.display()))?;

        let bytes = tokio::io::copy(&mut reader, &mut writer)
            .await
            .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;
        writer
            .flush()
            .await
            .with_context(|| format!("Failed to flush {}", dst.display()))?;
        bytes
    };

    let stamp = FileTime::from_system_time(mtime);
    let target = dst.to_path_buf();
    tokio::task::spawn_blocking(move || filetime::set_file_mtime(&target, stamp))
        .await
        .map_err(|err| anyhow!("failed to join timestamp task: {err}"))?
        .with_context(|| format!("Failed to set modification time on {}", dst.display()))?;

    Ok(bytes)
}

/// Async locks keyed by destination path.
///
/// Live copies and deletes of the same destination run one at a time;
/// entries are dropped again once nobody holds or waits on them.
#[derive(Clone, Default)]
pub struct PathLocks {
    inner: Arc<DashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, path: &Path) -> PathGuard {
        let mutex = self
            .inner
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        let guard = mutex.clone().lock_owned().await;

        PathGuard {
            locks: self.clone(),
            path: path.to_path_buf(),
            mutex,
            guard: Some(guard),
        }
    }

    /// Number of paths currently locked or contended.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Held for the duration of one copy or delete.
pub struct PathGuard {
    locks: PathLocks,
    path: PathBuf,
    mutex: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        self.guard.take();
        // the table and this guard are the only owners left: nobody waits
        let mutex = &self.mutex;
        self.locks.inner.remove_if(&self.path, |_, entry| {
            Arc::ptr_eq(entry, mutex) && Arc::strong_count(entry) == 2
        });
    }
}

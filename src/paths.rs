//! Root normalization and relative-path derivation
//!
//! Every root and event path goes through [`resolve`] before it is compared,
//! so `/work/./src/`, `/work/src` and `src` (relative to `/work`) all meet as
//! the same key. Normalization is purely lexical: roots do not need to exist.

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Resolve `path` against `base` when it is relative, then normalize it.
pub fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base.join(path))
    }
}

/// Lexically drop `.` segments, fold `..` segments and trailing separators.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `..` above the root stays at the root
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }

    out
}

/// A path relative to a section root, always `/`-separated.
///
/// This is the key filters are matched against and the key that correlates a
/// source file with its mirrored destination file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelativePath(String);

impl RelativePath {
    /// Strip `root` from `absolute`.
    ///
    /// Returns `None` when `absolute` is not under `root`. Both arguments are
    /// expected to be normalized already (see [`resolve`]).
    pub fn derive(root: &Path, absolute: &Path) -> Option<Self> {
        let rest = absolute.strip_prefix(root).ok()?;
        Some(Self::from_relative(rest))
    }

    /// Build from an already-relative filesystem path.
    pub fn from_relative(path: &Path) -> Self {
        let segments: Vec<String> = path
            .components()
            .filter_map(|component| match component {
                Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        Self(segments.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the root itself (empty relative path).
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Re-anchor this relative path under `root`.
    pub fn join_onto(&self, root: &Path) -> PathBuf {
        let mut joined = root.to_path_buf();
        for segment in self.0.split('/').filter(|segment| !segment.is_empty()) {
            joined.push(segment);
        }
        joined
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RelativePath {
    fn from(value: &str) -> Self {
        Self::from_relative(Path::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_dots_and_trailing_separator() {
        assert_eq!(
            normalize(Path::new("/work/./src/../dist/")),
            PathBuf::from("/work/dist")
        );
        assert_eq!(normalize(Path::new("/../etc")), PathBuf::from("/etc"));
    }

    #[test]
    fn resolve_anchors_relative_paths() {
        let base = Path::new("/work");
        assert_eq!(resolve(base, Path::new("src/")), PathBuf::from("/work/src"));
        assert_eq!(resolve(base, Path::new("/abs/dir")), PathBuf::from("/abs/dir"));
    }

    #[test]
    fn derive_strips_root_and_leading_separator() {
        let rel = RelativePath::derive(Path::new("/work/src"), Path::new("/work/src/a/b.txt"));
        assert_eq!(rel.unwrap().as_str(), "a/b.txt");
    }

    #[test]
    fn derive_outside_root_is_none() {
        assert!(RelativePath::derive(Path::new("/work/src"), Path::new("/work/other/a.txt")).is_none());
        // component-wise, not string prefix
        assert!(RelativePath::derive(Path::new("/work/src"), Path::new("/work/src2/a.txt")).is_none());
    }

    #[test]
    fn derive_of_root_itself_is_empty() {
        let rel = RelativePath::derive(Path::new("/work/src"), Path::new("/work/src")).unwrap();
        assert!(rel.is_root());
        assert_eq!(rel.join_onto(Path::new("/dst")), PathBuf::from("/dst"));
    }

    #[test]
    fn join_onto_rebuilds_native_path() {
        let rel = RelativePath::from("nested/dir/file.txt");
        assert_eq!(
            rel.join_onto(Path::new("/mirror")),
            PathBuf::from("/mirror/nested/dir/file.txt")
        );
    }
}

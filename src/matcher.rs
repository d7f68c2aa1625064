//! Include/exclude glob filtering of relative paths
//!
//! Semantics differ from the usual "any include matches" rule: a path must
//! satisfy *every* include pattern, and is then dropped if it satisfies *any*
//! exclude pattern. An absent or empty include set matches everything.

use anyhow::{Context as _, Result};
use glob::{MatchOptions, Pattern};

use crate::paths::RelativePath;

/// `*` and `?` never cross a `/`; only `**` spans directories.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Compiled include/exclude pattern sets for one section.
#[derive(Debug, Clone, Default)]
pub struct PathMatcher {
    includes: Option<Vec<Pattern>>,
    excludes: Vec<Pattern>,
}

impl PathMatcher {
    /// Compile both pattern sets, failing on the first invalid glob.
    pub fn new(includes: Option<&[String]>, excludes: Option<&[String]>) -> Result<Self> {
        let includes = includes.map(compile).transpose()?;
        let excludes = excludes.map(compile).transpose()?.unwrap_or_default();
        Ok(Self { includes, excludes })
    }

    /// A matcher with no filters at all.
    pub fn match_all() -> Self {
        Self::default()
    }

    pub fn matches(&self, path: &RelativePath) -> bool {
        matches(path.as_str(), self.includes.as_deref(), &self.excludes)
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|raw| Pattern::new(raw).with_context(|| format!("Invalid glob pattern '{raw}'")))
        .collect()
}

/// Evaluate a `/`-separated relative path against the pattern sets.
///
/// The empty path (the root itself) only matches when an include pattern
/// explicitly matches the empty string.
pub fn matches(path: &str, includes: Option<&[Pattern]>, excludes: &[Pattern]) -> bool {
    let included = match includes {
        Some(patterns) if !patterns.is_empty() => patterns
            .iter()
            .all(|pattern| pattern.matches_with(path, MATCH_OPTIONS)),
        _ => !path.is_empty(),
    };

    included
        && !excludes
            .iter()
            .any(|pattern| pattern.matches_with(path, MATCH_OPTIONS))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(includes: Option<&[&str]>, excludes: Option<&[&str]>) -> PathMatcher {
        let owned = |set: &[&str]| set.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let includes = includes.map(owned);
        let excludes = excludes.map(owned);
        PathMatcher::new(includes.as_deref(), excludes.as_deref()).unwrap()
    }

    #[test]
    fn absent_includes_match_everything() {
        let m = matcher(None, None);
        assert!(m.matches(&"a.bin".into()));
        assert!(m.matches(&"deep/nested/a.txt".into()));
    }

    #[test]
    fn recursive_include_matches_top_level_and_nested() {
        let m = matcher(Some(&["**/*.txt"]), None);
        assert!(m.matches(&"a.txt".into()));
        assert!(m.matches(&"x/y/z.txt".into()));
        assert!(!m.matches(&"a.bin".into()));
    }

    #[test]
    fn includes_are_conjunctive() {
        let m = matcher(Some(&["**/*.txt", "docs/**/*"]), None);
        assert!(m.matches(&"docs/readme.txt".into()));
        assert!(!m.matches(&"readme.txt".into()));
        assert!(!m.matches(&"docs/logo.png".into()));
    }

    #[test]
    fn any_exclude_rejects() {
        let m = matcher(None, Some(&["**/*.log", "tmp/**/*"]));
        assert!(m.matches(&"src/main.rs".into()));
        assert!(!m.matches(&"build.log".into()));
        assert!(!m.matches(&"tmp/cache/a.rs".into()));
    }

    #[test]
    fn single_star_does_not_cross_directories() {
        let m = matcher(Some(&["*.txt"]), None);
        assert!(m.matches(&"a.txt".into()));
        assert!(!m.matches(&"sub/a.txt".into()));
    }

    #[test]
    fn empty_include_set_behaves_like_absent() {
        let m = matcher(Some(&[]), None);
        assert!(m.matches(&"anything.dat".into()));
    }

    #[test]
    fn root_path_is_not_matched() {
        assert!(!matcher(None, None).matches(&"".into()));
        assert!(!matcher(Some(&["**/*.txt"]), None).matches(&"".into()));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = PathMatcher::new(Some(&["a/***b".to_string()]), None).unwrap_err();
        assert!(err.to_string().contains("a/***b"));
    }
}

//! Mirror configuration (`.dx/mirror.toml` or `.dx/mirror.json`)
//!
//! Keys are camelCase in both formats:
//!
//! ```toml
//! debounceMs = 100
//!
//! [[sections]]
//! name = "assets"
//! source = "assets"
//! destination = "dist/assets"
//! include = ["**/*.png"]
//! deleteEnabled = true
//! ```

use anyhow::{Context as _, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Searched in order by [`MirrorConfig::discover`].
pub const CONFIG_CANDIDATES: [&str; 2] = [".dx/mirror.toml", ".dx/mirror.json"];

const DEFAULT_DEBOUNCE_MS: u64 = 100;

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_true() -> bool {
    true
}

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorConfig {
    #[serde(default)]
    pub sections: Vec<SectionEntry>,

    /// Watcher debounce window in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            sections: Vec::new(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl MirrorConfig {
    /// Load from `path`; `.toml` files are parsed as TOML, anything else as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        if is_toml {
            Self::from_toml(&raw).with_context(|| format!("Invalid config {}", path.display()))
        } else {
            Self::from_json(&raw).with_context(|| format!("Invalid config {}", path.display()))
        }
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Find and load the first config file under `workspace_root`.
    pub fn discover(workspace_root: &Path) -> Result<Option<(PathBuf, Self)>> {
        for candidate in CONFIG_CANDIDATES {
            let path = workspace_root.join(candidate);
            if path.is_file() {
                let config = Self::load(&path)?;
                return Ok(Some((path, config)));
            }
        }
        Ok(None)
    }
}

/// One section as written in the config file.
///
/// `deleteEnabled` has no default and must be spelled out.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionEntry {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub source: Option<String>,

    #[serde(default)]
    pub destination: Option<String>,

    #[serde(default)]
    pub destination_required: bool,

    #[serde(default)]
    pub include: Option<Vec<String>>,

    #[serde(default)]
    pub exclude: Option<Vec<String>>,

    #[serde(default = "default_true")]
    pub initial_copy: bool,

    #[serde(default)]
    pub initial_copy_both_sides: bool,

    pub delete_enabled: bool,
}

impl SectionEntry {
    /// Turn the entry into a [`SectionConfig`].
    ///
    /// Returns `None` when `source` or `destination` is missing or blank;
    /// such entries are skipped, not rejected. `index` is zero-based and only
    /// used for the default label.
    pub fn resolve(&self, index: usize) -> Option<SectionConfig> {
        let source = non_blank(self.source.as_deref())?;
        let destination = non_blank(self.destination.as_deref())?;

        let label = non_blank(self.name.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Mirror section {}", index + 1));

        Some(SectionConfig {
            label,
            source_root: PathBuf::from(source),
            destination_root: PathBuf::from(destination),
            destination_required: self.destination_required,
            include_patterns: self.include.clone(),
            exclude_patterns: self.exclude.clone(),
            initial_copy_enabled: self.initial_copy,
            initial_copy_both_sides: self.initial_copy_both_sides,
            delete_enabled: self.delete_enabled,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Validated settings of one sync section.
///
/// Roots may be relative; they are resolved against the workspace root when
/// the section is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionConfig {
    pub label: String,
    pub source_root: PathBuf,
    pub destination_root: PathBuf,
    pub destination_required: bool,
    pub include_patterns: Option<Vec<String>>,
    pub exclude_patterns: Option<Vec<String>>,
    pub initial_copy_enabled: bool,
    pub initial_copy_both_sides: bool,
    pub delete_enabled: bool,
}

impl SectionConfig {
    /// A section with no filters and a one-way initial copy.
    pub fn new(
        source_root: impl Into<PathBuf>,
        destination_root: impl Into<PathBuf>,
        delete_enabled: bool,
    ) -> Self {
        Self {
            label: "Mirror section".to_string(),
            source_root: source_root.into(),
            destination_root: destination_root.into(),
            destination_required: false,
            include_patterns: None,
            exclude_patterns: None,
            initial_copy_enabled: true,
            initial_copy_both_sides: false,
            delete_enabled,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_includes<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_patterns = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_excludes<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_patterns = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    pub fn destination_required(mut self, required: bool) -> Self {
        self.destination_required = required;
        self
    }

    pub fn initial_copy(mut self, enabled: bool, both_sides: bool) -> Self {
        self.initial_copy_enabled = enabled;
        self.initial_copy_both_sides = both_sides;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_json_with_defaults() {
        let config = MirrorConfig::from_json(
            r#"{ "sections": [ { "source": "src", "destination": "out", "deleteEnabled": false } ] }"#,
        )
        .unwrap();

        assert_eq!(config.debounce_ms, 100);
        let section = config.sections[0].resolve(0).unwrap();
        assert_eq!(section.label, "Mirror section 1");
        assert!(section.initial_copy_enabled);
        assert!(!section.initial_copy_both_sides);
        assert!(!section.destination_required);
        assert!(section.include_patterns.is_none());
        assert!(!section.delete_enabled);
    }

    #[test]
    fn parses_toml_camel_case_keys() {
        let config = MirrorConfig::from_toml(
            r#"
debounceMs = 250

[[sections]]
name = "docs"
source = "docs"
destination = "site/docs"
destinationRequired = true
include = ["**/*.md"]
exclude = ["drafts/**/*"]
initialCopyBothSides = true
deleteEnabled = true
"#,
        )
        .unwrap();

        assert_eq!(config.debounce_ms, 250);
        let section = config.sections[0].resolve(0).unwrap();
        assert_eq!(section.label, "docs");
        assert!(section.destination_required);
        assert!(section.initial_copy_both_sides);
        assert!(section.delete_enabled);
        assert_eq!(section.include_patterns, Some(vec!["**/*.md".to_string()]));
    }

    #[test]
    fn delete_enabled_is_required() {
        let err = MirrorConfig::from_json(r#"{ "sections": [ { "source": "a", "destination": "b" } ] }"#)
            .unwrap_err();
        assert!(format!("{err:#}").contains("deleteEnabled"));
    }

    #[test]
    fn blank_source_or_destination_is_skipped() {
        let config = MirrorConfig::from_json(
            r#"{ "sections": [
                { "source": "  ", "destination": "b", "deleteEnabled": false },
                { "source": "a", "deleteEnabled": false }
            ] }"#,
        )
        .unwrap();

        assert!(config.sections[0].resolve(0).is_none());
        assert!(config.sections[1].resolve(1).is_none());
    }

    #[test]
    fn discover_prefers_toml() {
        let temp_dir = TempDir::new().unwrap();
        let dx = temp_dir.path().join(".dx");
        std::fs::create_dir_all(&dx).unwrap();
        std::fs::write(dx.join("mirror.json"), r#"{ "debounceMs": 5 }"#).unwrap();
        std::fs::write(dx.join("mirror.toml"), "debounceMs = 7").unwrap();

        let (path, config) = MirrorConfig::discover(temp_dir.path()).unwrap().unwrap();
        assert!(path.ends_with("mirror.toml"));
        assert_eq!(config.debounce_ms, 7);
    }

    #[test]
    fn discover_without_file_is_none() {
        let temp_dir = TempDir::new().unwrap();
        assert!(MirrorConfig::discover(temp_dir.path()).unwrap().is_none());
    }
}

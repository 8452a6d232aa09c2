//! Run contexts and the immutable file sets they carry.
//!
//! A [`RunContext`] describes *why* the runner was invoked and which files the
//! invocation covers. It is built once per run and read-only afterwards; task
//! eligibility is a plain membership test against [`ContextKind`].

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Invocation kind for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextKind {
    /// Triggered by the git pre-commit hook; only staged content is validated.
    PreCommit,
    /// Manual run against an explicit or tracked file list.
    AdHoc,
    /// Continuous-integration run over the full tracked file list.
    Integration,
}

impl ContextKind {
    /// All kinds, in declaration order. Used as the default eligibility set
    /// for tasks that do not restrict their contexts.
    pub fn all() -> Vec<ContextKind> {
        vec![
            ContextKind::PreCommit,
            ContextKind::AdHoc,
            ContextKind::Integration,
        ]
    }
}

/// Ordered, deduplicated set of file paths.
///
/// Filtering operations return new sets; a `FileSet` is never mutated after
/// construction and must be queried fresh at the start of each run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    paths: Vec<PathBuf>,
}

impl FileSet {
    /// Build a set from paths, deduplicating while preserving first-seen order.
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut seen = Vec::new();
        for path in paths {
            if !seen.contains(&path) {
                seen.push(path);
            }
        }
        Self { paths: seen }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }

    /// Keep only paths whose extension is in `extensions` (without the dot).
    ///
    /// An empty `extensions` list keeps every path: a task that declares no
    /// trigger extensions runs against the full file set.
    pub fn with_extensions(&self, extensions: &[String]) -> FileSet {
        if extensions.is_empty() {
            return self.clone();
        }
        let paths = self
            .paths
            .iter()
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| extensions.iter().any(|e| e == ext))
            })
            .cloned()
            .collect();
        FileSet { paths }
    }

    /// Drop paths matching any of the given patterns.
    pub fn reject_patterns(&self, patterns: &[Regex]) -> FileSet {
        if patterns.is_empty() {
            return self.clone();
        }
        let paths = self
            .paths
            .iter()
            .filter(|path| {
                let text = path.to_string_lossy();
                !patterns.iter().any(|pattern| pattern.is_match(&text))
            })
            .cloned()
            .collect();
        FileSet { paths }
    }
}

/// Immutable description of a single runner invocation.
#[derive(Debug, Clone)]
pub struct RunContext {
    kind: ContextKind,
    files: FileSet,
}

impl RunContext {
    pub fn new(kind: ContextKind, files: FileSet) -> Self {
        Self { kind, files }
    }

    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    pub fn files(&self) -> &FileSet {
        &self.files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(paths: &[&str]) -> FileSet {
        FileSet::new(paths.iter().map(PathBuf::from))
    }

    #[test]
    fn dedups_preserving_order() {
        let files = set(&["b.rs", "a.rs", "b.rs"]);
        let collected: Vec<_> = files.iter().map(|p| p.display().to_string()).collect();
        assert_eq!(collected, vec!["b.rs", "a.rs"]);
    }

    #[test]
    fn extension_filter_keeps_matching_paths() {
        let files = set(&["src/lib.rs", "README.md", "src/main.rs"]);
        let filtered = files.with_extensions(&["rs".to_string()]);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|p| p.extension().is_some()));
    }

    #[test]
    fn empty_extension_filter_keeps_everything() {
        let files = set(&["src/lib.rs", "README.md"]);
        assert_eq!(files.with_extensions(&[]), files);
    }

    #[test]
    fn reject_patterns_drops_matches() {
        let files = set(&["src/lib.rs", "vendor/dep.rs", "tests/it.rs"]);
        let patterns = vec![Regex::new("^vendor/").expect("regex")];
        let filtered = files.reject_patterns(&patterns);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|p| !p.starts_with("vendor")));
    }
}

//! Entry-point discovery for the build system.
//!
//! Walks the source root for files whose extension is one of the entry
//! extensions, pruning ignored directories before descending into them and
//! skipping files whose stem matches an ignore rule.

use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::build::path::{entry_glob, entry_key, GlobMatcher};
use crate::config::IgnoreConfig;

/// Logical entry key -> absolute source path, ordered by key.
pub type EntryMap = BTreeMap<String, PathBuf>;

/// Error during entry-point discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Invalid glob pattern (including an empty extension set)
    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
    /// Ignore rule that is not a valid regular expression
    #[error("Invalid ignore rule '{rule}': {error}")]
    InvalidIgnoreRule { rule: String, error: regex::Error },
    /// IO error during file enumeration
    #[error("IO error during discovery under {}: {error}", root.display())]
    Io { root: PathBuf, error: walkdir::Error },
}

/// Compiled exclusion predicates.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    file_prefix: Option<Regex>,
    file_suffix: Option<Regex>,
    dir_prefix: Option<Regex>,
    dir_suffix: Option<Regex>,
    dir_names: Vec<String>,
}

fn compile_rule(rule: &Option<String>, anchored: impl Fn(&str) -> String) -> Result<Option<Regex>, DiscoveryError> {
    match rule.as_deref().filter(|r| !r.is_empty()) {
        Some(rule) => Regex::new(&anchored(rule))
            .map(Some)
            .map_err(|error| DiscoveryError::InvalidIgnoreRule { rule: rule.to_string(), error }),
        None => Ok(None),
    }
}

impl IgnoreRules {
    /// Compile rules from (already expanded) ignore configuration.
    pub fn from_config(config: &IgnoreConfig) -> Result<Self, DiscoveryError> {
        let config = config.expanded();
        let prefix = |r: &str| format!("^(?:{})", r);
        let suffix = |r: &str| format!("(?:{})$", r);
        Ok(Self {
            file_prefix: compile_rule(&config.file_prefix, prefix)?,
            file_suffix: compile_rule(&config.file_suffix, suffix)?,
            dir_prefix: compile_rule(&config.dir_prefix, prefix)?,
            dir_suffix: compile_rule(&config.dir_suffix, suffix)?,
            dir_names: config.dir_names.unwrap_or_default(),
        })
    }

    /// True when the file's stem (extension stripped) matches a file rule.
    pub fn ignores_file(&self, path: &Path) -> bool {
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy()) else {
            return false;
        };
        [&self.file_prefix, &self.file_suffix].into_iter().flatten().any(|re| re.is_match(&stem))
    }

    /// True when a directory with this name must not be descended into.
    pub fn ignores_dir(&self, name: &str) -> bool {
        self.dir_names.iter().any(|n| n == name)
            || [&self.dir_prefix, &self.dir_suffix].into_iter().flatten().any(|re| re.is_match(name))
    }
}

/// Discovered entry points of one builder.
#[derive(Debug, Clone)]
pub struct EntryPointIndex {
    source_root: PathBuf,
    extensions: Vec<String>,
    rules: IgnoreRules,
    matcher: GlobMatcher,
    entries: EntryMap,
}

impl EntryPointIndex {
    /// Create an (empty) index. Fails before touching the filesystem when the
    /// entry glob cannot be built.
    pub fn new(
        source_root: impl Into<PathBuf>,
        extensions: &[String],
        rules: IgnoreRules,
    ) -> Result<Self, DiscoveryError> {
        let source_root = source_root.into();
        let pattern = entry_glob(&source_root, extensions);
        if extensions.is_empty() {
            return Err(DiscoveryError::InvalidPattern {
                pattern,
                message: "entry extension set is empty".to_string(),
            });
        }
        let matcher = GlobMatcher::new(&pattern)
            .map_err(|e| DiscoveryError::InvalidPattern { pattern: pattern.clone(), message: e.to_string() })?;

        Ok(Self { source_root, extensions: extensions.to_vec(), rules, matcher, entries: EntryMap::new() })
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn rules(&self) -> &IgnoreRules {
        &self.rules
    }

    /// The entry glob this index evaluates.
    pub fn pattern(&self) -> &str {
        self.matcher.as_str()
    }

    /// Recompute the index from the filesystem.
    ///
    /// A missing source root yields an empty index. When two files share a key
    /// (same stem, different extension) the first in walk order is kept.
    /// Symlinked files are entries; symlinked directories are not descended.
    pub fn discover(&mut self) -> Result<&EntryMap, DiscoveryError> {
        let mut entries = EntryMap::new();

        if self.source_root.is_dir() {
            let walker = WalkDir::new(&self.source_root)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| {
                    entry.depth() == 0
                        || !entry.file_type().is_dir()
                        || !self.rules.ignores_dir(&entry.file_name().to_string_lossy())
                });

            for entry in walker {
                let entry = entry
                    .map_err(|error| DiscoveryError::Io { root: self.source_root.clone(), error })?;
                let is_file = entry.file_type().is_file()
                    || (entry.path_is_symlink() && entry.path().is_file());
                if !is_file || !self.is_candidate(entry.path()) {
                    continue;
                }
                let Some(key) = entry_key(entry.path(), &self.source_root) else {
                    continue;
                };
                if let Some(existing) = entries.get(&key) {
                    tracing::warn!(
                        key = %key,
                        kept = %existing.display(),
                        skipped = %entry.path().display(),
                        "duplicate entry key"
                    );
                    continue;
                }
                entries.insert(key, entry.path().to_path_buf());
            }
        }

        self.entries = entries;
        Ok(&self.entries)
    }

    /// Entry-glob match and file rules, ignoring directory pruning.
    fn is_candidate(&self, path: &Path) -> bool {
        self.matcher.matches(path) && !self.rules.ignores_file(path)
    }

    /// Entries from the last `discover()` call.
    pub fn entries(&self) -> &EntryMap {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Key of a known entry source.
    pub fn key_for(&self, source: &Path) -> Option<&str> {
        self.entries.iter().find(|(_, path)| path.as_path() == source).map(|(key, _)| key.as_str())
    }

    pub fn contains_source(&self, source: &Path) -> bool {
        self.key_for(source).is_some()
    }

    /// Drop an entry by source path, returning its key.
    pub fn remove_source(&mut self, source: &Path) -> Option<String> {
        let key = self.key_for(source)?.to_string();
        self.entries.remove(&key);
        Some(key)
    }

    /// Known entries located anywhere under `dir`.
    pub fn sources_under(&self, dir: &Path) -> Vec<PathBuf> {
        self.entries.values().filter(|path| path.starts_with(dir)).cloned().collect()
    }
}

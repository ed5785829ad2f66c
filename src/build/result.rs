//! Build result types.
//!
//! Records the outcome of every entry compiled during a full or partial build.

use std::path::PathBuf;
use std::time::Duration;

/// Outcome of compiling one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    /// Artifact written
    Built,
    /// Compile or write failed
    Failed(String),
}

impl EntryStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, EntryStatus::Failed(_))
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryStatus::Built => write!(f, "built"),
            EntryStatus::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// Result of building a single entry.
#[derive(Debug, Clone)]
pub struct EntryResult {
    /// Entry key
    pub key: String,
    /// Source file
    pub source: PathBuf,
    pub status: EntryStatus,
    /// Files written (artifact, source map, assets)
    pub outputs: Vec<PathBuf>,
    pub duration: Duration,
}

impl EntryResult {
    pub fn built(key: String, source: PathBuf, outputs: Vec<PathBuf>, duration: Duration) -> Self {
        Self { key, source, status: EntryStatus::Built, outputs, duration }
    }

    pub fn failed(key: String, source: PathBuf, error: String, duration: Duration) -> Self {
        Self { key, source, status: EntryStatus::Failed(error), outputs: vec![], duration }
    }

    pub fn is_success(&self) -> bool {
        !self.status.is_failure()
    }
}

/// Result of one build run over a set of entries.
#[derive(Debug, Clone, Default)]
pub struct BuildResult {
    /// Results in build order
    pub entries: Vec<EntryResult>,
    /// Wall time of the whole run
    pub total_duration: Duration,
}

impl BuildResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_result(&mut self, result: EntryResult) {
        self.entries.push(result);
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    /// Append another run's results.
    pub fn merge(&mut self, other: BuildResult) {
        self.entries.extend(other.entries);
        self.total_duration += other.total_duration;
    }

    pub fn built_count(&self) -> usize {
        self.entries.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.entries.iter().filter(|r| r.status.is_failure()).count()
    }

    /// True when no entry failed.
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    pub fn all_outputs(&self) -> Vec<&PathBuf> {
        self.entries.iter().flat_map(|r| r.outputs.iter()).collect()
    }

    pub fn failures(&self) -> Vec<&EntryResult> {
        self.entries.iter().filter(|r| r.status.is_failure()).collect()
    }

    /// Human-readable summary, one line plus one per failure.
    pub fn summary(&self) -> String {
        let built = self.built_count();
        let failed = self.failed_count();
        let total = self.entries.len();

        if failed == 0 {
            return format!("Build succeeded: {} built ({} total) in {:?}", built, total, self.total_duration);
        }

        let mut lines =
            vec![format!("Build failed: {} built, {} failed ({} total)", built, failed, total)];
        for entry in self.failures() {
            lines.push(format!("  - {} ({}): {}", entry.key, entry.source.display(), entry.status));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_status_display() {
        assert_eq!(EntryStatus::Built.to_string(), "built");
        assert_eq!(EntryStatus::Failed("boom".to_string()).to_string(), "failed: boom");
    }

    #[test]
    fn test_build_result_counts() {
        let mut result = BuildResult::new();
        result.add_result(EntryResult::built(
            "a".to_string(),
            PathBuf::from("src/a.ts"),
            vec![PathBuf::from("out/a.js")],
            Duration::ZERO,
        ));
        result.add_result(EntryResult::failed(
            "b".to_string(),
            PathBuf::from("src/b.ts"),
            "syntax error".to_string(),
            Duration::ZERO,
        ));

        assert_eq!(result.built_count(), 1);
        assert_eq!(result.failed_count(), 1);
        assert!(!result.is_success());
        assert_eq!(result.all_outputs(), vec![&PathBuf::from("out/a.js")]);

        let summary = result.summary();
        assert!(summary.contains("1 built, 1 failed"));
        assert!(summary.contains("src/b.ts"));
        assert!(summary.contains("syntax error"));
    }

    #[test]
    fn test_empty_result_is_success() {
        let result = BuildResult::new();
        assert!(result.is_success());
        assert!(result.summary().starts_with("Build succeeded: 0 built"));
    }

    #[test]
    fn test_merge() {
        let mut first = BuildResult::new().with_duration(Duration::from_millis(5));
        let mut second = BuildResult::new().with_duration(Duration::from_millis(7));
        second.add_result(EntryResult::built("x".into(), PathBuf::from("x"), vec![], Duration::ZERO));
        first.merge(second);
        assert_eq!(first.entries.len(), 1);
        assert_eq!(first.total_duration, Duration::from_millis(12));
    }
}

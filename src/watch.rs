//! Watch mode for incremental rebuilds on file changes
//!
//! The debounced watcher only reports which paths were touched. The
//! [`WatchReconciler`] turns those paths into typed [`WatchEvent`]s by comparing
//! them with the set of files and directories it already knows about, and
//! [`watch_builder`] feeds the events to a builder strictly one at a time.

use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Duration;
use thiserror::Error;
use walkdir::WalkDir;

use crate::build::path::GlobMatcher;
use crate::build::{BuildError, Builder, Reaction};
use crate::config::WatchConfig;

/// Error during watch mode
#[derive(Debug, Error)]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(notify::Error),
    /// Failed to add watch path
    #[error("Failed to watch path: {0}")]
    WatchPath(notify::Error),
    /// Watch pattern could not be compiled
    #[error("Invalid watch pattern '{pattern}': {error}")]
    InvalidPattern { pattern: String, error: glob::PatternError },
    /// Channel receive error
    #[error("Watch channel error: {0}")]
    ChannelError(String),
    /// Source directory not found
    #[error("Source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    /// A reaction failed; watching stops
    #[error("{action} {} failed: {source}", path.display())]
    ReactionFailed { path: PathBuf, action: &'static str, source: BuildError },
}

/// A filesystem change, already classified against the known tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Added(PathBuf),
    Changed(PathBuf),
    Removed(PathBuf),
    DirAdded(PathBuf),
    DirRemoved(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Added(p)
            | WatchEvent::Changed(p)
            | WatchEvent::Removed(p)
            | WatchEvent::DirAdded(p)
            | WatchEvent::DirRemoved(p) => p,
        }
    }

    /// Short name used in logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            WatchEvent::Added(_) => "added",
            WatchEvent::Changed(_) => "changed",
            WatchEvent::Removed(_) => "removed",
            WatchEvent::DirAdded(_) => "dir-added",
            WatchEvent::DirRemoved(_) => "dir-removed",
        }
    }
}

/// A directory to subscribe to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRoot {
    pub path: PathBuf,
    pub recursive: bool,
}

impl WatchRoot {
    pub fn recursive(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), recursive: true }
    }

    /// Direct children only.
    pub fn shallow(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), recursive: false }
    }

    fn mode(&self) -> RecursiveMode {
        if self.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        }
    }
}

/// Converts raw changed paths into typed events.
///
/// Files are tracked when they match the watch patterns; directories are
/// tracked anywhere under a recursive root. Paths present when
/// [`snapshot`](Self::snapshot) runs never produce `Added` events.
#[derive(Debug, Clone)]
pub struct WatchReconciler {
    roots: Vec<WatchRoot>,
    matcher: GlobMatcher,
    files: BTreeSet<PathBuf>,
    dirs: BTreeSet<PathBuf>,
}

#[derive(Default)]
struct Batch {
    dirs_added: BTreeSet<PathBuf>,
    added: BTreeSet<PathBuf>,
    changed: BTreeSet<PathBuf>,
    removed: BTreeSet<PathBuf>,
    dirs_removed: BTreeSet<PathBuf>,
}

impl Batch {
    fn into_events(self) -> Vec<WatchEvent> {
        let depth = |p: &PathBuf| p.components().count();

        let mut dirs_added: Vec<_> = self.dirs_added.into_iter().collect();
        dirs_added.sort_by_key(depth);
        let mut dirs_removed: Vec<_> = self.dirs_removed.into_iter().collect();
        dirs_removed.sort_by_key(|p| std::cmp::Reverse(depth(p)));

        let mut events = Vec::new();
        events.extend(dirs_added.into_iter().map(WatchEvent::DirAdded));
        events.extend(self.added.into_iter().map(WatchEvent::Added));
        events.extend(self.changed.into_iter().map(WatchEvent::Changed));
        events.extend(self.removed.into_iter().map(WatchEvent::Removed));
        events.extend(dirs_removed.into_iter().map(WatchEvent::DirRemoved));
        events
    }
}

impl WatchReconciler {
    pub fn new(roots: Vec<WatchRoot>, patterns: &[String]) -> Result<Self, WatchError> {
        let matcher = GlobMatcher::from_patterns(patterns).map_err(|error| WatchError::InvalidPattern {
            pattern: patterns.join(" | "),
            error,
        })?;
        Ok(Self { roots, matcher, files: BTreeSet::new(), dirs: BTreeSet::new() })
    }

    pub fn roots(&self) -> &[WatchRoot] {
        &self.roots
    }

    /// Glob patterns selecting tracked files.
    pub fn pattern(&self) -> &str {
        self.matcher.as_str()
    }

    pub fn is_relevant(&self, path: &Path) -> bool {
        self.matcher.matches(path)
    }

    pub fn known_files(&self) -> &BTreeSet<PathBuf> {
        &self.files
    }

    /// Record the current tree so pre-existing files are not reported.
    pub fn snapshot(&mut self) {
        self.files.clear();
        self.dirs.clear();
        for root in self.roots.clone() {
            let depth = if root.recursive { usize::MAX } else { 1 };
            for entry in WalkDir::new(&root.path).min_depth(1).max_depth(depth).into_iter().flatten() {
                let path = entry.path();
                if entry.file_type().is_dir() {
                    if root.recursive {
                        self.dirs.insert(path.to_path_buf());
                    }
                } else if self.is_relevant(path) {
                    self.files.insert(path.to_path_buf());
                }
            }
        }
    }

    fn is_root(&self, path: &Path) -> bool {
        self.roots.iter().any(|root| root.path == path)
    }

    fn under_recursive_root(&self, path: &Path) -> bool {
        self.roots.iter().any(|root| root.recursive && path.starts_with(&root.path) && root.path != path)
    }

    fn covered(&self, path: &Path) -> bool {
        self.under_recursive_root(path)
            || self.roots.iter().any(|root| !root.recursive && path.parent() == Some(root.path.as_path()))
    }

    /// Mark unknown ancestor directories of `path` as added.
    fn add_ancestors(&mut self, path: &Path, batch: &mut Batch) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if !self.under_recursive_root(dir) || self.dirs.contains(dir) {
                break;
            }
            self.dirs.insert(dir.to_path_buf());
            batch.dirs_added.insert(dir.to_path_buf());
            current = dir.parent();
        }
    }

    fn add_tree(&mut self, dir: &Path, batch: &mut Batch) {
        self.dirs.insert(dir.to_path_buf());
        batch.dirs_added.insert(dir.to_path_buf());
        for entry in WalkDir::new(dir).min_depth(1).into_iter().flatten() {
            let path = entry.path().to_path_buf();
            if entry.file_type().is_dir() {
                if self.dirs.insert(path.clone()) {
                    batch.dirs_added.insert(path);
                }
            } else if self.is_relevant(&path) && self.files.insert(path.clone()) {
                batch.added.insert(path);
            }
        }
    }

    fn remove_tree(&mut self, dir: &Path, batch: &mut Batch) {
        let files: Vec<PathBuf> = self.files.iter().filter(|f| f.starts_with(dir)).cloned().collect();
        for file in files {
            self.files.remove(&file);
            batch.removed.insert(file);
        }
        let dirs: Vec<PathBuf> = self.dirs.iter().filter(|d| d.starts_with(dir)).cloned().collect();
        for sub in dirs {
            self.dirs.remove(&sub);
            batch.dirs_removed.insert(sub);
        }
    }

    /// Classify a batch of touched paths, updating the known tree.
    ///
    /// Events come back ordered: directory additions (shallow first), file
    /// additions, changes, removals, then directory removals (deep first).
    /// The ordering holds per batch. The debouncer reports paths without
    /// timestamps, so arrival order inside one debounce window is lost and
    /// events of the same kind are sorted by path.
    pub fn reconcile<I>(&mut self, paths: I) -> Vec<WatchEvent>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let unique: BTreeSet<PathBuf> = paths.into_iter().collect();
        let mut batch = Batch::default();

        for path in unique {
            if self.is_root(&path) || !self.covered(&path) {
                continue;
            }
            match fs::metadata(&path) {
                Ok(meta) if meta.is_dir() => {
                    if self.under_recursive_root(&path) && !self.dirs.contains(&path) {
                        self.add_ancestors(&path, &mut batch);
                        self.add_tree(&path, &mut batch);
                    }
                }
                Ok(_) => {
                    if !self.is_relevant(&path) {
                        continue;
                    }
                    self.add_ancestors(&path, &mut batch);
                    if self.files.insert(path.clone()) {
                        batch.added.insert(path);
                    } else if !batch.added.contains(&path) {
                        batch.changed.insert(path);
                    }
                }
                Err(_) => {
                    if self.files.remove(&path) {
                        batch.removed.insert(path);
                    } else if self.dirs.contains(&path) {
                        self.remove_tree(&path, &mut batch);
                    }
                }
            }
        }

        batch.into_events()
    }
}

fn run_reaction<B: Builder + ?Sized>(builder: &mut B, event: &WatchEvent) -> Result<(), WatchError> {
    let span = tracing::info_span!("reaction", event = event.kind(), path = %event.path().display());
    let _enter = span.enter();

    match builder.handle_event(event) {
        Ok(Reaction::BuiltAll(result)) | Ok(Reaction::BuiltScope(result)) => {
            tracing::info!(built = result.built_count(), "rebuilt");
            Ok(())
        }
        Ok(reaction) => {
            tracing::debug!(?reaction, "reaction finished");
            Ok(())
        }
        Err(source) => {
            tracing::error!(error = %source, "reaction failed");
            Err(WatchError::ReactionFailed { path: event.path().to_path_buf(), action: event.kind(), source })
        }
    }
}

/// Discover entries, subscribe, and react to changes until a reaction fails.
///
/// Reactions run to completion in arrival order; the next batch is not read
/// before the previous one is fully handled.
pub fn watch_builder<B: Builder + ?Sized>(builder: &mut B, config: &WatchConfig) -> Result<(), WatchError> {
    let source_root = builder.context().source_root().to_path_buf();
    if !source_root.exists() {
        return Err(WatchError::SourceNotFound(source_root));
    }

    builder.discover().map_err(|source| WatchError::ReactionFailed {
        path: source_root.clone(),
        action: "discover",
        source,
    })?;

    let roots = builder.watch_roots();
    let mut reconciler = WatchReconciler::new(roots.clone(), &builder.watch_patterns())?;

    let (tx, rx) = channel();
    let debounce = Duration::from_millis(u64::from(config.debounce_ms));
    let mut debouncer = new_debouncer(debounce, tx).map_err(WatchError::WatcherInit)?;
    for root in &roots {
        debouncer.watcher().watch(&root.path, root.mode()).map_err(WatchError::WatchPath)?;
    }
    reconciler.snapshot();

    tracing::info!(
        family = %builder.family(),
        pattern = reconciler.pattern(),
        files = reconciler.known_files().len(),
        "watching for changes"
    );

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                for event in reconciler.reconcile(events.into_iter().map(|e| e.path)) {
                    run_reaction(builder, &event)?;
                }
            }
            Ok(Err(error)) => {
                tracing::warn!(family = %builder.family(), error = ?error, "watch error, continuing");
            }
            Err(e) => {
                return Err(WatchError::ChannelError(e.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn reconciler(temp: &TempDir) -> WatchReconciler {
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        let pattern = format!("{}/**/*.{{ts,mjs}}", src.display());
        WatchReconciler::new(vec![WatchRoot::recursive(&src)], &[pattern]).unwrap()
    }

    fn write(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_existing_files_are_not_added() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("src/page.ts");
        write(&file);
        let mut rec = reconciler(&temp);
        rec.snapshot();

        assert_eq!(rec.reconcile(vec![file.clone()]), vec![WatchEvent::Changed(file)]);
    }

    #[test]
    fn test_add_change_remove() {
        let temp = TempDir::new().unwrap();
        let mut rec = reconciler(&temp);
        rec.snapshot();

        let file = temp.path().join("src/utils.mjs");
        write(&file);
        assert_eq!(rec.reconcile(vec![file.clone()]), vec![WatchEvent::Added(file.clone())]);
        assert_eq!(rec.reconcile(vec![file.clone()]), vec![WatchEvent::Changed(file.clone())]);
        fs::remove_file(&file).unwrap();
        assert_eq!(rec.reconcile(vec![file.clone()]), vec![WatchEvent::Removed(file)]);
    }

    #[test]
    fn test_batch_is_ordered_by_kind_then_path() {
        let temp = TempDir::new().unwrap();
        let old = temp.path().join("src/z.ts");
        let gone = temp.path().join("src/a.ts");
        write(&old);
        write(&gone);
        let mut rec = reconciler(&temp);
        rec.snapshot();

        fs::remove_file(&gone).unwrap();
        let second = temp.path().join("src/m.ts");
        let first = temp.path().join("src/b.mjs");
        write(&second);
        write(&first);

        let events = rec.reconcile(vec![gone.clone(), old.clone(), second.clone(), first.clone()]);
        assert_eq!(
            events,
            vec![
                WatchEvent::Added(first),
                WatchEvent::Added(second),
                WatchEvent::Changed(old),
                WatchEvent::Removed(gone),
            ]
        );
    }

    #[test]
    fn test_irrelevant_files_ignored() {
        let temp = TempDir::new().unwrap();
        let mut rec = reconciler(&temp);
        rec.snapshot();
        let file = temp.path().join("src/notes.md");
        write(&file);
        assert!(rec.reconcile(vec![file]).is_empty());
        assert!(rec.reconcile(vec![temp.path().join("elsewhere.ts")]).is_empty());
    }

    #[test]
    fn test_new_directory_with_files() {
        let temp = TempDir::new().unwrap();
        let mut rec = reconciler(&temp);
        rec.snapshot();

        let dir = temp.path().join("src/a");
        let deep = temp.path().join("src/a/b/c.ts");
        write(&deep);

        let events = rec.reconcile(vec![deep.clone(), dir.clone()]);
        assert_eq!(
            events,
            vec![
                WatchEvent::DirAdded(dir.clone()),
                WatchEvent::DirAdded(dir.join("b")),
                WatchEvent::Added(deep),
            ]
        );
    }

    #[test]
    fn test_removed_directory_reports_contents_deep_first() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("src/a/b/c.ts");
        write(&file);
        let mut rec = reconciler(&temp);
        rec.snapshot();

        let dir = temp.path().join("src/a");
        fs::remove_dir_all(&dir).unwrap();
        let events = rec.reconcile(vec![dir.clone()]);
        assert_eq!(
            events,
            vec![
                WatchEvent::Removed(file),
                WatchEvent::DirRemoved(dir.join("b")),
                WatchEvent::DirRemoved(dir),
            ]
        );
    }

    #[test]
    fn test_shallow_root_only_sees_direct_children() {
        let temp = TempDir::new().unwrap();
        let vars = temp.path().join("vars.yml");
        let nested = temp.path().join("other/vars.yml");
        let pattern = format!("{}/vars.yml", temp.path().display());
        let mut rec = WatchReconciler::new(vec![WatchRoot::shallow(temp.path())], &[pattern]).unwrap();
        rec.snapshot();

        write(&vars);
        write(&nested);
        assert_eq!(rec.reconcile(vec![vars.clone(), nested]), vec![WatchEvent::Added(vars)]);
    }

    #[test]
    fn test_event_accessors() {
        let event = WatchEvent::DirRemoved(PathBuf::from("/x"));
        assert_eq!(event.path(), Path::new("/x"));
        assert_eq!(event.kind(), "dir-removed");
    }

    #[test]
    fn test_watch_error_source_not_found() {
        let error = WatchError::SourceNotFound(PathBuf::from("/nonexistent"));
        assert!(error.to_string().contains("/nonexistent"));
    }
}

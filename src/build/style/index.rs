//! Generated style index files.
//!
//! An index file forwards every partial of its directory and the index file of
//! every child directory that has one. Its content is a pure function of the
//! directory listing, read through [`IndexFs`] so the logic can be exercised
//! without touching the disk.

use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// First lines of every generated index file.
pub const INDEX_HEADER: [&str; 4] = [
    "// ===============================",
    "// Auto generated by assetsmith",
    "// Do not edit this file!",
    "// ===============================",
];

/// A directory entry as seen by the index generator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Filesystem capability needed to regenerate index files.
pub trait IndexFs {
    /// Direct children of `dir`; a missing directory lists as empty.
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<DirEntry>>;
    fn is_file(&self, path: &Path) -> bool;
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// [`IndexFs`] backed by the real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskFs;

impl IndexFs for DiskFs {
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        let reader = match fs::read_dir(dir) {
            Ok(reader) => reader,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut entries = Vec::new();
        for entry in reader {
            let entry = entry?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: entry.file_type()?.is_dir(),
            });
        }
        Ok(entries)
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        fs::write(path, contents)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// How index files are named and what they reference.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    /// Index file name, e.g. `_all.scss`
    pub file_name: String,
    /// Import keyword, emitted verbatim (`forward`, `use`, `import`, ...)
    pub import_keyword: String,
    /// Literal prefix that marks partial files
    pub partial_prefix: String,
    /// Extensions a partial may have
    pub extensions: Vec<String>,
}

impl IndexSpec {
    /// True when `name` is a partial (not the index itself).
    pub fn is_partial(&self, name: &str) -> bool {
        if name == self.file_name || !name.starts_with(&self.partial_prefix) {
            return false;
        }
        name.rsplit_once('.').is_some_and(|(_, ext)| self.extensions.iter().any(|e| e == ext))
    }

    fn import_line(&self, target: &str) -> String {
        format!("@{} '{}';", self.import_keyword, target)
    }
}

/// What [`regenerate_index`] did to a directory's index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Created,
    Updated,
    Unchanged,
    Removed,
    /// Nothing to index and no index existed
    Absent,
}

impl IndexOutcome {
    /// True when the file on disk changed.
    pub fn is_write(self) -> bool {
        matches!(self, IndexOutcome::Created | IndexOutcome::Updated | IndexOutcome::Removed)
    }
}

/// Render the index content for `dir`, or `None` when nothing qualifies.
///
/// Child directory indexes come first, then partials of `dir` itself, each
/// group sorted lexicographically.
pub fn render_index(fs: &dyn IndexFs, dir: &Path, spec: &IndexSpec) -> io::Result<Option<String>> {
    let mut children = Vec::new();
    let mut files = Vec::new();

    for entry in fs.list_dir(dir)? {
        if entry.is_dir {
            if fs.is_file(&dir.join(&entry.name).join(&spec.file_name)) {
                children.push(format!("{}/{}", entry.name, spec.file_name));
            }
        } else if spec.is_partial(&entry.name) {
            files.push(entry.name);
        }
    }

    if children.is_empty() && files.is_empty() {
        return Ok(None);
    }
    children.sort();
    files.sort();

    let mut lines: Vec<String> = INDEX_HEADER.iter().map(|l| l.to_string()).collect();
    lines.extend(children.iter().chain(&files).map(|target| spec.import_line(target)));
    Ok(Some(lines.join("\n") + "\n"))
}

/// Bring the index file of `dir` in line with its listing.
///
/// The file is only written when its content would change, and removed when
/// nothing qualifies.
pub fn regenerate_index(fs: &dyn IndexFs, dir: &Path, spec: &IndexSpec) -> io::Result<IndexOutcome> {
    let index_path = dir.join(&spec.file_name);
    let exists = fs.is_file(&index_path);

    let outcome = match render_index(fs, dir, spec)? {
        None if exists => {
            fs.remove_file(&index_path)?;
            IndexOutcome::Removed
        }
        None => IndexOutcome::Absent,
        Some(content) if exists => {
            if fs.read_to_string(&index_path)? == content {
                IndexOutcome::Unchanged
            } else {
                fs.write(&index_path, &content)?;
                IndexOutcome::Updated
            }
        }
        Some(content) => {
            fs.write(&index_path, &content)?;
            IndexOutcome::Created
        }
    };

    if outcome.is_write() {
        tracing::info!(index = %index_path.display(), outcome = ?outcome, "index file");
    }
    Ok(outcome)
}

/// Regenerate `dir` and then each ancestor up to and including `source_root`.
pub fn regenerate_index_recursive(
    fs: &dyn IndexFs,
    dir: &Path,
    source_root: &Path,
    spec: &IndexSpec,
) -> io::Result<Vec<(PathBuf, IndexOutcome)>> {
    let mut outcomes = Vec::new();
    let mut current = Some(dir);
    while let Some(target) = current.filter(|d| d.starts_with(source_root)) {
        outcomes.push((target.to_path_buf(), regenerate_index(fs, target, spec)?));
        current = target.parent();
    }
    Ok(outcomes)
}

/// Directories whose index must exist for a full build: every directory that
/// directly holds a partial, plus its ancestors up to `source_root`. Ordered
/// deepest first so children are written before the parents that reference them.
pub fn index_dirs(partials: &[PathBuf], source_root: &Path) -> Vec<PathBuf> {
    let mut dirs = BTreeSet::new();
    for partial in partials {
        let mut current = partial.parent();
        while let Some(dir) = current.filter(|d| d.starts_with(source_root)) {
            dirs.insert((Reverse(dir.components().count()), dir.to_path_buf()));
            current = dir.parent();
        }
    }
    dirs.into_iter().map(|(_, dir)| dir).collect()
}


#[cfg(test)]
mod tests {
    use super::memory::MemoryFs;
    use super::*;

    fn spec() -> IndexSpec {
        IndexSpec {
            file_name: "_all.scss".to_string(),
            import_keyword: "forward".to_string(),
            partial_prefix: "_".to_string(),
            extensions: vec!["scss".to_string(), "sass".to_string(), "css".to_string()],
        }
    }

    fn expected(lines: &[&str]) -> String {
        let mut all: Vec<&str> = INDEX_HEADER.to_vec();
        all.extend_from_slice(lines);
        all.join("\n") + "\n"
    }

    #[test]
    fn test_is_partial() {
        let spec = spec();
        assert!(spec.is_partial("_a.scss"));
        assert!(!spec.is_partial("a.scss"));
        assert!(!spec.is_partial("_all.scss"));
        assert!(!spec.is_partial("_notes.md"));
        assert!(!spec.is_partial("_noext"));
    }

    #[test]
    fn test_children_before_partials_sorted() {
        let fs = MemoryFs::default();
        fs.add_file("/src/_b.scss", "");
        fs.add_file("/src/_a.scss", "");
        fs.add_file("/src/main.scss", "");
        fs.add_file("/src/zeta/_all.scss", "x");
        fs.add_file("/src/alpha/_all.scss", "x");
        fs.add_file("/src/empty/readme.txt", "");

        let content = render_index(&fs, Path::new("/src"), &spec()).unwrap();
        assert_eq!(
            content.as_deref(),
            Some(
                expected(&[
                    "@forward 'alpha/_all.scss';",
                    "@forward 'zeta/_all.scss';",
                    "@forward '_a.scss';",
                    "@forward '_b.scss';",
                ])
                .as_str()
            )
        );
    }

    #[test]
    fn test_unchanged_index_is_not_rewritten() {
        let fs = MemoryFs::default();
        fs.add_file("/src/_a.scss", "");

        assert_eq!(regenerate_index(&fs, Path::new("/src"), &spec()).unwrap(), IndexOutcome::Created);
        assert_eq!(regenerate_index(&fs, Path::new("/src"), &spec()).unwrap(), IndexOutcome::Unchanged);
        assert_eq!(fs.writes.borrow().len(), 1);

        fs.add_file("/src/_b.scss", "");
        assert_eq!(regenerate_index(&fs, Path::new("/src"), &spec()).unwrap(), IndexOutcome::Updated);
    }

    #[test]
    fn test_empty_directory_removes_index() {
        let fs = MemoryFs::default();
        fs.add_file("/src/_all.scss", "stale");
        fs.add_file("/src/main.scss", "");

        assert_eq!(regenerate_index(&fs, Path::new("/src"), &spec()).unwrap(), IndexOutcome::Removed);
        assert!(fs.read("/src/_all.scss").is_none());
        assert_eq!(regenerate_index(&fs, Path::new("/src"), &spec()).unwrap(), IndexOutcome::Absent);
    }

    #[test]
    fn test_recursive_propagates_to_source_root() {
        let fs = MemoryFs::default();
        fs.add_file("/p/src/a/b/_x.scss", "");

        let outcomes =
            regenerate_index_recursive(&fs, Path::new("/p/src/a/b"), Path::new("/p/src"), &spec()).unwrap();
        let dirs: Vec<_> = outcomes.iter().map(|(d, _)| d.clone()).collect();
        assert_eq!(
            dirs,
            vec![PathBuf::from("/p/src/a/b"), PathBuf::from("/p/src/a"), PathBuf::from("/p/src")]
        );
        assert_eq!(fs.read("/p/src/a/_all.scss"), Some(expected(&["@forward 'b/_all.scss';"])));
        assert_eq!(fs.read("/p/src/_all.scss"), Some(expected(&["@forward 'a/_all.scss';"])));
        assert!(fs.read("/p/_all.scss").is_none());
    }

    #[test]
    fn test_recursive_removal_cascades() {
        let fs = MemoryFs::default();
        fs.add_file("/src/a/_x.scss", "");
        regenerate_index_recursive(&fs, Path::new("/src/a"), Path::new("/src"), &spec()).unwrap();
        assert!(fs.read("/src/_all.scss").is_some());

        fs.files.borrow_mut().remove(Path::new("/src/a/_x.scss"));
        let outcomes = regenerate_index_recursive(&fs, Path::new("/src/a"), Path::new("/src"), &spec()).unwrap();
        assert_eq!(outcomes[0].1, IndexOutcome::Removed);
        assert_eq!(outcomes[1].1, IndexOutcome::Removed);
    }

    #[test]
    fn test_index_dirs_deepest_first() {
        let partials = vec![
            PathBuf::from("/src/_a.scss"),
            PathBuf::from("/src/x/y/_b.scss"),
            PathBuf::from("/src/x/_c.scss"),
            PathBuf::from("/other/_d.scss"),
        ];
        assert_eq!(
            index_dirs(&partials, Path::new("/src")),
            vec![PathBuf::from("/src/x/y"), PathBuf::from("/src/x"), PathBuf::from("/src")]
        );
    }

    #[test]
    fn test_custom_import_keyword() {
        let fs = MemoryFs::default();
        fs.add_file("/src/_a.scss", "");
        let spec = IndexSpec { import_keyword: "import".to_string(), ..spec() };
        let content = render_index(&fs, Path::new("/src"), &spec).unwrap().unwrap();
        assert!(content.ends_with("@import '_a.scss';\n"));
    }
}

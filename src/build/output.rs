//! Writing and removing build artifacts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::compile::Asset;

/// Sibling source-map path: `<artifact>.map`.
pub fn source_map_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.as_os_str().to_os_string();
    name.push(".map");
    PathBuf::from(name)
}

/// Content as written to disk: surrounding whitespace trimmed, one trailing newline.
pub fn finalize_content(content: &str) -> String {
    format!("{}\n", content.trim())
}

/// Write an artifact, creating parent directories.
pub fn write_artifact(path: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, finalize_content(content))
}

/// Write `<artifact>.map` and return its path.
pub fn write_source_map(artifact: &Path, map: &str) -> io::Result<PathBuf> {
    let path = source_map_path(artifact);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, map)?;
    Ok(path)
}

/// Write auxiliary files next to an artifact, returning their paths.
pub fn write_assets(artifact: &Path, assets: &[Asset]) -> io::Result<Vec<PathBuf>> {
    let dir = artifact.parent().unwrap_or_else(|| Path::new(""));
    let mut written = Vec::with_capacity(assets.len());
    for asset in assets {
        let path = dir.join(&asset.file_name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &asset.contents)?;
        written.push(path);
    }
    Ok(written)
}

/// Remove a file or directory tree. Returns whether anything existed.
pub fn remove_artifact(path: &Path) -> io::Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).map(|_| true),
        Ok(_) => fs::remove_file(path).map(|_| true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_artifact_normalises_trailing_whitespace() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a/b/out.css");
        write_artifact(&path, "\n\nbody {}\n\n\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "body {}\n");
    }

    #[test]
    fn test_source_map_path() {
        assert_eq!(source_map_path(Path::new("/o/app.js")), PathBuf::from("/o/app.js.map"));
    }

    #[test]
    fn test_write_source_map_and_assets() {
        let temp = TempDir::new().unwrap();
        let artifact = temp.path().join("app.js");
        let map = write_source_map(&artifact, "{}").unwrap();
        assert_eq!(map, temp.path().join("app.js.map"));

        let assets = vec![Asset { file_name: PathBuf::from("app.css"), contents: b"x".to_vec() }];
        let written = write_assets(&artifact, &assets).unwrap();
        assert_eq!(written, vec![temp.path().join("app.css")]);
        assert_eq!(fs::read(temp.path().join("app.css")).unwrap(), b"x");
    }

    #[test]
    fn test_remove_artifact() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("f.js");
        fs::write(&file, "x").unwrap();
        let dir = temp.path().join("d/e");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("g.js"), "x").unwrap();

        assert!(remove_artifact(&file).unwrap());
        assert!(!file.exists());
        assert!(remove_artifact(&temp.path().join("d")).unwrap());
        assert!(!temp.path().join("d").exists());
        assert!(!remove_artifact(&file).unwrap());
    }
}

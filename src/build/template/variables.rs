//! Directory-scoped template variables.
//!
//! One YAML variables file may live at the project root and in any directory
//! under the source root. Rendering a template merges them root-first, so the
//! file closest to the template wins on key conflicts.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::build::path::to_posix;

/// Render context handed to the template renderer.
pub type VariableMap = serde_json::Map<String, Value>;

/// Key injected with the template's directory relative to the source root.
pub const SCOPE_KEY: &str = "_scope";

#[derive(Debug, Error)]
pub enum VariablesError {
    #[error("failed to read variables file {}: {error}", path.display())]
    Io { path: PathBuf, error: std::io::Error },
    #[error("failed to parse variables file {}: {error}", path.display())]
    Parse { path: PathBuf, error: serde_yaml::Error },
    #[error("variables file {} must contain a mapping", path.display())]
    NotAMapping { path: PathBuf },
    #[error("failed to scan for variables files under {}: {error}", root.display())]
    Walk { root: PathBuf, error: walkdir::Error },
}

fn read_variables(path: &Path) -> Result<VariableMap, VariablesError> {
    let text = fs::read_to_string(path)
        .map_err(|error| VariablesError::Io { path: path.to_path_buf(), error })?;
    let value: Value = serde_yaml::from_str(&text)
        .map_err(|error| VariablesError::Parse { path: path.to_path_buf(), error })?;
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(VariableMap::new()),
        _ => Err(VariablesError::NotAMapping { path: path.to_path_buf() }),
    }
}

/// All variables files of one template builder, keyed by directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopedVariables {
    project: Option<VariableMap>,
    scopes: BTreeMap<PathBuf, VariableMap>,
}

impl ScopedVariables {
    /// Load the project-root file and every `file_name` under `source_root`.
    pub fn load(project_root: &Path, source_root: &Path, file_name: &str) -> Result<Self, VariablesError> {
        let project_file = project_root.join(file_name);
        let project = if project_file.is_file() { Some(read_variables(&project_file)?) } else { None };

        let mut scopes = BTreeMap::new();
        if source_root.is_dir() {
            for entry in WalkDir::new(source_root).sort_by_file_name() {
                let entry = entry
                    .map_err(|error| VariablesError::Walk { root: source_root.to_path_buf(), error })?;
                if !entry.file_type().is_file() || entry.file_name() != file_name {
                    continue;
                }
                if let Some(dir) = entry.path().parent() {
                    scopes.insert(dir.to_path_buf(), read_variables(entry.path())?);
                }
            }
        }

        Ok(Self { project, scopes })
    }

    /// Variables declared directly in `dir`.
    pub fn scope(&self, dir: &Path) -> Option<&VariableMap> {
        self.scopes.get(dir)
    }

    /// Directories that carry a variables file.
    pub fn scoped_dirs(&self) -> impl Iterator<Item = &Path> {
        self.scopes.keys().map(PathBuf::as_path)
    }

    /// Effective variables for the template at `source`.
    ///
    /// Starts from the project-root variables, then merges each directory from
    /// `source_root` down to the template's directory, and finally sets
    /// [`SCOPE_KEY`].
    pub fn resolve(&self, source: &Path, source_root: &Path) -> VariableMap {
        let mut merged = self.project.clone().unwrap_or_default();

        let dir = source.parent().unwrap_or(source_root);
        let relative = dir.strip_prefix(source_root).unwrap_or_else(|_| Path::new(""));

        let mut current = source_root.to_path_buf();
        self.merge_scope(&mut merged, &current);
        for component in relative.components() {
            current.push(component);
            self.merge_scope(&mut merged, &current);
        }

        let scope = to_posix(relative);
        let scope = if scope.is_empty() { ".".to_string() } else { scope };
        merged.insert(SCOPE_KEY.to_string(), Value::String(scope));
        merged
    }

    fn merge_scope(&self, merged: &mut VariableMap, dir: &Path) {
        if let Some(vars) = self.scopes.get(dir) {
            for (key, value) in vars {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
}

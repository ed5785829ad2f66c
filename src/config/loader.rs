//! Configuration loading and discovery for `assetsmith.toml`
//!
//! The document is kept as a raw TOML table so each builder can ask for its own
//! merged view: global keys, then the family section, then explicit overrides.

use super::schema::{BuilderConfig, Family, FamilyConfig, WatchConfig};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project configuration file.
pub const CONFIG_FILE_NAME: &str = "assetsmith.toml";

/// Top-level keys that never leak into a family's merged view.
pub const CROSS_FAMILY_KEYS: &[&str] =
    &["enable", "server", "js", "css", "html", "snippet", "screenshot", "watch"];

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse {CONFIG_FILE_NAME}: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CliOverrides {
    /// Emit source maps (script and style families)
    pub sourcemap: Option<bool>,
    /// Minify output; compressed style for style sheets
    pub minify: Option<bool>,
}

impl CliOverrides {
    /// Overrides expressed as a table for one family.
    pub fn for_family(&self, family: Family) -> toml::Table {
        let mut table = toml::Table::new();
        match family {
            Family::Script => {
                if let Some(sourcemap) = self.sourcemap {
                    table.insert("sourcemap".into(), toml::Value::Boolean(sourcemap));
                }
                if let Some(minify) = self.minify {
                    table.insert("minify".into(), toml::Value::Boolean(minify));
                }
            }
            Family::Style => {
                if let Some(sourcemap) = self.sourcemap {
                    table.insert("sourcemap".into(), toml::Value::Boolean(sourcemap));
                }
                if self.minify == Some(true) {
                    table.insert("style".into(), toml::Value::String("compressed".into()));
                }
            }
            Family::Template => {}
        }
        table
    }
}

/// A loaded configuration document and the project root it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    table: toml::Table,
    path: Option<PathBuf>,
    project_root: PathBuf,
}

impl ConfigDocument {
    /// Parse a document whose relative paths resolve against `project_root`.
    pub fn parse(contents: &str, project_root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let table: toml::Table = contents.parse()?;
        Ok(Self { table, path: None, project_root: project_root.into() })
    }

    /// An empty document (no config file found).
    pub fn empty(project_root: impl Into<PathBuf>) -> Self {
        Self { table: toml::Table::new(), path: None, project_root: project_root.into() }
    }

    /// Path of the file this document was read from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Directory every relative path in the document resolves against.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Raw lookup of a dotted key, e.g. `css.style`.
    pub fn get(&self, dotted: &str) -> Option<&toml::Value> {
        let mut parts = dotted.split('.');
        let mut value = self.table.get(parts.next()?)?;
        for part in parts {
            value = value.as_table()?.get(part)?;
        }
        Some(value)
    }

    /// True only when the top-level `enable` list names the family.
    pub fn is_enabled(&self, family: Family) -> bool {
        self.table
            .get("enable")
            .and_then(toml::Value::as_array)
            .is_some_and(|list| list.iter().any(|v| v.as_str() == Some(family.key())))
    }

    /// Enabled families in instantiation order.
    pub fn enabled_families(&self) -> Vec<Family> {
        Family::ALL.into_iter().filter(|family| self.is_enabled(*family)).collect()
    }

    /// Merged option table for one family.
    ///
    /// Global keys come first, then the family section, with cross-family keys
    /// stripped, and finally `overrides`.
    pub fn family_table(&self, family: Family, overrides: &toml::Table) -> toml::Table {
        let mut merged = self.table.clone();
        if let Some(toml::Value::Table(section)) = self.table.get(family.key()) {
            deep_merge(&mut merged, section);
        }
        for key in CROSS_FAMILY_KEYS {
            merged.remove(*key);
        }
        deep_merge(&mut merged, overrides);
        merged
    }

    /// Resolved and validated configuration for one family.
    pub fn family_config(
        &self,
        family: Family,
        overrides: &CliOverrides,
    ) -> Result<FamilyConfig, ConfigError> {
        let table = self.family_table(family, &overrides.for_family(family));
        let config: BuilderConfig = toml::Value::Table(table).try_into()?;
        let resolved = config.resolve(family);

        let errors = resolved.validate();
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
        }
        Ok(resolved)
    }

    /// The `[watch]` section, defaulted when absent.
    pub fn watch_config(&self) -> Result<WatchConfig, ConfigError> {
        match self.table.get("watch") {
            Some(value) => Ok(value.clone().try_into()?),
            None => Ok(WatchConfig::default()),
        }
    }
}

/// Merge `overlay` into `base`: tables merge recursively, everything else replaces.
pub fn deep_merge(base: &mut toml::Table, overlay: &toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                deep_merge(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Find assetsmith.toml by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find assetsmith.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load the configuration document.
///
/// An explicit `path` must exist. Without one the file is searched for from the
/// working directory upward; when none is found an empty document rooted at the
/// working directory is returned.
pub fn load_config(path: Option<&Path>) -> Result<ConfigDocument, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(ConfigDocument::empty(env::current_dir()?)),
    }
}

fn load_config_file(path: &Path) -> Result<ConfigDocument, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let project_root = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => env::current_dir()?,
    };
    let mut document = ConfigDocument::parse(&contents, project_root)?;
    document.path = Some(path.to_path_buf());
    Ok(document)
}

/// Resolve a path relative to the project root.
///
/// If the path is absolute, returns it unchanged.
/// If relative, joins it with the project root.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}

//! Project initialization for assetsmith
//!
//! Writes a starter `assetsmith.toml` with every asset family enabled.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::CONFIG_FILE_NAME;

/// Error during project initialization
#[derive(Debug, Error)]
pub enum InitError {
    /// Config file already exists and `force` was not given
    #[error("{} already exists (use --force to overwrite)", .0.display())]
    ConfigExists(PathBuf),
    /// Failed to create directory
    #[error("Failed to create directory: {0}")]
    CreateDir(std::io::Error),
    /// Failed to write file
    #[error("Failed to write file: {0}")]
    WriteFile(std::io::Error),
}

/// Starter configuration written by `assetsmith init`.
pub const STARTER_CONFIG: &str = r#"# assetsmith configuration
enable = ["js", "css", "html"]
source_root = "src"

[ignore]
prefix = "_"

[js]
output_root = "public/assets/js"
sourcemap = false
minify = false

[js.globals]

[css]
output_root = "public/assets/css"
style = "expanded"
sourcemap = false
generate_index = false

[html]
output_root = "public"
var_file_name = "vars.yml"

[watch]
debounce_ms = 100
"#;

/// Write a starter config into `dir`, returning its path.
pub fn init_project(dir: &Path, force: bool) -> Result<PathBuf, InitError> {
    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() && !force {
        return Err(InitError::ConfigExists(path));
    }

    fs::create_dir_all(dir).map_err(InitError::CreateDir)?;
    fs::write(&path, STARTER_CONFIG).map_err(InitError::WriteFile)?;
    Ok(path)
}

//! Build context containing resolved configuration and paths for one builder.

use crate::build::path;
use crate::config::{resolve_path, BuildOptions, Family, FamilyConfig, FamilyOptions};
use std::path::{Path, PathBuf};

/// Build context for one asset family.
///
/// Holds the resolved configuration together with absolute source and output
/// roots, so nothing downstream needs to know about the project root layout.
#[derive(Debug, Clone)]
pub struct BuildContext {
    config: FamilyConfig,
    /// Project root directory (where assetsmith.toml is located)
    project_root: PathBuf,
    source_root: PathBuf,
    output_root: PathBuf,
}

impl BuildContext {
    /// Create a new build context.
    ///
    /// # Arguments
    /// - `config` - The resolved family configuration
    /// - `project_root` - The project root directory
    pub fn new(config: FamilyConfig, project_root: PathBuf) -> Self {
        let source_root = resolve_path(&project_root, &config.options.source_root);
        let output_root = resolve_path(&project_root, &config.options.output_root);
        Self { config, project_root, source_root, output_root }
    }

    pub fn family(&self) -> Family {
        self.config.family
    }

    pub fn config(&self) -> &FamilyConfig {
        &self.config
    }

    pub fn options(&self) -> &BuildOptions {
        &self.config.options
    }

    pub fn family_options(&self) -> &FamilyOptions {
        &self.config.extra
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Absolute source root.
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Absolute output root.
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Resolve a path relative to the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        resolve_path(&self.project_root, path)
    }

    /// Artifact path for a source file.
    pub fn output_path(&self, source: &Path) -> PathBuf {
        path::to_output_path(
            source,
            &self.source_root,
            &self.output_root,
            &self.config.options.output_extension,
        )
    }

    /// Output directory mirroring a source directory.
    pub fn output_dir(&self, dir: &Path) -> Option<PathBuf> {
        path::to_output_dir(dir, &self.source_root, &self.output_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuilderConfig;

    fn context(toml: &str, family: Family) -> BuildContext {
        let config: BuilderConfig = toml::from_str(toml).unwrap();
        BuildContext::new(config.resolve(family), PathBuf::from("/project"))
    }

    #[test]
    fn test_roots_resolved_against_project() {
        let ctx = context("", Family::Style);
        assert_eq!(ctx.source_root(), Path::new("/project/src"));
        assert_eq!(ctx.output_root(), Path::new("/project/public/assets/css"));
        assert_eq!(ctx.family(), Family::Style);
    }

    #[test]
    fn test_absolute_roots_kept() {
        let ctx = context("source_root = \"/abs/src\"\noutput_root = \"/abs/out\"", Family::Script);
        assert_eq!(ctx.source_root(), Path::new("/abs/src"));
        assert_eq!(ctx.output_root(), Path::new("/abs/out"));
    }

    #[test]
    fn test_output_mapping() {
        let ctx = context("", Family::Template);
        assert_eq!(
            ctx.output_path(Path::new("/project/src/blog/post.njk")),
            PathBuf::from("/project/public/blog/post.html")
        );
        assert_eq!(
            ctx.output_dir(Path::new("/project/src/blog")),
            Some(PathBuf::from("/project/public/blog"))
        );
    }
}

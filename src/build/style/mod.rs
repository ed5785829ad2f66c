//! Style family: partials and generated index files.
//!
//! Partials (files starting with `_`) are never entries. With index generation
//! enabled, each directory holding partials gets an index file forwarding them,
//! kept in sync on every partial event and before every full build.

pub mod index;

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::build::builder::{BuildError, FamilyStrategy, SpecialFile};
use crate::build::BuildContext;
use crate::config::StyleOptions;
use crate::watch::WatchEvent;

pub use index::{
    index_dirs, regenerate_index, regenerate_index_recursive, render_index, DiskFs, IndexFs,
    IndexOutcome, IndexSpec,
};

/// Prefix marking partial style files.
pub const PARTIAL_PREFIX: &str = "_";

#[derive(Debug, Clone)]
pub struct StyleStrategy {
    generate_index: bool,
    spec: IndexSpec,
}

impl StyleStrategy {
    pub fn new(options: &StyleOptions, extensions: &[String]) -> Self {
        Self {
            generate_index: options.generate_index,
            spec: IndexSpec {
                file_name: options.index_file_name.clone(),
                import_keyword: options.index_import_type.clone(),
                partial_prefix: PARTIAL_PREFIX.to_string(),
                extensions: extensions.to_vec(),
            },
        }
    }

    pub fn spec(&self) -> &IndexSpec {
        &self.spec
    }

    /// Every partial under `source_root`.
    fn partials(&self, source_root: &Path) -> Result<Vec<PathBuf>, BuildError> {
        let mut partials = Vec::new();
        if !source_root.is_dir() {
            return Ok(partials);
        }
        for entry in WalkDir::new(source_root).sort_by_file_name() {
            let entry = entry
                .map_err(|e| BuildError::Index { dir: source_root.to_path_buf(), error: e.into() })?;
            if entry.file_type().is_file() && self.spec.is_partial(&entry.file_name().to_string_lossy()) {
                partials.push(entry.into_path());
            }
        }
        Ok(partials)
    }
}

impl FamilyStrategy for StyleStrategy {
    fn classify(&self, _ctx: &BuildContext, path: &Path) -> SpecialFile {
        let is_index = path.file_name().is_some_and(|name| name == self.spec.file_name.as_str());
        if self.generate_index && is_index {
            SpecialFile::Derived
        } else {
            SpecialFile::None
        }
    }

    fn prepare_full_build(&mut self, ctx: &BuildContext) -> Result<(), BuildError> {
        if !self.generate_index {
            return Ok(());
        }
        let partials = self.partials(ctx.source_root())?;
        for dir in index_dirs(&partials, ctx.source_root()) {
            regenerate_index(&DiskFs, &dir, &self.spec).map_err(|error| BuildError::Index { dir, error })?;
        }
        Ok(())
    }

    fn observe_file_event(&mut self, ctx: &BuildContext, event: &WatchEvent) -> Result<(), BuildError> {
        if !self.generate_index {
            return Ok(());
        }
        let dir = match event {
            WatchEvent::Added(path) | WatchEvent::Changed(path) | WatchEvent::Removed(path) => path.parent(),
            WatchEvent::DirAdded(_) | WatchEvent::DirRemoved(_) => None,
        };
        if let Some(dir) = dir {
            regenerate_index_recursive(&DiskFs, dir, ctx.source_root(), &self.spec)
                .map_err(|error| BuildError::Index { dir: dir.to_path_buf(), error })?;
        }
        Ok(())
    }

    fn source_map_comment(&self, map_file_name: &str) -> Option<String> {
        Some(format!("/*# sourceMappingURL={} */", map_file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuilderConfig, Family, FamilyOptions};
    use std::fs;
    use tempfile::TempDir;

    fn setup(generate_index: bool) -> (TempDir, BuildContext, StyleStrategy) {
        let temp = TempDir::new().unwrap();
        let config: BuilderConfig =
            toml::from_str(&format!("generate_index = {}", generate_index)).unwrap();
        let config = config.resolve(Family::Style);
        let FamilyOptions::Style(options) = &config.extra else { panic!("expected style options") };
        let strategy = StyleStrategy::new(options, &config.options.entry_extensions);
        let ctx = BuildContext::new(config, temp.path().to_path_buf());
        (temp, ctx, strategy)
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_index_classified_as_derived_only_when_enabled() {
        let (_temp, ctx, strategy) = setup(true);
        let index = ctx.source_root().join("a/_all.scss");
        assert_eq!(strategy.classify(&ctx, &index), SpecialFile::Derived);
        assert_eq!(strategy.classify(&ctx, &ctx.source_root().join("a/_b.scss")), SpecialFile::None);

        let (_temp, ctx, strategy) = setup(false);
        assert_eq!(strategy.classify(&ctx, &ctx.source_root().join("_all.scss")), SpecialFile::None);
    }

    #[test]
    fn test_full_build_generates_nested_indexes() {
        let (_temp, ctx, mut strategy) = setup(true);
        let src = ctx.source_root().to_path_buf();
        touch(&src.join("_vars.scss"));
        touch(&src.join("components/_button.scss"));
        touch(&src.join("main.scss"));

        strategy.prepare_full_build(&ctx).unwrap();

        let root_index = fs::read_to_string(src.join("_all.scss")).unwrap();
        assert!(root_index.contains("@forward 'components/_all.scss';\n@forward '_vars.scss';"));
        let child_index = fs::read_to_string(src.join("components/_all.scss")).unwrap();
        assert!(child_index.ends_with("@forward '_button.scss';\n"));
    }

    #[test]
    fn test_partial_events_regenerate_upwards() {
        let (_temp, ctx, mut strategy) = setup(true);
        let src = ctx.source_root().to_path_buf();
        let partial = src.join("a/b/_x.scss");
        touch(&partial);

        strategy.observe_file_event(&ctx, &WatchEvent::Added(partial.clone())).unwrap();
        assert!(src.join("a/b/_all.scss").is_file());
        assert!(src.join("a/_all.scss").is_file());
        assert!(src.join("_all.scss").is_file());

        fs::remove_file(&partial).unwrap();
        strategy.observe_file_event(&ctx, &WatchEvent::Removed(partial)).unwrap();
        assert!(!src.join("a/b/_all.scss").exists());
        assert!(!src.join("_all.scss").exists());
    }

    #[test]
    fn test_disabled_index_generation_writes_nothing() {
        let (_temp, ctx, mut strategy) = setup(false);
        let partial = ctx.source_root().join("_x.scss");
        touch(&partial);
        strategy.prepare_full_build(&ctx).unwrap();
        strategy.observe_file_event(&ctx, &WatchEvent::Added(partial)).unwrap();
        assert!(!ctx.source_root().join("_all.scss").exists());
    }

    #[test]
    fn test_source_map_comment() {
        let (_temp, _ctx, strategy) = setup(false);
        assert_eq!(
            strategy.source_map_comment("main.css.map").as_deref(),
            Some("/*# sourceMappingURL=main.css.map */")
        );
    }
}

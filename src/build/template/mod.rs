//! Template family: rendering with directory-scoped variables.
//!
//! A variables file at the project or source root affects every template; one
//! deeper in the tree only affects templates under its directory. Variables are
//! reloaded from disk before each build so edits are always picked up.

pub mod variables;

use glob::Pattern;
use std::path::Path;

use crate::build::builder::{BuildError, FamilyStrategy, SpecialFile};
use crate::build::path::to_posix;
use crate::build::BuildContext;

pub use variables::{ScopedVariables, VariableMap, VariablesError, SCOPE_KEY};

#[derive(Debug, Clone)]
pub struct TemplateStrategy {
    var_file_name: String,
    variables: ScopedVariables,
}

impl TemplateStrategy {
    pub fn new(var_file_name: &str) -> Self {
        Self { var_file_name: var_file_name.to_string(), variables: ScopedVariables::default() }
    }

    pub fn variables(&self) -> &ScopedVariables {
        &self.variables
    }

    fn reload(&mut self, ctx: &BuildContext) -> Result<(), BuildError> {
        self.variables = ScopedVariables::load(ctx.project_root(), ctx.source_root(), &self.var_file_name)?;
        Ok(())
    }
}

/// Remove lines that are empty or whitespace-only.
pub fn strip_blank_lines(content: &str) -> String {
    content.lines().filter(|line| !line.trim().is_empty()).collect::<Vec<_>>().join("\n")
}

impl FamilyStrategy for TemplateStrategy {
    fn extra_watch_patterns(&self, ctx: &BuildContext) -> Vec<String> {
        let name = Pattern::escape(&self.var_file_name);
        vec![
            format!("{}/{}", Pattern::escape(&to_posix(ctx.project_root())), name),
            format!("{}/**/{}", Pattern::escape(&to_posix(ctx.source_root())), name),
        ]
    }

    fn watches_project_root(&self) -> bool {
        true
    }

    fn classify(&self, ctx: &BuildContext, path: &Path) -> SpecialFile {
        let is_var_file = path.file_name().is_some_and(|name| name == self.var_file_name.as_str());
        let Some(dir) = path.parent().filter(|_| is_var_file) else {
            return SpecialFile::None;
        };

        if dir == ctx.project_root() || dir == ctx.source_root() {
            SpecialFile::RootConfig
        } else if dir.starts_with(ctx.source_root()) {
            SpecialFile::ScopedConfig(dir.to_path_buf())
        } else {
            SpecialFile::None
        }
    }

    fn prepare_full_build(&mut self, ctx: &BuildContext) -> Result<(), BuildError> {
        self.reload(ctx)
    }

    fn prepare_partial_build(&mut self, ctx: &BuildContext) -> Result<(), BuildError> {
        self.reload(ctx)
    }

    fn variables_for(&self, ctx: &BuildContext, source: &Path) -> Option<VariableMap> {
        Some(self.variables.resolve(source, ctx.source_root()))
    }

    fn post_process(&self, content: String) -> String {
        strip_blank_lines(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::path::GlobMatcher;
    use crate::config::{BuilderConfig, Family};
    use std::fs;
    use std::path::PathBuf;

    fn context() -> BuildContext {
        BuildContext::new(BuilderConfig::default().resolve(Family::Template), PathBuf::from("/p"))
    }

    #[test]
    fn test_classify_variables_files() {
        let ctx = context();
        let strategy = TemplateStrategy::new("vars.yml");

        assert_eq!(strategy.classify(&ctx, Path::new("/p/vars.yml")), SpecialFile::RootConfig);
        assert_eq!(strategy.classify(&ctx, Path::new("/p/src/vars.yml")), SpecialFile::RootConfig);
        assert_eq!(
            strategy.classify(&ctx, Path::new("/p/src/blog/vars.yml")),
            SpecialFile::ScopedConfig(PathBuf::from("/p/src/blog"))
        );
        assert_eq!(strategy.classify(&ctx, Path::new("/p/src/blog/post.njk")), SpecialFile::None);
        assert_eq!(strategy.classify(&ctx, Path::new("/elsewhere/vars.yml")), SpecialFile::None);
    }

    #[test]
    fn test_extra_watch_patterns() {
        let ctx = context();
        let strategy = TemplateStrategy::new("vars.yml");
        let patterns = strategy.extra_watch_patterns(&ctx);
        assert_eq!(patterns, vec!["/p/vars.yml", "/p/src/**/vars.yml"]);

        let matcher = GlobMatcher::from_patterns(&patterns).unwrap();
        assert!(matcher.matches(Path::new("/p/src/a/b/vars.yml")));
        assert!(!matcher.matches(Path::new("/p/other/vars.yml")));
    }

    #[test]
    fn test_strip_blank_lines() {
        assert_eq!(strip_blank_lines("<a>\n\n   \n<b>\n\t\n"), "<a>\n<b>");
    }

    #[test]
    fn test_variables_reloaded_before_builds() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = BuilderConfig::default().resolve(Family::Template);
        let ctx = BuildContext::new(config, temp.path().to_path_buf());
        let mut strategy = TemplateStrategy::new("vars.yml");
        let page = ctx.source_root().join("page.njk");

        fs::write(temp.path().join("vars.yml"), "title: first\n").unwrap();
        strategy.prepare_full_build(&ctx).unwrap();
        let vars = strategy.variables_for(&ctx, &page).unwrap();
        assert_eq!(vars["title"], "first");

        fs::write(temp.path().join("vars.yml"), "title: second\n").unwrap();
        strategy.prepare_partial_build(&ctx).unwrap();
        let vars = strategy.variables_for(&ctx, &page).unwrap();
        assert_eq!(vars["title"], "second");
        assert_eq!(vars[SCOPE_KEY], ".");
    }
}

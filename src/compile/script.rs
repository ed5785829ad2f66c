//! Script bundling through an external bundler process (esbuild-compatible CLI).

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

use super::{
    options_to_flags, run_program, strip_source_map_comment, Asset, CompileError, CompileOutput,
    CompileRequest, Compiler,
};
use crate::build::output::source_map_path;

/// Bundles one entry per invocation into a private temp directory.
#[derive(Debug, Clone)]
pub struct ExternalBundler {
    program: String,
    working_dir: Option<PathBuf>,
    minify: bool,
    sourcemap: bool,
    externals: Vec<String>,
    options: toml::Table,
}

impl ExternalBundler {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            working_dir: None,
            minify: false,
            sourcemap: false,
            externals: Vec::new(),
            options: toml::Table::new(),
        }
    }

    /// Run the bundler from this directory (module resolution root).
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_minify(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }

    pub fn with_sourcemap(mut self, sourcemap: bool) -> Self {
        self.sourcemap = sourcemap;
        self
    }

    /// Module names left out of the bundle.
    pub fn with_externals(mut self, externals: impl IntoIterator<Item = String>) -> Self {
        self.externals = externals.into_iter().collect();
        self
    }

    /// Pass-through bundler options.
    pub fn with_options(mut self, options: toml::Table) -> Self {
        self.options = options;
        self
    }

    /// Full argument list for one entry.
    pub fn arguments(&self, source: &Path, outfile: &Path) -> Vec<String> {
        let mut args = vec![
            source.to_string_lossy().into_owned(),
            "--bundle".to_string(),
            "--format=esm".to_string(),
            format!("--outfile={}", outfile.display()),
        ];
        if self.minify {
            args.push("--minify".to_string());
        }
        if self.sourcemap {
            args.push("--sourcemap".to_string());
        }
        args.extend(self.externals.iter().map(|name| format!("--external:{}", name)));
        args.extend(options_to_flags(&self.options));
        args
    }
}

impl Compiler for ExternalBundler {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompileOutput, CompileError> {
        let source = request.source;
        let staging = tempfile::tempdir().map_err(|e| CompileError::io(source, e))?;
        let stem = source.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let outfile = staging.path().join(format!("{}.js", stem));
        let map_file = source_map_path(&outfile);

        let mut command = Command::new(&self.program);
        command.args(self.arguments(source, &outfile));
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        run_program(&mut command, &self.program, source)?;

        let content = fs::read_to_string(&outfile).map_err(|e| CompileError::io(source, e))?;
        let source_map = if self.sourcemap && map_file.is_file() {
            Some(fs::read_to_string(&map_file).map_err(|e| CompileError::io(source, e))?)
        } else {
            None
        };

        let mut assets = Vec::new();
        for entry in WalkDir::new(staging.path()).sort_by_file_name() {
            let entry = entry.map_err(|e| CompileError::io(source, e.into()))?;
            let path = entry.path();
            if !entry.file_type().is_file() || path == outfile.as_path() || path == map_file.as_path() {
                continue;
            }
            let file_name = path.strip_prefix(staging.path()).unwrap_or(path).to_path_buf();
            let contents = fs::read(path).map_err(|e| CompileError::io(source, e))?;
            assets.push(Asset { file_name, contents });
        }

        Ok(CompileOutput { content: strip_source_map_comment(&content), source_map, assets })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments() {
        let mut options = toml::Table::new();
        options.insert("target".into(), toml::Value::String("es2020".into()));
        let bundler = ExternalBundler::new("esbuild")
            .with_minify(true)
            .with_sourcemap(true)
            .with_externals(vec!["jquery".to_string()])
            .with_options(options);

        let args = bundler.arguments(Path::new("/p/src/app.ts"), Path::new("/tmp/x/app.js"));
        assert_eq!(
            args,
            vec![
                "/p/src/app.ts",
                "--bundle",
                "--format=esm",
                "--outfile=/tmp/x/app.js",
                "--minify",
                "--sourcemap",
                "--external:jquery",
                "--target=es2020",
            ]
        );
    }

    #[test]
    fn test_plain_arguments() {
        let args = ExternalBundler::new("esbuild").arguments(Path::new("a.js"), Path::new("o/a.js"));
        assert_eq!(args, vec!["a.js", "--bundle", "--format=esm", "--outfile=o/a.js"]);
    }

    #[test]
    fn test_missing_bundler_reports_spawn_error() {
        let bundler = ExternalBundler::new("assetsmith-no-such-bundler");
        let request = CompileRequest::new(Path::new("/p/src/app.ts"), Path::new("/p/src"));
        assert!(matches!(bundler.compile(&request), Err(CompileError::Spawn { .. })));
    }
}

//! Style-sheet compilation.
//!
//! Plain `.css` entries are parsed and re-printed in-process with lightningcss.
//! Sass sources (`.scss`, `.sass`) are handed to an external `sass` process.

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{
    options_to_flags, run_program, strip_source_map_comment, CompileError, CompileOutput,
    CompileRequest, Compiler,
};
use crate::build::output::source_map_path;
use crate::config::OutputStyle;

#[derive(Debug, Clone)]
pub struct StyleCompiler {
    program: String,
    style: OutputStyle,
    sourcemap: bool,
    load_paths: Vec<PathBuf>,
    options: toml::Table,
}

impl StyleCompiler {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            style: OutputStyle::Expanded,
            sourcemap: false,
            load_paths: Vec::new(),
            options: toml::Table::new(),
        }
    }

    pub fn with_style(mut self, style: OutputStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_sourcemap(mut self, sourcemap: bool) -> Self {
        self.sourcemap = sourcemap;
        self
    }

    /// Directories searched for `@use`/`@import` targets.
    pub fn with_load_paths(mut self, load_paths: Vec<PathBuf>) -> Self {
        self.load_paths = load_paths;
        self
    }

    pub fn with_options(mut self, options: toml::Table) -> Self {
        self.options = options;
        self
    }

    fn compile_css(&self, source: &Path) -> Result<CompileOutput, CompileError> {
        let code = fs::read_to_string(source).map_err(|e| CompileError::io(source, e))?;
        let minify = self.style == OutputStyle::Compressed;

        let parser_options =
            ParserOptions { filename: source.to_string_lossy().into_owned(), ..ParserOptions::default() };
        let mut sheet = StyleSheet::parse(&code, parser_options)
            .map_err(|e| CompileError::failed(source, e.to_string()))?;
        if minify {
            sheet
                .minify(MinifyOptions::default())
                .map_err(|e| CompileError::failed(source, e.to_string()))?;
        }
        let printed = sheet
            .to_css(PrinterOptions { minify, ..PrinterOptions::default() })
            .map_err(|e| CompileError::failed(source, e.to_string()))?;

        Ok(CompileOutput::new(printed.code))
    }

    /// Arguments for the sass CLI.
    pub fn sass_arguments(&self, source: &Path, outfile: &Path) -> Vec<String> {
        let mut args = vec![format!("--style={}", self.style.as_str())];
        args.extend(self.load_paths.iter().map(|p| format!("--load-path={}", p.display())));
        if self.sourcemap {
            args.push("--source-map".to_string());
            args.push("--embed-sources".to_string());
        } else {
            args.push("--no-source-map".to_string());
        }
        args.extend(options_to_flags(&self.options));
        args.push(source.to_string_lossy().into_owned());
        args.push(outfile.to_string_lossy().into_owned());
        args
    }

    fn compile_sass(&self, source: &Path) -> Result<CompileOutput, CompileError> {
        let staging = tempfile::tempdir().map_err(|e| CompileError::io(source, e))?;
        let outfile = staging.path().join("out.css");

        let mut command = Command::new(&self.program);
        command.args(self.sass_arguments(source, &outfile));
        run_program(&mut command, &self.program, source)?;

        let content = fs::read_to_string(&outfile).map_err(|e| CompileError::io(source, e))?;
        let map_file = source_map_path(&outfile);
        let source_map = if self.sourcemap && map_file.is_file() {
            Some(fs::read_to_string(&map_file).map_err(|e| CompileError::io(source, e))?)
        } else {
            None
        };

        Ok(CompileOutput { content: strip_source_map_comment(&content), source_map, assets: Vec::new() })
    }
}

impl Compiler for StyleCompiler {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompileOutput, CompileError> {
        let is_plain_css = request
            .source
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("css"));
        if is_plain_css {
            self.compile_css(request.source)
        } else {
            self.compile_sass(request.source)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn compile(compiler: &StyleCompiler, path: &Path) -> Result<CompileOutput, CompileError> {
        compiler.compile(&CompileRequest::new(path, path.parent().unwrap()))
    }

    #[test]
    fn test_plain_css_expanded() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("main.css");
        fs::write(&path, ".a{color:red}").unwrap();

        let output = compile(&StyleCompiler::new("sass"), &path).unwrap();
        assert!(output.content.contains(".a {"));
        assert!(output.content.contains("color: red"));
        assert!(output.source_map.is_none());
    }

    #[test]
    fn test_plain_css_compressed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("main.css");
        fs::write(&path, ".a {\n  color: #ff0000;\n}\n\n.b {\n  margin: 0px;\n}\n").unwrap();

        let compiler = StyleCompiler::new("sass").with_style(OutputStyle::Compressed);
        let output = compile(&compiler, &path).unwrap();
        assert!(!output.content.contains('\n'));
        assert!(output.content.contains(".a{color:red}"));
    }

    #[test]
    fn test_invalid_css_fails_with_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.css");
        fs::write(&path, "..a { color: red; }").unwrap();

        let result = compile(&StyleCompiler::new("sass"), &path);
        assert!(matches!(result, Err(CompileError::Failed { ref source_path, .. }) if source_path == &path));
    }

    #[test]
    fn test_sass_arguments() {
        let compiler = StyleCompiler::new("sass")
            .with_style(OutputStyle::Compressed)
            .with_sourcemap(true)
            .with_load_paths(vec![PathBuf::from("/p/src"), PathBuf::from("/p/node_modules")]);
        let args = compiler.sass_arguments(Path::new("/p/src/app.scss"), Path::new("/t/out.css"));
        assert_eq!(
            args,
            vec![
                "--style=compressed",
                "--load-path=/p/src",
                "--load-path=/p/node_modules",
                "--source-map",
                "--embed-sources",
                "/p/src/app.scss",
                "/t/out.css",
            ]
        );
    }

    #[test]
    fn test_missing_sass_program() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("main.scss");
        fs::write(&path, "$a: 1;").unwrap();
        let result = compile(&StyleCompiler::new("assetsmith-no-such-sass"), &path);
        assert!(matches!(result, Err(CompileError::Spawn { .. })));
    }
}

//! Delegated compilers.
//!
//! Each asset family hands entry sources to a [`Compiler`]. The builders never
//! look inside the result beyond content, optional source map, and extra
//! assets to write next to the artifact.

pub mod script;
pub mod style;
pub mod template;

use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

use crate::build::template::VariableMap;

pub use script::ExternalBundler;
pub use style::StyleCompiler;
pub use template::TemplateRenderer;

/// Auxiliary file emitted by a compiler (e.g. CSS split out of a bundle).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Path relative to the artifact's directory
    pub file_name: PathBuf,
    pub contents: Vec<u8>,
}

/// One compile invocation.
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    /// Absolute path of the entry source
    pub source: &'a Path,
    /// Absolute source root
    pub source_root: &'a Path,
    /// Render context (template family only)
    pub variables: Option<&'a VariableMap>,
}

impl<'a> CompileRequest<'a> {
    pub fn new(source: &'a Path, source_root: &'a Path) -> Self {
        Self { source, source_root, variables: None }
    }

    pub fn with_variables(mut self, variables: &'a VariableMap) -> Self {
        self.variables = Some(variables);
        self
    }
}

/// Compiler output for one entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompileOutput {
    pub content: String,
    pub source_map: Option<String>,
    pub assets: Vec<Asset>,
}

impl CompileOutput {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), source_map: None, assets: Vec::new() }
    }

    pub fn with_source_map(mut self, map: impl Into<String>) -> Self {
        self.source_map = Some(map.into());
        self
    }
}

/// Error raised by a delegated compiler for one entry.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The compiler rejected the source
    #[error("failed to compile {}: {message}", source_path.display())]
    Failed { source_path: PathBuf, message: String },
    /// The external program could not be started
    #[error("failed to run '{program}' for {}: {error}", source_path.display())]
    Spawn { program: String, source_path: PathBuf, error: std::io::Error },
    /// Reading inputs or collecting outputs failed
    #[error("I/O error while compiling {}: {error}", source_path.display())]
    Io { source_path: PathBuf, error: std::io::Error },
}

impl CompileError {
    pub fn failed(source_path: &Path, message: impl Into<String>) -> Self {
        CompileError::Failed { source_path: source_path.to_path_buf(), message: message.into() }
    }

    pub fn io(source_path: &Path, error: std::io::Error) -> Self {
        CompileError::Io { source_path: source_path.to_path_buf(), error }
    }
}

/// The delegated compiler interface of one asset family.
pub trait Compiler: Send + Sync {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompileOutput, CompileError>;
}

/// Translate an opaque options table into `--key=value` command-line flags.
///
/// Strings and numbers become `--key=value`, `true` becomes `--key`, `false`
/// is dropped, arrays repeat the flag, and nested tables become `--key:sub=value`.
pub fn options_to_flags(options: &toml::Table) -> Vec<String> {
    let mut flags = Vec::new();
    for (key, value) in options {
        push_flags(&mut flags, key, value);
    }
    flags
}

fn push_flags(flags: &mut Vec<String>, key: &str, value: &toml::Value) {
    match value {
        toml::Value::Boolean(true) => flags.push(format!("--{}", key)),
        toml::Value::Boolean(false) => {}
        toml::Value::String(s) => flags.push(format!("--{}={}", key, s)),
        toml::Value::Array(items) => {
            for item in items {
                push_flags(flags, key, item);
            }
        }
        toml::Value::Table(table) => {
            for (sub, item) in table {
                push_flags(flags, &format!("{}:{}", key, sub), item);
            }
        }
        other => flags.push(format!("--{}={}", key, other)),
    }
}

/// Drop `sourceMappingURL` reference lines; the builder appends its own.
pub(crate) fn strip_source_map_comment(content: &str) -> String {
    content
        .lines()
        .filter(|line| {
            let line = line.trim_start();
            !(line.starts_with("//# sourceMappingURL=") || line.starts_with("/*# sourceMappingURL="))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run an external program to completion, mapping failures to [`CompileError`].
pub(crate) fn run_program(
    command: &mut Command,
    program: &str,
    source: &Path,
) -> Result<std::process::Output, CompileError> {
    tracing::debug!(program, source = %source.display(), "running external compiler");
    let output = command.output().map_err(|error| CompileError::Spawn {
        program: program.to_string(),
        source_path: source.to_path_buf(),
        error,
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("{} exited with {}", program, output.status)
        } else {
            stderr
        };
        return Err(CompileError::failed(source, message));
    }
    Ok(output)
}

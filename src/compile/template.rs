//! Template rendering with minijinja.
//!
//! Templates are loaded by their `/`-separated path relative to the source
//! root, so entries can `include`/`extends` each other by that name.

use minijinja::{path_loader, AutoEscape, Environment, Value};
use std::path::Path;

use super::{CompileError, CompileOutput, CompileRequest, Compiler};
use crate::build::path::to_posix;

/// Renderer settings, read from the family's `compile_options`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateRenderer {
    trim_blocks: bool,
    lstrip_blocks: bool,
    autoescape: bool,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self { trim_blocks: false, lstrip_blocks: false, autoescape: true }
    }
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `trim_blocks`, `lstrip_blocks` and `autoescape` from an options table.
    pub fn from_options(options: &toml::Table) -> Self {
        let flag = |key: &str, default: bool| options.get(key).and_then(toml::Value::as_bool).unwrap_or(default);
        let defaults = Self::default();
        Self {
            trim_blocks: flag("trim_blocks", defaults.trim_blocks),
            lstrip_blocks: flag("lstrip_blocks", defaults.lstrip_blocks),
            autoescape: flag("autoescape", defaults.autoescape),
        }
    }

    fn environment(&self, source_root: &Path) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_loader(path_loader(source_root));
        env.set_trim_blocks(self.trim_blocks);
        env.set_lstrip_blocks(self.lstrip_blocks);
        let autoescape = self.autoescape;
        env.set_auto_escape_callback(move |_| if autoescape { AutoEscape::Html } else { AutoEscape::None });
        env
    }
}

impl Compiler for TemplateRenderer {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompileOutput, CompileError> {
        let source = request.source;
        let relative = source.strip_prefix(request.source_root).map_err(|_| {
            CompileError::failed(source, "template is outside the source root")
        })?;
        let name = to_posix(relative);

        let env = self.environment(request.source_root);
        let template = env.get_template(&name).map_err(|e| CompileError::failed(source, e.to_string()))?;
        let context = match request.variables {
            Some(vars) => Value::from_serialize(vars),
            None => Value::from_serialize(serde_json::Map::new()),
        };
        let rendered = template.render(context).map_err(|e| CompileError::failed(source, e.to_string()))?;
        Ok(CompileOutput::new(rendered))
    }
}

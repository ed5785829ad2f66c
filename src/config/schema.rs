//! Configuration schema types for `assetsmith.toml`
//!
//! Defines the typed view of a merged per-family configuration table, the
//! defaults each asset family applies on top of it, and validation rules.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::fmt::LineEnding;

/// Asset family handled by one builder instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// Script bundling (`js` section)
    Script,
    /// Style-sheet compilation (`css` section)
    Style,
    /// Template rendering (`html` section)
    Template,
}

impl Family {
    /// All families, in the order builders are instantiated.
    pub const ALL: [Family; 3] = [Family::Script, Family::Style, Family::Template];

    /// Configuration section key for this family.
    pub fn key(self) -> &'static str {
        match self {
            Family::Script => "js",
            Family::Style => "css",
            Family::Template => "html",
        }
    }

    /// Look up a family by its configuration key.
    pub fn from_key(key: &str) -> Option<Self> {
        Family::ALL.into_iter().find(|family| family.key() == key)
    }
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Style-sheet output style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputStyle {
    /// Readable output, passed through the formatter
    #[default]
    Expanded,
    /// Minified output
    Compressed,
}

impl OutputStyle {
    /// Name understood by style compilers.
    pub fn as_str(self) -> &'static str {
        match self {
            OutputStyle::Expanded => "expanded",
            OutputStyle::Compressed => "compressed",
        }
    }
}

/// Entry-point exclusion rules.
///
/// Prefix and suffix values are regular-expression fragments anchored at the
/// start or end of the candidate name. `prefix`/`suffix` fill both the file and
/// directory variants when those are not set explicitly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub file_prefix: Option<String>,
    pub file_suffix: Option<String>,
    pub dir_prefix: Option<String>,
    pub dir_suffix: Option<String>,
    pub dir_names: Option<Vec<String>>,
}

impl IgnoreConfig {
    /// Expand the `prefix`/`suffix` shorthands into the explicit fields.
    pub fn expanded(&self) -> IgnoreConfig {
        let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());
        IgnoreConfig {
            prefix: None,
            suffix: None,
            file_prefix: non_empty(&self.file_prefix).or_else(|| non_empty(&self.prefix)),
            file_suffix: non_empty(&self.file_suffix).or_else(|| non_empty(&self.suffix)),
            dir_prefix: non_empty(&self.dir_prefix).or_else(|| non_empty(&self.prefix)),
            dir_suffix: non_empty(&self.dir_suffix).or_else(|| non_empty(&self.suffix)),
            dir_names: self.dir_names.clone(),
        }
    }
}

/// Explicit formatter overrides (`[format]`), applied on top of `.editorconfig`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// Number of columns per indentation level
    pub indent_size: Option<usize>,
    /// Indent with tabs instead of spaces
    pub indent_with_tabs: Option<bool>,
    /// Terminate formatted output with a line ending
    pub end_with_newline: Option<bool>,
    /// Line ending for formatted output
    pub eol: Option<LineEnding>,
}

/// Watch mode configuration (`[watch]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
}

fn default_debounce_ms() -> u32 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms() }
    }
}

/// Typed view of one family's merged configuration table.
///
/// Every field is optional: anything left unset is filled in from the family
/// defaults by [`BuilderConfig::resolve`]. Keys belonging to other families
/// are simply ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    pub source_root: Option<PathBuf>,
    pub output_root: Option<PathBuf>,
    pub entry_extensions: Option<Vec<String>>,
    pub module_extensions: Option<Vec<String>>,
    pub output_extension: Option<String>,
    pub ignore: Option<IgnoreConfig>,
    /// Opaque options handed to the delegated compiler
    pub compile_options: toml::Table,
    pub format: FormatConfig,
    pub sourcemap: Option<bool>,
    pub minify: Option<bool>,
    /// External compiler program
    pub compiler: Option<String>,

    // Script family
    /// Module name -> global identifier; every name is treated as external
    pub globals: BTreeMap<String, String>,

    // Style family
    pub style: Option<OutputStyle>,
    pub generate_index: Option<bool>,
    pub index_file_name: Option<String>,
    pub index_import_type: Option<String>,
    pub load_paths: Option<Vec<PathBuf>>,

    // Template family
    pub var_file_name: Option<String>,
}

/// Resolved options shared by every builder.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    /// Source root, relative to the project root unless absolute
    pub source_root: PathBuf,
    /// Output root, relative to the project root unless absolute
    pub output_root: PathBuf,
    /// Extensions of entry-point files
    pub entry_extensions: Vec<String>,
    /// Extensions that are watched but never entry points
    pub module_extensions: Vec<String>,
    /// Exclusion rules, shorthands already expanded
    pub ignore: IgnoreConfig,
    /// Extension of produced artifacts
    pub output_extension: String,
    /// Opaque compiler options
    pub compile_options: toml::Table,
    /// Formatter overrides
    pub format: FormatConfig,
    /// Emit `.map` files next to outputs
    pub sourcemap: bool,
    /// Minify output (skips formatting)
    pub minify: bool,
}

impl BuildOptions {
    /// Union of entry and module extensions, in first-seen order.
    pub fn watch_extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = Vec::new();
        for ext in self.entry_extensions.iter().chain(&self.module_extensions) {
            if !extensions.contains(ext) {
                extensions.push(ext.clone());
            }
        }
        extensions
    }
}

/// Script family options
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOptions {
    /// Bundler program
    pub compiler: String,
    /// Module name -> global identifier
    pub globals: BTreeMap<String, String>,
}

/// Style family options
#[derive(Debug, Clone, PartialEq)]
pub struct StyleOptions {
    /// Sass compiler program (used for `.scss`/`.sass` sources)
    pub compiler: String,
    pub style: OutputStyle,
    pub generate_index: bool,
    pub index_file_name: String,
    pub index_import_type: String,
    pub load_paths: Vec<PathBuf>,
}

/// Template family options
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateOptions {
    /// Name of the per-directory variables file
    pub var_file_name: String,
}

/// Family-specific part of a resolved configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum FamilyOptions {
    Script(ScriptOptions),
    Style(StyleOptions),
    Template(TemplateOptions),
}

/// Fully resolved configuration for one builder.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyConfig {
    pub family: Family,
    pub options: BuildOptions,
    pub extra: FamilyOptions,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl BuilderConfig {
    /// Apply the family defaults to produce resolved options.
    pub fn resolve(self, family: Family) -> FamilyConfig {
        let mut ignore = self.ignore.clone().unwrap_or_default().expanded();

        let (output_root, entry_extensions, module_extensions, output_extension) = match family {
            Family::Script => {
                if ignore.dir_names.is_none() {
                    ignore.dir_names = Some(strings(&["node_modules"]));
                }
                ("public/assets/js", strings(&["js", "ts"]), strings(&["mjs", "cjs", "mts", "cts"]), "js")
            }
            Family::Style => {
                if ignore.file_prefix.is_none() {
                    ignore.file_prefix = Some("_".to_string());
                }
                ("public/assets/css", strings(&["scss", "sass", "css"]), Vec::new(), "css")
            }
            Family::Template => ("public", strings(&["njk", "twig"]), Vec::new(), "html"),
        };

        let source_root = self.source_root.clone().unwrap_or_else(|| PathBuf::from("src"));
        let style = self.style.unwrap_or_default();
        let minify = match family {
            Family::Style => style == OutputStyle::Compressed || self.minify.unwrap_or(false),
            _ => self.minify.unwrap_or(false),
        };

        let extra = match family {
            Family::Script => FamilyOptions::Script(ScriptOptions {
                compiler: self.compiler.clone().unwrap_or_else(|| "esbuild".to_string()),
                globals: self.globals.clone(),
            }),
            Family::Style => FamilyOptions::Style(StyleOptions {
                compiler: self.compiler.clone().unwrap_or_else(|| "sass".to_string()),
                style: if minify { OutputStyle::Compressed } else { style },
                generate_index: self.generate_index.unwrap_or(false),
                index_file_name: self.index_file_name.clone().unwrap_or_else(|| "_all.scss".to_string()),
                index_import_type: self
                    .index_import_type
                    .clone()
                    .unwrap_or_else(|| "forward".to_string()),
                load_paths: self
                    .load_paths
                    .clone()
                    .unwrap_or_else(|| vec![source_root.clone(), PathBuf::from("node_modules")]),
            }),
            Family::Template => FamilyOptions::Template(TemplateOptions {
                var_file_name: self.var_file_name.clone().unwrap_or_else(|| "vars.yml".to_string()),
            }),
        };

        FamilyConfig {
            family,
            options: BuildOptions {
                source_root,
                output_root: self.output_root.unwrap_or_else(|| PathBuf::from(output_root)),
                entry_extensions: self.entry_extensions.unwrap_or(entry_extensions),
                module_extensions: self.module_extensions.unwrap_or(module_extensions),
                ignore,
                output_extension: self.output_extension.unwrap_or_else(|| output_extension.to_string()),
                compile_options: self.compile_options,
                format: self.format,
                sourcemap: self.sourcemap.unwrap_or(false),
                minify,
            },
            extra,
        }
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "css.index_file_name")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "assetsmith.toml: '{}' {}", self.field, self.message)
    }
}

fn is_valid_extension(ext: &str) -> bool {
    !ext.is_empty() && !ext.starts_with('.') && !ext.contains(['/', '{', '}', ','])
}

impl FamilyConfig {
    /// Validate the resolved configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let field = |name: &str| format!("{}.{}", self.family.key(), name);

        if self.options.entry_extensions.is_empty() {
            errors.push(ConfigValidationError {
                field: field("entry_extensions"),
                message: "must contain at least one extension".to_string(),
            });
        }

        for ext in self.options.entry_extensions.iter().chain(&self.options.module_extensions) {
            if !is_valid_extension(ext) {
                errors.push(ConfigValidationError {
                    field: field("entry_extensions"),
                    message: format!("'{}' is not a bare file extension", ext),
                });
            }
        }

        if !is_valid_extension(&self.options.output_extension) {
            errors.push(ConfigValidationError {
                field: field("output_extension"),
                message: "must be a non-empty bare extension".to_string(),
            });
        }

        if self.options.source_root.as_os_str().is_empty() {
            errors.push(ConfigValidationError {
                field: field("source_root"),
                message: "must be a non-empty path".to_string(),
            });
        }

        match &self.extra {
            FamilyOptions::Script(script) if script.compiler.trim().is_empty() => {
                errors.push(ConfigValidationError {
                    field: field("compiler"),
                    message: "must name a bundler program".to_string(),
                });
            }
            FamilyOptions::Style(style) => {
                if style.generate_index && style.index_file_name.trim().is_empty() {
                    errors.push(ConfigValidationError {
                        field: field("index_file_name"),
                        message: "must be a non-empty file name".to_string(),
                    });
                }
                if style.index_file_name.contains(['/', '\\']) {
                    errors.push(ConfigValidationError {
                        field: field("index_file_name"),
                        message: "must not contain path separators".to_string(),
                    });
                }
            }
            FamilyOptions::Template(template) if template.var_file_name.trim().is_empty() => {
                errors.push(ConfigValidationError {
                    field: field("var_file_name"),
                    message: "must be a non-empty file name".to_string(),
                });
            }
            _ => {}
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

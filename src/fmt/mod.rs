//! Output formatting for non-minified artifacts.
//!
//! Options come from `.editorconfig` lookups merged with explicit `[format]`
//! overrides from `assetsmith.toml`.

pub mod editorconfig;
pub mod spans;

use serde::{Deserialize, Serialize};
use std::path::Path;

use spans::LineSpan;

use crate::config::FormatConfig;

pub use spans::Syntax;

/// Line terminator for formatted output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    Lf,
    Crlf,
    Cr,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::Crlf => "\r\n",
            LineEnding::Cr => "\r",
        }
    }

    /// Parse an editorconfig `end_of_line` value.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "lf" => Some(LineEnding::Lf),
            "crlf" => Some(LineEnding::Crlf),
            "cr" => Some(LineEnding::Cr),
            _ => None,
        }
    }
}

/// Resolved formatter settings
#[derive(Debug, Clone, PartialEq)]
pub struct FormatOptions {
    pub indent_size: usize,
    pub indent_with_tabs: bool,
    pub end_with_newline: bool,
    pub eol: LineEnding,
    /// Decides which literals are left untouched
    pub syntax: Syntax,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            indent_size: 2,
            indent_with_tabs: false,
            end_with_newline: true,
            eol: LineEnding::Lf,
            syntax: Syntax::default(),
        }
    }
}

impl FormatOptions {
    /// Apply explicit overrides on top of these options.
    pub fn with_overrides(mut self, overrides: &FormatConfig) -> Self {
        if let Some(size) = overrides.indent_size {
            self.indent_size = size;
        }
        if let Some(tabs) = overrides.indent_with_tabs {
            self.indent_with_tabs = tabs;
        }
        if let Some(newline) = overrides.end_with_newline {
            self.end_with_newline = newline;
        }
        if let Some(eol) = overrides.eol {
            self.eol = eol;
        }
        self
    }

    /// Look up options for artifacts with `output_extension` produced in
    /// `project_root`, then apply `overrides`.
    ///
    /// Unreadable `.editorconfig` files are skipped with a warning.
    pub fn resolve(project_root: &Path, output_extension: &str, overrides: &FormatConfig) -> Self {
        let probe = project_root.join(format!("index.{}", output_extension));
        let base = match editorconfig::lookup(&probe) {
            Ok(properties) => properties.apply_to(FormatOptions::default()),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable .editorconfig");
                FormatOptions::default()
            }
        };
        let mut options = base.with_overrides(overrides);
        options.syntax = Syntax::from_extension(output_extension);
        options
    }

    fn indent_unit(&self) -> String {
        if self.indent_with_tabs {
            "\t".to_string()
        } else {
            " ".repeat(self.indent_size)
        }
    }
}

/// Code formatter applied to compiled output before it is written.
pub trait Formatter: Send + Sync {
    fn format(&self, content: &str, options: &FormatOptions) -> String;
}

/// Re-indenting formatter.
///
/// Leading indentation is read in two-space (or tab) levels and rewritten with
/// the configured unit. Trailing whitespace is removed and line endings are
/// normalised. Lines are never wrapped or reflowed.
///
/// Whitespace inside literals (see [`spans`]) is kept as is: a line starting
/// inside one keeps its indentation, and a line ending inside one keeps its
/// trailing whitespace.
#[derive(Debug, Default, Clone, Copy)]
pub struct IndentFormatter;

impl IndentFormatter {
    const SOURCE_LEVEL: usize = 2;

    fn reindent(line: &str, unit: &str, span: LineSpan) -> String {
        let trimmed = if span.ends_verbatim { line } else { line.trim_end() };
        if span.starts_verbatim {
            return trimmed.to_string();
        }
        let body = trimmed.trim_start_matches([' ', '\t']);
        let leading = &trimmed[..trimmed.len() - body.len()];

        let mut levels = 0;
        let mut spaces = 0;
        for ch in leading.chars() {
            if ch == '\t' {
                levels += 1;
            } else {
                spaces += 1;
            }
        }
        levels += spaces / Self::SOURCE_LEVEL;
        let remainder = spaces % Self::SOURCE_LEVEL;

        format!("{}{}{}", unit.repeat(levels), " ".repeat(remainder), body)
    }
}

impl Formatter for IndentFormatter {
    fn format(&self, content: &str, options: &FormatOptions) -> String {
        let unit = options.indent_unit();
        let eol = options.eol.as_str();

        let spans = spans::classify(content, options.syntax);
        let lines: Vec<String> = content
            .lines()
            .zip(spans)
            .map(|(line, span)| Self::reindent(line, &unit, span))
            .collect();
        let mut out = lines.join(eol);
        let trimmed_len = out.trim_end_matches(['\r', '\n']).len();
        out.truncate(trimmed_len);
        if options.end_with_newline && !out.is_empty() {
            out.push_str(eol);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reindent_to_four_spaces() {
        let options = FormatOptions { indent_size: 4, ..Default::default() };
        let input = "a {\n  color: red;\n  b {\n    c: d;\n  }\n}\n";
        let expected = "a {\n    color: red;\n    b {\n        c: d;\n    }\n}\n";
        assert_eq!(IndentFormatter.format(input, &options), expected);
    }

    #[test]
    fn test_reindent_with_tabs() {
        let options = FormatOptions { indent_with_tabs: true, ..Default::default() };
        assert_eq!(IndentFormatter.format("x\n  y\n    z", &options), "x\n\ty\n\t\tz\n");
    }

    #[test]
    fn test_trailing_whitespace_and_eol() {
        let options = FormatOptions { eol: LineEnding::Crlf, ..Default::default() };
        assert_eq!(IndentFormatter.format("a  \r\nb\t\n\n\n", &options), "a\r\nb\r\n");
    }

    #[test]
    fn test_odd_indentation_keeps_remainder() {
        let options = FormatOptions { indent_size: 4, ..Default::default() };
        assert_eq!(IndentFormatter.format("   x", &options), "     x\n");
    }

    #[test]
    fn test_without_final_newline() {
        let options = FormatOptions { end_with_newline: false, ..Default::default() };
        assert_eq!(IndentFormatter.format("a\n", &options), "a");
    }

    #[test]
    fn test_overrides_win() {
        let overrides = FormatConfig {
            indent_size: Some(8),
            indent_with_tabs: Some(true),
            end_with_newline: None,
            eol: Some(LineEnding::Cr),
        };
        let options = FormatOptions::default().with_overrides(&overrides);
        assert_eq!(options.indent_size, 8);
        assert!(options.indent_with_tabs);
        assert!(options.end_with_newline);
        assert_eq!(options.eol, LineEnding::Cr);
    }

    #[test]
    fn test_line_ending_names() {
        assert_eq!(LineEnding::from_name("CRLF"), Some(LineEnding::Crlf));
        assert_eq!(LineEnding::from_name("native"), None);
    }

    #[test]
    fn test_template_literal_contents_untouched() {
        let input = "const s = `line  \n    indented`;\n  next();\n";
        assert_eq!(IndentFormatter.format(input, &FormatOptions::default()), input);

        let options = FormatOptions { indent_size: 4, ..Default::default() };
        assert_eq!(
            IndentFormatter.format(input, &options),
            "const s = `line  \n    indented`;\n    next();\n"
        );
    }

    #[test]
    fn test_pre_block_untouched_in_markup() {
        let options = FormatOptions { indent_size: 4, syntax: Syntax::Markup, ..Default::default() };
        let input = "<div>\n  <pre>\n  a  \n    b\n  </pre>\n  <p>x</p>  \n</div>\n";
        let expected = "<div>\n    <pre>\n  a  \n    b\n  </pre>\n    <p>x</p>\n</div>\n";
        assert_eq!(IndentFormatter.format(input, &options), expected);
    }

    #[test]
    fn test_resolve_picks_syntax_from_extension() {
        let temp = tempfile::TempDir::new().unwrap();
        let options = FormatOptions::resolve(temp.path(), "css", &FormatConfig::default());
        assert_eq!(options.syntax, Syntax::Style);
    }
}

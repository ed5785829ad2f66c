//! Line classification for verbatim spans.
//!
//! A span is verbatim when rewriting its whitespace would change what the
//! artifact means: template literals and continued strings in scripts,
//! strings in style sheets, `<pre>`, `<textarea>` and `<script>` bodies in
//! markup. The scanner is line oriented and errs towards verbatim: an
//! unterminated literal only stops formatting for the rest of the file.

use serde::{Deserialize, Serialize};

/// Output language, selecting which literal forms are tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Syntax {
    #[default]
    Script,
    Style,
    Markup,
}

impl Syntax {
    /// Syntax for an artifact extension. Unknown extensions are treated as markup.
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "js" | "mjs" | "cjs" => Syntax::Script,
            "css" => Syntax::Style,
            _ => Syntax::Markup,
        }
    }
}

/// Whether each line starts and ends inside a verbatim span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineSpan {
    /// Leading whitespace belongs to a literal
    pub starts_verbatim: bool,
    /// Trailing whitespace belongs to a literal
    pub ends_verbatim: bool,
}

/// Classify every line of `content`, in `str::lines` order.
pub fn classify(content: &str, syntax: Syntax) -> Vec<LineSpan> {
    let mut spans = Vec::new();
    match syntax {
        Syntax::Script | Syntax::Style => {
            let mut scanner = CodeScanner::new(syntax == Syntax::Script);
            for line in content.lines() {
                let starts_verbatim = scanner.is_verbatim();
                scanner.scan_line(line);
                spans.push(LineSpan { starts_verbatim, ends_verbatim: scanner.is_verbatim() });
            }
        }
        Syntax::Markup => {
            let mut open: Option<&'static str> = None;
            for line in content.lines() {
                let starts_verbatim = open.is_some();
                scan_markup_line(line, &mut open);
                spans.push(LineSpan { starts_verbatim, ends_verbatim: open.is_some() });
            }
        }
    }
    spans
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    Quote(char),
    Template,
    LineComment,
    BlockComment,
}

/// Lexer state for scripts (`template_literals`) and style sheets.
struct CodeScanner {
    template_literals: bool,
    mode: Mode,
    /// Open brace count of each `${` interpolation, innermost last
    interpolations: Vec<usize>,
}

impl CodeScanner {
    fn new(template_literals: bool) -> Self {
        Self { template_literals, mode: Mode::Code, interpolations: Vec::new() }
    }

    fn is_verbatim(&self) -> bool {
        matches!(self.mode, Mode::Quote(_) | Mode::Template)
    }

    fn scan_line(&mut self, line: &str) {
        let mut chars = line.chars().peekable();
        let mut escaped_newline = false;

        while let Some(ch) = chars.next() {
            match self.mode {
                Mode::Code => match ch {
                    '\'' | '"' => self.mode = Mode::Quote(ch),
                    '`' if self.template_literals => self.mode = Mode::Template,
                    '/' if chars.peek() == Some(&'*') => {
                        chars.next();
                        self.mode = Mode::BlockComment;
                    }
                    '/' if self.template_literals && chars.peek() == Some(&'/') => {
                        self.mode = Mode::LineComment;
                    }
                    '{' => {
                        if let Some(depth) = self.interpolations.last_mut() {
                            *depth += 1;
                        }
                    }
                    '}' => match self.interpolations.last().copied() {
                        Some(0) => {
                            self.interpolations.pop();
                            self.mode = Mode::Template;
                        }
                        Some(_) => {
                            if let Some(depth) = self.interpolations.last_mut() {
                                *depth -= 1;
                            }
                        }
                        None => {}
                    },
                    _ => {}
                },
                Mode::Quote(quote) => {
                    if ch == '\\' {
                        escaped_newline = chars.next().is_none();
                    } else if ch == quote {
                        self.mode = Mode::Code;
                    }
                }
                Mode::Template => match ch {
                    '\\' => {
                        chars.next();
                    }
                    '`' => self.mode = Mode::Code,
                    '$' if chars.peek() == Some(&'{') => {
                        chars.next();
                        self.interpolations.push(0);
                        self.mode = Mode::Code;
                    }
                    _ => {}
                },
                Mode::LineComment => {}
                Mode::BlockComment => {
                    if ch == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        self.mode = Mode::Code;
                    }
                }
            }
        }

        match self.mode {
            Mode::LineComment => self.mode = Mode::Code,
            Mode::Quote(_) if !escaped_newline => self.mode = Mode::Code,
            _ => {}
        }
    }
}

const RAW_TAGS: [&str; 3] = ["pre", "textarea", "script"];

/// Track `<pre>`-like elements across one line of markup.
fn scan_markup_line(line: &str, open: &mut Option<&'static str>) {
    let lower = line.to_ascii_lowercase();
    let mut rest = lower.as_str();
    loop {
        match *open {
            Some(tag) => {
                let close = format!("</{}", tag);
                let Some(at) = rest.find(&close) else {
                    return;
                };
                rest = &rest[at + close.len()..];
                *open = None;
            }
            None => {
                let next = RAW_TAGS
                    .iter()
                    .filter_map(|tag| find_open_tag(rest, tag).map(|at| (at, *tag)))
                    .min_by_key(|(at, _)| *at);
                let Some((at, tag)) = next else {
                    return;
                };
                rest = &rest[at + 1 + tag.len()..];
                *open = Some(tag);
            }
        }
    }
}

fn find_open_tag(haystack: &str, tag: &str) -> Option<usize> {
    let needle = format!("<{}", tag);
    haystack.match_indices(&needle).map(|(at, _)| at).find(|at| {
        match haystack[at + needle.len()..].chars().next() {
            None => true,
            Some(c) => c == '>' || c == '/' || c.is_ascii_whitespace(),
        }
    })
}

//! Source-to-output path mapping and glob helpers.
//!
//! Everything here is pure: no filesystem access.

use glob::{MatchOptions, Pattern, PatternError};
use std::path::{Component, Path, PathBuf};

/// Render a path with `/` separators regardless of platform.
pub fn to_posix(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        match component {
            Component::RootDir => out.push('/'),
            Component::Prefix(prefix) => out.push_str(&prefix.as_os_str().to_string_lossy()),
            other => {
                if !out.is_empty() && !out.ends_with('/') {
                    out.push('/');
                }
                out.push_str(&other.as_os_str().to_string_lossy());
            }
        }
    }
    out
}

/// Build a glob alternation from a list of values.
///
/// Duplicates are removed keeping first-seen order. A single distinct value is
/// returned bare; two or more become `{a,b,...}`.
pub fn to_glob_pattern<S: AsRef<str>>(values: &[S]) -> String {
    let mut unique: Vec<&str> = Vec::new();
    for value in values {
        let value = value.as_ref();
        if !unique.contains(&value) {
            unique.push(value);
        }
    }

    match unique.as_slice() {
        [single] => single.to_string(),
        many => format!("{{{}}}", many.join(",")),
    }
}

/// Glob matching every file with one of `extensions` anywhere under `root`.
pub fn entry_glob<S: AsRef<str>>(root: &Path, extensions: &[S]) -> String {
    format!("{}/**/*.{}", Pattern::escape(&to_posix(root)), to_glob_pattern(extensions))
}

/// Expand `{a,b}` alternations into the full list of plain glob patterns.
///
/// Nested groups are supported. An unbalanced brace is left as a literal.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let Some((open, close)) = find_brace_group(pattern) else {
        return vec![pattern.to_string()];
    };

    let prefix = &pattern[..open];
    let body = &pattern[open + 1..close];
    let suffix = &pattern[close + 1..];

    let mut expanded = Vec::new();
    for alternative in split_top_level(body) {
        expanded.extend(expand_braces(&format!("{}{}{}", prefix, alternative, suffix)));
    }
    expanded
}

fn find_brace_group(pattern: &str) -> Option<(usize, usize)> {
    let open = pattern.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in pattern[open..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((open, open + offset));
                }
            }
            _ => {}
        }
    }
    None
}

fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in body.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

/// A compiled glob pattern with brace alternation.
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    source: String,
    patterns: Vec<Pattern>,
}

impl GlobMatcher {
    const OPTIONS: MatchOptions = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    /// Compile `pattern`, expanding brace groups first.
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        let patterns =
            expand_braces(pattern).iter().map(|p| Pattern::new(p)).collect::<Result<_, _>>()?;
        Ok(Self { source: pattern.to_string(), patterns })
    }

    /// Compile several patterns into one matcher.
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PatternError> {
        let mut compiled = Vec::new();
        for pattern in patterns {
            for expanded in expand_braces(pattern.as_ref()) {
                compiled.push(Pattern::new(&expanded)?);
            }
        }
        let source = patterns.iter().map(|p| p.as_ref()).collect::<Vec<_>>().join(" | ");
        Ok(Self { source, patterns: compiled })
    }

    /// The pattern text this matcher was built from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, path: &Path) -> bool {
        let candidate = to_posix(path);
        self.patterns.iter().any(|p| p.matches_with(&candidate, Self::OPTIONS))
    }
}

/// True when `name` ends in a 1-4 character alphanumeric extension.
fn short_extension_start(name: &str) -> Option<usize> {
    let dot = name.rfind('.')?;
    let ext = &name[dot + 1..];
    let valid = (1..=4).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then_some(dot)
}

/// Map a source file to its artifact path under `output_root`.
///
/// A 1-4 character extension is replaced by `output_extension`; any other
/// basename is kept as-is. The directory structure below `source_root` is
/// preserved. Files outside `source_root` land directly in `output_root`.
pub fn to_output_path(
    source: &Path,
    source_root: &Path,
    output_root: &Path,
    output_extension: &str,
) -> PathBuf {
    let name = source.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let file_name = match short_extension_start(&name) {
        Some(dot) => format!("{}.{}", &name[..dot], output_extension),
        None => name,
    };

    let relative_dir = source
        .parent()
        .and_then(|parent| parent.strip_prefix(source_root).ok())
        .unwrap_or_else(|| Path::new(""));

    output_root.join(relative_dir).join(file_name)
}

/// Map a source directory to the matching directory under `output_root`.
pub fn to_output_dir(dir: &Path, source_root: &Path, output_root: &Path) -> Option<PathBuf> {
    dir.strip_prefix(source_root).ok().map(|relative| output_root.join(relative))
}

/// Logical entry key: path relative to `source_root`, extension stripped,
/// `/`-separated.
pub fn entry_key(source: &Path, source_root: &Path) -> Option<String> {
    let relative = source.strip_prefix(source_root).ok()?;
    if relative.as_os_str().is_empty() {
        return None;
    }
    Some(to_posix(&relative.with_extension("")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_glob_pattern_single_value() {
        assert_eq!(to_glob_pattern(&["ts"]), "ts");
        assert_eq!(to_glob_pattern(&["ts", "ts"]), "ts");
    }

    #[test]
    fn test_glob_pattern_alternation_dedupes() {
        assert_eq!(to_glob_pattern(&["scss", "sass", "scss", "css"]), "{scss,sass,css}");
    }

    #[test]
    fn test_entry_glob() {
        let exts = vec!["js".to_string(), "ts".to_string()];
        assert_eq!(entry_glob(Path::new("/p/src"), &exts), "/p/src/**/*.{js,ts}");
        assert_eq!(entry_glob(Path::new("/p/src"), &["njk"]), "/p/src/**/*.njk");
    }

    #[test]
    fn test_expand_braces() {
        assert_eq!(expand_braces("*.css"), vec!["*.css"]);
        assert_eq!(expand_braces("*.{js,ts}"), vec!["*.js", "*.ts"]);
        assert_eq!(
            expand_braces("{a,b/{c,d}}.x"),
            vec!["a.x", "b/c.x", "b/d.x"]
        );
        assert_eq!(expand_braces("broken{a,b"), vec!["broken{a,b"]);
    }

    #[test]
    fn test_glob_matcher() {
        let matcher = GlobMatcher::new("/p/src/**/*.{ts,mjs}").unwrap();
        assert!(matcher.matches(Path::new("/p/src/page.ts")));
        assert!(matcher.matches(Path::new("/p/src/a/b/utils.mjs")));
        assert!(!matcher.matches(Path::new("/p/src/page.css")));
        assert!(!matcher.matches(Path::new("/p/other/page.ts")));
    }

    #[test]
    fn test_glob_matcher_from_patterns() {
        let matcher = GlobMatcher::from_patterns(&["/p/src/**/*.njk", "/p/vars.yml"]).unwrap();
        assert!(matcher.matches(Path::new("/p/vars.yml")));
        assert!(matcher.matches(Path::new("/p/src/x/index.njk")));
        assert!(!matcher.matches(Path::new("/p/src/vars.yml")));
    }

    #[test]
    fn test_output_path_replaces_extension() {
        let out = to_output_path(
            Path::new("/p/src/pages/about.njk"),
            Path::new("/p/src"),
            Path::new("/p/public"),
            "html",
        );
        assert_eq!(out, PathBuf::from("/p/public/pages/about.html"));
    }

    #[test]
    fn test_output_path_keeps_long_or_missing_extension() {
        let root = Path::new("/p/src");
        let out = Path::new("/p/out");
        assert_eq!(to_output_path(Path::new("/p/src/LICENSE"), root, out, "js"), out.join("LICENSE"));
        assert_eq!(
            to_output_path(Path::new("/p/src/data.backup"), root, out, "js"),
            out.join("data.backup")
        );
        assert_eq!(to_output_path(Path::new("/p/src/a.min.ts"), root, out, "js"), out.join("a.min.js"));
    }

    #[test]
    fn test_output_dir() {
        assert_eq!(
            to_output_dir(Path::new("/p/src/a/b"), Path::new("/p/src"), Path::new("/p/out")),
            Some(PathBuf::from("/p/out/a/b"))
        );
        assert_eq!(to_output_dir(Path::new("/q/a"), Path::new("/p/src"), Path::new("/p/out")), None);
    }

    #[test]
    fn test_entry_key() {
        let root = Path::new("/p/src");
        assert_eq!(entry_key(Path::new("/p/src/page.ts"), root).as_deref(), Some("page"));
        assert_eq!(entry_key(Path::new("/p/src/a/b/c.min.ts"), root).as_deref(), Some("a/b/c.min"));
        assert_eq!(entry_key(Path::new("/q/page.ts"), root), None);
    }

    #[test]
    fn test_distinct_keys_map_to_distinct_outputs() {
        let root = Path::new("/p/src");
        let sources = ["a.ts", "a/index.ts", "b/a.ts", "a.b.ts", "index.ts", "x/y/z.ts"];
        let mut keys = HashSet::new();
        let mut outputs = HashSet::new();
        for source in sources {
            let path = root.join(source);
            keys.insert(entry_key(&path, root).unwrap());
            outputs.insert(to_output_path(&path, root, Path::new("/p/out"), "js"));
        }
        assert_eq!(keys.len(), sources.len());
        assert_eq!(outputs.len(), sources.len());
    }

    #[test]
    fn test_to_posix() {
        assert_eq!(to_posix(Path::new("a/b/c")), "a/b/c");
        assert_eq!(to_posix(Path::new("/a/b")), "/a/b");
        assert_eq!(to_posix(Path::new("")), "");
    }
}

//! Minimal `.editorconfig` resolution.
//!
//! Only the properties the formatter understands are interpreted:
//! `indent_style`, `indent_size`, `tab_width`, `end_of_line` and
//! `insert_final_newline`.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{FormatOptions, LineEnding};
use crate::build::path::{to_posix, GlobMatcher};

const FILE_NAME: &str = ".editorconfig";

#[derive(Debug, Clone, PartialEq)]
struct Section {
    pattern: String,
    properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct EditorConfigFile {
    root: bool,
    sections: Vec<Section>,
}

fn parse(contents: &str) -> EditorConfigFile {
    let mut file = EditorConfigFile::default();
    let mut current: Option<Section> = None;

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            if let Some(section) = current.take() {
                file.sections.push(section);
            }
            current = Some(Section {
                pattern: line[1..line.len() - 1].to_string(),
                properties: BTreeMap::new(),
            });
            continue;
        }

        let Some((key, value)) = line.split_once(['=', ':']) else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim().to_string();

        match current.as_mut() {
            Some(section) => {
                section.properties.insert(key, value);
            }
            None if key == "root" => file.root = value.eq_ignore_ascii_case("true"),
            None => {}
        }
    }

    if let Some(section) = current {
        file.sections.push(section);
    }
    file
}

fn section_matches(pattern: &str, dir: &Path, file: &Path) -> bool {
    let Ok(relative) = file.strip_prefix(dir) else {
        return false;
    };
    let glob = match pattern.strip_prefix('/') {
        Some(anchored) => anchored.to_string(),
        None if pattern.contains('/') => pattern.to_string(),
        None => format!("**/{}", pattern),
    };
    match GlobMatcher::new(&glob) {
        Ok(matcher) => matcher.matches(Path::new(&to_posix(relative))),
        Err(_) => false,
    }
}

/// Effective editorconfig properties for one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(BTreeMap<String, String>);

impl Properties {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Overlay these properties on `options`.
    pub fn apply_to(&self, mut options: FormatOptions) -> FormatOptions {
        match self.get("indent_style").map(str::to_ascii_lowercase).as_deref() {
            Some("tab") => options.indent_with_tabs = true,
            Some("space") => options.indent_with_tabs = false,
            _ => {}
        }

        let size = match self.get("indent_size") {
            Some(v) if v.eq_ignore_ascii_case("tab") => self.get("tab_width"),
            other => other,
        };
        if let Some(size) = size.and_then(|v| v.parse::<usize>().ok()) {
            options.indent_size = size;
        }

        if let Some(eol) = self.get("end_of_line").and_then(LineEnding::from_name) {
            options.eol = eol;
        }
        match self.get("insert_final_newline").map(str::to_ascii_lowercase).as_deref() {
            Some("true") => options.end_with_newline = true,
            Some("false") => options.end_with_newline = false,
            _ => {}
        }
        options
    }
}

/// Resolve the properties that apply to `file`.
///
/// `.editorconfig` files are collected from the file's directory upward until
/// one declares `root = true`; closer files and later sections win.
pub fn lookup(file: &Path) -> io::Result<Properties> {
    let mut chain: Vec<(PathBuf, EditorConfigFile)> = Vec::new();
    let mut dir = file.parent().map(Path::to_path_buf);

    while let Some(current) = dir {
        let candidate = current.join(FILE_NAME);
        if candidate.is_file() {
            let parsed = parse(&fs::read_to_string(&candidate)?);
            let root = parsed.root;
            chain.push((current.clone(), parsed));
            if root {
                break;
            }
        }
        dir = current.parent().map(Path::to_path_buf);
    }

    let mut properties = BTreeMap::new();
    for (dir, config) in chain.iter().rev() {
        for section in &config.sections {
            if section_matches(&section.pattern, dir, file) {
                properties.extend(section.properties.clone());
            }
        }
    }
    Ok(Properties(properties))
}

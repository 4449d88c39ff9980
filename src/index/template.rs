//! URL template compilation.
//!
//! # Responsibilities
//! - Scan `{...}` placeholders left to right (repeated braces allowed)
//! - Build the routing regex (`.*` per placeholder) and the matching score
//! - Build the named-capture regex used for path parameters
//!
//! # Design Decisions
//! - Literal text is regex-escaped so `.` in a template only matches `.`
//! - A trailing `/` on the base path is dropped before joining

use regex::Regex;
use std::collections::HashMap;

/// A piece of a URL template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

/// Split a template into literal text and placeholder names.
pub fn scan(template: &str) -> Vec<Segment<'_>> {
    let bytes = template.as_bytes();
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'{' {
            i += 1;
            continue;
        }
        let open = i;
        let mut name_start = i;
        while name_start < bytes.len() && bytes[name_start] == b'{' {
            name_start += 1;
        }
        let Some(offset) = template[name_start..].find(|c: char| c == '{' || c == '}') else {
            break;
        };
        let name_end = name_start + offset;
        if bytes[name_end] == b'{' {
            // Unterminated brace, restart the scan at the inner one.
            i = name_end;
            continue;
        }
        let mut close = name_end;
        while close < bytes.len() && bytes[close] == b'}' {
            close += 1;
        }

        if open > literal_start {
            segments.push(Segment::Literal(&template[literal_start..open]));
        }
        segments.push(Segment::Placeholder(&template[name_start..name_end]));
        literal_start = close;
        i = close;
    }

    if literal_start < template.len() {
        segments.push(Segment::Literal(&template[literal_start..]));
    }
    segments
}

fn has_placeholder(text: &str) -> bool {
    scan(text).iter().any(|s| matches!(s, Segment::Placeholder(_)))
}

fn base_prefix(base_path: &str) -> &str {
    base_path.trim_end_matches('/')
}

/// Routing regex: `^` + basePath + template with every placeholder as `.*` + `$`.
pub fn compile_path_regex(base_path: &str, template: &str) -> String {
    let mut pattern = String::from("^");
    pattern.push_str(&regex::escape(base_prefix(base_path)));
    for segment in scan(template) {
        match segment {
            Segment::Literal(text) => pattern.push_str(&regex::escape(text)),
            Segment::Placeholder(_) => pattern.push_str(".*"),
        }
    }
    pattern.push('$');
    pattern
}

/// Sum of the 1-based positions of `/`-separated segments holding a placeholder.
///
/// Lower is more specific; literal-only templates score 0.
pub fn matching_score(template: &str) -> u32 {
    template
        .split('/')
        .enumerate()
        .filter(|(_, segment)| has_placeholder(segment))
        .map(|(index, _)| index as u32)
        .sum()
}

/// Named-capture form of a template for extracting path parameters.
#[derive(Debug)]
pub struct ParamPattern {
    regex: Regex,
    groups: HashMap<String, usize>,
}

impl ParamPattern {
    /// Placeholders capture one segment (`[^/]+`); a trailing `{+name}` captures the rest (`.+`).
    pub fn compile(base_path: &str, template: &str) -> Result<Self, regex::Error> {
        let segments = scan(template);
        let mut pattern = String::from("^");
        pattern.push_str(&regex::escape(base_prefix(base_path)));
        let mut groups = HashMap::new();
        let mut group = 0;

        for (position, segment) in segments.iter().enumerate() {
            match segment {
                Segment::Literal(text) => pattern.push_str(&regex::escape(text)),
                Segment::Placeholder(name) => {
                    let trailing = position + 1 == segments.len();
                    if trailing && name.starts_with('+') {
                        pattern.push_str("(.+)");
                    } else {
                        pattern.push_str("([^/]+)");
                    }
                    group += 1;
                    groups.entry(name.to_string()).or_insert(group);
                }
            }
        }
        pattern.push('$');

        Ok(Self {
            regex: Regex::new(&pattern)?,
            groups,
        })
    }

    /// Captured value for placeholder `name` in `path`.
    pub fn capture(&self, path: &str, name: &str) -> Option<String> {
        let index = *self.groups.get(name)?;
        self.regex
            .captures(path)?
            .get(index)
            .map(|m| m.as_str().to_string())
    }

    /// All captures of `path`, keyed by placeholder name.
    pub fn captures(&self, path: &str) -> HashMap<String, String> {
        let Some(caps) = self.regex.captures(path) else {
            return HashMap::new();
        };
        self.groups
            .iter()
            .filter_map(|(name, index)| caps.get(*index).map(|m| (name.clone(), m.as_str().to_string())))
            .collect()
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

//! Selector engines for structured files.
//!
//! Each engine parses its selector grammar up front and walks a document model
//! that remembers the byte span of every value, so rewrites can splice new text
//! into the original source and leave everything else untouched.

use std::ops::Range;
use thiserror::Error;

pub mod json_path;
pub mod toml_path;
pub mod yaml_path;

pub use json_path::JsonPath;
pub use toml_path::{TomlDocument, TomlPath};
pub use yaml_path::{YamlDocument, YamlPath};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("invalid selector '{0}'")]
    InvalidSelector(String),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

/// Replaces each span in `content` with its text. Overlapping spans keep the first one.
pub(crate) fn splice(content: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by_key(|(span, _)| span.start);

    let mut out = String::with_capacity(content.len());
    let mut cursor = 0;
    for (span, text) in edits {
        if span.start < cursor {
            continue;
        }
        out.push_str(&content[cursor..span.start]);
        out.push_str(&text);
        cursor = span.end;
    }
    out.push_str(&content[cursor..]);
    out
}

/// Splits `selector` on dots that are not inside double quotes.
pub(crate) fn split_dotted(selector: &str) -> Option<Vec<&str>> {
    let mut segments = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in selector.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '.' if !in_quotes => {
                segments.push(&selector[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if in_quotes {
        return None;
    }
    segments.push(&selector[start..]);
    Some(segments)
}

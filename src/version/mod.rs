use crate::errors::{BumpError, Result};
use indexmap::IndexMap;
use std::fmt;

pub mod config;
pub mod part;
pub mod template;

pub use config::VersionConfig;
pub use part::{NumericFunction, PartConfig, VersionPart};
pub use template::{Context, ContextValue, Template};

/// Named version parts plus the raw string they were parsed from.
#[derive(Debug, Clone)]
pub struct Version {
    parts: IndexMap<String, VersionPart>,
    original: Option<String>,
}

impl Version {
    pub fn new(parts: IndexMap<String, VersionPart>, original: Option<String>) -> Self {
        Self { parts, original }
    }

    pub fn get(&self, name: &str) -> Option<&VersionPart> {
        self.parts.get(name)
    }

    pub fn original(&self) -> Option<&str> {
        self.original.as_deref()
    }

    pub fn parts(&self) -> impl Iterator<Item = (&str, &VersionPart)> {
        self.parts.iter().map(|(name, part)| (name.as_str(), part))
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Returns a new version where `part_name` is bumped and every part after it
    /// in `order` is reset to its first value. Parts missing from `order` are dropped.
    pub fn bump<S: AsRef<str>>(&self, part_name: &str, order: &[S]) -> Result<Version> {
        let in_order = order.iter().any(|label| label.as_ref() == part_name);
        if !in_order || !self.parts.contains_key(part_name) {
            return Err(BumpError::UnknownPart {
                part: part_name.to_string(),
            });
        }

        let mut bumped = false;
        let mut parts = IndexMap::new();
        for label in order.iter().map(AsRef::as_ref) {
            let Some(part) = self.parts.get(label) else {
                continue;
            };
            let next = if label == part_name {
                bumped = true;
                part.bump()?
            } else if bumped {
                part.null()
            } else {
                part.clone()
            };
            parts.insert(label.to_string(), next);
        }

        Ok(Version::new(parts, None))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.parts.keys().collect();
        names.sort();
        let rendered: Vec<String> = names
            .into_iter()
            .map(|name| format!("{}={}", name, self.parts[name]))
            .collect();
        f.write_str(&rendered.join(", "))
    }
}

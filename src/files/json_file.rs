use super::{FileType, Selected, VersionFile, base, verify_selection};
use crate::errors::{BumpError, Result};
use crate::events::{Event, LogObserver, Observer};
use crate::paths::JsonPath;
use crate::version::{Context, Version, VersionConfig};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// A JSON document where the version sits at a JSONPath selector.
///
/// Rewriting re-serializes the whole document with two-space indentation and
/// the original key order.
pub struct JsonFile {
    path: PathBuf,
    selector: String,
    version_config: VersionConfig,
    observer: Rc<dyn Observer>,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>, selector: &str, version_config: VersionConfig) -> Self {
        Self {
            path: path.into(),
            selector: selector.to_string(),
            version_config,
            observer: Rc::new(LogObserver),
        }
    }

    pub fn with_observer(mut self, observer: Rc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    fn path_not_found(&self) -> BumpError {
        BumpError::PathNotFound {
            selector: self.selector.clone(),
            file_type: FileType::Json,
            file: self.path.clone(),
        }
    }

    fn load(&self, content: &str) -> Result<Value> {
        serde_json::from_str(content).map_err(|_| BumpError::InvalidFile {
            file_type: FileType::Json,
            file: self.path.clone(),
        })
    }

    /// Checks that every value reached by the selector equals `search`.
    pub fn contains(&self, search: &str) -> Result<()> {
        let path = JsonPath::parse(&self.selector).map_err(|_| self.path_not_found())?;
        let document = self.load(&base::read_text(&self.path)?)?;

        let found: Vec<Selected> = path
            .find(&document)
            .into_iter()
            .map(|(_, value)| to_selected(value))
            .collect();
        verify_selection(&self.selector, FileType::Json, &self.path, &found, search)?;

        self.observer.notify(&Event::Selected {
            file: self.path.clone(),
            file_type: FileType::Json,
            selector: self.selector.clone(),
            values: found.iter().map(|value| value.shown().to_string()).collect(),
        });
        Ok(())
    }
}

fn to_selected(value: &Value) -> Selected {
    match value {
        Value::String(text) => Selected::Text(text.clone()),
        Value::Null => Selected::Other("None".to_string()),
        Value::Bool(true) => Selected::Other("True".to_string()),
        Value::Bool(false) => Selected::Other("False".to_string()),
        other => Selected::Other(other.to_string()),
    }
}

impl VersionFile for JsonFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn file_type(&self) -> FileType {
        FileType::Json
    }

    fn observer(&self) -> &dyn Observer {
        self.observer.as_ref()
    }

    fn should_contain_version(&self, version: &Version, _context: &Context) -> Result<()> {
        self.contains(&self.version_config.serialize(version)?)
    }

    fn replace(
        &self,
        _current: &Version,
        new: &Version,
        _context: &Context,
        dry_run: bool,
    ) -> Result<()> {
        let path = JsonPath::parse(&self.selector).map_err(|_| self.path_not_found())?;
        let new_version = self.version_config.serialize(new)?;

        let before = base::read_text(&self.path)?;
        let mut document = self.load(&before)?;

        let pointers: Vec<String> = path
            .find(&document)
            .into_iter()
            .map(|(pointer, _)| pointer)
            .collect();
        for pointer in pointers {
            if let Some(slot) = document.pointer_mut(&pointer) {
                *slot = Value::String(new_version.clone());
            }
        }

        let mut after = serde_json::to_string_pretty(&document).map_err(|_| BumpError::InvalidFile {
            file_type: FileType::Json,
            file: self.path.clone(),
        })?;
        after.push('\n');

        self.update_file(&before, &after, dry_run)
    }
}

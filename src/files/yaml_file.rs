use super::{FileType, Selected, VersionFile, base, verify_selection};
use crate::errors::{BumpError, Result};
use crate::events::{Event, LogObserver, Observer};
use crate::paths::yaml_path::{YamlNode, YamlValue};
use crate::paths::{YamlDocument, YamlPath};
use crate::version::{Context, Version, VersionConfig};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// A YAML document where the version sits at a dotted path.
/// Rewrites only touch the selected scalars.
pub struct YamlFile {
    path: PathBuf,
    selector: String,
    version_config: VersionConfig,
    observer: Rc<dyn Observer>,
}

impl YamlFile {
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

    fn parse_selector(&self) -> Result<YamlPath> {
        YamlPath::parse(&self.selector).map_err(|_| BumpError::PathNotFound {
            selector: self.selector.clone(),
            file_type: FileType::Yaml,
            file: self.path.clone(),
        })
    }

    fn load(&self, content: &str) -> Result<YamlDocument> {
        YamlDocument::parse(content).map_err(|_| BumpError::InvalidFile {
            file_type: FileType::Yaml,
            file: self.path.clone(),
        })
    }

    pub fn contains(&self, search: &str) -> Result<()> {
        let path = self.parse_selector()?;
        let document = self.load(&base::read_text(&self.path)?)?;

        let found: Vec<Selected> = path
            .find(document.root())
            .into_iter()
            .map(to_selected)
            .collect();
        verify_selection(&self.selector, FileType::Yaml, &self.path, &found, search)?;

        self.observer.notify(&Event::Selected {
            file: self.path.clone(),
            file_type: FileType::Yaml,
            selector: self.selector.clone(),
            values: found.iter().map(|value| value.shown().to_string()).collect(),
        });
        Ok(())
    }
}

fn to_selected(node: &YamlNode) -> Selected {
    match &node.value {
        YamlValue::Scalar {
            value,
            is_string: true,
            ..
        } => Selected::Text(value.clone()),
        YamlValue::Scalar { value, .. } => Selected::Other(value.clone()),
        YamlValue::Null => Selected::Other("None".to_string()),
        YamlValue::Sequence(_) => Selected::Other("[...]".to_string()),
        YamlValue::Mapping(_) => Selected::Other("{...}".to_string()),
    }
}

impl VersionFile for YamlFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn file_type(&self) -> FileType {
        FileType::Yaml
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
        let path = self.parse_selector()?;
        let new_version = self.version_config.serialize(new)?;

        let before = base::read_text(&self.path)?;
        let document = self.load(&before)?;
        let after = document.replace_values(&path.find(document.root()), &new_version);

        self.update_file(&before, &after, dry_run)
    }
}

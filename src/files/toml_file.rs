use super::{FileType, Selected, VersionFile, base, verify_selection};
use crate::errors::{BumpError, Result};
use crate::events::{Event, LogObserver, Observer};
use crate::paths::toml_path::{TomlNode, TomlValue};
use crate::paths::{TomlDocument, TomlPath};
use crate::version::{Context, Version, VersionConfig};
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub struct TomlFile {
    path: PathBuf,
    selector: String,
    version_config: VersionConfig,
    observer: Rc<dyn Observer>,
}

impl TomlFile {
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

    fn parse_selector(&self) -> Result<TomlPath> {
        TomlPath::parse(&self.selector).map_err(|_| BumpError::PathNotFound {
            selector: self.selector.clone(),
            file_type: FileType::Toml,
            file: self.path.clone(),
        })
    }

    fn load(&self, content: &str) -> Result<TomlDocument> {
        TomlDocument::parse(content).map_err(|_| BumpError::InvalidFile {
            file_type: FileType::Toml,
            file: self.path.clone(),
        })
    }

    pub fn contains(&self, search: &str) -> Result<()> {
        let path = self.parse_selector()?;
        let content = base::read_text(&self.path)?;
        let document = self.load(&content)?;

        let found: Vec<Selected> = path
            .find(document.root())
            .into_iter()
            .map(|node| to_selected(node, &content))
            .collect();
        verify_selection(&self.selector, FileType::Toml, &self.path, &found, search)?;

        self.observer.notify(&Event::Selected {
            file: self.path.clone(),
            file_type: FileType::Toml,
            selector: self.selector.clone(),
            values: found.iter().map(|value| value.shown().to_string()).collect(),
        });
        Ok(())
    }
}

fn to_selected(node: &TomlNode, content: &str) -> Selected {
    match (&node.value, &node.span) {
        (TomlValue::String { value, .. }, _) => Selected::Text(value.clone()),
        (TomlValue::Other(text), _) => Selected::Other(text.clone()),
        (_, Some(span)) => Selected::Other(content[span.clone()].to_string()),
        (TomlValue::Array(_), None) => Selected::Other("[...]".to_string()),
        (TomlValue::Table(_), None) => Selected::Other("{...}".to_string()),
    }
}

impl VersionFile for TomlFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn file_type(&self) -> FileType {
        FileType::Toml
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const RELEASES: &str = r#"# releases
[[release]]
name = "alpha"
version = "1.0.0"

[[release]]
name = "beta" # second
version = "1.0.0"

[[release]]
name = "gamma"
version = "1.0.0"
"#;

    fn setup(content: &str, selector: &str) -> (TempDir, TomlFile, VersionConfig) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pyproject.toml");
        fs::write(&path, content).unwrap();
        let config = VersionConfig::new(None, None).unwrap();
        let file = TomlFile::new(&path, selector, config.clone());
        (temp_dir, file, config)
    }

    #[test]
    fn test_array_of_tables_fan_out() {
        let (_temp_dir, file, config) = setup(RELEASES, "release.version");
        let current = config.parse("1.0.0").unwrap();
        let new = config.parse("1.1.0").unwrap();

        file.should_contain_version(&current, &Context::new()).unwrap();
        file.replace(&current, &new, &Context::new(), false).unwrap();

        assert_eq!(
            fs::read_to_string(file.path()).unwrap(),
            RELEASES.replace("1.0.0", "1.1.0")
        );
    }

    #[test]
    fn test_partial_mismatch_in_array_of_tables() {
        let content = RELEASES.replacen("\"1.0.0\"", "\"0.9.0\"", 1);
        let (_temp_dir, file, _config) = setup(&content, "release.version");

        let err = file.contains("1.0.0").unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "Selector 'release.version' finds list of values ['0.9.0', '1.0.0', '1.0.0'] with one or more \
                 elements mismatch with the expectation '1.0.0' in toml file {}",
                file.path().display()
            )
        );
    }

    #[test]
    fn test_integer_value_never_matches() {
        let (_temp_dir, file, _config) = setup("[tool]\nversion = 1\n", "tool.version");
        let err = file.contains("1").unwrap_err();
        assert!(matches!(err, BumpError::SingleValueMismatch { ref actual, .. } if actual == "1"));
    }

    #[test]
    fn test_invalid_selector_is_path_not_found() {
        let (_temp_dir, file, _config) = setup(RELEASES, "release.'version'");
        let err = file.contains("1.0.0").unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "Selector 'release.'version'' does not lead to a valid property in toml file {}",
                file.path().display()
            )
        );
    }

    #[test]
    fn test_invalid_toml() {
        let (_temp_dir, file, _config) = setup("[tool\nversion = \"1.0.0\"\n", "tool.version");
        assert!(matches!(
            file.contains("1.0.0").unwrap_err(),
            BumpError::InvalidFile {
                file_type: FileType::Toml,
                ..
            }
        ));
    }
}

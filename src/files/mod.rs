use crate::errors::{BumpError, Result};
use crate::events::Observer;
use crate::version::{Context, Version, VersionConfig};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub mod base;
pub mod json_file;
pub mod text_file;
pub mod toml_file;
pub mod yaml_file;

pub use json_file::JsonFile;
pub use text_file::PlainTextFile;
pub use toml_file::TomlFile;
pub use yaml_file::YamlFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    PlainText,
    Json,
    Yaml,
    Toml,
}

impl FileType {
    pub fn from_extension(path: &Path) -> Option<FileType> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "json" => Some(FileType::Json),
            "yaml" | "yml" => Some(FileType::Yaml),
            "toml" => Some(FileType::Toml),
            _ => None,
        }
    }

    /// Name of the config key holding the selector for this file type.
    pub fn selector_key(&self) -> Option<&'static str> {
        match self {
            FileType::PlainText => None,
            FileType::Json => Some("jsonpath"),
            FileType::Yaml => Some("yamlpath"),
            FileType::Toml => Some("tomlpath"),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileType::PlainText => "plaintext",
            FileType::Json => "json",
            FileType::Yaml => "yaml",
            FileType::Toml => "toml",
        })
    }
}

/// A value reached by a selector. Only string values can equal a version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selected {
    Text(String),
    Other(String),
}

impl Selected {
    pub fn is(&self, expected: &str) -> bool {
        matches!(self, Selected::Text(text) if text == expected)
    }

    pub fn shown(&self) -> &str {
        match self {
            Selected::Text(text) | Selected::Other(text) => text,
        }
    }

    /// Renders values the way they appear in mismatch messages: `['1.0', 2]`.
    pub fn render_list(values: &[Selected]) -> String {
        let rendered: Vec<String> = values
            .iter()
            .map(|value| match value {
                Selected::Text(text) => format!("'{text}'"),
                Selected::Other(other) => other.clone(),
            })
            .collect();
        format!("[{}]", rendered.join(", "))
    }
}

/// Checks that a selector reached at least one value and that every value equals `expected`.
pub(crate) fn verify_selection(
    selector: &str,
    file_type: FileType,
    file: &Path,
    found: &[Selected],
    expected: &str,
) -> Result<()> {
    match found {
        [] => Err(BumpError::PathNotFound {
            selector: selector.to_string(),
            file_type,
            file: file.to_path_buf(),
        }),
        [single] if !single.is(expected) => Err(BumpError::SingleValueMismatch {
            selector: selector.to_string(),
            actual: single.shown().to_string(),
            expected: expected.to_string(),
            file_type,
            file: file.to_path_buf(),
        }),
        many if many.iter().any(|value| !value.is(expected)) => {
            Err(BumpError::MultiValuesMismatch {
                selector: selector.to_string(),
                actual: many.to_vec(),
                expected: expected.to_string(),
                file_type,
                file: file.to_path_buf(),
            })
        }
        _ => Ok(()),
    }
}

pub trait VersionFile {
    fn path(&self) -> &Path;
    fn file_type(&self) -> FileType;
    fn observer(&self) -> &dyn Observer;

    /// Fails unless the file holds `version` where this handler expects it.
    fn should_contain_version(&self, version: &Version, context: &Context) -> Result<()>;

    fn replace(
        &self,
        current: &Version,
        new: &Version,
        context: &Context,
        dry_run: bool,
    ) -> Result<()>;

    fn update_file(&self, before: &str, after: &str, dry_run: bool) -> Result<()> {
        base::update_file(
            self.path(),
            self.file_type(),
            self.observer(),
            before,
            after,
            dry_run,
        )
    }
}

/// One file managed by a bump, dispatched on its configured type.
pub enum ConfiguredFile {
    PlainText(PlainTextFile),
    Json(JsonFile),
    Yaml(YamlFile),
    Toml(TomlFile),
}

impl ConfiguredFile {
    pub fn new(
        path: impl Into<PathBuf>,
        file_type: FileType,
        selector: Option<&str>,
        version_config: VersionConfig,
        observer: Rc<dyn Observer>,
    ) -> Self {
        let path = path.into();
        let selector = selector.unwrap_or("version");
        match file_type {
            FileType::PlainText => ConfiguredFile::PlainText(
                PlainTextFile::new(path, version_config).with_observer(observer),
            ),
            FileType::Json => ConfiguredFile::Json(
                JsonFile::new(path, selector, version_config).with_observer(observer),
            ),
            FileType::Yaml => ConfiguredFile::Yaml(
                YamlFile::new(path, selector, version_config).with_observer(observer),
            ),
            FileType::Toml => ConfiguredFile::Toml(
                TomlFile::new(path, selector, version_config).with_observer(observer),
            ),
        }
    }

    fn inner(&self) -> &dyn VersionFile {
        match self {
            ConfiguredFile::PlainText(file) => file,
            ConfiguredFile::Json(file) => file,
            ConfiguredFile::Yaml(file) => file,
            ConfiguredFile::Toml(file) => file,
        }
    }
}

impl VersionFile for ConfiguredFile {
    fn path(&self) -> &Path {
        self.inner().path()
    }

    fn file_type(&self) -> FileType {
        self.inner().file_type()
    }

    fn observer(&self) -> &dyn Observer {
        self.inner().observer()
    }

    fn should_contain_version(&self, version: &Version, context: &Context) -> Result<()> {
        self.inner().should_contain_version(version, context)
    }

    fn replace(
        &self,
        current: &Version,
        new: &Version,
        context: &Context,
        dry_run: bool,
    ) -> Result<()> {
        self.inner().replace(current, new, context, dry_run)
    }
}

impl fmt::Display for ConfiguredFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().display())
    }
}

/// Copies `context` and adds the serialized version under `key`.
pub(crate) fn context_with(context: &Context, key: &str, value: String) -> Context {
    let mut context = context.clone();
    context.insert(key.to_string(), value.into());
    context
}

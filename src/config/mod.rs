use crate::errors::{BumpError, Result};
use crate::events::Observer;
use crate::files::base::{Newline, detect_newlines, normalize_newlines};
use crate::files::{ConfiguredFile, FileType};
use crate::version::VersionConfig;
use log::{info, warn};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub mod ini;

pub use ini::{IniDocument, IniError};

pub const DEFAULT_CONFIG_FILE: &str = ".bumpsemver.cfg";
pub const MAIN_SECTION: &str = "bumpsemver";
pub const DISCOVERY_SECTION: &str = "bumpsemver:discovery";

fn section_regex() -> Result<Regex> {
    Ok(Regex::new(
        r"^bumpsemver:((?P<file_type>.+?)(\s*\(\s*(?P<file_suffix>[^):]+)\)?)?):(?P<value>.+)",
    )?)
}

/// Values of the `[bumpsemver]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalOptions {
    pub current_version: Option<String>,
    pub new_version: Option<String>,
    pub search: Option<String>,
    pub replace: Option<String>,
    pub commit: Option<bool>,
    pub tag: Option<bool>,
    pub sign_tags: Option<bool>,
    pub allow_dirty: Option<bool>,
    pub dry_run: Option<bool>,
    pub tag_name: Option<String>,
    pub tag_message: Option<String>,
    pub message: Option<String>,
    pub files: Vec<String>,
}

/// A `[bumpsemver:<type>:<file>]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSection {
    pub file_type: FileType,
    pub file: String,
    pub selector: Option<String>,
    pub search: Option<String>,
    pub replace: Option<String>,
}

impl FileSection {
    /// Creates the handler for this section, resolving `file` against `root`.
    pub fn build(&self, root: &Path, observer: Rc<dyn Observer>) -> Result<ConfiguredFile> {
        let version_config = VersionConfig::new(self.search.as_deref(), self.replace.as_deref())?;
        Ok(ConfiguredFile::new(
            resolve(root, &self.file),
            self.file_type,
            self.selector.as_deref(),
            version_config,
            observer,
        ))
    }
}

/// Joins `file` to `root` unless `root` is the current directory.
pub fn resolve(root: &Path, file: &str) -> PathBuf {
    if root.as_os_str().is_empty() || root == Path::new(".") || root == Path::new("./") {
        PathBuf::from(file)
    } else {
        root.join(file)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub path: PathBuf,
    pub options: GlobalOptions,
    pub files: Vec<FileSection>,
    pub discovery_ignore: Vec<String>,
    document: Option<IniDocument>,
    newline: Option<Newline>,
}

impl Config {
    /// Reads the config file. A missing file is an error only when it was given explicitly.
    pub fn load(path: &Path, explicit: bool) -> Result<Self> {
        if !path.exists() {
            if explicit {
                return Err(BumpError::ConfigFileNotFound(path.to_path_buf()));
            }
            info!("Could not read config file at {}", path.display());
            return Ok(Self::empty(path));
        }

        info!("Reading config file {}:", path.display());
        let raw = fs::read_to_string(path)?;
        info!("{}", raw);
        let mut config = Self::parse(&normalize_newlines(&raw), path)?;
        config.newline = detect_newlines(&raw).first().copied();
        Ok(config)
    }

    pub fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            options: GlobalOptions::default(),
            files: Vec::new(),
            discovery_ignore: Vec::new(),
            document: None,
            newline: None,
        }
    }

    pub fn exists(&self) -> bool {
        self.document.is_some()
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let document = IniDocument::parse(content)
            .map_err(|err| BumpError::InvalidConfigSection(err.to_string()))?;

        let options = Self::global_options(&document)?;
        let mut files = Vec::new();
        let mut discovery_ignore = Vec::new();
        let regex = section_regex()?;

        for section in document.sections() {
            if section.name == DISCOVERY_SECTION {
                check_keys(section, &["ignore"])?;
                discovery_ignore = section
                    .get("ignore")
                    .unwrap_or_default()
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect();
                continue;
            }

            let Some(captures) = regex.captures(&section.name) else {
                continue;
            };
            let declared = captures.name("file_type").map_or("", |m| m.as_str());
            let file = captures.name("value").map_or("", |m| m.as_str()).to_string();
            files.push(Self::file_section(section, declared, file, &options)?);
        }

        Ok(Self {
            path: path.to_path_buf(),
            options,
            files,
            discovery_ignore,
            document: Some(document),
            newline: None,
        })
    }

    fn global_options(document: &IniDocument) -> Result<GlobalOptions> {
        let get = |key: &str| document.get(MAIN_SECTION, key).map(str::to_string);
        let get_bool = |key: &str| {
            document
                .get(MAIN_SECTION, key)
                .map(|value| parse_bool(key, value))
                .transpose()
        };

        let files: Vec<String> = match document.get(MAIN_SECTION, "files") {
            Some(files) => {
                warn!("'files =' configuration will be deprecated, please use [bumpsemver:file:...]");
                files.split_whitespace().map(str::to_string).collect()
            }
            None => Vec::new(),
        };

        Ok(GlobalOptions {
            current_version: get("current_version"),
            new_version: get("new_version"),
            search: get("search"),
            replace: get("replace"),
            commit: get_bool("commit")?,
            tag: get_bool("tag")?,
            sign_tags: get_bool("sign_tags")?,
            allow_dirty: get_bool("allow_dirty")?,
            dry_run: get_bool("dry_run")?,
            tag_name: get("tag_name"),
            tag_message: get("tag_message"),
            message: get("message"),
            files,
        })
    }

    fn file_section(
        section: &ini::Section,
        declared: &str,
        file: String,
        options: &GlobalOptions,
    ) -> Result<FileSection> {
        let (name, overridden) = match declared.strip_suffix('!') {
            Some(name) => {
                warn!("Section [{}] bypasses file type detection", section.name);
                (name, true)
            }
            None => (declared, false),
        };

        let file_type = match name {
            "plaintext" | "file" => FileType::PlainText,
            "json" => FileType::Json,
            "yaml" => FileType::Yaml,
            "toml" => FileType::Toml,
            unknown => {
                return Err(BumpError::InvalidConfigSection(format!(
                    "Unknown file type '{}' in section '{}'",
                    unknown, section.name
                )));
            }
        };

        match file_type.selector_key() {
            Some(key) => check_keys(section, &[key])?,
            None => check_keys(section, &["search", "replace"])?,
        }

        if file_type == FileType::PlainText
            && !overridden
            && let Some(expected) = FileType::from_extension(Path::new(&file))
        {
            return Err(BumpError::FileTypeMismatch {
                declared: name.to_string(),
                expected,
                file,
            });
        }
        if name == "file" {
            warn!("File type 'file' is deprecated, please use 'plaintext' instead.");
        }

        let (selector, search, replace) = match file_type.selector_key() {
            Some(key) => (
                Some(section.get(key).unwrap_or("version").to_string()),
                None,
                None,
            ),
            None => (
                None,
                section.get("search").map(str::to_string).or_else(|| options.search.clone()),
                section.get("replace").map(str::to_string).or_else(|| options.replace.clone()),
            ),
        };

        Ok(FileSection {
            file_type,
            file,
            selector,
            search,
            replace,
        })
    }

    /// Points `current_version` at `new_version` and drops any `new_version` option.
    pub fn write_current_version(&mut self, new_version: &str, dry_run: bool) -> Result<()> {
        let Some(document) = self.document.as_mut() else {
            return Ok(());
        };
        let invalid = |err: IniError| BumpError::InvalidConfigSection(err.to_string());
        document
            .set(MAIN_SECTION, "current_version", new_version)
            .map_err(invalid)?;
        document
            .remove(MAIN_SECTION, "new_version")
            .map_err(invalid)?;

        let content = document.to_string();
        let verb = if dry_run { "Would write" } else { "Writing" };
        info!("{} to config file {}:", verb, self.path.display());
        info!("{}", content);

        if dry_run {
            return Ok(());
        }
        let content = match self.newline {
            Some(newline) if newline != Newline::Lf => content.replace('\n', newline.as_str()),
            _ => content,
        };
        fs::write(&self.path, content)?;
        Ok(())
    }
}

fn check_keys(section: &ini::Section, allowed: &[&str]) -> Result<()> {
    let unknown: Vec<String> = section
        .keys()
        .filter(|key| !allowed.contains(key))
        .map(|key| format!("'{key}'"))
        .collect();
    if unknown.is_empty() {
        return Ok(());
    }
    Err(BumpError::InvalidConfigSection(format!(
        "Unknown keys [{}] in section '{}'",
        unknown.join(", "),
        section.name
    )))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        _ => Err(BumpError::InvalidConfigSection(format!(
            "Not a boolean: '{value}' for option '{key}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn parse(content: &str) -> Result<Config> {
        Config::parse(content, Path::new(DEFAULT_CONFIG_FILE))
    }

    #[test]
    fn test_global_options() {
        let config = parse(
            "[bumpsemver]\ncurrent_version = 1.2.3\ncommit = True\ntag = no\nmessage = bump {new_version}\n",
        )
        .unwrap();
        assert_eq!(config.options.current_version.as_deref(), Some("1.2.3"));
        assert_eq!(config.options.commit, Some(true));
        assert_eq!(config.options.tag, Some(false));
        assert_eq!(config.options.sign_tags, None);
        assert_eq!(config.options.message.as_deref(), Some("bump {new_version}"));
        assert!(config.exists());
    }

    #[test]
    fn test_file_sections() {
        let config = parse(
            r#"[bumpsemver]
current_version = 1.2.3
search = version={current_version}

[bumpsemver:plaintext:VERSION]

[bumpsemver:json:package.json]
jsonpath = version

[bumpsemver:json (lock):package-lock.json]
jsonpath = packages."".version

[bumpsemver:yaml:dbt_project.yml]

[bumpsemver:toml:pyproject.toml]
tomlpath = tool.poetry.version
"#,
        )
        .unwrap();

        assert_eq!(
            config.files,
            vec![
                FileSection {
                    file_type: FileType::PlainText,
                    file: "VERSION".to_string(),
                    selector: None,
                    search: Some("version={current_version}".to_string()),
                    replace: None,
                },
                FileSection {
                    file_type: FileType::Json,
                    file: "package.json".to_string(),
                    selector: Some("version".to_string()),
                    search: None,
                    replace: None,
                },
                FileSection {
                    file_type: FileType::Json,
                    file: "package-lock.json".to_string(),
                    selector: Some(r#"packages."".version"#.to_string()),
                    search: None,
                    replace: None,
                },
                FileSection {
                    file_type: FileType::Yaml,
                    file: "dbt_project.yml".to_string(),
                    selector: Some("version".to_string()),
                    search: None,
                    replace: None,
                },
                FileSection {
                    file_type: FileType::Toml,
                    file: "pyproject.toml".to_string(),
                    selector: Some("tool.poetry.version".to_string()),
                    search: None,
                    replace: None,
                },
            ]
        );
    }

    #[rstest]
    #[case("plaintext", "package.json", "json")]
    #[case("file", "pyproject.toml", "toml")]
    #[case("plaintext", "values.yml", "yaml")]
    #[case("plaintext", "values.YAML", "yaml")]
    fn test_file_type_mismatch(#[case] declared: &str, #[case] file: &str, #[case] expected: &str) {
        let err = parse(&format!("[bumpsemver:{declared}:{file}]\n")).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "Wrong file type '{declared}' specified for file {file}, please use '{expected}' instead"
            )
        );
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_file_type_override() {
        let config = parse(
            "[bumpsemver:plaintext!:package.json]\nsearch = \"version\": \"{current_version}\"\n",
        )
        .unwrap();
        assert_eq!(config.files[0].file_type, FileType::PlainText);
        assert_eq!(config.files[0].file, "package.json");
        assert_eq!(
            config.files[0].search.as_deref(),
            Some("\"version\": \"{current_version}\"")
        );
    }

    #[test]
    fn test_unknown_type_and_keys() {
        let err = parse("[bumpsemver:xml:pom.xml]\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid config file. Unknown file type 'xml' in section 'bumpsemver:xml:pom.xml'"
        );

        let err = parse("[bumpsemver:json:package.json]\nyamlpath = version\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid config file. Unknown keys ['yamlpath'] in section 'bumpsemver:json:package.json'"
        );

        let err = parse("[bumpsemver:discovery]\nignored = README.md\n").unwrap_err();
        assert!(matches!(err, BumpError::InvalidConfigSection(_)));
    }

    #[test]
    fn test_discovery_ignore_list() {
        let config =
            parse("[bumpsemver:discovery]\nignore =\n    README.md\n    docs/package.json\n").unwrap();
        assert_eq!(config.discovery_ignore, vec!["README.md", "docs/package.json"]);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DEFAULT_CONFIG_FILE);

        let config = Config::load(&path, false).unwrap();
        assert!(!config.exists());

        let err = Config::load(&path, true).unwrap_err();
        assert!(matches!(err, BumpError::ConfigFileNotFound(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_write_current_version_keeps_crlf() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(
            &path,
            "[bumpsemver]\r\ncurrent_version = 0.4.0\r\nnew_version = 0.4.1\r\n\r\n[bumpsemver:json:fileJ]\r\njsonpath = version\r\n\r\n",
        )
        .unwrap();

        let mut config = Config::load(&path, true).unwrap();
        config.write_current_version("0.4.1", false).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "[bumpsemver]\r\ncurrent_version = 0.4.1\r\n\r\n[bumpsemver:json:fileJ]\r\njsonpath = version\r\n"
        );
    }

    #[test]
    fn test_write_current_version_dry_run() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DEFAULT_CONFIG_FILE);
        let content = "[bumpsemver]\ncurrent_version = 0.4.0\n";
        fs::write(&path, content).unwrap();

        let mut config = Config::load(&path, true).unwrap();
        config.write_current_version("0.4.1", true).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), content);
    }

    #[test]
    fn test_resolve() {
        assert_eq!(resolve(Path::new("./"), "VERSION"), PathBuf::from("VERSION"));
        assert_eq!(
            resolve(Path::new("/tmp/project"), "VERSION"),
            PathBuf::from("/tmp/project/VERSION")
        );
    }
}

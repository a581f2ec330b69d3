use super::{Context, ContextValue, PartConfig, Template, Version, VersionPart};
use crate::errors::{BumpError, Result};
use indexmap::IndexMap;
use log::{debug, info, warn};
use regex::Regex;
use std::collections::HashMap;

pub const DEFAULT_PARSE: &str = r"(?P<major>\d+)\.(?P<minor>\d+)\.(?P<patch>\d+)";
pub const DEFAULT_SERIALIZE: &str = "{major}.{minor}.{patch}";
pub const DEFAULT_SEARCH: &str = "{current_version}";
pub const DEFAULT_REPLACE: &str = "{new_version}";

/// How versions are parsed, serialized and located in plaintext files.
#[derive(Debug, Clone)]
pub struct VersionConfig {
    parse_regex: Regex,
    serialize_format: Template,
    search: Template,
    replace: Template,
    part_configs: HashMap<String, PartConfig>,
}

impl VersionConfig {
    pub fn new(search: Option<&str>, replace: Option<&str>) -> Result<Self> {
        Ok(Self {
            parse_regex: Regex::new(DEFAULT_PARSE)?,
            serialize_format: Template::parse(DEFAULT_SERIALIZE)?,
            search: Template::parse(search.unwrap_or(DEFAULT_SEARCH))?,
            replace: Template::parse(replace.unwrap_or(DEFAULT_REPLACE))?,
            part_configs: HashMap::new(),
        })
    }

    pub fn with_parse(mut self, pattern: &str) -> Result<Self> {
        self.parse_regex = Regex::new(pattern)?;
        Ok(self)
    }

    pub fn with_serialize(mut self, format: &str) -> Result<Self> {
        self.serialize_format = Template::parse(format)?;
        Ok(self)
    }

    pub fn with_part_config(mut self, name: &str, config: PartConfig) -> Self {
        self.part_configs.insert(name.to_string(), config);
        self
    }

    pub fn search(&self) -> &Template {
        &self.search
    }

    pub fn replace(&self) -> &Template {
        &self.replace
    }

    pub fn uses_default_search(&self) -> bool {
        self.search.as_str() == DEFAULT_SEARCH
    }

    /// Part names in the order the serialize format mentions them.
    pub fn order(&self) -> Vec<&str> {
        self.serialize_format.labels().collect()
    }

    pub fn parse(&self, version_string: &str) -> Option<Version> {
        if version_string.is_empty() {
            return None;
        }

        info!(
            "Parsing version '{}' using regexp '{}'",
            version_string,
            self.parse_regex.as_str()
        );
        let Some(captures) = self.parse_regex.captures(version_string) else {
            warn!(
                "Evaluating 'parse' option: '{}' does not parse current version '{}'",
                self.parse_regex.as_str(),
                version_string
            );
            return None;
        };

        let mut parts = IndexMap::new();
        for name in self.parse_regex.capture_names().flatten() {
            let value = captures.name(name).map_or("", |m| m.as_str());
            let config = self.part_configs.get(name).cloned().unwrap_or_default();
            parts.insert(name.to_string(), VersionPart::with_config(value, config));
        }

        let version = Version::new(parts, Some(version_string.to_string()));
        info!("Parsed the following values: {}", version);
        Some(version)
    }

    pub fn serialize(&self, version: &Version) -> Result<String> {
        let context: Context = version
            .parts()
            .map(|(name, part)| (name.to_string(), ContextValue::from(part.value())))
            .collect();

        self.serialize_format.render(&context).map_err(|err| {
            debug!("Failed to serialize version '{}': {}", version, err);
            BumpError::CannotParseVersion
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::NumericFunction;
    use rstest::rstest;

    #[test]
    fn test_parse_default_format() {
        let config = VersionConfig::new(None, None).unwrap();
        let version = config.parse("1.2.3").unwrap();

        assert_eq!(version.get("major").unwrap().value(), "1");
        assert_eq!(version.get("minor").unwrap().value(), "2");
        assert_eq!(version.get("patch").unwrap().value(), "3");
        assert_eq!(version.original(), Some("1.2.3"));
        assert_eq!(config.serialize(&version).unwrap(), "1.2.3");
    }

    #[rstest]
    #[case("major", "2.0.0")]
    #[case("minor", "1.3.0")]
    #[case("patch", "1.2.4")]
    fn test_bumped_version_survives_serialize_and_parse(
        #[case] part: &str,
        #[case] expected: &str,
    ) {
        let config = VersionConfig::new(None, None).unwrap();
        let bumped = config
            .parse("1.2.3")
            .unwrap()
            .bump(part, &config.order())
            .unwrap();

        let serialized = config.serialize(&bumped).unwrap();
        assert_eq!(serialized, expected);
        assert_eq!(config.parse(&serialized).unwrap(), bumped);
    }

    #[test]
    fn test_parse_is_a_search() {
        let config = VersionConfig::new(None, None).unwrap();
        let version = config.parse("v10.20.30-beta").unwrap();
        assert_eq!(config.serialize(&version).unwrap(), "10.20.30");
    }

    #[test]
    fn test_parse_empty_or_unmatched() {
        let config = VersionConfig::new(None, None).unwrap();
        assert!(config.parse("").is_none());
        assert!(config.parse("0.13").is_none());
    }

    #[test]
    fn test_parse_optional_group_is_empty() {
        let config = VersionConfig::new(None, None)
            .unwrap()
            .with_parse(r"(?P<major>\d+)\.(?P<minor>\d+)(-rc(?P<rc>\d+))?")
            .unwrap();
        let version = config.parse("3.1").unwrap();
        assert_eq!(version.get("rc").unwrap().value(), "");
    }

    #[test]
    fn test_order_follows_serialize_format() {
        let config = VersionConfig::new(None, None)
            .unwrap()
            .with_serialize("{minor}-{major}")
            .unwrap();
        assert_eq!(config.order(), vec!["minor", "major"]);
    }

    #[test]
    fn test_serialize_missing_part() {
        let config = VersionConfig::new(None, None)
            .unwrap()
            .with_parse(r"(?P<major>\d+)\.(?P<minor>\d+)")
            .unwrap();
        let version = config.parse("1.2").unwrap();
        let err = config.serialize(&version).unwrap_err();
        assert!(matches!(err, BumpError::CannotParseVersion));
    }

    #[test]
    fn test_bump_with_part_config() {
        let config = VersionConfig::new(None, None)
            .unwrap()
            .with_part_config(
                "patch",
                PartConfig::Numeric(NumericFunction::new(Some("1")).unwrap()),
            );
        let version = config.parse("1.2.3").unwrap();
        let bumped = version.bump("minor", &config.order()).unwrap();
        assert_eq!(config.serialize(&bumped).unwrap(), "1.3.1");
    }

    #[test]
    fn test_default_search_and_replace() {
        let config = VersionConfig::new(None, None).unwrap();
        assert!(config.uses_default_search());
        assert_eq!(config.replace().as_str(), "{new_version}");

        let config = VersionConfig::new(Some("version={current_version}"), None).unwrap();
        assert!(!config.uses_default_search());
    }
}

use crate::errors::{BumpError, Result};
use regex::Regex;
use std::fmt;

fn first_numeric_regex() -> Result<Regex> {
    Ok(Regex::new(r"([^0-9]*)([0-9]+)(.*)")?)
}

/// Bumps the first run of digits in a value and keeps whatever surrounds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericFunction {
    first_value: String,
}

impl NumericFunction {
    pub fn new(first_value: Option<&str>) -> Result<Self> {
        let first_value = first_value.unwrap_or("0");
        if !first_numeric_regex()?.is_match(first_value) {
            return Err(BumpError::InvalidFirstValue {
                value: first_value.to_string(),
            });
        }
        Ok(Self {
            first_value: first_value.to_string(),
        })
    }

    pub fn first_value(&self) -> &str {
        &self.first_value
    }

    pub fn bump(&self, value: &str) -> Result<String> {
        let nothing_to_bump = || BumpError::NothingToBump {
            value: value.to_string(),
        };
        let regex = first_numeric_regex()?;
        let captures = regex.captures(value).ok_or_else(nothing_to_bump)?;

        let prefix = captures.get(1).map_or("", |m| m.as_str());
        let numeric = captures.get(2).map_or("", |m| m.as_str());
        let suffix = captures.get(3).map_or("", |m| m.as_str());

        let bumped = numeric
            .parse::<u128>()
            .ok()
            .and_then(|n| n.checked_add(1))
            .ok_or_else(nothing_to_bump)?;

        Ok(format!("{prefix}{bumped}{suffix}"))
    }
}

impl Default for NumericFunction {
    fn default() -> Self {
        Self {
            first_value: "0".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartConfig {
    Numeric(NumericFunction),
}

impl PartConfig {
    pub fn first_value(&self) -> &str {
        match self {
            PartConfig::Numeric(function) => function.first_value(),
        }
    }

    pub fn bump(&self, value: &str) -> Result<String> {
        match self {
            PartConfig::Numeric(function) => function.bump(value),
        }
    }
}

impl Default for PartConfig {
    fn default() -> Self {
        PartConfig::Numeric(NumericFunction::default())
    }
}

/// A single named component of a version, e.g. the `minor` in `1.2.3`.
#[derive(Debug, Clone)]
pub struct VersionPart {
    value: String,
    config: PartConfig,
}

impl VersionPart {
    pub fn new(value: impl Into<String>) -> Self {
        Self::with_config(value, PartConfig::default())
    }

    pub fn with_config(value: impl Into<String>, config: PartConfig) -> Self {
        Self {
            value: value.into(),
            config,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn config(&self) -> &PartConfig {
        &self.config
    }

    pub fn bump(&self) -> Result<Self> {
        Ok(Self::with_config(
            self.config.bump(&self.value)?,
            self.config.clone(),
        ))
    }

    /// The part reset to its configured first value.
    pub fn null(&self) -> Self {
        Self::with_config(self.config.first_value(), self.config.clone())
    }
}

impl PartialEq for VersionPart {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for VersionPart {}

impl fmt::Display for VersionPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0", "1")]
    #[case("9", "10")]
    #[case("007", "8")]
    #[case("rc1", "rc2")]
    #[case("dev5-final", "dev6-final")]
    #[case("r3x4", "r4x4")]
    fn test_numeric_bump(#[case] value: &str, #[case] expected: &str) {
        let function = NumericFunction::default();
        assert_eq!(function.bump(value).unwrap(), expected);
    }

    #[test]
    fn test_numeric_bump_without_digits() {
        let function = NumericFunction::default();
        let err = function.bump("final").unwrap_err();
        assert!(matches!(err, BumpError::NothingToBump { .. }));
    }

    #[test]
    fn test_first_value_must_contain_digit() {
        let err = NumericFunction::new(Some("alpha")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The given first value alpha does not contain any digit"
        );
        assert_eq!(NumericFunction::new(Some("r1")).unwrap().first_value(), "r1");
        assert_eq!(NumericFunction::new(None).unwrap().first_value(), "0");
    }

    #[test]
    fn test_part_bump_and_null() {
        let part = VersionPart::new("4");
        assert_eq!(part.bump().unwrap().value(), "5");
        assert_eq!(part.null().value(), "0");

        let custom = VersionPart::with_config(
            "4",
            PartConfig::Numeric(NumericFunction::new(Some("1")).unwrap()),
        );
        assert_eq!(custom.null().value(), "1");
    }

    #[test]
    fn test_part_equality_ignores_config() {
        let custom = VersionPart::with_config(
            "2",
            PartConfig::Numeric(NumericFunction::new(Some("1")).unwrap()),
        );
        assert_eq!(VersionPart::new("2"), custom);
        assert_ne!(VersionPart::new("2"), VersionPart::new("3"));
    }
}

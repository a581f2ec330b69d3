use crate::errors::{BumpError, Result};
use chrono::NaiveDateTime;
use chrono::format::{Item, StrftimeItems};
use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextValue {
    Text(String),
    Time(NaiveDateTime),
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::Text(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::Text(value)
    }
}

impl From<NaiveDateTime> for ContextValue {
    fn from(value: NaiveDateTime) -> Self {
        ContextValue::Time(value)
    }
}

/// Values available to `{name}` placeholders.
pub type Context = BTreeMap<String, ContextValue>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Field { name: String, spec: Option<String> },
}

/// A `str.format` style template: `{name}`, `{name:%Y%m%d}` for time values,
/// and `{{` / `}}` for literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    raw: String,
    pieces: Vec<Piece>,
}

impl Template {
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| BumpError::Template {
            template: raw.to_string(),
            reason: reason.to_string(),
        };

        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut field = String::new();
                    let mut closed = false;
                    for next in chars.by_ref() {
                        if next == '}' {
                            closed = true;
                            break;
                        }
                        field.push(next);
                    }
                    if !closed {
                        return Err(invalid("expected '}' before end of string"));
                    }

                    let (name, spec) = match field.split_once(':') {
                        Some((name, spec)) => (name, Some(spec.to_string())),
                        None => (field.as_str(), None),
                    };
                    // conversions such as `!r` make no difference for string values
                    let name = name.split('!').next().unwrap_or_default();
                    if name.is_empty() {
                        return Err(invalid("positional fields are not supported"));
                    }

                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    pieces.push(Piece::Field {
                        name: name.to_string(),
                        spec,
                    });
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(invalid("single '}' encountered")),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        Ok(Self {
            raw: raw.to_string(),
            pieces,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Placeholder names in order of appearance.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.pieces.iter().filter_map(|piece| match piece {
            Piece::Field { name, .. } => Some(name.as_str()),
            Piece::Literal(_) => None,
        })
    }

    pub fn render(&self, context: &Context) -> Result<String> {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Field { name, spec } => {
                    let value = context.get(name).ok_or_else(|| BumpError::MissingValue {
                        key: name.clone(),
                        template: self.raw.clone(),
                    })?;
                    self.write_value(&mut out, value, spec.as_deref())?;
                }
            }
        }
        Ok(out)
    }

    fn write_value(
        &self,
        out: &mut String,
        value: &ContextValue,
        spec: Option<&str>,
    ) -> Result<()> {
        let failed = |reason: String| BumpError::Template {
            template: self.raw.clone(),
            reason,
        };

        match (value, spec) {
            (ContextValue::Text(text), _) => out.push_str(text),
            (ContextValue::Time(time), None) => {
                write!(out, "{}", time.format("%Y-%m-%d %H:%M:%S%.6f"))
                    .map_err(|e| failed(e.to_string()))?;
            }
            (ContextValue::Time(time), Some(spec)) => {
                let items: Vec<Item> = StrftimeItems::new(spec).collect();
                if items.iter().any(|item| matches!(item, Item::Error)) {
                    return Err(failed(format!("invalid time format '{spec}'")));
                }
                write!(out, "{}", time.format_with_items(items.into_iter()))
                    .map_err(|e| failed(e.to_string()))?;
            }
        }
        Ok(())
    }
}

impl FromStr for Template {
    type Err = BumpError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn context(pairs: &[(&str, &str)]) -> Context {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), ContextValue::from(*value)))
            .collect()
    }

    #[test]
    fn test_render_named_fields() {
        let template = Template::parse("{major}.{minor}.{patch}").unwrap();
        let rendered = template
            .render(&context(&[("major", "1"), ("minor", "2"), ("patch", "3")]))
            .unwrap();
        assert_eq!(rendered, "1.2.3");
        assert_eq!(template.labels().collect::<Vec<_>>(), vec!["major", "minor", "patch"]);
    }

    #[test]
    fn test_render_escaped_braces() {
        let template = Template::parse("{{literal}} {name}").unwrap();
        let rendered = template.render(&context(&[("name", "x")])).unwrap();
        assert_eq!(rendered, "{literal} x");
        assert_eq!(template.labels().count(), 1);
    }

    #[test]
    fn test_render_missing_key() {
        let template = Template::parse("v{current_version}").unwrap();
        let err = template.render(&Context::new()).unwrap_err();
        assert!(matches!(err, BumpError::MissingValue { ref key, .. } if key == "current_version"));
    }

    #[test]
    fn test_render_time_with_format() {
        let time = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        let mut ctx = Context::new();
        ctx.insert("now".to_string(), ContextValue::from(time));

        let template = Template::parse("released {now:%Y-%m-%d}").unwrap();
        assert_eq!(template.render(&ctx).unwrap(), "released 2024-03-09");
    }

    #[test]
    fn test_parse_rejects_unbalanced_braces() {
        assert!(Template::parse("{major").is_err());
        assert!(Template::parse("major}").is_err());
        assert!(Template::parse("{}").is_err());
    }
}

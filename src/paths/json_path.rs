use super::PathError;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Key(String),
    /// `*`: every member of an object or element of an array.
    AnyKey,
    /// `[*]`
    AnyIndex,
    Index(usize),
}

/// A JSONPath subset: `$`, `a.b`, `"quoted key"`, `a[0]`, `a[*]` and `*`.
///
/// A field name applied to an array is applied to each of its elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    steps: Vec<Step>,
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '@' | '/')
}

impl JsonPath {
    pub fn parse(selector: &str) -> Result<Self, PathError> {
        let invalid = || PathError::InvalidSelector(selector.to_string());
        let chars: Vec<char> = selector.trim().chars().collect();
        if chars.is_empty() {
            return Err(invalid());
        }

        let mut steps = Vec::new();
        let mut pos = 0;
        let mut expect_name = true;
        if chars[0] == '$' {
            pos = 1;
            expect_name = false;
        }

        while pos < chars.len() {
            match chars[pos] {
                '[' => {
                    let close = chars[pos..]
                        .iter()
                        .position(|c| *c == ']')
                        .ok_or_else(invalid)?;
                    let inner: String = chars[pos + 1..pos + close].iter().collect();
                    steps.push(Self::bracket_step(inner.trim()).ok_or_else(invalid)?);
                    pos += close + 1;
                    expect_name = false;
                }
                '.' if !expect_name => {
                    pos += 1;
                    expect_name = true;
                    if pos == chars.len() || chars[pos] == '.' {
                        return Err(invalid());
                    }
                }
                '*' if expect_name => {
                    steps.push(Step::AnyKey);
                    pos += 1;
                    expect_name = false;
                }
                quote @ ('"' | '\'') if expect_name => {
                    let close = chars[pos + 1..]
                        .iter()
                        .position(|c| *c == quote)
                        .ok_or_else(invalid)?;
                    let key: String = chars[pos + 1..pos + 1 + close].iter().collect();
                    steps.push(Step::Key(key));
                    pos += close + 2;
                    expect_name = false;
                }
                c if expect_name && is_name_char(c) => {
                    let len = chars[pos..]
                        .iter()
                        .take_while(|c| is_name_char(**c))
                        .count();
                    steps.push(Step::Key(chars[pos..pos + len].iter().collect()));
                    pos += len;
                    expect_name = false;
                }
                _ => return Err(invalid()),
            }
        }

        Ok(Self { steps })
    }

    fn bracket_step(inner: &str) -> Option<Step> {
        if inner == "*" {
            return Some(Step::AnyIndex);
        }
        if let Ok(index) = inner.parse::<usize>() {
            return Some(Step::Index(index));
        }
        let quoted = inner.len() >= 2
            && ((inner.starts_with('"') && inner.ends_with('"'))
                || (inner.starts_with('\'') && inner.ends_with('\'')));
        quoted.then(|| Step::Key(inner[1..inner.len() - 1].to_string()))
    }

    /// Every value the path reaches, paired with its JSON pointer.
    pub fn find<'a>(&self, document: &'a Value) -> Vec<(String, &'a Value)> {
        let mut current = vec![(String::new(), document)];
        for step in &self.steps {
            let mut next = Vec::new();
            for (pointer, value) in current {
                Self::apply(step, pointer, value, &mut next);
            }
            current = next;
        }
        current
    }

    fn apply<'a>(
        step: &Step,
        pointer: String,
        value: &'a Value,
        out: &mut Vec<(String, &'a Value)>,
    ) {
        match (step, value) {
            (Step::Key(key), Value::Object(map)) => {
                if let Some(child) = map.get(key) {
                    out.push((child_pointer(&pointer, key), child));
                }
            }
            (Step::Key(_), Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    Self::apply(step, format!("{pointer}/{i}"), item, out);
                }
            }
            (Step::AnyKey, Value::Object(map)) => {
                for (key, child) in map {
                    out.push((child_pointer(&pointer, key), child));
                }
            }
            (Step::AnyKey | Step::AnyIndex, Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    out.push((format!("{pointer}/{i}"), item));
                }
            }
            (Step::Index(index), Value::Array(items)) => {
                if let Some(item) = items.get(*index) {
                    out.push((format!("{pointer}/{index}"), item));
                }
            }
            _ => {}
        }
    }
}

fn child_pointer(parent: &str, key: &str) -> String {
    format!("{}/{}", parent, key.replace('~', "~0").replace('/', "~1"))
}

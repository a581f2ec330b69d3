use super::{PathError, splice, split_dotted};
use indexmap::IndexMap;
use regex::Regex;
use std::ops::Range;
use tree_sitter::Node;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TomlValue {
    /// `literal` is true for single-quoted strings.
    String { value: String, literal: bool },
    /// Integers, floats, booleans and dates, kept as written.
    Other(String),
    Array(Vec<TomlNode>),
    Table(IndexMap<String, TomlNode>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TomlNode {
    pub value: TomlValue,
    /// Byte span of the value in the source, absent for tables declared by headers.
    pub span: Option<Range<usize>>,
}

impl TomlNode {
    fn table() -> Self {
        Self {
            value: TomlValue::Table(IndexMap::new()),
            span: None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&TomlNode> {
        match &self.value {
            TomlValue::Table(table) => table.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            TomlValue::String { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// A parsed TOML document that keeps the byte span of every value.
#[derive(Debug, Clone)]
pub struct TomlDocument {
    source: String,
    root: TomlNode,
}

impl TomlDocument {
    pub fn parse(content: &str) -> Result<Self, PathError> {
        let mut parser = tree_sitter::Parser::new();
        let language = tree_sitter_toml_ng::LANGUAGE;
        parser
            .set_language(&language.into())
            .map_err(|e| PathError::InvalidDocument(e.to_string()))?;

        let tree = parser
            .parse(content, None)
            .ok_or_else(|| PathError::InvalidDocument("Failed to parse TOML".to_string()))?;
        let document = tree.root_node();
        if document.has_error() {
            return Err(PathError::InvalidDocument("TOML syntax error".to_string()));
        }

        let builder = Builder { source: content };
        let mut root = IndexMap::new();
        let mut cursor = document.walk();
        for child in document.named_children(&mut cursor) {
            match child.kind() {
                "pair" => builder.insert_pair(&mut root, child)?,
                "table" => {
                    let keys = builder.header_keys(child)?;
                    let table = descend(&mut root, &keys)?;
                    builder.insert_pairs(table, child)?;
                }
                "table_array_element" => {
                    let keys = builder.header_keys(child)?;
                    let Some((last, parents)) = keys.split_last() else {
                        return Err(PathError::InvalidDocument("empty table name".to_string()));
                    };
                    let mut element = IndexMap::new();
                    builder.insert_pairs(&mut element, child)?;

                    let parent = descend(&mut root, parents)?;
                    let entry = parent.entry(last.clone()).or_insert_with(|| TomlNode {
                        value: TomlValue::Array(Vec::new()),
                        span: None,
                    });
                    match &mut entry.value {
                        TomlValue::Array(items) => items.push(TomlNode {
                            value: TomlValue::Table(element),
                            span: None,
                        }),
                        _ => {
                            return Err(PathError::InvalidDocument(format!(
                                "'{last}' is not an array of tables"
                            )));
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(Self {
            source: content.to_string(),
            root: TomlNode {
                value: TomlValue::Table(root),
                span: None,
            },
        })
    }

    pub fn root(&self) -> &TomlNode {
        &self.root
    }

    /// Source text with each node's value replaced by the string `text`.
    ///
    /// Strings keep their quote style where `text` allows it, anything else
    /// becomes a basic string.
    pub fn replace_values(&self, nodes: &[&TomlNode], text: &str) -> String {
        let edits = nodes
            .iter()
            .filter_map(|node| {
                let span = node.span.clone()?;
                let rendered = match &node.value {
                    TomlValue::String { literal: true, .. }
                        if !text.contains('\'') && !text.contains('\n') =>
                    {
                        format!("'{text}'")
                    }
                    _ => basic_string(text),
                };
                Some((span, rendered))
            })
            .collect();
        splice(&self.source, edits)
    }
}

/// Walks to the table at `keys`, creating missing tables and entering the
/// latest element of arrays of tables.
fn descend<'a>(
    mut table: &'a mut IndexMap<String, TomlNode>,
    keys: &[String],
) -> Result<&'a mut IndexMap<String, TomlNode>, PathError> {
    for key in keys {
        let node = table.entry(key.clone()).or_insert_with(TomlNode::table);
        table = match &mut node.value {
            TomlValue::Table(inner) => inner,
            TomlValue::Array(items) => match items.last_mut() {
                Some(TomlNode {
                    value: TomlValue::Table(inner),
                    ..
                }) => inner,
                _ => return Err(PathError::InvalidDocument(format!("'{key}' is not a table"))),
            },
            _ => return Err(PathError::InvalidDocument(format!("'{key}' is not a table"))),
        };
    }
    Ok(table)
}

fn basic_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn unescape_basic(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('b') => out.push('\u{8}'),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('f') => out.push('\u{c}'),
            Some('r') => out.push('\r'),
            Some(escape @ ('u' | 'U')) => {
                let len = if escape == 'u' { 4 } else { 8 };
                let hex: String = chars.by_ref().take(len).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push('\\');
                        out.push(escape);
                        out.push_str(&hex);
                    }
                }
            }
            // line ending backslash in multi-line strings
            Some('\n') | Some(' ') | Some('\t') => {
                while chars.peek().is_some_and(|c| c.is_whitespace()) {
                    chars.next();
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Decodes a string or quoted key, returning its value and whether it was a literal string.
fn unquote(text: &str) -> (String, bool) {
    let trim_first_newline = |s: &str| s.strip_prefix('\n').unwrap_or(s).to_string();
    if let Some(inner) = text.strip_prefix("\"\"\"").and_then(|t| t.strip_suffix("\"\"\"")) {
        (unescape_basic(&trim_first_newline(inner)), false)
    } else if let Some(inner) = text.strip_prefix("'''").and_then(|t| t.strip_suffix("'''")) {
        (trim_first_newline(inner), true)
    } else if let Some(inner) = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        (unescape_basic(inner), false)
    } else if let Some(inner) = text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        (inner.to_string(), true)
    } else {
        (text.to_string(), false)
    }
}

struct Builder<'a> {
    source: &'a str,
}

impl Builder<'_> {
    fn text(&self, node: Node) -> &str {
        &self.source[node.byte_range()]
    }

    fn key_path(&self, node: Node) -> Vec<String> {
        match node.kind() {
            "dotted_key" => {
                let mut cursor = node.walk();
                node.named_children(&mut cursor)
                    .flat_map(|child| self.key_path(child))
                    .collect()
            }
            "quoted_key" => vec![unquote(self.text(node)).0],
            _ => vec![self.text(node).trim().to_string()],
        }
    }

    fn header_keys(&self, header: Node) -> Result<Vec<String>, PathError> {
        let mut cursor = header.walk();
        let key = header
            .named_children(&mut cursor)
            .find(|child| matches!(child.kind(), "bare_key" | "quoted_key" | "dotted_key"))
            .ok_or_else(|| PathError::InvalidDocument("table without a name".to_string()))?;
        Ok(self.key_path(key))
    }

    fn insert_pairs(
        &self,
        table: &mut IndexMap<String, TomlNode>,
        parent: Node,
    ) -> Result<(), PathError> {
        let mut cursor = parent.walk();
        for child in parent.named_children(&mut cursor) {
            if child.kind() == "pair" {
                self.insert_pair(table, child)?;
            }
        }
        Ok(())
    }

    fn insert_pair(
        &self,
        table: &mut IndexMap<String, TomlNode>,
        pair: Node,
    ) -> Result<(), PathError> {
        let mut cursor = pair.walk();
        let parts: Vec<Node> = pair
            .named_children(&mut cursor)
            .filter(|child| child.kind() != "comment")
            .collect();
        let (Some(key), Some(value)) = (parts.first(), parts.last()) else {
            return Err(PathError::InvalidDocument(format!(
                "incomplete pair '{}'",
                self.text(pair)
            )));
        };

        let keys = self.key_path(*key);
        let Some((last, parents)) = keys.split_last() else {
            return Err(PathError::InvalidDocument("empty key".to_string()));
        };
        let target = descend(table, parents)?;
        target.insert(last.clone(), self.value(*value)?);
        Ok(())
    }

    fn value(&self, node: Node) -> Result<TomlNode, PathError> {
        let value = match node.kind() {
            "string" => {
                let (value, literal) = unquote(self.text(node));
                TomlValue::String { value, literal }
            }
            "array" => {
                let mut cursor = node.walk();
                let items = node
                    .named_children(&mut cursor)
                    .filter(|child| child.kind() != "comment")
                    .map(|child| self.value(child))
                    .collect::<Result<Vec<_>, _>>()?;
                TomlValue::Array(items)
            }
            "inline_table" => {
                let mut table = IndexMap::new();
                self.insert_pairs(&mut table, node)?;
                TomlValue::Table(table)
            }
            _ => TomlValue::Other(self.text(node).to_string()),
        };
        Ok(TomlNode {
            value,
            span: Some(node.byte_range()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Key(String),
    Index(usize),
}

/// Dotted TOML path such as `tool.poetry.version`, `package[0].version` or `a[].value`.
///
/// A key applied to an array of tables is applied to every table in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TomlPath {
    steps: Vec<Step>,
}

fn segment_regex() -> Result<Regex, PathError> {
    Regex::new(r"^(?P<key>.*?)(\[(?P<index>\d*)\])?$")
        .map_err(|e| PathError::InvalidSelector(e.to_string()))
}

impl TomlPath {
    pub fn parse(selector: &str) -> Result<Self, PathError> {
        let invalid = || PathError::InvalidSelector(selector.to_string());
        if selector.contains('\'') {
            return Err(invalid());
        }

        let segments = split_dotted(selector).ok_or_else(invalid)?;
        let regex = segment_regex()?;
        let mut steps = Vec::new();
        for segment in segments {
            if segment.trim().is_empty() || segment.starts_with('[') {
                return Err(invalid());
            }
            let captures = regex.captures(segment).ok_or_else(invalid)?;
            let key = captures.name("key").map_or("", |m| m.as_str());
            if key.is_empty() || key.contains('[') || key.contains(']') {
                return Err(invalid());
            }

            let key = if let Some(quoted) = key.strip_prefix('"') {
                match quoted.strip_suffix('"') {
                    Some(inner) if !inner.is_empty() && !inner.contains('"') => inner,
                    _ => return Err(invalid()),
                }
            } else if key.contains(' ') || key.contains('"') {
                return Err(invalid());
            } else {
                key
            };
            steps.push(Step::Key(key.to_string()));

            if let Some(index) = captures.name("index")
                && !index.as_str().is_empty()
            {
                steps.push(Step::Index(index.as_str().parse().map_err(|_| invalid())?));
            }
        }

        Ok(Self { steps })
    }

    pub fn find<'a>(&self, root: &'a TomlNode) -> Vec<&'a TomlNode> {
        let mut current = vec![root];
        for step in &self.steps {
            let mut next = Vec::new();
            for node in current {
                Self::apply(step, node, &mut next);
            }
            current = next;
        }
        current
    }

    fn apply<'a>(step: &Step, node: &'a TomlNode, out: &mut Vec<&'a TomlNode>) {
        match (step, &node.value) {
            (Step::Key(key), TomlValue::Table(table)) => out.extend(table.get(key)),
            (Step::Key(_), TomlValue::Array(items)) => {
                for item in items {
                    Self::apply(step, item, out);
                }
            }
            (Step::Index(index), TomlValue::Array(items)) => out.extend(items.get(*index)),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLES: &str = r#"[[a]]
name = "e1"
value = [ 1, 2 ]

[[a]]
name = "e2"
value = [ 3, 4 ]
"#;

    fn raw<'a>(selector: &str, document: &'a TomlDocument) -> Vec<String> {
        TomlPath::parse(selector)
            .unwrap()
            .find(document.root())
            .into_iter()
            .map(|node| match &node.value {
                TomlValue::String { value, .. } => value.clone(),
                TomlValue::Other(text) => text.clone(),
                TomlValue::Array(items) => format!("array of {}", items.len()),
                TomlValue::Table(_) => "table".to_string(),
            })
            .collect()
    }

    fn update(content: &str, selector: &str, text: &str) -> String {
        let document = TomlDocument::parse(content).unwrap();
        let nodes = TomlPath::parse(selector).unwrap().find(document.root());
        document.replace_values(&nodes, text)
    }

    #[test]
    fn test_query_scalars() {
        let document = TomlDocument::parse("a = 1\nb = \"foobar\"\nc = 1.2\nd = true\n").unwrap();
        assert_eq!(raw("a", &document), vec!["1"]);
        assert_eq!(raw("b", &document), vec!["foobar"]);
        assert_eq!(raw("c", &document), vec!["1.2"]);
        assert_eq!(raw("d", &document), vec!["true"]);
        assert!(raw("e", &document).is_empty());
    }

    #[test]
    fn test_query_array_of_tables() {
        let document = TomlDocument::parse(TABLES).unwrap();
        assert_eq!(raw("a[1].value[1]", &document), vec!["4"]);
        assert_eq!(raw("a[].value[1]", &document), vec!["2", "4"]);
        assert_eq!(raw("a.value[1]", &document), vec!["2", "4"]);
        assert_eq!(raw("a.name", &document), vec!["e1", "e2"]);
        assert_eq!(raw("a[1].value", &document), vec!["array of 2"]);
        assert_eq!(raw("a.value", &document), vec!["array of 2", "array of 2"]);
        assert!(raw("a[7].name", &document).is_empty());
    }

    #[test]
    fn test_query_tables_and_dotted_keys() {
        let content = r#"[tool.poetry]
name = "demo"
version = "0.1.0"

[tool."my.tool"]
settings.version = '0.1.0'
"#;
        let document = TomlDocument::parse(content).unwrap();
        assert_eq!(raw("tool.poetry.version", &document), vec!["0.1.0"]);
        assert_eq!(raw(r#"tool."my.tool".settings.version"#, &document), vec!["0.1.0"]);
    }

    #[test]
    fn test_update_array_element() {
        assert_eq!(
            update(TABLES, "a[1].value[1]", "5"),
            TABLES.replace("[ 3, 4 ]", "[ 3, \"5\" ]")
        );
    }

    #[test]
    fn test_update_nested_arrays_of_tables() {
        let content = r#"[[dummy]]
[[dummy.a]]
name = "object1_1"
version = "1.0.0" # first

[[dummy.a]]
name = "object1_2"
version = "1.0.0"

[[dummy]]
# second group
[[dummy.a]]
name = "object2_1"
version = '1.0.0'
"#;
        let expected = content.replace("\"1.0.0\"", "\"1.1.0\"").replace("'1.0.0'", "'1.1.0'");
        assert_eq!(update(content, "dummy.a.version", "1.1.0"), expected);
    }

    #[test]
    fn test_update_keeps_unselected_content() {
        let content = "# header\n[package]\nname = \"x\"  # name\nversion = \"0.1.0\"  # version\n\n[dependencies]\nversion = \"9.9.9\"\n";
        assert_eq!(
            update(content, "package.version", "0.2.0"),
            content.replace("\"0.1.0\"", "\"0.2.0\"")
        );
    }

    #[test]
    fn test_invalid_toml() {
        assert!(TomlDocument::parse("a = \nb = ]").is_err());
    }

    #[test]
    fn test_selector_grammar() {
        for valid in ["a", "a.b", "a[0].b", "a[].b", r#"a."b c".d"#, r#""quoted""#] {
            assert!(TomlPath::parse(valid).is_ok(), "selector {valid:?} should be valid");
        }
        for invalid in [
            "",
            "a..b",
            ".a",
            "a.",
            "[0].a",
            "a.b c",
            "a.'b'",
            r#"a."b"c""#,
            r#"a.""#,
            "a[x]",
            "a[0",
            "a]",
        ] {
            assert!(TomlPath::parse(invalid).is_err(), "selector {invalid:?} should be invalid");
        }
    }
}

use super::{PathError, splice, split_dotted};
use indexmap::IndexMap;
use regex::Regex;
use std::ops::Range;
use tree_sitter::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    Plain,
    DoubleQuoted,
    SingleQuoted,
    Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YamlValue {
    /// `is_string` is false for plain scalars that resolve to numbers, booleans or dates.
    Scalar {
        value: String,
        style: ScalarStyle,
        is_string: bool,
    },
    Sequence(Vec<YamlNode>),
    Mapping(IndexMap<String, YamlNode>),
    Null,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YamlNode {
    pub value: YamlValue,
    pub span: Option<Range<usize>>,
}

impl YamlNode {
    fn null() -> Self {
        Self {
            value: YamlValue::Null,
            span: None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&YamlNode> {
        match &self.value {
            YamlValue::Mapping(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&IndexMap<String, YamlNode>> {
        match &self.value {
            YamlValue::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[YamlNode]> {
        match &self.value {
            YamlValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// The value of a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            YamlValue::Scalar {
                value,
                is_string: true,
                ..
            } => Some(value),
            _ => None,
        }
    }
}

/// A parsed YAML document that keeps the byte span of every node.
#[derive(Debug, Clone)]
pub struct YamlDocument {
    source: String,
    root: YamlNode,
}

impl YamlDocument {
    pub fn parse(content: &str) -> Result<Self, PathError> {
        let mut parser = tree_sitter::Parser::new();
        let language = tree_sitter_yaml::LANGUAGE;
        parser
            .set_language(&language.into())
            .map_err(|e| PathError::InvalidDocument(e.to_string()))?;

        let tree = parser
            .parse(content, None)
            .ok_or_else(|| PathError::InvalidDocument("Failed to parse YAML".to_string()))?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(PathError::InvalidDocument("YAML syntax error".to_string()));
        }

        let builder = Builder { source: content };
        let mut cursor = root.walk();
        let document = root
            .named_children(&mut cursor)
            .find(|child| child.kind() == "document");
        let root = match document {
            Some(document) => builder.first_value(document),
            None => YamlNode::null(),
        };

        Ok(Self {
            source: content.to_string(),
            root,
        })
    }

    pub fn root(&self) -> &YamlNode {
        &self.root
    }

    /// Source text with each node's value replaced by `text`, keeping its quoting style.
    pub fn replace_values(&self, nodes: &[&YamlNode], text: &str) -> String {
        let edits = nodes
            .iter()
            .filter_map(|node| {
                let span = node.span.clone()?;
                let rendered = match &node.value {
                    YamlValue::Scalar {
                        style: ScalarStyle::SingleQuoted,
                        ..
                    } => format!("'{}'", text.replace('\'', "''")),
                    YamlValue::Scalar {
                        style: ScalarStyle::Plain,
                        is_string: true,
                        ..
                    } if is_plain_safe(text) => text.to_string(),
                    _ => double_quoted(text),
                };
                Some((span, rendered))
            })
            .collect();
        splice(&self.source, edits)
    }
}

fn double_quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Plain scalars that the core schema resolves to null, booleans or numbers.
fn non_string_regex() -> Result<Regex, regex::Error> {
    Regex::new(concat!(
        r"^(?:~|null|Null|NULL|true|True|TRUE|false|False|FALSE",
        r"|yes|Yes|YES|no|No|NO|on|On|ON|off|Off|OFF",
        r"|[-+]?[0-9]+|0o[0-7]+|0x[0-9a-fA-F]+",
        r"|[-+]?(?:\.[0-9]+|[0-9]+(?:\.[0-9]*)?)(?:[eE][-+]?[0-9]+)?",
        r"|[-+]?\.(?:inf|Inf|INF)|\.(?:nan|NaN|NAN))$"
    ))
}

fn is_plain_safe(text: &str) -> bool {
    let Some(first) = text.chars().next() else {
        return false;
    };
    non_string_regex().is_ok_and(|regex| !regex.is_match(text))
        && !"-?:,[]{}#&*!|>'\"%@`".contains(first)
        && text.trim() == text
        && !text.contains(": ")
        && !text.contains(" #")
        && !text.ends_with(':')
        && !text.contains('\n')
}

struct Builder<'a> {
    source: &'a str,
}

impl Builder<'_> {
    fn text(&self, node: Node) -> &str {
        &self.source[node.byte_range()]
    }

    /// The first child carrying a value, skipping anchors, tags and comments.
    fn first_value(&self, node: Node) -> YamlNode {
        let mut cursor = node.walk();
        let child = node
            .named_children(&mut cursor)
            .find(|child| !matches!(child.kind(), "anchor" | "tag" | "comment"));
        match child {
            Some(child) => self.build(child),
            None => YamlNode::null(),
        }
    }

    fn build(&self, node: Node) -> YamlNode {
        let span = Some(node.byte_range());
        match node.kind() {
            "block_node" | "flow_node" | "block_sequence_item" => self.first_value(node),
            "block_mapping" | "flow_mapping" => {
                let mut map = IndexMap::new();
                let mut cursor = node.walk();
                for pair in node.named_children(&mut cursor) {
                    if matches!(pair.kind(), "block_mapping_pair" | "flow_pair") {
                        let (key, value) = self.pair(pair);
                        map.insert(key, value);
                    }
                }
                YamlNode {
                    value: YamlValue::Mapping(map),
                    span,
                }
            }
            "block_sequence" | "flow_sequence" => {
                let mut items = Vec::new();
                let mut cursor = node.walk();
                for item in node.named_children(&mut cursor) {
                    match item.kind() {
                        "comment" => {}
                        "flow_pair" => {
                            let (key, value) = self.pair(item);
                            let mut map = IndexMap::new();
                            map.insert(key, value);
                            items.push(YamlNode {
                                value: YamlValue::Mapping(map),
                                span: Some(item.byte_range()),
                            });
                        }
                        _ => items.push(self.build(item)),
                    }
                }
                YamlNode {
                    value: YamlValue::Sequence(items),
                    span,
                }
            }
            "plain_scalar" => {
                let mut cursor = node.walk();
                let is_string = node
                    .named_children(&mut cursor)
                    .next()
                    .is_none_or(|child| child.kind() == "string_scalar");
                let is_null = node
                    .named_child(0)
                    .is_some_and(|child| child.kind() == "null_scalar");
                if is_null {
                    return YamlNode {
                        value: YamlValue::Null,
                        span,
                    };
                }
                YamlNode {
                    value: YamlValue::Scalar {
                        value: self.text(node).to_string(),
                        style: ScalarStyle::Plain,
                        is_string,
                    },
                    span,
                }
            }
            "double_quote_scalar" => YamlNode {
                value: YamlValue::Scalar {
                    value: unescape_double_quoted(self.text(node)),
                    style: ScalarStyle::DoubleQuoted,
                    is_string: true,
                },
                span,
            },
            "single_quote_scalar" => {
                let text = self.text(node);
                let inner = text
                    .strip_prefix('\'')
                    .and_then(|t| t.strip_suffix('\''))
                    .unwrap_or(text);
                YamlNode {
                    value: YamlValue::Scalar {
                        value: inner.replace("''", "'"),
                        style: ScalarStyle::SingleQuoted,
                        is_string: true,
                    },
                    span,
                }
            }
            "block_scalar" => YamlNode {
                value: YamlValue::Scalar {
                    value: self.text(node).to_string(),
                    style: ScalarStyle::Block,
                    is_string: false,
                },
                span,
            },
            _ => YamlNode {
                value: YamlValue::Scalar {
                    value: self.text(node).to_string(),
                    style: ScalarStyle::Plain,
                    is_string: false,
                },
                span,
            },
        }
    }

    fn pair(&self, pair: Node) -> (String, YamlNode) {
        let key = match pair.child_by_field_name("key") {
            Some(key_node) => {
                let key = self.build(key_node);
                match key.value {
                    YamlValue::Scalar { value, .. } => value,
                    _ => self.text(key_node).to_string(),
                }
            }
            None => String::new(),
        };
        let value = match pair.child_by_field_name("value") {
            Some(value_node) => self.build(value_node),
            None => YamlNode::null(),
        };
        (key, value)
    }
}

fn unescape_double_quoted(text: &str) -> String {
    let inner = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(escape) = chars.next() else {
            out.push('\\');
            break;
        };
        let width = match escape {
            'x' => 2,
            'u' => 4,
            'U' => 8,
            'n' => {
                out.push('\n');
                continue;
            }
            't' => {
                out.push('\t');
                continue;
            }
            '0' => {
                out.push('\0');
                continue;
            }
            other => {
                out.push(other);
                continue;
            }
        };
        let digits: String = chars.by_ref().take(width).collect();
        let decoded = u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32);
        match decoded {
            Some(decoded) if digits.len() == width => out.push(decoded),
            // malformed escapes are kept verbatim
            _ => {
                out.push('\\');
                out.push(escape);
                out.push_str(&digits);
            }
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Key(String),
    AnyKey,
    AnyIndex,
    Index(usize),
}

/// Dotted YAML path: `a.b`, `*.vars.version`, `list[0].name`, `"quoted.key"`.
///
/// A field name applied to a sequence is applied to each of its items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YamlPath {
    steps: Vec<Step>,
}

fn segment_regex() -> Result<Regex, PathError> {
    Regex::new(r#"^(?:(?P<star>\*)|"(?P<quoted>[^"]*)"|(?P<name>[^\[\]"*\s]+))?(?P<indexes>(?:\[(?:\d+|\*)\])*)$"#)
        .map_err(|e| PathError::InvalidSelector(e.to_string()))
}

impl YamlPath {
    pub fn parse(selector: &str) -> Result<Self, PathError> {
        let invalid = || PathError::InvalidSelector(selector.to_string());
        let selector = selector.trim();
        let segments = split_dotted(selector).ok_or_else(invalid)?;
        let regex = segment_regex()?;

        let mut steps = Vec::new();
        for segment in segments {
            let captures = regex.captures(segment).ok_or_else(invalid)?;
            let indexes = captures.name("indexes").map_or("", |m| m.as_str());

            if captures.name("star").is_some() {
                steps.push(Step::AnyKey);
            } else if let Some(quoted) = captures.name("quoted") {
                steps.push(Step::Key(quoted.as_str().to_string()));
            } else if let Some(name) = captures.name("name") {
                steps.push(Step::Key(name.as_str().to_string()));
            } else if indexes.is_empty() {
                return Err(invalid());
            }

            for index in indexes
                .split(']')
                .filter_map(|part| part.strip_prefix('['))
            {
                match index {
                    "*" => steps.push(Step::AnyIndex),
                    digits => steps.push(Step::Index(digits.parse().map_err(|_| invalid())?)),
                }
            }
        }

        Ok(Self { steps })
    }

    pub fn find<'a>(&self, root: &'a YamlNode) -> Vec<&'a YamlNode> {
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

    fn apply<'a>(step: &Step, node: &'a YamlNode, out: &mut Vec<&'a YamlNode>) {
        match (step, &node.value) {
            (Step::Key(key), YamlValue::Mapping(map)) => out.extend(map.get(key)),
            (Step::Key(_), YamlValue::Sequence(items)) => {
                for item in items {
                    Self::apply(step, item, out);
                }
            }
            (Step::AnyKey, YamlValue::Mapping(map)) => out.extend(map.values()),
            (Step::AnyKey | Step::AnyIndex, YamlValue::Sequence(items)) => out.extend(items),
            (Step::Index(index), YamlValue::Sequence(items)) => out.extend(items.get(*index)),
            _ => {}
        }
    }
}

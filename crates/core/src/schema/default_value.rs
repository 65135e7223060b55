//! Synthesized default values that remember where their comments came from.

use crate::error::YamlError;
use crate::yaml;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Number, Value as JsonValue};

/// Prefix that marks synthetic comment entries in the commented form.
pub const MAGIC: &str = "c823d4d4";

/// Single- or double-quoted YAML scalar on one line.
const QUOTED: &str = r#"'(?:[^'\n]|'')*'|"(?:[^"\\\n]|\\.)*""#;

/// A line that may carry a comment marker: a quoted sequence item, or a mapping
/// entry (possibly opening a mapping inside a sequence item).
static MARKER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?m)^(?P<indent>[ \t]*)(?:-[ \t]+(?P<item>{QUOTED})|(?P<dash>-[ \t]+)?(?P<key>{QUOTED}|{MAGIC}[^\n]*?):(?:[ \t]+(?P<value>[^\n]*))?)$"
    ))
    .expect("valid comment regex")
});

/// Payload of a [`DefaultValue`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Node {
    /// `null`.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(Number),
    /// A string.
    String(String),
    /// A sequence; items may be wrapped defaults.
    Sequence(Vec<Node>),
    /// A mapping; values may be wrapped defaults.
    Mapping(IndexMap<String, Node>),
    /// A nested default carrying its own description.
    Default(Box<DefaultValue>),
}

#[derive(PartialEq, Eq)]
enum Kind {
    Null,
    Bool,
    Number,
    String,
    Sequence,
    Mapping,
    Default,
}

impl Node {
    fn kind(&self) -> Kind {
        match self {
            Node::Null => Kind::Null,
            Node::Bool(_) => Kind::Bool,
            Node::Number(_) => Kind::Number,
            Node::String(_) => Kind::String,
            Node::Sequence(_) => Kind::Sequence,
            Node::Mapping(_) => Kind::Mapping,
            Node::Default(_) => Kind::Default,
        }
    }

    /// Returns true for [`Node::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    /// Commented form of this node, see [`DefaultValue::to_commented`].
    pub fn to_commented(&self) -> JsonValue {
        match self {
            Node::Sequence(items) => JsonValue::Array(commented_sequence(items)),
            Node::Mapping(entries) => JsonValue::Object(commented_mapping(entries)),
            Node::Default(inner) => inner.to_commented(),
            scalar => scalar.to_plain(),
        }
    }

    /// This node as plain JSON, with every description dropped.
    pub fn to_plain(&self) -> JsonValue {
        match self {
            Node::Null => JsonValue::Null,
            Node::Bool(flag) => JsonValue::Bool(*flag),
            Node::Number(number) => JsonValue::Number(number.clone()),
            Node::String(text) => JsonValue::String(text.clone()),
            Node::Sequence(items) => JsonValue::Array(items.iter().map(Node::to_plain).collect()),
            Node::Mapping(entries) => JsonValue::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_plain()))
                    .collect(),
            ),
            Node::Default(inner) => inner.value.to_plain(),
        }
    }
}

impl From<JsonValue> for Node {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Node::Null,
            JsonValue::Bool(flag) => Node::Bool(flag),
            JsonValue::Number(number) => Node::Number(number),
            JsonValue::String(text) => Node::String(text),
            JsonValue::Array(items) => Node::Sequence(items.into_iter().map(Node::from).collect()),
            JsonValue::Object(entries) => Node::Mapping(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Node::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&JsonValue> for Node {
    fn from(value: &JsonValue) -> Self {
        Node::from(value.clone())
    }
}

impl From<DefaultValue> for Node {
    fn from(value: DefaultValue) -> Self {
        Node::Default(Box::new(value))
    }
}

/// A default value for one schema node plus the description used as its comment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DefaultValue {
    /// The wrapped value.
    pub value: Node,
    /// Human-readable description, rendered as a YAML comment.
    pub description: Option<String>,
}

impl DefaultValue {
    /// Wraps `value` with an optional description.
    pub fn new(value: impl Into<Node>, description: Option<String>) -> Self {
        Self {
            value: value.into(),
            description,
        }
    }

    /// Wraps `value` with a description.
    pub fn described(value: impl Into<Node>, description: impl Into<String>) -> Self {
        Self::new(value, Some(description.into()))
    }

    /// Unwraps nested defaults until the wrapped value is no longer a [`Node::Default`].
    ///
    /// A non-empty inner description replaces the outer one.
    pub fn flatten(&mut self) {
        if let Node::Default(inner) = &mut self.value {
            let mut inner = std::mem::take(inner.as_mut());
            inner.flatten();
            if inner.description.as_deref().is_some_and(|text| !text.is_empty()) {
                self.description = inner.description;
            }
            self.value = inner.value;
        }
    }

    /// Merges `source` into `self` and returns `self`.
    ///
    /// Sequences are concatenated, mappings are overridden key by key, other
    /// values of the same kind are replaced. A value of another kind only
    /// replaces a `null`. A non-empty source description always wins.
    pub fn merge(&mut self, source: &DefaultValue) -> &mut Self {
        let flattened;
        let source = if matches!(source.value, Node::Default(_)) {
            let mut copy = source.clone();
            copy.flatten();
            flattened = copy;
            &flattened
        } else {
            source
        };

        if !source.value.is_null() {
            self.flatten();
            match (&mut self.value, &source.value) {
                (Node::Sequence(items), Node::Sequence(more)) => items.extend(more.iter().cloned()),
                (Node::Mapping(entries), Node::Mapping(more)) => {
                    for (key, value) in more {
                        entries.insert(key.clone(), value.clone());
                    }
                }
                (target, incoming) if target.kind() == incoming.kind() || target.is_null() => {
                    *target = incoming.clone();
                }
                _ => {}
            }
        }
        if let Some(description) = source.description.as_deref().filter(|text| !text.is_empty()) {
            self.description = Some(description.to_string());
        }
        self
    }

    /// Commented form of a sequence default, `None` if the value is not a sequence.
    ///
    /// Every wrapped item with a description is preceded by one marker string
    /// per description line, `"{MAGIC}{line_index}: {line}"`.
    pub fn to_commented_array(&self) -> Option<Vec<JsonValue>> {
        match &self.value {
            Node::Sequence(items) => Some(commented_sequence(items)),
            Node::Default(inner) => inner.to_commented_array(),
            _ => None,
        }
    }

    /// Commented form of a mapping default, `None` if the value is not a mapping.
    ///
    /// Every wrapped property with a description is preceded by one entry per
    /// description line, keyed `"{MAGIC}{key}{line_index}"`.
    pub fn to_commented_object(&self) -> Option<Map<String, JsonValue>> {
        match &self.value {
            Node::Mapping(entries) => Some(commented_mapping(entries)),
            Node::Default(inner) => inner.to_commented_object(),
            _ => None,
        }
    }

    /// Plain data with descriptions embedded as marker entries.
    pub fn to_commented(&self) -> JsonValue {
        self.value.to_commented()
    }

    /// The default as plain JSON, without any comments.
    pub fn to_plain(&self) -> JsonValue {
        self.value.to_plain()
    }

    /// YAML text with every description restored as `#` comment lines.
    pub fn to_yaml(&self) -> Result<String, YamlError> {
        let text = yaml::stringify(&self.to_commented())?;
        Ok(MARKER_LINE
            .replace_all(&text, |caps: &Captures<'_>| restore_comment(caps))
            .into_owned())
    }
}

/// Rewrites one matched line into a comment if it holds a marker, else returns it unchanged.
fn restore_comment(caps: &Captures<'_>) -> String {
    let indent = &caps["indent"];
    if let Some(item) = caps.name("item") {
        // "{MAGIC}{i}: {line}"
        let text = decode_scalar(item.as_str()).and_then(|line| {
            let (_, text) = line.strip_prefix(MAGIC)?.split_once(": ")?;
            Some(text.to_string())
        });
        return match text {
            Some(text) => format!("{indent}# {text}"),
            None => caps[0].to_string(),
        };
    }

    let is_marker = caps
        .name("key")
        .and_then(|key| decode_scalar(key.as_str()))
        .is_some_and(|key| key.starts_with(MAGIC));
    if !is_marker {
        return caps[0].to_string();
    }
    let text = caps
        .name("value")
        .and_then(|value| decode_scalar(value.as_str()))
        .unwrap_or_default();
    match caps.name("dash") {
        // the marker was the first key of a mapping item; the item stays open
        Some(dash) => format!("{indent}-\n{indent}{}# {text}", " ".repeat(dash.len())),
        None => format!("{indent}# {text}"),
    }
}

/// Reads a scalar as YAML text, undoing quoting and escapes.
fn decode_scalar(text: &str) -> Option<String> {
    match yaml::parse(text).ok()? {
        JsonValue::String(text) => Some(text),
        JsonValue::Null => Some(String::new()),
        other => Some(other.to_string()),
    }
}

fn description_lines(value: &DefaultValue) -> Option<std::str::Split<'_, char>> {
    value
        .description
        .as_deref()
        .filter(|text| !text.trim().is_empty())
        .map(|text| text.split('\n'))
}

fn commented_sequence(items: &[Node]) -> Vec<JsonValue> {
    let mut result = Vec::with_capacity(items.len());
    for item in items {
        if let Node::Default(inner) = item
            && let Some(lines) = description_lines(inner)
        {
            result.extend(
                lines
                    .enumerate()
                    .map(|(i, line)| JsonValue::String(format!("{MAGIC}{i}: {line}"))),
            );
        }
        result.push(item.to_commented());
    }
    result
}

fn commented_mapping(entries: &IndexMap<String, Node>) -> Map<String, JsonValue> {
    let mut result = Map::new();
    for (key, item) in entries {
        if let Node::Default(inner) = item
            && let Some(lines) = description_lines(inner)
        {
            for (i, line) in lines.enumerate() {
                result.insert(format!("{MAGIC}{key}{i}"), JsonValue::String(line.to_string()));
            }
        }
        result.insert(key.clone(), item.to_commented());
    }
    result
}

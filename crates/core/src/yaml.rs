//! YAML parsing and theme-style YAML output.
//!
//! Parsing goes through `serde_yaml`. Output is laid out here so that the
//! indentation width and the rendering of `null` can be configured; scalar
//! quoting is still delegated to `serde_yaml`.

use crate::error::YamlError;
use serde_json::Value as JsonValue;

/// Layout options for [`stringify_with`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct YamlOptions {
    /// Spaces per nesting level. Values below 2 are treated as 2.
    pub indent: usize,
    /// Render `null` as an empty scalar instead of the word `null`.
    pub null_as_empty: bool,
}

impl YamlOptions {
    /// Layout used for theme configuration files.
    pub const fn theme() -> Self {
        Self {
            indent: 4,
            null_as_empty: true,
        }
    }

    /// Two-space indentation with explicit `null`s.
    pub const fn compact() -> Self {
        Self {
            indent: 2,
            null_as_empty: false,
        }
    }

    fn width(&self) -> usize {
        self.indent.max(2)
    }
}

impl Default for YamlOptions {
    fn default() -> Self {
        Self::theme()
    }
}

/// Parses a YAML document into a JSON value.
///
/// An empty document parses to `null`.
pub fn parse(text: &str) -> Result<JsonValue, YamlError> {
    if text.trim().is_empty() {
        return Ok(JsonValue::Null);
    }
    let yaml_value: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|err| YamlError::Parse(err.to_string()))?;
    serde_json::to_value(yaml_value).map_err(|err| YamlError::Parse(err.to_string()))
}

/// Renders `value` with [`YamlOptions::theme`].
pub fn stringify(value: &JsonValue) -> Result<String, YamlError> {
    stringify_with(value, &YamlOptions::theme())
}

/// Renders `value` as a block-style YAML document. Lines are never wrapped.
pub fn stringify_with(value: &JsonValue, options: &YamlOptions) -> Result<String, YamlError> {
    let mut out = String::new();
    Emitter { options }.node(&mut out, value, 0)?;
    Ok(out)
}

struct Emitter<'a> {
    options: &'a YamlOptions,
}

impl Emitter<'_> {
    /// Writes a node whose first line starts at `column`.
    fn node(&self, out: &mut String, value: &JsonValue, column: usize) -> Result<(), YamlError> {
        match value {
            JsonValue::Object(map) if !map.is_empty() => self.mapping(out, map, column),
            JsonValue::Array(items) if !items.is_empty() => self.sequence(out, items, column),
            scalar => {
                push_indent(out, column);
                out.push_str(&self.scalar(scalar, column)?);
                out.push('\n');
                Ok(())
            }
        }
    }

    fn mapping(
        &self,
        out: &mut String,
        map: &serde_json::Map<String, JsonValue>,
        column: usize,
    ) -> Result<(), YamlError> {
        for (key, value) in map {
            push_indent(out, column);
            out.push_str(&quote(key)?);
            out.push(':');
            if is_block(value) {
                out.push('\n');
                self.node(out, value, column + self.options.width())?;
            } else {
                self.inline(out, value, column)?;
            }
        }
        Ok(())
    }

    fn sequence(&self, out: &mut String, items: &[JsonValue], column: usize) -> Result<(), YamlError> {
        let width = self.options.width();
        for item in items {
            push_indent(out, column);
            out.push('-');
            if matches!(item, JsonValue::Array(inner) if !inner.is_empty()) {
                // a nested sequence starts on its own line
                out.push('\n');
                self.node(out, item, column + width)?;
            } else if is_block(item) {
                let mut nested = String::new();
                self.node(&mut nested, item, column + width)?;
                // first nested line continues after the dash
                out.push_str(&" ".repeat(width - 1));
                out.push_str(&nested[column + width..]);
            } else {
                self.inline(out, item, column)?;
            }
        }
        Ok(())
    }

    /// Writes a scalar (or empty collection) after a key or a dash.
    fn inline(&self, out: &mut String, value: &JsonValue, column: usize) -> Result<(), YamlError> {
        let text = self.scalar(value, column)?;
        if !text.is_empty() {
            out.push(' ');
            out.push_str(&text);
        }
        out.push('\n');
        Ok(())
    }

    fn scalar(&self, value: &JsonValue, column: usize) -> Result<String, YamlError> {
        Ok(match value {
            JsonValue::Null if self.options.null_as_empty => String::new(),
            JsonValue::Null => "null".to_string(),
            JsonValue::Bool(flag) => flag.to_string(),
            JsonValue::Number(number) => number.to_string(),
            JsonValue::String(text) => {
                let quoted = quote(text)?;
                // block scalars continue on following lines, keep them under their parent
                quoted.replace('\n', &format!("\n{}", " ".repeat(column)))
            }
            JsonValue::Array(_) => "[]".to_string(),
            JsonValue::Object(_) => "{}".to_string(),
        })
    }
}

fn is_block(value: &JsonValue) -> bool {
    match value {
        JsonValue::Object(map) => !map.is_empty(),
        JsonValue::Array(items) => !items.is_empty(),
        _ => false,
    }
}

/// Renders a string scalar, quoted only when YAML requires it.
fn quote(text: &str) -> Result<String, YamlError> {
    let rendered =
        serde_yaml::to_string(text).map_err(|err| YamlError::Serialize(err.to_string()))?;
    let rendered = rendered.trim_end_matches('\n');
    if rendered.contains('\n') && !text.contains('\n') {
        // folded by the emitter; a JSON string is a valid single-line YAML scalar
        return serde_json::to_string(text).map_err(|err| YamlError::Serialize(err.to_string()));
    }
    Ok(rendered.to_string())
}

fn push_indent(out: &mut String, column: usize) {
    out.extend(std::iter::repeat_n(' ', column));
}

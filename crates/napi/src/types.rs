//! NAPI-exposed data structures.

use napi_derive::napi;
use serde_json::Value as JsonValue;
use themecfg_core::{ValidationIssue, ValidationReport, YamlOptions};

/// Layout options for `stringifyYaml`.
#[napi(object)]
#[derive(Debug, Clone, Default)]
pub struct YamlFormatOptions {
    /// Spaces per nesting level. Defaults to 4; values below 2 are raised to 2.
    pub indent: Option<u32>,
    /// Writes `null` as an empty value. Defaults to true.
    pub null_as_empty: Option<bool>,
}

impl From<YamlFormatOptions> for YamlOptions {
    fn from(options: YamlFormatOptions) -> Self {
        let theme = YamlOptions::theme();
        Self {
            indent: options.indent.map_or(theme.indent, |indent| indent as usize),
            null_as_empty: options.null_as_empty.unwrap_or(theme.null_as_empty),
        }
    }
}

/// Default configuration synthesized from a schema.
#[napi(object)]
#[derive(Debug, Clone)]
pub struct DefaultConfigResult {
    /// The default configuration as plain data.
    pub value: JsonValue,
    /// The default configuration as YAML, with schema descriptions as comments.
    pub yaml: String,
}

/// One validation failure.
#[napi(object)]
#[derive(Debug, Clone)]
pub struct ValidationEntry {
    /// JSON pointer to the failing part of the configuration.
    pub instance_path: String,
    /// JSON pointer to the schema keyword that failed.
    pub schema_path: String,
    /// Human-readable message.
    pub message: String,
}

impl From<ValidationIssue> for ValidationEntry {
    fn from(issue: ValidationIssue) -> Self {
        Self {
            instance_path: issue.instance_path,
            schema_path: issue.schema_path,
            message: issue.message,
        }
    }
}

/// Outcome of validating a configuration.
#[napi(object)]
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// True when no failures were found.
    pub valid: bool,
    /// Every failure found.
    pub errors: Vec<ValidationEntry>,
}

impl From<ValidationReport> for ValidationResult {
    fn from(report: ValidationReport) -> Self {
        Self {
            valid: report.is_valid(),
            errors: report.errors.into_iter().map(ValidationEntry::from).collect(),
        }
    }
}

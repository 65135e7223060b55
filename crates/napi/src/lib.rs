#![deny(missing_docs)]
//! Node.js bindings that surface themecfg's Rust implementation.

use napi::bindgen_prelude::*;
use napi_derive::napi;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use themecfg_core::{
    MigrateError, Migration, MigrationStep, Migrator, SchemaError, ThemeConfigError, YamlOptions,
    yaml,
};

/// The stateful schema registry.
pub mod schema;
/// NAPI-exposed data structures.
pub mod types;
pub use schema::ThemeSchema;
pub use types::*;

/// Parses a YAML document into plain data. An empty document yields `null`.
#[napi]
pub fn parse_yaml(text: String) -> napi::Result<JsonValue> {
    yaml::parse(&text).map_err(convert_error)
}

/// Writes plain data as block-style YAML, 4-space indented with empty nulls by default.
#[napi]
pub fn stringify_yaml(value: JsonValue, options: Option<YamlFormatOptions>) -> napi::Result<String> {
    let options: YamlOptions = options.unwrap_or_default().into();
    yaml::stringify_with(&value, &options).map_err(convert_error)
}

/// Loads `root_schema` with its references and returns its commented default configuration.
#[napi]
pub fn generate_default_config(
    root_schema: JsonValue,
    resolve_dirs: Option<Vec<String>>,
) -> napi::Result<Option<DefaultConfigResult>> {
    ThemeSchema::new(root_schema, resolve_dirs)?.default_config()
}

/// Loads `root_schema` with its references and validates `config` against it.
#[napi]
pub fn validate_config(
    root_schema: JsonValue,
    resolve_dirs: Option<Vec<String>>,
    config: JsonValue,
) -> napi::Result<ValidationResult> {
    ThemeSchema::new(root_schema, resolve_dirs)?.validate(config)
}

/// The greatest of `versions` by semantic version precedence.
#[napi]
pub fn latest_version(versions: Vec<String>) -> napi::Result<Option<String>> {
    let migrator = version_chain(versions)?;
    Ok(migrator.latest_version().map(str::to_string))
}

/// Returns true when `version` is older than the greatest of `versions`.
#[napi]
pub fn is_config_outdated(versions: Vec<String>, version: String) -> napi::Result<bool> {
    version_chain(versions)?
        .is_outdated(&version)
        .map_err(convert_error)
}

/// The versions, in upgrade order, that lie after `from` and up to `to` (default: the latest).
#[napi]
pub fn pending_migrations(
    versions: Vec<String>,
    from: String,
    to: Option<String>,
) -> napi::Result<Vec<String>> {
    let migrator = version_chain(versions)?;
    let pending = migrator
        .pending(&from, to.as_deref())
        .map_err(convert_error)?;
    Ok(pending.into_iter().map(str::to_string).collect())
}

/// Builds a migrator whose steps only carry versions; the upgrades run on the JS side.
fn version_chain(versions: Vec<String>) -> napi::Result<Migrator> {
    let mut head: Option<Arc<dyn Migration>> = None;
    for version in versions {
        let step: Arc<dyn Migration> = Arc::new(MigrationStep::unimplemented(version, head));
        head = Some(step);
    }
    Migrator::new(head).map_err(convert_error)
}

/// Maps core errors onto NAPI statuses.
pub(crate) fn convert_error<E: Into<ThemeConfigError>>(err: E) -> Error {
    let err = err.into();
    let message = err.to_string();
    match err {
        // Failures of the code itself rather than of the caller's input
        ThemeConfigError::Schema(SchemaError::Compile { .. })
        | ThemeConfigError::Migrate(MigrateError::NotImplemented { .. })
        | ThemeConfigError::Migrate(MigrateError::Upgrade { .. })
        | ThemeConfigError::Migrate(MigrateError::NotAMapping { .. }) => {
            Error::from_reason(message)
        }
        ThemeConfigError::Migrate(_) | ThemeConfigError::Schema(_) | ThemeConfigError::Yaml(_) => {
            Error::new(Status::InvalidArg, message)
        }
    }
}

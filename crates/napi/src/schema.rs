//! The stateful schema registry exposed to Node callers.

use crate::convert_error;
use crate::types::*;
use napi_derive::napi;
use serde_json::Value as JsonValue;
use themecfg_core::{DefaultValue, SchemaError, SchemaLoader};

/// A root schema plus every schema it references, loaded once and reused.
#[napi]
pub struct ThemeSchema {
    loader: SchemaLoader,
    root_id: String,
}

#[napi]
impl ThemeSchema {
    #[napi(constructor)]
    /// Loads `root_schema` and resolves its references from `resolve_dirs`, then
    /// from the bundled schemas.
    pub fn new(root_schema: JsonValue, resolve_dirs: Option<Vec<String>>) -> napi::Result<Self> {
        let root_id = root_schema
            .get("$id")
            .and_then(JsonValue::as_str)
            .ok_or(SchemaError::MissingId)
            .map_err(convert_error)?
            .to_string();
        let loader = SchemaLoader::load_from_dirs(root_schema, resolve_dirs.unwrap_or_default())
            .map_err(convert_error)?;
        log::debug!("Loaded {} schemas for {}", loader.len(), root_id);
        Ok(Self { loader, root_id })
    }

    /// The `$id` of the root schema.
    #[napi(getter)]
    pub fn root_id(&self) -> String {
        self.root_id.clone()
    }

    /// Registered schema ids in load order.
    #[napi]
    pub fn ids(&self) -> Vec<String> {
        self.loader.ids().map(str::to_string).collect()
    }

    /// Returns true when a schema with this id is registered.
    #[napi]
    pub fn has_schema(&self, id: String) -> bool {
        self.loader.contains(&id)
    }

    /// Registers another schema under its `$id`.
    #[napi]
    pub fn add_schema(&mut self, def: JsonValue) -> napi::Result<()> {
        self.loader.add_schema(def).map_err(convert_error)
    }

    /// Unregisters a schema, returning its definition.
    #[napi]
    pub fn remove_schema(&mut self, id: String) -> Option<JsonValue> {
        self.loader.remove_schema(&id)
    }

    /// Default configuration of the root schema, or `null` if it has none.
    #[napi]
    pub fn default_config(&self) -> napi::Result<Option<DefaultConfigResult>> {
        let Some(value) = self.root_default()? else {
            return Ok(None);
        };
        let yaml = value.to_yaml().map_err(convert_error)?;
        Ok(Some(DefaultConfigResult {
            value: value.to_plain(),
            yaml,
        }))
    }

    /// Validates a configuration against the root schema.
    #[napi]
    pub fn validate(&self, config: JsonValue) -> napi::Result<ValidationResult> {
        let report = self
            .root()?
            .validate(&config)
            .map_err(convert_error)?;
        Ok(report.into())
    }
}

impl ThemeSchema {
    fn root(&self) -> napi::Result<themecfg_core::Schema<'_>> {
        self.loader.get_schema(&self.root_id).ok_or_else(|| {
            convert_error(SchemaError::NotLoaded {
                id: self.root_id.clone(),
            })
        })
    }

    fn root_default(&self) -> napi::Result<Option<DefaultValue>> {
        self.root()?.default_value().map_err(convert_error)
    }
}

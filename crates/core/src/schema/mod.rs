//! JSON-Schema loading, validation and default value synthesis.
//!
//! A [`SchemaLoader`] owns every registered definition, keyed by `$id`.
//! [`SchemaLoader::load`] registers a root definition and everything it reaches
//! through `$ref`, pulling targets from an ordered list of [`SchemaSource`]s.
//! [`Schema`] is a borrowed view over one definition that validates instances
//! and walks the definition tree to build a [`DefaultValue`].

/// Default value trees and their commented YAML form.
pub mod default_value;
/// Schema resolution sources.
pub mod source;

pub use default_value::{DefaultValue, MAGIC, Node};
pub use source::{BuiltinSource, DirSource, MemorySource, SchemaSource};

use crate::error::SchemaError;
use indexmap::IndexMap;
use jsonschema::{Draft, JSONSchema, SchemaResolver, SchemaResolverError};
use once_cell::sync::OnceCell;
use serde_json::{Map, Value as JsonValue, json};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

const REF: &str = "$ref";
const ID: &str = "$id";

/// One validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// JSON pointer to the failing part of the instance.
    pub instance_path: String,
    /// JSON pointer to the schema keyword that failed.
    pub schema_path: String,
    /// Human-readable message.
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.instance_path, self.message)
        }
    }
}

/// Outcome of [`Schema::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Every failure found; empty when the instance is valid.
    pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Returns true when no failures were found.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

struct SchemaEntry {
    def: JsonValue,
    validator: OnceCell<JSONSchema>,
}

impl SchemaEntry {
    fn new(def: JsonValue) -> Self {
        Self {
            def,
            validator: OnceCell::new(),
        }
    }
}

/// Registry of schema definitions keyed by `$id`.
#[derive(Default)]
pub struct SchemaLoader {
    schemas: IndexMap<String, SchemaEntry>,
}

impl SchemaLoader {
    /// Creates an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `root` and every schema reachable from it through `$ref`.
    ///
    /// Each unresolved reference is looked up in `sources` in order, then in the
    /// [`BuiltinSource`]. The first candidate whose `$id` matches is registered
    /// and scanned for further references. Registered ids are never resolved twice.
    pub fn load(
        root: JsonValue,
        sources: Vec<Box<dyn SchemaSource>>,
    ) -> Result<Self, SchemaError> {
        let mut sources = sources;
        sources.push(Box::new(BuiltinSource));

        let mut loader = Self::new();
        let refs = collect_refs(&root);
        loader.add_schema(root)?;
        for reference in refs {
            loader.resolve_ref(&reference, &sources)?;
        }
        Ok(loader)
    }

    /// [`SchemaLoader::load`] with one [`DirSource`] per directory.
    pub fn load_from_dirs<I, P>(root: JsonValue, dirs: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let sources = dirs
            .into_iter()
            .map(|dir| Box::new(DirSource::new(dir)) as Box<dyn SchemaSource>)
            .collect();
        Self::load(root, sources)
    }

    fn resolve_ref(
        &mut self,
        reference: &JsonValue,
        sources: &[Box<dyn SchemaSource>],
    ) -> Result<(), SchemaError> {
        let Some(id) = reference.as_str() else {
            return Err(SchemaError::InvalidReference {
                reference: reference.to_string(),
            });
        };
        if self.schemas.contains_key(id) {
            return Ok(());
        }

        for source in sources {
            let Some(def) = source.resolve(id) else {
                continue;
            };
            if def.get(ID).and_then(JsonValue::as_str) != Some(id) {
                log::debug!("Ignoring candidate for {}: $id does not match", id);
                continue;
            }
            log::debug!("Resolved schema {}", id);
            let refs = collect_refs(&def);
            self.add_schema(def)?;
            for nested in refs {
                self.resolve_ref(&nested, sources)?;
            }
            return Ok(());
        }

        Err(SchemaError::UnresolvedReference { id: id.to_string() })
    }

    /// Looks up a registered schema.
    pub fn get_schema(&self, id: &str) -> Option<Schema<'_>> {
        self.schemas.get(id).map(|entry| Schema {
            loader: self,
            def: &entry.def,
        })
    }

    /// Returns true when a schema with this id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.schemas.contains_key(id)
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Number of registered schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Returns true when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Registers a definition under its `$id`.
    pub fn add_schema(&mut self, def: JsonValue) -> Result<(), SchemaError> {
        if !def.is_object() {
            return Err(SchemaError::NotAnObject);
        }
        let id = def
            .get(ID)
            .and_then(JsonValue::as_str)
            .ok_or(SchemaError::MissingId)?
            .to_string();
        if self.schemas.contains_key(&id) {
            return Err(SchemaError::DuplicateId { id });
        }
        self.invalidate_validators();
        self.schemas.insert(id, SchemaEntry::new(def));
        Ok(())
    }

    /// Unregisters a schema, returning its definition.
    pub fn remove_schema(&mut self, id: &str) -> Option<JsonValue> {
        let removed = self.schemas.shift_remove(id)?;
        self.invalidate_validators();
        Some(removed.def)
    }

    /// Compiles a validator for a registered schema.
    ///
    /// `$ref`s are resolved against the other registered schemas.
    pub fn compile_validator(&self, id: &str) -> Result<JSONSchema, SchemaError> {
        let entry = self.schemas.get(id).ok_or_else(|| SchemaError::NotLoaded {
            id: id.to_string(),
        })?;
        let resolver = RegistryResolver {
            documents: self
                .schemas
                .iter()
                .map(|(id, entry)| (id.clone(), Arc::new(validator_definition(&entry.def))))
                .collect(),
        };
        let def = validator_definition(&entry.def);
        JSONSchema::options()
            .with_draft(Draft::Draft7)
            .with_resolver(resolver)
            .compile(&def)
            .map_err(|err| SchemaError::Compile {
                id: id.to_string(),
                message: err.to_string(),
            })
    }

    fn cached_validator(&self, id: &str) -> Result<&JSONSchema, SchemaError> {
        let entry = self.schemas.get(id).ok_or_else(|| SchemaError::NotLoaded {
            id: id.to_string(),
        })?;
        entry
            .validator
            .get_or_try_init(|| self.compile_validator(id))
    }

    fn invalidate_validators(&mut self) {
        for entry in self.schemas.values_mut() {
            entry.validator.take();
        }
    }
}

impl fmt::Debug for SchemaLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaLoader")
            .field("schemas", &self.schemas.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Serves registered schemas to the validator compiler.
struct RegistryResolver {
    documents: HashMap<String, Arc<JsonValue>>,
}

impl SchemaResolver for RegistryResolver {
    fn resolve(
        &self,
        _root_schema: &JsonValue,
        url: &Url,
        original_reference: &str,
    ) -> Result<Arc<JsonValue>, SchemaResolverError> {
        let reference = original_reference
            .split('#')
            .next()
            .unwrap_or(original_reference);
        self.documents
            .get(reference)
            .or_else(|| self.documents.get(url.path()))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Schema {} is not loaded", original_reference))
    }
}

/// Base that relative `$id`s are resolved against before compiling.
const VALIDATOR_BASE: &str = "json-schema:///";

/// Copy of `def` as the validator sees it: nullable types widened and a
/// relative `$id` made absolute.
fn validator_definition(def: &JsonValue) -> JsonValue {
    let absolute = def
        .get(ID)
        .and_then(JsonValue::as_str)
        .filter(|id| Url::parse(id).is_err())
        .and_then(|id| Url::parse(VALIDATOR_BASE).and_then(|base| base.join(id)).ok());
    let mut def = with_nullable_types(def);
    if let (Some(absolute), Some(map)) = (absolute, def.as_object_mut()) {
        map.insert(ID.to_string(), JsonValue::String(absolute.into()));
    }
    def
}

/// Rewrites `nullable: true` into a `type` list that admits `null`.
fn with_nullable_types(def: &JsonValue) -> JsonValue {
    match def {
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(with_nullable_types).collect()),
        JsonValue::Object(map) => {
            let mut result: Map<String, JsonValue> = map
                .iter()
                .map(|(key, value)| (key.clone(), with_nullable_types(value)))
                .collect();
            if map.get("nullable").and_then(JsonValue::as_bool) == Some(true) {
                let widened = match result.get("type") {
                    Some(JsonValue::String(ty)) if ty != "null" => Some(json!([ty, "null"])),
                    Some(JsonValue::Array(types)) if !types.iter().any(|ty| ty == "null") => {
                        let mut types = types.clone();
                        types.push(json!("null"));
                        Some(JsonValue::Array(types))
                    }
                    _ => None,
                };
                if let Some(widened) = widened {
                    result.insert("type".to_string(), widened);
                }
            }
            JsonValue::Object(result)
        }
        other => other.clone(),
    }
}

/// Every value found under a `$ref` key, depth first.
fn collect_refs(def: &JsonValue) -> Vec<JsonValue> {
    fn walk(value: &JsonValue, refs: &mut Vec<JsonValue>) {
        match value {
            JsonValue::Array(items) => items.iter().for_each(|item| walk(item, refs)),
            JsonValue::Object(map) => {
                for (key, child) in map {
                    if key == REF {
                        refs.push(child.clone());
                    } else {
                        walk(child, refs);
                    }
                }
            }
            _ => {}
        }
    }

    let mut refs = Vec::new();
    walk(def, &mut refs);
    refs
}

/// A schema definition viewed through the loader that resolves its references.
#[derive(Clone, Copy)]
pub struct Schema<'a> {
    loader: &'a SchemaLoader,
    def: &'a JsonValue,
}

impl<'a> Schema<'a> {
    /// Views `def` through `loader`. Fails if `def` is not an object.
    pub fn new(loader: &'a SchemaLoader, def: &'a JsonValue) -> Result<Self, SchemaError> {
        if !def.is_object() {
            return Err(SchemaError::NotAnObject);
        }
        Ok(Self { loader, def })
    }

    /// The `$id` of the definition, if any.
    pub fn id(&self) -> Option<&'a str> {
        self.def.get(ID).and_then(JsonValue::as_str)
    }

    /// The raw definition.
    pub fn definition(&self) -> &'a JsonValue {
        self.def
    }

    /// Validates `instance`, compiling and caching the validator on first use.
    ///
    /// Failures of the instance are returned in the report; errors are reserved
    /// for schemas that cannot be compiled.
    pub fn validate(&self, instance: &JsonValue) -> Result<ValidationReport, SchemaError> {
        let id = self.id().ok_or(SchemaError::MissingId)?;
        let validator = self.loader.cached_validator(id)?;
        let errors = match validator.validate(instance) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|err| ValidationIssue {
                    instance_path: err.instance_path.to_string(),
                    schema_path: err.schema_path.to_string(),
                    message: err.to_string(),
                })
                .collect(),
        };
        Ok(ValidationReport { errors })
    }

    /// Default value for this schema's own definition.
    pub fn default_value(&self) -> Result<Option<DefaultValue>, SchemaError> {
        self.default_value_of(self.def)
    }

    /// Default value for `def`, resolving references through the loader.
    ///
    /// Precedence is `const`, `default`, the first of `examples`, then a value
    /// synthesized from `type`, then the target of a lone `$ref`. Returns `None`
    /// when none of these apply.
    pub fn default_value_of(&self, def: &JsonValue) -> Result<Option<DefaultValue>, SchemaError> {
        let description = description_of(def);
        if let Some(value) = def.get("const") {
            return Ok(Some(DefaultValue::new(value, description)));
        }
        if let Some(value) = def.get("default") {
            return Ok(Some(DefaultValue::new(value, description)));
        }
        if let Some(first) = def
            .get("examples")
            .and_then(JsonValue::as_array)
            .and_then(|examples| examples.first())
        {
            return Ok(Some(DefaultValue::new(first, description)));
        }
        if def.get("type").is_some_and(is_truthy) {
            return self.typed_default_value(def).map(Some);
        }
        if def.get(REF).is_some_and(is_truthy) {
            return self.referred_default_value(def);
        }
        Ok(None)
    }

    /// Default value synthesized from `type`, merged over the `$ref` target if any.
    pub fn typed_default_value(&self, def: &JsonValue) -> Result<DefaultValue, SchemaError> {
        let declared = match def.get("type") {
            Some(JsonValue::Array(types)) => types.first(),
            other => other,
        };
        let ty = declared.and_then(JsonValue::as_str).unwrap_or_default();
        let description = description_of(def);
        let nullable = def.get("nullable").is_some_and(is_truthy);

        let local = match ty {
            "array" => self.array_default_value(def)?,
            "object" => self.object_default_value(def)?,
            _ if nullable && is_primitive(ty) => DefaultValue::new(Node::Null, description),
            "null" => DefaultValue::new(Node::Null, description),
            "boolean" => DefaultValue::new(Node::Bool(false), description),
            "number" | "integer" => DefaultValue::new(Node::Number(0.into()), description),
            "string" => DefaultValue::new(Node::String(String::new()), description),
            _ => {
                let ty = match declared {
                    Some(JsonValue::String(ty)) => ty.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                return Err(SchemaError::UnknownType { ty });
            }
        };

        // local keywords always override the referred schema
        if def.get(REF).is_some_and(is_truthy)
            && let Some(mut referred) = self.referred_default_value(def)?
        {
            referred.merge(&local);
            return Ok(referred);
        }
        Ok(local)
    }

    /// Default sequence: one entry for `items`, or one per `items.oneOf` alternative.
    ///
    /// Each alternative is merged over the default of `items` without `oneOf`.
    pub fn array_default_value(&self, def: &JsonValue) -> Result<DefaultValue, SchemaError> {
        let description = description_of(def);
        let Some(items) = def.get("items").and_then(JsonValue::as_object) else {
            return Ok(DefaultValue::new(Node::Sequence(Vec::new()), description));
        };

        let mut shared = items.clone();
        shared.remove("oneOf");
        let base = self.default_value_of(&JsonValue::Object(shared))?;

        let values = match items.get("oneOf").and_then(JsonValue::as_array) {
            Some(alternatives) => {
                let mut values = Vec::with_capacity(alternatives.len());
                for alternative in alternatives {
                    let own = self.default_value_of(alternative)?;
                    let value = match (&base, own) {
                        (Some(base), Some(own)) => {
                            let mut merged = base.clone();
                            merged.merge(&own);
                            Some(merged)
                        }
                        (Some(base), None) => Some(base.clone()),
                        (None, own) => own,
                    };
                    values.extend(value.map(Node::from));
                }
                values
            }
            None => base.into_iter().map(Node::from).collect(),
        };
        Ok(DefaultValue::new(Node::Sequence(values), description))
    }

    /// Default mapping with one entry per declared property.
    ///
    /// Properties without a default are left out. If the schema has `oneOf`,
    /// the first alternative is merged in; the description stays the parent's.
    pub fn object_default_value(&self, def: &JsonValue) -> Result<DefaultValue, SchemaError> {
        let mut entries = IndexMap::new();
        if let Some(properties) = def.get("properties").and_then(JsonValue::as_object) {
            for (name, property) in properties {
                if let Some(value) = self.default_value_of(property)? {
                    entries.insert(name.clone(), Node::from(value));
                }
            }
        }

        let description = description_of(def);
        let mut value = DefaultValue::new(Node::Mapping(entries), description.clone());
        if let Some(first) = def
            .get("oneOf")
            .and_then(JsonValue::as_array)
            .and_then(|alternatives| alternatives.first())
        {
            if let Some(alternative) = self.default_value_of(first)? {
                value.merge(&alternative);
            }
            value.description = description;
        }
        Ok(value)
    }

    /// Default value of the `$ref` target, described by the referring site if it has a description.
    pub fn referred_default_value(
        &self,
        def: &JsonValue,
    ) -> Result<Option<DefaultValue>, SchemaError> {
        let id = match def.get(REF) {
            Some(JsonValue::String(id)) => id.as_str(),
            Some(other) => {
                return Err(SchemaError::InvalidReference {
                    reference: other.to_string(),
                });
            }
            None => "",
        };
        let target = self
            .loader
            .get_schema(id)
            .ok_or_else(|| SchemaError::NotLoaded { id: id.to_string() })?;
        let Some(mut value) = self.default_value_of(target.def)? else {
            return Ok(None);
        };
        value.merge(&DefaultValue::new(Node::Null, description_of(def)));
        Ok(Some(value))
    }
}

impl fmt::Debug for Schema<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema").field("def", self.def).finish()
    }
}

fn description_of(def: &JsonValue) -> Option<String> {
    def.get("description")
        .and_then(JsonValue::as_str)
        .map(str::to_string)
}

fn is_primitive(ty: &str) -> bool {
    matches!(ty, "null" | "boolean" | "number" | "integer" | "string")
}

fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(flag) => *flag,
        JsonValue::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        JsonValue::String(text) => !text.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn loader_with(defs: Vec<JsonValue>) -> SchemaLoader {
        let mut loader = SchemaLoader::new();
        for def in defs {
            loader.add_schema(def).expect("schema should register");
        }
        loader
    }

    fn default_of(loader: &SchemaLoader, id: &str) -> DefaultValue {
        loader
            .get_schema(id)
            .expect("schema should be loaded")
            .default_value()
            .expect("default should build")
            .expect("default should exist")
    }

    #[test]
    fn default_precedence() {
        let loader = SchemaLoader::new();
        let def = json!({});
        let schema = Schema::new(&loader, &def).unwrap();
        let cases = [
            (json!({ "const": 1, "default": 2, "examples": [3], "type": "number" }), json!(1)),
            (json!({ "default": 2, "examples": [3], "type": "number" }), json!(2)),
            (json!({ "examples": [3, 4], "type": "number" }), json!(3)),
            (json!({ "examples": [], "type": "number" }), json!(0)),
            (json!({ "type": "boolean" }), json!(false)),
            (json!({ "type": "integer" }), json!(0)),
            (json!({ "type": "string" }), json!("")),
            (json!({ "type": "null" }), json!(null)),
            (json!({ "type": ["string", "null"] }), json!("")),
            (json!({ "type": "string", "nullable": true }), json!(null)),
            (json!({ "const": null }), json!(null)),
        ];
        for (def, expected) in cases {
            let value = schema.default_value_of(&def).unwrap().unwrap();
            assert_eq!(value.to_plain(), expected, "{def}");
        }
        assert_eq!(schema.default_value_of(&json!({ "title": "x" })).unwrap(), None);
    }

    #[test]
    fn carries_descriptions() {
        let loader = SchemaLoader::new();
        let def = json!({});
        let schema = Schema::new(&loader, &def).unwrap();
        let value = schema
            .default_value_of(&json!({ "type": "string", "description": "Site title" }))
            .unwrap()
            .unwrap();
        assert_eq!(value.description.as_deref(), Some("Site title"));
    }

    #[test]
    fn unknown_type_is_an_error() {
        let loader = SchemaLoader::new();
        let def = json!({ "type": "date" });
        let err = Schema::new(&loader, &def).unwrap().default_value().unwrap_err();
        assert!(matches!(&err, SchemaError::UnknownType { ty } if ty == "date"), "{err:?}");
    }

    #[test]
    fn schema_requires_object_definition() {
        let loader = SchemaLoader::new();
        let def = json!("string");
        assert!(matches!(Schema::new(&loader, &def), Err(SchemaError::NotAnObject)));
    }

    #[test]
    fn local_keywords_override_referred_defaults() {
        let loader = loader_with(vec![
            json!({
                "$id": "/base.json",
                "type": "object",
                "description": "base",
                "properties": {
                    "prop1": { "type": "string", "default": "prop1" },
                    "prop2": { "type": "number" }
                }
            }),
            json!({
                "$id": "/root.json",
                "type": "object",
                "$ref": "/base.json",
                "properties": {
                    "prop1": { "const": "hello" },
                    "prop3": { "type": "boolean" }
                }
            }),
        ]);
        let value = default_of(&loader, "/root.json");
        assert_eq!(
            value.to_plain(),
            json!({ "prop1": "hello", "prop2": 0, "prop3": false })
        );
        assert_eq!(value.description.as_deref(), Some("base"));
    }

    #[test]
    fn referring_site_description_wins() {
        let loader = loader_with(vec![
            json!({ "$id": "/logo.json", "type": "string", "description": "Path to the logo" }),
            json!({
                "$id": "/root.json",
                "type": "object",
                "properties": {
                    "logo": { "$ref": "/logo.json", "description": "Logo shown in the navbar" },
                    "favicon": { "$ref": "/logo.json" }
                }
            }),
        ]);
        let value = default_of(&loader, "/root.json");
        let Node::Mapping(entries) = &value.value else {
            panic!("object default should be a mapping");
        };
        let description = |key: &str| match &entries[key] {
            Node::Default(inner) => inner.description.clone(),
            other => panic!("unexpected node {other:?}"),
        };
        assert_eq!(description("logo").as_deref(), Some("Logo shown in the navbar"));
        assert_eq!(description("favicon").as_deref(), Some("Path to the logo"));
    }

    #[test]
    fn missing_reference_target_is_an_error() {
        let loader = loader_with(vec![json!({ "$id": "/root.json", "$ref": "/gone.json" })]);
        let err = loader.get_schema("/root.json").unwrap().default_value().unwrap_err();
        assert!(matches!(&err, SchemaError::NotLoaded { id } if id == "/gone.json"), "{err:?}");
    }

    #[test]
    fn array_items_default() {
        let loader = SchemaLoader::new();
        let def = json!({ "type": "array", "items": { "type": "string", "default": "a" } });
        let value = Schema::new(&loader, &def).unwrap().default_value().unwrap().unwrap();
        assert_eq!(value.to_plain(), json!(["a"]));

        let def = json!({ "type": "array" });
        let value = Schema::new(&loader, &def).unwrap().default_value().unwrap().unwrap();
        assert_eq!(value.to_plain(), json!([]));
    }

    #[test]
    fn array_one_of_yields_one_entry_per_alternative() {
        let loader = SchemaLoader::new();
        let def = json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": { "type": { "type": "string" }, "order": { "type": "integer" } },
                "oneOf": [
                    {
                        "type": "object",
                        "description": "Profile widget",
                        "properties": { "type": { "const": "profile" }, "author": { "type": "string" } }
                    },
                    {
                        "type": "object",
                        "properties": { "type": { "const": "toc" }, "index": { "type": "boolean" } }
                    }
                ]
            }
        });
        let value = Schema::new(&loader, &def).unwrap().default_value().unwrap().unwrap();
        assert_eq!(
            value.to_plain(),
            json!([
                { "type": "profile", "order": 0, "author": "" },
                { "type": "toc", "order": 0, "index": false }
            ])
        );
        let Node::Sequence(items) = &value.value else {
            panic!("array default should be a sequence");
        };
        let Node::Default(first) = &items[0] else {
            panic!("entries should be wrapped defaults");
        };
        assert_eq!(first.description.as_deref(), Some("Profile widget"));
    }

    #[test]
    fn object_one_of_merges_first_alternative_only() {
        let loader = SchemaLoader::new();
        let def = json!({
            "type": "object",
            "description": "Comment plugin",
            "properties": { "type": { "type": "string" } },
            "oneOf": [
                {
                    "type": "object",
                    "description": "Disqus",
                    "properties": { "type": { "const": "disqus" }, "shortname": { "type": "string" } }
                },
                {
                    "type": "object",
                    "properties": { "type": { "const": "gitalk" }, "repo": { "type": "string" } }
                }
            ]
        });
        let value = Schema::new(&loader, &def).unwrap().default_value().unwrap().unwrap();
        assert_eq!(value.to_plain(), json!({ "type": "disqus", "shortname": "" }));
        assert_eq!(value.description.as_deref(), Some("Comment plugin"));
    }

    #[test]
    fn add_and_remove_schemas() {
        let mut loader = SchemaLoader::new();
        assert!(matches!(
            loader.add_schema(json!({ "type": "string" })),
            Err(SchemaError::MissingId)
        ));
        assert!(matches!(loader.add_schema(json!([1])), Err(SchemaError::NotAnObject)));

        loader.add_schema(json!({ "$id": "/a.json", "type": "string" })).unwrap();
        assert!(matches!(
            loader.add_schema(json!({ "$id": "/a.json" })),
            Err(SchemaError::DuplicateId { .. })
        ));
        assert!(loader.contains("/a.json"));
        assert_eq!(loader.get_schema("/a.json").unwrap().id(), Some("/a.json"));

        assert!(loader.remove_schema("/a.json").is_some());
        assert!(loader.get_schema("/a.json").is_none());
        assert!(loader.remove_schema("/a.json").is_none());
        assert!(loader.is_empty());
    }

    struct CountingSource {
        inner: MemorySource,
        hits: Rc<RefCell<HashMap<String, usize>>>,
    }

    impl SchemaSource for CountingSource {
        fn resolve(&self, id: &str) -> Option<JsonValue> {
            *self.hits.borrow_mut().entry(id.to_string()).or_default() += 1;
            self.inner.resolve(id)
        }
    }

    #[test]
    fn load_registers_diamond_references_once() {
        let hits = Rc::new(RefCell::new(HashMap::new()));
        let source = CountingSource {
            inner: MemorySource::from_iter([
                json!({ "$id": "/a.json", "type": "object", "properties": { "s": { "$ref": "/shared.json" } } }),
                json!({ "$id": "/b.json", "type": "array", "items": { "$ref": "/shared.json" } }),
                json!({ "$id": "/shared.json", "type": "string" }),
            ]),
            hits: Rc::clone(&hits),
        };
        let root = json!({
            "$id": "/root.json",
            "type": "object",
            "properties": {
                "a": { "$ref": "/a.json" },
                "b": { "$ref": "/b.json" },
                "again": { "$ref": "/a.json" }
            }
        });

        let loader = SchemaLoader::load(root, vec![Box::new(source)]).unwrap();
        assert_eq!(
            loader.ids().collect::<Vec<_>>(),
            ["/root.json", "/a.json", "/shared.json", "/b.json"]
        );
        assert!(hits.borrow().values().all(|count| *count == 1), "{:?}", hits.borrow());
        assert_eq!(
            default_of(&loader, "/root.json").to_plain(),
            json!({ "a": { "s": "" }, "b": [""], "again": { "s": "" } })
        );
    }

    #[test]
    fn load_skips_candidates_with_other_ids() {
        let mut wrong = MemorySource::new();
        wrong.insert_as("/x.json", json!({ "$id": "/y.json", "type": "string" }));
        let right = MemorySource::new().with(json!({ "$id": "/x.json", "type": "number" }));
        let root = json!({ "$id": "/root.json", "properties": { "x": { "$ref": "/x.json" } } });

        let loader = SchemaLoader::load(root, vec![Box::new(wrong), Box::new(right)]).unwrap();
        assert_eq!(
            loader.get_schema("/x.json").unwrap().definition()["type"],
            json!("number")
        );
    }

    #[test]
    fn load_reports_unresolved_and_invalid_references() {
        let root = json!({ "$id": "/root.json", "items": [{ "$ref": "/nowhere.json" }] });
        let err = SchemaLoader::load(root, Vec::new()).unwrap_err();
        assert!(
            matches!(&err, SchemaError::UnresolvedReference { id } if id == "/nowhere.json"),
            "{err:?}"
        );

        let root = json!({ "$id": "/root.json", "$ref": 3 });
        let err = SchemaLoader::load(root, Vec::new()).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidReference { .. }), "{err:?}");

        let err = SchemaLoader::load(json!({ "type": "object" }), Vec::new()).unwrap_err();
        assert!(matches!(err, SchemaError::MissingId));
    }

    #[test]
    fn load_falls_back_to_builtin_schemas() {
        let root = json!({
            "$id": "/root.json",
            "type": "object",
            "properties": { "comment": { "$ref": "/comment/twikoo.json" } }
        });
        let loader = SchemaLoader::load(root, Vec::new()).unwrap();
        assert!(loader.contains("/comment/twikoo.json"));
        assert_eq!(
            default_of(&loader, "/root.json").to_plain()["comment"]["type"],
            json!("twikoo")
        );
    }

    #[test]
    fn validates_across_references() {
        let loader = loader_with(vec![
            json!({ "$id": "/count.json", "type": "integer", "minimum": 0 }),
            json!({
                "$id": "/root.json",
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "count": { "$ref": "/count.json" },
                    "logo": { "type": "string", "nullable": true }
                },
                "required": ["title"]
            }),
        ]);
        let schema = loader.get_schema("/root.json").unwrap();

        let report = schema
            .validate(&json!({ "title": "Blog", "count": 3, "logo": null }))
            .unwrap();
        assert!(report.is_valid(), "{report:?}");

        let report = schema.validate(&json!({ "count": -1 })).unwrap();
        assert!(!report.is_valid());
        assert_eq!(report.errors.len(), 2, "{report:?}");
        assert!(report.errors.iter().any(|issue| issue.instance_path.contains("count")));

        // cached validator gives the same answer
        assert_eq!(schema.validate(&json!({ "count": -1 })).unwrap(), report);
    }

    #[test]
    fn validation_requires_registered_id() {
        let loader = SchemaLoader::new();
        let def = json!({ "type": "string" });
        let schema = Schema::new(&loader, &def).unwrap();
        assert!(matches!(schema.validate(&json!("x")), Err(SchemaError::MissingId)));

        let def = json!({ "$id": "/elsewhere.json", "type": "string" });
        let schema = Schema::new(&loader, &def).unwrap();
        assert!(matches!(
            schema.validate(&json!("x")),
            Err(SchemaError::NotLoaded { .. })
        ));
    }

    #[test]
    fn relative_ids_are_made_absolute_for_validation() {
        let def = validator_definition(&json!({ "$id": "/misc/links.json", "type": "object" }));
        assert_eq!(def["$id"], json!("json-schema:///misc/links.json"));

        let def = validator_definition(&json!({ "$id": "https://example.com/a.json" }));
        assert_eq!(def["$id"], json!("https://example.com/a.json"));
    }

    #[test]
    fn nullable_types_are_widened_for_validation() {
        let def = json!({
            "properties": {
                "a": { "type": "string", "nullable": true },
                "b": { "type": ["integer", "string"], "nullable": true },
                "c": { "type": "string" }
            }
        });
        assert_eq!(
            with_nullable_types(&def),
            json!({
                "properties": {
                    "a": { "type": ["string", "null"], "nullable": true },
                    "b": { "type": ["integer", "string", "null"], "nullable": true },
                    "c": { "type": "string" }
                }
            })
        );
    }
}

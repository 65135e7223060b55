//! Places a [`SchemaLoader`](super::SchemaLoader) can look up `$ref` targets.

use crate::yaml;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// A lookup table from schema ids to schema definitions.
pub trait SchemaSource {
    /// Returns the candidate definition for `id`, if this source has one.
    ///
    /// The loader still checks that the candidate's `$id` equals `id`.
    fn resolve(&self, id: &str) -> Option<JsonValue>;
}

/// Schemas held in memory, keyed by their `$id`.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    schemas: HashMap<String, JsonValue>,
}

impl MemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition under its own `$id`. Definitions without one are ignored.
    pub fn with(mut self, def: JsonValue) -> Self {
        self.insert(def);
        self
    }

    /// Adds a definition under its own `$id`, returning false if it has none.
    pub fn insert(&mut self, def: JsonValue) -> bool {
        match def.get("$id").and_then(JsonValue::as_str) {
            Some(id) => {
                self.schemas.insert(id.to_string(), def);
                true
            }
            None => false,
        }
    }

    /// Adds a definition under an explicit key.
    pub fn insert_as(&mut self, id: impl Into<String>, def: JsonValue) {
        self.schemas.insert(id.into(), def);
    }
}

impl FromIterator<JsonValue> for MemorySource {
    fn from_iter<T: IntoIterator<Item = JsonValue>>(iter: T) -> Self {
        let mut source = Self::new();
        for def in iter {
            source.insert(def);
        }
        source
    }
}

impl SchemaSource for MemorySource {
    fn resolve(&self, id: &str) -> Option<JsonValue> {
        self.schemas.get(id).cloned()
    }
}

const EXTENSIONS: [&str; 3] = ["json", "yml", "yaml"];

/// Schema files below a directory, addressed by their id as a relative path.
///
/// `/comment/disqus.json` resolves to `<root>/comment/disqus.json`. Ids without an
/// extension also try `.json`, `.yml` and `.yaml`.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    /// Creates a source rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory this source reads from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn candidates(&self, id: &str) -> Vec<PathBuf> {
        let relative = Path::new(id.trim_start_matches('/'));
        // ids never leave the root
        if !relative
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
        {
            log::debug!("Ignoring {} outside of {}", id, self.root.display());
            return Vec::new();
        }
        let base = self.root.join(relative);
        let mut paths = vec![base.clone()];
        if base.extension().is_none() {
            paths.extend(EXTENSIONS.iter().map(|ext| base.with_extension(ext)));
        }
        paths
    }
}

impl SchemaSource for DirSource {
    fn resolve(&self, id: &str) -> Option<JsonValue> {
        self.candidates(id).into_iter().find_map(|path| read_schema_file(&path))
    }
}

fn read_schema_file(path: &Path) -> Option<JsonValue> {
    if !path.is_file() {
        return None;
    }
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            log::debug!("Skipping unreadable schema {}: {}", path.display(), err);
            return None;
        }
    };
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == "yml" || ext == "yaml");
    let parsed = if is_yaml {
        yaml::parse(&text).map_err(|err| err.to_string())
    } else {
        serde_json::from_str(&text).map_err(|err| err.to_string())
    };
    match parsed {
        Ok(def) => Some(def),
        Err(err) => {
            log::debug!("Skipping unparsable schema {}: {}", path.display(), err);
            None
        }
    }
}

const BUILTIN_SCHEMAS: [(&str, &str); 3] = [
    (
        "/comment/twikoo.json",
        include_str!("../../schema/comment/twikoo.json"),
    ),
    (
        "/misc/poly_image.json",
        include_str!("../../schema/misc/poly_image.json"),
    ),
    (
        "/misc/poly_links.json",
        include_str!("../../schema/misc/poly_links.json"),
    ),
];

/// Schemas shipped with this crate. Always consulted last.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinSource;

impl BuiltinSource {
    /// Ids of the bundled schemas.
    pub fn ids() -> impl Iterator<Item = &'static str> {
        BUILTIN_SCHEMAS.iter().map(|(id, _)| *id)
    }
}

impl SchemaSource for BuiltinSource {
    fn resolve(&self, id: &str) -> Option<JsonValue> {
        let (_, text) = BUILTIN_SCHEMAS.iter().find(|(known, _)| *known == id)?;
        match serde_json::from_str(text) {
            Ok(def) => Some(def),
            Err(err) => {
                log::warn!("Bundled schema {} is not valid JSON: {}", id, err);
                None
            }
        }
    }
}

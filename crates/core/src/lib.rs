#![deny(missing_docs)]
//! Theme configuration core: versioned migrations, schema-driven defaults and YAML output.

/// Core error types.
pub mod error;
/// Versioned configuration migrations.
pub mod migrate;
/// Schema registry, default value synthesis and validation.
pub mod schema;
/// YAML parsing and theme-style output.
pub mod yaml;

pub use error::{MigrateError, SchemaError, ThemeConfigError, YamlError};
pub use migrate::{Migration, MigrationStep, Migrator, VERSION_KEY};
pub use schema::{
    BuiltinSource, DefaultValue, DirSource, MAGIC, MemorySource, Node, Schema, SchemaLoader,
    SchemaSource, ValidationIssue, ValidationReport,
};
pub use yaml::YamlOptions;

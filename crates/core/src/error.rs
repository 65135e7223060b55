use thiserror::Error;

/// Errors raised while building a migration chain or running migrations.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// A migration in the chain declares a version that is not valid semver.
    #[error("{version} is not a valid version in {migration}")]
    InvalidVersion {
        /// The offending version string.
        version: String,
        /// Name of the migration that declared it.
        migration: String,
        /// Underlying semver parse error.
        #[source]
        source: semver::Error,
    },
    /// The same version was reached twice while walking the chain.
    #[error("Migration {version} appears more than once in the chain (declared by {migration})")]
    DuplicateVersion {
        /// The repeated version.
        version: String,
        /// Name of the migration that repeated it.
        migration: String,
    },
    /// `Migration::upgrade` was not overridden.
    #[error("Migration {version} does not implement upgrade")]
    NotImplemented {
        /// Target version of the migration.
        version: String,
    },
    /// The configuration carries no string `version` field.
    #[error("Configuration does not have a version field")]
    MissingVersion,
    /// The configuration's `version` field is not valid semver.
    #[error("Configuration version {version} is not a valid version")]
    InvalidConfigVersion {
        /// The offending version string.
        version: String,
        /// Underlying semver parse error.
        #[source]
        source: semver::Error,
    },
    /// The requested target version is not valid semver.
    #[error("Target version {version} is not a valid version")]
    InvalidTargetVersion {
        /// The offending version string.
        version: String,
        /// Underlying semver parse error.
        #[source]
        source: semver::Error,
    },
    /// A migration returned something other than a mapping.
    #[error("Migration {version} must produce a mapping")]
    NotAMapping {
        /// Target version of the migration.
        version: String,
    },
    /// A user-provided upgrade function failed.
    #[error("Migration {version} failed: {message}")]
    Upgrade {
        /// Target version of the migration.
        version: String,
        /// Failure description.
        message: String,
    },
}

/// Errors raised while registering, resolving or walking schemas.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema definition is not a JSON object.
    #[error("Schema definition must be an object")]
    NotAnObject,
    /// A schema was registered without an `$id`.
    #[error("The schema definition does not have an $id field")]
    MissingId,
    /// A schema with this `$id` is already registered.
    #[error("Schema {id} is already registered")]
    DuplicateId {
        /// The duplicated id.
        id: String,
    },
    /// A `$ref` points at a schema the loader does not know.
    #[error("Schema {id} is not loaded")]
    NotLoaded {
        /// The missing id.
        id: String,
    },
    /// A `$ref` value is not a string.
    #[error("Invalid schema reference id: {reference}")]
    InvalidReference {
        /// JSON rendering of the offending value.
        reference: String,
    },
    /// No resolution source yielded a schema for the reference.
    #[error(
        "Cannot find schema definition {id}.\nPlease check if the file exists and its $id is correct"
    )]
    UnresolvedReference {
        /// The unresolved id.
        id: String,
    },
    /// The schema uses a `type` with no default value.
    #[error("Cannot get default value for type {ty}")]
    UnknownType {
        /// The unrecognized type name.
        ty: String,
    },
    /// The validator library rejected the schema.
    #[error("Failed to compile schema {id}: {message}")]
    Compile {
        /// Id of the schema being compiled.
        id: String,
        /// Compiler message.
        message: String,
    },
}

/// Errors emitted while reading or writing YAML.
#[derive(Debug, Error)]
pub enum YamlError {
    /// YAML failed to parse.
    #[error("YAML parse error: {0}")]
    Parse(String),
    /// A value could not be rendered as YAML.
    #[error("YAML serialize error: {0}")]
    Serialize(String),
}

/// Any error produced by this crate.
#[derive(Debug, Error)]
pub enum ThemeConfigError {
    /// Migration failure.
    #[error(transparent)]
    Migrate(#[from] MigrateError),
    /// Schema failure.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// YAML failure.
    #[error(transparent)]
    Yaml(#[from] YamlError),
}

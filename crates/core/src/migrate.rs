//! Versioned configuration upgrades.
//!
//! A chain of [`Migration`]s is linked from the newest step back to the oldest
//! through [`Migration::head`]. A [`Migrator`] walks that chain once, orders the
//! steps by semantic version and replays the ones that lie between a
//! configuration's current version and a target version.

use crate::error::MigrateError;
use semver::Version;
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Field of a configuration mapping that records its version.
pub const VERSION_KEY: &str = "version";

/// One upgrade step that brings a configuration to [`Migration::version`].
pub trait Migration: Send + Sync {
    /// Target version, as a semver string.
    fn version(&self) -> &str;

    /// The migration for the previous version, `None` for the oldest one.
    fn head(&self) -> Option<Arc<dyn Migration>>;

    /// Name used in error messages.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Produces an upgraded copy of `config`.
    ///
    /// The input is only borrowed; implementations return a new value that
    /// reflects the additions, removals and transformations of this step.
    fn upgrade(&self, config: &JsonValue) -> Result<JsonValue, MigrateError> {
        let _ = config;
        Err(MigrateError::NotImplemented {
            version: self.version().to_string(),
        })
    }

    /// Runs [`Migration::upgrade`] and stamps the result with this version.
    fn migrate(&self, config: &JsonValue) -> Result<JsonValue, MigrateError> {
        let mut result = self.upgrade(config)?;
        let Some(map) = result.as_object_mut() else {
            return Err(MigrateError::NotAMapping {
                version: self.version().to_string(),
            });
        };
        map.insert(
            VERSION_KEY.to_string(),
            JsonValue::String(self.version().to_string()),
        );
        Ok(result)
    }
}

type UpgradeFn = dyn Fn(&JsonValue) -> Result<JsonValue, MigrateError> + Send + Sync;

/// A migration described by its version, its predecessor and an upgrade function.
///
/// ```
/// use std::sync::Arc;
/// use serde_json::json;
/// use themecfg_core::migrate::{Migration, MigrationStep, Migrator};
///
/// let v2: Arc<dyn Migration> = Arc::new(MigrationStep::new("2.0.0", None, |config| {
///     let mut next = config.clone();
///     next["logo"] = json!("/img/logo.svg");
///     Ok(next)
/// }));
/// let migrator = Migrator::new(Some(v2)).unwrap();
/// let upgraded = migrator.migrate(&json!({ "version": "1.0.0" }), None).unwrap();
/// assert_eq!(upgraded, json!({ "version": "2.0.0", "logo": "/img/logo.svg" }));
/// ```
pub struct MigrationStep {
    version: String,
    head: Option<Arc<dyn Migration>>,
    upgrade: Option<Box<UpgradeFn>>,
}

impl MigrationStep {
    /// Creates a step with an upgrade function.
    pub fn new<F>(version: impl Into<String>, head: Option<Arc<dyn Migration>>, upgrade: F) -> Self
    where
        F: Fn(&JsonValue) -> Result<JsonValue, MigrateError> + Send + Sync + 'static,
    {
        Self {
            version: version.into(),
            head,
            upgrade: Some(Box::new(upgrade)),
        }
    }

    /// Creates a step that declares a version but no upgrade.
    ///
    /// Running it fails with [`MigrateError::NotImplemented`].
    pub fn unimplemented(version: impl Into<String>, head: Option<Arc<dyn Migration>>) -> Self {
        Self {
            version: version.into(),
            head,
            upgrade: None,
        }
    }
}

impl fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("version", &self.version)
            .field("head", &self.head.as_ref().map(|head| head.version().to_string()))
            .finish()
    }
}

impl Migration for MigrationStep {
    fn version(&self) -> &str {
        &self.version
    }

    fn head(&self) -> Option<Arc<dyn Migration>> {
        self.head.clone()
    }

    fn name(&self) -> &str {
        "MigrationStep"
    }

    fn upgrade(&self, config: &JsonValue) -> Result<JsonValue, MigrateError> {
        match &self.upgrade {
            Some(upgrade) => upgrade(config),
            None => Err(MigrateError::NotImplemented {
                version: self.version.clone(),
            }),
        }
    }
}

struct Registered {
    version: Version,
    migration: Arc<dyn Migration>,
}

/// Applies an ordered chain of migrations to configuration objects.
pub struct Migrator {
    /// Sorted ascending by semver precedence.
    registered: Vec<Registered>,
}

impl Migrator {
    /// Loads every migration reachable from `head` through [`Migration::head`].
    pub fn new(head: Option<Arc<dyn Migration>>) -> Result<Self, MigrateError> {
        let mut registered = Vec::new();
        let mut seen = HashSet::new();
        let mut current = head;

        while let Some(migration) = current {
            let version = Version::parse(migration.version()).map_err(|source| {
                MigrateError::InvalidVersion {
                    version: migration.version().to_string(),
                    migration: migration.name().to_string(),
                    source,
                }
            })?;
            if !seen.insert(migration.version().to_string()) {
                return Err(MigrateError::DuplicateVersion {
                    version: migration.version().to_string(),
                    migration: migration.name().to_string(),
                });
            }
            log::debug!("Registered migration {}", migration.version());
            current = migration.head();
            registered.push(Registered { version, migration });
        }

        registered.sort_by(|a, b| a.version.cmp_precedence(&b.version));
        Ok(Self { registered })
    }

    /// The greatest version among the loaded migrations.
    pub fn latest_version(&self) -> Option<&str> {
        self.registered.last().map(|entry| entry.migration.version())
    }

    /// Loaded versions in ascending order.
    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.registered.iter().map(|entry| entry.migration.version())
    }

    /// Returns true when `version` is older than the latest loaded migration.
    ///
    /// Always false for an empty chain.
    pub fn is_outdated(&self, version: &str) -> Result<bool, MigrateError> {
        let Some(latest) = self.registered.last() else {
            return Ok(false);
        };
        let version = parse_config_version(version)?;
        Ok(version.cmp_precedence(&latest.version) == Ordering::Less)
    }

    /// Versions a migration from `from` to `to` would apply, in order.
    ///
    /// Selects every loaded version strictly newer than `from` and not newer
    /// than `to`. `to` defaults to the latest version.
    pub fn pending(&self, from: &str, to: Option<&str>) -> Result<Vec<&str>, MigrateError> {
        Ok(self
            .select(from, to)?
            .into_iter()
            .map(|migration| migration.version())
            .collect())
    }

    /// Upgrades `config` to `to_version`, or to the latest version.
    pub fn migrate(
        &self,
        config: &JsonValue,
        to_version: Option<&str>,
    ) -> Result<JsonValue, MigrateError> {
        self.migrate_with(config, to_version, |_, _| {})
    }

    /// Like [`Migrator::migrate`], calling `on_step(previous, current)` after
    /// every applied migration.
    pub fn migrate_with<F>(
        &self,
        config: &JsonValue,
        to_version: Option<&str>,
        mut on_step: F,
    ) -> Result<JsonValue, MigrateError>
    where
        F: FnMut(&str, &str),
    {
        let from = config_version(config)?;
        let steps = self.select(from, to_version)?;

        let mut current = config.clone();
        for migration in steps {
            log::debug!("Applying migration {}", migration.version());
            let next = migration.migrate(&current)?;
            let previous = current
                .get(VERSION_KEY)
                .and_then(JsonValue::as_str)
                .unwrap_or_default();
            on_step(previous, migration.version());
            current = next;
        }
        Ok(current)
    }

    fn select(
        &self,
        from: &str,
        to: Option<&str>,
    ) -> Result<Vec<&Arc<dyn Migration>>, MigrateError> {
        let from = parse_config_version(from)?;
        let to = match to {
            Some(to) => Version::parse(to).map_err(|source| MigrateError::InvalidTargetVersion {
                version: to.to_string(),
                source,
            })?,
            None => match self.registered.last() {
                Some(latest) => latest.version.clone(),
                None => return Ok(Vec::new()),
            },
        };

        Ok(self
            .registered
            .iter()
            .filter(|entry| {
                entry.version.cmp_precedence(&from) == Ordering::Greater
                    && entry.version.cmp_precedence(&to) != Ordering::Greater
            })
            .map(|entry| &entry.migration)
            .collect())
    }
}

impl fmt::Debug for Migrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migrator")
            .field("versions", &self.versions().collect::<Vec<_>>())
            .finish()
    }
}

fn config_version(config: &JsonValue) -> Result<&str, MigrateError> {
    config
        .get(VERSION_KEY)
        .and_then(JsonValue::as_str)
        .ok_or(MigrateError::MissingVersion)
}

fn parse_config_version(version: &str) -> Result<Version, MigrateError> {
    Version::parse(version).map_err(|source| MigrateError::InvalidConfigVersion {
        version: version.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v1_v2() -> Arc<dyn Migration> {
        Arc::new(MigrationStep::new("2.0.0", None, |config| {
            let mut result = config.clone();
            result["scalar"] = json!(1);
            result["vector"] = json!([1]);
            result["useless"] = json!(true);
            Ok(result)
        }))
    }

    fn v2_v3() -> Arc<dyn Migration> {
        Arc::new(MigrationStep::new("3.0.0", Some(v1_v2()), |config| {
            let mut result = config.clone();
            result["scalar"] = json!(2);
            result["vector"] = json!([1, 2]);
            if let Some(map) = result.as_object_mut() {
                map.remove("useless");
            }
            Ok(result)
        }))
    }

    fn migrator() -> Migrator {
        Migrator::new(Some(v2_v3())).expect("chain should load")
    }

    struct Bare;

    impl Migration for Bare {
        fn version(&self) -> &str {
            "1.1.0"
        }

        fn head(&self) -> Option<Arc<dyn Migration>> {
            None
        }
    }

    #[test]
    fn loads_chain_and_reads_latest_version() {
        let migrator = migrator();
        assert_eq!(migrator.latest_version(), Some("3.0.0"));
        assert_eq!(migrator.versions().collect::<Vec<_>>(), ["2.0.0", "3.0.0"]);
        assert!(migrator.is_outdated("1.0.0").unwrap());
        assert!(!migrator.is_outdated("3.0.0").unwrap());
        assert!(!migrator.is_outdated("4.0.0").unwrap());
    }

    #[test]
    fn empty_chain_has_no_latest_version() {
        let migrator = Migrator::new(None).unwrap();
        assert_eq!(migrator.latest_version(), None);
        assert!(!migrator.is_outdated("0.0.1").unwrap());
        let config = json!({ "version": "1.0.0", "a": 1 });
        assert_eq!(migrator.migrate(&config, None).unwrap(), config);
    }

    #[test]
    fn full_upgrade_reports_every_step() {
        let migrator = migrator();
        let mut calls = Vec::new();
        let result = migrator
            .migrate_with(&json!({ "version": "1.0.0" }), None, |from, to| {
                calls.push((from.to_string(), to.to_string()));
            })
            .unwrap();
        assert_eq!(
            calls,
            [
                ("1.0.0".to_string(), "2.0.0".to_string()),
                ("2.0.0".to_string(), "3.0.0".to_string()),
            ]
        );
        assert_eq!(result, json!({ "version": "3.0.0", "scalar": 2, "vector": [1, 2] }));
    }

    #[test]
    fn partial_upgrade_stops_at_target() {
        let migrator = migrator();
        let mut calls = Vec::new();
        let result = migrator
            .migrate_with(&json!({ "version": "1.0.0" }), Some("2.1.0"), |from, to| {
                calls.push((from.to_string(), to.to_string()));
            })
            .unwrap();
        assert_eq!(calls, [("1.0.0".to_string(), "2.0.0".to_string())]);
        assert_eq!(
            result,
            json!({ "version": "2.0.0", "scalar": 1, "vector": [1], "useless": true })
        );
    }

    #[test]
    fn migrating_twice_is_idempotent() {
        let migrator = migrator();
        let once = migrator.migrate(&json!({ "version": "1.0.0" }), Some("3.0.0")).unwrap();
        let mut steps = 0;
        let twice = migrator
            .migrate_with(&once, Some("3.0.0"), |_, _| steps += 1)
            .unwrap();
        assert_eq!(steps, 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn input_config_is_left_untouched() {
        let config = json!({ "version": "1.0.0", "keep": "me" });
        let result = migrator().migrate(&config, None).unwrap();
        assert_eq!(config, json!({ "version": "1.0.0", "keep": "me" }));
        assert_eq!(result["keep"], json!("me"));
    }

    #[test]
    fn pending_orders_by_precedence() {
        let rc: Arc<dyn Migration> =
            Arc::new(MigrationStep::unimplemented("2.0.0-rc.1", Some(v1_v2())));
        let head: Arc<dyn Migration> =
            Arc::new(MigrationStep::unimplemented("2.0.0-beta.2", Some(rc)));
        let migrator = Migrator::new(Some(head)).unwrap();
        assert_eq!(migrator.latest_version(), Some("2.0.0"));
        assert_eq!(
            migrator.pending("1.0.0", None).unwrap(),
            ["2.0.0-beta.2", "2.0.0-rc.1", "2.0.0"]
        );
        assert_eq!(migrator.pending("2.0.0-beta.2", Some("2.0.0-rc.1")).unwrap(), ["2.0.0-rc.1"]);
    }

    #[test]
    fn rejects_invalid_versions() {
        let head: Arc<dyn Migration> =
            Arc::new(MigrationStep::unimplemented("3.0", Some(v1_v2())));
        let err = Migrator::new(Some(head)).unwrap_err();
        assert!(
            matches!(&err, MigrateError::InvalidVersion { version, .. } if version == "3.0"),
            "{err:?}"
        );
        assert_eq!(err.to_string(), "3.0 is not a valid version in MigrationStep");
    }

    #[test]
    fn rejects_repeated_versions() {
        let head: Arc<dyn Migration> =
            Arc::new(MigrationStep::unimplemented("2.0.0", Some(v1_v2())));
        let err = Migrator::new(Some(head)).unwrap_err();
        assert!(matches!(err, MigrateError::DuplicateVersion { .. }), "{err:?}");
    }

    #[test]
    fn default_upgrade_is_not_implemented() {
        let err = Bare.migrate(&json!({ "version": "1.0.0" })).unwrap_err();
        assert!(matches!(err, MigrateError::NotImplemented { version } if version == "1.1.0"));
        assert!(Bare.name().ends_with("Bare"));

        let migrator = Migrator::new(Some(Arc::new(Bare))).unwrap();
        assert!(migrator.migrate(&json!({ "version": "1.0.0" }), None).is_err());
    }

    #[test]
    fn migration_stamps_version() {
        let result = v1_v2().migrate(&json!({ "version": "0.1.0" })).unwrap();
        assert_eq!(result["version"], json!("2.0.0"));
    }

    #[test]
    fn rejects_configs_without_valid_version() {
        let migrator = migrator();
        assert!(matches!(
            migrator.migrate(&json!({}), None),
            Err(MigrateError::MissingVersion)
        ));
        assert!(matches!(
            migrator.migrate(&json!({ "version": "one" }), None),
            Err(MigrateError::InvalidConfigVersion { .. })
        ));
        assert!(matches!(
            migrator.migrate(&json!({ "version": "1.0.0" }), Some("latest")),
            Err(MigrateError::InvalidTargetVersion { .. })
        ));
    }

    #[test]
    fn upgrade_must_produce_mapping() {
        let head: Arc<dyn Migration> =
            Arc::new(MigrationStep::new("2.0.0", None, |_| Ok(json!([1, 2]))));
        let err = Migrator::new(Some(head))
            .unwrap()
            .migrate(&json!({ "version": "1.0.0" }), None)
            .unwrap_err();
        assert!(matches!(err, MigrateError::NotAMapping { .. }));
    }
}

//! Migrator configuration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{MigrateError, Result};

/// Project root; relative paths resolve against it.
pub const ROOT: &str = "root";
/// Directory holding model manifests.
pub const SRC: &str = "src";
/// Migration directory.
pub const LOCATION: &str = "location";
/// Namespace that qualifies short model type references.
pub const NAMESPACE: &str = "namespace";
/// Optional table prefix.
pub const PREFIX: &str = "prefix";

/// Validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Project root.
    pub root: PathBuf,
    /// Model manifest directory, as configured.
    pub src: PathBuf,
    /// Migration directory, as configured.
    pub location: PathBuf,
    /// Model namespace.
    pub namespace: String,
    /// Raw table prefix, if configured.
    pub prefix: Option<String>,
}

impl Config {
    /// Builds a configuration from key/value settings.
    ///
    /// `root`, `src`, `location` and `namespace` are required and must not
    /// be blank. `prefix` is optional; a blank prefix counts as none.
    pub fn from_settings<I, K, V>(settings: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let settings: HashMap<String, String> = settings
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let root = required(&settings, ROOT)?;
        let src = required(&settings, SRC)?;
        let location = required(&settings, LOCATION)?;
        let namespace = required(&settings, NAMESPACE)?;
        let prefix = settings
            .get(PREFIX)
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        Ok(Self {
            root: PathBuf::from(root),
            src: PathBuf::from(src),
            location: PathBuf::from(location),
            namespace,
            prefix,
        })
    }

    /// Returns the model manifest directory, resolved against the root.
    #[must_use]
    pub fn source_dir(&self) -> PathBuf {
        resolve(&self.root, &self.src)
    }

    /// Returns the migration directory, resolved against the root.
    #[must_use]
    pub fn migrations_dir(&self) -> PathBuf {
        resolve(&self.root, &self.location)
    }
}

fn required(settings: &HashMap<String, String>, key: &str) -> Result<String> {
    settings
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| MigrateError::Configuration {
            key: key.to_string(),
        })
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Vec<(&'static str, &'static str)> {
        vec![
            (ROOT, "/srv/app"),
            (SRC, "models"),
            (LOCATION, "/var/migrations"),
            (NAMESPACE, "App.Models"),
        ]
    }

    #[test]
    fn test_resolves_relative_paths_against_root() {
        let config = Config::from_settings(settings()).unwrap();
        assert_eq!(config.source_dir(), PathBuf::from("/srv/app/models"));
        assert_eq!(config.migrations_dir(), PathBuf::from("/var/migrations"));
        assert_eq!(config.prefix, None);
    }

    #[test]
    fn test_missing_key_fails() {
        let partial: Vec<_> = settings().into_iter().filter(|(k, _)| *k != LOCATION).collect();
        assert!(matches!(
            Config::from_settings(partial),
            Err(MigrateError::Configuration { key }) if key == LOCATION
        ));
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let mut values = settings();
        values.push((NAMESPACE, "  "));
        assert!(matches!(
            Config::from_settings(values),
            Err(MigrateError::Configuration { key }) if key == NAMESPACE
        ));
    }

    #[test]
    fn test_prefix_is_optional() {
        let mut values = settings();
        values.push((PREFIX, "Shop"));
        assert_eq!(
            Config::from_settings(values).unwrap().prefix.as_deref(),
            Some("Shop")
        );

        let mut values = settings();
        values.push((PREFIX, ""));
        assert_eq!(Config::from_settings(values).unwrap().prefix, None);
    }
}

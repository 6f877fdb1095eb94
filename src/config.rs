//! Session configuration
//!
//! Loaded from a JSON file when one is given, otherwise defaults that keep
//! all state in the per-user local data directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FurnishError, Result};
use crate::placement::ModelCatalog;

/// Directory name under the user's local data directory.
const APP_DIR: &str = "furnish";

/// File name of the persisted placement store.
pub const STORE_FILE: &str = "modelTransforms";

/// File name of the key-value settings file.
pub const SETTINGS_FILE: &str = "settings.json";

/// Settings key holding the saved map identifier.
pub const DEFAULT_MAP_ID_KEY: &str = "MapID";

/// Default sleep between engine readiness checks.
const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Upper bound on the readiness sleep; polling must stay responsive.
const MAX_POLL_INTERVAL_MS: u64 = 1_000;

/// Placements after which a mapping session is saved automatically.
const DEFAULT_REQUIRED_PLACEMENTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Where the placement store is persisted
    pub store_path: PathBuf,
    /// Where the key-value settings are persisted
    pub settings_path: PathBuf,
    /// Settings key for the saved map identifier
    pub map_id_key: String,
    /// Sleep between engine readiness checks, in milliseconds
    pub readiness_poll_interval_ms: u64,
    /// Save automatically once this many models are placed; `None` waits
    /// for an explicit save
    pub required_placements: Option<usize>,
    /// Placeable models
    pub catalog: ModelCatalog,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let base = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);
        Self::in_dir(&base)
    }
}

impl SessionConfig {
    /// Defaults with all persisted state under `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            store_path: dir.join(STORE_FILE),
            settings_path: dir.join(SETTINGS_FILE),
            map_id_key: DEFAULT_MAP_ID_KEY.to_string(),
            readiness_poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            required_placements: Some(DEFAULT_REQUIRED_PLACEMENTS),
            catalog: ModelCatalog::default(),
        }
    }

    /// Load and validate a JSON config file. Missing fields take defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| FurnishError::ConfigError {
            reason: format!("cannot read {}: {}", path.display(), e),
        })?;
        let config: SessionConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.readiness_poll_interval_ms == 0
            || self.readiness_poll_interval_ms > MAX_POLL_INTERVAL_MS
        {
            return Err(FurnishError::ConfigError {
                reason: format!(
                    "readiness_poll_interval_ms must be between 1 and {}, got {}",
                    MAX_POLL_INTERVAL_MS, self.readiness_poll_interval_ms
                ),
            });
        }
        if self.required_placements == Some(0) {
            return Err(FurnishError::ConfigError {
                reason: "required_placements must be at least 1".to_string(),
            });
        }
        if self.catalog.is_empty() {
            return Err(FurnishError::ConfigError {
                reason: "catalog must contain at least one model".to_string(),
            });
        }
        if self.map_id_key.is_empty() {
            return Err(FurnishError::ConfigError {
                reason: "map_id_key must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn readiness_poll_interval(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = SessionConfig::default();
        config.validate().unwrap();
        assert!(config.store_path.ends_with("furnish/modelTransforms"));
        assert_eq!(config.map_id_key, "MapID");
        assert_eq!(config.required_placements, Some(3));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        fs::write(
            &path,
            r#"{ "readiness_poll_interval_ms": 10, "required_placements": null }"#,
        )
        .unwrap();

        let config = SessionConfig::load(&path).unwrap();
        assert_eq!(config.readiness_poll_interval(), Duration::from_millis(10));
        assert_eq!(config.required_placements, None);
        assert_eq!(config.catalog.len(), 3);
    }

    #[test]
    fn test_rejects_unbounded_poll_interval() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{ "readiness_poll_interval_ms": 0 }"#).unwrap();

        let err = SessionConfig::load(&path).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let temp = tempdir().unwrap();
        let err = SessionConfig::load(&temp.path().join("absent.json")).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }
}

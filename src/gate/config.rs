//! Gate configuration
//!
//! Loaded from a JSON file. Every field except `schema_dir` has a default;
//! access defaults are restrictive (create and delete need level 1).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::acl::{AccessDefaults, AccessLevel, Action};
use crate::observability::{Event, Logger, Severity};
use crate::schema::{DEFAULT_VERSION_KEY, ID_FIELD};

use super::errors::{GateError, GateResult};

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Directory holding `*.json` schema files (required)
    pub schema_dir: PathBuf,

    /// Levels for fields without an annotation
    #[serde(default = "default_access")]
    pub defaults: AccessDefaults,

    /// Page size when a request names none (default 25)
    #[serde(default = "default_limit")]
    pub limit: u64,

    /// Largest page size a request may ask for (default 500)
    #[serde(default = "default_read_limit")]
    pub read_limit: u64,

    /// Version counter field for schemas that do not name one
    #[serde(default = "default_version_key")]
    pub version_key: String,

    /// Minimum log severity (default "warn")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_access() -> AccessDefaults {
    AccessDefaults {
        create: 1,
        read: 0,
        update: 0,
        delete: 1,
    }
}
fn default_limit() -> u64 {
    25
}
fn default_read_limit() -> u64 {
    500
}
fn default_version_key() -> String {
    DEFAULT_VERSION_KEY.to_string()
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl GateConfig {
    /// Creates a configuration with defaults for everything but the schema directory.
    pub fn new(schema_dir: impl Into<PathBuf>) -> Self {
        Self {
            schema_dir: schema_dir.into(),
            defaults: default_access(),
            limit: default_limit(),
            read_limit: default_read_limit(),
            version_key: default_version_key(),
            log_level: default_log_level(),
        }
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> GateResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| GateError::Config(format!("Failed to read config: {}", e)))?;

        let config: GateConfig = serde_json::from_str(&content)
            .map_err(|e| GateError::Config(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Logger::info(
            Event::ConfigLoaded,
            &[
                ("path", path.display().to_string().as_str()),
                ("schema_dir", config.schema_dir.display().to_string().as_str()),
            ],
        );

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> GateResult<()> {
        if self.read_limit == 0 {
            return Err(GateError::Config("read_limit must be > 0".into()));
        }

        if self.limit > self.read_limit {
            return Err(GateError::Config(format!(
                "limit ({}) must not exceed read_limit ({})",
                self.limit, self.read_limit
            )));
        }

        if self.version_key.is_empty() || self.version_key == ID_FIELD {
            return Err(GateError::Config(format!(
                "Invalid version_key: '{}'",
                self.version_key
            )));
        }

        self.log_severity()?;

        Ok(())
    }

    /// Parsed `log_level`
    pub fn log_severity(&self) -> GateResult<Severity> {
        self.log_level.parse::<Severity>().map_err(GateError::Config)
    }

    /// Default level for one action
    pub fn default_level(&self, action: Action) -> AccessLevel {
        self.defaults.level(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_config(temp_dir: &TempDir, value: serde_json::Value) -> PathBuf {
        let path = temp_dir.path().join("fieldgate.json");
        fs::write(&path, value.to_string()).unwrap();
        path
    }

    #[test]
    fn test_config_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(&temp_dir, json!({"schema_dir": "schemas"}));

        let config = GateConfig::load(&path).unwrap();
        assert_eq!(config.limit, 25);
        assert_eq!(config.read_limit, 500);
        assert_eq!(config.version_key, "__v");
        assert_eq!(config.defaults.create, 1);
        assert_eq!(config.defaults.delete, 1);
        assert_eq!(config.defaults.read, 0);
        assert_eq!(config.log_severity().unwrap(), Severity::Warn);
        assert_eq!(config, GateConfig::new("schemas"));
    }

    #[test]
    fn test_partial_defaults_fill_in() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(
            &temp_dir,
            json!({"schema_dir": "s", "defaults": {"read": 2}}),
        );
        let config = GateConfig::load(&path).unwrap();
        assert_eq!(config.defaults.read, 2);
        assert_eq!(config.defaults.update, 0);
        assert_eq!(config.defaults.create, 1);
        assert_eq!(config.defaults.delete, 1);

        let path = write_config(
            &temp_dir,
            json!({"schema_dir": "s", "defaults": {"create": 0}}),
        );
        let config = GateConfig::load(&path).unwrap();
        assert_eq!(config.defaults.create, 0);
        assert_eq!(config.defaults.delete, 1);
    }

    #[test]
    fn test_config_validates_limits() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(
            &temp_dir,
            json!({"schema_dir": "s", "limit": 50, "read_limit": 10}),
        );
        let err = GateConfig::load(&path).unwrap_err();
        assert_eq!(err.code(), "FG_CONFIG_INVALID");

        let path = write_config(&temp_dir, json!({"schema_dir": "s", "read_limit": 0}));
        assert!(GateConfig::load(&path).is_err());
    }

    #[test]
    fn test_config_validates_log_level() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(&temp_dir, json!({"schema_dir": "s", "log_level": "loud"}));
        assert!(GateConfig::load(&path).is_err());
    }

    #[test]
    fn test_config_requires_schema_dir() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(&temp_dir, json!({"limit": 5}));
        assert!(GateConfig::load(&path).is_err());
    }
}

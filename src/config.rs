//! Configuration for the application statistics aggregator.

use crate::sink::DEFAULT_LOG_FILE_NAME;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default rollover size of the statistics log (20 MiB).
pub const DEFAULT_ROLLOVER_SIZE: u64 = 20 * 1024 * 1024;

/// Main configuration for the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Whether statistics are collected at all
    pub enabled: bool,

    /// Width of each statistics bucket
    #[serde(with = "duration_serde")]
    pub window_duration: Duration,

    /// Log size in bytes at which the sink rolls over to a new file
    pub rollover_size: u64,

    /// Directory holding the statistics log
    pub log_dir: PathBuf,

    /// File name of the statistics log
    pub log_file_name: String,

    /// Maximum distinct applications per bucket; unlimited when unset
    pub max_records_per_bucket: Option<usize>,

    /// Path for storing telemetry
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("appid-stats");

        Self {
            enabled: true,
            window_duration: Duration::from_secs(300),
            rollover_size: DEFAULT_ROLLOVER_SIZE,
            log_dir: data_dir.join("logs"),
            log_file_name: DEFAULT_LOG_FILE_NAME.to_string(),
            max_records_per_bucket: None,
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("appid-stats")
            .join("config.json")
    }

    /// Path of the persisted telemetry counters.
    pub fn telemetry_path(&self) -> PathBuf {
        self.data_path.join("telemetry.json")
    }

    /// Bucket width in whole seconds.
    pub fn window_secs(&self) -> i64 {
        i64::try_from(self.window_duration.as_secs()).unwrap_or(i64::MAX)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_duration.as_secs() == 0 {
            return Err(ConfigError::Invalid(
                "window_duration must be at least one second".to_string(),
            ));
        }
        if self.log_file_name.is_empty() {
            return Err(ConfigError::Invalid("log_file_name must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.enabled);
        assert_eq!(config.window_duration, Duration::from_secs(300));
        assert_eq!(config.rollover_size, 20 * 1024 * 1024);
        assert_eq!(config.log_file_name, "appid_stats.log");
        assert!(config.max_records_per_bucket.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"window_duration": 60, "enabled": false}"#).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.window_secs(), 60);
        assert_eq!(config.rollover_size, DEFAULT_ROLLOVER_SIZE);
    }

    #[test]
    fn test_zero_window_rejected() {
        let config = Config {
            window_duration: Duration::from_secs(0),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_save_and_load_from() {
        let path = std::env::temp_dir()
            .join(format!("appid-stats-config-{}", std::process::id()))
            .join("config.json");

        let config = Config {
            window_duration: Duration::from_secs(60),
            rollover_size: 4096,
            max_records_per_bucket: Some(10),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = std::fs::remove_file(path);
    }
}

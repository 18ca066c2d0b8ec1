//! Configuration for the Vakaru pixel.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default ingestion endpoint for event batches.
pub const DEFAULT_ENDPOINT: &str = "https://api.vakaru.com/events/ingest";

/// Main configuration for the pixel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Number of buffered events that triggers a flush
    pub buffer_size: usize,

    /// Interval of the periodic flush timer
    #[serde(with = "duration_ms_serde")]
    pub flush_interval: Duration,

    /// How many event types to rank in flush diagnostics
    pub top_events: usize,

    /// Storefront account this pixel reports for
    #[serde(default)]
    pub account_id: Option<String>,

    /// Source tag stamped into every batch
    pub source: String,

    /// Batch schema version
    pub schema_version: String,

    /// Ingestion endpoint for the gateway sink
    pub endpoint: String,

    /// Path for identity and delivery state
    pub data_path: PathBuf,

    /// Path for exported batches
    pub export_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vakaru-pixel");

        Self {
            buffer_size: 10,
            flush_interval: Duration::from_millis(5000),
            top_events: 3,
            account_id: None,
            source: "shopify_web_pixel".to_string(),
            schema_version: "1.0.0".to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            export_path: data_dir.join("exports"),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit file, falling back to defaults if it is missing.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vakaru-pixel")
            .join("config.json")
    }

    /// Reject settings the flush controller cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "buffer_size must be at least 1".to_string(),
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "flush_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// File backing the persisted user identifier.
    pub fn identity_path(&self) -> PathBuf {
        self.data_path.join("identity.json")
    }

    /// File backing the cumulative delivery counters.
    pub fn delivery_log_path(&self) -> PathBuf {
        self.data_path.join("delivery.json")
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

/// Serde support for millisecond durations.
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.buffer_size, 10);
        assert_eq!(config.flush_interval, Duration::from_millis(5000));
        assert_eq!(config.top_events, 3);
        assert_eq!(config.source, "shopify_web_pixel");
        assert_eq!(config.schema_version, "1.0.0");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flush_interval_serialized_as_millis() {
        let config = Config {
            flush_interval: Duration::from_millis(250),
            ..Config::default()
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["flush_interval"], 250);

        let back: Config = serde_json::from_value(json).unwrap();
        assert_eq!(back.flush_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = Config {
            buffer_size: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = Config {
            flush_interval: Duration::ZERO,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("vakaru-pixel-missing-config.json");
        let _ = std::fs::remove_file(&path);
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.buffer_size, 10);
    }
}

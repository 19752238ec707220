//! Configuration loading for sync-backend.
//!
//! Configuration is loaded from a TOML file (default: `backend.toml`). Every
//! section is optional and falls back to its defaults.

use serde::Deserialize;
use std::path::PathBuf;
use ventsync_core::SchedulesConfig;

/// Root configuration for sync-backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Driver configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Event log configuration.
    #[serde(default)]
    pub log: LogConfig,
    /// Connection timeout configuration.
    #[serde(default)]
    pub connections: ConnectionsConfig,
    /// State file configuration.
    #[serde(default)]
    pub files: FilesConfig,
    /// Output schedule of every destination.
    #[serde(default)]
    pub schedules: SchedulesConfig,
}

/// Driver configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Clock tick interval in milliseconds (default: 2).
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Capacity of the inbound event queue (default: 256).
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// Event log configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Maximum number of events retained for the frontend (default: 10000).
    #[serde(default = "default_log_capacity")]
    pub capacity: usize,
    /// Maximum number of events per segment (default: 256).
    #[serde(default = "default_segment_len")]
    pub segment_len: usize,
}

/// Connection timeout configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionsConfig {
    /// Seconds without data before the device counts as unresponsive (default: 0.5).
    #[serde(default = "default_mcu_timeout")]
    pub mcu_timeout_secs: f64,
    /// Seconds without data before the frontend counts as unresponsive (default: 2).
    #[serde(default = "default_frontend_timeout")]
    pub frontend_timeout_secs: f64,
}

/// State file configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    /// Directory holding one file per persisted message type (default: `state`).
    #[serde(default = "default_files_directory")]
    pub directory: PathBuf,
}

// Default value functions
fn default_tick_interval_ms() -> u64 {
    2
}

fn default_queue_capacity() -> usize {
    256
}

fn default_log_capacity() -> usize {
    10_000
}

fn default_segment_len() -> usize {
    256
}

fn default_mcu_timeout() -> f64 {
    0.5
}

fn default_frontend_timeout() -> f64 {
    2.0
}

fn default_files_directory() -> PathBuf {
    PathBuf::from("state")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            capacity: default_log_capacity(),
            segment_len: default_segment_len(),
        }
    }
}

impl Default for ConnectionsConfig {
    fn default() -> Self {
        Self {
            mcu_timeout_secs: default_mcu_timeout(),
            frontend_timeout_secs: default_frontend_timeout(),
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            directory: default_files_directory(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "server.tick_interval_ms must be positive".to_string(),
            ));
        }
        if self.server.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "server.queue_capacity must be positive".to_string(),
            ));
        }
        if self.log.capacity == 0 || self.log.segment_len == 0 {
            return Err(ConfigError::Invalid(
                "log.capacity and log.segment_len must be positive".to_string(),
            ));
        }
        for (name, timeout) in [
            ("mcu_timeout_secs", self.connections.mcu_timeout_secs),
            ("frontend_timeout_secs", self.connections.frontend_timeout_secs),
        ] {
            if !timeout.is_finite() || timeout <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "connections.{name} must be positive, got {timeout}"
                )));
            }
        }
        for (name, schedule) in [
            ("mcu", &self.schedules.mcu),
            ("frontend", &self.schedules.frontend),
            ("file", &self.schedules.file),
        ] {
            schedule
                .validate()
                .map_err(|e| ConfigError::Invalid(format!("schedules.{name}: {e}")))?;
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Configuration parsed but is unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use ventsync_core::{StateSegment, SubSchedule};

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.server.tick_interval_ms, 2);
        assert_eq!(config.log.segment_len, 256);
        assert_eq!(config.connections.mcu_timeout_secs, 0.5);
        assert_eq!(config.files.directory, PathBuf::from("state"));
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[server]
tick_interval_ms = 5

[log]
capacity = 100

[connections]
frontend_timeout_secs = 3.5

[files]
directory = "/var/lib/ventsync"

[schedules.file]
min_interval = 1.0
root = ["main"]
main = ["parameters"]
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.tick_interval_ms, 5);
        assert_eq!(config.server.queue_capacity, 256);
        assert_eq!(config.log.capacity, 100);
        assert_eq!(config.log.segment_len, 256);
        assert_eq!(config.connections.frontend_timeout_secs, 3.5);
        assert_eq!(config.files.directory, PathBuf::from("/var/lib/ventsync"));
        assert_eq!(config.schedules.file.root, vec![SubSchedule::Main]);
        assert_eq!(config.schedules.file.main, vec![StateSegment::Parameters]);
        // Untouched destinations keep their defaults.
        assert_eq!(config.schedules.mcu, ventsync_core::ScheduleConfig::mcu());
        config.validate().unwrap();
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.log.capacity, 10_000);
        config.validate().unwrap();
    }

    #[test]
    fn zero_values_are_invalid() {
        let mut config = Config::default();
        config.log.segment_len = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.connections.mcu_timeout_secs = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.schedules.frontend.root.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("schedules.frontend"));
    }

    #[test]
    fn from_file_reads_and_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\ntick_interval_ms = 10").unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.tick_interval_ms, 10);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\ntick_interval_ms = 0").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn missing_and_malformed_files_are_reported() {
        let missing = Config::from_file(std::path::Path::new("/nonexistent/backend.toml"));
        assert!(matches!(missing, Err(ConfigError::ReadError { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\n").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }
}

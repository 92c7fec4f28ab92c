//! Manager configuration
//!
//! Loaded from the `[hyperv]` table of a TOML file. Every field has a
//! default, so an empty table (or no file at all) is a valid configuration.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::powershell::DEFAULT_PROGRAM;
use crate::service::{DEFAULT_POLL_INTERVAL, DEFAULT_SERVICE_NAME, DEFAULT_TRANSITION_TIMEOUT};

/// Configuration of the PowerShell-backed manager
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ManagerConfig {
    /// PowerShell program used for pipelines and service control
    /// (default: powershell)
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Management service settings
    #[serde(default)]
    pub service: ServiceSettings,
}

/// Readiness gate settings
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServiceSettings {
    /// Name of the management service (default: vmms)
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Bound on each status transition wait, in seconds (default: 3)
    #[serde(default = "default_transition_timeout_secs")]
    pub transition_timeout_secs: u64,

    /// Status polling interval, in milliseconds (default: 250)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_shell() -> String {
    DEFAULT_PROGRAM.to_string()
}

fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}

fn default_transition_timeout_secs() -> u64 {
    DEFAULT_TRANSITION_TIMEOUT.as_secs()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            service: ServiceSettings::default(),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            transition_timeout_secs: default_transition_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ServiceSettings {
    pub fn transition_timeout(&self) -> Duration {
        Duration::from_secs(self.transition_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Only the `[hyperv]` table is read; other tables are ignored.
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    hyperv: ManagerConfig,
}

impl ManagerConfig {
    /// Load the `[hyperv]` table from a TOML file
    ///
    /// If the file doesn't exist, returns default configuration.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Parse the `[hyperv]` table out of a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<ConfigFile>(content).map(|file| file.hyperv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ManagerConfig::default();
        assert_eq!(config.shell, "powershell");
        assert_eq!(config.service.name, "vmms");
        assert_eq!(config.service.transition_timeout(), Duration::from_secs(3));
        assert_eq!(config.service.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
            [server]
            port = 8080

            [hyperv.service]
            transition_timeout_secs = 10
        "#;
        let config = ManagerConfig::from_toml(toml).unwrap();
        assert_eq!(config.shell, "powershell"); // default
        assert_eq!(config.service.name, "vmms"); // default
        assert_eq!(config.service.transition_timeout_secs, 10);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [hyperv]
            shell = "pwsh"

            [hyperv.service]
            name = "vmcompute"
            transition_timeout_secs = 5
            poll_interval_ms = 50
        "#;
        let config = ManagerConfig::from_toml(toml).unwrap();
        assert_eq!(config.shell, "pwsh");
        assert_eq!(config.service.name, "vmcompute");
        assert_eq!(config.service.poll_interval(), Duration::from_millis(50));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ManagerConfig::load("does/not/exist/hvops.toml").unwrap();
        assert_eq!(config, ManagerConfig::default());
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let dir = std::env::temp_dir().join(format!("hvops-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        std::fs::write(&path, "[hyperv\nshell = ").unwrap();

        let err = ManagerConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}

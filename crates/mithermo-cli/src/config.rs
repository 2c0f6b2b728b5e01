//! Configuration file management.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use mithermo_core::{ConnectionMode, SessionConfig};
use serde::{Deserialize, Serialize};

/// Configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Default device address
    #[serde(default)]
    pub device: Option<String>,

    /// Default connection mode for `read`
    #[serde(default)]
    pub mode: Option<ConnectionMode>,

    /// Disable colored output
    #[serde(default)]
    pub no_color: bool,

    /// Use Fahrenheit for temperature
    #[serde(default)]
    pub fahrenheit: bool,

    /// Connection timeout in seconds
    #[serde(default)]
    pub timeout: Option<u64>,

    /// Scan duration in seconds
    #[serde(default)]
    pub scan_duration: Option<u64>,

    /// Device aliases (friendly name -> device address)
    #[serde(default)]
    pub aliases: HashMap<String, String>,

    /// Session tuning
    #[serde(default)]
    pub session: SessionSection,
}

/// `[session]` table, mirrored onto [`SessionConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    #[serde(default = "default_settings_attempts")]
    pub settings_attempts: u32,

    /// Pause between subscribing to the command channel and writing, in milliseconds
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// How long to wait for the settings notification, in milliseconds
    #[serde(default = "default_settings_timeout_ms")]
    pub settings_timeout_ms: u64,

    /// Record the time of every successful read
    #[serde(default)]
    pub time_tracking: bool,
}

fn default_connect_attempts() -> u32 {
    5
}

fn default_settings_attempts() -> u32 {
    5
}

fn default_settle_delay_ms() -> u64 {
    1000
}

fn default_settings_timeout_ms() -> u64 {
    5000
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            connect_attempts: default_connect_attempts(),
            settings_attempts: default_settings_attempts(),
            settle_delay_ms: default_settle_delay_ms(),
            settings_timeout_ms: default_settings_timeout_ms(),
            time_tracking: false,
        }
    }
}

impl SessionSection {
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig::new()
            .connect_attempts(self.connect_attempts)
            .settings_attempts(self.settings_attempts)
            .settle_delay(Duration::from_millis(self.settle_delay_ms))
            .settings_timeout(Duration::from_millis(self.settings_timeout_ms))
            .time_tracking(self.time_tracking)
    }
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mithermo")
            .join("config.toml")
    }

    /// Load config from `path`, or return default
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config: {}", e);
                    }
                },
                Err(e) => {
                    eprintln!("Warning: Failed to read config: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Save config to `path`, creating its directory
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }
}

/// Resolve device from argument or config, expanding aliases.
pub fn resolve_device(device: Option<String>, config: &Config) -> Option<String> {
    device
        .or_else(|| config.device.clone())
        .map(|d| resolve_alias(&d, config))
}

/// Resolve a device alias to its address, or return the input unchanged.
pub fn resolve_alias(device: &str, config: &Config) -> String {
    config
        .aliases
        .get(device)
        .cloned()
        .unwrap_or_else(|| device.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.device.is_none());
        assert!(config.mode.is_none());
        assert!(!config.fahrenheit);
        assert_eq!(config.session.connect_attempts, 5);
        assert_eq!(config.session.settle_delay_ms, 1000);
        assert_eq!(config.session.to_session_config(), SessionConfig::default());
    }

    #[test]
    fn test_parse_partial_config() {
        let config: Config = toml::from_str(
            r#"
            device = "kitchen"
            mode = "notification"

            [aliases]
            kitchen = "A4:C1:38:0A:1B:2C"

            [session]
            settle_delay_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.mode, Some(ConnectionMode::Notification));
        assert_eq!(config.session.settle_delay_ms, 250);
        assert_eq!(config.session.connect_attempts, 5);
        assert_eq!(
            resolve_device(None, &config).as_deref(),
            Some("A4:C1:38:0A:1B:2C")
        );
    }

    #[test]
    fn test_resolve_device_prefers_argument() {
        let mut config = Config {
            device: Some("A4:C1:38:00:00:01".to_string()),
            ..Default::default()
        };
        config
            .aliases
            .insert("office".to_string(), "A4:C1:38:00:00:02".to_string());

        assert_eq!(
            resolve_device(Some("office".to_string()), &config).as_deref(),
            Some("A4:C1:38:00:00:02")
        );
        assert_eq!(
            resolve_device(Some("A4:C1:38:00:00:03".to_string()), &config).as_deref(),
            Some("A4:C1:38:00:00:03")
        );
        assert_eq!(resolve_device(None, &Config::default()), None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config {
            fahrenheit: true,
            timeout: Some(15),
            ..Default::default()
        };
        config
            .aliases
            .insert("bedroom".to_string(), "A4:C1:38:11:22:33".to_string());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path);
        assert!(loaded.fahrenheit);
        assert_eq!(loaded.timeout, Some(15));
        assert_eq!(loaded.aliases["bedroom"], "A4:C1:38:11:22:33");
    }

    #[test]
    fn test_invalid_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "device = [").unwrap();

        let config = Config::load_from(&path);
        assert!(config.device.is_none());
    }

    #[test]
    fn test_session_section_maps_onto_session_config() {
        let section = SessionSection {
            connect_attempts: 7,
            settle_delay_ms: 100,
            time_tracking: true,
            ..Default::default()
        };
        let config = section.to_session_config();
        assert_eq!(config.connect_retry.attempts(), 7);
        assert_eq!(config.settle_delay, Duration::from_millis(100));
        assert!(config.time_tracking);
        assert!(config.validate().is_ok());
    }
}

//! Configuration file support for t5flash.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (T5FLASH_*)
//! 3. Local config file (./t5flash.toml)
//! 4. Global config file (~/.config/t5flash/config.toml)

use anyhow::{Context, Result};
use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use t5flash::{PlatformCategory, PlatformConfig, StrategyId};

/// Local configuration file name.
pub const LOCAL_CONFIG_FILE: &str = "t5flash.toml";

/// `[port]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortSection {
    /// Preferred serial port (e.g., "/dev/ttyUSB0" or "COM3").
    pub serial: Option<String>,
    /// Baud rate.
    pub baud: Option<u32>,
}

/// `[reset]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResetSection {
    /// Platform override (windows, linux, macos, unknown).
    pub platform: Option<String>,
    /// Strategy to try first when nothing has succeeded yet.
    pub preferred_strategy: Option<String>,
    /// Strategy known to work on this board; tried before anything else.
    pub prior_strategy: Option<String>,
    /// Reset hold in milliseconds.
    pub reset_hold_ms: Option<u64>,
    /// Link-check read deadline in milliseconds.
    pub link_check_timeout_ms: Option<u64>,
    /// Link-check exchanges per strategy.
    pub max_retries: Option<u32>,
    /// Full sequences to run before giving up.
    pub rounds: Option<u32>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Port settings.
    #[serde(default)]
    pub port: PortSection,
    /// Reset tuning.
    #[serde(default)]
    pub reset: ResetSection,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(global_path) = Self::global_config_path() {
            if let Some(global) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global);
            }
        }

        if let Some(local) = Self::load_from_file(Path::new(LOCAL_CONFIG_FILE)) {
            debug!("Loaded local config from {LOCAL_CONFIG_FILE}");
            config.merge(local);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "t5flash").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one; set fields in `other` win.
    fn merge(&mut self, other: Self) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut self.port.serial, other.port.serial);
        take(&mut self.port.baud, other.port.baud);

        let reset = other.reset;
        take(&mut self.reset.platform, reset.platform);
        take(&mut self.reset.preferred_strategy, reset.preferred_strategy);
        take(&mut self.reset.prior_strategy, reset.prior_strategy);
        take(&mut self.reset.reset_hold_ms, reset.reset_hold_ms);
        take(&mut self.reset.link_check_timeout_ms, reset.link_check_timeout_ms);
        take(&mut self.reset.max_retries, reset.max_retries);
        take(&mut self.reset.rounds, reset.rounds);
    }

    /// Configured platform override, if any.
    pub fn platform(&self) -> Result<Option<PlatformCategory>> {
        self.reset
            .platform
            .as_deref()
            .map(str::parse)
            .transpose()
            .context("invalid [reset] platform")
    }

    /// Configured prior strategy, if any.
    pub fn prior_strategy(&self) -> Result<Option<StrategyId>> {
        self.reset
            .prior_strategy
            .as_deref()
            .map(str::parse)
            .transpose()
            .context("invalid [reset] prior_strategy")
    }

    /// Built-in tuning for `platform` with `[reset]` overrides applied.
    pub fn platform_config(&self, platform: PlatformCategory) -> Result<PlatformConfig> {
        let mut config = platform.config();

        if let Some(name) = &self.reset.preferred_strategy {
            let strategy = name
                .parse()
                .context("invalid [reset] preferred_strategy")?;
            config = config.with_preferred_strategy(strategy);
        }
        if let Some(ms) = self.reset.reset_hold_ms {
            config = config.with_reset_hold(Duration::from_millis(ms));
        }
        if let Some(ms) = self.reset.link_check_timeout_ms {
            config = config.with_link_check_timeout(Duration::from_millis(ms));
        }
        if let Some(retries) = self.reset.max_retries {
            config = config.with_max_retries(retries);
        }

        config
            .validate()
            .context("invalid [reset] section")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.port.serial.is_none());
        assert!(config.port.baud.is_none());
        assert!(config.reset.platform.is_none());
        assert!(config.reset.rounds.is_none());
    }

    #[test]
    fn test_merge_overrides_set_fields_only() {
        let mut base = Config::default();
        base.port.serial = Some("/dev/ttyUSB0".to_string());
        base.reset.max_retries = Some(5);

        let mut other = Config::default();
        other.port.baud = Some(460800);
        other.reset.max_retries = Some(12);

        base.merge(other);

        assert_eq!(base.port.serial.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(base.port.baud, Some(460800));
        assert_eq!(base.reset.max_retries, Some(12));
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
[port]
serial = "/dev/ttyUSB0"
baud = 921600

[reset]
platform = "linux"
preferred_strategy = "dtr_only"
prior_strategy = "separated"
link_check_timeout_ms = 50
max_retries = 8
rounds = 3
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.port.serial.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(config.platform().unwrap(), Some(PlatformCategory::Linux));
        assert_eq!(config.prior_strategy().unwrap(), Some(StrategyId::Separated));
        assert_eq!(config.reset.rounds, Some(3));

        let tuned = config
            .platform_config(PlatformCategory::Linux)
            .unwrap();
        assert_eq!(tuned.preferred_strategy, StrategyId::DtrOnly);
        assert_eq!(tuned.link_check_timeout, Duration::from_millis(50));
        assert_eq!(tuned.max_retries, 8);
        assert_eq!(tuned.reset_hold, PlatformCategory::Linux.config().reset_hold);
    }

    #[test]
    fn test_config_from_empty_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.port.serial.is_none());
        assert_eq!(
            config
                .platform_config(PlatformCategory::Windows)
                .unwrap(),
            PlatformCategory::Windows.config()
        );
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let mut config = Config::default();
        config.reset.preferred_strategy = Some("sideways".to_string());
        assert!(config.platform_config(PlatformCategory::Linux).is_err());

        let mut config = Config::default();
        config.reset.max_retries = Some(0);
        assert!(config.platform_config(PlatformCategory::Linux).is_err());

        let mut config = Config::default();
        config.reset.platform = Some("amiga".to_string());
        assert!(config.platform().is_err());
    }

    #[test]
    fn test_load_from_path_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t5flash.toml");
        fs::write(
            &path,
            r#"
[port]
serial = "COM7"
[reset]
rounds = 2
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path);
        assert_eq!(config.port.serial.as_deref(), Some("COM7"));
        assert_eq!(config.reset.rounds, Some(2));
    }

    #[test]
    fn test_load_from_path_nonexistent() {
        let config = Config::load_from_path(Path::new("/nonexistent/path/config.toml"));
        assert!(config.port.serial.is_none());
    }

    #[test]
    fn test_global_config_path() {
        if let Some(p) = Config::global_config_path() {
            assert!(p.to_string_lossy().contains("t5flash"));
            assert!(p.to_string_lossy().ends_with("config.toml"));
        }
    }
}

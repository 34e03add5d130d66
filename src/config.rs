//! Configuration management module.

use crate::gateway::GatewaySettings;
use crate::gsm::DriverTimings;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration load result.
#[derive(Debug)]
pub enum ConfigLoadResult {
    /// Config loaded successfully.
    Loaded(GatewayConfig),
    /// Config file missing (first run).
    Missing,
    /// Config file exists but invalid.
    Invalid(ConfigError),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Main gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub modem: ModemConfig,
    pub terminal: TerminalConfig,
    pub storage: StorageConfig,
    pub gateway: GatewayTuning,
    pub logging: LoggingConfig,
}

/// Serial link to the GSM modem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModemConfig {
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Power the GNSS receiver during init.
    #[serde(default = "default_true")]
    pub gnss: bool,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_boot_drain_ms")]
    pub boot_drain_ms: u64,
    #[serde(default = "default_power_cycle_pause_ms")]
    pub power_cycle_pause_ms: u64,
    /// DTR pulse that toggles the modem's power key.
    #[serde(default = "default_power_pulse_ms")]
    pub power_pulse_ms: u64,
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_true() -> bool {
    true
}

fn default_settle_delay_ms() -> u64 {
    5_000
}

fn default_boot_drain_ms() -> u64 {
    3_000
}

fn default_power_cycle_pause_ms() -> u64 {
    2_000
}

fn default_power_pulse_ms() -> u64 {
    1_200
}

/// RS-485 terminal. Without a port the terminal talks over stdin/stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    pub port: Option<String>,
    #[serde(default = "default_terminal_baud_rate")]
    pub baud_rate: u32,
}

fn default_terminal_baud_rate() -> u32 {
    9_600
}

/// Where the commander list is kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
}

/// Gateway loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayTuning {
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
    #[serde(default = "default_view_fast_period_ms")]
    pub view_fast_period_ms: u64,
    #[serde(default = "default_view_slow_period_ms")]
    pub view_slow_period_ms: u64,
    #[serde(default = "default_status_poll_ms")]
    pub status_poll_ms: u64,
    /// Enroll callers only after `ADD` or while the list is empty.
    #[serde(default)]
    pub enroll_requires_learning: bool,
}

fn default_max_failures() -> u32 {
    5
}

fn default_view_fast_period_ms() -> u64 {
    500
}

fn default_view_slow_period_ms() -> u64 {
    5_000
}

fn default_status_poll_ms() -> u64 {
    500
}

/// Rolling log files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub directory: Option<PathBuf>,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

fn default_file_prefix() -> String {
    "relay-gateway.log".to_string()
}

impl GatewayConfig {
    /// Get config file path (same directory as executable).
    pub fn default_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Attempt to load config with detailed result.
    pub fn try_load(path: &Path) -> ConfigLoadResult {
        if !path.exists() {
            return ConfigLoadResult::Missing;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<GatewayConfig>(&content) {
                Ok(config) => match config.validate() {
                    Ok(()) => ConfigLoadResult::Loaded(config),
                    Err(e) => ConfigLoadResult::Invalid(e),
                },
                Err(e) => ConfigLoadResult::Invalid(ConfigError::Parse(e)),
            },
            Err(e) => ConfigLoadResult::Invalid(ConfigError::Read(e)),
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.modem.port.trim().is_empty() {
            return Err(ConfigError::Validation("Modem port cannot be empty".to_string()));
        }
        if self.modem.baud_rate == 0 {
            return Err(ConfigError::Validation(
                "Modem baud rate must be greater than 0".to_string(),
            ));
        }
        if let Some(port) = &self.terminal.port {
            if port.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "Terminal port cannot be empty when set".to_string(),
                ));
            }
        }
        if self.terminal.baud_rate == 0 {
            return Err(ConfigError::Validation(
                "Terminal baud rate must be greater than 0".to_string(),
            ));
        }
        if self.gateway.max_failures < 1 {
            return Err(ConfigError::Validation("Max failures must be at least 1".to_string()));
        }
        if self.gateway.view_fast_period_ms < 50 {
            return Err(ConfigError::Validation(
                "View fast period must be at least 50 ms".to_string(),
            ));
        }
        if self.gateway.view_slow_period_ms < self.gateway.view_fast_period_ms {
            return Err(ConfigError::Validation(
                "View slow period cannot be shorter than the fast period".to_string(),
            ));
        }
        if self.gateway.status_poll_ms < 10 {
            return Err(ConfigError::Validation(
                "Status poll window must be at least 10 ms".to_string(),
            ));
        }
        if self.logging.file_prefix.trim().is_empty() {
            return Err(ConfigError::Validation("Log file prefix cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Save configuration to file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Driver windows with the configured pauses applied.
    pub fn driver_timings(&self) -> DriverTimings {
        DriverTimings {
            settle_ms: self.modem.settle_delay_ms,
            boot_drain_ms: self.modem.boot_drain_ms,
            power_cycle_pause_ms: self.modem.power_cycle_pause_ms,
            ..DriverTimings::default()
        }
    }

    pub fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            with_gnss: self.modem.gnss,
            max_failures: self.gateway.max_failures,
            status_poll_ms: self.gateway.status_poll_ms,
            enroll_requires_learning: self.gateway.enroll_requires_learning,
        }
    }

    pub fn view_periods(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.gateway.view_fast_period_ms),
            Duration::from_millis(self.gateway.view_slow_period_ms),
        )
    }

    /// Commander store path, falling back to the per-user data directory.
    pub fn storage_path(&self) -> PathBuf {
        if let Some(path) = &self.storage.path {
            return path.clone();
        }
        ProjectDirs::from("", "", "relay-gateway")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
            .join("commanders.json")
    }
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: default_baud_rate(),
            gnss: true,
            settle_delay_ms: default_settle_delay_ms(),
            boot_drain_ms: default_boot_drain_ms(),
            power_cycle_pause_ms: default_power_cycle_pause_ms(),
            power_pulse_ms: default_power_pulse_ms(),
        }
    }
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_terminal_baud_rate(),
        }
    }
}

impl Default for GatewayTuning {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
            view_fast_period_ms: default_view_fast_period_ms(),
            view_slow_period_ms: default_view_slow_period_ms(),
            status_poll_ms: default_status_poll_ms(),
            enroll_requires_learning: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_prefix: default_file_prefix(),
        }
    }
}

//! Configuration loading for scan-station.
//!
//! Handles the TOML file at `~/.scan-station/config.toml`. Every timer the
//! coordinator uses (debounce window, settle delay, request timeout) comes
//! from here so tests and deployments can tune them.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CheckinError, Result};
use crate::source::{Facing, ScanOptions};

const DEFAULT_CONFIG_RELATIVE_PATH: &str = ".scan-station/config.toml";
const DEFAULT_SOCKET_RELATIVE_PATH: &str = ".scan-station/backend.sock";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckinConfig {
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    /// Identical toasts inside this window are suppressed.
    pub debounce_window_ms: u64,
    /// Lock hold after a check-in, absorbing frames of the same code.
    pub settle_delay_ms: u64,
    /// Upper bound for a single validate or check-in request.
    pub request_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            debounce_window_ms: 500,
            settle_delay_ms: 1500,
            request_timeout_ms: 10_000,
        }
    }
}

impl TimingConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScannerConfig {
    pub facing: Facing,
    pub sampling_rate_hz: u32,
    pub decode_window_px: u32,
    pub channel_capacity: usize,
    /// Times a line source re-emits each code (camera frame simulation).
    pub repeat: u32,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            facing: Facing::Environment,
            sampling_rate_hz: 10,
            decode_window_px: 250,
            channel_capacity: 16,
            repeat: 1,
        }
    }
}

impl ScannerConfig {
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            facing: self.facing,
            sampling_rate_hz: self.sampling_rate_hz,
            decode_window_px: self.decode_window_px,
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.sampling_rate_hz.max(1)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    pub socket_path: Option<PathBuf>,
}

impl CheckinConfig {
    fn validate(&self, path: &Path) -> Result<()> {
        let malformed = |details: &str| CheckinError::ConfigMalformed {
            path: path.to_path_buf(),
            details: details.to_string(),
        };

        if self.scanner.channel_capacity == 0 {
            return Err(malformed("scanner.channel_capacity must be at least 1"));
        }
        if self.scanner.sampling_rate_hz == 0 {
            return Err(malformed("scanner.sampling_rate_hz must be at least 1"));
        }
        if self.scanner.repeat == 0 {
            return Err(malformed("scanner.repeat must be at least 1"));
        }
        if self.timing.request_timeout_ms == 0 {
            return Err(malformed("timing.request_timeout_ms must be positive"));
        }
        Ok(())
    }
}

/// Returns `~/.scan-station/config.toml`.
pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(CheckinError::HomeDirNotFound)?;
    Ok(home.join(DEFAULT_CONFIG_RELATIVE_PATH))
}

/// Returns `~/.scan-station/backend.sock`.
pub fn default_socket_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(CheckinError::HomeDirNotFound)?;
    Ok(home.join(DEFAULT_SOCKET_RELATIVE_PATH))
}

/// Loads the configuration, returning defaults if the file doesn't exist.
pub fn load_config(path: Option<PathBuf>) -> Result<CheckinConfig> {
    let config_path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "Config file missing; using defaults");
        return Ok(CheckinConfig::default());
    }

    let content =
        fs_err::read_to_string(&config_path).map_err(|source| CheckinError::ConfigRead {
            path: config_path.clone(),
            source,
        })?;
    let config = toml::from_str::<CheckinConfig>(&content).map_err(|err| {
        CheckinError::ConfigMalformed {
            path: config_path.clone(),
            details: err.to_string(),
        }
    })?;
    config.validate(&config_path)?;
    Ok(config)
}

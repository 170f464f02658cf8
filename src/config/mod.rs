//! Configuration management for hostbridge
//!
//! Settings are read from a TOML file. Every section is optional and falls
//! back to its defaults, so an empty file is a valid configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound on the handshake timeout (ten minutes).
pub const MAX_HANDSHAKE_TIMEOUT_MS: u64 = 600_000;

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BridgeConfig {
    /// How to reach the host compositor
    #[serde(default)]
    pub host: HostConfig,

    /// GPU device selection
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub general: GeneralConfig,
}

/// Host compositor connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HostConfig {
    /// Socket name, or a filesystem path when `abstract_socket` is false
    pub socket_name: String,

    /// Connect to an abstract-namespace socket
    pub abstract_socket: bool,

    /// Bound on each blocking bootstrap phase (milliseconds)
    pub handshake_timeout_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            socket_name: "wayland".to_string(),
            abstract_socket: true,
            handshake_timeout_ms: 5000,
        }
    }
}

impl HostConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    /// Open this node instead of the one the host advertises
    pub path_override: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable debug logging
    pub debug: bool,
}

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Expand ~ to home directory
        let expanded_path = if path.to_string_lossy().starts_with('~') {
            let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
            Path::new(&home).join(path.strip_prefix("~").unwrap_or(path))
        } else {
            path.to_path_buf()
        };

        let contents = fs::read_to_string(&expanded_path)
            .with_context(|| format!("Failed to read config file: {}", expanded_path.display()))?;

        let config: BridgeConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", expanded_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.socket_name.is_empty() {
            anyhow::bail!("Invalid socket_name: must not be empty");
        }

        if self.host.socket_name.contains('\0') {
            anyhow::bail!("Invalid socket_name: must not contain NUL bytes");
        }

        if self.host.handshake_timeout_ms == 0
            || self.host.handshake_timeout_ms > MAX_HANDSHAKE_TIMEOUT_MS
        {
            anyhow::bail!(
                "Invalid handshake_timeout_ms: must be between 1 and {}",
                MAX_HANDSHAKE_TIMEOUT_MS
            );
        }

        if let Some(path) = &self.device.path_override {
            if path.as_os_str().is_empty() {
                anyhow::bail!("Invalid device path_override: must not be empty");
            }
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents).context("Failed to write configuration file")?;

        Ok(())
    }
}

//! Device configuration
//!
//! Loaded from a TOML file. Every key is optional; missing keys take the
//! defaults below.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use cellfix_shared::{limits, DecodeLimits};
use serde::Deserialize;

/// Config file read when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "cellfix.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Identity sent with every location request
    pub device_id: String,
    pub limits: LimitsConfig,
    pub cloud: CloudConfig,
    pub modem: ModemConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_id: "cellfix-001".into(),
            limits: LimitsConfig::default(),
            cloud: CloudConfig::default(),
            modem: ModemConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub neighbor_cells_max: usize,
    pub gci_cells_max: usize,
    pub wifi_ap_min: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            neighbor_cells_max: limits::NEIGHBOR_CELLS_MAX,
            gci_cells_max: limits::GCI_CELLS_MAX,
            wifi_ap_min: limits::WIFI_AP_COUNT_MIN,
        }
    }
}

impl LimitsConfig {
    /// Capacities must be at least one and no larger than the built-in maximums
    fn validate(&self) -> Result<()> {
        ensure!(
            (1..=limits::NEIGHBOR_CELLS_MAX).contains(&self.neighbor_cells_max),
            "limits.neighbor_cells_max must be in 1..={}, got {}",
            limits::NEIGHBOR_CELLS_MAX,
            self.neighbor_cells_max
        );
        ensure!(
            (1..=limits::GCI_CELLS_MAX).contains(&self.gci_cells_max),
            "limits.gci_cells_max must be in 1..={}, got {}",
            limits::GCI_CELLS_MAX,
            self.gci_cells_max
        );
        ensure!(self.wifi_ap_min >= 1, "limits.wifi_ap_min must be at least 1");
        Ok(())
    }

    pub fn decode_limits(&self) -> DecodeLimits {
        DecodeLimits {
            neighbor_cells_max: self.neighbor_cells_max,
            gci_cells_max: self.gci_cells_max,
        }
    }
}

/// Location service connection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub address: String,
    pub connect_timeout_ms: u64,
    /// Upper bound on one request/reply round trip
    pub request_timeout_ms: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:7700".into(),
            connect_timeout_ms: 5000,
            request_timeout_ms: 30_000,
        }
    }
}

impl CloudConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Modem UART. Without a port, notifications are read from the host link
/// and single-cell requests use the serving cell of the latest measurement.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    pub port: Option<String>,
    pub baud: u32,
    /// How long to wait for the modem to answer a serving cell query
    pub response_timeout_ms: u64,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: 115_200,
            response_timeout_ms: 5000,
        }
    }
}

impl ModemConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

pub fn load(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    parse(&data)
}

/// Load `path`, or the default file if present, or the built-in defaults
pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                load(default)
            } else {
                Ok(Config::default())
            }
        }
    }
}

fn parse(data: &str) -> Result<Config> {
    let config: Config = toml::from_str(data).context("Failed to parse config")?;
    config.limits.validate()?;
    Ok(config)
}

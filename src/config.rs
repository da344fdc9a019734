//! Configuration loading and validation.
//!
//! The daemon reads a single YAML file describing the I2C bus, the fan
//! control curves, and the display options.

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
};

/// Top-level daemon configuration.
///
/// # Example
///
/// ```yaml
/// version: 1
/// log_level: info
///
/// i2c:
///   device: /dev/i2c-1
///
/// fan:
///   enabled: true
///   interval_seconds: 30
///   cpu_curve:
///     40: 20
///     60: 50
///     80: 100
///   hdd_curve:
///     35: 20
///     45: 50
///     55: 100
///
/// display:
///   mirror_horizontal: false
///   contrast: 207
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version for compatibility checking.
    pub version: u8,

    /// Syslog severity filter.
    #[serde(default = "defaults::log_level")]
    pub log_level: String,

    #[serde(default)]
    pub i2c: I2cSection,

    #[serde(default)]
    pub fan: FanSection,

    #[serde(default)]
    pub display: DisplaySection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct I2cSection {
    /// Character device of the bus both peripherals sit on.
    #[serde(default = "defaults::i2c_device")]
    pub device: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanSection {
    #[serde(default = "defaults::fan_enabled")]
    pub enabled: bool,

    /// Control loop period in seconds.
    #[serde(default = "defaults::interval_seconds")]
    pub interval_seconds: u64,

    /// Temperature threshold (celsius) to fan speed (percent).
    #[serde(default = "defaults::cpu_curve")]
    pub cpu_curve: BTreeMap<u8, u8>,

    #[serde(default = "defaults::hdd_curve")]
    pub hdd_curve: BTreeMap<u8, u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplaySection {
    /// Flip the panel left-to-right for mirrored enclosures.
    #[serde(default)]
    pub mirror_horizontal: bool,

    #[serde(default = "defaults::contrast")]
    pub contrast: u8,
}

impl Default for I2cSection {
    fn default() -> Self {
        Self {
            device: defaults::i2c_device(),
        }
    }
}

impl Default for FanSection {
    fn default() -> Self {
        Self {
            enabled: defaults::fan_enabled(),
            interval_seconds: defaults::interval_seconds(),
            cpu_curve: defaults::cpu_curve(),
            hdd_curve: defaults::hdd_curve(),
        }
    }
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            mirror_horizontal: false,
            contrast: defaults::contrast(),
        }
    }
}

mod defaults {
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    pub fn log_level() -> String {
        "info".into()
    }

    pub fn i2c_device() -> PathBuf {
        PathBuf::from("/dev/i2c-1")
    }

    pub fn fan_enabled() -> bool {
        true
    }

    pub fn interval_seconds() -> u64 {
        30
    }

    pub fn cpu_curve() -> BTreeMap<u8, u8> {
        BTreeMap::from([(40, 20), (60, 50), (80, 100)])
    }

    pub fn hdd_curve() -> BTreeMap<u8, u8> {
        BTreeMap::from([(35, 20), (45, 50), (55, 100)])
    }

    pub fn contrast() -> u8 {
        0xCF
    }
}

impl Config {
    /// Loads configuration from `path` or the standard locations.
    ///
    /// Search order:
    /// 1. Provided path parameter
    /// 2. LUMEOND_CONFIG environment variable
    /// 3. XDG_CONFIG_HOME/lumeond/config.yml or ~/.config/lumeond/config.yml
    /// 4. /etc/lumeond/config.yml
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => locate_config().context("No configuration file found")?,
        };

        info!("loading config from: {}", config_path.display());
        Self::load_from_path(&config_path)
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML in: {}", path.display()))?;

        if config.version != 1 {
            anyhow::bail!(
                "Unsupported config version {} in file: {}",
                config.version,
                path.display()
            );
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.fan.interval_seconds == 0 {
            anyhow::bail!("fan.interval_seconds must be at least 1");
        }

        for (name, curve) in [("cpu_curve", &self.fan.cpu_curve), ("hdd_curve", &self.fan.hdd_curve)]
        {
            if self.fan.enabled && curve.is_empty() {
                anyhow::bail!("fan.{name} must define at least one point");
            }
            for (&temperature, &speed) in curve {
                if speed > 100 {
                    anyhow::bail!(
                        "fan.{name} speed {speed} at {temperature}C exceeds 100 percent"
                    );
                }
            }
        }

        self.log_level
            .parse::<log::LevelFilter>()
            .with_context(|| format!("Invalid log_level: {}", self.log_level))?;

        Ok(())
    }

    /// Parsed syslog severity filter.
    pub fn log_filter(&self) -> log::LevelFilter {
        // validate() already proved this parses.
        self.log_level
            .parse()
            .unwrap_or(log::LevelFilter::Info)
    }
}

fn locate_config() -> Result<PathBuf> {
    if let Ok(env_path) = env::var("LUMEOND_CONFIG") {
        return Ok(PathBuf::from(env_path));
    }

    if let Some(mut cfg_dir) = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|h| Path::new(&h).join(".config")))
    {
        cfg_dir.push("lumeond/config.yml");
        if cfg_dir.exists() {
            return Ok(cfg_dir);
        }
    }

    let etc = Path::new("/etc/lumeond/config.yml");
    if etc.exists() {
        return Ok(etc.to_path_buf());
    }

    anyhow::bail!("Configuration file not found in any standard location")
}

//! CPU temperature from sysfs thermal zones.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::{debug, warn};

use crate::sensors::TemperatureSensor;

const THERMAL_ZONE_PATH: &str = "/sys/class/thermal";

/// Averages the readings of every `thermal_zone*/temp` node.
///
/// Zones that fail to read or parse are skipped with a warning; the
/// sensor only errors when no zone yields a valid value.
pub struct CpuTemperature {
    base: PathBuf,
}

impl CpuTemperature {
    pub fn new() -> Self {
        Self {
            base: PathBuf::from(THERMAL_ZONE_PATH),
        }
    }

    #[cfg(test)]
    fn with_base(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    async fn read_all_zones(&self) -> Result<Vec<f32>> {
        let mut entries = tokio::fs::read_dir(&self.base)
            .await
            .with_context(|| format!("cannot list {}", self.base.display()))?;

        let mut temps = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with("thermal_zone") {
                continue;
            }

            let temp_path = entry.path().join("temp");
            match read_millidegrees(&temp_path).await {
                Ok(temp) => {
                    debug!("read temperature {temp}°C from {}", temp_path.display());
                    temps.push(temp);
                }
                Err(e) => {
                    warn!("skipping thermal zone {}: {e}", temp_path.display());
                }
            }
        }

        Ok(temps)
    }
}

impl Default for CpuTemperature {
    fn default() -> Self {
        Self::new()
    }
}

/// Sysfs reports temperature in millidegrees Celsius.
async fn read_millidegrees(path: &std::path::Path) -> Result<f32> {
    let raw = tokio::fs::read_to_string(path).await?;
    let millis: f32 = raw.trim().parse().context("non-numeric temperature")?;
    Ok(millis / 1000.0)
}

#[async_trait]
impl TemperatureSensor for CpuTemperature {
    async fn average_temperature(&self) -> Result<f32> {
        let temps = self.read_all_zones().await?;
        if temps.is_empty() {
            return Err(anyhow!("no valid thermal zone readings"));
        }

        Ok(temps.iter().sum::<f32>() / temps.len() as f32)
    }

    fn zone(&self) -> &str {
        "cpu"
    }
}

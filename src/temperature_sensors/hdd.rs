//! Drive temperature via lsblk + smartctl.
//!
//! `lsblk -b -J` enumerates block devices; every whole disk is then
//! queried with `smartctl -j` and the reported current temperatures are
//! averaged. Per-device failures are skipped; the sensor errors only
//! when no drive yields a reading.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use tokio::process::Command;

use crate::sensors::TemperatureSensor;

#[derive(Debug, Deserialize)]
struct LsblkReport {
    #[serde(default)]
    blockdevices: Vec<BlockDevice>,
}

#[derive(Debug, Deserialize)]
struct BlockDevice {
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct SmartReport {
    json_format_version: Vec<u32>,
    temperature: Option<SmartTemperature>,
}

#[derive(Debug, Deserialize)]
struct SmartTemperature {
    current: i64,
}

/// Averages SMART temperatures across all whole disks.
pub struct DriveTemperature;

impl DriveTemperature {
    pub fn new() -> Self {
        Self
    }

    async fn storage_devices(&self) -> Result<Vec<BlockDevice>> {
        let output = Command::new("lsblk")
            .args(["-b", "-J", "-o", "NAME,SIZE,TYPE"])
            .output()
            .await
            .context("failed to invoke lsblk")?;
        anyhow::ensure!(output.status.success(), "lsblk exited with {}", output.status);

        let devices = parse_lsblk(&output.stdout)?;
        if devices.is_empty() {
            return Err(anyhow!("no storage devices found"));
        }

        debug!(
            "storage devices found: {:?}",
            devices.iter().map(|d| &d.name).collect::<Vec<_>>()
        );
        Ok(devices)
    }

    async fn device_temperature(&self, device: &BlockDevice) -> Result<f32> {
        // NVMe namespaces do not speak ATA SMART.
        let device_type = if device.name.starts_with("nvme") {
            "nvme"
        } else {
            "sat"
        };

        let output = Command::new("smartctl")
            .args(["-d", device_type, "-A", "-j", "--nocheck=standby"])
            .arg(format!("/dev/{}", device.name))
            .output()
            .await
            .context("failed to invoke smartctl")?;
        anyhow::ensure!(
            output.status.success(),
            "smartctl exited with {}",
            output.status
        );

        parse_smart_temperature(&output.stdout)
    }
}

impl Default for DriveTemperature {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_lsblk(raw: &[u8]) -> Result<Vec<BlockDevice>> {
    let report: LsblkReport = serde_json::from_slice(raw).context("invalid lsblk output")?;
    Ok(report
        .blockdevices
        .into_iter()
        .filter(|d| d.kind == "disk" && d.size > 0)
        .collect())
}

fn parse_smart_temperature(raw: &[u8]) -> Result<f32> {
    let report: SmartReport = serde_json::from_slice(raw).context("invalid smartctl output")?;
    if report.json_format_version.first() != Some(&1) {
        return Err(anyhow!(
            "unsupported smartctl JSON format version {:?}",
            report.json_format_version
        ));
    }

    report
        .temperature
        .map(|t| t.current as f32)
        .ok_or_else(|| anyhow!("no temperature reported"))
}

#[async_trait]
impl TemperatureSensor for DriveTemperature {
    async fn average_temperature(&self) -> Result<f32> {
        let devices = self.storage_devices().await?;

        let mut total = 0.0;
        let mut count = 0;
        for device in &devices {
            match self.device_temperature(device).await {
                Ok(temp) => {
                    total += temp;
                    count += 1;
                }
                Err(e) => {
                    warn!("no temperature for /dev/{}: {e}", device.name);
                }
            }
        }

        if count == 0 {
            return Err(anyhow!("no valid drive temperature readings"));
        }

        Ok(total / count as f32)
    }

    fn zone(&self) -> &str {
        "drives"
    }
}

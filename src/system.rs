//! Enclosure power control via the daughterboard.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::warn;
use tokio::process::Command;

use crate::bus::{BusTransport, DAUGHTERBOARD_ADDR};

/// Command byte that cuts enclosure power.
const CMD_SYSTEM_HALT: u8 = 0xFF;

/// System-level power operations.
pub struct System {
    bus: Arc<dyn BusTransport>,
}

impl System {
    pub fn new(bus: Arc<dyn BusTransport>) -> Self {
        Self { bus }
    }

    /// Asks the OS to shut down cleanly.
    pub async fn shutdown(&self) -> Result<()> {
        warn!("shutting down the system");

        let status = Command::new("shutdown")
            .arg("now")
            .status()
            .await
            .context("failed to invoke shutdown")?;
        anyhow::ensure!(status.success(), "shutdown exited with {status}");
        Ok(())
    }

    /// Cuts power to the system, drives and the whole case.
    pub async fn halt(&self) -> Result<()> {
        warn!("halting the system");

        self.bus
            .write(DAUGHTERBOARD_ADDR, &[CMD_SYSTEM_HALT])
            .await?;
        Ok(())
    }
}

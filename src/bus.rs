//! Shared addressed-write bus primitive.
//!
//! Both actuation pipelines command their hardware through [`BusTransport`]:
//! the fan daughterboard at 0x1A and the display controller at 0x3C. The
//! transport serializes physical access internally, so callers on disjoint
//! addresses never need a cross-component lock.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::PathBuf;

use async_trait::async_trait;
use i2cdev::core::I2CDevice;
use i2cdev::linux::LinuxI2CDevice;
use log::debug;
use tokio::sync::Mutex;

use crate::errors::BusError;

/// I2C address of the power/fan daughterboard.
pub const DAUGHTERBOARD_ADDR: u16 = 0x1A;

/// I2C address of the display controller.
pub const DISPLAY_ADDR: u16 = 0x3C;

/// Narrow capability interface for addressed byte writes.
#[async_trait]
pub trait BusTransport: Send + Sync {
    async fn write(&self, addr: u16, bytes: &[u8]) -> Result<(), BusError>;
}

/// Linux I2C character-device implementation of [`BusTransport`].
///
/// Device handles are opened lazily per target address and kept for the
/// life of the bus. The mutex makes all physical writes sequential.
pub struct I2cBus {
    path: PathBuf,
    devices: Mutex<HashMap<u16, LinuxI2CDevice>>,
}

impl I2cBus {
    /// Opens the bus at the given character device path, e.g. `/dev/i2c-1`.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        if !path.exists() {
            anyhow::bail!(
                "i2c device {} not found, make sure i2c is enabled on this system",
                path.display()
            );
        }

        Ok(Self {
            path,
            devices: Mutex::new(HashMap::new()),
        })
    }
}

#[async_trait]
impl BusTransport for I2cBus {
    async fn write(&self, addr: u16, bytes: &[u8]) -> Result<(), BusError> {
        debug!("sending {} bytes to 0x{:02x}", bytes.len(), addr);

        let mut devices = self.devices.lock().await;
        let dev = match devices.entry(addr) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let dev = LinuxI2CDevice::new(&self.path, addr).map_err(|e| BusError {
                    addr,
                    reason: e.to_string(),
                })?;
                entry.insert(dev)
            }
        };

        dev.write(bytes).map_err(|e| BusError {
            addr,
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_rejects_missing_device() {
        let Err(err) = I2cBus::open("/dev/i2c-does-not-exist") else {
            panic!("open succeeded on a missing device");
        };
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn addresses_are_disjoint() {
        assert_ne!(DAUGHTERBOARD_ADDR, DISPLAY_ADDR);
    }
}

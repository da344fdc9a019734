//! # lumeond
//!
//! A Linux daemon that keeps a NAS enclosure within thermal limits and
//! drives its front-panel OLED.
//!
//! ## Features
//!
//! - **Fan Control**: Speed curves over CPU and drive temperatures,
//!   actuated through the enclosure's I2C fan daughterboard
//! - **Fail-Safe**: Full speed whenever a temperature source misbehaves
//! - **OLED Driver**: SSD1306-class 128x64 panel with text, images,
//!   GIF animation playback and hardware scrolling
//! - **Async Architecture**: Built on Tokio with cooperative shutdown
//!
//! ## Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use lumeond::bus::I2cBus;
//! use lumeond::config::Config;
//! use lumeond::fan::Fan;
//! use lumeond::fan_curve::FanCurve;
//! use lumeond::fan_service::FanService;
//! use lumeond::temperature_sensors::{CpuTemperature, DriveTemperature};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some(PathBuf::from("config.yml")))?;
//!     let bus = Arc::new(I2cBus::open(&config.i2c.device)?);
//!
//!     let service = FanService::new(
//!         Fan::new(bus),
//!         Box::new(CpuTemperature::new()),
//!         Box::new(DriveTemperature::new()),
//!         FanCurve::from_points(config.fan.cpu_curve.clone()),
//!         FanCurve::from_points(config.fan.hdd_curve.clone()),
//!         Duration::from_secs(config.fan.interval_seconds),
//!     );
//!     service.start().await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     service.shutdown(Duration::from_secs(10)).await
//! }
//! ```

pub mod bus;
pub mod cli;
pub mod config;
pub mod drivers;
pub mod errors;
pub mod fan;
pub mod fan_curve;
pub mod fan_service;
pub mod sensors;
pub mod system;
pub mod temperature_sensors;

//! SSD1306 monochrome OLED driver.
//!
//! Split the same way the panel works: [`protocol`] encodes the command
//! set, [`framebuffer`] models the 1-bit page-addressed canvas,
//! [`raster`] normalizes arbitrary images and animations into that
//! canvas, and [`display`] owns the bus and the render schedule.

pub mod display;
pub mod framebuffer;
pub mod protocol;
pub mod raster;

pub use display::{FrameTiming, Oled, OledOptions, centered_x};
pub use framebuffer::FrameBuffer;
pub use protocol::{ScrollDirection, ScrollRate};
pub use raster::{Animation, Disposal};

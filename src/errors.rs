//! Error taxonomy for the hardware actuation layer.
//!
//! Sensor faults are absorbed inside the control loop and never surface
//! here; configuration faults are reported through `anyhow` at load time.

use thiserror::Error;

/// A failed write on the shared bus.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("bus write to 0x{addr:02x} failed: {reason}")]
pub struct BusError {
    pub addr: u16,
    pub reason: String,
}

/// Errors surfaced by the fan actuator.
#[derive(Debug, Error)]
pub enum FanError {
    /// Rejected before touching the bus.
    #[error("fan speed is specified in percent 0 to 100, got {0}")]
    InvalidSpeed(u8),

    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Errors surfaced by display operations.
#[derive(Debug, Error)]
pub enum DisplayError {
    #[error(transparent)]
    Bus(#[from] BusError),

    /// The image or animation could not be decoded or sized.
    #[error("unsupported image data: {0}")]
    UnsupportedFormat(String),

    #[error("scroll lines {start}..{end} outside panel height {height}")]
    InvalidScrollRange { start: u8, end: u8, height: u8 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bus_error_names_the_address() {
        let err = BusError {
            addr: 0x1a,
            reason: "EIO".into(),
        };
        assert_eq!(err.to_string(), "bus write to 0x1a failed: EIO");
    }

    #[test]
    fn invalid_speed_is_reported_with_value() {
        let err = FanError::InvalidSpeed(150);
        assert!(err.to_string().contains("150"));
    }

    #[test]
    fn bus_error_converts_into_display_error() {
        let err: DisplayError = BusError {
            addr: 0x3c,
            reason: "ENXIO".into(),
        }
        .into();
        assert!(matches!(err, DisplayError::Bus(_)));
    }
}

use anyhow::Result;
use async_trait::async_trait;

/// An independently monitored thermal source.
///
/// Any error from `average_temperature` means the zone's reading is
/// unavailable; the control loop substitutes the worst case instead of
/// propagating it.
#[async_trait]
pub trait TemperatureSensor: Send + Sync {
    async fn average_temperature(&self) -> Result<f32>;

    /// Zone label used in log output.
    fn zone(&self) -> &str;
}

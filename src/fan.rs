//! Fan actuator on the power daughterboard.

use std::sync::Arc;

use crate::bus::{BusTransport, DAUGHTERBOARD_ADDR};
use crate::errors::FanError;

/// Commands the enclosure fan through the daughterboard.
///
/// The speed command is a single byte in percent; anything above 100 is
/// rejected before the bus is touched.
#[derive(Clone)]
pub struct Fan {
    bus: Arc<dyn BusTransport>,
}

impl Fan {
    pub fn new(bus: Arc<dyn BusTransport>) -> Self {
        Self { bus }
    }

    pub async fn set_speed(&self, speed: u8) -> Result<(), FanError> {
        if speed > 100 {
            return Err(FanError::InvalidSpeed(speed));
        }

        self.bus.write(DAUGHTERBOARD_ADDR, &[speed]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BusError;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBus {
        writes: Mutex<Vec<(u16, Vec<u8>)>>,
        fail: bool,
    }

    #[async_trait]
    impl BusTransport for RecordingBus {
        async fn write(&self, addr: u16, bytes: &[u8]) -> Result<(), BusError> {
            if self.fail {
                return Err(BusError {
                    addr,
                    reason: "simulated failure".into(),
                });
            }
            self.writes.lock().unwrap().push((addr, bytes.to_vec()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn set_speed_writes_single_byte_to_daughterboard() {
        let bus = Arc::new(RecordingBus::default());
        let fan = Fan::new(bus.clone());

        fan.set_speed(50).await.unwrap();

        let writes = bus.writes.lock().unwrap();
        assert_eq!(*writes, vec![(DAUGHTERBOARD_ADDR, vec![50])]);
    }

    #[tokio::test]
    async fn set_speed_rejects_out_of_range_before_bus_write() {
        let bus = Arc::new(RecordingBus::default());
        let fan = Fan::new(bus.clone());

        let err = fan.set_speed(150).await.unwrap_err();
        assert!(matches!(err, FanError::InvalidSpeed(150)));
        assert!(bus.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bus_failure_is_surfaced() {
        let bus = Arc::new(RecordingBus {
            fail: true,
            ..Default::default()
        });
        let fan = Fan::new(bus);

        let err = fan.set_speed(100).await.unwrap_err();
        assert!(matches!(err, FanError::Bus(_)));
    }
}

//! Temperature-driven fan control loop.
//!
//! The service keeps the fan aligned with the worst-case cooling demand
//! across the CPU and storage zones. It owns exactly one background task:
//! two concurrent `start` calls never produce two loops, and `shutdown`
//! signals the loop and waits for it with a timeout.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{debug, error, info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_stream::{StreamExt, wrappers::IntervalStream};
use tokio_util::sync::CancellationToken;

use crate::fan::Fan;
use crate::fan_curve::FanCurve;
use crate::sensors::TemperatureSensor;

/// Speed commanded for a zone whose sensor cannot be read. Unknown is
/// treated as hot.
const FAILSAFE_SPEED: u8 = 100;

/// Lifecycle state of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Stopped,
    Running,
    ShuttingDown,
}

struct Worker {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

struct ServiceState {
    control: ControlState,
    worker: Option<Worker>,
}

/// Sensors, curves and actuator shared with the control loop task.
struct FanLoop {
    fan: Fan,
    cpu: Box<dyn TemperatureSensor>,
    drives: Box<dyn TemperatureSensor>,
    cpu_curve: FanCurve,
    hdd_curve: FanCurve,
    period: Duration,
}

/// Owns the control loop lifecycle.
pub struct FanService {
    state: Mutex<ServiceState>,
    fan_loop: Arc<FanLoop>,
}

impl FanService {
    pub fn new(
        fan: Fan,
        cpu: Box<dyn TemperatureSensor>,
        drives: Box<dyn TemperatureSensor>,
        cpu_curve: FanCurve,
        hdd_curve: FanCurve,
        period: Duration,
    ) -> Self {
        Self {
            state: Mutex::new(ServiceState {
                control: ControlState::Stopped,
                worker: None,
            }),
            fan_loop: Arc::new(FanLoop {
                fan,
                cpu,
                drives,
                cpu_curve,
                hdd_curve,
                period,
            }),
        }
    }

    /// Starts the control loop.
    ///
    /// Idempotent: if the loop is already running (or shutting down) the
    /// call returns without starting a second one. Returns before the
    /// first evaluation.
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.control != ControlState::Stopped {
            debug!("fan loop already active, ignoring start");
            return Ok(());
        }

        info!("starting fan loop");

        let token = CancellationToken::new();
        let handle = tokio::spawn(control_loop(self.fan_loop.clone(), token.clone()));

        state.control = ControlState::Running;
        state.worker = Some(Worker { token, handle });
        Ok(())
    }

    /// Signals the loop to stop and waits for it up to `timeout`.
    ///
    /// On timeout the state is still forced to `Stopped`, but the loop
    /// may be mid-iteration; the warning is the observable signal that
    /// the last write may not have completed. Calling this on a stopped
    /// service is a no-op.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        let worker = {
            let mut state = self.state.lock().await;
            if state.control == ControlState::Stopped {
                return Ok(());
            }
            state.control = ControlState::ShuttingDown;
            state.worker.take()
        };

        if let Some(worker) = worker {
            worker.token.cancel();
            match tokio::time::timeout(timeout, worker.handle).await {
                Ok(Ok(())) => info!("fan loop stopped gracefully"),
                Ok(Err(e)) => error!("fan loop task failed: {e}"),
                Err(_) => warn!("shutdown timeout expired before fan loop could stop"),
            }
        }

        self.state.lock().await.control = ControlState::Stopped;
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.control == ControlState::Running
    }
}

async fn control_loop(fan_loop: Arc<FanLoop>, token: CancellationToken) {
    let mut ticks = IntervalStream::new(interval(fan_loop.period));
    // The first tick completes immediately; consume it so the loop does
    // not evaluate twice back-to-back at startup.
    ticks.next().await;

    let mut current: Option<u8> = None;

    loop {
        current = adjust_fan_speed(&fan_loop, current).await;

        tokio::select! {
            _ = token.cancelled() => {
                info!("stopping fan loop");
                return;
            }
            _ = ticks.next() => {}
        }
    }
}

/// Runs one control tick and returns the commanded speed.
///
/// On a failed bus write the previous commanded speed is kept; the write
/// is retried naturally on the next tick.
async fn adjust_fan_speed(fan_loop: &FanLoop, current: Option<u8>) -> Option<u8> {
    let cpu_speed = zone_speed(&*fan_loop.cpu, &fan_loop.cpu_curve).await;
    let hdd_speed = zone_speed(&*fan_loop.drives, &fan_loop.hdd_curve).await;

    let speed = cpu_speed.max(hdd_speed);

    if current == Some(speed) {
        info!("requested fan speed did not change, current {speed}%");
        return current;
    }

    match fan_loop.fan.set_speed(speed).await {
        Ok(()) => {
            info!("altering fan speed to {speed}%");
            Some(speed)
        }
        Err(e) => {
            error!("failed to set fan speed: {e}");
            current
        }
    }
}

/// Evaluates one zone's demanded speed, substituting the worst case when
/// the sensor cannot be read.
async fn zone_speed(sensor: &dyn TemperatureSensor, curve: &FanCurve) -> u8 {
    match sensor.average_temperature().await {
        Ok(temp) => {
            if temp < 0.0 {
                warn!("{} temperature is below zero: {temp}", sensor.zone());
            }
            curve.speed_for(temp)
        }
        Err(e) => {
            error!(
                "failed to read {} temperature, forcing full speed: {e}",
                sensor.zone()
            );
            FAILSAFE_SPEED
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusTransport, DAUGHTERBOARD_ADDR};
    use crate::errors::BusError;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingBus {
        writes: StdMutex<Vec<(u16, Vec<u8>)>>,
        fail: AtomicBool,
    }

    impl RecordingBus {
        fn speeds(&self) -> Vec<u8> {
            self.writes
                .lock()
                .unwrap()
                .iter()
                .filter(|(addr, _)| *addr == DAUGHTERBOARD_ADDR)
                .map(|(_, bytes)| bytes[0])
                .collect()
        }
    }

    #[async_trait]
    impl BusTransport for RecordingBus {
        async fn write(&self, addr: u16, bytes: &[u8]) -> Result<(), BusError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(BusError {
                    addr,
                    reason: "simulated failure".into(),
                });
            }
            self.writes.lock().unwrap().push((addr, bytes.to_vec()));
            Ok(())
        }
    }

    struct FixedSensor {
        zone: &'static str,
        temp: Option<f32>,
    }

    #[async_trait]
    impl TemperatureSensor for FixedSensor {
        async fn average_temperature(&self) -> Result<f32> {
            self.temp
                .ok_or_else(|| anyhow::anyhow!("sensor unavailable"))
        }

        fn zone(&self) -> &str {
            self.zone
        }
    }

    fn reference_curve() -> FanCurve {
        FanCurve::from_points([(40, 20), (60, 50), (80, 100)])
    }

    fn service(bus: Arc<RecordingBus>, cpu: Option<f32>, hdd: Option<f32>) -> FanService {
        FanService::new(
            Fan::new(bus),
            Box::new(FixedSensor {
                zone: "cpu",
                temp: cpu,
            }),
            Box::new(FixedSensor {
                zone: "drives",
                temp: hdd,
            }),
            reference_curve(),
            reference_curve(),
            Duration::from_millis(20),
        )
    }

    #[tokio::test]
    async fn worst_zone_wins() {
        let bus = Arc::new(RecordingBus::default());
        let svc = service(bus.clone(), Some(55.0), Some(70.0));

        svc.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        svc.shutdown(Duration::from_secs(1)).await.unwrap();

        assert_eq!(bus.speeds(), vec![50]);
    }

    #[tokio::test]
    async fn sensor_failure_forces_full_speed() {
        let bus = Arc::new(RecordingBus::default());
        let svc = service(bus.clone(), None, Some(30.0));

        svc.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        svc.shutdown(Duration::from_secs(1)).await.unwrap();

        assert_eq!(bus.speeds(), vec![100]);
    }

    #[tokio::test]
    async fn cool_zones_command_zero() {
        let bus = Arc::new(RecordingBus::default());
        let svc = service(bus.clone(), Some(25.0), Some(30.0));

        svc.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        svc.shutdown(Duration::from_secs(1)).await.unwrap();

        assert_eq!(bus.speeds(), vec![0]);
    }

    #[tokio::test]
    async fn unchanged_speed_is_not_rewritten() {
        let bus = Arc::new(RecordingBus::default());
        let svc = service(bus.clone(), Some(55.0), Some(70.0));

        svc.start().await.unwrap();
        // Several tick periods elapse with constant temperatures.
        tokio::time::sleep(Duration::from_millis(90)).await;
        svc.shutdown(Duration::from_secs(1)).await.unwrap();

        assert_eq!(bus.speeds(), vec![50]);
    }

    #[tokio::test]
    async fn bus_failure_keeps_loop_alive_and_retries_next_tick() {
        let bus = Arc::new(RecordingBus::default());
        bus.fail.store(true, Ordering::SeqCst);
        let svc = service(bus.clone(), Some(70.0), Some(30.0));

        svc.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(bus.speeds().is_empty());

        bus.fail.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        svc.shutdown(Duration::from_secs(1)).await.unwrap();

        assert_eq!(bus.speeds(), vec![50]);
    }

    struct CountingSensor {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TemperatureSensor for CountingSensor {
        async fn average_temperature(&self) -> Result<f32> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(55.0)
        }

        fn zone(&self) -> &str {
            "cpu"
        }
    }

    #[tokio::test]
    async fn startup_evaluates_once_per_period() {
        let bus = Arc::new(RecordingBus::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let svc = FanService::new(
            Fan::new(bus),
            Box::new(CountingSensor {
                calls: calls.clone(),
            }),
            Box::new(FixedSensor {
                zone: "drives",
                temp: Some(30.0),
            }),
            reference_curve(),
            reference_curve(),
            Duration::from_millis(50),
        );

        svc.start().await.unwrap();
        // Well inside the first period: exactly one evaluation.
        tokio::time::sleep(Duration::from_millis(25)).await;
        svc.shutdown(Duration::from_secs(1)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let bus = Arc::new(RecordingBus::default());
        let svc = service(bus.clone(), Some(55.0), Some(70.0));

        svc.start().await.unwrap();
        svc.start().await.unwrap();
        assert!(svc.is_running().await);

        tokio::time::sleep(Duration::from_millis(90)).await;
        svc.shutdown(Duration::from_secs(1)).await.unwrap();

        // Two loops would have produced two initial writes.
        assert_eq!(bus.speeds(), vec![50]);
        assert!(!svc.is_running().await);
    }

    #[tokio::test]
    async fn shutdown_on_stopped_service_is_a_no_op() {
        let bus = Arc::new(RecordingBus::default());
        let svc = service(bus.clone(), Some(55.0), Some(70.0));

        svc.shutdown(Duration::from_secs(1)).await.unwrap();
        assert!(!svc.is_running().await);
        assert!(bus.speeds().is_empty());
    }

    #[tokio::test]
    async fn restart_after_shutdown_spawns_a_fresh_loop() {
        let bus = Arc::new(RecordingBus::default());
        let svc = service(bus.clone(), Some(55.0), Some(70.0));

        svc.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        svc.shutdown(Duration::from_secs(1)).await.unwrap();

        svc.start().await.unwrap();
        assert!(svc.is_running().await);
        tokio::time::sleep(Duration::from_millis(10)).await;
        svc.shutdown(Duration::from_secs(1)).await.unwrap();

        assert_eq!(bus.speeds(), vec![50, 50]);
    }
}

//! Sound sensor watcher.
//!
//! Bridges the sensor pin into the alarm controller. Hardware edge
//! detection is preferred; when the platform cannot provide it the
//! watcher samples the pin on a short interval and synthesizes edges
//! from level changes. The strategy is chosen once, at startup; if the
//! edge source later disappears the watcher drops to polling.
//!
//! Edges are debounced here. The controller ignores detections while
//! already triggered, so a bounce that slips through is harmless.

use std::sync::Arc;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::alarm::AlarmController;
use crate::config::SensorConfig;
use crate::hw::{EdgeReceiver, PinValue, SoundSensor};
use crate::status_log::LogLevel;
use crate::tracing::prelude::*;
use crate::types::EdgeDebouncer;

/// How the watcher learns about level changes.
#[derive(Debug)]
pub enum WatchStrategy {
    /// Edges delivered by the hardware.
    Edge(EdgeReceiver),
    /// Pin sampled every `SensorConfig::poll_interval`.
    Polling,
}

pub struct SensorWatcher {
    sensor: Arc<dyn SoundSensor>,
    controller: AlarmController,
    config: SensorConfig,
}

impl SensorWatcher {
    pub fn new(
        sensor: Arc<dyn SoundSensor>,
        controller: AlarmController,
        config: SensorConfig,
    ) -> Self {
        Self {
            sensor,
            controller,
            config,
        }
    }

    /// Watch until `running` is cancelled.
    pub async fn run(self, running: CancellationToken) {
        trace!("Sensor watcher started.");

        tokio::select! {
            _ = running.cancelled() => return,
            _ = time::sleep(self.config.startup_delay) => {}
        }

        match self.select_strategy().await {
            WatchStrategy::Edge(edges) => self.watch_edges(edges, &running).await,
            WatchStrategy::Polling => self.poll(&running).await,
        }

        trace!("Sensor watcher stopped.");
    }

    async fn select_strategy(&self) -> WatchStrategy {
        match self.sensor.edges().await {
            Ok(edges) => {
                self.controller
                    .record(LogLevel::Info, "edge detection enabled on sound sensor");
                WatchStrategy::Edge(edges)
            }
            Err(e) => {
                self.controller.record(
                    LogLevel::Error,
                    format!("edge detection failed: {e}; fallback to polling"),
                );
                WatchStrategy::Polling
            }
        }
    }

    async fn watch_edges(&self, mut edges: EdgeReceiver, running: &CancellationToken) {
        let mut debouncer = EdgeDebouncer::new(self.config.debounce);

        loop {
            tokio::select! {
                _ = running.cancelled() => return,
                edge = edges.recv() => {
                    match edge {
                        Some(()) => {
                            if debouncer.accept(Instant::now()) {
                                self.controller.on_sensor_edge().await;
                            } else {
                                trace!("Edge inside debounce window ignored");
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        // The edge source died underneath us; keep the device listening.
        self.controller.record(
            LogLevel::Error,
            "edge detection stopped unexpectedly; fallback to polling",
        );
        self.poll(running).await;
    }

    async fn poll(&self, running: &CancellationToken) {
        let mut debouncer = EdgeDebouncer::new(self.config.debounce);
        let mut ticker = time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut last: Option<PinValue> = None;
        let mut read_failing = false;

        loop {
            tokio::select! {
                _ = running.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let level = match self.sensor.read().await {
                Ok(level) => {
                    if read_failing {
                        self.controller
                            .record(LogLevel::Info, "sound sensor readable again");
                        read_failing = false;
                    }
                    level
                }
                Err(e) => {
                    if !read_failing {
                        self.controller
                            .record(LogLevel::Error, format!("sensor read failed: {e}"));
                        read_failing = true;
                    }
                    continue;
                }
            };

            let Some(previous) = last.replace(level) else {
                continue;
            };
            if previous != level && debouncer.accept(Instant::now()) {
                self.controller.handle_level(level).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::alarm::{Devices, SweepPlan};
    use crate::config::{AlarmPolicy, PinConfig};
    use crate::mock::{MockActuator, MockCamera, MockDelivery, MockNotifier, MockSensor};

    fn start(sensor: Arc<MockSensor>) -> (AlarmController, CancellationToken, tokio::task::JoinHandle<()>) {
        let controller = AlarmController::new(
            Devices {
                actuator: Arc::new(MockActuator::new()),
                sensor: sensor.clone(),
                camera: Arc::new(MockCamera::new()),
                notifier: MockNotifier::new(MockDelivery::Deliver),
            },
            &PinConfig::default(),
            SweepPlan::default(),
            AlarmPolicy::Latch,
        );
        let watcher = SensorWatcher::new(sensor, controller.clone(), SensorConfig::default());
        let running = CancellationToken::new();
        let handle = tokio::spawn(watcher.run(running.clone()));
        (controller, running, handle)
    }

    fn triggers(controller: &AlarmController) -> usize {
        controller
            .recent_logs(crate::status_log::CAPACITY)
            .iter()
            .filter(|e| e.message.starts_with("sound detected"))
            .count()
    }

    async fn pause(ms: u64) {
        time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn edge_triggers_alarm() {
        let sensor = Arc::new(MockSensor::new());
        let (controller, _running, _handle) = start(sensor.clone());
        pause(200).await;

        sensor.set_level(PinValue::Low);
        pause(1).await;

        assert!(controller.state().active);
        assert!(
            controller
                .recent_logs(10)
                .iter()
                .any(|e| e.message == "edge detection enabled on sound sensor")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn detection_waits_for_startup_delay() {
        let sensor = Arc::new(MockSensor::new());
        let (controller, _running, _handle) = start(sensor.clone());

        // Edges before the watcher arms are not seen.
        sensor.set_level(PinValue::Low);
        pause(50).await;
        assert!(!controller.state().active);
    }

    #[tokio::test(start_paused = true)]
    async fn bounce_inside_window_is_coalesced() {
        let sensor = Arc::new(MockSensor::new());
        let (controller, _running, _handle) = start(sensor.clone());
        pause(200).await;

        sensor.set_level(PinValue::Low);
        pause(1).await;
        assert_eq!(triggers(&controller), 1);

        // Re-arm, then bounce within 20 ms of the accepted edge.
        controller.reset().await;
        sensor.set_level(PinValue::High);
        sensor.set_level(PinValue::Low);
        pause(5).await;
        assert!(!controller.state().active);
        assert_eq!(triggers(&controller), 1);

        // A clean edge after a quiet window triggers again.
        pause(30).await;
        sensor.set_level(PinValue::High);
        pause(30).await;
        sensor.set_level(PinValue::Low);
        pause(1).await;
        assert!(controller.state().active);
        assert_eq!(triggers(&controller), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn continuous_chatter_retriggers_after_reset() {
        let sensor = Arc::new(MockSensor::new());
        let (controller, _running, _handle) = start(sensor.clone());
        pause(200).await;

        // While it hears sound the comparator toggles every 15 ms; the
        // owner resets part way through without the room going quiet.
        for i in 0..40 {
            if i == 10 {
                controller.reset().await;
                assert!(!controller.state().active);
            }
            let level = if i % 2 == 0 { PinValue::Low } else { PinValue::High };
            sensor.set_level(level);
            pause(15).await;
        }

        assert!(
            controller.state().active,
            "continuous sound never re-triggered after reset"
        );
        assert_eq!(triggers(&controller), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_to_polling_without_edges() {
        let sensor = Arc::new(MockSensor::without_edges());
        let (controller, _running, _handle) = start(sensor.clone());
        pause(200).await;

        assert!(
            controller
                .recent_logs(10)
                .iter()
                .any(|e| e.level == LogLevel::Error && e.message.contains("fallback to polling"))
        );

        sensor.set_level(PinValue::Low);
        pause(20).await;
        assert!(controller.state().active);
        assert_eq!(triggers(&controller), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_watcher() {
        let sensor = Arc::new(MockSensor::new());
        let (_controller, running, handle) = start(sensor);
        pause(200).await;

        running.cancel();
        handle.await.unwrap();
    }
}

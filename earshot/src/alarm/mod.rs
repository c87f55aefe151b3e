//! The alarm state machine.
//!
//! # States
//!
//! ```text
//!            active-low edge                      reset()
//!   Armed ──────────────────────► Triggered ───────────────► Armed
//!     ▲                              │  ▲
//!     │   cooldown elapsed           │  │ further edges and mock
//!     └──────────────────────────────┘  └─ triggers are no-ops
//!       (AlarmPolicy::Cooldown only)
//! ```
//!
//! Entering `Triggered` sounds the buzzer, lights the LED, sends an
//! alert and starts a capture sweep. Alert and sweep run as tracked
//! background tasks so the sensor watcher and HTTP readers are never
//! held up by a slow camera or relay.
//!
//! # Locking
//!
//! Alarm state and status log share one mutex. It is only ever held
//! for in-memory updates, never across an `.await`.
//!
//! Pin writes go through a second, async lock. Each write and its
//! mirror update happen under it, so overlapping triggers and resets
//! command the outputs one at a time and the reported buzzer/LED state
//! always matches the last command that reached the hardware. A
//! trigger that finds a newer generation once it holds the output lock
//! leaves the outputs alone.

mod indicators;
mod sweep;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::task::TaskTracker;

pub use indicators::Indicators;
pub use sweep::{Shot, SweepPlan, SweepReport};

use crate::capture::Camera;
use crate::config::{AlarmPolicy, PinConfig};
use crate::hw::{self, Actuator, PinValue, SoundSensor};
use crate::notify::{Alert, Notifier, NotifyError};
use crate::status_log::{LogEntry, LogLevel, StatusLog};
use crate::tracing::prelude::*;
use crate::types::Timestamp;

/// Number of log entries included in a snapshot.
pub const SNAPSHOT_LOG_ENTRIES: usize = 10;

/// Process-wide alarm state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlarmState {
    /// Fired and not yet reset.
    pub active: bool,
    /// Mirror of the last successful buzzer command.
    pub buzzer_sounding: bool,
    /// Mirror of the last successful LED command.
    pub led_lit: bool,
    /// Time of the last trigger or reset.
    pub last_event: Option<Timestamp>,
    /// URL of the most recent photo saved by a sweep.
    pub last_photo: Option<String>,
}

impl AlarmState {
    pub fn is_buzzer_sounding(&self) -> bool {
        self.buzzer_sounding
    }
}

/// Consistent copy of the alarm state and the tail of the status log.
#[derive(Debug, Clone)]
pub struct AlarmSnapshot {
    pub state: AlarmState,
    pub logs: Vec<LogEntry>,
}

/// What a sensor reading did to the alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Armed → triggered; side effects started.
    Triggered,
    /// Already triggered; nothing happened.
    AlreadyActive,
    /// The level does not indicate sound.
    Quiet,
}

/// The collaborators the controller drives.
pub struct Devices {
    pub actuator: Arc<dyn Actuator>,
    pub sensor: Arc<dyn SoundSensor>,
    pub camera: Arc<dyn Camera>,
    pub notifier: Arc<dyn Notifier>,
}

#[derive(Debug, Default)]
struct Shared {
    state: AlarmState,
    log: StatusLog,
    sweep_running: bool,
    /// Bumped on every trigger and re-arm so a cooldown timer can tell
    /// whether the alarm it was started for is still the current one.
    generation: u64,
}

struct Inner {
    shared: Mutex<Shared>,
    /// Serializes pin writes together with their mirror updates.
    outputs: AsyncMutex<()>,
    indicators: Indicators,
    sensor: Arc<dyn SoundSensor>,
    camera: Arc<dyn Camera>,
    notifier: Arc<dyn Notifier>,
    sweep: SweepPlan,
    policy: AlarmPolicy,
    tasks: TaskTracker,
}

/// Cheaply cloneable handle to the alarm state machine.
#[derive(Clone)]
pub struct AlarmController {
    inner: Arc<Inner>,
}

impl AlarmController {
    pub fn new(devices: Devices, pins: &PinConfig, sweep: SweepPlan, policy: AlarmPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                shared: Mutex::new(Shared::default()),
                outputs: AsyncMutex::new(()),
                indicators: Indicators::new(devices.actuator, pins),
                sensor: devices.sensor,
                camera: devices.camera,
                notifier: devices.notifier,
                sweep,
                policy,
                tasks: TaskTracker::new(),
            }),
        }
    }

    /// Put the outputs into the safe state and centre the servo.
    ///
    /// Failure here means the hardware is unusable; the daemon treats
    /// it as fatal.
    pub async fn init_outputs(&self) -> hw::Result<()> {
        self.drive_outputs(false, false).await?;
        self.inner
            .indicators
            .actuator()
            .set_servo_angle(self.inner.sweep.center)
            .await
    }

    /// React to a debounced edge on the sound sensor.
    pub async fn on_sensor_edge(&self) -> TriggerOutcome {
        match self.inner.sensor.read().await {
            Ok(level) => self.handle_level(level).await,
            Err(e) => {
                self.record(LogLevel::Error, format!("sensor read failed: {e}"));
                TriggerOutcome::Quiet
            }
        }
    }

    /// Behave as if the sensor had just reported sound.
    pub async fn mock_trigger(&self) -> TriggerOutcome {
        debug!("Mock trigger requested");
        self.handle_level(PinValue::Low).await
    }

    /// Apply one sensor level. The sensor is pulled up and pulls the
    /// line low while it hears sound, so only a low level triggers.
    pub async fn handle_level(&self, level: PinValue) -> TriggerOutcome {
        if level.is_high() {
            return TriggerOutcome::Quiet;
        }

        let now = Timestamp::now();
        let (generation, start_sweep) = {
            let mut shared = self.inner.shared.lock();
            if shared.state.active {
                return TriggerOutcome::AlreadyActive;
            }
            shared.state.active = true;
            shared.state.last_event = Some(now);
            shared.generation += 1;
            let start_sweep = !shared.sweep_running;
            shared.sweep_running = true;
            append(
                &mut shared.log,
                LogLevel::Info,
                "sound detected - start continuous alarm",
            );
            (shared.generation, start_sweep)
        };

        // The transition is visible before any side effect starts.
        self.spawn_alert(Alert::sound_detected(now));
        if start_sweep {
            self.spawn_sweep();
        } else {
            self.record(
                LogLevel::Warn,
                "capture sweep already in progress; not starting another",
            );
        }
        if let AlarmPolicy::Cooldown { hold } = self.inner.policy {
            self.spawn_cooldown(generation, hold);
        }

        let _outputs = self.inner.outputs.lock().await;
        if self.inner.shared.lock().generation != generation {
            debug!("Alarm re-armed before its outputs were driven; leaving them alone");
            return TriggerOutcome::Triggered;
        }
        match self.write_outputs(true, true).await {
            Ok(()) => self.record(LogLevel::Info, "buzzer ON (continuous until reset)"),
            Err(e) => self.record(LogLevel::Error, format!("failed to sound alarm: {e}")),
        }

        TriggerOutcome::Triggered
    }

    /// Silence the outputs and re-arm. Safe to call in any state; the
    /// outputs are always re-commanded and the event time re-stamped.
    ///
    /// The alarm is re-armed as soon as the output lock is taken, so a
    /// detection arriving while the outputs are being silenced starts a
    /// new cycle once this returns.
    pub async fn reset(&self) -> AlarmState {
        let _outputs = self.inner.outputs.lock().await;
        {
            let mut shared = self.inner.shared.lock();
            shared.state.active = false;
            shared.state.last_event = Some(Timestamp::now());
            shared.generation += 1;
        }

        match self.write_outputs(false, false).await {
            Ok(()) => self.record(LogLevel::Info, "buzzer OFF (via reset)"),
            Err(e) => self.record(LogLevel::Error, format!("failed to silence alarm: {e}")),
        }

        let mut shared = self.inner.shared.lock();
        append(&mut shared.log, LogLevel::Info, "alarm reset");
        shared.state.clone()
    }

    /// Current state plus the last [`SNAPSHOT_LOG_ENTRIES`] log entries.
    pub fn snapshot(&self) -> AlarmSnapshot {
        let shared = self.inner.shared.lock();
        AlarmSnapshot {
            state: shared.state.clone(),
            logs: shared.log.recent(SNAPSHOT_LOG_ENTRIES),
        }
    }

    pub fn state(&self) -> AlarmState {
        self.inner.shared.lock().state.clone()
    }

    /// The last `n` status log entries, oldest first.
    pub fn recent_logs(&self, n: usize) -> Vec<LogEntry> {
        self.inner.shared.lock().log.recent(n)
    }

    /// Append to the status log and mirror the entry to tracing.
    pub fn record(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        append(&mut self.inner.shared.lock().log, level, &message);
    }

    /// Wait until all background work started so far has finished.
    pub async fn wait_idle(&self) {
        let tasks = &self.inner.tasks;
        tasks.close();
        tasks.wait().await;
        tasks.reopen();
    }

    /// Let background work finish, then leave the outputs silent and
    /// dark.
    pub async fn shutdown(&self) {
        self.wait_idle().await;
        if let Err(e) = self.drive_outputs(false, false).await {
            self.record(
                LogLevel::Error,
                format!("failed to silence outputs on shutdown: {e}"),
            );
        }
        self.record(LogLevel::Info, "cleaned up.");
    }

    async fn drive_outputs(&self, sounding: bool, lit: bool) -> hw::Result<()> {
        let _outputs = self.inner.outputs.lock().await;
        self.write_outputs(sounding, lit).await
    }

    /// Command buzzer then LED, updating each mirror as soon as its
    /// write has gone through. Stops at the first failure. Callers hold
    /// the output lock.
    async fn write_outputs(&self, sounding: bool, lit: bool) -> hw::Result<()> {
        self.inner.indicators.set_buzzer(sounding).await?;
        self.inner.shared.lock().state.buzzer_sounding = sounding;

        self.inner.indicators.set_led(lit).await?;
        self.inner.shared.lock().state.led_lit = lit;
        Ok(())
    }

    fn photo_saved(&self, url: &str) {
        let mut shared = self.inner.shared.lock();
        shared.state.last_photo = Some(url.to_string());
        append(&mut shared.log, LogLevel::Info, &format!("photo saved: {url}"));
    }

    fn spawn_alert(&self, alert: Alert) {
        let this = self.clone();
        self.inner.tasks.spawn(async move {
            match this.inner.notifier.notify(&alert).await {
                Ok(()) => this.record(LogLevel::Info, "email sent"),
                Err(e @ NotifyError::NotConfigured(_)) => this.record(LogLevel::Warn, e.to_string()),
                Err(e) => this.record(LogLevel::Error, format!("email send failed: {e}")),
            }
        });
    }

    fn spawn_sweep(&self) {
        let this = self.clone();
        self.inner.tasks.spawn(async move {
            let _running = SweepRunning(this.clone());
            this.run_sweep().await;
        });
    }

    fn spawn_cooldown(&self, generation: u64, hold: Duration) {
        let this = self.clone();
        self.inner.tasks.spawn(async move {
            tokio::time::sleep(hold).await;
            this.rearm_after_cooldown(generation).await;
        });
    }

    async fn rearm_after_cooldown(&self, generation: u64) {
        let _outputs = self.inner.outputs.lock().await;
        {
            let mut shared = self.inner.shared.lock();
            if shared.generation != generation || !shared.state.active {
                return;
            }
            shared.state.active = false;
            shared.state.last_event = Some(Timestamp::now());
            shared.generation += 1;
        }

        if let Err(e) = self.write_outputs(false, false).await {
            self.record(LogLevel::Error, format!("failed to silence alarm: {e}"));
        }
        self.record(LogLevel::Info, "alarm re-armed after cooldown");
    }
}

/// Clears the sweep-in-progress flag when the sweep task ends, however
/// it ends.
struct SweepRunning(AlarmController);

impl Drop for SweepRunning {
    fn drop(&mut self) {
        self.0.inner.shared.lock().sweep_running = false;
    }
}

fn append(log: &mut StatusLog, level: LogLevel, message: &str) {
    match level {
        LogLevel::Info => info!("{message}"),
        LogLevel::Warn => warn!("{message}"),
        LogLevel::Error => error!("{message}"),
    }
    log.append(LogEntry::new(level, message));
}

#[cfg(test)]
mod tests {
    use tokio::time;

    use super::*;
    use crate::mock::{MockActuator, MockCamera, MockDelivery, MockNotifier, MockSensor};

    struct Rig {
        controller: AlarmController,
        actuator: Arc<MockActuator>,
        sensor: Arc<MockSensor>,
        camera: Arc<MockCamera>,
        notifier: Arc<MockNotifier>,
    }

    fn rig_with(camera: MockCamera, delivery: MockDelivery, policy: AlarmPolicy) -> Rig {
        rig_on(MockActuator::new(), camera, delivery, policy)
    }

    fn rig_on(
        actuator: MockActuator,
        camera: MockCamera,
        delivery: MockDelivery,
        policy: AlarmPolicy,
    ) -> Rig {
        let actuator = Arc::new(actuator);
        let sensor = Arc::new(MockSensor::new());
        let camera = Arc::new(camera);
        let notifier = MockNotifier::new(delivery);
        let controller = AlarmController::new(
            Devices {
                actuator: actuator.clone(),
                sensor: sensor.clone(),
                camera: camera.clone(),
                notifier: notifier.clone(),
            },
            &PinConfig::default(),
            SweepPlan::default(),
            policy,
        );
        Rig {
            controller,
            actuator,
            sensor,
            camera,
            notifier,
        }
    }

    fn rig() -> Rig {
        rig_with(MockCamera::new(), MockDelivery::Deliver, AlarmPolicy::Latch)
    }

    fn count_logs(controller: &AlarmController, level: LogLevel, needle: &str) -> usize {
        controller
            .recent_logs(crate::status_log::CAPACITY)
            .iter()
            .filter(|e| e.level == level && e.message.contains(needle))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn init_outputs_leaves_hardware_safe() {
        let rig = rig();
        rig.controller.init_outputs().await.unwrap();

        let pins = PinConfig::default();
        assert_eq!(rig.actuator.level(pins.buzzer), Some(PinValue::Low));
        assert_eq!(rig.actuator.level(pins.led), Some(PinValue::Low));
        assert_eq!(rig.actuator.servo_moves(), vec![90]);

        let state = rig.controller.state();
        assert!(!state.active);
        assert!(!state.is_buzzer_sounding());
        assert!(!state.led_lit);
        assert_eq!(state.last_event, None);
    }

    #[tokio::test(start_paused = true)]
    async fn active_low_edge_triggers_alarm() {
        let rig = rig();
        rig.sensor.set_level(PinValue::Low);

        assert_eq!(
            rig.controller.on_sensor_edge().await,
            TriggerOutcome::Triggered
        );

        let snapshot = rig.controller.snapshot();
        assert!(snapshot.state.active);
        assert!(snapshot.state.buzzer_sounding);
        assert!(snapshot.state.led_lit);
        assert!(snapshot.state.last_event.is_some());
        assert!(snapshot.logs.iter().any(|e| e.message.contains("alarm")));

        let pins = PinConfig::default();
        assert_eq!(rig.actuator.level(pins.buzzer), Some(PinValue::High));
        assert_eq!(rig.actuator.level(pins.led), Some(PinValue::High));
    }

    #[tokio::test(start_paused = true)]
    async fn release_edge_does_nothing() {
        let rig = rig();

        assert_eq!(rig.controller.on_sensor_edge().await, TriggerOutcome::Quiet);
        rig.controller.wait_idle().await;

        assert_eq!(rig.controller.state(), AlarmState::default());
        assert_eq!(rig.notifier.attempts(), 0);
        assert!(rig.camera.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_triggers_start_one_cycle() {
        let rig = rig();
        rig.sensor.set_level(PinValue::Low);

        assert_eq!(
            rig.controller.on_sensor_edge().await,
            TriggerOutcome::Triggered
        );
        let stamped = rig.controller.state().last_event;

        assert_eq!(
            rig.controller.on_sensor_edge().await,
            TriggerOutcome::AlreadyActive
        );
        assert_eq!(
            rig.controller.mock_trigger().await,
            TriggerOutcome::AlreadyActive
        );
        rig.controller.wait_idle().await;

        assert_eq!(rig.notifier.attempts(), 1);
        assert_eq!(rig.camera.requests().len(), 4);
        assert_eq!(rig.controller.state().last_event, stamped);
        assert_eq!(
            count_logs(&rig.controller, LogLevel::Info, "sound detected"),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reset_silences_and_rearms() {
        let rig = rig();
        rig.controller.mock_trigger().await;

        let state = rig.controller.reset().await;
        assert!(!state.active);
        assert!(!state.buzzer_sounding);
        assert!(!state.led_lit);

        // Re-armed: the next detection fires again.
        rig.controller.wait_idle().await;
        assert_eq!(
            rig.controller.mock_trigger().await,
            TriggerOutcome::Triggered
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reset_is_idempotent() {
        let rig = rig();

        let first = rig.controller.reset().await;
        assert!(first.last_event.is_some(), "reset stamps even when armed");

        let second = rig.controller.reset().await;
        assert!(!second.active && !second.buzzer_sounding && !second.led_lit);
        assert_eq!(count_logs(&rig.controller, LogLevel::Info, "buzzer OFF"), 2);
        assert_eq!(count_logs(&rig.controller, LogLevel::Info, "alarm reset"), 2);

        // Outputs were re-commanded both times.
        let writes = rig
            .actuator
            .commands()
            .into_iter()
            .filter(|c| matches!(c, crate::mock::ActuatorCommand::Digital { .. }))
            .count();
        assert_eq!(writes, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_visits_every_angle_and_recentres() {
        let rig = rig();
        rig.controller.mock_trigger().await;
        rig.controller.wait_idle().await;

        let angles: Vec<u8> = rig.camera.requests().iter().map(|r| r.angle).collect();
        assert_eq!(angles, vec![20, 60, 100, 140]);
        assert_eq!(rig.actuator.servo_moves(), vec![90, 20, 60, 100, 140, 90]);

        let request = rig.camera.requests()[0];
        assert_eq!((request.width, request.height), (2592, 1944));
        assert_eq!(request.rotation, 180);
    }

    #[tokio::test(start_paused = true)]
    async fn capture_failure_does_not_stop_sweep() {
        let rig = rig_with(
            MockCamera::failing_at([100]),
            MockDelivery::Deliver,
            AlarmPolicy::Latch,
        );
        rig.controller.mock_trigger().await;
        rig.controller.wait_idle().await;

        assert_eq!(rig.camera.requests().len(), 4);
        assert_eq!(
            rig.controller.state().last_photo.as_deref(),
            Some("/captures/mock_a140.jpg")
        );
        assert_eq!(count_logs(&rig.controller, LogLevel::Error, "capture error"), 1);
        assert_eq!(count_logs(&rig.controller, LogLevel::Info, "photo saved"), 3);
        // The sweep never touches alarm state.
        assert!(rig.controller.state().active);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_is_not_held_up_by_capture() {
        let rig = rig_with(
            MockCamera::new().with_delay(Duration::from_secs(30)),
            MockDelivery::Deliver,
            AlarmPolicy::Latch,
        );
        rig.controller.mock_trigger().await;

        // Let the sweep reach its first (slow) capture.
        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(rig.camera.requests().len(), 1);

        let snapshot = rig.controller.snapshot();
        assert!(snapshot.state.active);
        assert_eq!(snapshot.state.last_photo, None);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_during_sweep_lets_it_finish() {
        let rig = rig_with(
            MockCamera::new().with_delay(Duration::from_secs(1)),
            MockDelivery::Deliver,
            AlarmPolicy::Latch,
        );
        rig.controller.mock_trigger().await;
        time::sleep(Duration::from_secs(2)).await;

        let state = rig.controller.reset().await;
        assert!(!state.active);

        rig.controller.wait_idle().await;
        assert_eq!(rig.camera.requests().len(), 4);
        let state = rig.controller.state();
        assert!(!state.active);
        assert_eq!(state.last_photo.as_deref(), Some("/captures/mock_a140.jpg"));
    }

    #[tokio::test(start_paused = true)]
    async fn retrigger_during_running_sweep_does_not_start_second_sweep() {
        let rig = rig_with(
            MockCamera::new().with_delay(Duration::from_secs(5)),
            MockDelivery::Deliver,
            AlarmPolicy::Latch,
        );
        rig.controller.mock_trigger().await;
        time::sleep(Duration::from_secs(1)).await;
        rig.controller.reset().await;

        assert_eq!(
            rig.controller.mock_trigger().await,
            TriggerOutcome::Triggered
        );
        rig.controller.wait_idle().await;

        assert_eq!(rig.camera.requests().len(), 4);
        assert_eq!(rig.notifier.attempts(), 2);
        assert_eq!(
            count_logs(&rig.controller, LogLevel::Warn, "already in progress"),
            1
        );

        // Once the sweep is done a new cycle sweeps again.
        rig.controller.reset().await;
        rig.controller.mock_trigger().await;
        rig.controller.wait_idle().await;
        assert_eq!(rig.camera.requests().len(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn alert_carries_detection_details() {
        let rig = rig();
        rig.controller.mock_trigger().await;
        rig.controller.wait_idle().await;

        let sent = rig.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].subject.contains("sound detected"));
        assert_eq!(count_logs(&rig.controller, LogLevel::Info, "email sent"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unconfigured_notifier_is_a_warning() {
        let rig = rig_with(
            MockCamera::new(),
            MockDelivery::NotConfigured,
            AlarmPolicy::Latch,
        );
        rig.controller.mock_trigger().await;
        rig.controller.wait_idle().await;

        assert_eq!(count_logs(&rig.controller, LogLevel::Warn, "not configured"), 1);
        assert!(rig.controller.state().active);
    }

    #[tokio::test(start_paused = true)]
    async fn notifier_failure_is_logged_and_swallowed() {
        let rig = rig_with(MockCamera::new(), MockDelivery::Fail, AlarmPolicy::Latch);
        rig.controller.mock_trigger().await;
        rig.controller.wait_idle().await;

        assert_eq!(
            count_logs(&rig.controller, LogLevel::Error, "email send failed"),
            1
        );
        assert_eq!(rig.notifier.attempts(), 1);
        assert_eq!(rig.camera.requests().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn actuator_failure_keeps_mirror_honest() {
        let rig = rig();
        rig.actuator.fail_writes(true);

        assert_eq!(
            rig.controller.mock_trigger().await,
            TriggerOutcome::Triggered
        );
        let state = rig.controller.state();
        assert!(state.active);
        assert!(!state.buzzer_sounding, "write failed, mirror unchanged");
        assert_eq!(
            count_logs(&rig.controller, LogLevel::Error, "failed to sound alarm"),
            1
        );

        rig.actuator.fail_writes(false);
        let state = rig.controller.reset().await;
        assert!(!state.active);
    }

    /// Hardware levels and mirrors agree, and a re-armed alarm is dark.
    fn assert_outputs_match_mirror(rig: &Rig) {
        let pins = PinConfig::default();
        let state = rig.controller.state();
        assert_eq!(
            rig.actuator.level(pins.buzzer),
            Some(PinValue::from_bool(state.buzzer_sounding)),
            "buzzer mirror drifted from hardware"
        );
        assert_eq!(
            rig.actuator.level(pins.led),
            Some(PinValue::from_bool(state.led_lit)),
            "LED mirror drifted from hardware"
        );
        assert_eq!(state.led_lit, state.active);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_overlapping_slow_trigger_leaves_outputs_off() {
        let rig = rig_on(
            MockActuator::new().with_slow_writes(PinValue::High, Duration::from_millis(50)),
            MockCamera::new(),
            MockDelivery::Deliver,
            AlarmPolicy::Latch,
        );

        let (outcome, after) = tokio::join!(rig.controller.mock_trigger(), rig.controller.reset());
        assert_eq!(outcome, TriggerOutcome::Triggered);
        assert!(!after.active);
        assert!(!after.buzzer_sounding && !after.led_lit);

        assert_outputs_match_mirror(&rig);
        assert!(!rig.controller.state().active);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_during_slow_reset_sounds_after_it() {
        let rig = rig_on(
            MockActuator::new().with_slow_writes(PinValue::Low, Duration::from_millis(50)),
            MockCamera::new(),
            MockDelivery::Deliver,
            AlarmPolicy::Latch,
        );

        let (_, outcome) = tokio::join!(rig.controller.reset(), rig.controller.mock_trigger());
        assert_eq!(outcome, TriggerOutcome::Triggered);

        let state = rig.controller.state();
        assert!(state.active);
        assert!(state.buzzer_sounding);
        assert_outputs_match_mirror(&rig);
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_policy_rearms_automatically() {
        let rig = rig_with(
            MockCamera::new(),
            MockDelivery::Deliver,
            AlarmPolicy::Cooldown {
                hold: Duration::from_secs(5),
            },
        );
        rig.controller.mock_trigger().await;
        rig.controller.wait_idle().await;

        let state = rig.controller.state();
        assert!(!state.active);
        assert!(!state.buzzer_sounding);
        assert_eq!(
            count_logs(&rig.controller, LogLevel::Info, "re-armed after cooldown"),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stale_cooldown_does_not_end_newer_alarm() {
        let rig = rig_with(
            MockCamera::new(),
            MockDelivery::Deliver,
            AlarmPolicy::Cooldown {
                hold: Duration::from_secs(5),
            },
        );
        rig.controller.mock_trigger().await;
        time::sleep(Duration::from_secs(3)).await;
        rig.controller.reset().await;
        rig.controller.mock_trigger().await;

        // First timer fires at t=5 and must leave the second alarm alone.
        time::sleep(Duration::from_secs(3)).await;
        assert!(rig.controller.state().active);

        // Second timer fires at t=8.
        time::sleep(Duration::from_secs(3)).await;
        assert!(!rig.controller.state().active);
        assert_eq!(
            count_logs(&rig.controller, LogLevel::Info, "re-armed after cooldown"),
            1
        );
    }
}

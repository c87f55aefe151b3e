//! In-memory stand-ins for the hardware, camera and mail relay.
//!
//! Selected with `EARSHOT_HARDWARE=mock` to run the whole daemon on a
//! workstation, and used by the tests. Every command is recorded so it
//! can be inspected afterwards.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::capture::{Camera, CaptureError, CaptureRequest, PHOTO_URL_PREFIX, PhotoRef};
use crate::hw::{Actuator, EdgeReceiver, HwError, PinValue, Result, SoundSensor};
use crate::notify::{Alert, Notifier, NotifyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCommand {
    Digital { pin: u8, value: PinValue },
    Servo(u8),
}

#[derive(Default)]
pub struct MockActuator {
    commands: Mutex<Vec<ActuatorCommand>>,
    levels: Mutex<HashMap<u8, PinValue>>,
    slow_writes: Option<(PinValue, Duration)>,
    fail_writes: AtomicBool,
}

impl MockActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make digital writes of `value` take `delay` to return. The level
    /// itself is applied at once, like a driver that is slow to ack.
    pub fn with_slow_writes(mut self, value: PinValue, delay: Duration) -> Self {
        self.slow_writes = Some((value, delay));
        self
    }

    /// Make subsequent digital writes fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn commands(&self) -> Vec<ActuatorCommand> {
        self.commands.lock().clone()
    }

    pub fn servo_moves(&self) -> Vec<u8> {
        self.commands
            .lock()
            .iter()
            .filter_map(|c| match c {
                ActuatorCommand::Servo(angle) => Some(*angle),
                _ => None,
            })
            .collect()
    }

    /// Last level written to `pin`, if any.
    pub fn level(&self, pin: u8) -> Option<PinValue> {
        self.levels.lock().get(&pin).copied()
    }
}

#[async_trait]
impl Actuator for MockActuator {
    async fn write_digital(&self, pin: u8, value: PinValue) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(HwError::Other(format!("injected write failure on GPIO {pin}")));
        }
        self.levels.lock().insert(pin, value);
        self.commands
            .lock()
            .push(ActuatorCommand::Digital { pin, value });
        if let Some((slow, delay)) = self.slow_writes {
            if slow == value {
                tokio::time::sleep(delay).await;
            }
        }
        Ok(())
    }

    async fn set_servo_angle(&self, degrees: u8) -> Result<()> {
        let degrees = degrees.min(180);
        self.commands.lock().push(ActuatorCommand::Servo(degrees));
        Ok(())
    }
}

/// A sensor pin whose level is set by hand.
///
/// Starts high (quiet, given the pull-up). Level changes are reported
/// as edges to whoever called [`edges`](SoundSensor::edges), unless the
/// sensor was built without edge support.
pub struct MockSensor {
    level: Mutex<PinValue>,
    edge_tx: Mutex<Option<mpsc::Sender<()>>>,
    edge_capable: bool,
}

impl Default for MockSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSensor {
    pub fn new() -> Self {
        Self {
            level: Mutex::new(PinValue::High),
            edge_tx: Mutex::new(None),
            edge_capable: true,
        }
    }

    /// A sensor that only supports polling.
    pub fn without_edges() -> Self {
        Self {
            edge_capable: false,
            ..Self::new()
        }
    }

    pub fn set_level(&self, value: PinValue) {
        let changed = {
            let mut level = self.level.lock();
            let changed = *level != value;
            *level = value;
            changed
        };
        if changed {
            if let Some(tx) = self.edge_tx.lock().as_ref() {
                let _ = tx.try_send(());
            }
        }
    }
}

#[async_trait]
impl SoundSensor for MockSensor {
    async fn read(&self) -> Result<PinValue> {
        Ok(*self.level.lock())
    }

    async fn edges(&self) -> Result<EdgeReceiver> {
        if !self.edge_capable {
            return Err(HwError::EdgeDetectionUnavailable {
                pin: 0,
                reason: "mock sensor built without edge support".to_string(),
            });
        }
        let (tx, rx) = mpsc::channel(64);
        *self.edge_tx.lock() = Some(tx);
        Ok(rx)
    }
}

/// A camera that "saves" a photo per request, failing on chosen angles.
#[derive(Default)]
pub struct MockCamera {
    failing_angles: BTreeSet<u8>,
    delay: Duration,
    requests: Mutex<Vec<CaptureRequest>>,
}

impl MockCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(angles: impl IntoIterator<Item = u8>) -> Self {
        Self {
            failing_angles: angles.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Make every capture take `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<CaptureRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Camera for MockCamera {
    async fn capture(&self, request: CaptureRequest) -> std::result::Result<PhotoRef, CaptureError> {
        self.requests.lock().push(request);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing_angles.contains(&request.angle) {
            return Err(CaptureError::Other(format!(
                "mock camera failure at {} degrees",
                request.angle
            )));
        }
        let file_name = format!("mock_a{}.jpg", request.angle);
        Ok(PhotoRef {
            path: file_name.clone().into(),
            url: format!("{PHOTO_URL_PREFIX}/{file_name}"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockDelivery {
    #[default]
    Deliver,
    NotConfigured,
    Fail,
}

/// A notifier that keeps what it was asked to send.
#[derive(Default)]
pub struct MockNotifier {
    delivery: MockDelivery,
    attempts: AtomicUsize,
    sent: Mutex<Vec<Alert>>,
}

impl MockNotifier {
    pub fn new(delivery: MockDelivery) -> Arc<Self> {
        Arc::new(Self {
            delivery,
            ..Self::default()
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<Alert> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, alert: &Alert) -> std::result::Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.delivery {
            MockDelivery::Deliver => {
                self.sent.lock().push(alert.clone());
                Ok(())
            }
            MockDelivery::NotConfigured => Err(NotifyError::NotConfigured("EARSHOT_NOTIFY_URL")),
            MockDelivery::Fail => Err(NotifyError::Other("mock relay unreachable".to_string())),
        }
    }
}

//! Hardware capabilities consumed by the alarm core.
//!
//! The core never touches pins directly. It drives outputs through an
//! [`Actuator`] and watches the microphone comparator through a
//! [`SoundSensor`]. Backends: [`sysfs`] for Linux boards and
//! [`crate::mock`] for running without hardware.

#[cfg(target_os = "linux")]
pub mod sysfs;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Logic level of a digital pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinValue {
    Low,
    High,
}

impl PinValue {
    pub fn from_bool(high: bool) -> Self {
        if high { PinValue::High } else { PinValue::Low }
    }

    pub fn is_high(self) -> bool {
        self == PinValue::High
    }
}

impl From<PinValue> for u8 {
    fn from(value: PinValue) -> u8 {
        match value {
            PinValue::Low => 0,
            PinValue::High => 1,
        }
    }
}

#[derive(Debug, Error)]
pub enum HwError {
    #[error("GPIO {pin}: {source}")]
    Gpio {
        pin: u8,
        #[source]
        source: std::io::Error,
    },

    #[error("PWM: {0}")]
    Pwm(#[source] std::io::Error),

    #[error("edge detection unavailable on GPIO {pin}: {reason}")]
    EdgeDetectionUnavailable { pin: u8, reason: String },

    #[error("unexpected value {value:?} read from GPIO {pin}")]
    InvalidValue { pin: u8, value: String },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, HwError>;

/// One item per detected edge on the sensor pin. The receiver closes
/// when the backend stops watching.
pub type EdgeReceiver = mpsc::Receiver<()>;

/// Output side: buzzer and LED pins plus the pan servo.
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Drive a digital output pin.
    async fn write_digital(&self, pin: u8, value: PinValue) -> Result<()>;

    /// Move the pan servo to `degrees` (clamped to 0--180).
    ///
    /// Returns once the pulse has been held long enough for the servo
    /// to get there and then released, so the servo does not jitter
    /// while the camera exposes.
    async fn set_servo_angle(&self, degrees: u8) -> Result<()>;
}

/// Input side: the sound sensor's digital output.
#[async_trait]
pub trait SoundSensor: Send + Sync {
    /// Sample the current pin level.
    async fn read(&self) -> Result<PinValue>;

    /// Arm hardware edge detection on both edges.
    ///
    /// Fails with [`HwError::EdgeDetectionUnavailable`] when the
    /// platform cannot deliver edge interrupts; callers fall back to
    /// polling [`read`](Self::read).
    async fn edges(&self) -> Result<EdgeReceiver>;
}

//! Linux sysfs GPIO and PWM backend.
//!
//! Digital pins go through `/sys/class/gpio`, the pan servo through a
//! hardware PWM channel under `/sys/class/pwm`. Input pull-ups cannot
//! be set through sysfs; the sound pin must be pulled up by the board
//! configuration (e.g. `gpio=25=ip,pu` in the Pi's `config.txt`).

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::{fs, time};

use super::{Actuator, EdgeReceiver, HwError, PinValue, Result, SoundSensor};
use crate::tracing::prelude::*;

const GPIO_ROOT: &str = "/sys/class/gpio";
const PWM_ROOT: &str = "/sys/class/pwm";

/// 50 Hz, the standard hobby-servo frame.
const SERVO_PERIOD_NS: u64 = 20_000_000;

/// How long the positioning pulse is held before it is released.
const SERVO_HOLD: Duration = Duration::from_millis(350);

/// udev fixes permissions on freshly exported nodes asynchronously.
const EXPORT_RETRIES: u32 = 20;
const EXPORT_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Upper bound on how long the edge thread blocks before checking
/// whether anyone is still listening.
const EDGE_POLL_TIMEOUT_MS: u16 = 250;

/// Servo duty cycle in percent for an angle: 2 % at 0° to 12 % at 180°.
pub fn servo_duty_percent(degrees: u8) -> f64 {
    2.0 + f64::from(degrees.min(180)) / 18.0
}

fn servo_duty_ns(degrees: u8) -> u64 {
    (SERVO_PERIOD_NS as f64 * servo_duty_percent(degrees) / 100.0).round() as u64
}

/// One exported sysfs GPIO line.
#[derive(Debug, Clone)]
struct GpioLine {
    number: u8,
    dir: PathBuf,
}

impl GpioLine {
    async fn export(number: u8, direction: &str) -> Result<Self> {
        let root = Path::new(GPIO_ROOT);
        let dir = root.join(format!("gpio{number}"));
        let err = |source| HwError::Gpio {
            pin: number,
            source,
        };

        if !fs::try_exists(&dir).await.unwrap_or(false) {
            fs::write(root.join("export"), number.to_string())
                .await
                .map_err(err)?;
        }

        let line = Self { number, dir };
        line.write_attr("direction", direction).await?;
        Ok(line)
    }

    async fn write_attr(&self, attr: &str, value: &str) -> Result<()> {
        let path = self.dir.join(attr);
        let mut attempt = 0;
        loop {
            match fs::write(&path, value).await {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied && attempt < EXPORT_RETRIES => {
                    attempt += 1;
                    time::sleep(EXPORT_RETRY_DELAY).await;
                }
                Err(source) => {
                    return Err(HwError::Gpio {
                        pin: self.number,
                        source,
                    });
                }
            }
        }
    }

    async fn write(&self, value: PinValue) -> Result<()> {
        let level = if value.is_high() { "1" } else { "0" };
        self.write_attr("value", level).await
    }

    async fn read(&self) -> Result<PinValue> {
        let raw = fs::read_to_string(self.dir.join("value"))
            .await
            .map_err(|source| HwError::Gpio {
                pin: self.number,
                source,
            })?;
        parse_level(self.number, &raw)
    }
}

fn parse_level(pin: u8, raw: &str) -> Result<PinValue> {
    match raw.trim() {
        "0" => Ok(PinValue::Low),
        "1" => Ok(PinValue::High),
        other => Err(HwError::InvalidValue {
            pin,
            value: other.to_string(),
        }),
    }
}

/// A sysfs PWM channel configured for servo pulses.
#[derive(Debug)]
struct ServoPwm {
    dir: PathBuf,
}

impl ServoPwm {
    async fn open(chip: u8, channel: u8) -> Result<Self> {
        let chip_dir = Path::new(PWM_ROOT).join(format!("pwmchip{chip}"));
        let dir = chip_dir.join(format!("pwm{channel}"));

        if !fs::try_exists(&dir).await.unwrap_or(false) {
            fs::write(chip_dir.join("export"), channel.to_string())
                .await
                .map_err(HwError::Pwm)?;
        }

        let pwm = Self { dir };
        pwm.write_attr("period", &SERVO_PERIOD_NS.to_string()).await?;
        pwm.write_attr("duty_cycle", "0").await?;
        pwm.write_attr("enable", "1").await?;
        Ok(pwm)
    }

    async fn write_attr(&self, attr: &str, value: &str) -> Result<()> {
        let path = self.dir.join(attr);
        let mut attempt = 0;
        loop {
            match fs::write(&path, value).await {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied && attempt < EXPORT_RETRIES => {
                    attempt += 1;
                    time::sleep(EXPORT_RETRY_DELAY).await;
                }
                Err(e) => return Err(HwError::Pwm(e)),
            }
        }
    }

    async fn set_duty_ns(&self, duty: u64) -> Result<()> {
        self.write_attr("duty_cycle", &duty.to_string()).await
    }
}

/// Buzzer/LED outputs and the pan servo.
pub struct SysfsActuator {
    outputs: HashMap<u8, GpioLine>,
    servo: ServoPwm,
}

impl SysfsActuator {
    /// Export `output_pins` as outputs and claim the servo PWM channel.
    pub async fn open(output_pins: &[u8], pwm_chip: u8, pwm_channel: u8) -> Result<Self> {
        let servo = ServoPwm::open(pwm_chip, pwm_channel).await?;
        let mut outputs = HashMap::new();
        for &pin in output_pins {
            outputs.insert(pin, GpioLine::export(pin, "out").await?);
        }
        debug!(?output_pins, pwm_chip, pwm_channel, "sysfs actuator ready");
        Ok(Self { outputs, servo })
    }
}

#[async_trait]
impl Actuator for SysfsActuator {
    async fn write_digital(&self, pin: u8, value: PinValue) -> Result<()> {
        let line = self
            .outputs
            .get(&pin)
            .ok_or_else(|| HwError::Other(format!("GPIO {pin} is not configured as an output")))?;
        line.write(value).await
    }

    async fn set_servo_angle(&self, degrees: u8) -> Result<()> {
        let degrees = degrees.min(180);
        self.servo.set_duty_ns(servo_duty_ns(degrees)).await?;
        time::sleep(SERVO_HOLD).await;
        self.servo.set_duty_ns(0).await
    }
}

/// The sound sensor's digital output pin.
pub struct SysfsSoundSensor {
    line: GpioLine,
}

impl SysfsSoundSensor {
    pub async fn open(pin: u8) -> Result<Self> {
        let line = GpioLine::export(pin, "in").await?;
        Ok(Self { line })
    }
}

#[async_trait]
impl SoundSensor for SysfsSoundSensor {
    async fn read(&self) -> Result<PinValue> {
        self.line.read().await
    }

    async fn edges(&self) -> Result<EdgeReceiver> {
        let pin = self.line.number;
        let unavailable = |reason: String| HwError::EdgeDetectionUnavailable { pin, reason };

        fs::write(self.line.dir.join("edge"), "both")
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        let file =
            File::open(self.line.dir.join("value")).map_err(|e| unavailable(e.to_string()))?;

        let (tx, rx) = mpsc::channel(16);
        tokio::task::spawn_blocking(move || watch_edges(file, pin, tx));
        Ok(rx)
    }
}

/// Block in poll(2) on the value file and forward each edge.
///
/// sysfs signals an edge as POLLPRI; the value must be re-read from
/// offset 0 to re-arm the notification.
fn watch_edges(mut file: File, pin: u8, tx: mpsc::Sender<()>) {
    let mut buf = [0u8; 4];
    let _ = file.read(&mut buf);

    loop {
        if tx.is_closed() {
            break;
        }

        let ready = {
            let mut fds = [PollFd::new(
                file.as_fd(),
                PollFlags::POLLPRI | PollFlags::POLLERR,
            )];
            poll(&mut fds, PollTimeout::from(EDGE_POLL_TIMEOUT_MS))
        };

        match ready {
            Ok(0) => continue,
            Ok(_) => {
                if let Err(e) = file
                    .seek(SeekFrom::Start(0))
                    .and_then(|_| file.read(&mut buf))
                {
                    error!(pin, error = %e, "Failed to re-arm edge notification");
                    break;
                }
                match tx.try_send(()) {
                    Ok(()) | Err(TrySendError::Full(())) => {}
                    Err(TrySendError::Closed(())) => break,
                }
            }
            Err(Errno::EINTR) => continue,
            Err(e) => {
                error!(pin, error = %e, "poll() on GPIO value failed");
                break;
            }
        }
    }

    trace!(pin, "Edge watcher thread stopped");
}

//! Daemon configuration.
//!
//! Read once at startup from `EARSHOT_*` environment variables. Unset
//! variables fall back to the defaults below, which match the wiring
//! of the reference build (Raspberry Pi, LM393 sound module, SG90 pan
//! servo, OV5647 camera).

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use strum::{Display, EnumString};
use thiserror::Error;

use crate::notify::WebhookConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Which hardware the daemon drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum HardwareBackend {
    /// Linux sysfs GPIO and PWM.
    Sysfs,
    /// In-memory pins; nothing physical moves.
    Mock,
}

/// What happens after the alarm fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmPolicy {
    /// Stay triggered until an explicit reset.
    Latch,
    /// Re-arm automatically once `hold` has passed since the trigger.
    Cooldown { hold: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinConfig {
    pub sound: u8,
    pub led: u8,
    pub buzzer: u8,
    /// Buzzer sounds when its pin is driven low.
    pub buzzer_active_low: bool,
    pub pwm_chip: u8,
    pub pwm_channel: u8,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            sound: 25,
            led: 22,
            buzzer: 23,
            buzzer_active_low: false,
            pwm_chip: 0,
            pwm_channel: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepConfig {
    /// Pan angles visited in order, degrees.
    pub angles: Vec<u8>,
    pub center: u8,
    /// Wait after each move before shooting.
    pub settle: Duration,
    pub photo_dir: PathBuf,
    pub capture_command: String,
    pub width: u32,
    pub height: u32,
    pub rotation: u16,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            angles: vec![20, 60, 100, 140],
            center: 90,
            settle: Duration::from_millis(600),
            photo_dir: PathBuf::from("captures"),
            capture_command: "rpicam-still".to_string(),
            width: 2592,
            height: 1944,
            rotation: 180,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorConfig {
    pub debounce: Duration,
    pub poll_interval: Duration,
    /// Delay before detection is armed, letting the comparator settle.
    pub startup_delay: Duration,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(20),
            poll_interval: Duration::from_millis(5),
            startup_delay: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_bind: SocketAddr,
    pub hardware: HardwareBackend,
    pub policy: AlarmPolicy,
    pub pins: PinConfig,
    pub sweep: SweepConfig,
    pub sensor: SensorConfig,
    pub notify: WebhookConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_bind: SocketAddr::from(([0, 0, 0, 0], 5000)),
            hardware: HardwareBackend::Sysfs,
            policy: AlarmPolicy::Latch,
            pins: PinConfig::default(),
            sweep: SweepConfig::default(),
            sensor: SensorConfig::default(),
            notify: WebhookConfig::default(),
        }
    }
}

const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);
        let defaults = Config::default();

        let pins = PinConfig {
            sound: env.parse("EARSHOT_SOUND_PIN", defaults.pins.sound)?,
            led: env.parse("EARSHOT_LED_PIN", defaults.pins.led)?,
            buzzer: env.parse("EARSHOT_BUZZER_PIN", defaults.pins.buzzer)?,
            buzzer_active_low: env
                .parse("EARSHOT_BUZZER_ACTIVE_LOW", defaults.pins.buzzer_active_low)?,
            pwm_chip: env.parse("EARSHOT_PWM_CHIP", defaults.pins.pwm_chip)?,
            pwm_channel: env.parse("EARSHOT_PWM_CHANNEL", defaults.pins.pwm_channel)?,
        };

        let (width, height) = match env.get("EARSHOT_RESOLUTION") {
            Some(value) => parse_resolution(&value).ok_or_else(|| ConfigError::Invalid {
                var: "EARSHOT_RESOLUTION",
                value,
                reason: "expected WIDTHxHEIGHT".to_string(),
            })?,
            None => (defaults.sweep.width, defaults.sweep.height),
        };

        let sweep = SweepConfig {
            angles: match env.get("EARSHOT_SWEEP_ANGLES") {
                Some(value) => parse_angles(&value).map_err(|reason| ConfigError::Invalid {
                    var: "EARSHOT_SWEEP_ANGLES",
                    value,
                    reason,
                })?,
                None => defaults.sweep.angles,
            },
            center: env.angle("EARSHOT_SERVO_CENTER", defaults.sweep.center)?,
            settle: env.millis("EARSHOT_SETTLE_MS", defaults.sweep.settle)?,
            photo_dir: env
                .get("EARSHOT_PHOTO_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.sweep.photo_dir),
            capture_command: env
                .get("EARSHOT_CAPTURE_COMMAND")
                .unwrap_or(defaults.sweep.capture_command),
            width,
            height,
            rotation: env.parse("EARSHOT_ROTATION", defaults.sweep.rotation)?,
        };

        let sensor = SensorConfig {
            debounce: env.millis("EARSHOT_DEBOUNCE_MS", defaults.sensor.debounce)?,
            poll_interval: env.millis("EARSHOT_POLL_INTERVAL_MS", defaults.sensor.poll_interval)?,
            startup_delay: defaults.sensor.startup_delay,
        };
        if sensor.poll_interval.is_zero() {
            return Err(ConfigError::Invalid {
                var: "EARSHOT_POLL_INTERVAL_MS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let policy = match env.get("EARSHOT_ALARM_POLICY").as_deref() {
            None | Some("latch") => AlarmPolicy::Latch,
            Some("cooldown") => AlarmPolicy::Cooldown {
                hold: Duration::from_secs(
                    env.parse("EARSHOT_COOLDOWN_SECS", DEFAULT_COOLDOWN.as_secs())?,
                ),
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "EARSHOT_ALARM_POLICY",
                    value: other.to_string(),
                    reason: "expected `latch` or `cooldown`".to_string(),
                });
            }
        };

        Ok(Config {
            api_bind: env.parse("EARSHOT_API_BIND", defaults.api_bind)?,
            hardware: env.parse("EARSHOT_HARDWARE", defaults.hardware)?,
            policy,
            pins,
            sweep,
            sensor,
            notify: WebhookConfig {
                url: env.get("EARSHOT_NOTIFY_URL"),
                token: env.get("EARSHOT_NOTIFY_TOKEN"),
                to: env.get("EARSHOT_NOTIFY_TO"),
            },
        })
    }
}

struct Env<'a, F>(&'a F);

impl<F> Env<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-empty value of `var`.
    fn get(&self, var: &str) -> Option<String> {
        (self.0)(var).filter(|v| !v.trim().is_empty())
    }

    fn parse<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(var) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::Invalid {
                    var,
                    value,
                    reason: e.to_string(),
                }),
            None => Ok(default),
        }
    }

    fn millis(&self, var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        let ms: u64 = self.parse(var, default.as_millis() as u64)?;
        Ok(Duration::from_millis(ms))
    }

    fn angle(&self, var: &'static str, default: u8) -> Result<u8, ConfigError> {
        let degrees: u8 = self.parse(var, default)?;
        if degrees > 180 {
            return Err(ConfigError::Invalid {
                var,
                value: degrees.to_string(),
                reason: "angle must be within 0..=180".to_string(),
            });
        }
        Ok(degrees)
    }
}

fn parse_angles(value: &str) -> Result<Vec<u8>, String> {
    let angles = value
        .split(',')
        .map(|part| {
            let part = part.trim();
            match part.parse::<u8>() {
                Ok(a) if a <= 180 => Ok(a),
                _ => Err(format!("`{part}` is not an angle within 0..=180")),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    if angles.is_empty() {
        return Err("at least one angle is required".to_string());
    }
    Ok(angles)
}

fn parse_resolution(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.trim().split_once(['x', 'X'])?;
    let (w, h) = (w.trim().parse().ok()?, h.trim().parse().ok()?);
    (w > 0 && h > 0).then_some((w, h))
}

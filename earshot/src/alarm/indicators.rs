use std::sync::Arc;

use crate::config::PinConfig;
use crate::hw::{self, Actuator, PinValue};

/// Buzzer and LED addressed by meaning rather than pin level.
///
/// The buzzer module may be wired active-low; callers only ever say
/// whether it should be sounding and this adapter picks the level.
#[derive(Clone)]
pub struct Indicators {
    actuator: Arc<dyn Actuator>,
    buzzer_pin: u8,
    led_pin: u8,
    buzzer_active_low: bool,
}

impl Indicators {
    pub fn new(actuator: Arc<dyn Actuator>, pins: &PinConfig) -> Self {
        Self {
            actuator,
            buzzer_pin: pins.buzzer,
            led_pin: pins.led,
            buzzer_active_low: pins.buzzer_active_low,
        }
    }

    pub fn buzzer_level(&self, sounding: bool) -> PinValue {
        PinValue::from_bool(sounding != self.buzzer_active_low)
    }

    pub async fn set_buzzer(&self, sounding: bool) -> hw::Result<()> {
        self.actuator
            .write_digital(self.buzzer_pin, self.buzzer_level(sounding))
            .await
    }

    pub async fn set_led(&self, lit: bool) -> hw::Result<()> {
        self.actuator
            .write_digital(self.led_pin, PinValue::from_bool(lit))
            .await
    }

    pub fn actuator(&self) -> &Arc<dyn Actuator> {
        &self.actuator
    }
}

//! Panoramic capture sweep.
//!
//! Centre the servo, then visit each configured angle: move, let the
//! mount settle, shoot. A failed shot is recorded and the sweep moves
//! on; the servo is returned to centre at the end either way.

use std::time::Duration;

use tokio::time;

use super::AlarmController;
use crate::capture::CaptureRequest;
use crate::config::SweepConfig;
use crate::status_log::LogLevel;
use crate::tracing::prelude::*;

/// Pause after the initial centring move, before the first angle.
const CENTER_SETTLE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepPlan {
    pub angles: Vec<u8>,
    pub center: u8,
    pub settle: Duration,
    pub width: u32,
    pub height: u32,
    pub rotation: u16,
}

impl From<&SweepConfig> for SweepPlan {
    fn from(config: &SweepConfig) -> Self {
        Self {
            angles: config.angles.clone(),
            center: config.center,
            settle: config.settle,
            width: config.width,
            height: config.height,
            rotation: config.rotation,
        }
    }
}

impl Default for SweepPlan {
    fn default() -> Self {
        Self::from(&SweepConfig::default())
    }
}

/// Result of one stop of the sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shot {
    pub angle: u8,
    /// Photo URL on success, error text on failure.
    pub outcome: Result<String, String>,
}

/// Everything one sweep did. Only lives until the sweep task logs it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub shots: Vec<Shot>,
}

impl SweepReport {
    pub fn saved(&self) -> usize {
        self.shots.iter().filter(|s| s.outcome.is_ok()).count()
    }
}

impl AlarmController {
    /// Run one sweep to completion.
    ///
    /// Touches only the photo reference and the status log; the alarm
    /// state itself is left alone, so a reset mid-sweep does not stop
    /// it.
    pub(super) async fn run_sweep(&self) -> SweepReport {
        let plan = &self.inner.sweep;
        let actuator = self.inner.indicators.actuator().clone();
        let mut report = SweepReport::default();

        if let Err(e) = actuator.set_servo_angle(plan.center).await {
            self.record(LogLevel::Warn, format!("servo centring failed: {e}"));
        }
        time::sleep(CENTER_SETTLE).await;

        for &angle in &plan.angles {
            self.record(LogLevel::Info, format!("move to {angle}"));

            if let Err(e) = actuator.set_servo_angle(angle).await {
                self.record(LogLevel::Error, format!("servo move to {angle} failed: {e}"));
                report.shots.push(Shot {
                    angle,
                    outcome: Err(e.to_string()),
                });
                continue;
            }
            time::sleep(plan.settle).await;

            let request = CaptureRequest {
                angle,
                width: plan.width,
                height: plan.height,
                rotation: plan.rotation,
            };
            let outcome = match self.inner.camera.capture(request).await {
                Ok(photo) => {
                    self.photo_saved(&photo.url);
                    Ok(photo.url)
                }
                Err(e) => {
                    self.record(LogLevel::Error, format!("capture error at {angle}: {e}"));
                    Err(e.to_string())
                }
            };
            report.shots.push(Shot { angle, outcome });
        }

        if let Err(e) = actuator.set_servo_angle(plan.center).await {
            self.record(LogLevel::Warn, format!("servo return to centre failed: {e}"));
        }

        info!(
            saved = report.saved(),
            attempted = report.shots.len(),
            "Capture sweep finished"
        );
        report
    }
}

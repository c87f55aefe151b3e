//! Daemon wiring: build the devices, start the watcher and API server,
//! and tear everything down in order on shutdown.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::alarm::{AlarmController, Devices, SweepPlan};
use crate::api::{self, SharedState};
use crate::config::{Config, HardwareBackend};
use crate::error::Error;
use crate::mock::{MockActuator, MockCamera, MockDelivery, MockNotifier, MockSensor};
use crate::sensor::SensorWatcher;
use crate::status_log::LogLevel;
use crate::tracing::prelude::*;

/// Open the configured hardware backend.
async fn open_devices(config: &Config) -> crate::error::Result<Devices> {
    match config.hardware {
        HardwareBackend::Mock => Ok(Devices {
            actuator: Arc::new(MockActuator::new()),
            sensor: Arc::new(MockSensor::new()),
            camera: Arc::new(MockCamera::new()),
            notifier: MockNotifier::new(MockDelivery::Deliver),
        }),
        HardwareBackend::Sysfs => open_sysfs(config).await,
    }
}

#[cfg(target_os = "linux")]
async fn open_sysfs(config: &Config) -> crate::error::Result<Devices> {
    use crate::capture::RpicamStill;
    use crate::hw::sysfs::{SysfsActuator, SysfsSoundSensor};
    use crate::notify::WebhookNotifier;

    let pins = &config.pins;
    // Outputs last: the controller silences them right after this
    // returns, so no failure can leave a freshly exported buzzer on.
    let sensor = SysfsSoundSensor::open(pins.sound).await?;
    let actuator =
        SysfsActuator::open(&[pins.buzzer, pins.led], pins.pwm_chip, pins.pwm_channel).await?;

    Ok(Devices {
        actuator: Arc::new(actuator),
        sensor: Arc::new(sensor),
        camera: Arc::new(RpicamStill::new(
            config.sweep.capture_command.clone(),
            config.sweep.photo_dir.clone(),
        )),
        notifier: Arc::new(WebhookNotifier::new(config.notify.clone())),
    })
}

#[cfg(not(target_os = "linux"))]
async fn open_sysfs(_config: &Config) -> crate::error::Result<Devices> {
    Err(Error::Other(
        "the sysfs backend is only available on Linux; set EARSHOT_HARDWARE=mock".to_string(),
    ))
}

/// Run until SIGINT or SIGTERM.
pub async fn run(config: Config) -> Result<()> {
    info!(hardware = %config.hardware, policy = ?config.policy, "Earshot starting...");

    let devices = open_devices(&config)
        .await
        .context("failed to initialize hardware")?;
    let sensor = devices.sensor.clone();
    let controller = AlarmController::new(
        devices,
        &config.pins,
        SweepPlan::from(&config.sweep),
        config.policy,
    );

    if let Err(e) = controller.init_outputs().await {
        // Leave whatever outputs still respond silent and dark.
        controller.shutdown().await;
        return Err(Error::from(e)).context("failed to put outputs into a safe state");
    }
    controller.record(LogLevel::Info, "earshot node starting...");

    let running = CancellationToken::new();
    let tracker = TaskTracker::new();

    let watcher = SensorWatcher::new(sensor, controller.clone(), config.sensor.clone());
    tracker.spawn(watcher.run(running.clone()));

    {
        let state = SharedState {
            controller: controller.clone(),
        };
        let running = running.clone();
        let photo_dir = config.sweep.photo_dir.clone();
        let addr = config.api_bind;
        tracker.spawn(async move {
            if let Err(e) = api::serve(addr, state, &photo_dir, running.clone()).await {
                error!("{e:#}");
                running.cancel();
            }
        });
    }
    tracker.close();

    wait_for_shutdown(&running).await?;
    info!("Shutdown requested");
    running.cancel();

    tracker.wait().await;
    controller.shutdown().await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown(running: &CancellationToken) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("failed to listen for Ctrl-C")?,
        _ = sigterm.recv() => {}
        // The server gave up on its own (e.g. the port is taken).
        _ = running.cancelled() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown(running: &CancellationToken) -> Result<()> {
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("failed to listen for Ctrl-C")?,
        _ = running.cancelled() => {}
    }
    Ok(())
}

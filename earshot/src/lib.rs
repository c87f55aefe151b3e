//! Earshot: a sound-triggered alarm controller.
//!
//! A sound sensor arms an alarm state machine that sounds a buzzer,
//! lights an LED, mails an alert and sweeps a pan-mounted camera across
//! the room. State and recent events are served over a small HTTP API.

pub mod alarm;
pub mod api;
pub mod api_client;
pub mod capture;
pub mod config;
pub mod daemon;
pub mod error;
pub mod hw;
pub mod mock;
pub mod notify;
pub mod sensor;
pub mod status_log;
pub mod tracing;
pub mod types;

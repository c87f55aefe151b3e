//! API data transfer objects.
//!
//! These types define the API contract shared between the server and
//! clients. Field names are part of that contract; the web dashboard
//! reads them directly.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Alarm status and the tail of the event log.
#[derive(Clone, Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct StatusResponse {
    /// 1 while the buzzer is sounding.
    pub buzzer: u8,
    /// 1 while the LED is lit.
    pub led: u8,
    /// `HH:MM:SS` of the last trigger or reset, `--:--:--` if none yet.
    pub last_event: String,
    /// URL of the most recent photo, empty if none yet.
    pub last_photo_url: String,
    pub alarm_active: bool,
    /// Up to ten most recent log entries, oldest first.
    pub logs: Vec<LogItem>,
}

/// One status log entry.
#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct LogItem {
    /// `info`, `warn` or `error`.
    pub level: String,
    pub msg: String,
    /// `HH:MM:SS`.
    pub time: String,
}

/// State right after a reset.
#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct ResetResponse {
    pub ok: bool,
    /// `HH:MM:SS` when the response was built.
    pub time: String,
    pub alarm_active: bool,
    pub buzzer: u8,
    pub led: u8,
    pub last_event: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct TriggerResponse {
    pub ok: bool,
}

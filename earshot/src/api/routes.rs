//! Alarm endpoints, mounted under `/api`.
//!
//! Business-level failures (a dead buzzer, an unreachable relay) are
//! reported through the status log, never through HTTP errors, so
//! these handlers always answer 200.

use axum::{Json, extract::State};
use utoipa_axum::{router::OpenApiRouter, routes};

use super::server::SharedState;
use crate::alarm::{AlarmSnapshot, AlarmState};
use crate::api_client::types::{LogItem, ResetResponse, StatusResponse, TriggerResponse};
use crate::types::{Timestamp, timestamp};

pub fn routes() -> OpenApiRouter<SharedState> {
    OpenApiRouter::new()
        .routes(routes!(get_status))
        .routes(routes!(reset))
        .routes(routes!(mock_trigger))
}

/// Current alarm state and recent events.
#[utoipa::path(
    get,
    path = "/status",
    tag = "alarm",
    responses(
        (status = OK, description = "Alarm status snapshot", body = StatusResponse),
    ),
)]
async fn get_status(State(state): State<SharedState>) -> Json<StatusResponse> {
    Json(status_response(&state.controller.snapshot()))
}

/// Silence the buzzer and LED and re-arm the alarm.
#[utoipa::path(
    post,
    path = "/reset",
    tag = "alarm",
    responses(
        (status = OK, description = "State after the reset", body = ResetResponse),
    ),
)]
async fn reset(State(state): State<SharedState>) -> Json<ResetResponse> {
    let after = state.controller.reset().await;
    Json(ResetResponse {
        ok: true,
        time: Timestamp::now().clock(),
        alarm_active: after.active,
        buzzer: flag(after.buzzer_sounding),
        led: flag(after.led_lit),
        last_event: last_event(&after),
    })
}

/// Run one alarm cycle as if the sensor had heard something.
#[utoipa::path(
    post,
    path = "/mock_trigger",
    tag = "alarm",
    responses(
        (status = OK, description = "Trigger accepted", body = TriggerResponse),
    ),
)]
async fn mock_trigger(State(state): State<SharedState>) -> Json<TriggerResponse> {
    state.controller.mock_trigger().await;
    Json(TriggerResponse { ok: true })
}

fn status_response(snapshot: &AlarmSnapshot) -> StatusResponse {
    let state = &snapshot.state;
    StatusResponse {
        buzzer: flag(state.buzzer_sounding),
        led: flag(state.led_lit),
        last_event: last_event(state),
        last_photo_url: state.last_photo.clone().unwrap_or_default(),
        alarm_active: state.active,
        logs: snapshot
            .logs
            .iter()
            .map(|entry| LogItem {
                level: entry.level.to_string(),
                msg: entry.message.clone(),
                time: entry.time.clock(),
            })
            .collect(),
    }
}

fn flag(on: bool) -> u8 {
    u8::from(on)
}

fn last_event(state: &AlarmState) -> String {
    state
        .last_event
        .map(|t| t.clock())
        .unwrap_or_else(|| timestamp::NEVER.to_string())
}

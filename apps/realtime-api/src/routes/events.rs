//! Bridge ingress: out-of-process callers inject events over HTTP.
//!
//! Guarded by a shared token (plain equality, a coarser server-to-server
//! credential, distinct from the per-user handshake scheme). Accepted events
//! flow into the same broadcast pipeline as in-process calls.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::gateway::events::{
    AttendanceUpdate, BridgeEventType, NotificationNotice, RehearsalNotice,
};
use crate::AppState;

pub fn router(event_path: &str) -> Router<AppState> {
    Router::new().route(event_path, post(ingest_event))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeEventRequest {
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
    pub token: String,
}

async fn ingest_event(
    State(state): State<AppState>,
    Json(req): Json<BridgeEventRequest>,
) -> Result<StatusCode, ApiError> {
    if req.token != state.config.bridge_token {
        tracing::warn!(event_type = %req.event_type, "bridge event with invalid token");
        return Err(ApiError::unauthorized("Invalid bridge token"));
    }

    let Some(kind) = BridgeEventType::parse(&req.event_type) else {
        tracing::warn!(event_type = %req.event_type, "bridge event with unknown type");
        return Err(ApiError::bad_request(format!(
            "Unknown event type: {}",
            req.event_type
        )));
    };

    match kind {
        BridgeEventType::AttendanceUpdated => {
            let update: AttendanceUpdate = parse_payload(req.payload)?;
            state.broadcaster.broadcast_attendance_update(update);
        }
        BridgeEventType::RehearsalCreated => {
            let notice: RehearsalNotice = parse_payload(req.payload)?;
            state.broadcaster.broadcast_rehearsal_created(notice);
        }
        BridgeEventType::RehearsalUpdated => {
            let notice: RehearsalNotice = parse_payload(req.payload)?;
            state.broadcaster.broadcast_rehearsal_updated(notice);
        }
        BridgeEventType::NotificationCreated => {
            let notice: NotificationNotice = parse_payload(req.payload)?;
            state.broadcaster.send_notification(notice);
        }
        BridgeEventType::OnboardingDashboardUpdate => {
            state.broadcaster.broadcast_onboarding_dashboard(req.payload);
        }
        BridgeEventType::ServerAnalyticsUpdate => {
            state.broadcaster.broadcast_server_analytics(req.payload);
        }
    }

    tracing::debug!(event_type = kind.as_str(), "bridge event accepted");
    Ok(StatusCode::ACCEPTED)
}

fn parse_payload<T: serde::de::DeserializeOwned>(payload: Value) -> Result<T, ApiError> {
    serde_json::from_value(payload)
        .map_err(|err| ApiError::bad_request(format!("Invalid event payload: {err}")))
}

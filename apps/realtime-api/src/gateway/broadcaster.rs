//! Typed fan-out API over the broadcast hub.
//!
//! Every operation assembles a full wire event (stamping the server-assigned
//! timestamp) and computes the target room set for its event type, then
//! hands the payload to the hub. Delivery is fire-and-forget: sockets
//! connected to a target room at the instant of the call receive the event,
//! nobody else, no retries. Durable state is the data layer's job.

use serde_json::Value;
use tokio::sync::broadcast;

use callboard_common::time::now_iso8601;

use crate::rooms::{self, Room};

use super::events::{
    AttendanceUpdate, NotificationNotice, RehearsalNotice, ServerEvent,
};
use super::fanout::{RealtimeBroadcast, RoomedPayload};

#[derive(Clone)]
pub struct Broadcaster {
    fanout: RealtimeBroadcast,
}

impl Broadcaster {
    pub fn new(fanout: RealtimeBroadcast) -> Self {
        Self { fanout }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<std::sync::Arc<RoomedPayload>> {
        self.fanout.subscribe()
    }

    /// Attendance change: the rehearsal's room sees it, and the affected
    /// user's private room sees it even if they are not in the rehearsal
    /// room right now.
    pub fn broadcast_attendance_update(&self, update: AttendanceUpdate) {
        let rooms = vec![
            Room::rehearsal(&update.rehearsal_id),
            Room::user(&update.target_user_id),
        ];
        let event = ServerEvent::AttendanceUpdated {
            rehearsal_id: update.rehearsal_id,
            target_user_id: update.target_user_id,
            status: update.status,
            actor_user_id: update.actor_user_id,
            timestamp: now_iso8601(),
        };
        self.broadcast(&event, rooms, None);
    }

    /// New rehearsal: each invited/assigned user's private room.
    pub fn broadcast_rehearsal_created(&self, notice: RehearsalNotice) {
        let rooms: Vec<String> = notice.target_user_ids.iter().map(|id| Room::user(id)).collect();
        let event = ServerEvent::RehearsalCreated {
            rehearsal_id: notice.rehearsal_id,
            rehearsal: notice.rehearsal,
            timestamp: now_iso8601(),
        };
        self.broadcast(&event, rooms, None);
    }

    /// Rehearsal change: the rehearsal's room plus each target user's
    /// private room.
    pub fn broadcast_rehearsal_updated(&self, notice: RehearsalNotice) {
        let mut rooms = vec![Room::rehearsal(&notice.rehearsal_id)];
        rooms.extend(notice.target_user_ids.iter().map(|id| Room::user(id)));
        let event = ServerEvent::RehearsalUpdated {
            rehearsal_id: notice.rehearsal_id,
            rehearsal: notice.rehearsal,
            timestamp: now_iso8601(),
        };
        self.broadcast(&event, rooms, None);
    }

    /// Notification: the target user's private room only.
    pub fn send_notification(&self, notice: NotificationNotice) {
        let rooms = vec![Room::user(&notice.target_user_id)];
        let event = ServerEvent::NotificationCreated {
            notification: notice.notification,
            timestamp: now_iso8601(),
        };
        self.broadcast(&event, rooms, None);
    }

    /// Onboarding dashboard snapshot: the dashboard room.
    pub fn broadcast_onboarding_dashboard(&self, payload: Value) {
        let event = ServerEvent::OnboardingDashboardUpdate {
            payload,
            timestamp: now_iso8601(),
        };
        self.broadcast(&event, vec![rooms::ONBOARDING_DASHBOARD.to_string()], None);
    }

    /// Server analytics snapshot: the analytics room.
    pub fn broadcast_server_analytics(&self, payload: Value) {
        let event = ServerEvent::ServerAnalyticsUpdate {
            payload,
            timestamp: now_iso8601(),
        };
        self.broadcast(&event, vec![rooms::SERVER_ANALYTICS.to_string()], None);
    }

    /// Deliver an arbitrary event to one or more rooms, optionally skipping
    /// the originating socket.
    pub fn broadcast(&self, event: &ServerEvent, rooms: Vec<String>, exclude: Option<String>) {
        let Some(event) = serialize(event) else {
            return;
        };
        self.fanout.dispatch(RoomedPayload {
            rooms,
            to_stats_subscribers: false,
            exclude,
            event,
        });
    }

    /// Deliver an event to the online-stats subscriber set.
    pub fn send_to_stats_subscribers(&self, event: &ServerEvent) {
        let Some(event) = serialize(event) else {
            return;
        };
        self.fanout.dispatch(RoomedPayload {
            rooms: Vec::new(),
            to_stats_subscribers: true,
            exclude: None,
            event,
        });
    }
}

fn serialize(event: &ServerEvent) -> Option<Value> {
    match serde_json::to_value(event) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::error!(?err, "failed to serialize event for broadcast");
            None
        }
    }
}

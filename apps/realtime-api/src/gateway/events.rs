//! Wire-format messages and typed domain events.
//!
//! Field names are camelCase on the wire; the browser clients are
//! JavaScript. Every outbound event carries a server-assigned ISO-8601
//! `timestamp`; callers never supply one.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use callboard_common::time::now_iso8601;

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// A message received from a client over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    JoinRoom { room: String },
    LeaveRoom { room: String },
    Ping,
    GetOnlineStats,
    UnsubscribeOnlineStats,
    GetRehearsalUsers { rehearsal_id: String },
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// `{id, name}` reference to a connected user, shared by rosters and
/// online-stats snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRef {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceAction {
    Join,
    Leave,
}

/// Everything the server sends to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Connection accepted; lists the rooms joined automatically.
    ConnectionReady {
        user_id: Option<String>,
        rooms: Vec<String>,
        timestamp: String,
    },
    Pong,
    AttendanceUpdated {
        rehearsal_id: String,
        target_user_id: String,
        status: String,
        actor_user_id: String,
        timestamp: String,
    },
    RehearsalCreated {
        rehearsal_id: String,
        rehearsal: Value,
        timestamp: String,
    },
    RehearsalUpdated {
        rehearsal_id: String,
        rehearsal: Value,
        timestamp: String,
    },
    NotificationCreated {
        notification: Value,
        timestamp: String,
    },
    UserPresence {
        action: PresenceAction,
        user_id: String,
        user_name: String,
        rehearsal_id: String,
        timestamp: String,
    },
    UserJoined {
        user_id: String,
        user_name: Option<String>,
        timestamp: String,
    },
    UserLeft {
        user_id: String,
        timestamp: String,
    },
    OnlineStatsUpdate {
        total_online: usize,
        online_users: Vec<UserRef>,
        timestamp: String,
    },
    RehearsalUsersList {
        rehearsal_id: String,
        users: Vec<UserRef>,
        timestamp: String,
    },
    OnboardingDashboardUpdate {
        payload: Value,
        timestamp: String,
    },
    ServerAnalyticsUpdate {
        payload: Value,
        timestamp: String,
    },
}

impl ServerEvent {
    pub fn connection_ready(user_id: Option<&str>, rooms: Vec<String>) -> Self {
        ServerEvent::ConnectionReady {
            user_id: user_id.map(str::to_string),
            rooms,
            timestamp: now_iso8601(),
        }
    }

    pub fn presence(
        action: PresenceAction,
        user_id: &str,
        user_name: &str,
        rehearsal_id: &str,
    ) -> Self {
        ServerEvent::UserPresence {
            action,
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            rehearsal_id: rehearsal_id.to_string(),
            timestamp: now_iso8601(),
        }
    }

    pub fn user_joined(user_id: &str, user_name: Option<&str>) -> Self {
        ServerEvent::UserJoined {
            user_id: user_id.to_string(),
            user_name: user_name.map(str::to_string),
            timestamp: now_iso8601(),
        }
    }

    pub fn user_left(user_id: &str) -> Self {
        ServerEvent::UserLeft {
            user_id: user_id.to_string(),
            timestamp: now_iso8601(),
        }
    }

    pub fn rehearsal_users_list(rehearsal_id: &str, users: Vec<UserRef>) -> Self {
        ServerEvent::RehearsalUsersList {
            rehearsal_id: rehearsal_id.to_string(),
            users,
            timestamp: now_iso8601(),
        }
    }

    pub fn online_stats(total_online: usize, online_users: Vec<UserRef>) -> Self {
        ServerEvent::OnlineStatsUpdate {
            total_online,
            online_users,
            timestamp: now_iso8601(),
        }
    }
}

// ---------------------------------------------------------------------------
// Bridge payloads
// ---------------------------------------------------------------------------

/// Event types accepted by the `POST /events` bridge ingress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeEventType {
    AttendanceUpdated,
    RehearsalCreated,
    RehearsalUpdated,
    NotificationCreated,
    OnboardingDashboardUpdate,
    ServerAnalyticsUpdate,
}

impl BridgeEventType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "attendance_updated" => Some(Self::AttendanceUpdated),
            "rehearsal_created" => Some(Self::RehearsalCreated),
            "rehearsal_updated" => Some(Self::RehearsalUpdated),
            "notification_created" => Some(Self::NotificationCreated),
            "onboarding_dashboard_update" => Some(Self::OnboardingDashboardUpdate),
            "server_analytics_update" => Some(Self::ServerAnalyticsUpdate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AttendanceUpdated => "attendance_updated",
            Self::RehearsalCreated => "rehearsal_created",
            Self::RehearsalUpdated => "rehearsal_updated",
            Self::NotificationCreated => "notification_created",
            Self::OnboardingDashboardUpdate => "onboarding_dashboard_update",
            Self::ServerAnalyticsUpdate => "server_analytics_update",
        }
    }
}

/// Caller-supplied half of an `attendance_updated` event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceUpdate {
    pub rehearsal_id: String,
    pub target_user_id: String,
    pub status: String,
    pub actor_user_id: String,
}

/// Caller-supplied half of `rehearsal_created` / `rehearsal_updated`.
/// `rehearsal` is the already-computed entity payload; `target_user_ids`
/// drives routing and is not itself delivered.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RehearsalNotice {
    pub rehearsal_id: String,
    pub target_user_ids: Vec<String>,
    pub rehearsal: Value,
}

/// Caller-supplied half of a `notification_created` event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationNotice {
    pub target_user_id: String,
    pub notification: Value,
}

//! Per-connection socket session state.

use std::collections::HashSet;

use crate::handshake::TokenWindow;

use super::fanout::RoomedPayload;

/// Identity established by the handshake verifier before the upgrade was
/// accepted.
#[derive(Debug, Clone)]
pub struct ConnIdentity {
    pub user_id: String,
    pub user_name: Option<String>,
    /// Validity window of the verified handshake token.
    pub window: TokenWindow,
}

/// State for a single socket connection. Owned exclusively by that
/// connection's task; the parts other tasks need are mirrored into the
/// [`super::registry::SocketRegistry`].
pub struct SocketSession {
    /// Unique connection identifier (`sck_` prefixed ULID).
    pub socket_id: String,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub verified_handshake: bool,
    /// Validity window of the verified handshake token, if any.
    pub handshake_window: Option<TokenWindow>,
    /// Rooms this socket has joined, used to filter fanout payloads and to
    /// reverse-notify presence leaves on disconnect.
    pub joined_rooms: HashSet<String>,
    pub stats_subscriber: bool,
}

impl SocketSession {
    pub fn new(socket_id: String, identity: Option<&ConnIdentity>) -> Self {
        Self {
            socket_id,
            user_id: identity.map(|i| i.user_id.clone()),
            user_name: identity.and_then(|i| i.user_name.clone()),
            verified_handshake: identity.is_some(),
            handshake_window: identity.map(|i| i.window),
            joined_rooms: HashSet::new(),
            stats_subscriber: false,
        }
    }

    /// Should this socket receive the payload?
    pub fn is_recipient(&self, payload: &RoomedPayload) -> bool {
        if payload.exclude.as_deref() == Some(self.socket_id.as_str()) {
            return false;
        }
        if payload.to_stats_subscribers && self.stats_subscriber {
            return true;
        }
        payload
            .rooms
            .iter()
            .any(|room| self.joined_rooms.contains(room))
    }

    /// How this socket's user shows up in logs.
    pub fn describe_user(&self) -> &str {
        self.user_id.as_deref().unwrap_or("unauthenticated")
    }
}

//! In-memory per-user presence tracking with multi-connection support.
//!
//! Presence is per-**user**, not per-socket. A user with three tabs open is
//! one online user; only the 0↔1 connection-count transitions are externally
//! visible, so peers see no join/leave churn from extra tabs.

use std::collections::HashSet;

use dashmap::DashMap;

use super::events::UserRef;

/// Per-user presence state.
struct ConnectedUser {
    /// Ids of this user's live socket connections.
    sockets: HashSet<String>,
    /// Display name, updated whenever a connection supplies a non-empty one.
    name: Option<String>,
}

/// Derived view handed to online-stats subscribers. Never stored;
/// recomputed from the live map on demand.
#[derive(Debug, Clone)]
pub struct OnlineStatsSnapshot {
    pub total_online: usize,
    pub online_users: Vec<UserRef>,
}

/// Thread-safe, DashMap-backed presence registry.
pub struct PresenceRegistry {
    inner: DashMap<String, ConnectedUser>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Register a connection for a user. Returns `true` only when this is
    /// the user's first live connection (the caller should broadcast
    /// `user_joined`). Idempotent per socket id.
    pub fn add_connection(
        &self,
        user_id: &str,
        socket_id: &str,
        user_name: Option<&str>,
    ) -> bool {
        let mut entry = self
            .inner
            .entry(user_id.to_string())
            .or_insert_with(|| ConnectedUser {
                sockets: HashSet::new(),
                name: None,
            });

        let first = entry.sockets.is_empty();
        entry.sockets.insert(socket_id.to_string());
        if let Some(name) = user_name.filter(|n| !n.is_empty()) {
            entry.name = Some(name.to_string());
        }
        first
    }

    /// Drop a connection. Returns `true` only when the user's socket set
    /// became empty (the caller should broadcast `user_left`); the map entry
    /// is removed in that case.
    pub fn remove_connection(&self, user_id: &str, socket_id: &str) -> bool {
        let emptied = match self.inner.get_mut(user_id) {
            Some(mut entry) => {
                entry.sockets.remove(socket_id);
                entry.sockets.is_empty()
            }
            None => false,
        };

        if emptied {
            // Atomic re-check: the user may have reconnected in between.
            return self
                .inner
                .remove_if(user_id, |_, user| user.sockets.is_empty())
                .is_some();
        }
        false
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.inner.contains_key(user_id)
    }

    /// Recompute the online-stats view from the live map.
    pub fn snapshot(&self) -> OnlineStatsSnapshot {
        let online_users: Vec<UserRef> = self
            .inner
            .iter()
            .map(|entry| UserRef {
                id: entry.key().clone(),
                name: entry.value().name.clone(),
            })
            .collect();
        OnlineStatsSnapshot {
            total_online: online_users.len(),
            online_users,
        }
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//! Cross-socket registry: which sockets exist, who they belong to, and which
//! rooms they have joined.
//!
//! Each connection task owns its [`super::session::SocketSession`]; this
//! registry mirrors the parts other tasks need to see: roster queries for
//! `get_rehearsal_users` and the online-stats subscriber flag.

use std::collections::HashSet;

use dashmap::DashMap;
use parking_lot::Mutex;

use super::events::UserRef;

/// Mirrored per-socket state.
pub struct SocketEntry {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub joined_rooms: HashSet<String>,
    pub stats_subscriber: bool,
}

/// Shared registry of all live sockets.
///
/// Uses `DashMap` for shard-level concurrency and `parking_lot::Mutex` per
/// entry for non-poisoning, fast locking.
pub struct SocketRegistry {
    inner: DashMap<String, Mutex<SocketEntry>>,
}

impl SocketRegistry {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Register a socket at connection time.
    pub fn register(&self, socket_id: &str, user_id: Option<&str>, user_name: Option<&str>) {
        let entry = SocketEntry {
            user_id: user_id.map(str::to_string),
            user_name: user_name.map(str::to_string),
            joined_rooms: HashSet::new(),
            stats_subscriber: false,
        };
        self.inner.insert(socket_id.to_string(), Mutex::new(entry));
    }

    /// Remove a socket on disconnect.
    pub fn unregister(&self, socket_id: &str) {
        self.inner.remove(socket_id);
    }

    pub fn record_join(&self, socket_id: &str, room: &str) {
        if let Some(entry) = self.inner.get(socket_id) {
            entry.lock().joined_rooms.insert(room.to_string());
        }
    }

    pub fn record_leave(&self, socket_id: &str, room: &str) {
        if let Some(entry) = self.inner.get(socket_id) {
            entry.lock().joined_rooms.remove(room);
        }
    }

    pub fn set_stats_subscriber(&self, socket_id: &str, subscribed: bool) {
        if let Some(entry) = self.inner.get(socket_id) {
            entry.lock().stats_subscriber = subscribed;
        }
    }

    /// Authenticated members of a room, one entry per socket that joined it.
    /// Sockets without an authenticated user id are skipped.
    pub fn room_members(&self, room: &str) -> Vec<UserRef> {
        let mut members = Vec::new();
        for entry in self.inner.iter() {
            let e = entry.value().lock();
            if !e.joined_rooms.contains(room) {
                continue;
            }
            let Some(user_id) = &e.user_id else {
                continue;
            };
            members.push(UserRef {
                id: user_id.clone(),
                name: e.user_name.clone(),
            });
        }
        members
    }
}

impl Default for SocketRegistry {
    fn default() -> Self {
        Self::new()
    }
}

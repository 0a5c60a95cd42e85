//! Broadcast hub for dispatching events to connected sockets.
//!
//! Uses a single `tokio::sync::broadcast` channel. Each connected socket
//! subscribes and filters payloads locally against its own joined-room set
//! and online-stats subscription. This is the single-process pub/sub
//! substrate; room membership itself lives with each socket.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;

/// Capacity of the broadcast channel. Slow receivers that fall behind will
/// skip messages (RecvError::Lagged).
const BROADCAST_CAPACITY: usize = 4096;

/// A payload dispatched to connected sockets.
#[derive(Debug, Clone)]
pub struct RoomedPayload {
    /// Deliver to sockets that joined any of these rooms.
    pub rooms: Vec<String>,
    /// Additionally deliver to online-stats subscribers.
    pub to_stats_subscribers: bool,
    /// Socket to skip (the originator of the action, if any).
    pub exclude: Option<String>,
    /// Serialized wire event.
    pub event: Value,
}

/// The broadcast hub. Cloneable; stored in AppState.
#[derive(Clone)]
pub struct RealtimeBroadcast {
    sender: broadcast::Sender<Arc<RoomedPayload>>,
}

impl RealtimeBroadcast {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { sender }
    }

    /// Subscribe to the hub. Each socket task calls this once at connection
    /// time to get its own receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<RoomedPayload>> {
        self.sender.subscribe()
    }

    /// Dispatch a payload to all subscribed sockets. Fire-and-forget:
    /// no receivers is not an error.
    pub fn dispatch(&self, payload: RoomedPayload) {
        let _ = self.sender.send(Arc::new(payload));
    }
}

impl Default for RealtimeBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

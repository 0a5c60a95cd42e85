pub mod access;
pub mod bridge;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handshake;
pub mod rooms;
pub mod routes;

use std::sync::Arc;

use access::{MembershipStore, RoomAuthorizer};
use config::Config;
use gateway::broadcaster::Broadcaster;
use gateway::fanout::RealtimeBroadcast;
use gateway::presence::PresenceRegistry;
use gateway::registry::SocketRegistry;

/// Shared application state available to all route handlers and socket
/// tasks. Constructed once at startup and passed explicitly; there is no
/// module-level singleton, so tests can run isolated instances.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub presence: Arc<PresenceRegistry>,
    pub sockets: Arc<SocketRegistry>,
    pub authorizer: Arc<RoomAuthorizer>,
    pub broadcaster: Broadcaster,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn MembershipStore>) -> Self {
        Self {
            config: Arc::new(config),
            presence: Arc::new(PresenceRegistry::new()),
            sockets: Arc::new(SocketRegistry::new()),
            authorizer: Arc::new(RoomAuthorizer::new(store)),
            broadcaster: Broadcaster::new(RealtimeBroadcast::new()),
        }
    }
}

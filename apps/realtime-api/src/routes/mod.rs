pub mod events;
pub mod health;

use axum::Router;

use crate::AppState;

/// Assemble the full route tree. `event_path` is where the bridge ingress is
/// mounted (configurable via `BRIDGE_EVENT_PATH`).
pub fn router(event_path: &str) -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::gateway::server::router())
        .merge(events::router(event_path))
}

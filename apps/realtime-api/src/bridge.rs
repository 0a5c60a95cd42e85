//! Outbound half of the event bridge.
//!
//! Server-side request handlers and background jobs running in other
//! processes use this client to hand events to the realtime service. The
//! channel is explicitly best-effort: failures are logged and swallowed, and
//! callers must never block business logic on delivery.

use serde_json::Value;

use crate::gateway::events::BridgeEventType;

#[derive(Clone)]
pub struct EventPublisher {
    endpoint: String,
    token: String,
    http: reqwest::Client,
}

impl EventPublisher {
    pub fn new(base_url: &str, event_path: &str, token: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let path = event_path.trim_start_matches('/');
        Self {
            endpoint: format!("{base}/{path}"),
            token: token.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Build a publisher from `REALTIME_URL`, `BRIDGE_EVENT_PATH` (default
    /// `/events`), and `BRIDGE_TOKEN`. Returns `None` when the realtime
    /// service is not configured, so callers can degrade to no-op delivery.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("REALTIME_URL").ok().filter(|v| !v.is_empty())?;
        let token = std::env::var("BRIDGE_TOKEN").ok().filter(|v| !v.is_empty())?;
        let event_path = std::env::var("BRIDGE_EVENT_PATH")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "/events".to_string());
        Some(Self::new(&base_url, &event_path, &token))
    }

    /// Submit an event. At-most-once: a failed POST is logged, never retried.
    pub async fn publish(&self, event_type: BridgeEventType, payload: Value) {
        let body = serde_json::json!({
            "eventType": event_type.as_str(),
            "payload": payload,
            "token": self.token,
        });

        match self.http.post(&self.endpoint).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(event_type = event_type.as_str(), "bridge event delivered");
            }
            Ok(resp) => {
                tracing::warn!(
                    event_type = event_type.as_str(),
                    status = %resp.status(),
                    "realtime bridge rejected event"
                );
            }
            Err(err) => {
                tracing::warn!(
                    event_type = event_type.as_str(),
                    ?err,
                    "realtime bridge unreachable"
                );
            }
        }
    }
}

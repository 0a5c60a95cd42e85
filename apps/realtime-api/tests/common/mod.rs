use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::time;
use tokio_tungstenite::tungstenite;

use realtime_api::access::MembershipStore;
use realtime_api::config::Config;
use realtime_api::error::ApiError;
use realtime_api::handshake::create_handshake_token;
use realtime_api::AppState;

pub const TEST_SECRET: &str = "test-handshake-secret";
pub const TEST_BRIDGE_TOKEN: &str = "test-bridge-token";

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// In-memory membership directory.
#[derive(Default)]
pub struct StubDirectory {
    rehearsal_grants: HashSet<(String, String)>,
    show_grants: HashSet<(String, String)>,
}

impl StubDirectory {
    pub fn grant_rehearsal(mut self, user_id: &str, rehearsal_id: &str) -> Self {
        self.rehearsal_grants
            .insert((user_id.to_string(), rehearsal_id.to_string()));
        self
    }

    #[allow(dead_code)]
    pub fn grant_show(mut self, user_id: &str, show_id: &str) -> Self {
        self.show_grants
            .insert((user_id.to_string(), show_id.to_string()));
        self
    }
}

#[async_trait]
impl MembershipStore for StubDirectory {
    async fn rehearsal_access(
        &self,
        user_id: &str,
        rehearsal_id: &str,
    ) -> Result<bool, ApiError> {
        Ok(self
            .rehearsal_grants
            .contains(&(user_id.to_string(), rehearsal_id.to_string())))
    }

    async fn show_access(&self, user_id: &str, show_id: &str) -> Result<bool, ApiError> {
        Ok(self
            .show_grants
            .contains(&(user_id.to_string(), show_id.to_string())))
    }
}

pub fn test_config() -> Config {
    Config {
        port: 0,
        handshake_secret: TEST_SECRET.to_string(),
        handshake_ttl_secs: 300,
        bridge_token: TEST_BRIDGE_TOKEN.to_string(),
        bridge_event_path: "/events".to_string(),
        directory_url: "http://127.0.0.1:0".to_string(),
        directory_token: None,
    }
}

/// Start a server on an ephemeral port. Returns (addr, state); the server
/// runs in the background.
pub async fn start_server(directory: StubDirectory) -> (SocketAddr, AppState) {
    let state = AppState::new(test_config(), Arc::new(directory));
    let app = realtime_api::routes::router("/events").with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    (addr, state)
}

pub fn gateway_url(addr: SocketAddr, user_id: &str, user_name: Option<&str>) -> String {
    let token = create_handshake_token(user_id, TEST_SECRET, None, None).token;
    match user_name {
        Some(name) => {
            format!("ws://{addr}/gateway?userId={user_id}&userName={name}&token={token}")
        }
        None => format!("ws://{addr}/gateway?userId={user_id}&token={token}"),
    }
}

/// Connect and wait for the `connection_ready` message. Returns the stream
/// with the ready message already consumed.
pub async fn connect(addr: SocketAddr, user_id: &str, user_name: Option<&str>) -> WsStream {
    let url = gateway_url(addr, user_id, user_name);
    let (mut ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    let ready = recv_event(&mut ws, "connection_ready").await;
    assert_eq!(ready["userId"], user_id);
    ws
}

pub async fn send_msg(ws: &mut WsStream, msg: serde_json::Value) {
    ws.send(tungstenite::Message::Text(msg.to_string().into()))
        .await
        .expect("ws send");
}

/// Per-socket barrier: a ping is answered only after every earlier message
/// from this socket has been processed.
pub async fn barrier(ws: &mut WsStream) {
    send_msg(ws, serde_json::json!({ "type": "ping" })).await;
    recv_event(ws, "pong").await;
}

/// Read messages until one with the expected `type` arrives (other types are
/// skipped). Panics after 5 seconds.
pub async fn recv_event(ws: &mut WsStream, expected_type: &str) -> serde_json::Value {
    let deadline = Duration::from_secs(5);
    loop {
        let msg = time::timeout(deadline, ws.next())
            .await
            .unwrap_or_else(|_| panic!("timeout waiting for {expected_type}"))
            .unwrap_or_else(|| panic!("stream ended waiting for {expected_type}"))
            .expect("ws read error");

        let text = match msg {
            tungstenite::Message::Text(t) => t,
            tungstenite::Message::Close(_) => panic!("closed waiting for {expected_type}"),
            _ => continue,
        };

        let event: serde_json::Value = serde_json::from_str(&text).expect("parse event");
        if event["type"] == expected_type {
            return event;
        }
    }
}

/// Assert that no message with the given `type` arrives within the window.
pub async fn expect_no_event(ws: &mut WsStream, unexpected_type: &str, millis: u64) {
    let deadline = time::Instant::now() + Duration::from_millis(millis);
    loop {
        let remaining = deadline.saturating_duration_since(time::Instant::now());
        if remaining.is_zero() {
            return;
        }
        let msg = match time::timeout(remaining, ws.next()).await {
            Err(_) => return, // window elapsed quietly
            Ok(None) => return,
            Ok(Some(msg)) => msg.expect("ws read error"),
        };
        if let tungstenite::Message::Text(text) = msg {
            let event: serde_json::Value = serde_json::from_str(&text).expect("parse event");
            assert_ne!(
                event["type"], unexpected_type,
                "unexpected {unexpected_type} event: {event}"
            );
        }
    }
}

/// POST an event to the bridge ingress; returns the response status.
pub async fn post_event(
    addr: SocketAddr,
    event_type: &str,
    payload: serde_json::Value,
    token: &str,
) -> reqwest::StatusCode {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/events"))
        .json(&serde_json::json!({
            "eventType": event_type,
            "payload": payload,
            "token": token,
        }))
        .send()
        .await
        .expect("bridge request");
    resp.status()
}

//! WebSocket upgrade handler and per-connection event loop.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::broadcast;

use callboard_common::id::{prefix, prefixed_ulid};

use crate::error::ApiError;
use crate::handshake::{verify_handshake_token, HandshakeError};
use crate::rooms::{Room, GLOBAL};
use crate::AppState;

use super::events::{ClientMessage, PresenceAction, ServerEvent};
use super::fanout::RoomedPayload;
use super::session::{ConnIdentity, SocketSession};

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway", get(ws_upgrade))
}

/// Transport-level handshake payload, carried as query parameters on the
/// upgrade request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectParams {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    user_name: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    // The authentication step is pure token verification, no I/O, so it
    // runs before the upgrade is accepted.
    match authenticate(&state, &params) {
        Ok(identity) => ws
            .on_upgrade(move |socket| handle_connection(socket, state, Some(identity)))
            .into_response(),
        Err(reason) => {
            tracing::warn!(%addr, reason = reason.reason(), "socket handshake rejected");
            // Generic body toward the client; the specific reason stays in
            // the logs.
            ApiError::unauthorized("Unauthorized").into_response()
        }
    }
}

fn authenticate(state: &AppState, params: &ConnectParams) -> Result<ConnIdentity, HandshakeError> {
    let user_id = params.user_id.as_deref().unwrap_or("");
    if user_id.is_empty() {
        return Err(HandshakeError::MissingUserId);
    }

    let token = params.token.as_deref().unwrap_or("");
    let window = verify_handshake_token(token, user_id, &state.config.handshake_secret, None)?;

    Ok(ConnIdentity {
        user_id: user_id.to_string(),
        user_name: params.user_name.clone().filter(|n| !n.is_empty()),
        window,
    })
}

/// `identity` is `Some` for every connection the upgrade handler admits;
/// the `None` arm is the degraded path for a bypassed handshake.
async fn handle_connection(socket: WebSocket, state: AppState, identity: Option<ConnIdentity>) {
    let socket_id = prefixed_ulid(prefix::SOCKET);
    let (mut ws_tx, ws_rx) = socket.split();
    let mut session = SocketSession::new(socket_id, identity.as_ref());

    // Subscribe before any join so no event for our rooms slips past.
    let mut broadcast_rx = state.broadcaster.subscribe();

    state.sockets.register(
        &session.socket_id,
        session.user_id.as_deref(),
        session.user_name.as_deref(),
    );

    if let Some(identity) = &identity {
        // Every authenticated socket lives in its user's private room and in
        // the global room.
        for room in [Room::user(&identity.user_id), GLOBAL.to_string()] {
            session.joined_rooms.insert(room.clone());
            state.sockets.record_join(&session.socket_id, &room);
        }

        let first = state.presence.add_connection(
            &identity.user_id,
            &session.socket_id,
            identity.user_name.as_deref(),
        );
        if first {
            state.broadcaster.send_to_stats_subscribers(&ServerEvent::user_joined(
                &identity.user_id,
                identity.user_name.as_deref(),
            ));
            push_stats_snapshot(&state);
        }

        tracing::info!(
            socket_id = %session.socket_id,
            user_id = %identity.user_id,
            "socket connected"
        );
    } else {
        session.joined_rooms.insert(GLOBAL.to_string());
        state.sockets.record_join(&session.socket_id, GLOBAL);
        tracing::warn!(
            socket_id = %session.socket_id,
            "socket admitted without verified handshake; global room only"
        );
    }

    let mut rooms: Vec<String> = session.joined_rooms.iter().cloned().collect();
    rooms.sort();
    let ready = ServerEvent::connection_ready(session.user_id.as_deref(), rooms);
    if send_event(&mut ws_tx, &ready).await.is_ok() {
        run_session(&state, &mut session, &mut ws_tx, ws_rx, &mut broadcast_rx).await;
    }

    cleanup(&state, &session);
}

/// Main session loop: dispatch client messages, forward matching broadcasts.
async fn run_session(
    state: &AppState,
    session: &mut SocketSession,
    ws_tx: &mut SplitSink<WebSocket, Message>,
    mut ws_rx: SplitStream<WebSocket>,
    broadcast_rx: &mut broadcast::Receiver<Arc<RoomedPayload>>,
) {
    loop {
        tokio::select! {
            // Client sends us a message.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(msg) => {
                                if handle_client_message(state, session, ws_tx, msg).await.is_err() {
                                    break;
                                }
                            }
                            Err(err) => {
                                tracing::debug!(
                                    socket_id = %session.socket_id,
                                    ?err,
                                    "ignoring malformed client message"
                                );
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!(socket_id = %session.socket_id, ?err, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            // Event from the fanout hub.
            result = broadcast_rx.recv() => {
                match result {
                    Ok(payload) => {
                        if !session.is_recipient(&payload) {
                            continue;
                        }
                        if send_json(ws_tx, &payload.event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            socket_id = %session.socket_id,
                            skipped,
                            "socket lagged behind broadcast"
                        );
                        // Continue; the missed events are simply dropped.
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

async fn handle_client_message(
    state: &AppState,
    session: &mut SocketSession,
    ws_tx: &mut SplitSink<WebSocket, Message>,
    msg: ClientMessage,
) -> Result<(), axum::Error> {
    match msg {
        ClientMessage::JoinRoom { room } => {
            handle_join_room(state, session, room).await;
            Ok(())
        }
        ClientMessage::LeaveRoom { room } => {
            handle_leave_room(state, session, &room);
            Ok(())
        }
        ClientMessage::Ping => send_event(ws_tx, &ServerEvent::Pong).await,
        ClientMessage::GetOnlineStats => {
            session.stats_subscriber = true;
            state.sockets.set_stats_subscriber(&session.socket_id, true);
            let snap = state.presence.snapshot();
            send_event(
                ws_tx,
                &ServerEvent::online_stats(snap.total_online, snap.online_users),
            )
            .await
        }
        ClientMessage::UnsubscribeOnlineStats => {
            session.stats_subscriber = false;
            state.sockets.set_stats_subscriber(&session.socket_id, false);
            Ok(())
        }
        ClientMessage::GetRehearsalUsers { rehearsal_id } => {
            let users = state.sockets.room_members(&Room::rehearsal(&rehearsal_id));
            send_event(ws_tx, &ServerEvent::rehearsal_users_list(&rehearsal_id, users)).await
        }
    }
}

async fn handle_join_room(state: &AppState, session: &mut SocketSession, room: String) {
    // Idempotent: a second join of the same room re-runs neither
    // authorization nor presence emission.
    if session.joined_rooms.contains(&room) {
        return;
    }

    let allowed = state
        .authorizer
        .ensure_room_access(&session.socket_id, session.user_id.as_deref(), &room)
        .await;
    if !allowed {
        // Denied joins are silent toward the client; the authorizer logged
        // the attempt.
        return;
    }

    session.joined_rooms.insert(room.clone());
    state.sockets.record_join(&session.socket_id, &room);

    match Room::parse(&room) {
        Room::Rehearsal(rehearsal_id) => {
            // Presence announcement needs both an id and a display name.
            if let (Some(user_id), Some(user_name)) = (&session.user_id, &session.user_name) {
                state.broadcaster.broadcast(
                    &ServerEvent::presence(PresenceAction::Join, user_id, user_name, &rehearsal_id),
                    vec![room],
                    Some(session.socket_id.clone()),
                );
            }
        }
        Room::User(owner_id) => {
            // Authorization guarantees the joiner owns the room. An explicit
            // user-room join starts presence tracking if the connection path
            // did not; add_connection is idempotent otherwise.
            let first = state.presence.add_connection(
                &owner_id,
                &session.socket_id,
                session.user_name.as_deref(),
            );
            if first {
                state.broadcaster.send_to_stats_subscribers(&ServerEvent::user_joined(
                    &owner_id,
                    session.user_name.as_deref(),
                ));
                push_stats_snapshot(state);
            }
        }
        _ => {}
    }
}

fn handle_leave_room(state: &AppState, session: &mut SocketSession, room: &str) {
    if !session.joined_rooms.remove(room) {
        return;
    }
    state.sockets.record_leave(&session.socket_id, room);

    if let Room::Rehearsal(rehearsal_id) = Room::parse(room) {
        if let (Some(user_id), Some(user_name)) = (&session.user_id, &session.user_name) {
            state.broadcaster.broadcast(
                &ServerEvent::presence(PresenceAction::Leave, user_id, user_name, &rehearsal_id),
                vec![room.to_string()],
                Some(session.socket_id.clone()),
            );
        }
    }
}

/// Disconnect semantics: peers in rehearsal rooms see the departure even
/// though the transport already dropped this socket.
fn cleanup(state: &AppState, session: &SocketSession) {
    for room in &session.joined_rooms {
        if let Room::Rehearsal(rehearsal_id) = Room::parse(room) {
            if let (Some(user_id), Some(user_name)) = (&session.user_id, &session.user_name) {
                state.broadcaster.broadcast(
                    &ServerEvent::presence(PresenceAction::Leave, user_id, user_name, &rehearsal_id),
                    vec![room.clone()],
                    Some(session.socket_id.clone()),
                );
            }
        }
    }

    state.sockets.unregister(&session.socket_id);

    if let Some(user_id) = &session.user_id {
        if state.presence.remove_connection(user_id, &session.socket_id) {
            state
                .broadcaster
                .send_to_stats_subscribers(&ServerEvent::user_left(user_id));
            push_stats_snapshot(state);
        }
    }

    tracing::info!(
        socket_id = %session.socket_id,
        user = session.describe_user(),
        "socket disconnected"
    );
}

fn push_stats_snapshot(state: &AppState) {
    let snap = state.presence.snapshot();
    state
        .broadcaster
        .send_to_stats_subscribers(&ServerEvent::online_stats(
            snap.total_online,
            snap.online_users,
        ));
}

async fn send_event(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(json) => ws_tx.send(Message::Text(json.into())).await,
        Err(err) => {
            tracing::error!(?err, "failed to serialize server event");
            Ok(())
        }
    }
}

async fn send_json(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    value: &Value,
) -> Result<(), axum::Error> {
    ws_tx.send(Message::Text(value.to_string().into())).await
}

mod common;

use tokio_tungstenite::tungstenite;

use realtime_api::handshake::create_handshake_token;

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connection_ready_lists_auto_joined_rooms() {
    let (addr, _state) = common::start_server(common::StubDirectory::default()).await;

    let url = common::gateway_url(addr, "u1", Some("Ada"));
    let (mut ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");

    let ready = common::recv_event(&mut ws, "connection_ready").await;
    assert_eq!(ready["userId"], "u1");
    let rooms: Vec<&str> = ready["rooms"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r.as_str().unwrap())
        .collect();
    assert!(rooms.contains(&"global"));
    assert!(rooms.contains(&"user_u1"));
    assert!(ready["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn rejects_connection_without_user_id() {
    let (addr, _state) = common::start_server(common::StubDirectory::default()).await;

    let token = create_handshake_token("u1", common::TEST_SECRET, None, None).token;
    let url = format!("ws://{addr}/gateway?token={token}");
    let err = tokio_tungstenite::connect_async(&url)
        .await
        .err()
        .expect("connection should be rejected");

    match err {
        tungstenite::Error::Http(resp) => assert_eq!(resp.status(), 401),
        other => panic!("expected HTTP rejection, got: {other:?}"),
    }
}

#[tokio::test]
async fn rejects_tampered_token() {
    let (addr, _state) = common::start_server(common::StubDirectory::default()).await;

    let mut token = create_handshake_token("u1", common::TEST_SECRET, None, None).token;
    let last = token.pop().unwrap();
    token.push(if last == '0' { '1' } else { '0' });

    let url = format!("ws://{addr}/gateway?userId=u1&token={token}");
    let err = tokio_tungstenite::connect_async(&url)
        .await
        .err()
        .expect("connection should be rejected");

    match err {
        tungstenite::Error::Http(resp) => assert_eq!(resp.status(), 401),
        other => panic!("expected HTTP rejection, got: {other:?}"),
    }
}

#[tokio::test]
async fn rejects_expired_token() {
    let (addr, _state) = common::start_server(common::StubDirectory::default()).await;

    // Issued far in the past with a 60 s lifetime.
    let issued_at = callboard_common::time::now_epoch_ms() - 1_000_000;
    let token = create_handshake_token("u1", common::TEST_SECRET, Some(issued_at), Some(60)).token;

    let url = format!("ws://{addr}/gateway?userId=u1&token={token}");
    let err = tokio_tungstenite::connect_async(&url)
        .await
        .err()
        .expect("connection should be rejected");

    match err {
        tungstenite::Error::Http(resp) => assert_eq!(resp.status(), 401),
        other => panic!("expected HTTP rejection, got: {other:?}"),
    }
}

#[tokio::test]
async fn rejects_token_issued_for_another_user() {
    let (addr, _state) = common::start_server(common::StubDirectory::default()).await;

    let token = create_handshake_token("u2", common::TEST_SECRET, None, None).token;
    let url = format!("ws://{addr}/gateway?userId=u1&token={token}");
    let err = tokio_tungstenite::connect_async(&url)
        .await
        .err()
        .expect("connection should be rejected");

    match err {
        tungstenite::Error::Http(resp) => assert_eq!(resp.status(), 401),
        other => panic!("expected HTTP rejection, got: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Liveness
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ping_returns_pong() {
    let (addr, _state) = common::start_server(common::StubDirectory::default()).await;
    let mut ws = common::connect(addr, "u1", None).await;

    common::send_msg(&mut ws, serde_json::json!({ "type": "ping" })).await;
    common::recv_event(&mut ws, "pong").await;
}

// ---------------------------------------------------------------------------
// Room joins and rosters
// ---------------------------------------------------------------------------

#[tokio::test]
async fn denied_rehearsal_join_keeps_roster_empty() {
    let (addr, _state) = common::start_server(common::StubDirectory::default()).await;
    let mut ws = common::connect(addr, "u1", Some("Ada")).await;

    common::send_msg(
        &mut ws,
        serde_json::json!({ "type": "join_room", "room": "rehearsal_r1" }),
    )
    .await;
    common::barrier(&mut ws).await;

    common::send_msg(
        &mut ws,
        serde_json::json!({ "type": "get_rehearsal_users", "rehearsalId": "r1" }),
    )
    .await;
    let roster = common::recv_event(&mut ws, "rehearsal_users_list").await;
    assert_eq!(roster["rehearsalId"], "r1");
    assert_eq!(roster["users"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn granted_rehearsal_join_appears_in_roster() {
    let directory = common::StubDirectory::default()
        .grant_rehearsal("u1", "r1")
        .grant_rehearsal("u2", "r1");
    let (addr, _state) = common::start_server(directory).await;

    let mut ws1 = common::connect(addr, "u1", Some("Ada")).await;
    let mut ws2 = common::connect(addr, "u2", Some("Ben")).await;

    common::send_msg(
        &mut ws1,
        serde_json::json!({ "type": "join_room", "room": "rehearsal_r1" }),
    )
    .await;
    common::barrier(&mut ws1).await;

    common::send_msg(
        &mut ws2,
        serde_json::json!({ "type": "get_rehearsal_users", "rehearsalId": "r1" }),
    )
    .await;
    let roster = common::recv_event(&mut ws2, "rehearsal_users_list").await;
    let users = roster["users"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["id"], "u1");
    assert_eq!(users[0]["name"], "Ada");
}

#[tokio::test]
async fn foreign_user_room_join_is_silently_denied() {
    let (addr, state) = common::start_server(common::StubDirectory::default()).await;

    let mut intruder = common::connect(addr, "u1", None).await;
    let mut owner = common::connect(addr, "u2", None).await;

    // u1 tries to slip into u2's private room. No error comes back.
    common::send_msg(
        &mut intruder,
        serde_json::json!({ "type": "join_room", "room": "user_u2" }),
    )
    .await;
    common::barrier(&mut intruder).await;

    // A notification for u2 reaches u2 but not the intruder.
    state
        .broadcaster
        .send_notification(realtime_api::gateway::events::NotificationNotice {
            target_user_id: "u2".to_string(),
            notification: serde_json::json!({ "kind": "invite" }),
        });

    let event = common::recv_event(&mut owner, "notification_created").await;
    assert_eq!(event["notification"]["kind"], "invite");
    common::expect_no_event(&mut intruder, "notification_created", 400).await;
}

// ---------------------------------------------------------------------------
// Rehearsal presence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rehearsal_join_and_leave_announce_presence() {
    let directory = common::StubDirectory::default()
        .grant_rehearsal("u1", "r1")
        .grant_rehearsal("u2", "r1");
    let (addr, _state) = common::start_server(directory).await;

    let mut ws1 = common::connect(addr, "u1", Some("Ada")).await;
    let mut ws2 = common::connect(addr, "u2", Some("Ben")).await;

    common::send_msg(
        &mut ws2,
        serde_json::json!({ "type": "join_room", "room": "rehearsal_r1" }),
    )
    .await;
    common::barrier(&mut ws2).await;

    common::send_msg(
        &mut ws1,
        serde_json::json!({ "type": "join_room", "room": "rehearsal_r1" }),
    )
    .await;

    let join = common::recv_event(&mut ws2, "user_presence").await;
    assert_eq!(join["action"], "join");
    assert_eq!(join["userId"], "u1");
    assert_eq!(join["userName"], "Ada");
    assert_eq!(join["rehearsalId"], "r1");

    common::send_msg(
        &mut ws1,
        serde_json::json!({ "type": "leave_room", "room": "rehearsal_r1" }),
    )
    .await;

    let leave = common::recv_event(&mut ws2, "user_presence").await;
    assert_eq!(leave["action"], "leave");
    assert_eq!(leave["userId"], "u1");
}

#[tokio::test]
async fn duplicate_join_announces_presence_once() {
    let directory = common::StubDirectory::default()
        .grant_rehearsal("u1", "r1")
        .grant_rehearsal("u2", "r1");
    let (addr, _state) = common::start_server(directory).await;

    let mut ws1 = common::connect(addr, "u1", Some("Ada")).await;
    let mut ws2 = common::connect(addr, "u2", Some("Ben")).await;

    common::send_msg(
        &mut ws2,
        serde_json::json!({ "type": "join_room", "room": "rehearsal_r1" }),
    )
    .await;
    common::barrier(&mut ws2).await;

    for _ in 0..2 {
        common::send_msg(
            &mut ws1,
            serde_json::json!({ "type": "join_room", "room": "rehearsal_r1" }),
        )
        .await;
    }
    common::barrier(&mut ws1).await;

    let join = common::recv_event(&mut ws2, "user_presence").await;
    assert_eq!(join["action"], "join");
    common::expect_no_event(&mut ws2, "user_presence", 400).await;
}

#[tokio::test]
async fn disconnect_announces_presence_leave() {
    let directory = common::StubDirectory::default()
        .grant_rehearsal("u1", "r1")
        .grant_rehearsal("u2", "r1");
    let (addr, _state) = common::start_server(directory).await;

    let mut ws1 = common::connect(addr, "u1", Some("Ada")).await;
    let mut ws2 = common::connect(addr, "u2", Some("Ben")).await;

    common::send_msg(
        &mut ws2,
        serde_json::json!({ "type": "join_room", "room": "rehearsal_r1" }),
    )
    .await;
    common::barrier(&mut ws2).await;

    common::send_msg(
        &mut ws1,
        serde_json::json!({ "type": "join_room", "room": "rehearsal_r1" }),
    )
    .await;
    let join = common::recv_event(&mut ws2, "user_presence").await;
    assert_eq!(join["action"], "join");

    drop(ws1);

    let leave = common::recv_event(&mut ws2, "user_presence").await;
    assert_eq!(leave["action"], "leave");
    assert_eq!(leave["userId"], "u1");
}

// ---------------------------------------------------------------------------
// Online stats
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_online_stats_returns_current_snapshot() {
    let (addr, _state) = common::start_server(common::StubDirectory::default()).await;
    let mut ws = common::connect(addr, "u1", Some("Ada")).await;

    common::send_msg(&mut ws, serde_json::json!({ "type": "get_online_stats" })).await;
    let stats = common::recv_event(&mut ws, "online_stats_update").await;
    assert_eq!(stats["totalOnline"], 1);
    assert_eq!(stats["onlineUsers"][0]["id"], "u1");
    assert_eq!(stats["onlineUsers"][0]["name"], "Ada");
}

#[tokio::test]
async fn two_tabs_produce_one_join_and_one_leave() {
    let (addr, _state) = common::start_server(common::StubDirectory::default()).await;

    let mut observer = common::connect(addr, "u9", None).await;
    common::send_msg(
        &mut observer,
        serde_json::json!({ "type": "get_online_stats" }),
    )
    .await;
    common::recv_event(&mut observer, "online_stats_update").await;

    // First tab: one user_joined.
    let tab1 = common::connect(addr, "u1", Some("Ada")).await;
    let joined = common::recv_event(&mut observer, "user_joined").await;
    assert_eq!(joined["userId"], "u1");
    let stats = common::recv_event(&mut observer, "online_stats_update").await;
    assert_eq!(stats["totalOnline"], 2);

    // Second tab: still one online user, no second join event.
    let tab2 = common::connect(addr, "u1", Some("Ada")).await;
    common::expect_no_event(&mut observer, "user_joined", 400).await;

    // Closing the first tab leaves the user online.
    drop(tab1);
    common::expect_no_event(&mut observer, "user_left", 400).await;

    // Closing the last tab takes the user offline, exactly once.
    drop(tab2);
    let left = common::recv_event(&mut observer, "user_left").await;
    assert_eq!(left["userId"], "u1");
    let stats = common::recv_event(&mut observer, "online_stats_update").await;
    assert_eq!(stats["totalOnline"], 1);
    common::expect_no_event(&mut observer, "user_left", 400).await;
}

#[tokio::test]
async fn unsubscribe_stops_stats_updates() {
    let (addr, _state) = common::start_server(common::StubDirectory::default()).await;

    let mut observer = common::connect(addr, "u9", None).await;
    common::send_msg(
        &mut observer,
        serde_json::json!({ "type": "get_online_stats" }),
    )
    .await;
    common::recv_event(&mut observer, "online_stats_update").await;

    common::send_msg(
        &mut observer,
        serde_json::json!({ "type": "unsubscribe_online_stats" }),
    )
    .await;
    common::barrier(&mut observer).await;

    let _other = common::connect(addr, "u1", None).await;
    common::expect_no_event(&mut observer, "user_joined", 400).await;
}

// ---------------------------------------------------------------------------
// Unknown messages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_messages_are_ignored() {
    let (addr, _state) = common::start_server(common::StubDirectory::default()).await;
    let mut ws = common::connect(addr, "u1", None).await;

    use futures_util::SinkExt;
    ws.send(tungstenite::Message::Text("not json".to_string().into()))
        .await
        .expect("send");
    ws.send(tungstenite::Message::Text(
        serde_json::json!({ "type": "no_such_message" }).to_string().into(),
    ))
    .await
    .expect("send");

    // The connection survives and keeps answering.
    common::barrier(&mut ws).await;
}

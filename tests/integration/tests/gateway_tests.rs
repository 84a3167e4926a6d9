//! Gateway session integration tests
//!
//! Drive a real client against the scripted in-memory gateway.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::time::Duration;

use integration_tests::*;
use kook_core::{Direction, MessageId, Snowflake};
use kook_gateway::protocol::{GatewayFrame, OpCode, PresenceStatus, PresenceUpdatePayload};
use kook_gateway::{ClientEvent, ConnectionState, EventSubscription, GatewayError, SessionHandle};
use serde_json::json;

/// Start the client, identify, and deliver `READY` with guild 5 (channel 50)
async fn connect_ready(
    tc: &mut TestClient,
    heartbeat_ms: u64,
) -> (SessionHandle, ServerConnection, EventSubscription) {
    let mut events = tc.client.subscribe("test");
    let handle = tc.start().unwrap();

    let mut conn = tc.server.accept().await.unwrap();
    let identify = conn.greet(heartbeat_ms).await.unwrap();
    assert_eq!(identify.op, OpCode::Identify);

    conn.dispatch("READY", 1, ready_json("session-1", 1, vec![guild_json(5, 1, &[1, 2])]));
    handle.wait_for_state(ConnectionState::Connected).await.unwrap();
    wait_for_event(&mut events, |e| matches!(e, ClientEvent::Ready { .. }))
        .await
        .unwrap();
    (handle, conn, events)
}

fn state_changes(events: &[ClientEvent]) -> Vec<(ConnectionState, ConnectionState)> {
    events
        .iter()
        .filter_map(|e| match e {
            ClientEvent::StateChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Handshake
// ============================================================================

#[tokio::test]
async fn test_identify_and_ready() {
    let mut tc = TestClient::new();
    let mut events = tc.client.subscribe("test");
    let handle = tc.start().unwrap();

    let mut conn = tc.server.accept().await.unwrap();
    assert_eq!(conn.url, TEST_GATEWAY_URL);

    let identify = conn.greet(30_000).await.unwrap();
    assert_eq!(identify.op, OpCode::Identify);
    let token = identify.d.as_ref().unwrap()["token"].as_str().unwrap();
    assert!(token.ends_with("test-token"));

    conn.dispatch("READY", 1, ready_json("session-1", 1, vec![guild_json(5, 1, &[1, 2])]));
    let ready = wait_for_event(&mut events, |e| matches!(e, ClientEvent::Ready { .. }))
        .await
        .unwrap();
    match ready {
        ClientEvent::Ready { session_id, user_id } => {
            assert_eq!(session_id, "session-1");
            assert_eq!(user_id, Snowflake::new(1));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(handle.state(), ConnectionState::Connected);

    // Cache is populated before the event is seen
    let cache = tc.client.cache();
    assert!(cache.guild(Snowflake::new(5)).is_some());
    assert!(cache.channel(Snowflake::new(50)).is_some());
    assert_eq!(cache.members(Snowflake::new(5)).len(), 2);
    assert_eq!(cache.current_user().unwrap().id, Snowflake::new(1));

    tc.client.stop().await.unwrap();
    assert_eq!(tc.client.state(), ConnectionState::Stopped);
}

#[tokio::test]
async fn test_state_transitions_published_in_order() {
    let mut tc = TestClient::new();
    let mut events = tc.client.subscribe("all");
    let handle = tc.start().unwrap();

    let mut conn = tc.server.accept().await.unwrap();
    conn.greet(30_000).await.unwrap();
    conn.dispatch("READY", 1, ready_json("s", 1, vec![]));
    handle.wait_for_state(ConnectionState::Connected).await.unwrap();
    tc.client.stop().await.unwrap();

    assert_eq!(
        state_changes(&drain(&mut events)),
        vec![
            (ConnectionState::Disconnected, ConnectionState::Connecting),
            (ConnectionState::Connecting, ConnectionState::Identifying),
            (ConnectionState::Identifying, ConnectionState::Connected),
            (ConnectionState::Connected, ConnectionState::Stopped),
        ]
    );
}

#[tokio::test]
async fn test_gateway_url_resolved_through_rest() {
    let mut config = test_config();
    config.gateway.url = None;
    let mut tc = TestClient::with_config(config);
    tc.rest.script(
        "gateway/index?compress=0",
        Ok(ok_response(json!({"url": "wss://resolved.test/gateway"}))),
    );

    tc.start().unwrap();
    let conn = tc.server.accept().await.unwrap();
    assert_eq!(conn.url, "wss://resolved.test/gateway");
    assert_eq!(tc.rest.call_count("gateway/index?compress=0"), 1);

    tc.client.stop().await.unwrap();
}

#[tokio::test]
async fn test_handshake_timeout_reconnects() {
    let mut config = test_config();
    config.gateway.handshake_timeout_ms = 100;
    let mut tc = TestClient::with_config(config);
    tc.start().unwrap();

    // Never send HELLO
    let _silent = tc.server.accept().await.unwrap();
    let mut conn = tc.server.accept().await.unwrap();
    let identify = conn.greet(30_000).await.unwrap();
    assert_eq!(identify.op, OpCode::Identify);
    assert_eq!(tc.gateway.attempts(), 2);

    tc.client.stop().await.unwrap();
}

// ============================================================================
// Dispatch routing
// ============================================================================

#[tokio::test]
async fn test_message_flow() {
    let mut tc = TestClient::new();
    let (_handle, conn, mut events) = connect_ready(&mut tc, 30_000).await;

    let ids: Vec<MessageId> = (0..3).map(|_| MessageId::random()).collect();
    for (i, id) in ids.iter().enumerate() {
        conn.dispatch(
            "MESSAGE_CREATE",
            2 + i as u64,
            message_json(*id, 50, 2, &format!("m{i}"), at(i as i64 * 1_000)),
        );
    }
    for i in 0..3 {
        match wait_for_event(&mut events, |e| matches!(e, ClientEvent::MessageReceived(_)))
            .await
            .unwrap()
        {
            ClientEvent::MessageReceived(message) => assert_eq!(message.content, format!("m{i}")),
            other => panic!("unexpected {other:?}"),
        }
    }

    conn.dispatch("MESSAGE_UPDATE", 5, message_update_json(ids[1], 50, "edited", at(5_000)));
    match wait_for_event(&mut events, |e| matches!(e, ClientEvent::MessageUpdated { .. }))
        .await
        .unwrap()
    {
        ClientEvent::MessageUpdated { before, after, .. } => {
            assert_eq!(before.unwrap().content, "m1");
            assert_eq!(after.unwrap().content, "edited");
        }
        other => panic!("unexpected {other:?}"),
    }

    conn.dispatch("MESSAGE_DELETE", 6, message_delete_json(ids[0], 50));
    match wait_for_event(&mut events, |e| matches!(e, ClientEvent::MessageDeleted { .. }))
        .await
        .unwrap()
    {
        ClientEvent::MessageDeleted { id, cached, .. } => {
            assert_eq!(id, ids[0]);
            assert_eq!(cached.unwrap().content, "m0");
        }
        other => panic!("unexpected {other:?}"),
    }

    let history = tc
        .client
        .cache()
        .messages(Snowflake::new(50), None, Direction::Before, 10)
        .unwrap();
    let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["edited", "m2"]);

    tc.client.stop().await.unwrap();
}

#[tokio::test]
async fn test_member_events_keep_refcounts() {
    let mut tc = TestClient::new();
    let (_handle, conn, mut events) = connect_ready(&mut tc, 30_000).await;
    let cache = tc.client.cache().clone();

    conn.dispatch("GUILD_CREATE", 2, guild_json(6, 1, &[2, 3]));
    wait_for_event(&mut events, |e| matches!(e, ClientEvent::GuildCreated(_)))
        .await
        .unwrap();
    assert_eq!(cache.users().ref_count(Snowflake::new(2)), 2);

    conn.dispatch("GUILD_MEMBER_UPDATE", 3, member_json(6, 2, Some("nick")));
    match wait_for_event(&mut events, |e| matches!(e, ClientEvent::MemberUpdated { .. }))
        .await
        .unwrap()
    {
        ClientEvent::MemberUpdated { after, .. } => {
            assert_eq!(after.member.nickname.as_deref(), Some("nick"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(cache.users().ref_count(Snowflake::new(2)), 2);

    conn.dispatch(
        "GUILD_MEMBER_REMOVE",
        4,
        json!({"guild_id": "6", "user": user_json(2, "user2")}),
    );
    wait_for_event(&mut events, |e| matches!(e, ClientEvent::MemberLeft { .. }))
        .await
        .unwrap();
    assert_eq!(cache.users().ref_count(Snowflake::new(2)), 1);

    conn.dispatch("GUILD_DELETE", 5, json!({"id": "5"}));
    wait_for_event(&mut events, |e| matches!(e, ClientEvent::GuildDeleted { .. }))
        .await
        .unwrap();
    assert!(cache.user(Snowflake::new(2)).is_none());
    assert!(cache.channel(Snowflake::new(50)).is_none());
    // Pinned as the current user
    assert!(cache.user(Snowflake::new(1)).is_some());

    tc.client.stop().await.unwrap();
}

#[tokio::test]
async fn test_unknown_event_passed_through() {
    let mut tc = TestClient::new();
    let (_handle, conn, mut events) = connect_ready(&mut tc, 30_000).await;

    conn.dispatch("TYPING_START", 2, json!({"channel_id": "50"}));
    match wait_for_event(&mut events, |e| matches!(e, ClientEvent::Raw { .. }))
        .await
        .unwrap()
    {
        ClientEvent::Raw { event_type, data } => {
            assert_eq!(event_type, "TYPING_START");
            assert_eq!(data["channel_id"], "50");
        }
        other => panic!("unexpected {other:?}"),
    }

    tc.client.stop().await.unwrap();
}

#[tokio::test]
async fn test_malformed_frames_dropped() {
    let mut tc = TestClient::new();
    let (handle, conn, mut events) = connect_ready(&mut tc, 30_000).await;

    conn.send_raw("not json");
    conn.send_raw(r#"{"op":6}"#);
    conn.dispatch("MESSAGE_CREATE", 2, json!({"msg_id": "not-a-uuid"}));
    conn.dispatch(
        "MESSAGE_CREATE",
        3,
        message_json(MessageId::random(), 50, 2, "survived", at(0)),
    );

    match wait_for_event(&mut events, |e| matches!(e, ClientEvent::MessageReceived(_)))
        .await
        .unwrap()
    {
        ClientEvent::MessageReceived(message) => assert_eq!(message.content, "survived"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(handle.state(), ConnectionState::Connected);
    assert_eq!(tc.gateway.attempts(), 1);

    tc.client.stop().await.unwrap();
}

// ============================================================================
// Sequence tracking
// ============================================================================

#[tokio::test]
async fn test_stale_sequence_dropped() {
    let mut tc = TestClient::new();
    let (_handle, conn, mut events) = connect_ready(&mut tc, 30_000).await;

    conn.dispatch("MESSAGE_CREATE", 2, message_json(MessageId::random(), 50, 2, "first", at(0)));
    conn.dispatch("MESSAGE_CREATE", 2, message_json(MessageId::random(), 50, 2, "replay", at(1)));
    conn.dispatch("MESSAGE_CREATE", 3, message_json(MessageId::random(), 50, 2, "second", at(2)));

    let mut received = Vec::new();
    for _ in 0..2 {
        if let ClientEvent::MessageReceived(message) =
            wait_for_event(&mut events, |e| matches!(e, ClientEvent::MessageReceived(_)))
                .await
                .unwrap()
        {
            received.push(message.content);
        }
    }
    assert_eq!(received, vec!["first", "second"]);
    assert_eq!(tc.client.cache().stats().messages, 2);

    tc.client.stop().await.unwrap();
}

#[tokio::test]
async fn test_sequence_gap_forces_reidentify() {
    let mut tc = TestClient::new();
    let (handle, conn, mut events) = connect_ready(&mut tc, 30_000).await;

    // 2 is missing; the event is still delivered
    conn.dispatch("MESSAGE_CREATE", 3, message_json(MessageId::random(), 50, 2, "after gap", at(0)));
    wait_for_event(&mut events, |e| matches!(e, ClientEvent::MessageReceived(_)))
        .await
        .unwrap();

    conn.reset();
    let mut conn = tc.server.accept().await.unwrap();
    let handshake = conn.greet(30_000).await.unwrap();
    assert_eq!(handshake.op, OpCode::Identify);

    // Cleared before the new READY repopulates it
    wait_for_event(&mut events, |e| matches!(e, ClientEvent::CacheReset))
        .await
        .unwrap();
    assert!(tc.client.cache().guild(Snowflake::new(5)).is_none());
    assert_eq!(tc.client.cache().stats().messages, 0);

    conn.dispatch("READY", 1, ready_json("session-2", 1, vec![guild_json(6, 1, &[1])]));
    handle.wait_for_state(ConnectionState::Connected).await.unwrap();
    wait_for_event(&mut events, |e| matches!(e, ClientEvent::Ready { .. }))
        .await
        .unwrap();
    assert!(tc.client.cache().guild(Snowflake::new(6)).is_some());
    assert!(tc.client.cache().guild(Snowflake::new(5)).is_none());

    tc.client.stop().await.unwrap();
}

// ============================================================================
// Heartbeat and recovery
// ============================================================================

#[tokio::test]
async fn test_acknowledged_heartbeats_keep_connection() {
    let mut tc = TestClient::new();
    let (handle, mut conn, _events) = connect_ready(&mut tc, 50).await;

    for _ in 0..3 {
        let beat = conn.expect_op(OpCode::Heartbeat).await.unwrap();
        assert_eq!(beat.d, Some(json!(1)));
        conn.ack();
    }

    assert_eq!(handle.state(), ConnectionState::Connected);
    assert_eq!(tc.gateway.attempts(), 1);
    assert!(handle.latency().is_some());
    assert!(tc.client.latency().is_some());

    tc.client.stop().await.unwrap();
}

#[tokio::test]
async fn test_missed_ack_resumes_session() {
    let mut config = test_config();
    config.gateway.heartbeat_ack_timeout_ms = Some(100);
    let mut tc = TestClient::with_config(config);
    let (handle, mut conn, mut events) = connect_ready(&mut tc, 100).await;

    conn.dispatch("MESSAGE_CREATE", 2, message_json(MessageId::random(), 50, 2, "kept", at(0)));
    conn.expect_op(OpCode::Heartbeat).await.unwrap();
    // No ack: the deadline passes and the client reconnects

    let mut conn = tc.server.accept().await.unwrap();
    let resume = conn.greet(30_000).await.unwrap();
    assert_eq!(resume.op, OpCode::Resume);
    let d = resume.d.unwrap();
    assert_eq!(d["session_id"], "session-1");
    assert_eq!(d["seq"], 2);

    conn.dispatch("RESUMED", 3, json!({}));
    handle.wait_for_state(ConnectionState::Connected).await.unwrap();
    let mut reset_seen = false;
    wait_for_event(&mut events, |e| {
        reset_seen |= matches!(e, ClientEvent::CacheReset);
        matches!(e, ClientEvent::Resumed)
    })
    .await
    .unwrap();

    assert!(!reset_seen);
    assert!(tc.client.cache().guild(Snowflake::new(5)).is_some());
    assert_eq!(tc.client.cache().stats().messages, 1);

    tc.client.stop().await.unwrap();
}

#[tokio::test]
async fn test_server_heartbeat_request_answered() {
    let mut tc = TestClient::new();
    let (_handle, mut conn, _events) = connect_ready(&mut tc, 30_000).await;

    conn.send(&GatewayFrame::heartbeat(None));
    let beat = conn.expect_op(OpCode::Heartbeat).await.unwrap();
    assert_eq!(beat.d, Some(json!(1)));

    tc.client.stop().await.unwrap();
}

#[tokio::test]
async fn test_reconnect_request_resumes() {
    let mut tc = TestClient::new();
    let (_handle, conn, _events) = connect_ready(&mut tc, 30_000).await;

    conn.send(&GatewayFrame::reconnect());
    let mut conn = tc.server.accept().await.unwrap();
    assert_eq!(conn.greet(30_000).await.unwrap().op, OpCode::Resume);

    tc.client.stop().await.unwrap();
}

#[tokio::test]
async fn test_unresumable_invalid_session_reidentifies() {
    let mut tc = TestClient::new();
    let (_handle, conn, mut events) = connect_ready(&mut tc, 30_000).await;

    conn.send(&GatewayFrame::invalid_session(false));
    let mut conn = tc.server.accept().await.unwrap();
    assert_eq!(conn.greet(30_000).await.unwrap().op, OpCode::Identify);
    wait_for_event(&mut events, |e| matches!(e, ClientEvent::CacheReset))
        .await
        .unwrap();

    tc.client.stop().await.unwrap();
}

#[tokio::test]
async fn test_invalid_sequence_close_reidentifies() {
    let mut tc = TestClient::new();
    let (_handle, conn, _events) = connect_ready(&mut tc, 30_000).await;

    conn.close(4007, "invalid seq");
    let mut conn = tc.server.accept().await.unwrap();
    assert_eq!(conn.greet(30_000).await.unwrap().op, OpCode::Identify);

    tc.client.stop().await.unwrap();
}

#[tokio::test]
async fn test_refused_connections_back_off_then_recover() {
    let mut tc = TestClient::new();
    tc.gateway.refuse_next(2);
    let handle = tc.start().unwrap();

    let mut conn = tc.server.accept().await.unwrap();
    assert_eq!(tc.gateway.attempts(), 3);
    conn.greet(30_000).await.unwrap();
    conn.dispatch("READY", 1, ready_json("s", 1, vec![]));
    handle.wait_for_state(ConnectionState::Connected).await.unwrap();

    tc.client.stop().await.unwrap();
}

// ============================================================================
// Terminal outcomes
// ============================================================================

#[tokio::test]
async fn test_fatal_close_stops_session() {
    let mut tc = TestClient::new();
    let (handle, conn, mut events) = connect_ready(&mut tc, 30_000).await;

    conn.close(4004, "authentication failed");
    match wait_for_event(&mut events, |e| matches!(e, ClientEvent::FatalError(_)))
        .await
        .unwrap()
    {
        ClientEvent::FatalError(reason) => assert!(reason.contains("4004")),
        other => panic!("unexpected {other:?}"),
    }

    assert!(handle.wait_for_state(ConnectionState::Stopped).await.is_ok());
    let result = tc.client.stop().await;
    assert!(matches!(result, Err(GatewayError::FatalClose { code: 4004, .. })));
    assert_eq!(tc.gateway.attempts(), 1);
}

#[tokio::test]
async fn test_reconnect_exhaustion_stops_session() {
    let mut config = test_config();
    config.gateway.reconnect.max_attempts = 3;
    let tc = TestClient::with_config(config);
    tc.gateway.refuse_next(u32::MAX);
    let mut events = tc.client.subscribe("test");
    let handle = tc.start().unwrap();

    assert!(handle.wait_for_state(ConnectionState::Stopped).await.is_ok());
    let result = tc.client.stop().await;
    assert!(matches!(result, Err(GatewayError::ReconnectExhausted { attempts: 3 })));
    assert_eq!(tc.gateway.attempts(), 4);

    let fatal: Vec<_> = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, ClientEvent::FatalError(_)))
        .collect();
    assert_eq!(fatal.len(), 1);
}

#[tokio::test]
async fn test_stop_closes_socket_and_halts_heartbeat() {
    let mut tc = TestClient::new();
    let (handle, mut conn, _events) = connect_ready(&mut tc, 50).await;
    conn.expect_op(OpCode::Heartbeat).await.unwrap();
    conn.ack();

    tc.client.stop().await.unwrap();
    assert_eq!(conn.expect_closed().await.unwrap(), Some(1000));
    assert!(conn.next_message().await.is_err());
    assert_eq!(handle.state(), ConnectionState::Stopped);
    assert!(tc.client.cache().current_user().is_none());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(tc.gateway.attempts(), 1);
    assert!(matches!(
        handle.update_presence(PresenceUpdatePayload::new(PresenceStatus::Idle)).await,
        Err(GatewayError::Stopped)
    ));
}

#[tokio::test]
async fn test_stop_during_backoff() {
    let mut config = test_config();
    config.gateway.reconnect.initial_delay_ms = 5_000;
    config.gateway.reconnect.max_delay_ms = 5_000;
    let tc = TestClient::with_config(config);
    tc.gateway.refuse_next(1);
    let handle = tc.start().unwrap();

    handle.wait_for_state(ConnectionState::Reconnecting).await.unwrap();
    let start = tokio::time::Instant::now();
    tc.client.stop().await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(tc.client.state(), ConnectionState::Stopped);
}

// ============================================================================
// Outbound frames
// ============================================================================

#[tokio::test]
async fn test_presence_update_sent_when_connected() {
    let mut tc = TestClient::new();
    let (_handle, mut conn, _events) = connect_ready(&mut tc, 30_000).await;

    tc.client
        .update_presence(PresenceUpdatePayload::new(PresenceStatus::Dnd).with_activity("testing"))
        .await
        .unwrap();
    let frame = conn.expect_op(OpCode::PresenceUpdate).await.unwrap();
    let d = frame.d.unwrap();
    assert_eq!(d["status"], "dnd");
    assert_eq!(d["activity"], "testing");

    tc.client.stop().await.unwrap();
}

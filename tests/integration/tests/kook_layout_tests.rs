//! Gateway sessions over the service's own `{s, sn, d}` frame layout
//!
//! Run with: cargo test -p integration-tests --test kook_layout_tests

use integration_tests::*;
use kook_core::Snowflake;
use kook_gateway::{ClientEvent, ConnectionState, EventSubscription, SessionHandle};
use serde_json::json;

fn hello(conn: &ServerConnection, session_id: &str) {
    conn.send_raw(&json!({"s": 1, "d": {"code": 0, "session_id": session_id}}).to_string());
}

fn event(conn: &ServerConnection, sn: u64, content: &str) {
    let d = json!({
        "channel_type": "GROUP",
        "type": 9,
        "target_id": "50",
        "author_id": "2",
        "content": content,
        "msg_id": format!("m-{sn}"),
        "msg_timestamp": 1_700_000_000_000u64,
    });
    conn.send_raw(&json!({"s": 0, "sn": sn, "d": d}).to_string());
}

async fn next_raw(events: &mut EventSubscription) -> serde_json::Value {
    match wait_for_event(events, |e| matches!(e, ClientEvent::Raw { .. }))
        .await
        .unwrap()
    {
        ClientEvent::Raw { data, .. } => data,
        other => panic!("unexpected {other:?}"),
    }
}

/// Start, greet with `session_id`, and wait for `READY`
async fn connect(tc: &mut TestClient, session_id: &str) -> (SessionHandle, ServerConnection, EventSubscription) {
    tc.rest.script("user/me", Ok(ok_response(user_json(7, "me"))));
    let mut events = tc.client.subscribe("test");
    let handle = tc.start().unwrap();

    let conn = tc.server.accept().await.unwrap();
    hello(&conn, session_id);
    handle.wait_for_state(ConnectionState::Connected).await.unwrap();
    wait_for_event(&mut events, |e| matches!(e, ClientEvent::Ready { .. }))
        .await
        .unwrap();
    (handle, conn, events)
}

#[tokio::test]
async fn test_hello_with_session_is_ready() {
    let mut tc = TestClient::kook_layout(test_config());
    tc.rest.script("user/me", Ok(ok_response(user_json(7, "me"))));
    let mut events = tc.client.subscribe("test");
    let handle = tc.start().unwrap();

    let conn = tc.server.accept().await.unwrap();
    hello(&conn, "kook-1");

    let ready = wait_for_event(&mut events, |e| matches!(e, ClientEvent::Ready { .. }))
        .await
        .unwrap();
    match ready {
        ClientEvent::Ready { session_id, user_id } => {
            assert_eq!(session_id, "kook-1");
            assert_eq!(user_id, Snowflake::new(7));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(handle.state(), ConnectionState::Connected);
    assert_eq!(tc.client.cache().current_user().unwrap().id, Snowflake::new(7));
    assert_eq!(tc.rest.call_count("user/me"), 1);

    event(&conn, 1, "hello there");
    let data = next_raw(&mut events).await;
    assert_eq!(data["content"], "hello there");

    tc.client.stop().await.unwrap();
}

#[tokio::test]
async fn test_ping_carries_last_sn_and_pong_acks() {
    let mut config = test_config();
    config.gateway.heartbeat_interval_ms = Some(50);
    let mut tc = TestClient::kook_layout(config);
    let (handle, mut conn, mut events) = connect(&mut tc, "kook-1").await;

    event(&conn, 1, "a");
    event(&conn, 2, "b");
    next_raw(&mut events).await;
    next_raw(&mut events).await;

    loop {
        let ping = conn.next_json().await.unwrap();
        assert_eq!(ping["s"], 2);
        conn.send_raw(r#"{"s":3}"#);
        if ping["sn"] == 2 {
            break;
        }
    }
    assert_eq!(handle.state(), ConnectionState::Connected);

    tc.client.stop().await.unwrap();
}

#[tokio::test]
async fn test_resume_sends_sn_and_waits_for_ack() {
    let mut tc = TestClient::kook_layout(test_config());
    let (handle, conn, mut events) = connect(&mut tc, "kook-1").await;

    event(&conn, 1, "a");
    event(&conn, 2, "b");
    next_raw(&mut events).await;
    next_raw(&mut events).await;
    conn.reset();

    let mut conn = tc.server.accept().await.unwrap();
    hello(&conn, "kook-1");
    assert_eq!(conn.next_json().await.unwrap(), json!({"s": 4, "sn": 2}));
    assert_eq!(handle.state(), ConnectionState::Resuming);

    event(&conn, 3, "missed");
    conn.send_raw(r#"{"s":6,"d":{"session_id":"kook-1"}}"#);
    assert_eq!(next_raw(&mut events).await["content"], "missed");
    wait_for_event(&mut events, |e| {
        matches!(
            e,
            ClientEvent::StateChanged {
                from: ConnectionState::Resuming,
                to: ConnectionState::Connected,
            }
        )
    })
    .await
    .unwrap();
    assert_eq!(tc.rest.call_count("user/me"), 1);

    tc.client.stop().await.unwrap();
}

#[tokio::test]
async fn test_reconnect_signal_starts_fresh_session() {
    let mut tc = TestClient::kook_layout(test_config());
    let (_handle, conn, mut events) = connect(&mut tc, "kook-1").await;
    tc.rest.script("user/me", Ok(ok_response(user_json(7, "me"))));

    event(&conn, 1, "a");
    next_raw(&mut events).await;
    conn.send_raw(r#"{"s":5,"d":{"code":41008,"err":"missing params"}}"#);

    let conn = tc.server.accept().await.unwrap();
    hello(&conn, "kook-2");
    wait_for_event(&mut events, |e| matches!(e, ClientEvent::CacheReset))
        .await
        .unwrap();
    let ready = wait_for_event(&mut events, |e| matches!(e, ClientEvent::Ready { .. }))
        .await
        .unwrap();
    assert!(matches!(ready, ClientEvent::Ready { session_id, .. } if session_id == "kook-2"));
    assert_eq!(tc.rest.call_count("user/me"), 2);

    tc.client.stop().await.unwrap();
}

#[tokio::test]
async fn test_refused_hello_reconnects() {
    let mut tc = TestClient::kook_layout(test_config());
    tc.rest.script("user/me", Ok(ok_response(user_json(7, "me"))));
    let handle = tc.start().unwrap();

    let conn = tc.server.accept().await.unwrap();
    conn.send_raw(r#"{"s":1,"d":{"code":40103}}"#);

    let conn = tc.server.accept().await.unwrap();
    assert_eq!(tc.gateway.attempts(), 2);
    hello(&conn, "kook-1");
    handle.wait_for_state(ConnectionState::Connected).await.unwrap();

    tc.client.stop().await.unwrap();
}

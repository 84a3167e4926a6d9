//! Request dispatcher integration tests
//!
//! Exercise the client's REST queue through the facade with a mock transport.
//!
//! Run with: cargo test -p integration-tests --test rest_tests

use std::time::Duration;

use integration_tests::*;
use kook_core::{RetryMode, Snowflake, User};
use kook_gateway::ClientEvent;
use kook_rest::{BucketKey, Method, RequestOptions, RestError};
use tokio::time::Instant;

#[tokio::test]
async fn test_send_json_decodes_envelope() {
    let tc = TestClient::new();
    tc.rest.script("user/me", Ok(ok_response(user_json(7, "me"))));

    let user: User = tc
        .client
        .rest()
        .send_json(Method::GET, "user/me", None, RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(user.id, Snowflake::new(7));
    assert_eq!(user.username, "me");
}

#[tokio::test]
async fn test_rate_limit_headers_delay_same_route_only() {
    let tc = TestClient::new();
    tc.rest.script(
        "guild/list",
        Ok(ok_response(serde_json::json!([]))
            .with_header("X-Rate-Limit-Limit", "1")
            .with_header("X-Rate-Limit-Remaining", "0")
            .with_header("X-Rate-Limit-Reset", "0.3")),
    );
    let rest = tc.client.rest();

    rest.send(Method::GET, "guild/list", None, RequestOptions::new())
        .await
        .unwrap();
    let t0 = Instant::now();

    let same = rest.send(Method::GET, "guild/list", None, RequestOptions::new());
    let other = rest.send(Method::GET, "user/me", None, RequestOptions::new());

    other.await.unwrap();
    assert!(t0.elapsed() < Duration::from_millis(200));
    same.await.unwrap();
    assert!(t0.elapsed() >= Duration::from_millis(250));

    let bucket = rest
        .bucket(&BucketKey::Route("GET guild/list".into()))
        .unwrap();
    assert_eq!(bucket.limit(), Some(1));
}

#[tokio::test]
async fn test_throttle_published_to_subscribers() {
    let tc = TestClient::new();
    let mut events = tc.client.subscribe("limits");
    tc.rest.script("message/create", Ok(throttled("0.2")));

    let start = Instant::now();
    tc.client
        .rest()
        .send(
            Method::POST,
            "message/create",
            Some(serde_json::json!({"target_id": "50", "content": "hi"})),
            RequestOptions::new(),
        )
        .await
        .unwrap();
    assert!(start.elapsed() >= Duration::from_millis(180));
    assert_eq!(tc.rest.call_count("message/create"), 2);

    match wait_for_event(&mut events, |e| matches!(e, ClientEvent::RateLimited(_)))
        .await
        .unwrap()
    {
        ClientEvent::RateLimited(info) => {
            assert_eq!(info.bucket, "POST message/create");
            assert_eq!(info.retry_after, Some(Duration::from_millis(200)));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_never_policy_surfaces_throttle() {
    let tc = TestClient::new();
    tc.rest.script("message/create", Ok(throttled("5")));

    let start = Instant::now();
    let result = tc
        .client
        .rest()
        .send(
            Method::POST,
            "message/create",
            None,
            RequestOptions::new().retry_mode(RetryMode::Never),
        )
        .await;
    assert!(matches!(result, Err(RestError::RateLimited { .. })));
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_stop_cancels_pending_requests() {
    let mut tc = TestClient::new();
    tc.start().unwrap();
    let _conn = tc.server.accept().await.unwrap();

    tc.rest.script("guild/list", Ok(throttled("5")));
    let never = || RequestOptions::new().retry_mode(RetryMode::Never);
    let rest = tc.client.rest().clone();

    let _ = rest.send(Method::GET, "guild/list", None, never()).await;
    let pending: Vec<_> = (0..3)
        .map(|_| rest.send(Method::GET, "guild/list", None, never()))
        .collect();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let start = Instant::now();
    tc.client.stop().await.unwrap();
    for handle in pending {
        assert!(matches!(handle.await, Err(RestError::Cancelled)));
    }
    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(rest.is_shut_down());

    let late = rest.send(Method::GET, "user/me", None, RequestOptions::new()).await;
    assert!(matches!(late, Err(RestError::Cancelled)));
    assert_eq!(tc.rest.call_count("guild/list"), 1);
}

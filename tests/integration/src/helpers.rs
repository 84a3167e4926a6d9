//! Test helpers for integration tests
//!
//! Provides an in-memory gateway that tests drive frame by frame, a REST
//! transport with canned responses, and a client wired to both.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::{SinkExt, StreamExt};
use kook_common::ClientConfig;
use kook_gateway::protocol::{GatewayFrame, JsonCodec, KookCodec, OpCode};
use kook_gateway::transport::{FrameSink, FrameStream};
use kook_gateway::{
    ClientEvent, EventSubscription, GatewayConnector, KookClient, SessionHandle, TransportError,
    TransportMessage,
};
use kook_rest::{RestError, RestRequest, RestResponse, RestTransport};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// Upper bound for any single wait in a test
pub const TEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Gateway URL used by [`test_config`]
pub const TEST_GATEWAY_URL: &str = "ws://gateway.test/ws";

// ============================================================================
// Scripted gateway
// ============================================================================

/// Server end of one in-memory connection
pub struct ServerConnection {
    pub url: String,
    to_client: UnboundedSender<Result<TransportMessage, TransportError>>,
    from_client: UnboundedReceiver<TransportMessage>,
}

impl ServerConnection {
    pub fn send(&self, frame: &GatewayFrame) {
        let text = serde_json::to_string(frame).expect("frame serializes");
        self.send_raw(&text);
    }

    /// Push text that may not be a valid frame
    pub fn send_raw(&self, text: &str) {
        let _ = self
            .to_client
            .unbounded_send(Ok(TransportMessage::Text(text.to_string())));
    }

    pub fn hello(&self, heartbeat_interval_ms: u64) {
        self.send(&GatewayFrame::hello(heartbeat_interval_ms));
    }

    pub fn dispatch(&self, event_type: &str, sequence: u64, data: Value) {
        self.send(&GatewayFrame::dispatch(event_type, Some(sequence), data));
    }

    pub fn ack(&self) {
        self.send(&GatewayFrame::heartbeat_ack());
    }

    pub fn close(&self, code: u16, reason: &str) {
        let _ = self
            .to_client
            .unbounded_send(Ok(TransportMessage::close(code, reason)));
    }

    /// Fail the client's read half
    pub fn reset(&self) {
        let _ = self
            .to_client
            .unbounded_send(Err(TransportError::Receive("connection reset".into())));
    }

    /// Next message written by the client
    pub async fn next_message(&mut self) -> Result<TransportMessage> {
        tokio::time::timeout(TEST_TIMEOUT, self.from_client.next())
            .await
            .map_err(|_| anyhow!("timed out waiting for client message"))?
            .ok_or_else(|| anyhow!("client dropped the connection"))
    }

    /// Next client message as raw JSON
    pub async fn next_json(&mut self) -> Result<Value> {
        match self.next_message().await? {
            TransportMessage::Text(text) => Ok(serde_json::from_str(&text)?),
            other => bail!("expected a text frame, got {other:?}"),
        }
    }

    /// Next frame written by the client
    pub async fn next_frame(&mut self) -> Result<GatewayFrame> {
        match self.next_message().await? {
            TransportMessage::Text(text) => Ok(serde_json::from_str(&text)?),
            TransportMessage::Binary(bytes) => Ok(serde_json::from_slice(&bytes)?),
            TransportMessage::Close(frame) => bail!("client closed the connection: {frame:?}"),
        }
    }

    /// Next frame with opcode `op`, skipping heartbeats unless asked for one
    pub async fn expect_op(&mut self, op: OpCode) -> Result<GatewayFrame> {
        loop {
            let frame = self.next_frame().await?;
            if frame.op == op {
                return Ok(frame);
            }
            if frame.op != OpCode::Heartbeat {
                bail!("expected {op}, got {frame}");
            }
        }
    }

    /// Send `HELLO` and return the client's `IDENTIFY` or `RESUME`
    pub async fn greet(&mut self, heartbeat_interval_ms: u64) -> Result<GatewayFrame> {
        self.hello(heartbeat_interval_ms);
        let frame = self.next_frame().await?;
        match frame.op {
            OpCode::Identify | OpCode::Resume => Ok(frame),
            _ => bail!("expected IDENTIFY or RESUME, got {frame}"),
        }
    }

    /// Wait for the client to close or drop the connection
    pub async fn expect_closed(&mut self) -> Result<Option<u16>> {
        loop {
            let next = tokio::time::timeout(TEST_TIMEOUT, self.from_client.next())
                .await
                .map_err(|_| anyhow!("timed out waiting for close"))?;
            match next {
                None => return Ok(None),
                Some(TransportMessage::Close(frame)) => return Ok(frame.map(|f| f.code)),
                Some(_) => {}
            }
        }
    }
}

/// Connector handing each connection to the paired [`GatewayServer`]
pub struct ScriptedGateway {
    accepted: mpsc::UnboundedSender<ServerConnection>,
    refuse: AtomicU32,
    attempts: AtomicU32,
}

impl ScriptedGateway {
    /// Refuse the next `count` connection attempts
    pub fn refuse_next(&self, count: u32) {
        self.refuse.store(count, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GatewayConnector for ScriptedGateway {
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Connect("connection refused".into()));
        }

        let (client_tx, from_client) = unbounded::<TransportMessage>();
        let (to_client, client_rx) = unbounded();
        self.accepted
            .send(ServerConnection {
                url: url.to_string(),
                to_client,
                from_client,
            })
            .map_err(|_| TransportError::Connect("gateway server dropped".into()))?;

        let sink: FrameSink = Box::pin(client_tx.sink_map_err(|e| TransportError::Send(e.to_string())));
        let stream: FrameStream = Box::pin(client_rx);
        Ok((sink, stream))
    }
}

/// Test side of the scripted gateway
pub struct GatewayServer {
    connections: mpsc::UnboundedReceiver<ServerConnection>,
}

impl GatewayServer {
    pub async fn accept(&mut self) -> Result<ServerConnection> {
        tokio::time::timeout(TEST_TIMEOUT, self.connections.recv())
            .await
            .map_err(|_| anyhow!("timed out waiting for a connection"))?
            .ok_or_else(|| anyhow!("connector dropped"))
    }
}

pub fn scripted_gateway() -> (Arc<ScriptedGateway>, GatewayServer) {
    let (accepted, connections) = mpsc::unbounded_channel();
    let gateway = Arc::new(ScriptedGateway {
        accepted,
        refuse: AtomicU32::new(0),
        attempts: AtomicU32::new(0),
    });
    (gateway, GatewayServer { connections })
}

// ============================================================================
// Mock REST
// ============================================================================

/// Replays scripted responses per endpoint and records every call
#[derive(Default)]
pub struct MockRest {
    scripts: Mutex<HashMap<String, VecDeque<Result<RestResponse, RestError>>>>,
    calls: Mutex<Vec<RestRequest>>,
}

impl MockRest {
    pub fn script(&self, endpoint: &str, response: Result<RestResponse, RestError>) {
        self.scripts
            .lock()
            .entry(endpoint.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn calls(&self) -> Vec<RestRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, endpoint: &str) -> usize {
        self.calls.lock().iter().filter(|r| r.endpoint == endpoint).count()
    }
}

#[async_trait]
impl RestTransport for MockRest {
    async fn execute(&self, request: &RestRequest) -> Result<RestResponse, RestError> {
        self.calls.lock().push(request.clone());
        let scripted = self
            .scripts
            .lock()
            .get_mut(&request.endpoint)
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or_else(|| Ok(ok_response(json!({}))))
    }
}

/// `{code: 0, data}` envelope
pub fn ok_response(data: Value) -> RestResponse {
    RestResponse::new(200, json!({"code": 0, "message": "", "data": data}))
}

/// 429 with a `Retry-After` in seconds
pub fn throttled(retry_after: &str) -> RestResponse {
    RestResponse::new(429, json!({"code": 429, "message": "too many requests"}))
        .with_header("Retry-After", retry_after)
}

// ============================================================================
// Client harness
// ============================================================================

/// Fast timings, fixed gateway URL, no jitter, lenient heartbeat acks
pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::with_token("test-token");
    config.gateway.url = Some(TEST_GATEWAY_URL.to_string());
    config.gateway.handshake_timeout_ms = 1_000;
    config.gateway.heartbeat_ack_timeout_ms = Some(1_000);
    config.gateway.reconnect.initial_delay_ms = 10;
    config.gateway.reconnect.max_delay_ms = 40;
    config.gateway.reconnect.max_attempts = 5;
    config.gateway.reconnect.jitter = false;
    config.cache.event_buffer = 512;
    config
}

/// Client wired to a scripted gateway and a mock REST transport
pub struct TestClient {
    pub client: KookClient,
    pub server: GatewayServer,
    pub gateway: Arc<ScriptedGateway>,
    pub rest: Arc<MockRest>,
}

impl TestClient {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        let (gateway, server) = scripted_gateway();
        let rest = Arc::new(MockRest::default());
        let client = KookClient::with_parts(config, rest.clone(), gateway.clone()).with_codec(Arc::new(JsonCodec));
        Self {
            client,
            server,
            gateway,
            rest,
        }
    }

    /// Client speaking the service's own `{s, sn, d}` layout
    pub fn kook_layout(config: ClientConfig) -> Self {
        let Self {
            client,
            server,
            gateway,
            rest,
        } = Self::with_config(config);
        Self {
            client: client.with_codec(Arc::new(KookCodec::new())),
            server,
            gateway,
            rest,
        }
    }

    pub fn start(&self) -> Result<SessionHandle> {
        Ok(self.client.start()?)
    }
}

impl Default for TestClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Next event matching `predicate`; earlier events are skipped
pub async fn wait_for_event<F>(events: &mut EventSubscription, mut predicate: F) -> Result<ClientEvent>
where
    F: FnMut(&ClientEvent) -> bool,
{
    tokio::time::timeout(TEST_TIMEOUT, async {
        while let Some(event) = events.recv().await {
            if predicate(&event) {
                return Ok(event);
            }
        }
        bail!("event bus closed")
    })
    .await
    .map_err(|_| anyhow!("timed out waiting for event"))?
}

/// Every event currently queued for the group
pub fn drain(events: &mut EventSubscription) -> Vec<ClientEvent> {
    std::iter::from_fn(|| events.try_recv()).collect()
}

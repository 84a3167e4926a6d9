//! Gateway session
//!
//! One task owns the connection: it performs the handshake, beats the
//! heartbeat, tracks sequences, routes dispatches, and decides between
//! resume, re-identify, backoff, and stop when a connection ends.
//!
//! ```text
//! Disconnected -> Connecting -> Identifying | Resuming -> Connected
//!                     ^                                      |
//!                     +------------- Reconnecting <----------+
//! ```
//! Any state may move to `Stopped`, which is terminal.

mod handle;

pub use handle::SessionHandle;

use futures_util::{SinkExt, StreamExt};
use kook_core::User;
use kook_rest::{Method, RequestOptions};
use parking_lot::RwLock;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, sleep_until, timeout, timeout_at, Instant};

use crate::client::ClientContext;
use crate::connection::{
    ConnectionState, HeartbeatAction, HeartbeatMonitor, ReconnectBackoff, ResumeState,
    SequenceCheck,
};
use crate::error::{GatewayError, GatewayResult, TransportError};
use crate::events::{ClientEvent, DispatchEvent, ReadyPayload};
use crate::protocol::{
    CloseAction, ConnectionProperties, FrameCodec, GatewayFrame, HelloPayload, IdentifyPayload,
    KookCodec, ResumePayload, ServerFrame,
};
use crate::router::EventRouter;
use crate::transport::{CloseFrame, FrameSink, FrameStream, GatewayConnector, TransportMessage};

/// Application frames waiting for a connected socket
const OUTBOUND_BUFFER_SIZE: usize = 32;

/// Close code sent when the client stops on purpose
const NORMAL_CLOSURE: u16 = 1000;

/// How one connection generation ended
#[derive(Debug)]
enum Disconnect {
    /// Stop was requested
    Stop,
    /// Recoverable; back off and connect again
    Reconnect(GatewayError),
    Fatal(GatewayError),
}

/// Result of reading one transport message
enum Inbound {
    Frame(ServerFrame),
    Close(Option<CloseFrame>),
    Dropped,
}

#[derive(Deserialize)]
struct GatewayIndex {
    url: String,
}

pub struct GatewaySession {
    context: ClientContext,
    connector: Arc<dyn GatewayConnector>,
    codec: Arc<dyn FrameCodec>,
    router: EventRouter,
    resume: ResumeState,
    backoff: ReconnectBackoff,
    heartbeat: Option<HeartbeatMonitor>,
    latency: Arc<RwLock<Option<Duration>>>,
    state: watch::Sender<ConnectionState>,
    stop: watch::Receiver<bool>,
    outbound: mpsc::Receiver<GatewayFrame>,
}

impl GatewaySession {
    /// Session speaking the service's own frame layout
    pub fn new(context: ClientContext, connector: Arc<dyn GatewayConnector>) -> (Self, SessionHandle) {
        Self::with_codec(context, connector, Arc::new(KookCodec::new()))
    }

    pub fn with_codec(
        context: ClientContext,
        connector: Arc<dyn GatewayConnector>,
        codec: Arc<dyn FrameCodec>,
    ) -> (Self, SessionHandle) {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (stop_tx, stop_rx) = watch::channel(false);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER_SIZE);
        let latency = Arc::new(RwLock::new(None));

        let handle = SessionHandle {
            latency: Arc::clone(&latency),
            stop: Arc::new(stop_tx),
            outbound: outbound_tx,
            state: state_rx,
            rest: context.rest().clone(),
        };
        let session = Self {
            router: EventRouter::new(Arc::clone(context.cache()), Arc::clone(context.bus())),
            backoff: ReconnectBackoff::from_config(&context.config().gateway.reconnect),
            context,
            connector,
            codec,
            resume: ResumeState::new(),
            heartbeat: None,
            latency,
            state: state_tx,
            stop: stop_rx,
            outbound: outbound_rx,
        };
        (session, handle)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Drive the session until it stops.
    ///
    /// Returns `Ok` after a requested stop and the terminal error otherwise.
    pub async fn run(mut self) -> GatewayResult<()> {
        tracing::info!(codec = self.codec.name(), "Gateway session starting");
        self.transition(ConnectionState::Connecting);

        loop {
            let outcome = self.connect_once().await;
            self.heartbeat = None;

            match outcome {
                Disconnect::Stop => {
                    self.stopped();
                    return Ok(());
                }
                Disconnect::Fatal(err) => return Err(self.fail(err)),
                Disconnect::Reconnect(reason) => {
                    tracing::warn!(
                        error = %reason,
                        generation = self.resume.generation(),
                        "Gateway connection lost"
                    );
                    self.transition(ConnectionState::Reconnecting);

                    let Some(delay) = self.backoff.next_delay() else {
                        let err = GatewayError::ReconnectExhausted {
                            attempts: self.backoff.attempts(),
                        };
                        return Err(self.fail(err));
                    };
                    tracing::info!(
                        delay_ms = delay.as_millis() as u64,
                        attempt = self.backoff.attempts(),
                        max_attempts = self.backoff.max_attempts(),
                        "Reconnecting after backoff"
                    );
                    if self.sleep_or_stop(delay).await {
                        self.stopped();
                        return Ok(());
                    }
                    self.transition(ConnectionState::Connecting);
                }
            }
        }
    }

    // ========================================================================
    // Connection lifecycle
    // ========================================================================

    async fn connect_once(&mut self) -> Disconnect {
        let handshake = self.context.config().gateway.handshake_timeout();
        let mut stop = self.stop.clone();

        let url = tokio::select! {
            () = stop_requested(&mut stop) => return Disconnect::Stop,
            url = self.gateway_url() => match url {
                Ok(url) => url,
                Err(e) => return Disconnect::Reconnect(e),
            },
        };

        tracing::debug!(url = %url, "Opening gateway connection");
        let (mut sink, mut stream) = tokio::select! {
            () = stop_requested(&mut stop) => return Disconnect::Stop,
            result = timeout(handshake, self.connector.connect(&url)) => match result {
                Err(_) => return Disconnect::Reconnect(GatewayError::HandshakeTimeout),
                Ok(Err(e)) => return Disconnect::Reconnect(e.into()),
                Ok(Ok(halves)) => halves,
            },
        };

        let hello = match self.await_hello(&mut stream, handshake).await {
            Ok(hello) => hello,
            Err(disconnect) => return disconnect,
        };
        self.heartbeat = Some(self.heartbeat_monitor(&hello));

        if let Err(e) = self.handshake(&mut sink).await {
            return Disconnect::Reconnect(e);
        }
        if let Some(session_id) = hello.session_id {
            if let Err(e) = self.ready_from_hello(session_id).await {
                return Disconnect::Reconnect(e);
            }
        }

        let outcome = self.pump(&mut sink, &mut stream, Instant::now() + handshake).await;
        if matches!(outcome, Disconnect::Stop) {
            let _ = sink
                .send(TransportMessage::close(NORMAL_CLOSURE, "client stopped"))
                .await;
        }
        outcome
    }

    async fn gateway_url(&self) -> GatewayResult<String> {
        if let Some(url) = &self.context.config().gateway.url {
            return Ok(url.clone());
        }
        let index: GatewayIndex = self
            .context
            .rest()
            .send_json(Method::GET, "gateway/index?compress=0", None, RequestOptions::new())
            .await?;
        Ok(index.url)
    }

    async fn await_hello(
        &mut self,
        stream: &mut FrameStream,
        limit: Duration,
    ) -> Result<HelloPayload, Disconnect> {
        let deadline = Instant::now() + limit;
        loop {
            let next = tokio::select! {
                () = stop_requested(&mut self.stop) => return Err(Disconnect::Stop),
                next = timeout_at(deadline, stream.next()) => next,
            };
            let message = match next {
                Err(_) => return Err(Disconnect::Reconnect(GatewayError::HandshakeTimeout)),
                Ok(None) => return Err(Disconnect::Reconnect(TransportError::Closed.into())),
                Ok(Some(Err(e))) => return Err(Disconnect::Reconnect(e.into())),
                Ok(Some(Ok(message))) => message,
            };
            match self.decode(message) {
                Inbound::Frame(ServerFrame::Hello(hello)) => {
                    tracing::debug!(
                        heartbeat_interval_ms = hello.heartbeat_interval,
                        "HELLO received"
                    );
                    return Ok(hello);
                }
                Inbound::Frame(ServerFrame::InvalidSession { resumable }) => {
                    if !resumable {
                        self.resume.discard();
                    }
                    tracing::warn!(resumable, "Gateway session refused during handshake");
                    return Err(Disconnect::Reconnect(GatewayError::InvalidSession { resumable }));
                }
                Inbound::Frame(frame) => {
                    tracing::debug!(frame = ?frame, "Ignoring frame before HELLO");
                }
                Inbound::Close(frame) => return Err(self.on_close(frame)),
                Inbound::Dropped => {}
            }
        }
    }

    fn heartbeat_monitor(&self, hello: &HelloPayload) -> HeartbeatMonitor {
        let config = &self.context.config().gateway;
        let interval = config
            .heartbeat_interval_ms
            .map_or_else(|| hello.interval(), Duration::from_millis);
        let ack_timeout = config.heartbeat_ack_timeout_ms.map(Duration::from_millis);
        HeartbeatMonitor::new(interval, ack_timeout)
    }

    /// Resume when the previous generation allows it, identify otherwise
    async fn handshake(&mut self, sink: &mut FrameSink) -> GatewayResult<()> {
        let token = self.context.config().auth.authorization();

        if let Some(target) = self.resume.target() {
            self.transition(ConnectionState::Resuming);
            tracing::info!(
                session_id = %target.session_id,
                sequence = target.sequence,
                "Resuming gateway session"
            );
            let payload = ResumePayload {
                token,
                session_id: target.session_id,
                seq: target.sequence,
            };
            return self.write(sink, &GatewayFrame::resume(&payload)).await;
        }

        self.begin_generation();
        self.transition(ConnectionState::Identifying);
        let payload = IdentifyPayload {
            token,
            properties: ConnectionProperties::default(),
        };
        self.write(sink, &GatewayFrame::identify(&payload)).await
    }

    /// HELLO that names a session replaces READY; the current user comes from REST.
    /// A resumed session still waits for `RESUMED`.
    async fn ready_from_hello(&mut self, session_id: String) -> GatewayResult<()> {
        if self.state() != ConnectionState::Identifying {
            return Ok(());
        }
        let user: User = self
            .context
            .rest()
            .send_json(Method::GET, "user/me", None, RequestOptions::new())
            .await?;
        self.apply(DispatchEvent::Ready(ReadyPayload {
            session_id,
            user,
            guilds: Vec::new(),
        }));
        Ok(())
    }

    /// A fresh identify invalidates everything cached under the old generation
    fn begin_generation(&mut self) {
        let previous = self.resume.generation();
        let generation = self.resume.begin_generation();
        if previous > 0 {
            self.context.cache().clear();
            self.router.publish(ClientEvent::CacheReset);
        }
        tracing::info!(generation, "Identifying new gateway session");
    }

    /// Read, write, and beat until the connection ends
    async fn pump(
        &mut self,
        sink: &mut FrameSink,
        stream: &mut FrameStream,
        handshake_deadline: Instant,
    ) -> Disconnect {
        loop {
            let state = self.state();
            let wakeup = if state.is_handshaking() {
                Some(handshake_deadline)
            } else {
                self.heartbeat.as_ref().and_then(HeartbeatMonitor::next_wakeup)
            };
            let timer = async move {
                match wakeup {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;

                () = stop_requested(&mut self.stop) => return Disconnect::Stop,

                () = timer => {
                    if state.is_handshaking() {
                        return Disconnect::Reconnect(GatewayError::HandshakeTimeout);
                    }
                    if let Err(disconnect) = self.beat(sink).await {
                        return disconnect;
                    }
                }

                Some(frame) = self.outbound.recv(), if state == ConnectionState::Connected => {
                    if let Err(e) = self.write(sink, &frame).await {
                        return Disconnect::Reconnect(e);
                    }
                }

                next = stream.next() => {
                    let message = match next {
                        None => return Disconnect::Reconnect(TransportError::Closed.into()),
                        Some(Err(e)) => return Disconnect::Reconnect(e.into()),
                        Some(Ok(message)) => message,
                    };
                    match self.decode(message) {
                        Inbound::Frame(frame) => {
                            if let Some(disconnect) = self.handle_frame(frame, sink).await {
                                return disconnect;
                            }
                        }
                        Inbound::Close(frame) => return self.on_close(frame),
                        Inbound::Dropped => {}
                    }
                }
            }
        }
    }

    // ========================================================================
    // Frame handling
    // ========================================================================

    fn decode(&self, message: TransportMessage) -> Inbound {
        let decoded = match &message {
            TransportMessage::Close(frame) => return Inbound::Close(frame.clone()),
            TransportMessage::Text(text) => self.codec.decode(text.as_bytes()),
            TransportMessage::Binary(bytes) => self.codec.decode(bytes),
        };
        match decoded.and_then(ServerFrame::try_from) {
            Ok(frame) => {
                tracing::trace!(frame = ?frame, "Frame received");
                Inbound::Frame(frame)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed gateway frame");
                Inbound::Dropped
            }
        }
    }

    async fn handle_frame(&mut self, frame: ServerFrame, sink: &mut FrameSink) -> Option<Disconnect> {
        match frame {
            ServerFrame::Dispatch {
                event_type,
                sequence,
                data,
            } => {
                self.handle_dispatch(&event_type, sequence, data);
                None
            }
            ServerFrame::Heartbeat => self
                .send_heartbeat(sink)
                .await
                .err()
                .map(Disconnect::Reconnect),
            ServerFrame::HeartbeatAck => {
                if let Some(latency) = self
                    .heartbeat
                    .as_mut()
                    .and_then(|monitor| monitor.on_ack(Instant::now()))
                {
                    *self.latency.write() = Some(latency);
                    tracing::trace!(latency_ms = latency.as_millis() as u64, "Heartbeat acknowledged");
                }
                None
            }
            ServerFrame::Reconnect => {
                tracing::info!("Service requested reconnect");
                Some(Disconnect::Reconnect(GatewayError::ReconnectRequested))
            }
            ServerFrame::InvalidSession { resumable } => {
                if !resumable {
                    self.resume.discard();
                }
                tracing::warn!(resumable, "Gateway session invalidated");
                Some(Disconnect::Reconnect(GatewayError::InvalidSession { resumable }))
            }
            ServerFrame::Hello(_) => {
                tracing::debug!("Ignoring repeated HELLO");
                None
            }
        }
    }

    fn handle_dispatch(&mut self, event_type: &str, sequence: Option<u64>, data: serde_json::Value) {
        match self.resume.sequence_mut().observe(sequence) {
            SequenceCheck::Stale { last, received } => {
                tracing::debug!(event_type, last, received, "Dropping replayed dispatch");
                return;
            }
            SequenceCheck::Gap { expected, received } => {
                tracing::warn!(
                    event_type,
                    expected,
                    received,
                    "Sequence gap, next recovery will identify"
                );
            }
            SequenceCheck::Accepted(_) | SequenceCheck::Unsequenced => {}
        }

        match DispatchEvent::decode(event_type, data) {
            Ok(event) => self.apply(event),
            Err(e) => tracing::warn!(event_type, error = %e, "Dropping undecodable dispatch"),
        }
    }

    fn apply(&mut self, event: DispatchEvent) {
        match &event {
            DispatchEvent::Ready(ready) => {
                self.resume.established(ready.session_id.clone());
                self.on_connected();
            }
            DispatchEvent::Resumed => {
                self.resume.resumed();
                self.on_connected();
            }
            _ => {}
        }

        self.router.route(event);
    }

    fn on_connected(&mut self) {
        if !self.state().is_handshaking() {
            return;
        }
        self.transition(ConnectionState::Connected);
        self.backoff.reset();
        if let Some(monitor) = self.heartbeat.as_mut() {
            monitor.start(Instant::now());
        }
        tracing::info!(
            generation = self.resume.generation(),
            session_id = self.resume.session_id().unwrap_or_default(),
            "Gateway session connected"
        );
    }

    fn on_close(&mut self, frame: Option<CloseFrame>) -> Disconnect {
        let code = frame.as_ref().map(|f| f.code);
        let reason = frame.map(|f| f.reason).unwrap_or_default();
        tracing::info!(code = ?code, reason = %reason, "Gateway closed by service");

        match (CloseAction::for_code(code), code) {
            (CloseAction::Stop, Some(code)) => Disconnect::Fatal(GatewayError::FatalClose { code, reason }),
            (CloseAction::Reidentify, _) => {
                self.resume.discard();
                Disconnect::Reconnect(GatewayError::Closed { code, reason })
            }
            _ => Disconnect::Reconnect(GatewayError::Closed { code, reason }),
        }
    }

    // ========================================================================
    // Heartbeat
    // ========================================================================

    async fn beat(&mut self, sink: &mut FrameSink) -> Result<(), Disconnect> {
        let Some(monitor) = self.heartbeat.as_ref() else {
            return Ok(());
        };
        let ack_timeout = monitor.ack_timeout();
        match monitor.poll(Instant::now()) {
            HeartbeatAction::Idle => Ok(()),
            HeartbeatAction::Send => self.send_heartbeat(sink).await.map_err(Disconnect::Reconnect),
            HeartbeatAction::Expired => {
                tracing::warn!(
                    ack_timeout_ms = ack_timeout.as_millis() as u64,
                    "Heartbeat not acknowledged, connection is stale"
                );
                Err(Disconnect::Reconnect(GatewayError::HeartbeatTimeout))
            }
        }
    }

    async fn send_heartbeat(&mut self, sink: &mut FrameSink) -> GatewayResult<()> {
        let frame = GatewayFrame::heartbeat(self.resume.sequence().last());
        self.write(sink, &frame).await?;
        if let Some(monitor) = self.heartbeat.as_mut() {
            monitor.record_sent(Instant::now());
        }
        Ok(())
    }

    async fn write(&self, sink: &mut FrameSink, frame: &GatewayFrame) -> GatewayResult<()> {
        let Some(message) = self.codec.encode(frame)? else {
            tracing::debug!(frame = %frame, codec = self.codec.name(), "Frame has no wire form, skipped");
            return Ok(());
        };
        sink.send(message).await?;
        tracing::trace!(frame = %frame, "Frame sent");
        Ok(())
    }

    // ========================================================================
    // State
    // ========================================================================

    fn transition(&self, next: ConnectionState) {
        let from = self.state();
        if !from.can_transition_to(next) {
            tracing::debug!(from = %from, to = %next, "Ignoring illegal state transition");
            return;
        }
        self.state.send_replace(next);
        tracing::debug!(from = %from, to = %next, "Gateway state changed");
        self.router.publish(ClientEvent::StateChanged { from, to: next });
    }

    /// Sleep for `delay`; returns true if stop was requested meanwhile
    async fn sleep_or_stop(&mut self, delay: Duration) -> bool {
        tokio::select! {
            () = stop_requested(&mut self.stop) => true,
            () = sleep(delay) => false,
        }
    }

    fn stopped(&mut self) {
        self.heartbeat = None;
        self.context.cache().clear_current_user();
        self.transition(ConnectionState::Stopped);
        self.context.rest().shutdown();
        tracing::info!("Gateway session stopped");
    }

    fn fail(&mut self, err: GatewayError) -> GatewayError {
        tracing::error!(error = %err, "Gateway session failed");
        self.heartbeat = None;
        self.context.cache().clear_current_user();
        self.router.publish(ClientEvent::FatalError(err.to_string()));
        self.transition(ConnectionState::Stopped);
        err
    }
}

/// Resolves once stop is requested or every handle is gone
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stop| *stop).await;
}

impl std::fmt::Debug for GatewaySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySession")
            .field("state", &self.state())
            .field("generation", &self.resume.generation())
            .field("codec", &self.codec.name())
            .finish()
    }
}

//! Client facade
//!
//! Owns the shared context and at most one running gateway session.

use kook_cache::EntityCache;
use kook_common::{ClientConfig, ClientResult};
use kook_rest::{RequestQueue, RestTransport};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::ClientContext;
use crate::bus::EventSubscription;
use crate::connection::ConnectionState;
use crate::error::{GatewayError, GatewayResult};
use crate::protocol::{FrameCodec, KookCodec, PresenceUpdatePayload};
use crate::session::{GatewaySession, SessionHandle};
use crate::transport::{GatewayConnector, WebSocketConnector};

struct RunningSession {
    handle: SessionHandle,
    task: Option<JoinHandle<GatewayResult<()>>>,
}

pub struct KookClient {
    context: ClientContext,
    connector: Arc<dyn GatewayConnector>,
    codec: Arc<dyn FrameCodec>,
    session: Mutex<Option<RunningSession>>,
}

impl KookClient {
    /// Client over HTTP and WebSocket
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let context = ClientContext::from_config(config)?;
        Ok(Self::from_context(context, Arc::new(WebSocketConnector::new())))
    }

    /// Client over caller-supplied transports
    pub fn with_parts(
        config: ClientConfig,
        rest: Arc<dyn RestTransport>,
        connector: Arc<dyn GatewayConnector>,
    ) -> Self {
        Self::from_context(ClientContext::new(config, rest), connector)
    }

    pub fn from_context(context: ClientContext, connector: Arc<dyn GatewayConnector>) -> Self {
        Self {
            context,
            connector,
            codec: Arc::new(KookCodec::new()),
            session: Mutex::new(None),
        }
    }

    /// Replace the frame layout; the service's own layout is the default
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn FrameCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn context(&self) -> &ClientContext {
        &self.context
    }

    pub fn rest(&self) -> &RequestQueue {
        self.context.rest()
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        self.context.cache()
    }

    /// Open a subscriber group queue
    pub fn subscribe(&self, group: impl Into<String>) -> EventSubscription {
        self.context.bus().subscribe(group)
    }

    /// Spawn the gateway session. A client runs at most one session in its lifetime.
    pub fn start(&self) -> GatewayResult<SessionHandle> {
        let mut slot = self.session.lock();
        if slot.is_some() {
            return Err(GatewayError::AlreadyStarted);
        }

        let (session, handle) = GatewaySession::with_codec(
            self.context.clone(),
            Arc::clone(&self.connector),
            Arc::clone(&self.codec),
        );
        let task = tokio::spawn(async move {
            let result = session.run().await;
            if let Err(e) = &result {
                tracing::error!(error = %e, "Gateway session ended with error");
            }
            result
        });

        tracing::info!("Gateway session spawned");
        *slot = Some(RunningSession {
            handle: handle.clone(),
            task: Some(task),
        });
        Ok(handle)
    }

    /// Stop the session and wait for it to wind down.
    ///
    /// Pending REST requests fail with a cancellation error. Returns the
    /// session's terminal error if it had already failed.
    pub async fn stop(&self) -> GatewayResult<()> {
        let task = {
            let mut slot = self.session.lock();
            match slot.as_mut() {
                Some(running) => {
                    running.handle.stop();
                    running.task.take()
                }
                None => None,
            }
        };
        self.context.rest().shutdown();

        match task {
            Some(task) => match task.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(error = %e, "Gateway session task panicked");
                    Err(GatewayError::Stopped)
                }
            },
            None => Ok(()),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.session
            .lock()
            .as_ref()
            .map_or(ConnectionState::Disconnected, |running| running.handle.state())
    }

    /// `None` before [`start`](Self::start)
    pub fn state_changes(&self) -> Option<watch::Receiver<ConnectionState>> {
        self.handle().map(|handle| handle.state_changes())
    }

    pub fn latency(&self) -> Option<Duration> {
        self.handle().and_then(|handle| handle.latency())
    }

    pub async fn update_presence(&self, presence: PresenceUpdatePayload) -> GatewayResult<()> {
        let handle = self.handle().ok_or(GatewayError::Stopped)?;
        handle.update_presence(presence).await
    }

    fn handle(&self) -> Option<SessionHandle> {
        self.session.lock().as_ref().map(|running| running.handle.clone())
    }
}

impl std::fmt::Debug for KookClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KookClient")
            .field("context", &self.context)
            .field("state", &self.state())
            .finish()
    }
}

//! Control handle for a running session

use kook_rest::RequestQueue;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::connection::ConnectionState;
use crate::error::{GatewayError, GatewayResult};
use crate::protocol::{GatewayFrame, PresenceUpdatePayload};

/// Cloneable handle to a [`GatewaySession`](super::GatewaySession).
///
/// Dropping every handle stops the session.
#[derive(Clone)]
pub struct SessionHandle {
    pub(super) stop: Arc<watch::Sender<bool>>,
    pub(super) outbound: mpsc::Sender<GatewayFrame>,
    pub(super) state: watch::Receiver<ConnectionState>,
    pub(super) rest: RequestQueue,
    pub(super) latency: Arc<RwLock<Option<Duration>>>,
}

impl SessionHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Last heartbeat round trip
    pub fn latency(&self) -> Option<Duration> {
        *self.latency.read()
    }

    /// Receiver that observes every state change
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Ask the session to stop. Idempotent.
    pub fn stop(&self) {
        if !self.stop.send_replace(true) {
            tracing::debug!("Gateway stop requested");
        }
    }

    pub fn is_stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    /// Wait until the session reaches `target`.
    ///
    /// Fails with [`GatewayError::Stopped`] if the session stops first.
    pub async fn wait_for_state(&self, target: ConnectionState) -> GatewayResult<()> {
        let mut changes = self.state.clone();
        let reached = *changes
            .wait_for(|state| *state == target || state.is_terminal())
            .await
            .map_err(|_| GatewayError::Stopped)?;
        if reached == target {
            Ok(())
        } else {
            Err(GatewayError::Stopped)
        }
    }

    /// Queue an application frame.
    ///
    /// Takes a slot on the gateway-send bucket first; the frame is written
    /// once the session is connected.
    pub async fn send(&self, frame: GatewayFrame) -> GatewayResult<()> {
        if self.is_stop_requested() || self.state().is_terminal() {
            return Err(GatewayError::Stopped);
        }
        self.rest.acquire_gateway_slot().await?;
        self.outbound
            .send(frame)
            .await
            .map_err(|_| GatewayError::Stopped)
    }

    pub async fn update_presence(&self, presence: PresenceUpdatePayload) -> GatewayResult<()> {
        self.send(GatewayFrame::presence_update(&presence)).await
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("state", &self.state())
            .field("stop_requested", &self.is_stop_requested())
            .field("latency", &self.latency())
            .finish()
    }
}

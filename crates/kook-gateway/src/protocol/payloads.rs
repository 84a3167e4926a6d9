//! Handshake and control payloads

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Payload of `Hello`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
    /// Set when the service already opened a session for this connection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl HelloPayload {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval)
    }
}

/// Payload of `Identify`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyPayload {
    /// Full authorization value, e.g. `Bot <token>`
    pub token: String,
    pub properties: ConnectionProperties,
}

/// Client description sent with `Identify`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProperties {
    pub os: String,
    pub library: String,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            library: concat!("kook-gateway/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Payload of `Resume`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    /// Last sequence this client processed
    pub seq: u64,
}

/// Online status sent with `PresenceUpdate`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    #[default]
    Online,
    Idle,
    Dnd,
    Offline,
}

/// Payload of `PresenceUpdate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUpdatePayload {
    pub status: PresenceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
}

impl PresenceUpdatePayload {
    pub fn new(status: PresenceStatus) -> Self {
        Self {
            status,
            activity: None,
        }
    }

    pub fn with_activity(mut self, activity: impl Into<String>) -> Self {
        self.activity = Some(activity.into());
        self
    }
}

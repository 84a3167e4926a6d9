//! Gateway transport seam
//!
//! A connector opens one connection and hands back its write half and read
//! half. The session owns both for the lifetime of one connection generation.

mod websocket;

pub use websocket::WebSocketConnector;

use async_trait::async_trait;
use futures::{Sink, Stream};
use std::pin::Pin;

use crate::error::TransportError;

/// Close frame as seen by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    pub code: u16,
    pub reason: String,
}

/// Transport-level message, independent of the socket library
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportMessage {
    Text(String),
    Binary(Vec<u8>),
    Close(Option<CloseFrame>),
}

impl TransportMessage {
    pub fn close(code: u16, reason: impl Into<String>) -> Self {
        Self::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        }))
    }
}

pub type FrameSink = Pin<Box<dyn Sink<TransportMessage, Error = TransportError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<TransportMessage, TransportError>> + Send>>;

/// Opens gateway connections
#[async_trait]
pub trait GatewayConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError>;
}

//! WebSocket connector backed by tokio-tungstenite

use async_trait::async_trait;
use futures::{future, SinkExt, StreamExt};
use std::borrow::Cow;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as WsCloseFrame;
use tokio_tungstenite::tungstenite::Message;

use super::{CloseFrame, FrameSink, FrameStream, GatewayConnector, TransportMessage};
use crate::error::TransportError;

/// Connects with `connect_async`; TLS via rustls with webpki roots
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

fn to_ws(message: TransportMessage) -> Message {
    match message {
        TransportMessage::Text(text) => Message::Text(text),
        TransportMessage::Binary(bytes) => Message::Binary(bytes),
        TransportMessage::Close(frame) => Message::Close(frame.map(|f| WsCloseFrame {
            code: WsCloseCode::from(f.code),
            reason: Cow::Owned(f.reason),
        })),
    }
}

fn from_ws(message: Message) -> Option<TransportMessage> {
    match message {
        Message::Text(text) => Some(TransportMessage::Text(text)),
        Message::Binary(bytes) => Some(TransportMessage::Binary(bytes)),
        Message::Close(frame) => Some(TransportMessage::Close(frame.map(|f| CloseFrame {
            code: u16::from(f.code),
            reason: f.reason.into_owned(),
        }))),
        // Pings are answered by tungstenite itself
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => None,
    }
}

#[async_trait]
impl GatewayConnector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError> {
        let (socket, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::debug!(status = %response.status(), "WebSocket handshake complete");

        let (write, read) = socket.split();

        let sink = write
            .sink_map_err(|e| TransportError::Send(e.to_string()))
            .with(|message: TransportMessage| future::ready(Ok::<_, TransportError>(to_ws(message))));

        let stream = read.filter_map(|item| {
            future::ready(match item {
                Ok(message) => from_ws(message).map(Ok),
                Err(e) => Some(Err(TransportError::Receive(e.to_string()))),
            })
        });

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}

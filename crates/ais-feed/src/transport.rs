use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("stream error: {0}")]
    Stream(String),
}

/// One established feed session delivering raw text frames.
#[async_trait]
pub trait FrameSource: Send {
    /// Next text frame, `Ok(None)` once the peer closes the stream.
    async fn next_frame(&mut self) -> Result<Option<String>, TransportError>;
}

/// Connection factory, behind a trait so reconnect behavior can be
/// exercised against a scripted in-memory transport.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    async fn connect(&self, subscription: &str) -> Result<Box<dyn FrameSource>, TransportError>;
}

/// WebSocket transport for the live feed.
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl FeedTransport for WsTransport {
    async fn connect(&self, subscription: &str) -> Result<Box<dyn FrameSource>, TransportError> {
        let (mut ws, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        ws.send(Message::Text(subscription.to_string()))
            .await
            .map_err(|e| TransportError::Stream(e.to_string()))?;
        debug!(url = %self.url, "feed subscription sent");

        Ok(Box::new(WsFrameSource { ws }))
    }
}

struct WsFrameSource {
    ws: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

#[async_trait]
impl FrameSource for WsFrameSource {
    async fn next_frame(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            match self.ws.next().await {
                None => return Ok(None),
                Some(Err(e)) => return Err(TransportError::Stream(e.to_string())),
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Ping(payload))) => {
                    self.ws
                        .send(Message::Pong(payload))
                        .await
                        .map_err(|e| TransportError::Stream(e.to_string()))?;
                }
                Some(Ok(Message::Close(_))) => return Ok(None),
                Some(Ok(_)) => {}
            }
        }
    }
}

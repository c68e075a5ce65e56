use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

#[derive(Debug, Clone, Error)]
pub enum PresenceError {
    #[error("Invalid presence URL: {0}")]
    InvalidUrl(String),
    #[error("Presence connect failed: {0}")]
    Connect(String),
    #[error("Presence connect timed out: {0}")]
    Timeout(String),
}

/// An open connection, reduced to two text queues.
///
/// `inbound` yields each text frame and ends when the connection closes.
/// Dropping `outbound` closes the connection.
#[derive(Debug)]
pub struct PresenceLink {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
pub trait PresenceTransport: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<PresenceLink, PresenceError>;
}

/// [`PresenceTransport`] over tokio-tungstenite.
#[derive(Debug, Clone)]
pub struct WsPresenceTransport {
    connect_timeout: Duration,
}

impl WsPresenceTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WsPresenceTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl PresenceTransport for WsPresenceTransport {
    async fn connect(&self, url: &Url) -> Result<PresenceLink, PresenceError> {
        let (stream, _response) = timeout(self.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| PresenceError::Timeout(url.to_string()))?
            .map_err(|e| PresenceError::Connect(e.to_string()))?;

        let (mut sink, mut source) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();

        // Writer: ends (and closes the socket) once every outbound sender is gone
        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    tracing::debug!(error = %e, "[Presence] Send failed");
                    return;
                }
            }
            let _ = sink.close().await;
        });

        // Reader: dropping inbound_tx signals the close to the channel
        tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Binary(data)) => match String::from_utf8(data) {
                        Ok(text) => text,
                        Err(_) => continue,
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::debug!(error = %e, "[Presence] Receive failed");
                        break;
                    }
                };
                if inbound_tx.send(text).is_err() {
                    break;
                }
            }
        });

        Ok(PresenceLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

//! WebSocket relay for the realtime wire.
//!
//! Bridges local clients (typically browsers that must not hold the API
//! key) to the upstream endpoint: each accepted connection gets its own
//! upstream socket dialed with the server-side credentials, and frames
//! are pumped verbatim in both directions until either side closes.

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::{ColloquyError, Result};
use crate::session::config::SessionConfig;
use crate::session::transport::open_realtime_socket;

pub const DEFAULT_RELAY_HOST: &str = "127.0.0.1";
pub const DEFAULT_RELAY_PORT: u16 = 8081;

/// Relay server bridging local websocket clients to the realtime API.
pub struct RealtimeRelay {
    config: SessionConfig,
    host: String,
    port: u16,
}

impl RealtimeRelay {
    pub fn new(config: SessionConfig, host: impl Into<String>, port: u16) -> Self {
        Self {
            config,
            host: host.into(),
            port,
        }
    }

    /// Bind the configured address and serve until cancelled.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind((self.host.as_str(), self.port)).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let address = listener.local_addr()?;
        info!(%address, "relay listening");
        loop {
            let (stream, peer) = listener.accept().await?;
            let config = self.config.clone();
            tokio::spawn(async move {
                if let Err(error) = bridge_connection(stream, &config).await {
                    warn!(%error, %peer, "relay connection ended with error");
                }
            });
        }
    }
}

async fn bridge_connection(stream: TcpStream, config: &SessionConfig) -> Result<()> {
    let downstream = accept_async(stream)
        .await
        .map_err(|error| ColloquyError::Stream(format!("Relay handshake failed: {error}")))?;

    let api_key = config.resolve_api_key()?;
    let url = config.realtime_url()?;
    let upstream = open_realtime_socket(&url, &api_key).await?;
    debug!(url = %url, "relay bridged to upstream");

    let (mut down_tx, mut down_rx) = downstream.split();
    let (mut up_tx, mut up_rx) = upstream.split();

    loop {
        tokio::select! {
            frame = down_rx.next() => {
                match frame {
                    Some(Ok(message)) => {
                        let closing = matches!(message, Message::Close(_));
                        if up_tx.send(message).await.is_err() || closing {
                            break;
                        }
                    }
                    Some(Err(error)) => {
                        warn!(%error, "relay client read failed");
                        let _ = up_tx.send(Message::Close(None)).await;
                        break;
                    }
                    None => {
                        let _ = up_tx.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            frame = up_rx.next() => {
                match frame {
                    Some(Ok(message)) => {
                        let closing = matches!(message, Message::Close(_));
                        if down_tx.send(message).await.is_err() || closing {
                            break;
                        }
                    }
                    Some(Err(error)) => {
                        warn!(%error, "relay upstream read failed");
                        let _ = down_tx.send(Message::Close(None)).await;
                        break;
                    }
                    None => {
                        let _ = down_tx.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}

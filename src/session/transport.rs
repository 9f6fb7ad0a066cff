//! WebSocket transport for the realtime wire.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::{ColloquyError, Result};
use crate::events::registry::EventRegistry;
use crate::events::server::ServerEvent;

use super::config::SessionConfig;

type RealtimeWebSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TransportRuntime {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// A connected realtime websocket.
///
/// A single supervisor task owns the socket; frames are exchanged through
/// channels. There is no reconnect: when the peer goes away the inbound
/// channel ends and the caller decides what to do next.
pub struct RealtimeTransport {
    outbound_tx: mpsc::UnboundedSender<Message>,
    events_rx: mpsc::UnboundedReceiver<Result<ServerEvent>>,
    runtime: Option<TransportRuntime>,
}

impl RealtimeTransport {
    /// Open the websocket and start the supervisor task.
    pub async fn connect(config: &SessionConfig) -> Result<Self> {
        let api_key = config.resolve_api_key()?;
        let url = config.realtime_url()?;
        let socket = open_realtime_socket(&url, &api_key).await?;
        debug!(url = %url, "realtime websocket connected");

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_connection(
            socket,
            events_tx,
            outbound_rx,
            shutdown_rx,
            config.heartbeat_interval,
        ));

        Ok(Self {
            outbound_tx,
            events_rx,
            runtime: Some(TransportRuntime { shutdown_tx, task }),
        })
    }

    /// Queue a raw wire payload for sending.
    pub fn send_payload(&self, payload: &Value) -> Result<()> {
        let frame = serde_json::to_string(payload)?;
        self.outbound_tx
            .send(Message::Text(frame.into()))
            .map_err(|_| ColloquyError::InvalidState("Realtime transport is closed".into()))
    }

    /// Receive the next inbound server event, or the decode failure that
    /// took its place. Returns `None` once the connection has ended.
    pub async fn next_event(&mut self) -> Option<Result<ServerEvent>> {
        self.events_rx.recv().await
    }

    /// Close the connection gracefully.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(runtime) = self.runtime.take() {
            let _ = runtime.shutdown_tx.send(true);
            runtime.task.await.map_err(|error| {
                ColloquyError::Stream(format!("Realtime transport task failed: {error}"))
            })?;
        }
        Ok(())
    }
}

impl Drop for RealtimeTransport {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            let _ = runtime.shutdown_tx.send(true);
            runtime.task.abort();
        }
    }
}

async fn run_connection(
    mut socket: RealtimeWebSocket,
    events_tx: mpsc::UnboundedSender<Result<ServerEvent>>,
    mut outbound_rx: mpsc::UnboundedReceiver<Message>,
    mut shutdown_rx: watch::Receiver<bool>,
    heartbeat_interval: Duration,
) {
    let registry = EventRegistry::new();
    let mut heartbeat = time::interval(heartbeat_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            }
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(frame) => {
                        if let Err(error) = socket.send(frame).await {
                            let _ = events_tx.send(Err(ColloquyError::Stream(format!(
                                "Realtime websocket send failed: {error}"
                            ))));
                            break;
                        }
                    }
                    None => {
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            _ = heartbeat.tick() => {
                if socket.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
            }
            frame = socket.next() => {
                match frame {
                    Some(Ok(message)) => {
                        if handle_server_frame(&mut socket, &registry, &events_tx, message)
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Some(Err(error)) => {
                        let _ = events_tx.send(Err(ColloquyError::Stream(format!(
                            "Realtime websocket receive failed: {error}"
                        ))));
                        break;
                    }
                    None => break,
                }
            }
        }
    }
}

async fn handle_server_frame(
    socket: &mut RealtimeWebSocket,
    registry: &EventRegistry,
    events_tx: &mpsc::UnboundedSender<Result<ServerEvent>>,
    message: Message,
) -> std::result::Result<(), WsError> {
    match message {
        Message::Text(text) => decode_and_forward(registry, events_tx, text.as_ref()),
        Message::Binary(bytes) => {
            if let Ok(text) = String::from_utf8(bytes.to_vec()) {
                decode_and_forward(registry, events_tx, &text);
            }
        }
        Message::Ping(payload) => socket.send(Message::Pong(payload)).await?,
        Message::Pong(_) => {}
        Message::Close(_) => return Err(WsError::ConnectionClosed),
        Message::Frame(_) => {}
    }
    Ok(())
}

fn decode_and_forward(
    registry: &EventRegistry,
    events_tx: &mpsc::UnboundedSender<Result<ServerEvent>>,
    payload: &str,
) {
    let decoded = serde_json::from_str::<Value>(payload)
        .map_err(ColloquyError::from)
        .and_then(|raw| registry.construct(raw));
    if let Err(error) = &decoded {
        warn!(%error, "failed to decode realtime server frame");
    }
    let _ = events_tx.send(decoded);
}

pub(crate) async fn open_realtime_socket(url: &str, api_key: &str) -> Result<RealtimeWebSocket> {
    let mut request = url.into_client_request().map_err(|error| {
        ColloquyError::Configuration(format!("Invalid realtime websocket URL: {error}"))
    })?;
    let auth_value = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|error| {
        ColloquyError::Configuration(format!("Invalid realtime auth header: {error}"))
    })?;
    request.headers_mut().insert("Authorization", auth_value);
    request
        .headers_mut()
        .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

    connect_async(request)
        .await
        .map(|(socket, _)| socket)
        .map_err(map_connect_error)
}

fn map_connect_error(error: WsError) -> ColloquyError {
    match error {
        WsError::Http(response) => {
            let status = response.status().as_u16();
            if matches!(status, 401 | 403) {
                ColloquyError::Authentication(format!(
                    "Realtime websocket authentication failed with status {status}"
                ))
            } else {
                ColloquyError::Stream(format!(
                    "Realtime websocket handshake failed with status {status}"
                ))
            }
        }
        WsError::Io(error) => ColloquyError::Io(error),
        WsError::Url(error) => {
            ColloquyError::Configuration(format!("Invalid realtime websocket URL: {error}"))
        }
        other => ColloquyError::Stream(format!("Realtime websocket connect failed: {other}")),
    }
}

//! Integration test for the websocket relay: a downstream client's frames
//! reach the upstream endpoint (dialed with the relay's credentials) and
//! upstream frames come back unchanged.

use std::time::Duration;

use colloquy::relay::RealtimeRelay;
use colloquy::session::SessionConfig;
use futures::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_hdr_async, connect_async,
    tungstenite::{
        handshake::server::{Request, Response},
        Message,
    },
};

#[tokio::test]
async fn relay_bridges_frames_in_both_directions() {
    // Upstream: replies to response.create with response.created and
    // records the Authorization header it was dialed with.
    let upstream_listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("upstream should bind");
    let upstream_address = upstream_listener.local_addr().expect("upstream addr");

    let (auth_tx, auth_rx) = oneshot::channel::<String>();
    let upstream = tokio::spawn(async move {
        let (stream, _) = upstream_listener
            .accept()
            .await
            .expect("upstream should accept");
        let mut ws = accept_hdr_async(stream, move |req: &Request, response: Response| {
            let header = req
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let _ = auth_tx.send(header);
            Ok(response)
        })
        .await
        .expect("upstream handshake should succeed");

        let frame = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("upstream frame wait should not time out")
            .expect("upstream frame should exist")
            .expect("upstream frame should parse");
        let Message::Text(text) = frame else {
            panic!("unexpected upstream frame: {frame:?}");
        };
        let value: Value = serde_json::from_str(text.as_ref()).expect("frame should be JSON");
        assert_eq!(value["type"], "response.create");

        ws.send(Message::Text(
            json!({"type": "response.created", "response": {"id": "resp_1"}})
                .to_string()
                .into(),
        ))
        .await
        .expect("upstream reply should send");
        let _ = timeout(Duration::from_secs(2), ws.next()).await;
    });

    // Relay: listens locally, bridges to the upstream with its own key.
    let config = SessionConfig {
        api_key: Some("relay-key".into()),
        base_url: format!("ws://{upstream_address}/v1/realtime"),
        model: "gpt-4o-realtime-preview-2024-10-01".into(),
        ..SessionConfig::default()
    };
    let relay_listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("relay should bind");
    let relay_address = relay_listener.local_addr().expect("relay addr");
    let relay = tokio::spawn(async move {
        let relay = RealtimeRelay::new(config, "127.0.0.1", 0);
        let _ = relay.serve(relay_listener).await;
    });

    // Downstream client connects to the relay without credentials.
    let (mut downstream, _) = connect_async(format!("ws://{relay_address}/"))
        .await
        .expect("downstream connect should succeed");
    downstream
        .send(Message::Text(
            json!({"type": "response.create"}).to_string().into(),
        ))
        .await
        .expect("downstream send should succeed");

    let reply = timeout(Duration::from_secs(2), downstream.next())
        .await
        .expect("downstream reply wait should not time out")
        .expect("downstream reply should exist")
        .expect("downstream reply should parse");
    let Message::Text(text) = reply else {
        panic!("unexpected downstream frame: {reply:?}");
    };
    let value: Value = serde_json::from_str(text.as_ref()).expect("reply should be JSON");
    assert_eq!(value["type"], "response.created");
    assert_eq!(value["response"]["id"], "resp_1");

    // The relay attached its own credentials when dialing upstream.
    let auth_header = auth_rx.await.expect("auth header should be captured");
    assert_eq!(auth_header, "Bearer relay-key");

    downstream
        .close(None)
        .await
        .expect("downstream close should succeed");
    upstream.await.expect("upstream task should complete");
    relay.abort();
}

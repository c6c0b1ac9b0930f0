//! Example: Connecting to a public echo server with custom headers
//!
//! Sends a text frame and a JSON frame, logs what comes back, and keeps an
//! application-level loop running while the session is open.
//!
//! Run with: cargo run --example echo

use resilient_ws::{ClientConfig, ConnectOptions, InboundMessage, WebSocketClient};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn, Level};

#[derive(Serialize)]
struct Greeting<'a> {
    kind: &'a str,
    sequence: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let config = ClientConfig::builder()
        .max_reconnect_attempts(5)
        .reconnect_interval(Duration::from_secs(3))
        .build()?;
    let client = WebSocketClient::new(config);

    client.on_message(|message| match message {
        InboundMessage::Structured(value) => info!("Structured: {}", value),
        InboundMessage::Text(text) => info!("Text: {}", &text[..text.len().min(100)]),
    });
    client.on_error(|error| warn!("Error ({:?}): {}", error.kind(), error));
    client.on_connect(|session| {
        info!(
            "Connected to {} (status {}, reconnect: {})",
            session.url, session.status, session.reconnect
        )
    });
    client.on_disconnect(|event| {
        info!(
            "Disconnected ({}: {}) {:?}, final: {}",
            event.code,
            event.reason,
            event.kind,
            event.is_final()
        )
    });

    let options = ConnectOptions::new()
        .header("Authorization", "Bearer demo-token")
        .header("X-Client-Type", "resilient-ws-demo")
        .timeout(Duration::from_secs(10));

    let session = client.connect("wss://echo.websocket.org", options).await?;
    info!("Session open, protocol: {:?}", session.protocol);

    client.send("hello from resilient-ws");
    client.send_json(&Greeting {
        kind: "greeting",
        sequence: 1,
    });

    // Application-level loop
    for sequence in 2..=5 {
        tokio::time::sleep(Duration::from_secs(2)).await;
        if !client.is_open() {
            info!("Session not open ({}), skipping tick", client.state());
            continue;
        }
        client.send_json(&Greeting {
            kind: "tick",
            sequence,
        });
        let answered = client.ping_and_wait("demo", Duration::from_secs(5)).await;
        info!("Ping answered: {}", answered);
    }

    let snapshot = client.metrics().snapshot();
    info!("Final metrics:");
    info!("  Connections: {}", snapshot.connections_total);
    info!("  Reconnections: {}", snapshot.reconnections_total);
    info!("  Messages received: {}", snapshot.messages_received_total);
    info!("  Messages sent: {}", snapshot.messages_sent_total);

    client.close_normal();
    tokio::time::sleep(Duration::from_millis(500)).await;
    info!("Client closed: {}", client.state());

    Ok(())
}

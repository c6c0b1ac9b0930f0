//! # resilient-ws
//!
//! A WebSocket client that keeps one logical session alive across transient
//! network failures.
//!
//! ## Features
//!
//! - **Custom handshake headers** merged over a default set, reused unchanged on every reconnect
//! - **Bounded reconnection** with a fixed delay; normal (1000) and caller closes are never retried
//! - **Message routing** that decodes JSON payloads and answers peer pings with exactly one pong
//! - **Event hooks** for messages, errors, connects and disconnects, isolated from panics
//! - **Keepalive** pings with pong timeouts
//! - **Metrics** for observability
//!
//! ## Example
//!
//! ```ignore
//! use resilient_ws::{ConnectOptions, WebSocketClient};
//!
//! let client = WebSocketClient::default();
//! client.on_message(|message| println!("{:?}", message));
//! client.on_disconnect(|event| println!("disconnected: {:?}", event.kind));
//!
//! let options = ConnectOptions::new()
//!     .header("Authorization", "Bearer token")
//!     .protocol("json");
//! client.connect("wss://example.com/feed", options).await?;
//!
//! client.send_json(&serde_json::json!({"op": "subscribe"}));
//! client.close_normal();
//! ```

mod client;
mod config;
mod error;
mod handler;
mod handshake;
mod health;
mod message;
mod metrics;
mod router;
mod session;
mod transport;

pub use client::{connect, WebSocketClient};
pub use config::{
    ClientConfig, ClientConfigBuilder, ConfigError, HeartbeatConfig, ReconnectConfig,
    DEFAULT_USER_AGENT,
};
pub use error::{Error, ErrorKind};
pub use handler::{
    CloseInfo, ConnectHook, DisconnectEvent, DisconnectHook, DisconnectKind, ErrorHook,
    EventHooks, MessageHook, ReadyState, SessionPhase,
};
pub use handshake::{ConnectOptions, Handshake, HandshakeOptions, DEFAULT_HANDSHAKE_TIMEOUT};
pub use message::{InboundMessage, OutboundMessage};
pub use metrics::{Metrics, MetricsSnapshot};
pub use router::{route, Route, CLOSE_ABNORMAL, CLOSE_KEEPALIVE_TIMEOUT, CLOSE_NORMAL, CLOSE_NO_STATUS};
pub use transport::SessionInfo;

/// Result type for resilient-ws operations
pub type Result<T> = std::result::Result<T, Error>;

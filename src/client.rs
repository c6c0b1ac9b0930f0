use crate::config::ClientConfig;
use crate::error::Error;
use crate::handler::{CloseInfo, DisconnectEvent, EventHooks, ReadyState, SessionPhase};
use crate::handshake::{ConnectOptions, Handshake};
use crate::message::{InboundMessage, OutboundMessage};
use crate::metrics::Metrics;
use crate::router::CLOSE_NORMAL;
use crate::session::{CloseRequest, Command, SessionHandle, Shared, Supervisor};
use crate::transport::{redact_url, SessionInfo};
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

/// A WebSocket client that keeps one logical session alive.
///
/// After an abnormal close the session is reopened with the same URL,
/// headers and subprotocols, up to `max_attempts` times with a fixed delay.
/// A close with code 1000, or one the caller asked for, is never retried.
///
/// # Example
///
/// ```ignore
/// use resilient_ws::{ConnectOptions, WebSocketClient};
///
/// let client = WebSocketClient::default();
/// client.on_message(|message| println!("{:?}", message));
/// client
///     .connect("wss://example.com/feed", ConnectOptions::new().header("Authorization", "Bearer t"))
///     .await?;
/// client.send("hello");
/// ```
pub struct WebSocketClient {
    config: ClientConfig,
    shared: Arc<Shared>,
}

impl Default for WebSocketClient {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl std::fmt::Debug for WebSocketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketClient")
            .field("config", &self.config)
            .field("phase", &self.shared.phase())
            .finish_non_exhaustive()
    }
}

impl WebSocketClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_hooks(config, EventHooks::default())
    }

    /// Create a client with all four hooks registered up front
    pub fn with_hooks(config: ClientConfig, hooks: EventHooks) -> Self {
        Self {
            config,
            shared: Arc::new(Shared::new(hooks)),
        }
    }

    /// Open a session and wait for the transport to be open.
    ///
    /// Fails with [`Error::AlreadyActive`] if a session is connecting, open,
    /// closing or waiting to reconnect. A failed first open is reported here
    /// (and to `on_error`) and is not retried.
    pub async fn connect(
        &self,
        url: impl Into<String>,
        options: ConnectOptions,
    ) -> Result<SessionInfo, Error> {
        let handshake = Handshake::build(url, &options, &self.config.user_agent);
        let id = self.shared.next_session_id.fetch_add(1, Ordering::Relaxed);
        let (command_tx, command_rx) = mpsc::channel(self.config.command_buffer);
        let (close_tx, close_rx) = oneshot::channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        {
            let mut session = self.shared.session.lock();
            if session.is_some() {
                debug!("connect refused: session already active");
                return Err(Error::AlreadyActive);
            }
            *session = Some(SessionHandle {
                id,
                commands: command_tx,
                close: Some(close_tx),
            });
            self.shared.reconnect_attempt.store(0, Ordering::Relaxed);
            self.shared.phase.send_replace(SessionPhase::Connecting);
        }

        info!(
            "[SESSION-{}] Starting session to {}",
            id,
            redact_url(&handshake.url)
        );

        let supervisor = Supervisor::new(
            id,
            handshake,
            self.config.clone(),
            self.shared.clone(),
            command_rx,
            close_rx,
            ready_tx,
        );
        tokio::spawn(supervisor.run());

        match ready_rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::Closed),
        }
    }

    /// Queue a text frame.
    ///
    /// Returns false (and sends nothing) unless the session is open. Structured
    /// values are serialized to compact JSON.
    pub fn send(&self, message: impl Into<OutboundMessage>) -> bool {
        if self.shared.phase() != SessionPhase::Open {
            debug!("send skipped: session is {}", self.state());
            return false;
        }

        let text = match message.into().into_text() {
            Ok(text) => text,
            Err(e) => {
                warn!("send skipped: failed to serialize message: {}", e);
                self.shared.metrics.record_send_failure();
                return false;
            }
        };

        self.queue(Command::Send(text))
    }

    /// Serialize `value` to JSON and queue it as a text frame
    pub fn send_json<T: Serialize + ?Sized>(&self, value: &T) -> bool {
        match OutboundMessage::json(value) {
            Ok(message) => self.send(message),
            Err(e) => {
                warn!("send_json skipped: {}", e);
                self.shared.metrics.record_send_failure();
                false
            }
        }
    }

    /// Send a ping frame; does nothing unless the session is open
    pub fn ping(&self, payload: impl Into<Vec<u8>>) {
        if self.shared.phase() != SessionPhase::Open {
            return;
        }
        self.queue(Command::Ping {
            payload: payload.into(),
            ack: None,
        });
    }

    /// Send a ping and wait up to `timeout` for a pong echoing the payload
    pub async fn ping_and_wait(&self, payload: impl Into<Vec<u8>>, timeout: Duration) -> bool {
        if self.shared.phase() != SessionPhase::Open {
            return false;
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        let queued = self.queue(Command::Ping {
            payload: payload.into(),
            ack: Some(ack_tx),
        });
        if !queued {
            return false;
        }

        matches!(tokio::time::timeout(timeout, ack_rx).await, Ok(Ok(())))
    }

    /// Close the session with `code` and `reason`.
    ///
    /// Returns immediately; the closing handshake completes in the background
    /// and `on_disconnect` fires once it is done. Closing an idle, closed or
    /// already closing client does nothing. A close while a reconnect is
    /// pending cancels it.
    pub fn close(&self, code: u16, reason: impl Into<String>) {
        let close_tx = match self.shared.session.lock().as_mut() {
            Some(session) => session.close.take(),
            None => None,
        };

        let Some(close_tx) = close_tx else {
            debug!("close ignored: session is {}", self.state());
            return;
        };

        self.shared.phase.send_if_modified(|phase| {
            if *phase == SessionPhase::Open {
                *phase = SessionPhase::Closing;
                true
            } else {
                false
            }
        });

        let _ = close_tx.send(CloseRequest {
            code,
            reason: reason.into(),
        });
    }

    /// Close with code 1000
    pub fn close_normal(&self) {
        self.close(CLOSE_NORMAL, "normal closure");
    }

    /// Whether frames can be sent right now
    pub fn is_open(&self) -> bool {
        self.shared.phase() == SessionPhase::Open
    }

    /// Current state; `Disconnected` until the first `connect`
    pub fn state(&self) -> ReadyState {
        self.shared.phase().ready_state()
    }

    /// Detailed lifecycle phase (distinguishes a pending reconnect from closed)
    pub fn phase(&self) -> SessionPhase {
        self.shared.phase()
    }

    /// Watch phase changes
    pub fn subscribe_state(&self) -> watch::Receiver<SessionPhase> {
        self.shared.phase.subscribe()
    }

    /// Code and reason of the most recent close, if any
    pub fn last_close(&self) -> Option<CloseInfo> {
        self.shared.last_close.lock().clone()
    }

    /// Consecutive reconnect attempts since the last successful open
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.reconnect_attempt.load(Ordering::Relaxed)
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.shared.metrics.clone()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Replace the message hook
    pub fn on_message(&self, hook: impl Fn(InboundMessage) + Send + Sync + 'static) {
        self.shared.hooks.write().on_message = Arc::new(hook);
    }

    /// Replace the error hook
    pub fn on_error(&self, hook: impl Fn(&Error) + Send + Sync + 'static) {
        self.shared.hooks.write().on_error = Arc::new(hook);
    }

    /// Replace the connect hook
    pub fn on_connect(&self, hook: impl Fn(&SessionInfo) + Send + Sync + 'static) {
        self.shared.hooks.write().on_connect = Arc::new(hook);
    }

    /// Replace the disconnect hook
    pub fn on_disconnect(&self, hook: impl Fn(&DisconnectEvent) + Send + Sync + 'static) {
        self.shared.hooks.write().on_disconnect = Arc::new(hook);
    }

    fn queue(&self, command: Command) -> bool {
        let commands = match self.shared.session.lock().as_ref() {
            Some(session) => session.commands.clone(),
            None => return false,
        };

        match commands.try_send(command) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to queue command: {}", e);
                self.shared.metrics.record_send_failure();
                false
            }
        }
    }
}

impl Drop for WebSocketClient {
    fn drop(&mut self) {
        let close_tx = self
            .shared
            .session
            .lock()
            .as_mut()
            .and_then(|session| session.close.take());

        if let Some(close_tx) = close_tx {
            debug!("Client dropped, closing session");
            let _ = close_tx.send(CloseRequest {
                code: CLOSE_NORMAL,
                reason: "client dropped".to_string(),
            });
        }
    }
}

/// Open a session with the default configuration and hooks.
///
/// Hooks registered on the returned client only see events after this returns.
pub async fn connect(url: impl Into<String>, options: ConnectOptions) -> Result<WebSocketClient, Error> {
    let client = WebSocketClient::default();
    client.connect(url, options).await?;
    Ok(client)
}

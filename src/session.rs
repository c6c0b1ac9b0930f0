use crate::config::ClientConfig;
use crate::error::Error;
use crate::handler::{
    call_hook_safe, CloseInfo, DisconnectEvent, DisconnectKind, EventHooks, SessionPhase,
};
use crate::handshake::Handshake;
use crate::health::HealthMonitor;
use crate::message::InboundMessage;
use crate::metrics::Metrics;
use crate::router::{self, Route, CLOSE_ABNORMAL, CLOSE_KEEPALIVE_TIMEOUT};
use crate::transport::{self, redact_url, SessionInfo, WsStream};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::borrow::Cow;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};

/// Payload of the keepalive pings sent by the heartbeat
const KEEPALIVE_PAYLOAD: &[u8] = b"keepalive";

/// Commands queued by the client for the session task
#[derive(Debug)]
pub(crate) enum Command {
    /// Write a text frame
    Send(String),
    /// Write a ping; `ack` resolves when a pong with the same payload arrives
    Ping {
        payload: Vec<u8>,
        ack: Option<oneshot::Sender<()>>,
    },
}

/// Caller-initiated close
#[derive(Debug, Clone)]
pub(crate) struct CloseRequest {
    pub code: u16,
    pub reason: String,
}

/// Client-side handles to a running session task
pub(crate) struct SessionHandle {
    pub id: u64,
    pub commands: mpsc::Sender<Command>,
    /// Taken by the first close; later closes find it empty
    pub close: Option<oneshot::Sender<CloseRequest>>,
}

/// State shared between the client handle and its session task
pub(crate) struct Shared {
    pub phase: watch::Sender<SessionPhase>,
    pub hooks: RwLock<EventHooks>,
    pub metrics: Arc<Metrics>,
    pub session: Mutex<Option<SessionHandle>>,
    pub last_close: Mutex<Option<CloseInfo>>,
    pub reconnect_attempt: AtomicU32,
    pub next_session_id: AtomicU64,
}

impl Shared {
    pub fn new(hooks: EventHooks) -> Self {
        let (phase, _) = watch::channel(SessionPhase::Idle);
        Self {
            phase,
            hooks: RwLock::new(hooks),
            metrics: Arc::new(Metrics::new()),
            session: Mutex::new(None),
            last_close: Mutex::new(None),
            reconnect_attempt: AtomicU32::new(0),
            next_session_id: AtomicU64::new(1),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    fn set_phase(&self, phase: SessionPhase) {
        self.phase.send_replace(phase);
    }

    fn emit_message(&self, message: InboundMessage) {
        let hook = self.hooks.read().on_message.clone();
        call_hook_safe("on_message", &self.metrics, || hook(message));
    }

    fn emit_error(&self, error: &Error) {
        self.metrics.record_error();
        let hook = self.hooks.read().on_error.clone();
        call_hook_safe("on_error", &self.metrics, || hook(error));
    }

    fn emit_connect(&self, session: &SessionInfo) {
        let hook = self.hooks.read().on_connect.clone();
        call_hook_safe("on_connect", &self.metrics, || hook(session));
    }

    fn emit_disconnect(&self, event: &DisconnectEvent) {
        let hook = self.hooks.read().on_disconnect.clone();
        call_hook_safe("on_disconnect", &self.metrics, || hook(event));
    }
}

/// How one open session (or failed attempt) ended
#[derive(Debug)]
struct Closure {
    info: CloseInfo,
    /// Caller asked for it; never retried
    intentional: bool,
    /// A transport was actually open (false for failed handshakes)
    opened: bool,
}

impl Closure {
    fn abnormal(code: u16, reason: impl Into<String>) -> Self {
        Self {
            info: CloseInfo::new(code, reason),
            intentional: false,
            opened: true,
        }
    }
}

enum OpenOutcome {
    Ready(Box<WsStream>, SessionInfo),
    Failed(Error),
    Cancelled,
}

/// Runs one logical session: opens the transport, routes frames, keeps it
/// alive, and reconnects after abnormal closes until the retry bound.
///
/// Everything touching the transport happens on this task, so frame arrivals,
/// caller commands, heartbeat ticks and reconnect timers are serialized.
pub(crate) struct Supervisor {
    id: u64,
    handshake: Handshake,
    config: ClientConfig,
    shared: Arc<Shared>,
    command_rx: mpsc::Receiver<Command>,
    close_rx: oneshot::Receiver<CloseRequest>,
    /// Reports the outcome of the initial open to `connect`
    ready_tx: Option<oneshot::Sender<Result<SessionInfo, Error>>>,
}

impl Supervisor {
    pub fn new(
        id: u64,
        handshake: Handshake,
        config: ClientConfig,
        shared: Arc<Shared>,
        command_rx: mpsc::Receiver<Command>,
        close_rx: oneshot::Receiver<CloseRequest>,
        ready_tx: oneshot::Sender<Result<SessionInfo, Error>>,
    ) -> Self {
        Self {
            id,
            handshake,
            config,
            shared,
            command_rx,
            close_rx,
            ready_tx: Some(ready_tx),
        }
    }

    /// Run the session loop (reconnects on abnormal close)
    pub async fn run(mut self) {
        let mut attempt = 0u32;
        let mut is_reconnect = false;

        loop {
            self.shared.set_phase(SessionPhase::Connecting);

            let closure = match self.open(is_reconnect).await {
                OpenOutcome::Ready(stream, session) => {
                    attempt = 0;
                    self.shared.reconnect_attempt.store(0, Ordering::Relaxed);
                    self.shared.metrics.record_connection();
                    if is_reconnect {
                        self.shared.metrics.record_reconnection();
                    }
                    self.shared.set_phase(SessionPhase::Open);
                    info!(
                        "[SESSION-{}] Connected to {} (reconnect: {})",
                        self.id,
                        redact_url(&session.url),
                        is_reconnect
                    );

                    // on_connect completes before connect() returns
                    self.shared.emit_connect(&session);
                    if let Some(ready_tx) = self.ready_tx.take() {
                        let _ = ready_tx.send(Ok(session.clone()));
                    }

                    let closure = self.drive(*stream).await;
                    self.shared.metrics.record_disconnection();
                    closure
                }
                OpenOutcome::Failed(e) => {
                    warn!("[SESSION-{}] Connection attempt failed: {}", self.id, e);
                    let reason = e.to_string();
                    self.shared.emit_error(&e);

                    // The initial open is reported to the caller, never retried
                    if let Some(ready_tx) = self.ready_tx.take() {
                        self.finish(CloseInfo::new(CLOSE_ABNORMAL, reason));
                        let _ = ready_tx.send(Err(e));
                        return;
                    }

                    Closure {
                        info: CloseInfo::new(CLOSE_ABNORMAL, reason),
                        intentional: false,
                        opened: false,
                    }
                }
                OpenOutcome::Cancelled => {
                    info!("[SESSION-{}] Closed while connecting", self.id);
                    self.finish(CloseInfo::new(router::CLOSE_NORMAL, "closed while connecting"));
                    if let Some(ready_tx) = self.ready_tx.take() {
                        let _ = ready_tx.send(Err(Error::Closed));
                    }
                    return;
                }
            };

            *self.shared.last_close.lock() = Some(closure.info.clone());
            self.shared.set_phase(SessionPhase::Closed);

            if closure.intentional || closure.info.is_normal() {
                info!(
                    "[SESSION-{}] Closed ({}: {})",
                    self.id, closure.info.code, closure.info.reason
                );
                self.finish(closure.info.clone());
                if closure.opened {
                    self.shared.emit_disconnect(&DisconnectEvent {
                        code: closure.info.code,
                        reason: closure.info.reason,
                        kind: DisconnectKind::Normal,
                    });
                }
                return;
            }

            if attempt >= self.config.reconnect.max_attempts {
                error!(
                    "[SESSION-{}] Max reconnection attempts ({}) reached",
                    self.id, self.config.reconnect.max_attempts
                );
                self.finish(closure.info.clone());
                self.shared
                    .emit_error(&Error::ReconnectExhausted { attempts: attempt });
                self.shared.emit_disconnect(&DisconnectEvent {
                    code: closure.info.code,
                    reason: closure.info.reason,
                    kind: DisconnectKind::Exhausted { attempts: attempt },
                });
                return;
            }

            attempt += 1;
            self.shared.reconnect_attempt.store(attempt, Ordering::Relaxed);
            warn!(
                "[SESSION-{}] Abnormal close ({}: {}), reconnecting ({}/{})",
                self.id,
                closure.info.code,
                closure.info.reason,
                attempt,
                self.config.reconnect.max_attempts
            );

            if closure.opened {
                self.shared.emit_disconnect(&DisconnectEvent {
                    code: closure.info.code,
                    reason: closure.info.reason,
                    kind: DisconnectKind::Reconnecting { attempt },
                });
            }

            self.shared.set_phase(SessionPhase::ReconnectPending);
            let delay = self.config.reconnect.delay();
            debug!("[SESSION-{}] Reconnecting in {:?}", self.id, delay);

            tokio::select! {
                _ = sleep(delay) => {}
                _ = &mut self.close_rx => {
                    info!("[SESSION-{}] Reconnect cancelled by close", self.id);
                    self.finish(CloseInfo::new(router::CLOSE_NORMAL, "closed while reconnecting"));
                    return;
                }
            }

            self.discard_stale_commands();
            is_reconnect = true;
        }
    }

    /// Open the transport unless a close arrives first
    async fn open(&mut self, is_reconnect: bool) -> OpenOutcome {
        debug!(
            "[SESSION-{}] Connecting to {} (headers={}, protocols={:?})",
            self.id,
            redact_url(&self.handshake.url),
            self.handshake.options.headers.len(),
            self.handshake.options.subprotocols
        );

        tokio::select! {
            result = transport::open(&self.handshake, is_reconnect) => match result {
                Ok((stream, session)) => OpenOutcome::Ready(Box::new(stream), session),
                Err(e) => OpenOutcome::Failed(e),
            },
            _ = &mut self.close_rx => OpenOutcome::Cancelled,
        }
    }

    /// Run an open session until it closes
    async fn drive(&mut self, stream: WsStream) -> Closure {
        let (mut write, mut read) = stream.split();
        let mut health = HealthMonitor::new(self.config.heartbeat.clone());
        let mut pong_waiters = PongWaiters::default();

        loop {
            let next_health_check = health.time_until_next_check().min(Duration::from_secs(1));

            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(message)) => match router::route(message) {
                            Route::Deliver(inbound) => {
                                self.shared.metrics.record_message_received();
                                trace!("[SESSION-{}] Routing {:?}", self.id, inbound);
                                self.shared.emit_message(inbound);
                            }
                            Route::ReplyPong(payload) => {
                                debug!("[SESSION-{}] Received ping, sending pong", self.id);
                                if let Err(e) = write.send(Message::Pong(payload)).await {
                                    return self.transport_failure(Error::WebSocket(e));
                                }
                                self.shared.metrics.record_pong_sent();
                            }
                            Route::Pong(payload) => {
                                debug!("[SESSION-{}] Received pong", self.id);
                                health.record_pong_received();
                                self.shared.metrics.record_pong();
                                pong_waiters.resolve(&payload);
                            }
                            Route::Close(info) => {
                                info!(
                                    "[SESSION-{}] Received close frame ({}: {})",
                                    self.id, info.code, info.reason
                                );
                                // flush the close reply queued by the transport
                                let _ = timeout(self.config.close_timeout, write.close()).await;
                                return Closure {
                                    info,
                                    intentional: false,
                                    opened: true,
                                };
                            }
                            Route::Ignore => {}
                        },
                        Some(Err(e)) => {
                            warn!("[SESSION-{}] WebSocket error: {}", self.id, e);
                            return self.transport_failure(Error::WebSocket(e));
                        }
                        None => {
                            info!("[SESSION-{}] WebSocket stream ended", self.id);
                            return Closure::abnormal(CLOSE_ABNORMAL, "stream ended without close frame");
                        }
                    }
                }

                // Shared keeps a sender alive for the whole session
                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        Command::Send(text) => {
                            if let Err(e) = write.send(Message::Text(text)).await {
                                warn!("[SESSION-{}] Failed to send message: {}", self.id, e);
                                return self.transport_failure(Error::WebSocket(e));
                            }
                            self.shared.metrics.record_message_sent();
                        }
                        Command::Ping { payload, ack } => {
                            if let Err(e) = write.send(Message::Ping(payload.clone())).await {
                                warn!("[SESSION-{}] Failed to send ping: {}", self.id, e);
                                return self.transport_failure(Error::WebSocket(e));
                            }
                            self.shared.metrics.record_ping();
                            if let Some(ack) = ack {
                                pong_waiters.push(payload, ack);
                            }
                        }
                    }
                }

                request = &mut self.close_rx => {
                    let request = request.unwrap_or_else(|_| CloseRequest {
                        code: router::CLOSE_NORMAL,
                        reason: "client dropped".to_string(),
                    });
                    return self.close_gracefully(&mut write, &mut read, request).await;
                }

                _ = sleep(next_health_check), if health.is_enabled() => {
                    if health.check_and_record_pong_timeout() {
                        self.shared.metrics.record_heartbeat_failure();
                        warn!(
                            "[SESSION-{}] Pong timeout (failures: {})",
                            self.id,
                            health.consecutive_failures()
                        );

                        if health.is_unhealthy() {
                            warn!("[SESSION-{}] Keepalive failed, dropping connection", self.id);
                            let _ = write
                                .send(Message::Close(Some(close_frame(
                                    CLOSE_KEEPALIVE_TIMEOUT,
                                    "keepalive ping timeout",
                                ))))
                                .await;
                            return Closure::abnormal(CLOSE_KEEPALIVE_TIMEOUT, "keepalive ping timeout");
                        }
                    }

                    if health.should_send_ping() {
                        if let Err(e) = write.send(Message::Ping(KEEPALIVE_PAYLOAD.to_vec())).await {
                            warn!("[SESSION-{}] Failed to send ping: {}", self.id, e);
                            return self.transport_failure(Error::WebSocket(e));
                        }
                        health.record_ping_sent();
                        trace!(
                            "[SESSION-{}] Keepalive ping sent (last pong {:?} ago)",
                            self.id,
                            health.time_since_last_pong()
                        );
                        self.shared.metrics.record_ping();
                    }
                }
            }
        }
    }

    /// Send our close frame and wait (bounded) for the peer's reply
    async fn close_gracefully(
        &mut self,
        write: &mut SplitSink<WsStream, Message>,
        read: &mut SplitStream<WsStream>,
        request: CloseRequest,
    ) -> Closure {
        self.shared.set_phase(SessionPhase::Closing);
        info!(
            "[SESSION-{}] Closing ({}: {})",
            self.id, request.code, request.reason
        );

        if let Err(e) = write
            .send(Message::Close(Some(close_frame(request.code, &request.reason))))
            .await
        {
            debug!("[SESSION-{}] Close frame not delivered: {}", self.id, e);
        }

        let drained = timeout(self.config.close_timeout, async {
            while let Some(Ok(message)) = read.next().await {
                if let Message::Close(_) = message {
                    break;
                }
            }
        })
        .await;
        if drained.is_err() {
            debug!("[SESSION-{}] Peer did not answer close in time", self.id);
        }

        Closure {
            info: CloseInfo::new(request.code, request.reason),
            intentional: true,
            opened: true,
        }
    }

    fn transport_failure(&self, error: Error) -> Closure {
        let reason = error.to_string();
        self.shared.emit_error(&error);
        Closure::abnormal(CLOSE_ABNORMAL, reason)
    }

    /// Drop sends queued for a session that no longer exists
    fn discard_stale_commands(&mut self) {
        let mut dropped = 0usize;
        while self.command_rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(
                "[SESSION-{}] Discarded {} commands queued before disconnect",
                self.id, dropped
            );
        }
    }

    /// Enter the terminal Closed phase and release the client's handle
    fn finish(&self, info: CloseInfo) {
        // Under the session lock so a concurrent connect sees either the old
        // handle or a fully closed client
        let mut session = self.shared.session.lock();
        if session.as_ref().map(|s| s.id) == Some(self.id) {
            *session = None;
            *self.shared.last_close.lock() = Some(info);
            self.shared.set_phase(SessionPhase::Closed);
        }
    }
}

/// Callers of `ping_and_wait` waiting for a pong with their payload
#[derive(Default)]
struct PongWaiters {
    waiters: Vec<(Vec<u8>, oneshot::Sender<()>)>,
}

impl PongWaiters {
    fn push(&mut self, payload: Vec<u8>, ack: oneshot::Sender<()>) {
        // waiters that timed out have dropped their receiver
        self.waiters.retain(|(_, waiter)| !waiter.is_closed());
        self.waiters.push((payload, ack));
    }

    /// Wake every waiter whose payload matches
    fn resolve(&mut self, payload: &[u8]) {
        let (matched, rest): (Vec<_>, Vec<_>) = self
            .waiters
            .drain(..)
            .partition(|(expected, _)| expected.as_slice() == payload);
        self.waiters = rest;
        for (_, ack) in matched {
            let _ = ack.send(());
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.waiters.len()
    }
}

fn close_frame(code: u16, reason: &str) -> CloseFrame<'static> {
    CloseFrame {
        code: CloseCode::from(code),
        reason: Cow::Owned(reason.to_string()),
    }
}

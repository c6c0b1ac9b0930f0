use crate::error::Error;
use crate::message::InboundMessage;
use crate::metrics::Metrics;
use crate::router::CLOSE_NORMAL;
use crate::transport::SessionInfo;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Lifecycle phase of the client's session.
///
/// `ReconnectPending` is only entered from `Closed`, while the fixed delay
/// before the next attempt runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No session has ever been created
    Idle,
    /// Opening the transport (initial connect or a reconnect attempt)
    Connecting,
    /// Transport open, frames flowing
    Open,
    /// Caller close in progress
    Closing,
    /// No live transport
    Closed,
    /// Waiting out the delay before a reconnect attempt
    ReconnectPending,
}

impl SessionPhase {
    /// Public view of this phase
    pub fn ready_state(self) -> ReadyState {
        match self {
            SessionPhase::Idle => ReadyState::Disconnected,
            SessionPhase::Connecting => ReadyState::Connecting,
            SessionPhase::Open => ReadyState::Open,
            SessionPhase::Closing => ReadyState::Closing,
            SessionPhase::Closed | SessionPhase::ReconnectPending => ReadyState::Closed,
        }
    }
}

/// State reported by `WebSocketClient::state`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
    /// No session has ever been created
    Disconnected,
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReadyState::Connecting => "CONNECTING",
            ReadyState::Open => "OPEN",
            ReadyState::Closing => "CLOSING",
            ReadyState::Closed => "CLOSED",
            ReadyState::Disconnected => "DISCONNECTED",
        };
        f.write_str(name)
    }
}

/// Close code and reason of a finished session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Closed with the intentional code (1000)
    pub fn is_normal(&self) -> bool {
        self.code == CLOSE_NORMAL
    }
}

/// Why `on_disconnect` fired and what happens next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectKind {
    /// Caller close or peer close with 1000; no reconnection
    Normal,
    /// Abnormal close; reconnect attempt `attempt` is scheduled
    Reconnecting { attempt: u32 },
    /// Retry bound reached; terminal
    Exhausted { attempts: u32 },
}

/// Payload of the `on_disconnect` hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectEvent {
    pub code: u16,
    pub reason: String,
    pub kind: DisconnectKind,
}

impl DisconnectEvent {
    /// No further automatic attempts will follow
    pub fn is_final(&self) -> bool {
        !matches!(self.kind, DisconnectKind::Reconnecting { .. })
    }
}

pub type MessageHook = Arc<dyn Fn(InboundMessage) + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&Error) + Send + Sync>;
pub type ConnectHook = Arc<dyn Fn(&SessionInfo) + Send + Sync>;
pub type DisconnectHook = Arc<dyn Fn(&DisconnectEvent) + Send + Sync>;

/// The four event hooks of a client.
///
/// Each field is replaced independently; the latest registration wins.
/// Defaults only log.
///
/// # Example
///
/// ```ignore
/// use resilient_ws::{EventHooks, InboundMessage};
///
/// let hooks = EventHooks::default()
///     .on_message(|message: InboundMessage| println!("{:?}", message))
///     .on_disconnect(|event| println!("closed with {}", event.code));
/// ```
#[derive(Clone)]
pub struct EventHooks {
    pub on_message: MessageHook,
    pub on_error: ErrorHook,
    pub on_connect: ConnectHook,
    pub on_disconnect: DisconnectHook,
}

impl Default for EventHooks {
    fn default() -> Self {
        Self {
            on_message: Arc::new(|message| debug!("Received message: {:?}", message)),
            on_error: Arc::new(|error| warn!("Session error: {}", error)),
            on_connect: Arc::new(|session| info!("Connected to {}", session.url)),
            on_disconnect: Arc::new(|event| {
                info!("Disconnected ({}: {}) {:?}", event.code, event.reason, event.kind)
            }),
        }
    }
}

impl fmt::Debug for EventHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHooks").finish_non_exhaustive()
    }
}

impl EventHooks {
    pub fn on_message(mut self, hook: impl Fn(InboundMessage) + Send + Sync + 'static) -> Self {
        self.on_message = Arc::new(hook);
        self
    }

    pub fn on_error(mut self, hook: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.on_error = Arc::new(hook);
        self
    }

    pub fn on_connect(mut self, hook: impl Fn(&SessionInfo) + Send + Sync + 'static) -> Self {
        self.on_connect = Arc::new(hook);
        self
    }

    pub fn on_disconnect(mut self, hook: impl Fn(&DisconnectEvent) + Send + Sync + 'static) -> Self {
        self.on_disconnect = Arc::new(hook);
        self
    }
}

/// Run a hook, containing any panic it raises.
///
/// Returns false if the hook panicked. The panic is logged and counted.
pub(crate) fn call_hook_safe(name: &str, metrics: &Metrics, hook: impl FnOnce()) -> bool {
    match catch_unwind(AssertUnwindSafe(hook)) {
        Ok(()) => true,
        Err(panic) => {
            let failure = Error::Handler(format!("{} panicked: {}", name, panic_message(&panic)));
            error!("{}", failure);
            metrics.record_hook_panic();
            false
        }
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_ready_state_mapping() {
        assert_eq!(SessionPhase::Idle.ready_state(), ReadyState::Disconnected);
        assert_eq!(SessionPhase::Open.ready_state(), ReadyState::Open);
        assert_eq!(SessionPhase::ReconnectPending.ready_state(), ReadyState::Closed);
        assert_eq!(ReadyState::Disconnected.to_string(), "DISCONNECTED");
    }

    #[test]
    fn test_panicking_hook_is_contained() {
        let metrics = Metrics::new();
        let ok = call_hook_safe("on_message", &metrics, || panic!("boom"));
        assert!(!ok);
        assert_eq!(metrics.hook_panics(), 1);

        let ok = call_hook_safe("on_message", &metrics, || {});
        assert!(ok);
        assert_eq!(metrics.hook_panics(), 1);
    }

    #[test]
    fn test_latest_registration_wins() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let (a, b) = (first.clone(), second.clone());
        let hooks = EventHooks::default()
            .on_message(move |_| {
                a.fetch_add(1, Ordering::SeqCst);
            })
            .on_message(move |_| {
                b.fetch_add(1, Ordering::SeqCst);
            });

        (hooks.on_message)(InboundMessage::Text("hi".to_string()));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disconnect_finality() {
        let event = DisconnectEvent {
            code: 1011,
            reason: String::new(),
            kind: DisconnectKind::Reconnecting { attempt: 1 },
        };
        assert!(!event.is_final());

        let event = DisconnectEvent {
            kind: DisconnectKind::Exhausted { attempts: 5 },
            ..event
        };
        assert!(event.is_final());
    }
}

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters for one client's session history.
///
/// Use `snapshot()` for a point-in-time view, or the individual getters.
///
/// # Example
/// ```ignore
/// let metrics = client.metrics();
/// println!("Reconnections: {}", metrics.reconnections());
/// let snapshot = metrics.snapshot();
/// ```
#[derive(Debug, Default)]
pub struct Metrics {
    connections_total: AtomicU64,
    reconnections_total: AtomicU64,
    messages_received_total: AtomicU64,
    messages_sent_total: AtomicU64,
    send_failures_total: AtomicU64,
    errors_total: AtomicU64,
    pings_sent_total: AtomicU64,
    pongs_received_total: AtomicU64,
    pongs_sent_total: AtomicU64,
    heartbeat_failures_total: AtomicU64,
    hook_panics_total: AtomicU64,

    /// When the current session opened (None while not open)
    connected_at: RwLock<Option<Instant>>,
}

impl Metrics {
    /// Create a new Metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Getters ==========

    /// Get total sessions opened (initial and reconnects)
    pub fn connections(&self) -> u64 {
        self.connections_total.load(Ordering::Relaxed)
    }

    /// Get total successful reconnections
    pub fn reconnections(&self) -> u64 {
        self.reconnections_total.load(Ordering::Relaxed)
    }

    /// Get total data messages received
    pub fn messages_received(&self) -> u64 {
        self.messages_received_total.load(Ordering::Relaxed)
    }

    /// Get total messages written to the transport
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent_total.load(Ordering::Relaxed)
    }

    /// Get total rejected `send` calls
    pub fn send_failures(&self) -> u64 {
        self.send_failures_total.load(Ordering::Relaxed)
    }

    /// Get total errors reported through `on_error`
    pub fn errors(&self) -> u64 {
        self.errors_total.load(Ordering::Relaxed)
    }

    /// Get total pings sent
    pub fn pings_sent(&self) -> u64 {
        self.pings_sent_total.load(Ordering::Relaxed)
    }

    /// Get total pongs received
    pub fn pongs_received(&self) -> u64 {
        self.pongs_received_total.load(Ordering::Relaxed)
    }

    /// Get total pongs sent in reply to peer pings
    pub fn pongs_sent(&self) -> u64 {
        self.pongs_sent_total.load(Ordering::Relaxed)
    }

    /// Get total heartbeat failures (missed pongs)
    pub fn heartbeat_failures(&self) -> u64 {
        self.heartbeat_failures_total.load(Ordering::Relaxed)
    }

    /// Get total panics caught from event hooks
    pub fn hook_panics(&self) -> u64 {
        self.hook_panics_total.load(Ordering::Relaxed)
    }

    /// Time since the current session opened
    pub fn time_since_connected(&self) -> Option<Duration> {
        self.connected_at.read().map(|t| t.elapsed())
    }

    // ========== Recording methods (called internally) ==========

    pub(crate) fn record_connection(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        *self.connected_at.write() = Some(Instant::now());
    }

    pub(crate) fn record_disconnection(&self) {
        *self.connected_at.write() = None;
    }

    pub(crate) fn record_reconnection(&self) {
        self.reconnections_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_message_received(&self) {
        self.messages_received_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_message_sent(&self) {
        self.messages_sent_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_send_failure(&self) {
        self.send_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ping(&self) {
        self.pings_sent_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pong(&self) {
        self.pongs_received_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pong_sent(&self) {
        self.pongs_sent_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_heartbeat_failure(&self) {
        self.heartbeat_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_hook_panic(&self) {
        self.hook_panics_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a point-in-time snapshot of all metrics for export
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Acquire),
            reconnections_total: self.reconnections_total.load(Ordering::Acquire),
            messages_received_total: self.messages_received_total.load(Ordering::Acquire),
            messages_sent_total: self.messages_sent_total.load(Ordering::Acquire),
            send_failures_total: self.send_failures_total.load(Ordering::Acquire),
            errors_total: self.errors_total.load(Ordering::Acquire),
            pings_sent_total: self.pings_sent_total.load(Ordering::Acquire),
            pongs_received_total: self.pongs_received_total.load(Ordering::Acquire),
            pongs_sent_total: self.pongs_sent_total.load(Ordering::Acquire),
            heartbeat_failures_total: self.heartbeat_failures_total.load(Ordering::Acquire),
            hook_panics_total: self.hook_panics_total.load(Ordering::Acquire),
            time_since_connected: self.time_since_connected(),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub reconnections_total: u64,
    pub messages_received_total: u64,
    pub messages_sent_total: u64,
    pub send_failures_total: u64,
    pub errors_total: u64,
    pub pings_sent_total: u64,
    pub pongs_received_total: u64,
    pub pongs_sent_total: u64,
    pub heartbeat_failures_total: u64,
    pub hook_panics_total: u64,
    pub time_since_connected: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counters() {
        let metrics = Metrics::new();

        metrics.record_connection();
        metrics.record_connection();
        metrics.record_reconnection();

        assert_eq!(metrics.connections(), 2);
        assert_eq!(metrics.reconnections(), 1);
    }

    #[test]
    fn test_connected_at_cleared_on_disconnect() {
        let metrics = Metrics::new();
        assert!(metrics.time_since_connected().is_none());

        metrics.record_connection();
        assert!(metrics.time_since_connected().is_some());

        metrics.record_disconnection();
        assert!(metrics.time_since_connected().is_none());
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = Metrics::new();

        metrics.record_connection();
        metrics.record_send_failure();
        metrics.record_pong_sent();
        metrics.record_hook_panic();

        let snapshot = metrics.snapshot();

        assert_eq!(snapshot.connections_total, 1);
        assert_eq!(snapshot.send_failures_total, 1);
        assert_eq!(snapshot.pongs_sent_total, 1);
        assert_eq!(snapshot.hook_panics_total, 1);
        assert!(snapshot.time_since_connected.is_some());
    }

    #[test]
    fn test_individual_getters() {
        let metrics = Metrics::new();

        metrics.record_message_received();
        metrics.record_message_received();
        metrics.record_error();
        metrics.record_ping();
        metrics.record_pong();
        metrics.record_heartbeat_failure();

        assert_eq!(metrics.messages_received(), 2);
        assert_eq!(metrics.errors(), 1);
        assert_eq!(metrics.pings_sent(), 1);
        assert_eq!(metrics.pongs_received(), 1);
        assert_eq!(metrics.heartbeat_failures(), 1);
        assert_eq!(metrics.messages_sent(), 0);
    }
}

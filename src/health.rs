use crate::config::HeartbeatConfig;
use std::time::Instant;
use tokio::time::Duration;

/// Tracks keepalive state for a single open session
#[derive(Debug)]
pub struct HealthMonitor {
    config: HeartbeatConfig,

    /// Time of last ping sent
    last_ping_sent: Option<Instant>,

    /// Time of last pong received
    last_pong_received: Option<Instant>,

    /// Number of consecutive ping failures (no pong received)
    consecutive_ping_failures: u32,

    /// Whether we're currently waiting for a pong
    waiting_for_pong: bool,
}

impl HealthMonitor {
    /// Create a new health monitor. The first ping is due one interval after open.
    pub fn new(config: HeartbeatConfig) -> Self {
        Self {
            config,
            last_ping_sent: Some(Instant::now()),
            last_pong_received: None,
            consecutive_ping_failures: 0,
            waiting_for_pong: false,
        }
    }

    /// Whether keepalive pings are sent at all
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Record that we sent a ping
    pub fn record_ping_sent(&mut self) {
        self.last_ping_sent = Some(Instant::now());
        self.waiting_for_pong = true;
    }

    /// Record that we received a pong
    pub fn record_pong_received(&mut self) {
        self.last_pong_received = Some(Instant::now());
        self.consecutive_ping_failures = 0;
        self.waiting_for_pong = false;
    }

    /// Check if we should send a ping now
    pub fn should_send_ping(&self) -> bool {
        if !self.config.enabled || self.waiting_for_pong {
            return false;
        }

        match self.last_ping_sent {
            None => true,
            Some(last) => last.elapsed() >= self.config.ping_interval,
        }
    }

    /// Check if pong is overdue and record failure if so.
    ///
    /// Side effects: increments the failure counter and clears the
    /// waiting flag when a timeout is detected. Call once per check cycle.
    pub fn check_and_record_pong_timeout(&mut self) -> bool {
        if !self.waiting_for_pong {
            return false;
        }

        match self.last_ping_sent {
            None => false,
            Some(last) => {
                if last.elapsed() >= self.config.pong_timeout {
                    self.consecutive_ping_failures += 1;
                    self.waiting_for_pong = false;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Check if the session is unhealthy based on consecutive failures
    pub fn is_unhealthy(&self) -> bool {
        self.consecutive_ping_failures >= self.config.failure_threshold
    }

    /// Get time until the next heartbeat action is due
    pub fn time_until_next_check(&self) -> Duration {
        let window = if self.waiting_for_pong {
            self.config.pong_timeout
        } else {
            self.config.ping_interval
        };

        match self.last_ping_sent {
            None => Duration::ZERO,
            Some(last) => window.saturating_sub(last.elapsed()),
        }
    }

    /// Time since the last pong, if any arrived
    pub fn time_since_last_pong(&self) -> Option<Duration> {
        self.last_pong_received.map(|t| t.elapsed())
    }

    /// Get the consecutive ping failure count
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_ping_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> HeartbeatConfig {
        HeartbeatConfig {
            enabled: true,
            ping_interval: Duration::from_millis(100),
            pong_timeout: Duration::from_millis(50),
            failure_threshold: 3,
        }
    }

    #[test]
    fn test_initial_state() {
        let mut monitor = HealthMonitor::new(test_config());
        assert!(!monitor.should_send_ping()); // first ping waits one interval
        assert!(!monitor.check_and_record_pong_timeout());
        assert!(!monitor.is_unhealthy());
        assert!(monitor.time_since_last_pong().is_none());
    }

    #[tokio::test]
    async fn test_ping_due_after_interval() {
        let monitor = HealthMonitor::new(test_config());
        tokio::time::sleep(Duration::from_millis(110)).await;
        assert!(monitor.should_send_ping());
        assert_eq!(monitor.time_until_next_check(), Duration::ZERO);
    }

    #[test]
    fn test_ping_pong_cycle() {
        let mut monitor = HealthMonitor::new(test_config());

        monitor.record_ping_sent();
        assert!(!monitor.should_send_ping()); // Waiting for pong

        monitor.record_pong_received();
        assert_eq!(monitor.consecutive_failures(), 0);
        assert!(monitor.time_since_last_pong().is_some());
    }

    #[test]
    fn test_disabled_never_pings() {
        let monitor = HealthMonitor::new(HeartbeatConfig {
            ping_interval: Duration::ZERO,
            ..HeartbeatConfig::disabled()
        });
        assert!(!monitor.is_enabled());
        assert!(!monitor.should_send_ping());
    }

    #[tokio::test]
    async fn test_pong_timeout() {
        let mut monitor = HealthMonitor::new(test_config());

        monitor.record_ping_sent();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(monitor.check_and_record_pong_timeout());
        assert_eq!(monitor.consecutive_failures(), 1);
    }

    #[tokio::test]
    async fn test_unhealthy_after_threshold() {
        let mut monitor = HealthMonitor::new(test_config());

        for _ in 0..3 {
            monitor.record_ping_sent();
            tokio::time::sleep(Duration::from_millis(60)).await;
            monitor.check_and_record_pong_timeout();
        }

        assert!(monitor.is_unhealthy());
    }
}

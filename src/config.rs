use std::time::Duration;

/// Default `User-Agent` sent on every handshake unless the caller overrides it
pub const DEFAULT_USER_AGENT: &str = concat!("resilient-ws/", env!("CARGO_PKG_VERSION"));

/// Configuration for a [`WebSocketClient`](crate::WebSocketClient)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Reconnection settings
    pub reconnect: ReconnectConfig,
    /// Keepalive ping/pong settings
    pub heartbeat: HeartbeatConfig,
    /// How long a caller close waits for the peer's close reply
    pub close_timeout: Duration,
    /// Capacity of the outbound command queue; a full queue fails `send` fast
    pub command_buffer: usize,
    /// Default `User-Agent` header value
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            close_timeout: Duration::from_secs(5),
            command_buffer: 1024,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a new builder for configuration
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for ClientConfig
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set reconnection configuration
    pub fn reconnect(mut self, config: ReconnectConfig) -> Self {
        self.config.reconnect = config;
        self
    }

    /// Set the maximum number of reconnect attempts
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.reconnect.max_attempts = attempts;
        self
    }

    /// Set the fixed delay between reconnect attempts
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.config.reconnect.interval = interval;
        self
    }

    /// Set heartbeat configuration
    pub fn heartbeat(mut self, config: HeartbeatConfig) -> Self {
        self.config.heartbeat = config;
        self
    }

    /// Set the close handshake timeout
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.config.close_timeout = timeout;
        self
    }

    /// Set the outbound command queue capacity
    pub fn command_buffer(mut self, capacity: usize) -> Self {
        self.config.command_buffer = capacity;
        self
    }

    /// Set the default `User-Agent` header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Build the configuration with validation.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let heartbeat = &self.config.heartbeat;
        if heartbeat.enabled && heartbeat.pong_timeout > heartbeat.ping_interval {
            return Err(ConfigError::InvalidHeartbeat(
                "pong_timeout should be <= ping_interval".to_string(),
            ));
        }

        if heartbeat.failure_threshold == 0 {
            return Err(ConfigError::InvalidHeartbeat(
                "failure_threshold cannot be 0".to_string(),
            ));
        }

        if self.config.command_buffer == 0 {
            return Err(ConfigError::InvalidCommandBuffer(
                "command_buffer cannot be 0".to_string(),
            ));
        }

        Ok(self.config)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Invalid heartbeat configuration
    #[error("Invalid heartbeat configuration: {0}")]
    InvalidHeartbeat(String),
    /// Invalid command queue capacity
    #[error("Invalid command buffer: {0}")]
    InvalidCommandBuffer(String),
}

/// Reconnection policy after an abnormal close.
///
/// Attempts are spaced by a fixed `interval`; there is no exponential growth.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum consecutive reconnect attempts before giving up
    pub max_attempts: u32,
    /// Fixed delay before each attempt
    pub interval: Duration,
    /// Spread each delay uniformly over `[0, interval]`
    pub jitter: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            interval: Duration::from_secs(3),
            jitter: false,
        }
    }
}

impl ReconnectConfig {
    /// Delay to wait before the next attempt
    pub fn delay(&self) -> Duration {
        if self.jitter {
            let jittered = rand::random::<f64>() * self.interval.as_millis() as f64;
            Duration::from_millis(jittered as u64)
        } else {
            self.interval
        }
    }
}

/// Keepalive configuration
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Send protocol-level pings while the session is open
    pub enabled: bool,
    /// Interval between pings
    pub ping_interval: Duration,
    /// Timeout for receiving a pong response
    pub pong_timeout: Duration,
    /// Consecutive pong timeouts before the session is dropped
    pub failure_threshold: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
            failure_threshold: 1,
        }
    }
}

impl HeartbeatConfig {
    /// Heartbeat turned off; only peer pings are answered
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_contract() {
        let config = ClientConfig::default();
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.reconnect.interval, Duration::from_secs(3));
        assert!(!config.reconnect.jitter);
        assert_eq!(config.heartbeat.ping_interval, Duration::from_secs(30));
        assert_eq!(config.heartbeat.pong_timeout, Duration::from_secs(10));
        assert!(config.user_agent.starts_with("resilient-ws/"));
    }

    #[test]
    fn test_fixed_delay_without_jitter() {
        let config = ReconnectConfig::default();
        for _ in 0..5 {
            assert_eq!(config.delay(), Duration::from_secs(3));
        }
    }

    #[test]
    fn test_jitter_stays_within_interval() {
        let config = ReconnectConfig {
            max_attempts: 5,
            interval: Duration::from_millis(500),
            jitter: true,
        };

        for _ in 0..20 {
            assert!(config.delay() <= Duration::from_millis(500));
        }
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::builder()
            .max_reconnect_attempts(2)
            .reconnect_interval(Duration::from_millis(50))
            .user_agent("custom-agent/1.0")
            .build()
            .expect("valid config");

        assert_eq!(config.reconnect.max_attempts, 2);
        assert_eq!(config.reconnect.interval, Duration::from_millis(50));
        assert_eq!(config.user_agent, "custom-agent/1.0");
        assert!(config.heartbeat.enabled); // default
    }

    #[test]
    fn test_config_builder_rejects_slow_pong() {
        let result = ClientConfig::builder()
            .heartbeat(HeartbeatConfig {
                enabled: true,
                ping_interval: Duration::from_secs(1),
                pong_timeout: Duration::from_secs(2),
                failure_threshold: 1,
            })
            .build();

        assert!(matches!(result, Err(ConfigError::InvalidHeartbeat(_))));
    }

    #[test]
    fn test_config_builder_rejects_zero_buffer() {
        let result = ClientConfig::builder().command_buffer(0).build();
        assert!(matches!(result, Err(ConfigError::InvalidCommandBuffer(_))));
    }

    #[test]
    fn test_disabled_heartbeat_skips_timing_check() {
        let config = ClientConfig::builder()
            .heartbeat(HeartbeatConfig {
                ping_interval: Duration::from_millis(1),
                ..HeartbeatConfig::disabled()
            })
            .build()
            .expect("valid config");
        assert!(!config.heartbeat.enabled);
    }
}

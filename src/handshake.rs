use crate::error::Error;
use http::header::SEC_WEBSOCKET_PROTOCOL;
use http::{HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

/// Handshake timeout used when none (or zero) is given
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

const ACCEPT: &str = "Accept";
const CACHE_CONTROL: &str = "Cache-Control";
const USER_AGENT: &str = "User-Agent";

/// Caller-supplied options for `connect`
#[derive(Clone, Default)]
pub struct ConnectOptions {
    /// Extra handshake headers; these win over the defaults
    pub headers: BTreeMap<String, String>,
    /// Subprotocols to offer, in preference order
    pub protocols: Vec<String>,
    /// Handshake timeout (defaults to 10s when absent or zero)
    pub timeout: Option<Duration>,
    /// TLS connector for `wss` URLs (a default one is built otherwise)
    pub tls: Option<native_tls::TlsConnector>,
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Header values may carry credentials
        f.debug_struct("ConnectOptions")
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("protocols", &self.protocols)
            .field("timeout", &self.timeout)
            .field("tls", &self.tls.is_some())
            .finish()
    }
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one handshake header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add several handshake headers
    pub fn headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Offer a subprotocol
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocols.push(protocol.into());
        self
    }

    /// Set the handshake timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Use a custom TLS connector for `wss` URLs
    pub fn tls_connector(mut self, connector: native_tls::TlsConnector) -> Self {
        self.tls = Some(connector);
        self
    }
}

/// Merged, immutable handshake configuration for one connection attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeOptions {
    pub headers: BTreeMap<String, String>,
    pub subprotocols: Vec<String>,
    pub timeout: Duration,
}

impl HandshakeOptions {
    /// Merge the default header set with the caller's options.
    ///
    /// Caller values win on exact key collisions. Pure; malformed values are
    /// passed through and rejected later by the transport.
    pub fn build(options: &ConnectOptions, user_agent: &str) -> Self {
        let mut headers = default_headers(user_agent);
        headers.extend(
            options
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );

        let timeout = match options.timeout {
            Some(timeout) if !timeout.is_zero() => timeout,
            _ => DEFAULT_HANDSHAKE_TIMEOUT,
        };

        Self {
            headers,
            subprotocols: options.protocols.clone(),
            timeout,
        }
    }

    /// Headers in wire order: default-only names first, caller names last.
    ///
    /// The transport's header map is case-insensitive, so a caller name that
    /// differs from a default only in case must be applied after it.
    fn wire_order(&self) -> impl Iterator<Item = (&String, &String)> {
        let is_default = |name: &str| matches!(name, USER_AGENT | ACCEPT | CACHE_CONTROL);
        self.headers
            .iter()
            .filter(move |(name, _)| is_default(name.as_str()))
            .chain(
                self.headers
                    .iter()
                    .filter(move |(name, _)| !is_default(name.as_str())),
            )
    }
}

fn default_headers(user_agent: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (USER_AGENT.to_string(), user_agent.to_string()),
        (ACCEPT.to_string(), "*/*".to_string()),
        (CACHE_CONTROL.to_string(), "no-cache".to_string()),
    ])
}

/// Everything needed to (re)open a session: kept unchanged across reconnects
#[derive(Clone)]
pub struct Handshake {
    pub url: String,
    pub options: HandshakeOptions,
    pub(crate) tls: Option<native_tls::TlsConnector>,
}

impl fmt::Debug for Handshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handshake")
            .field("url", &crate::transport::redact_url(&self.url))
            .field("headers", &self.options.headers.keys().collect::<Vec<_>>())
            .field("subprotocols", &self.options.subprotocols)
            .field("timeout", &self.options.timeout)
            .finish()
    }
}

impl Handshake {
    pub fn build(url: impl Into<String>, options: &ConnectOptions, user_agent: &str) -> Self {
        Self {
            url: url.into(),
            options: HandshakeOptions::build(options, user_agent),
            tls: options.tls.clone(),
        }
    }

    /// Build the transport upgrade request
    pub(crate) fn request(&self) -> Result<Request, Error> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| Error::handshake(&self.url, format!("Invalid WebSocket request: {}", e)))?;

        let headers = request.headers_mut();
        for (name, value) in self.options.wire_order() {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::handshake(&self.url, format!("Invalid header name '{}': {}", name, e)))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| Error::handshake(&self.url, format!("Invalid value for header '{}': {}", name, e)))?;
            headers.insert(header_name, header_value);
        }

        if !self.options.subprotocols.is_empty() {
            let offered = self.options.subprotocols.join(", ");
            let value = HeaderValue::from_str(&offered)
                .map_err(|e| Error::handshake(&self.url, format!("Invalid subprotocol list: {}", e)))?;
            headers.insert(SEC_WEBSOCKET_PROTOCOL, value);
        }

        Ok(request)
    }
}

//! Configuration types for camera stream sessions

use crate::backoff::{BackoffPolicy, ExponentialBackoff, FixedBackoff};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Opaque identifier of one camera stream on the gateway
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    /// Create a stream identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Basic-auth credentials for the media gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayCredentials {
    /// Gateway username
    pub username: String,
    /// Gateway password
    pub password: String,
}

impl GatewayCredentials {
    /// Create credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Render the `Authorization` header value
    pub fn basic_header(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw)
        )
    }
}

/// Reference to one camera stream behind a media gateway
///
/// Immutable for the lifetime of one session; changing any field requires
/// tearing down the session and starting a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraStreamRef {
    /// Stream identifier on the gateway
    pub stream_id: StreamId,

    /// Gateway base address (http:// or https://)
    pub gateway_url: String,

    /// Optional basic-auth credentials
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<GatewayCredentials>,
}

impl CameraStreamRef {
    /// Create a stream reference without credentials
    pub fn new(stream_id: impl Into<StreamId>, gateway_url: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            gateway_url: gateway_url.into(),
            credentials: None,
        }
    }

    /// Attach basic-auth credentials
    pub fn with_credentials(mut self, credentials: GatewayCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Validate the reference
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if self.stream_id.as_str().is_empty() {
            return Err(Error::InvalidConfig("stream_id cannot be empty".to_string()));
        }

        if !self.gateway_url.starts_with("http://") && !self.gateway_url.starts_with("https://") {
            return Err(Error::InvalidConfig(format!(
                "gateway_url must start with http:// or https://, got {}",
                self.gateway_url
            )));
        }

        Ok(())
    }

    /// Negotiation endpoint for the one-shot HTTP exchange
    pub fn exchange_url(&self) -> String {
        format!(
            "{}/stream/{}/webrtc",
            self.gateway_url.trim_end_matches('/'),
            self.stream_id
        )
    }

    /// Signaling socket address for the persistent duplex channel
    ///
    /// Derived from the gateway base address by scheme substitution
    /// (http→ws, https→wss) plus the per-stream path segment.
    pub fn signaling_socket_url(&self) -> crate::Result<String> {
        use crate::Error;

        let mut url = Url::parse(&self.gateway_url)
            .map_err(|e| Error::InvalidConfig(format!("invalid gateway_url: {}", e)))?;

        let scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => {
                return Err(Error::InvalidConfig(format!(
                    "gateway_url scheme must be http or https, got {}",
                    other
                )))
            }
        };

        url.set_scheme(scheme)
            .map_err(|_| Error::InvalidConfig("failed to derive socket scheme".to_string()))?;

        let base = url.as_str().trim_end_matches('/').to_string();
        Ok(format!("{}/stream/{}/ws", base, self.stream_id))
    }
}

/// Which signaling transport negotiates the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalingMode {
    /// One-shot HTTP exchange: POST the local offer, receive the remote answer
    Exchange,
    /// Persistent WebSocket channel carrying descriptions and candidates
    Duplex,
}

/// Per-session negotiation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Signaling transport variant (default: Exchange)
    pub signaling: SignalingMode,

    /// STUN server URLs (at least one required)
    pub stun_servers: Vec<String>,

    /// Negotiation timeout in milliseconds (default: 15000ms)
    pub negotiation_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            signaling: SignalingMode::Exchange,
            stun_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            negotiation_timeout_ms: 15_000,
        }
    }
}

impl SessionConfig {
    /// Negotiation timeout as a duration
    pub fn negotiation_timeout(&self) -> Duration {
        Duration::from_millis(self.negotiation_timeout_ms)
    }
}

/// Backoff policy selection
///
/// `Exponential` is the default; `Fixed` reproduces a constant inter-retry
/// delay for gateways that dislike bursts of rapid renegotiation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum BackoffConfig {
    /// Exponential backoff with an upper bound
    Exponential {
        /// Initial delay in milliseconds (default: 1000ms)
        initial_ms: u64,
        /// Maximum delay in milliseconds (default: 30000ms)
        max_ms: u64,
        /// Growth factor per attempt (default: 2.0)
        multiplier: f64,
    },
    /// Constant delay between attempts
    Fixed {
        /// Delay in milliseconds
        delay_ms: u64,
    },
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::Exponential {
            initial_ms: 1000,
            max_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

impl BackoffConfig {
    /// Build the configured policy
    pub fn policy(&self) -> Arc<dyn BackoffPolicy> {
        match *self {
            BackoffConfig::Exponential {
                initial_ms,
                max_ms,
                multiplier,
            } => Arc::new(
                ExponentialBackoff::new(
                    Duration::from_millis(initial_ms),
                    Duration::from_millis(max_ms),
                )
                .with_multiplier(multiplier),
            ),
            BackoffConfig::Fixed { delay_ms } => {
                Arc::new(FixedBackoff::new(Duration::from_millis(delay_ms)))
            }
        }
    }

    fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        match *self {
            BackoffConfig::Exponential {
                initial_ms,
                max_ms,
                multiplier,
            } => {
                if initial_ms == 0 || max_ms < initial_ms {
                    return Err(Error::InvalidConfig(format!(
                        "exponential backoff requires 0 < initial_ms <= max_ms, got {}/{}",
                        initial_ms, max_ms
                    )));
                }
                if multiplier < 1.0 {
                    return Err(Error::InvalidConfig(format!(
                        "backoff multiplier must be >= 1.0, got {}",
                        multiplier
                    )));
                }
            }
            BackoffConfig::Fixed { delay_ms } => {
                if delay_ms == 0 {
                    return Err(Error::InvalidConfig(
                        "fixed backoff delay_ms must be positive".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Supervision settings applied to every camera session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Retry ceiling per failure streak (default: 3)
    pub max_attempts: u32,

    /// Delay policy between reconnection attempts
    pub backoff: BackoffConfig,

    /// Minimum seconds between externally-visible alerts per camera
    /// (default: 300s)
    pub alert_cooldown_secs: u64,

    /// Negotiation settings
    pub session: SessionConfig,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffConfig::default(),
            alert_cooldown_secs: 300,
            session: SessionConfig::default(),
        }
    }
}

impl SupervisorConfig {
    /// Alert cooldown as a duration
    pub fn alert_cooldown(&self) -> Duration {
        Duration::from_secs(self.alert_cooldown_secs)
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `max_attempts` is zero
    /// - `stun_servers` is empty
    /// - `negotiation_timeout_ms` is zero
    /// - the backoff parameters are out of range
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if self.max_attempts == 0 {
            return Err(Error::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        if self.session.stun_servers.is_empty() {
            return Err(Error::InvalidConfig(
                "At least one STUN server is required".to_string(),
            ));
        }

        if self.session.negotiation_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "negotiation_timeout_ms must be positive".to_string(),
            ));
        }

        self.backoff.validate()
    }

    /// Set the retry ceiling
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the signaling transport variant
    pub fn with_signaling(mut self, mode: SignalingMode) -> Self {
        self.session.signaling = mode;
        self
    }

    /// Set the alert cooldown
    pub fn with_alert_cooldown(mut self, cooldown: Duration) -> Self {
        self.alert_cooldown_secs = cooldown.as_secs();
        self
    }
}

//! Error types for camera session management

/// Result type alias using camlink Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while negotiating or supervising a camera stream
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Non-success response or connection refusal from the gateway
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote side explicitly reported an application-level error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Malformed payload from the gateway
    #[error("Decode error: {0}")]
    Decode(String),

    /// SDP negotiation error
    #[error("Negotiation error: {0}")]
    Negotiation(String),

    /// ICE candidate or connectivity error
    #[error("ICE error: {0}")]
    Ice(String),

    /// WebSocket signaling error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Negotiation did not complete in time
    #[error("Negotiation timeout: {0}")]
    Timeout(String),

    /// Caller-initiated teardown interrupted the operation
    #[error("Session cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is worth a reconnection attempt
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Error::InvalidConfig(_) | Error::Cancelled)
    }

    /// Check if this error is a remote application-level failure
    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }

    /// Check if this error is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::InvalidConfig(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Transport("connection refused".to_string());
        assert_eq!(err.to_string(), "Transport error: connection refused");
    }

    #[test]
    fn test_error_is_retryable() {
        assert!(Error::Transport("test".to_string()).is_retryable());
        assert!(Error::Protocol("test".to_string()).is_retryable());
        assert!(Error::Timeout("test".to_string()).is_retryable());
        assert!(!Error::InvalidConfig("test".to_string()).is_retryable());
        assert!(!Error::Cancelled.is_retryable());
    }

    #[test]
    fn test_error_is_protocol() {
        assert!(Error::Protocol("stream not found".to_string()).is_protocol());
        assert!(!Error::Transport("test".to_string()).is_protocol());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
    }
}

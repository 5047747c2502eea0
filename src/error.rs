//! Error types for the streaming client.
//!
//! Only connect failures and subscription-limit violations are surfaced to
//! callers. Transport, frame, decode, and handler failures are contained
//! inside the pipeline and reported through [`ClientEvent`] notifications,
//! so a single bad message or subscriber never terminates the stream.
//!
//! [`ClientEvent`]: crate::ClientEvent

use thiserror::Error;

/// Main error type for client operations.
#[derive(Debug, Error)]
pub enum RestreamError {
    /// `connect()` did not complete the handshake within the configured window.
    #[error("connect timeout after {0}ms")]
    ConnectTimeout(u64),

    /// The transport could not be established.
    #[error("connection failed")]
    ConnectionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The configured endpoint is not a valid URL.
    #[error("invalid endpoint URL: {0}")]
    InvalidEndpoint(String),

    /// Subscribing would exceed the distinct-channel quota.
    #[error("max subscriptions ({0}) exceeded")]
    SubscriptionLimit(usize),

    /// Subscribing would exceed the wildcard-channel quota.
    #[error("max wildcard subscriptions ({0}) exceeded")]
    WildcardSubscriptionLimit(usize),

    /// An address passed to a convenience subscription is not a base58
    /// 32-byte key.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl RestreamError {
    /// Create a connection failure from a plain message.
    pub(crate) fn connection_failed<S: Into<String>>(message: S) -> Self {
        RestreamError::ConnectionFailed(message.into().into())
    }
}

/// Result type for client operations.
pub type RestreamResult<T> = Result<T, RestreamError>;

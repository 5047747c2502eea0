//! Observability notifications emitted by the client.

use crate::protocol::DecodedEvent;
use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Metadata handed to subscription handlers alongside the decoded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMeta {
    /// Full channel the frame arrived on, e.g. `swap:ABC`.
    pub channel: String,
    /// Topic portion of the channel.
    pub topic: String,
    /// Subject portion of the channel; empty if the channel has no `:`.
    pub subject: String,
}

/// A decoded frame, emitted for every frame regardless of handlers.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub channel: String,
    pub topic: String,
    pub subject: String,
    /// Raw payload bytes as received.
    pub payload: Bytes,
    pub decoded: DecodedEvent,
}

/// Notifications observable via [`RestreamClient::events`].
///
/// [`RestreamClient::events`]: crate::RestreamClient::events
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The transport opened.
    Open,
    /// The transport closed, gracefully or not.
    Close { code: u16, reason: String },
    /// Low-level socket error; non-fatal, the close event drives recovery.
    SocketError(String),
    /// A keepalive ping was sent.
    Ping,
    /// The server acknowledged a ping.
    Pong,
    /// A well-formed control message other than `pong`.
    Control(serde_json::Value),
    /// A decoded binary frame.
    Message(MessageEvent),
    /// A subscribe message was sent for a channel.
    Subscribed { channel: String },
    /// An unsubscribe message was sent for a channel.
    Unsubscribed { channel: String },
    /// A reconnection attempt was scheduled.
    Reconnecting { attempt: u32, delay_ms: u64 },
    /// A reconnection attempt succeeded.
    Reconnected { attempts: u32 },
    /// A reconnection attempt failed; another one is scheduled.
    ReconnectError(String),
    /// A subscription handler panicked; other handlers still ran.
    HandlerError(String),
    /// Internal diagnostic for contained failures.
    ClientError {
        message: String,
        context: String,
        timestamp: DateTime<Utc>,
    },
}

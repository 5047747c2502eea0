//! Streaming client: connection lifecycle, subscriptions, and dispatch.

mod connection;
mod dispatch;
mod events;
mod keepalive;
mod reconnect;
mod subscriptions;

pub use connection::ConnectionState;
pub use events::{ClientEvent, EventMeta, MessageEvent};
pub use subscriptions::SubscriptionHandler;

use crate::config::RestreamConfig;
use crate::error::{RestreamError, RestreamResult};
use crate::protocol::{DecodeError, DecodedEvent};
use connection::ClientCore;
use std::fmt;
use std::sync::Arc;
use subscriptions::handler_key;
use tokio::sync::broadcast;

/// Launchpads with a dedicated launch-event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Launchpad {
    #[default]
    Bags,
}

impl Launchpad {
    /// The channel subject used for this launchpad's launches.
    pub fn subject(self) -> &'static str {
        match self {
            Launchpad::Bags => "BAGS",
        }
    }
}

/// A resilient streaming client for the real-time event feed.
///
/// Maintains one long-lived WebSocket connection, reconnects with
/// exponential backoff after unexpected drops, re-establishes tracked
/// channels on every reconnect, and fans decoded events out to registered
/// handlers.
///
/// # Example
///
/// ```no_run
/// use restream_client::{RestreamClient, RestreamConfig};
///
/// # async fn run() -> Result<(), restream_client::RestreamError> {
/// let client = RestreamClient::new(RestreamConfig::default());
/// client.connect().await?;
///
/// let subscription = client.subscribe("swap:*", |event, meta| {
///     println!("swap on {}: {:?}", meta.channel, event);
/// })?;
///
/// // ... later
/// subscription.unsubscribe();
/// client.disconnect(1000, "client closing").await;
/// # Ok(())
/// # }
/// ```
pub struct RestreamClient {
    core: Arc<ClientCore>,
}

impl RestreamClient {
    /// Create a client. No connection is made until [`connect`] is called.
    ///
    /// [`connect`]: RestreamClient::connect
    pub fn new(config: RestreamConfig) -> Self {
        Self {
            core: ClientCore::new(config),
        }
    }

    /// Connect to the endpoint. Does nothing if already connected.
    ///
    /// Resolves once the transport is open; fails with
    /// [`RestreamError::ConnectTimeout`] when the handshake does not
    /// complete within `connect_timeout_ms`. A failed call does not retry
    /// by itself: automatic reconnection only engages after a previously
    /// successful connection is lost.
    pub async fn connect(&self) -> RestreamResult<()> {
        self.core.connect().await
    }

    /// Disconnect and disable automatic reconnection.
    ///
    /// Resolves once the transport has closed, or immediately when there is
    /// nothing to close.
    pub async fn disconnect(&self, code: u16, reason: &str) {
        self.core.disconnect(code, reason).await;
    }

    /// Subscribe to observability notifications.
    ///
    /// Every receiver sees the full stream from the point of subscription;
    /// slow receivers may observe lagged gaps.
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.core.events.subscribe()
    }

    /// Current connection lifecycle state.
    pub fn connection_state(&self) -> ConnectionState {
        self.core.phase.borrow().clone()
    }

    /// Whether the transport is currently open.
    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Subscribe a handler to a full channel string, e.g. `"swap:ABC"` or
    /// `"price:*"`.
    ///
    /// Enforces the distinct-channel and wildcard quotas; re-subscribing to
    /// an already-tracked channel never counts against them. Returns a
    /// [`Subscription`] that detaches the handler when consumed; dropping
    /// it without calling [`Subscription::unsubscribe`] leaves the
    /// subscription active for the lifetime of the client.
    pub fn subscribe<F>(&self, channel: &str, handler: F) -> RestreamResult<Subscription>
    where
        F: Fn(&DecodedEvent, &EventMeta) + Send + Sync + 'static,
    {
        self.subscribe_handler(channel, Arc::new(handler))
    }

    /// Subscribe with a pre-built handler.
    ///
    /// Registering the same `Arc` on an exact channel and its wildcard
    /// counterpart delivers each frame to it once.
    pub fn subscribe_handler(
        &self,
        channel: &str,
        handler: SubscriptionHandler,
    ) -> RestreamResult<Subscription> {
        self.core.subscribe_channel(channel, handler.clone())?;
        Ok(Subscription {
            core: self.core.clone(),
            channel: channel.to_string(),
            handler,
        })
    }

    /// Subscribe to a topic and subject; `"*"` subscribes to every subject
    /// under the topic.
    pub fn subscribe_topic<F>(
        &self,
        topic: &str,
        subject: &str,
        handler: F,
    ) -> RestreamResult<Subscription>
    where
        F: Fn(&DecodedEvent, &EventMeta) + Send + Sync + 'static,
    {
        self.subscribe(&format!("{topic}:{subject}"), handler)
    }

    /// Subscribe to swap events for a token address.
    pub fn subscribe_token_swaps<F>(
        &self,
        token_address: &str,
        handler: F,
    ) -> RestreamResult<Subscription>
    where
        F: Fn(&DecodedEvent, &EventMeta) + Send + Sync + 'static,
    {
        let address = validate_address(token_address)?;
        self.subscribe(&format!("swap:{address}"), handler)
    }

    /// Subscribe to price events for a token address.
    pub fn subscribe_token_price<F>(
        &self,
        token_address: &str,
        handler: F,
    ) -> RestreamResult<Subscription>
    where
        F: Fn(&DecodedEvent, &EventMeta) + Send + Sync + 'static,
    {
        let address = validate_address(token_address)?;
        self.subscribe(&format!("price:{address}"), handler)
    }

    /// Subscribe to actions of a maker wallet.
    pub fn subscribe_maker_actions<F>(
        &self,
        maker_address: &str,
        handler: F,
    ) -> RestreamResult<Subscription>
    where
        F: Fn(&DecodedEvent, &EventMeta) + Send + Sync + 'static,
    {
        let address = validate_address(maker_address)?;
        self.subscribe(&format!("maker_action:{address}"), handler)
    }

    /// Subscribe to launch events of a launchpad.
    pub fn subscribe_launchpad_launches<F>(
        &self,
        launchpad: Launchpad,
        handler: F,
    ) -> RestreamResult<Subscription>
    where
        F: Fn(&DecodedEvent, &EventMeta) + Send + Sync + 'static,
    {
        self.subscribe(&format!("launchpad_launch:{}", launchpad.subject()), handler)
    }

    /// Subscribe to BAGS launch events.
    pub fn subscribe_bags_launches<F>(&self, handler: F) -> RestreamResult<Subscription>
    where
        F: Fn(&DecodedEvent, &EventMeta) + Send + Sync + 'static,
    {
        self.subscribe_launchpad_launches(Launchpad::Bags, handler)
    }

    /// Register (or replace) the payload decoder for a topic.
    ///
    /// Decoders must be synchronous and fast; they run on the dispatch
    /// path. Without a decoder, a topic's payloads are delivered as
    /// [`DecodedEvent::Raw`].
    pub fn register_decoder<F>(&self, topic: &str, decoder: F)
    where
        F: Fn(&[u8]) -> Result<DecodedEvent, DecodeError> + Send + Sync + 'static,
    {
        self.core.set_decoder(topic, Arc::new(decoder));
    }
}

impl Drop for RestreamClient {
    fn drop(&mut self) {
        // Background tasks hold the core alive; stop them so a dropped
        // client does not keep reconnecting. Graceful shutdown requires an
        // explicit disconnect().
        self.core.shutdown();
    }
}

/// Unsubscribe capability returned by the subscribe methods.
pub struct Subscription {
    core: Arc<ClientCore>,
    channel: String,
    handler: SubscriptionHandler,
}

impl Subscription {
    /// The channel this subscription is registered on.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Detach the handler. When it was the channel's last handler, the
    /// channel leaves the tracked set and a server-side unsubscribe is
    /// sent.
    pub fn unsubscribe(self) {
        self.core.remove_handler(&self.channel, handler_key(&self.handler));
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .finish()
    }
}

/// Validate a base58-encoded 32-byte address.
fn validate_address(address: &str) -> Result<&str, RestreamError> {
    let decoded = bs58::decode(address)
        .into_vec()
        .map_err(|_| RestreamError::InvalidAddress(address.to_string()))?;
    if decoded.len() != 32 {
        return Err(RestreamError::InvalidAddress(address.to_string()));
    }
    Ok(address)
}

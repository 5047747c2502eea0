//! Resilient WebSocket streaming client for real-time Solana DeFi event
//! feeds.
//!
//! # Overview
//!
//! This crate provides a publish/subscribe client that:
//! - maintains one long-lived WebSocket connection per client instance
//! - reconnects automatically with jittered exponential backoff after an
//!   unexpected drop, replaying every tracked channel
//! - parses the feed's length-prefixed binary frames into typed events via
//!   a per-topic decoder registry
//! - fans decoded events out to channel handlers, including `topic:*`
//!   wildcard subscriptions, with per-handler failure isolation
//! - enforces subscription quotas client-side
//!
//! # Quick Start
//!
//! ```no_run
//! use restream_client::{protocol::decoders, RestreamClient, RestreamConfig};
//!
//! # async fn run() -> Result<(), restream_client::RestreamError> {
//! let client = RestreamClient::new(RestreamConfig::default());
//!
//! // Swap payloads are protobuf; opt in to decoding them.
//! client.register_decoder("swap", decoders::swap_event);
//!
//! client.connect().await?;
//!
//! let swaps = client.subscribe_topic("swap", "*", |event, meta| {
//!     println!("swap on {}: {event:?}", meta.channel);
//! })?;
//!
//! let launches = client.subscribe_bags_launches(|event, _meta| {
//!     println!("new launch: {event:?}");
//! })?;
//!
//! // ... later
//! swaps.unsubscribe();
//! launches.unsubscribe();
//! client.disconnect(1000, "client closing").await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;

pub use client::{
    ClientEvent, ConnectionState, EventMeta, Launchpad, MessageEvent, RestreamClient,
    Subscription, SubscriptionHandler,
};
pub use config::{ReconnectPolicy, RestreamConfig};
pub use error::{RestreamError, RestreamResult};
pub use protocol::{DecodeError, DecodedEvent};

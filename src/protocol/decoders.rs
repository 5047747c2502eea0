//! Per-topic payload decoders.
//!
//! The registry maps a topic to a pure, synchronous decode function. It is
//! seeded with the default set and can be extended at runtime. Decoders
//! must not block; a failed decode drops the frame before dispatch.

use super::events::{
    DecodedEvent, DexPriceEvent, DexSwapEvent, LaunchpadLaunchEvent, MakerActionEvent,
};
use prost::Message;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors a decode function may produce.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("protobuf decode failed: {0}")]
    Protobuf(#[from] prost::DecodeError),
    #[error("json decode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

/// A pure payload decode function.
pub type DecoderFn = Arc<dyn Fn(&[u8]) -> Result<DecodedEvent, DecodeError> + Send + Sync>;

/// Topic-keyed decoder table owned by a client instance.
pub struct DecoderRegistry {
    by_topic: HashMap<String, DecoderFn>,
}

impl DecoderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            by_topic: HashMap::new(),
        }
    }

    /// The default decoder set.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("launchpad_launch", Arc::new(launchpad_launch_event));
        registry
    }

    /// Register (or replace) the decoder for a topic.
    pub fn register(&mut self, topic: &str, decoder: DecoderFn) {
        self.by_topic.insert(topic.to_string(), decoder);
    }

    /// Look up the decoder for a topic.
    pub fn get(&self, topic: &str) -> Option<DecoderFn> {
        self.by_topic.get(topic).cloned()
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Decode a `launchpad_launch` payload.
pub fn launchpad_launch_event(payload: &[u8]) -> Result<DecodedEvent, DecodeError> {
    Ok(DecodedEvent::LaunchpadLaunch(LaunchpadLaunchEvent::decode(
        payload,
    )?))
}

/// Decode a `swap` payload.
pub fn swap_event(payload: &[u8]) -> Result<DecodedEvent, DecodeError> {
    Ok(DecodedEvent::Swap(DexSwapEvent::decode(payload)?))
}

/// Decode a `price` payload.
pub fn price_event(payload: &[u8]) -> Result<DecodedEvent, DecodeError> {
    Ok(DecodedEvent::Price(DexPriceEvent::decode(payload)?))
}

/// Decode a `maker_action` payload.
pub fn maker_action_event(payload: &[u8]) -> Result<DecodedEvent, DecodeError> {
    Ok(DecodedEvent::MakerAction(MakerActionEvent::decode(payload)?))
}

/// Decode a UTF-8 JSON payload.
pub fn json_event(payload: &[u8]) -> Result<DecodedEvent, DecodeError> {
    Ok(DecodedEvent::Json(serde_json::from_slice(payload)?))
}

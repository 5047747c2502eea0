//! Typed event payloads carried in binary frames.
//!
//! Payloads are protobuf-encoded per topic. The message definitions here
//! mirror the feed's published schema; unknown topics fall back to raw
//! bytes via [`DecodedEvent::Raw`].

use bytes::Bytes;

/// A token launch published by a launchpad.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LaunchpadLaunchEvent {
    /// Launchpad identifier, e.g. `BAGS`.
    #[prost(string, tag = "1")]
    pub launchpad: ::prost::alloc::string::String,
    /// Base58 mint address of the launched token.
    #[prost(string, tag = "2")]
    pub token_mint: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub symbol: ::prost::alloc::string::String,
    /// Metadata URI.
    #[prost(string, tag = "5")]
    pub uri: ::prost::alloc::string::String,
    /// Base58 creator address.
    #[prost(string, tag = "6")]
    pub creator: ::prost::alloc::string::String,
    /// Unix timestamp in milliseconds.
    #[prost(uint64, tag = "7")]
    pub timestamp_ms: u64,
}

/// A swap executed against a DEX pool.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DexSwapEvent {
    /// Base58 mint address of the traded token.
    #[prost(string, tag = "1")]
    pub token_mint: ::prost::alloc::string::String,
    /// Base58 address of the pool the swap executed against.
    #[prost(string, tag = "2")]
    pub pool: ::prost::alloc::string::String,
    /// Base58 wallet address of the trader.
    #[prost(string, tag = "3")]
    pub trader: ::prost::alloc::string::String,
    /// Token amount in base units.
    #[prost(uint64, tag = "4")]
    pub base_amount: u64,
    /// Quote amount in lamports.
    #[prost(uint64, tag = "5")]
    pub quote_amount: u64,
    /// True for a buy, false for a sell.
    #[prost(bool, tag = "6")]
    pub is_buy: bool,
    /// Execution price in quote units per token.
    #[prost(double, tag = "7")]
    pub price: f64,
    /// Unix timestamp in milliseconds.
    #[prost(uint64, tag = "8")]
    pub timestamp_ms: u64,
}

/// A price update for a token.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DexPriceEvent {
    /// Base58 mint address of the token.
    #[prost(string, tag = "1")]
    pub token_mint: ::prost::alloc::string::String,
    #[prost(double, tag = "2")]
    pub price_usd: f64,
    #[prost(double, tag = "3")]
    pub price_sol: f64,
    /// Unix timestamp in milliseconds.
    #[prost(uint64, tag = "4")]
    pub timestamp_ms: u64,
}

/// An action taken by a tracked maker wallet.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MakerActionEvent {
    /// Base58 wallet address of the maker.
    #[prost(string, tag = "1")]
    pub maker: ::prost::alloc::string::String,
    /// Base58 mint address of the token acted on.
    #[prost(string, tag = "2")]
    pub token_mint: ::prost::alloc::string::String,
    /// Action kind, e.g. `buy`, `sell`.
    #[prost(string, tag = "3")]
    pub action: ::prost::alloc::string::String,
    /// Amount in base units.
    #[prost(uint64, tag = "4")]
    pub amount: u64,
    /// Unix timestamp in milliseconds.
    #[prost(uint64, tag = "5")]
    pub timestamp_ms: u64,
}

/// A decoded frame payload, as delivered to subscription handlers.
///
/// A registry miss delivers the payload un-decoded as [`DecodedEvent::Raw`];
/// custom decoders may produce any variant.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedEvent {
    LaunchpadLaunch(LaunchpadLaunchEvent),
    Swap(DexSwapEvent),
    Price(DexPriceEvent),
    MakerAction(MakerActionEvent),
    /// Arbitrary JSON, for topics using a JSON payload encoding.
    Json(serde_json::Value),
    /// Raw payload bytes, delivered when no decoder is registered.
    Raw(Bytes),
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_launch_event_roundtrip() {
        let event = LaunchpadLaunchEvent {
            launchpad: "BAGS".to_string(),
            token_mint: "3HP2Gg5sTaNta2ztzrRCA63btYSeyptASkGLcyQXWfBU".to_string(),
            name: "Example".to_string(),
            symbol: "EXM".to_string(),
            uri: "https://example.com/meta.json".to_string(),
            creator: "BAGSB9TpGrZxQbEsrEznv5jXXdwyP6AXerN8aVRiAmcv".to_string(),
            timestamp_ms: 1_700_000_000_000,
        };
        let mut buf = Vec::new();
        event.encode(&mut buf).unwrap();
        let decoded = LaunchpadLaunchEvent::decode(buf.as_slice()).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_swap_event_defaults() {
        // An empty buffer decodes to all-default fields.
        let decoded = DexSwapEvent::decode(&[][..]).unwrap();
        assert_eq!(decoded.token_mint, "");
        assert_eq!(decoded.base_amount, 0);
        assert!(!decoded.is_buy);
    }
}

//! Wire protocol: binary event frames, varint length prefixes, control
//! messages, and per-topic payload decoders.

pub mod decoders;
pub mod events;
pub mod frame;
pub mod messages;
pub mod varint;

pub use decoders::{DecodeError, DecoderFn, DecoderRegistry};
pub use events::{
    DecodedEvent, DexPriceEvent, DexSwapEvent, LaunchpadLaunchEvent, MakerActionEvent,
};
pub use frame::{is_wildcard, split_channel, Frame, FrameError};
pub use messages::ControlMessage;

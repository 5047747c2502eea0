//! Binary event frame parsing.
//!
//! A frame is `<channel-ascii> ';' <uvarint length> <payload bytes>`. The
//! channel is `topic:subject`, split at the first `:`; a subject of `*`
//! marks a wildcard channel. Malformed frames never reach dispatch.

use super::varint::{decode_uvarint, VarintError};
use thiserror::Error;

/// Byte separating the channel string from the length-prefixed payload.
pub const CHANNEL_SEPARATOR: u8 = b';';

/// Frame parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// No `;` separator anywhere in the frame.
    #[error("missing channel separator")]
    MissingSeparator,
    /// The channel bytes are not valid UTF-8.
    #[error("channel is not valid UTF-8")]
    InvalidChannel,
    /// The length prefix is truncated or overflows.
    #[error("length prefix: {0}")]
    Varint(#[from] VarintError),
    /// The declared payload length reads past the end of the frame.
    #[error("declared payload length {declared} exceeds {available} available bytes")]
    LengthOutOfBounds { declared: u64, available: usize },
}

/// A parsed frame, borrowing from the raw transport message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    pub channel: &'a str,
    pub payload: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Parse a raw transport message into channel and payload.
    ///
    /// Bytes after the declared payload length are ignored.
    pub fn parse(raw: &'a [u8]) -> Result<Self, FrameError> {
        let sep = raw
            .iter()
            .position(|&b| b == CHANNEL_SEPARATOR)
            .ok_or(FrameError::MissingSeparator)?;
        let channel =
            std::str::from_utf8(&raw[..sep]).map_err(|_| FrameError::InvalidChannel)?;
        let rest = &raw[sep + 1..];

        let (declared, consumed) = decode_uvarint(rest)?;
        let available = rest.len() - consumed;
        if declared > available as u64 {
            return Err(FrameError::LengthOutOfBounds {
                declared,
                available,
            });
        }
        let payload = &rest[consumed..consumed + declared as usize];
        Ok(Frame { channel, payload })
    }
}

/// Split a channel into `(topic, subject)` at the first `:`.
///
/// A channel without `:` has an empty subject.
pub fn split_channel(channel: &str) -> (&str, &str) {
    match channel.split_once(':') {
        Some((topic, subject)) => (topic, subject),
        None => (channel, ""),
    }
}

/// Whether a channel subscribes to every subject under its topic.
pub fn is_wildcard(channel: &str) -> bool {
    channel.ends_with(":*")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::varint::encode_uvarint;

    fn build_frame(channel: &str, payload: &[u8]) -> Vec<u8> {
        let mut raw = channel.as_bytes().to_vec();
        raw.push(CHANNEL_SEPARATOR);
        encode_uvarint(payload.len() as u64, &mut raw);
        raw.extend_from_slice(payload);
        raw
    }

    #[test]
    fn test_parse_frame() {
        let raw = build_frame("swap:ABC", b"abc");
        let frame = Frame::parse(&raw).unwrap();
        assert_eq!(frame.channel, "swap:ABC");
        assert_eq!(frame.payload, b"abc");
    }

    #[test]
    fn test_parse_empty_payload() {
        let raw = build_frame("price:XYZ", b"");
        let frame = Frame::parse(&raw).unwrap();
        assert_eq!(frame.payload, b"");
    }

    #[test]
    fn test_missing_separator() {
        assert_eq!(
            Frame::parse(b"swap:ABC no separator"),
            Err(FrameError::MissingSeparator)
        );
    }

    #[test]
    fn test_truncated_varint() {
        let raw = [b"swap:ABC;".as_slice(), &[0x80]].concat();
        assert_eq!(
            Frame::parse(&raw),
            Err(FrameError::Varint(VarintError::Truncated))
        );
    }

    #[test]
    fn test_declared_length_beyond_buffer() {
        let mut raw = b"swap:ABC;".to_vec();
        encode_uvarint(100, &mut raw);
        raw.extend_from_slice(b"abc");
        assert_eq!(
            Frame::parse(&raw),
            Err(FrameError::LengthOutOfBounds {
                declared: 100,
                available: 3
            })
        );
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut raw = build_frame("swap:ABC", b"abc");
        raw.extend_from_slice(b"trailing junk");
        let frame = Frame::parse(&raw).unwrap();
        assert_eq!(frame.payload, b"abc");
    }

    #[test]
    fn test_non_utf8_channel() {
        let raw = [&[0xff, 0xfe][..], b";\x00"].concat();
        assert_eq!(Frame::parse(&raw), Err(FrameError::InvalidChannel));
    }

    #[test]
    fn test_split_channel() {
        assert_eq!(split_channel("swap:ABC"), ("swap", "ABC"));
        assert_eq!(split_channel("swap:*"), ("swap", "*"));
        assert_eq!(split_channel("heartbeat"), ("heartbeat", ""));
        // Only the first colon splits.
        assert_eq!(split_channel("a:b:c"), ("a", "b:c"));
    }

    #[test]
    fn test_is_wildcard() {
        assert!(is_wildcard("swap:*"));
        assert!(!is_wildcard("swap:ABC"));
        assert!(!is_wildcard("swap"));
        assert!(!is_wildcard("*"));
    }
}

//! Structured control messages exchanged as text frames.
//!
//! The client sends `ping`, `subscribe`, and `unsubscribe`; the server
//! answers pings with `pong`. Any other well-formed JSON text frame is
//! surfaced to observers unparsed.

use serde::{Deserialize, Serialize};

/// A control message in its wire form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    Ping,
    Pong,
    Subscribe { event: String },
    Unsubscribe { event: String },
}

impl ControlMessage {
    /// Serialize to the JSON text sent over the transport.
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).expect("control message serialization is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        assert_eq!(ControlMessage::Ping.to_text(), r#"{"type":"ping"}"#);
        assert_eq!(
            ControlMessage::Subscribe {
                event: "swap:ABC".to_string()
            }
            .to_text(),
            r#"{"type":"subscribe","event":"swap:ABC"}"#
        );
        assert_eq!(
            ControlMessage::Unsubscribe {
                event: "price:*".to_string()
            }
            .to_text(),
            r#"{"type":"unsubscribe","event":"price:*"}"#
        );
    }

    #[test]
    fn test_parse_pong() {
        let msg: ControlMessage = serde_json::from_str(r#"{"type":"pong"}"#).unwrap();
        assert_eq!(msg, ControlMessage::Pong);
    }

    #[test]
    fn test_unknown_type_is_not_a_control_message() {
        assert!(serde_json::from_str::<ControlMessage>(r#"{"type":"notice"}"#).is_err());
    }
}

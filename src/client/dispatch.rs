//! Frame dispatch and control-message handling.
//!
//! Each binary frame is parsed, decoded by topic, and fanned out to the
//! exact channel's handlers and then to `topic:*` handlers that have not
//! already been invoked. Handlers and decoders run outside the state lock,
//! and every handler invocation is individually isolated: a panic is
//! reported and the remaining handlers still run.

use super::connection::ClientCore;
use super::events::{ClientEvent, EventMeta, MessageEvent};
use super::subscriptions::{handler_key, SubscriptionHandler};
use crate::protocol::{split_channel, DecodedEvent, Frame, FrameError};
use bytes::Bytes;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Process one binary transport message.
pub(crate) fn dispatch_frame(core: &Arc<ClientCore>, raw: &[u8]) {
    let frame = match Frame::parse(raw) {
        Ok(frame) => frame,
        // No separator means this is not an event frame at all.
        Err(FrameError::MissingSeparator) => return,
        Err(e) => {
            core.diagnostic("frame decode error", e.to_string());
            return;
        }
    };
    let (topic, subject) = split_channel(frame.channel);

    let decoder = { core.state.lock().unwrap().decoders.get(topic) };
    let decoded = match decoder {
        Some(decoder) => match decoder.as_ref()(frame.payload) {
            Ok(value) => value,
            Err(e) => {
                core.diagnostic("decoder error", format!("channel={}: {e}", frame.channel));
                return;
            }
        },
        None => DecodedEvent::Raw(Bytes::copy_from_slice(frame.payload)),
    };
    let meta = EventMeta {
        channel: frame.channel.to_string(),
        topic: topic.to_string(),
        subject: subject.to_string(),
    };

    // Exact channel first, tracking identities to prevent double delivery
    // to a handler also registered on the wildcard channel.
    let mut delivered: Vec<usize> = Vec::new();
    let exact = { core.state.lock().unwrap().subs.handlers_for(frame.channel) };
    if let Some(handlers) = exact {
        for handler in &handlers {
            delivered.push(handler_key(handler));
            invoke_handler(core, handler, &decoded, &meta);
        }
    }

    let wildcard = format!("{topic}:*");
    if wildcard != frame.channel {
        let wild = { core.state.lock().unwrap().subs.handlers_for(&wildcard) };
        if let Some(handlers) = wild {
            for handler in &handlers {
                if delivered.contains(&handler_key(handler)) {
                    continue;
                }
                invoke_handler(core, handler, &decoded, &meta);
            }
        }
    }

    core.emit(ClientEvent::Message(MessageEvent {
        channel: meta.channel.clone(),
        topic: meta.topic.clone(),
        subject: meta.subject.clone(),
        payload: Bytes::copy_from_slice(frame.payload),
        decoded,
    }));
}

fn invoke_handler(
    core: &Arc<ClientCore>,
    handler: &SubscriptionHandler,
    decoded: &DecodedEvent,
    meta: &EventMeta,
) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler.as_ref()(decoded, meta))) {
        let detail = panic_detail(panic);
        core.emit(ClientEvent::HandlerError(detail.clone()));
        core.diagnostic("handler error", format!("channel={}: {detail}", meta.channel));
    }
}

fn panic_detail(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Process one text transport message.
///
/// Text frames carry JSON control messages: `pong` is recognized, any other
/// well-formed message is surfaced generically, non-JSON text is ignored.
pub(crate) fn handle_control(core: &Arc<ClientCore>, text: &str) {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
        return;
    };
    if value.get("type").and_then(|t| t.as_str()) == Some("pong") {
        core.emit(ClientEvent::Pong);
    } else {
        core.emit(ClientEvent::Control(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RestreamConfig;
    use crate::protocol::decoders::swap_event;
    use crate::protocol::events::DexSwapEvent;
    use crate::protocol::varint::encode_uvarint;
    use prost::Message;
    use std::sync::mpsc;
    use tokio::sync::broadcast::error::TryRecvError;

    fn test_core() -> Arc<ClientCore> {
        ClientCore::new(RestreamConfig::default())
    }

    fn build_frame(channel: &str, payload: &[u8]) -> Vec<u8> {
        let mut raw = channel.as_bytes().to_vec();
        raw.push(b';');
        encode_uvarint(payload.len() as u64, &mut raw);
        raw.extend_from_slice(payload);
        raw
    }

    fn capture_handler(tx: mpsc::Sender<(DecodedEvent, EventMeta)>) -> SubscriptionHandler {
        Arc::new(move |decoded, meta| {
            tx.send((decoded.clone(), meta.clone())).unwrap();
        })
    }

    fn encoded_swap() -> (DexSwapEvent, Vec<u8>) {
        let event = DexSwapEvent {
            token_mint: "ABC".to_string(),
            is_buy: true,
            base_amount: 42,
            ..Default::default()
        };
        let mut buf = Vec::new();
        event.encode(&mut buf).unwrap();
        (event, buf)
    }

    #[test]
    fn test_exact_and_wildcard_delivery_without_duplicates() {
        let core = test_core();
        core.set_decoder("swap", Arc::new(swap_event));

        let (tx, rx) = mpsc::channel();
        let shared = capture_handler(tx.clone());
        // Same handler on both channels, plus a distinct wildcard handler.
        core.subscribe_channel("swap:ABC", shared.clone()).unwrap();
        core.subscribe_channel("swap:*", shared.clone()).unwrap();
        let (wild_tx, wild_rx) = mpsc::channel();
        core.subscribe_channel("swap:*", capture_handler(wild_tx))
            .unwrap();

        let (event, payload) = encoded_swap();
        dispatch_frame(&core, &build_frame("swap:ABC", &payload));

        // The shared handler ran exactly once.
        let (decoded, meta) = rx.try_recv().unwrap();
        assert_eq!(decoded, DecodedEvent::Swap(event.clone()));
        assert_eq!(meta.channel, "swap:ABC");
        assert_eq!(meta.topic, "swap");
        assert_eq!(meta.subject, "ABC");
        assert!(rx.try_recv().is_err());

        // The wildcard-only handler ran once with the exact-channel meta.
        let (_, meta) = wild_rx.try_recv().unwrap();
        assert_eq!(meta.channel, "swap:ABC");
        assert!(wild_rx.try_recv().is_err());
    }

    #[test]
    fn test_wildcard_channel_frame_not_delivered_twice() {
        let core = test_core();
        let (tx, rx) = mpsc::channel();
        core.subscribe_channel("price:*", capture_handler(tx)).unwrap();

        // A frame addressed to the wildcard channel itself.
        dispatch_frame(&core, &build_frame("price:*", b"x"));
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_message_event_emitted_without_handlers() {
        let core = test_core();
        let mut events = core.events.subscribe();
        dispatch_frame(&core, &build_frame("price:XYZ", b"raw"));

        match events.try_recv().unwrap() {
            ClientEvent::Message(message) => {
                assert_eq!(message.channel, "price:XYZ");
                assert_eq!(message.payload.as_ref(), b"raw");
                assert_eq!(message.decoded, DecodedEvent::Raw(Bytes::from_static(b"raw")));
            }
            other => panic!("expected message event, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        let core = test_core();
        let (tx, rx) = mpsc::channel();
        core.subscribe_channel("swap:ABC", capture_handler(tx)).unwrap();
        let mut events = core.events.subscribe();

        // No separator: silent drop, no diagnostic.
        dispatch_frame(&core, b"swap:ABC no separator");
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

        // Truncated varint and overlong declared length: diagnostic drop.
        dispatch_frame(&core, &[b"swap:ABC;".as_slice(), &[0x80]].concat());
        let mut overlong = b"swap:ABC;".to_vec();
        encode_uvarint(100, &mut overlong);
        overlong.extend_from_slice(b"abc");
        dispatch_frame(&core, &overlong);

        assert!(rx.try_recv().is_err());
        assert!(matches!(
            events.try_recv().unwrap(),
            ClientEvent::ClientError { .. }
        ));
        assert!(matches!(
            events.try_recv().unwrap(),
            ClientEvent::ClientError { .. }
        ));
    }

    #[test]
    fn test_decoder_failure_drops_frame() {
        let core = test_core();
        core.set_decoder("swap", Arc::new(swap_event));
        let (tx, rx) = mpsc::channel();
        core.subscribe_channel("swap:ABC", capture_handler(tx)).unwrap();
        let mut events = core.events.subscribe();

        // 0xff alone is a truncated protobuf varint key.
        dispatch_frame(&core, &build_frame("swap:ABC", &[0xff]));

        assert!(rx.try_recv().is_err());
        assert!(matches!(
            events.try_recv().unwrap(),
            ClientEvent::ClientError { .. }
        ));
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_handler_panic_is_isolated() {
        let core = test_core();
        core.subscribe_channel("swap:ABC", Arc::new(|_, _| panic!("boom")))
            .unwrap();
        let (tx, rx) = mpsc::channel();
        core.subscribe_channel("swap:ABC", capture_handler(tx)).unwrap();
        let mut events = core.events.subscribe();

        dispatch_frame(&core, &build_frame("swap:ABC", b"x"));

        // The second handler still ran.
        assert!(rx.try_recv().is_ok());
        assert!(matches!(
            events.try_recv().unwrap(),
            ClientEvent::HandlerError(detail) if detail == "boom"
        ));
    }

    #[test]
    fn test_control_messages() {
        let core = test_core();
        let mut events = core.events.subscribe();

        handle_control(&core, r#"{"type":"pong"}"#);
        assert!(matches!(events.try_recv().unwrap(), ClientEvent::Pong));

        handle_control(&core, r#"{"type":"notice","detail":"maintenance"}"#);
        match events.try_recv().unwrap() {
            ClientEvent::Control(value) => assert_eq!(value["type"], "notice"),
            other => panic!("expected control event, got {other:?}"),
        }

        // Non-JSON text frames are ignored.
        handle_control(&core, "hello");
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }
}

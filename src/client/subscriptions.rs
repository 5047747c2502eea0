//! Local subscription bookkeeping.
//!
//! Tracks the handler set per channel, the server-facing reference count
//! that decides when subscribe/unsubscribe wire messages are due, and the
//! queue of channels waiting for the transport to open. Pure state — wire
//! I/O stays in the connection layer.

use super::events::EventMeta;
use crate::config::RestreamConfig;
use crate::error::RestreamError;
use crate::protocol::{is_wildcard, DecodedEvent};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// A subscription callback.
///
/// Handlers run on the dispatch path and must not block. A panicking
/// handler is isolated and reported, never fatal.
pub type SubscriptionHandler = Arc<dyn Fn(&DecodedEvent, &EventMeta) + Send + Sync>;

/// Identity key for a handler, used to prevent double delivery when the
/// same handler is registered on both an exact and a wildcard channel.
pub(crate) fn handler_key(handler: &SubscriptionHandler) -> usize {
    Arc::as_ptr(handler) as *const () as usize
}

/// Outcome of removing a handler from a channel.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum RemoveOutcome {
    /// The channel had no handlers registered.
    NoSuchChannel,
    /// The handler was detached; the channel keeps other handlers or refs.
    Removed,
    /// The last reference is gone: the channel left the tracked set and a
    /// server-side unsubscribe is due.
    UnsubscribeDue,
}

/// Per-client subscription state.
pub(crate) struct SubscriptionRegistry {
    /// Channel -> registered handlers, in registration order.
    handlers: HashMap<String, Vec<SubscriptionHandler>>,
    /// Channel -> count of handlers justifying a server-side subscription.
    server_refs: HashMap<String, u32>,
    /// Channels awaiting a subscribe message, FIFO.
    pending: VecDeque<String>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            server_refs: HashMap::new(),
            pending: VecDeque::new(),
        }
    }

    /// Enforce subscription quotas.
    ///
    /// Only new distinct channels count; attaching another handler to an
    /// already-known channel always passes.
    pub fn check_limits(&self, channel: &str, config: &RestreamConfig) -> Result<(), RestreamError> {
        let is_new = !self.handlers.contains_key(channel);
        if is_new && self.handlers.len() >= config.max_subscriptions {
            return Err(RestreamError::SubscriptionLimit(config.max_subscriptions));
        }
        if is_new && is_wildcard(channel) {
            let wildcards = self.handlers.keys().filter(|c| is_wildcard(c)).count();
            if wildcards >= config.max_wildcard_subscriptions {
                return Err(RestreamError::WildcardSubscriptionLimit(
                    config.max_wildcard_subscriptions,
                ));
            }
        }
        Ok(())
    }

    /// Register a handler on a channel.
    pub fn register(&mut self, channel: &str, handler: SubscriptionHandler) {
        self.handlers
            .entry(channel.to_string())
            .or_default()
            .push(handler);
    }

    /// Detach a handler and update the reference count.
    pub fn remove(&mut self, channel: &str, key: usize) -> RemoveOutcome {
        let Some(list) = self.handlers.get_mut(channel) else {
            return RemoveOutcome::NoSuchChannel;
        };
        if let Some(pos) = list.iter().position(|h| handler_key(h) == key) {
            list.remove(pos);
        }

        if list.is_empty() {
            self.handlers.remove(channel);
            let count = self
                .server_refs
                .get(channel)
                .copied()
                .unwrap_or(1)
                .saturating_sub(1);
            if count == 0 {
                self.server_refs.remove(channel);
                return RemoveOutcome::UnsubscribeDue;
            }
            self.server_refs.insert(channel.to_string(), count);
        } else {
            let count = self
                .server_refs
                .get(channel)
                .copied()
                .unwrap_or(1)
                .saturating_sub(1);
            self.server_refs.insert(channel.to_string(), count);
        }
        RemoveOutcome::Removed
    }

    /// Server-side reference count for a channel.
    pub fn ref_count(&self, channel: &str) -> u32 {
        self.server_refs.get(channel).copied().unwrap_or(0)
    }

    /// Count one more handler toward the channel's server subscription.
    pub fn incr_ref(&mut self, channel: &str) {
        *self.server_refs.entry(channel.to_string()).or_insert(0) += 1;
    }

    /// Queue a channel until the transport opens.
    pub fn push_pending(&mut self, channel: &str) {
        self.pending.push_back(channel.to_string());
    }

    /// Drain the pending queue in insertion order.
    pub fn take_pending(&mut self) -> Vec<String> {
        self.pending.drain(..).collect()
    }

    /// Channels with a nonzero reference count; exactly the set replayed
    /// on reconnect.
    pub fn tracked_channels(&self) -> Vec<String> {
        self.server_refs.keys().cloned().collect()
    }

    /// Snapshot the handlers registered on a channel.
    pub fn handlers_for(&self, channel: &str) -> Option<Vec<SubscriptionHandler>> {
        self.handlers.get(channel).cloned()
    }
}

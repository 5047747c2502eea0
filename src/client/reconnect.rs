//! Reconnection backoff state.
//!
//! Pure delay arithmetic; the connection layer owns the single pending
//! timer and drives the attempts.

use crate::config::ReconnectPolicy;
use rand::Rng;

/// Attempt counter and next backoff delay. Reset on every successful
/// connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReconnectState {
    pub attempts: u32,
    pub next_delay_ms: u64,
}

impl ReconnectState {
    pub fn new(policy: &ReconnectPolicy) -> Self {
        Self {
            attempts: 0,
            next_delay_ms: policy.initial_delay_ms,
        }
    }

    pub fn reset(&mut self, policy: &ReconnectPolicy) {
        self.attempts = 0;
        self.next_delay_ms = policy.initial_delay_ms;
    }

    /// Pre-jitter delay for the next attempt.
    pub fn base_delay(&self, policy: &ReconnectPolicy) -> u64 {
        self.next_delay_ms.min(policy.max_delay_ms)
    }

    /// Record a fired attempt and grow the next delay.
    pub fn advance(&mut self, policy: &ReconnectPolicy) {
        self.attempts += 1;
        self.next_delay_ms =
            (((self.next_delay_ms as f64) * policy.factor).floor() as u64).min(policy.max_delay_ms);
    }
}

/// Apply symmetric jitter to a base delay, clamped to non-negative.
pub(crate) fn jittered_delay(base_ms: u64, jitter: f64) -> u64 {
    let spread = base_ms as f64 * jitter * (rand::thread_rng().gen::<f64>() - 0.5) * 2.0;
    (base_ms as f64 + spread).floor().max(0.0) as u64
}

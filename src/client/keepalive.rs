//! Periodic liveness pings.
//!
//! One task per connection, owned by its [`Link`] and aborted on close or
//! disconnect. Fires a structured ping every `ping_interval_ms`, skipping
//! silently when the transport is not open at firing time.
//!
//! [`Link`]: super::connection::Link

use super::connection::ClientCore;
use super::events::ClientEvent;
use crate::protocol::ControlMessage;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

pub(crate) async fn keepalive_task(core: Arc<ClientCore>, epoch: u64) {
    let period = Duration::from_millis(core.config.ping_interval_ms);
    // First ping one full period after open.
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    loop {
        ticker.tick().await;
        let sent = {
            let st = core.state.lock().unwrap();
            if st.epoch != epoch {
                return;
            }
            match &st.link {
                Some(link) => link
                    .outbound
                    .send(Message::text(ControlMessage::Ping.to_text()))
                    .is_ok(),
                None => false,
            }
        };
        if sent {
            debug!("keepalive ping sent");
            core.emit(ClientEvent::Ping);
        }
    }
}

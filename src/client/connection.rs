//! Connection lifecycle and transport ownership.
//!
//! [`ClientCore`] owns the WebSocket handle and every piece of mutable
//! client state. The read half is consumed by a reader task, the write half
//! by a writer task fed through a channel; other components only check the
//! link's presence to decide between "send now" and "queue". All state
//! transitions run as short critical sections that are never held across an
//! await point.

use super::dispatch;
use super::events::ClientEvent;
use super::keepalive::keepalive_task;
use super::reconnect::{jittered_delay, ReconnectState};
use super::subscriptions::{RemoveOutcome, SubscriptionRegistry, SubscriptionHandler};
use crate::config::RestreamConfig;
use crate::error::RestreamError;
use crate::protocol::{ControlMessage, DecoderFn, DecoderRegistry};
use chrono::Utc;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code reported when the transport drops without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

/// Connection lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport. Initial state, and the state after any close.
    Disconnected,
    /// A `connect()` call is racing the handshake against its timeout.
    Connecting,
    /// Transport open; frames flow and keepalive runs.
    Connected,
    /// `disconnect()` is waiting for the close handshake.
    Closing,
    /// An unexpected close occurred and a reconnect timer is pending.
    ReconnectScheduled { attempt: u32 },
}

/// Handles belonging to one open transport.
pub(crate) struct Link {
    pub(crate) outbound: mpsc::UnboundedSender<Message>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    keepalive: JoinHandle<()>,
}

/// All mutable client state, guarded by one lock.
pub(crate) struct CoreState {
    pub(crate) link: Option<Link>,
    /// Bumped on every install so stale reader tasks cannot tear down a
    /// newer connection.
    pub(crate) epoch: u64,
    pub(crate) should_reconnect: bool,
    pub(crate) reconnect: ReconnectState,
    pub(crate) reconnect_timer: Option<JoinHandle<()>>,
    pub(crate) subs: SubscriptionRegistry,
    pub(crate) decoders: DecoderRegistry,
}

/// Shared core behind the public client handle and the background tasks.
pub(crate) struct ClientCore {
    pub(crate) config: RestreamConfig,
    pub(crate) state: Mutex<CoreState>,
    pub(crate) phase: watch::Sender<ConnectionState>,
    pub(crate) events: broadcast::Sender<ClientEvent>,
}

impl ClientCore {
    pub(crate) fn new(config: RestreamConfig) -> Arc<Self> {
        let (phase, _) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(256);
        let reconnect = ReconnectState::new(&config.reconnect);
        Arc::new(Self {
            state: Mutex::new(CoreState {
                link: None,
                epoch: 0,
                should_reconnect: true,
                reconnect,
                reconnect_timer: None,
                subs: SubscriptionRegistry::new(),
                decoders: DecoderRegistry::with_defaults(),
            }),
            phase,
            events,
            config,
        })
    }

    pub(crate) fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    /// Report a contained failure as a `client_error` notification.
    pub(crate) fn diagnostic(&self, message: &str, context: impl Into<String>) {
        let context = context.into();
        warn!(target: "restream_client", "{message}: {context}");
        self.emit(ClientEvent::ClientError {
            message: message.to_string(),
            context,
            timestamp: Utc::now(),
        });
    }

    /// Connect to the endpoint. No-op when already open; a concurrent call
    /// while another attempt is in flight waits for that attempt's outcome.
    pub(crate) async fn connect(self: &Arc<Self>) -> Result<(), RestreamError> {
        enum Entry {
            AlreadyConnected,
            WaitExisting,
            Proceed,
        }
        let entry = {
            let mut st = self.state.lock().unwrap();
            let phase = self.phase.borrow().clone();
            match phase {
                ConnectionState::Connected => Entry::AlreadyConnected,
                ConnectionState::Connecting => Entry::WaitExisting,
                _ => {
                    st.should_reconnect = true;
                    self.phase.send_replace(ConnectionState::Connecting);
                    Entry::Proceed
                }
            }
        };
        match entry {
            Entry::AlreadyConnected => Ok(()),
            Entry::WaitExisting => self.await_connected().await,
            Entry::Proceed => self.establish().await,
        }
    }

    /// Wait until an in-flight connect attempt settles.
    async fn await_connected(&self) -> Result<(), RestreamError> {
        let mut phase_rx = self.phase.subscribe();
        let wait = async {
            loop {
                let phase = phase_rx.borrow().clone();
                match phase {
                    ConnectionState::Connected => return Ok(()),
                    ConnectionState::Disconnected => {
                        return Err(RestreamError::connection_failed(
                            "concurrent connect attempt failed",
                        ));
                    }
                    _ => {}
                }
                if phase_rx.changed().await.is_err() {
                    return Err(RestreamError::connection_failed("client state dropped"));
                }
            }
        };
        let timeout = Duration::from_millis(self.config.connect_timeout_ms);
        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(RestreamError::ConnectTimeout(self.config.connect_timeout_ms)),
        }
    }

    /// Race the handshake against the configured timeout.
    ///
    /// A failed attempt leaves reconnection to the caller; the backoff loop
    /// only engages when an established connection is lost later.
    async fn establish(self: &Arc<Self>) -> Result<(), RestreamError> {
        let url = match self.build_endpoint_url() {
            Ok(url) => url,
            Err(e) => {
                self.phase.send_replace(ConnectionState::Disconnected);
                return Err(e);
            }
        };
        let timeout_ms = self.config.connect_timeout_ms;
        debug!(endpoint = %self.config.endpoint, "opening transport");

        let attempt = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            connect_async(url.as_str()),
        )
        .await;
        match attempt {
            Err(_) => {
                self.phase.send_replace(ConnectionState::Disconnected);
                Err(RestreamError::ConnectTimeout(timeout_ms))
            }
            Ok(Err(e)) => {
                self.phase.send_replace(ConnectionState::Disconnected);
                Err(RestreamError::ConnectionFailed(Box::new(e)))
            }
            Ok(Ok((ws, _response))) => {
                self.install(ws);
                Ok(())
            }
        }
    }

    /// Wire an opened transport: spawn reader/writer/keepalive, reset the
    /// backoff state, flush queued subscribes, and replay tracked channels.
    fn install(self: &Arc<Self>, ws: WsStream) {
        let (sink, stream) = ws.split();
        let (out_tx, out_rx) = mpsc::unbounded_channel::<Message>();

        let mut st = self.state.lock().unwrap();
        if let Some(old) = st.link.take() {
            old.reader.abort();
            old.writer.abort();
            old.keepalive.abort();
        }
        st.epoch += 1;
        let epoch = st.epoch;
        st.link = Some(Link {
            outbound: out_tx,
            reader: tokio::spawn(reader_task(self.clone(), stream, epoch)),
            writer: tokio::spawn(writer_task(sink, out_rx)),
            keepalive: tokio::spawn(keepalive_task(self.clone(), epoch)),
        });
        st.reconnect.reset(&self.config.reconnect);
        if let Some(timer) = st.reconnect_timer.take() {
            timer.abort();
        }
        self.phase.send_replace(ConnectionState::Connected);
        info!(endpoint = %self.config.endpoint, "transport open");
        self.emit(ClientEvent::Open);
        self.flush_pending(&mut st);
        self.resubscribe_all(&mut st);
    }

    /// Disable auto-reconnect, cancel timers, and close the transport.
    /// Resolves once closed, or immediately when already closed.
    pub(crate) async fn disconnect(self: &Arc<Self>, code: u16, reason: &str) {
        let link = {
            let mut st = self.state.lock().unwrap();
            st.should_reconnect = false;
            if let Some(timer) = st.reconnect_timer.take() {
                timer.abort();
            }
            match st.link.take() {
                None => {
                    self.phase.send_replace(ConnectionState::Disconnected);
                    return;
                }
                Some(link) => {
                    self.phase.send_replace(ConnectionState::Closing);
                    link
                }
            }
        };
        link.keepalive.abort();
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        let _ = link.outbound.send(Message::Close(Some(frame)));

        // The reader finishes once the close handshake completes; it emits
        // the close notification on the way out.
        let abort_reader = link.reader.abort_handle();
        if tokio::time::timeout(Duration::from_secs(2), link.reader)
            .await
            .is_err()
        {
            warn!("transport did not close within 2s, aborting");
            abort_reader.abort();
            self.state.lock().unwrap().epoch += 1;
            self.phase.send_replace(ConnectionState::Disconnected);
            self.emit(ClientEvent::Close {
                code,
                reason: reason.to_string(),
            });
        }
        link.writer.abort();
        info!("transport disconnected");
    }

    /// Teardown after the transport closed underneath us.
    fn on_close(self: &Arc<Self>, epoch: u64, code: u16, reason: String) {
        let reconnect = {
            let mut st = self.state.lock().unwrap();
            if st.epoch != epoch {
                return;
            }
            if let Some(link) = st.link.take() {
                link.keepalive.abort();
                link.writer.abort();
            }
            self.phase.send_replace(ConnectionState::Disconnected);
            info!(code, reason = %reason, "transport closed");
            self.emit(ClientEvent::Close { code, reason });
            st.should_reconnect && self.config.reconnect.enabled
        };
        if reconnect {
            self.schedule_reconnect();
        }
    }

    /// Schedule exactly one reconnection attempt; a second close while a
    /// timer is pending is a no-op.
    fn schedule_reconnect(self: &Arc<Self>) {
        let mut st = self.state.lock().unwrap();
        if st.reconnect_timer.is_some() {
            return;
        }
        let policy = &self.config.reconnect;
        let base = st.reconnect.base_delay(policy);
        let delay_ms = jittered_delay(base, policy.jitter);
        let attempt = st.reconnect.attempts + 1;
        self.phase
            .send_replace(ConnectionState::ReconnectScheduled { attempt });
        info!(attempt, delay_ms, "scheduling reconnect");
        self.emit(ClientEvent::Reconnecting { attempt, delay_ms });

        let core = self.clone();
        st.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let attempts_taken = {
                let mut st = core.state.lock().unwrap();
                st.reconnect_timer = None;
                st.reconnect.advance(&core.config.reconnect);
                st.reconnect.attempts
            };
            match core.connect().await {
                Ok(()) => core.emit(ClientEvent::Reconnected {
                    attempts: attempts_taken,
                }),
                Err(e) => {
                    core.emit(ClientEvent::ReconnectError(e.to_string()));
                    core.schedule_reconnect();
                }
            }
        }));
    }

    /// Register a handler, sending or queueing the subscribe wire message
    /// when this is the channel's first reference.
    pub(crate) fn subscribe_channel(
        &self,
        channel: &str,
        handler: SubscriptionHandler,
    ) -> Result<(), RestreamError> {
        let mut st = self.state.lock().unwrap();
        st.subs.check_limits(channel, &self.config)?;
        st.subs.register(channel, handler);
        if st.subs.ref_count(channel) == 0 {
            match &st.link {
                Some(link) => {
                    let outbound = link.outbound.clone();
                    self.send_subscribe(&outbound, channel);
                }
                None => st.subs.push_pending(channel),
            }
        }
        st.subs.incr_ref(channel);
        self.flush_pending(&mut st);
        Ok(())
    }

    /// Detach a handler; the last reference sends the unsubscribe message.
    pub(crate) fn remove_handler(&self, channel: &str, key: usize) {
        let mut st = self.state.lock().unwrap();
        if st.subs.remove(channel, key) == RemoveOutcome::UnsubscribeDue {
            if let Some(link) = &st.link {
                let outbound = link.outbound.clone();
                self.send_unsubscribe(&outbound, channel);
            }
        }
    }

    pub(crate) fn set_decoder(&self, topic: &str, decoder: DecoderFn) {
        self.state.lock().unwrap().decoders.register(topic, decoder);
    }

    /// Abrupt teardown for `Drop`: stop every background task without a
    /// close handshake.
    pub(crate) fn shutdown(&self) {
        if let Ok(mut st) = self.state.lock() {
            st.should_reconnect = false;
            st.epoch += 1;
            if let Some(timer) = st.reconnect_timer.take() {
                timer.abort();
            }
            if let Some(link) = st.link.take() {
                link.reader.abort();
                link.writer.abort();
                link.keepalive.abort();
            }
        }
    }

    fn send_subscribe(&self, outbound: &mpsc::UnboundedSender<Message>, channel: &str) {
        let text = ControlMessage::Subscribe {
            event: channel.to_string(),
        }
        .to_text();
        if outbound.send(Message::text(text)).is_ok() {
            debug!(channel, "subscribe sent");
            self.emit(ClientEvent::Subscribed {
                channel: channel.to_string(),
            });
        } else {
            self.diagnostic("subscribe send error", channel.to_string());
        }
    }

    fn send_unsubscribe(&self, outbound: &mpsc::UnboundedSender<Message>, channel: &str) {
        let text = ControlMessage::Unsubscribe {
            event: channel.to_string(),
        }
        .to_text();
        if outbound.send(Message::text(text)).is_ok() {
            debug!(channel, "unsubscribe sent");
            self.emit(ClientEvent::Unsubscribed {
                channel: channel.to_string(),
            });
        } else {
            self.diagnostic("unsubscribe send error", channel.to_string());
        }
    }

    /// Drain the pending queue in insertion order, if the transport is open.
    fn flush_pending(&self, st: &mut CoreState) {
        let Some(link) = &st.link else { return };
        let outbound = link.outbound.clone();
        for channel in st.subs.take_pending() {
            self.send_subscribe(&outbound, &channel);
        }
    }

    /// Replay every channel with a nonzero reference count.
    fn resubscribe_all(&self, st: &mut CoreState) {
        let Some(link) = &st.link else { return };
        let outbound = link.outbound.clone();
        for channel in st.subs.tracked_channels() {
            self.send_subscribe(&outbound, &channel);
        }
    }

    /// Endpoint URL with the API key appended as a query parameter.
    fn build_endpoint_url(&self) -> Result<String, RestreamError> {
        let endpoint = &self.config.endpoint;
        url::Url::parse(endpoint)
            .map_err(|_| RestreamError::InvalidEndpoint(endpoint.clone()))?;
        Ok(match self.config.resolve_api_key() {
            None => endpoint.clone(),
            Some(key) => {
                let sep = if endpoint.contains('?') { '&' } else { '?' };
                let encoded: String =
                    url::form_urlencoded::byte_serialize(key.as_bytes()).collect();
                format!("{endpoint}{sep}apiKey={encoded}")
            }
        })
    }
}

/// Forward queued outbound messages to the transport sink.
async fn writer_task(
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(message) = outbound.recv().await {
        if let Err(e) = sink.send(message).await {
            debug!("transport send failed: {e}");
            break;
        }
    }
}

/// Pump incoming transport messages until the stream ends, then run close
/// teardown for this connection epoch.
async fn reader_task(core: Arc<ClientCore>, mut stream: SplitStream<WsStream>, epoch: u64) {
    let mut close_code: u16 = ABNORMAL_CLOSURE;
    let mut close_reason = String::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(Message::Binary(payload)) => dispatch::dispatch_frame(&core, &payload),
            Ok(Message::Text(text)) => dispatch::handle_control(&core, text.as_str()),
            Ok(Message::Close(frame)) => {
                if let Some(frame) = frame {
                    close_code = u16::from(frame.code);
                    close_reason = frame.reason.as_str().to_string();
                }
            }
            Ok(_) => {}
            Err(e) => {
                core.emit(ClientEvent::SocketError(e.to_string()));
                break;
            }
        }
    }
    core.on_close(epoch, close_code, close_reason);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RestreamConfig;

    fn core_with(config: RestreamConfig) -> Arc<ClientCore> {
        ClientCore::new(config)
    }

    #[test]
    fn test_initial_state_is_disconnected() {
        let core = core_with(RestreamConfig::default());
        assert_eq!(*core.phase.borrow(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_build_url_without_api_key() {
        let core = core_with(RestreamConfig {
            endpoint: "wss://feed.example.com".to_string(),
            ..Default::default()
        });
        assert_eq!(
            core.build_endpoint_url().unwrap(),
            "wss://feed.example.com"
        );
    }

    #[test]
    fn test_build_url_appends_api_key() {
        let core = core_with(RestreamConfig {
            endpoint: "wss://feed.example.com".to_string(),
            api_key: Some("secret key".to_string()),
            ..Default::default()
        });
        assert_eq!(
            core.build_endpoint_url().unwrap(),
            "wss://feed.example.com?apiKey=secret+key"
        );
    }

    #[test]
    fn test_build_url_respects_existing_query() {
        let core = core_with(RestreamConfig {
            endpoint: "wss://feed.example.com?version=2".to_string(),
            api_key: Some("k".to_string()),
            ..Default::default()
        });
        assert_eq!(
            core.build_endpoint_url().unwrap(),
            "wss://feed.example.com?version=2&apiKey=k"
        );
    }

    #[test]
    fn test_build_url_rejects_invalid_endpoint() {
        let core = core_with(RestreamConfig {
            endpoint: "not a url".to_string(),
            ..Default::default()
        });
        assert!(matches!(
            core.build_endpoint_url(),
            Err(RestreamError::InvalidEndpoint(_))
        ));
    }
}

//! Connection manager for the native peer.
//!
//! Owns the one [`Channel`] and everything that decides when it exists:
//! explicit connects, the single buffered send, heartbeat replies, flat
//! delay reconnects and the polling loop.
//!
//! # Example
//!
//! ```ignore
//! let (manager, mut events) = ConnectionManager::new(options, connector);
//!
//! manager.connect(BridgeMessage::init("bridge initialized")).await?;
//! manager.start_polling();
//!
//! while let Some(event) = events.recv().await {
//!     // hand BridgeEvent::Inbound to the router
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tracing::{debug, info, trace, warn};

use crate::bridge::BridgeOptions;
use crate::error::{Error, Result};
use crate::protocol::{BridgeMessage, PeerMessage};
use crate::transport::codec::check_outbound;
use crate::transport::{Channel, ChannelEvent, PeerConnector};

use super::state::{BridgeEvent, ChannelState, ConnectOutcome};

// ============================================================================
// Constants
// ============================================================================

/// Text of the `init` probe used when no caller supplied one.
pub const INIT_MESSAGE: &str = "bridge initialized";

// ============================================================================
// Types
// ============================================================================

/// Who started a connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// API caller; supersedes a scheduled reconnect.
    Caller,
    /// Reconnect timer.
    Reconnect,
    /// Polling tick; yields to a scheduled reconnect.
    Poll,
}

/// Decision taken under the slot lock at the start of a connect.
enum Begin {
    /// Send on the existing channel.
    Reuse(Channel, BridgeMessage),
    /// Open a new channel with this generation.
    Open(BridgeMessage, u64),
    /// Nothing to do now.
    Busy,
}

/// Decision taken under the slot lock by `deliver`.
enum Delivery {
    Now(Channel, BridgeMessage),
    Buffered { connect: bool },
}

/// Mutable connection state.
#[derive(Default)]
struct Slot {
    state: ChannelState,
    channel: Option<Channel>,
    last_error: Option<String>,
    /// One message waiting for the next channel.
    pending: Option<BridgeMessage>,
    /// Page source responses waiting for the next channel, oldest first.
    responses: VecDeque<BridgeMessage>,
    /// Last caller-supplied initial message, resent on reconnects.
    probe: Option<BridgeMessage>,
    reconnect: Option<JoinHandle<()>>,
    reconnect_attempts: u32,
    polling: Option<JoinHandle<()>>,
    awaiting_first_frame: bool,
    shut_down: bool,
}

impl Slot {
    fn probe(&self) -> BridgeMessage {
        self.probe
            .clone()
            .unwrap_or_else(|| BridgeMessage::init(INIT_MESSAGE))
    }

    /// Buffers a message for the next channel.
    ///
    /// Responses to peer requests queue up; anything else takes the single
    /// slot and replaces what was there.
    fn buffer(&mut self, message: BridgeMessage) {
        if message.request_id().is_some() {
            self.responses.push_back(message);
            return;
        }
        if let Some(replaced) = self.pending.replace(message) {
            warn!(replaced = replaced.kind(), "Replacing buffered message");
        }
    }

    fn take_buffered(&mut self) -> Vec<BridgeMessage> {
        self.responses.drain(..).chain(self.pending.take()).collect()
    }
}

/// Shared manager state.
struct ManagerInner {
    options: BridgeOptions,
    connector: Arc<dyn PeerConnector>,
    slot: Mutex<Slot>,
    /// Handed to every channel's event loop.
    channel_events: mpsc::UnboundedSender<ChannelEvent>,
    /// Published to the bridge.
    events: mpsc::UnboundedSender<BridgeEvent>,
    next_generation: AtomicU64,
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        let slot = self.slot.get_mut();
        if let Some(task) = slot.reconnect.take() {
            task.abort();
        }
        if let Some(task) = slot.polling.take() {
            task.abort();
        }
        if let Some(channel) = slot.channel.take() {
            channel.shutdown();
        }
    }
}

/// Resets a `Connecting` state left behind by a cancelled connect.
struct ConnectGuard<'a> {
    inner: &'a ManagerInner,
    armed: bool,
}

impl Drop for ConnectGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut slot = self.inner.slot.lock();
            if slot.state == ChannelState::Connecting {
                slot.state = ChannelState::Disconnected;
            }
        }
    }
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Owner of the channel to the native peer.
///
/// Cloning yields another handle to the same manager. Background tasks hold
/// only weak references, so dropping the last handle stops them and closes
/// the channel.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.inner.slot.lock();
        f.debug_struct("ConnectionManager")
            .field("host_name", &self.inner.options.host_name)
            .field("state", &slot.state)
            .field("generation", &slot.channel.as_ref().map(Channel::generation))
            .field("polling", &slot.polling.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionManager - Constructor & Accessors
// ============================================================================

impl ConnectionManager {
    /// Creates a manager and the receiver of its events.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(
        options: BridgeOptions,
        connector: Arc<dyn PeerConnector>,
    ) -> (Self, mpsc::UnboundedReceiver<BridgeEvent>) {
        let (channel_events, channel_rx) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(ManagerInner {
            options,
            connector,
            slot: Mutex::new(Slot::default()),
            channel_events,
            events,
            next_generation: AtomicU64::new(1),
        });

        tokio::spawn(Self::run_event_pump(Arc::downgrade(&inner), channel_rx));

        (Self { inner }, events_rx)
    }

    /// Returns the options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &BridgeOptions {
        &self.inner.options
    }

    /// Returns the channel state.
    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.inner.slot.lock().state
    }

    /// Returns `true` if a channel is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.current_channel().is_some()
    }

    /// Returns the error that ended the last channel or connect attempt.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.inner.slot.lock().last_error.clone()
    }

    /// Returns `true` while polling is active.
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.inner.slot.lock().polling.is_some()
    }

    /// Returns consecutive reconnect attempts since the last healthy channel.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.slot.lock().reconnect_attempts
    }

    /// Returns `true` if a message is buffered for the next channel.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        let slot = self.inner.slot.lock();
        slot.pending.is_some() || !slot.responses.is_empty()
    }

    fn current_channel(&self) -> Option<Channel> {
        let slot = self.inner.slot.lock();
        match slot.state {
            ChannelState::Connected => slot.channel.clone().filter(Channel::is_open),
            _ => None,
        }
    }
}

// ============================================================================
// ConnectionManager - Sending
// ============================================================================

impl ConnectionManager {
    /// Sends `initial` on the channel, opening one first if needed.
    ///
    /// If a connect is already in progress, `initial` is buffered and sent
    /// once that connect completes. A failed connect is not retried inline;
    /// a reconnect is scheduled if polling or auto-reconnect is active.
    ///
    /// # Errors
    ///
    /// - [`Error::PeerUnreachable`] if the peer cannot be started
    /// - [`Error::ConnectionClosed`] after [`shutdown`](Self::shutdown)
    pub async fn connect(&self, initial: BridgeMessage) -> Result<ConnectOutcome> {
        self.connect_with(Some(initial), Trigger::Caller).await
    }

    /// Sends a message on the open channel.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if there is no channel
    /// - [`Error::PeerUnreachable`] if the channel stopped
    /// - [`Error::FrameTooLarge`] if the message exceeds the frame limit
    pub fn send(&self, message: &BridgeMessage) -> Result<()> {
        let channel = self.current_channel().ok_or(Error::NotConnected)?;
        self.send_on(&channel, message)
    }

    /// Sends a message now, or buffers it and connects.
    ///
    /// Only one message is buffered; a newer one replaces it. Page source
    /// responses are the exception: they queue and are all flushed.
    ///
    /// # Errors
    ///
    /// - [`Error::FrameTooLarge`] if the message can never be sent; it is
    ///   not buffered
    /// - the connect error if a new channel could not be opened; the
    ///   message stays buffered for the next channel
    pub async fn deliver(&self, message: BridgeMessage) -> Result<()> {
        check_outbound(&message)?;

        let delivery = {
            let mut slot = self.inner.slot.lock();
            if slot.shut_down {
                return Err(Error::ConnectionClosed);
            }

            match slot.channel.clone() {
                Some(channel) if slot.state == ChannelState::Connected && channel.is_open() => {
                    Delivery::Now(channel, message)
                }
                _ => {
                    let connect = slot.state != ChannelState::Connecting;
                    debug!(kind = message.kind(), "Buffering message until connected");
                    slot.buffer(message);
                    Delivery::Buffered { connect }
                }
            }
        };

        match delivery {
            Delivery::Now(channel, message) => self.send_on(&channel, &message),
            Delivery::Buffered { connect: false } => Ok(()),
            Delivery::Buffered { connect: true } => {
                self.connect_with(None, Trigger::Caller).await.map(|_| ())
            }
        }
    }

    fn send_on(&self, channel: &Channel, message: &BridgeMessage) -> Result<()> {
        channel.send(message)?;
        if message.is_init() {
            let _ = self.inner.events.send(BridgeEvent::Initialized);
        }
        Ok(())
    }
}

// ============================================================================
// ConnectionManager - Connecting
// ============================================================================

impl ConnectionManager {
    async fn connect_with(
        &self,
        initial: Option<BridgeMessage>,
        trigger: Trigger,
    ) -> Result<ConnectOutcome> {
        let (initial, generation) = match self.begin_connect(initial, trigger)? {
            Begin::Busy => return Ok(ConnectOutcome::InProgress),
            Begin::Reuse(channel, initial) => {
                self.send_on(&channel, &initial)?;
                return Ok(ConnectOutcome::Reused);
            }
            Begin::Open(initial, generation) => (initial, generation),
        };

        let mut guard = ConnectGuard {
            inner: &self.inner,
            armed: true,
        };
        let host_name = &self.inner.options.host_name;
        debug!(generation, host = %host_name, ?trigger, "Connecting to native peer");

        let io = match self.inner.connector.connect(host_name).await {
            Ok(io) => io,
            Err(e) => {
                guard.armed = false;
                warn!(generation, host = %host_name, error = %e, "Failed to connect to native peer");
                let mut slot = self.inner.slot.lock();
                slot.state = ChannelState::Disconnected;
                slot.last_error = Some(e.to_string());
                self.schedule_reconnect(&mut slot);
                return Err(e);
            }
        };

        guard.armed = false;
        let (channel, pending) = {
            let mut slot = self.inner.slot.lock();
            if slot.shut_down {
                debug!(generation, "Shut down while connecting");
                slot.state = ChannelState::Disconnected;
                return Err(Error::ConnectionClosed);
            }

            let channel = Channel::open(io, generation, self.inner.channel_events.clone());
            slot.channel = Some(channel.clone());
            slot.state = ChannelState::Connected;
            slot.last_error = None;
            slot.awaiting_first_frame = true;
            (channel, slot.take_buffered())
        };

        info!(generation, host = %host_name, "Connected to native peer");

        self.send_on(&channel, &initial)?;
        for message in pending {
            debug!(generation, kind = message.kind(), "Flushing buffered message");
            self.send_on(&channel, &message)?;
        }

        Ok(ConnectOutcome::Established)
    }

    fn begin_connect(&self, initial: Option<BridgeMessage>, trigger: Trigger) -> Result<Begin> {
        let mut slot = self.inner.slot.lock();
        if slot.shut_down {
            return Err(Error::ConnectionClosed);
        }

        match trigger {
            Trigger::Caller => {
                if let Some(task) = slot.reconnect.take() {
                    debug!("Connect supersedes scheduled reconnect");
                    task.abort();
                }
            }
            Trigger::Reconnect => slot.reconnect = None,
            Trigger::Poll => {
                if slot.reconnect.is_some() {
                    return Ok(Begin::Busy);
                }
            }
        }

        let explicit = initial.is_some();
        let initial = initial.unwrap_or_else(|| slot.probe());

        match slot.state {
            ChannelState::Connected => {
                if let Some(channel) = slot.channel.clone().filter(Channel::is_open) {
                    if trigger != Trigger::Caller {
                        return Ok(Begin::Busy);
                    }
                    return Ok(Begin::Reuse(channel, initial));
                }
                debug!("Channel found closed, opening a new one");
                slot.channel = None;
            }
            ChannelState::Connecting => {
                if explicit {
                    debug!(kind = initial.kind(), "Connect in progress, buffering message");
                    slot.buffer(initial);
                }
                return Ok(Begin::Busy);
            }
            ChannelState::Disconnected => {}
        }

        if explicit {
            slot.probe = Some(initial.clone());
        }
        slot.state = ChannelState::Connecting;
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        Ok(Begin::Open(initial, generation))
    }

    /// Schedules one reconnect attempt if keep-alive is active.
    fn schedule_reconnect(&self, slot: &mut Slot) {
        if slot.shut_down || slot.reconnect.is_some() {
            return;
        }

        if slot.polling.is_none() && !self.inner.options.auto_reconnect {
            debug!("Keep-alive inactive, not reconnecting");
            return;
        }

        let max = self.inner.options.max_reconnect_attempts;
        if slot.reconnect_attempts >= max {
            warn!(attempts = slot.reconnect_attempts, "Giving up on reconnecting");
            return;
        }

        slot.reconnect_attempts += 1;
        let attempt = slot.reconnect_attempts;
        let delay = self.inner.options.reconnect_delay;
        let weak = Arc::downgrade(&self.inner);

        debug!(attempt, delay_ms = delay.as_millis() as u64, "Reconnect scheduled");

        slot.reconnect = Some(tokio::spawn(async move {
            sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let manager = Self { inner };
            info!(attempt, "Reconnecting to native peer");
            if let Err(e) = manager.connect_with(None, Trigger::Reconnect).await {
                debug!(attempt, error = %e, "Reconnect attempt failed");
            }
        }));
    }
}

// ============================================================================
// ConnectionManager - Polling & Teardown
// ============================================================================

impl ConnectionManager {
    /// Starts polling mode.
    ///
    /// Every poll interval the peer is probed with `check_messages` when
    /// connected, or a connect is started when disconnected and no reconnect
    /// is already scheduled. Disconnects while polling schedule reconnects.
    pub fn start_polling(&self) {
        let mut slot = self.inner.slot.lock();
        if slot.shut_down || slot.polling.is_some() {
            return;
        }

        let period = self.inner.options.poll_interval;
        let weak = Arc::downgrade(&self.inner);

        slot.polling = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                Self { inner }.poll_once();
            }
        }));

        info!(interval_ms = period.as_millis() as u64, "Polling started");
    }

    /// Stops polling mode.
    ///
    /// Without auto-reconnect, a scheduled reconnect is cancelled as well.
    pub fn stop_polling(&self) {
        let mut slot = self.inner.slot.lock();
        let Some(task) = slot.polling.take() else {
            return;
        };
        task.abort();

        if !self.inner.options.auto_reconnect
            && let Some(reconnect) = slot.reconnect.take()
        {
            debug!("Cancelled scheduled reconnect");
            reconnect.abort();
        }

        info!("Polling stopped");
    }

    /// Closes the channel without scheduling a reconnect.
    pub fn disconnect(&self) {
        let channel = {
            let mut slot = self.inner.slot.lock();
            if let Some(task) = slot.reconnect.take() {
                task.abort();
            }
            slot.state = ChannelState::Disconnected;
            slot.channel.take()
        };

        if let Some(channel) = channel {
            info!(generation = channel.generation(), "Disconnecting from native peer");
            channel.shutdown();
            let _ = self.inner.events.send(BridgeEvent::Disconnected { reason: None });
        }
    }

    /// Stops polling, cancels reconnects and closes the channel for good.
    ///
    /// Later connects fail with [`Error::ConnectionClosed`].
    pub fn shutdown(&self) {
        {
            let mut slot = self.inner.slot.lock();
            slot.shut_down = true;
            slot.pending = None;
            slot.responses.clear();
            if let Some(task) = slot.polling.take() {
                task.abort();
            }
        }
        self.disconnect();
        info!("Connection manager shut down");
    }

    fn poll_once(&self) {
        if let Some(channel) = self.current_channel() {
            trace!(generation = channel.generation(), "Polling native peer");
            if let Err(e) = channel.send(&BridgeMessage::check_messages()) {
                debug!(error = %e, "Polling probe failed");
            }
            return;
        }

        // Detached so that stopping the poll loop cannot cancel a connect
        let manager = self.clone();
        tokio::spawn(async move {
            match manager.connect_with(None, Trigger::Poll).await {
                Ok(outcome) => trace!(?outcome, "Polling connect finished"),
                Err(e) => debug!(error = %e, "Polling connect failed"),
            }
        });
    }
}

// ============================================================================
// ConnectionManager - Channel Events
// ============================================================================

impl ConnectionManager {
    async fn run_event_pump(
        inner: Weak<ManagerInner>,
        mut channel_events: mpsc::UnboundedReceiver<ChannelEvent>,
    ) {
        while let Some(event) = channel_events.recv().await {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            let manager = Self { inner };

            match event {
                ChannelEvent::Frame {
                    generation,
                    payload,
                } => manager.on_frame(generation, &payload),
                ChannelEvent::Closed { generation, reason } => {
                    manager.on_disconnect(generation, reason);
                }
            }
        }
        trace!("Connection event pump stopped");
    }

    fn on_frame(&self, generation: u64, payload: &[u8]) {
        let channel = {
            let mut slot = self.inner.slot.lock();
            let Some(channel) = slot
                .channel
                .clone()
                .filter(|c| c.generation() == generation)
            else {
                trace!(generation, "Dropping frame from stale channel");
                return;
            };
            if slot.awaiting_first_frame {
                slot.awaiting_first_frame = false;
                slot.reconnect_attempts = 0;
            }
            channel
        };

        match PeerMessage::parse(payload) {
            Ok(PeerMessage::Heartbeat) => {
                debug!(generation, "Heartbeat received");
                if let Err(e) = channel.send(&BridgeMessage::heartbeat_ack()) {
                    warn!(generation, error = %e, "Failed to acknowledge heartbeat");
                }
            }
            Ok(PeerMessage::HeartbeatAck) => {
                trace!(generation, "Peer acknowledged heartbeat");
            }
            Ok(message) => {
                debug!(generation, kind = message.kind(), "Peer message received");
                let _ = self.inner.events.send(BridgeEvent::Inbound(message));
            }
            Err(e) => {
                warn!(generation, error = %e, "Dropping malformed peer message");
            }
        }
    }

    fn on_disconnect(&self, generation: u64, reason: Option<String>) {
        let mut slot = self.inner.slot.lock();
        if slot.channel.as_ref().map(Channel::generation) != Some(generation) {
            debug!(generation, "Ignoring close of stale channel");
            return;
        }

        slot.channel = None;
        slot.state = ChannelState::Disconnected;
        slot.last_error.clone_from(&reason);

        info!(
            generation,
            reason = reason.as_deref().unwrap_or("peer closed"),
            "Disconnected from native peer"
        );
        let _ = self.inner.events.send(BridgeEvent::Disconnected { reason });

        self.schedule_reconnect(&mut slot);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use serde_json::json;

    use crate::identifiers::RequestId;
    use crate::testing::{DuplexConnector, FakePeer, init_tracing};
    use crate::transport::codec::MAX_OUTBOUND_FRAME_BYTES;

    fn manager_with(
        options: BridgeOptions,
    ) -> (
        ConnectionManager,
        mpsc::UnboundedReceiver<BridgeEvent>,
        Arc<DuplexConnector>,
        mpsc::UnboundedReceiver<FakePeer>,
    ) {
        init_tracing();
        let (connector, peers) = DuplexConnector::new();
        let (manager, events) = ConnectionManager::new(options, connector.clone());
        (manager, events, connector, peers)
    }

    #[tokio::test]
    async fn test_send_without_channel_fails() {
        let (manager, _events, _connector, _peers) = manager_with(BridgeOptions::new());
        let err = manager.send(&BridgeMessage::check_messages()).unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        assert_eq!(manager.state(), ChannelState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_sends_initial() {
        let (manager, mut events, _connector, mut peers) = manager_with(BridgeOptions::new());

        let outcome = manager
            .connect(BridgeMessage::init("hello"))
            .await
            .expect("connect");
        assert_eq!(outcome, ConnectOutcome::Established);
        assert_eq!(manager.state(), ChannelState::Connected);

        let mut peer = peers.recv().await.expect("peer");
        let init = peer.recv().await.expect("init");
        assert_eq!(init["action"], "init");
        assert_eq!(init["message"], "hello");

        assert_eq!(events.recv().await, Some(BridgeEvent::Initialized));
    }

    #[tokio::test]
    async fn test_connect_reuses_channel() {
        let (manager, _events, connector, mut peers) = manager_with(BridgeOptions::new());

        manager
            .connect(BridgeMessage::init("one"))
            .await
            .expect("connect");
        let outcome = manager
            .connect(BridgeMessage::check_messages())
            .await
            .expect("connect");
        assert_eq!(outcome, ConnectOutcome::Reused);

        let mut peer = peers.recv().await.expect("peer");
        assert_eq!(peer.recv().await.expect("init")["message"], "one");
        assert_eq!(peer.recv().await.expect("probe")["action"], "check_messages");
        assert_eq!(connector.attempts().len(), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_surfaces_error() {
        let options = BridgeOptions::new().with_auto_reconnect(false);
        let (manager, _events, connector, _peers) = manager_with(options);
        connector.set_failing(true);

        let err = manager
            .connect(BridgeMessage::init("x"))
            .await
            .unwrap_err();
        assert!(err.is_connection_error());
        assert_eq!(manager.state(), ChannelState::Disconnected);
        assert!(manager.last_error().is_some());
    }

    #[tokio::test]
    async fn test_heartbeat_acked_once_and_not_forwarded() {
        let (manager, mut events, _connector, mut peers) = manager_with(BridgeOptions::new());
        manager
            .connect(BridgeMessage::init("x"))
            .await
            .expect("connect");
        assert_eq!(events.recv().await, Some(BridgeEvent::Initialized));

        let mut peer = peers.recv().await.expect("peer");
        peer.recv_kind("init").await;

        peer.send(json!({"type": "heartbeat"})).await;
        peer.send(json!({"action": "heartbeat"})).await;
        peer.send(json!({"type": "notification", "content": "hi"})).await;

        let event = events.recv().await.expect("event");
        assert_eq!(
            event,
            BridgeEvent::Inbound(PeerMessage::Forward(
                json!({"type": "notification", "content": "hi"})
            ))
        );

        let ack = peer.recv().await.expect("ack");
        assert_eq!(ack, json!({"action": "heartbeat"}));

        manager
            .send(&BridgeMessage::check_messages())
            .expect("send");
        assert_eq!(
            peer.recv().await.expect("probe"),
            json!({"action": "check_messages"})
        );
    }

    #[tokio::test]
    async fn test_malformed_frame_is_dropped() {
        let (manager, mut events, _connector, mut peers) = manager_with(BridgeOptions::new());
        manager
            .connect(BridgeMessage::init("x"))
            .await
            .expect("connect");
        assert_eq!(events.recv().await, Some(BridgeEvent::Initialized));

        let mut peer = peers.recv().await.expect("peer");
        let body = b"not json";
        let mut frame = (body.len() as u32).to_ne_bytes().to_vec();
        frame.extend_from_slice(body);
        peer.send_raw(&frame).await;
        peer.send(json!({"nothing": true})).await;
        peer.send(json!({"type": "get_page_source", "request_id": "r1"}))
            .await;

        let event = events.recv().await.expect("event");
        assert!(matches!(
            event,
            BridgeEvent::Inbound(PeerMessage::GetPageSource { .. })
        ));
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn test_deliver_connects_and_flushes() {
        let (manager, _events, _connector, mut peers) = manager_with(BridgeOptions::new());

        manager
            .deliver(BridgeMessage::set_active_page("https://a.test/", "A", "<p>a</p>"))
            .await
            .expect("deliver");

        let mut peer = peers.recv().await.expect("peer");
        let init = peer.recv().await.expect("init");
        assert_eq!(init["action"], "init");
        assert_eq!(init["message"], INIT_MESSAGE);
        assert_eq!(peer.recv().await.expect("flushed")["type"], "set_active_page");
        assert!(!manager.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_buffer_keeps_newest_message() {
        let (manager, _events, connector, mut peers) = manager_with(BridgeOptions::new());
        connector.set_delay(Duration::from_secs(1));

        let task = tokio::spawn({
            let manager = manager.clone();
            async move { manager.connect(BridgeMessage::init("first")).await }
        });
        while manager.state() != ChannelState::Connecting {
            tokio::task::yield_now().await;
        }

        let outcome = manager
            .connect(BridgeMessage::init("second"))
            .await
            .expect("connect");
        assert_eq!(outcome, ConnectOutcome::InProgress);
        manager
            .deliver(BridgeMessage::check_messages())
            .await
            .expect("buffer");
        manager
            .deliver(BridgeMessage::set_active_page("https://a.test/", "A", "<p>a</p>"))
            .await
            .expect("buffer");
        assert!(manager.has_pending());

        let outcome = task.await.expect("join").expect("connect");
        assert_eq!(outcome, ConnectOutcome::Established);

        let mut peer = peers.recv().await.expect("peer");
        assert_eq!(peer.recv().await.expect("init")["message"], "first");
        assert_eq!(peer.recv().await.expect("flushed")["type"], "set_active_page");
        assert_eq!(connector.attempts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_buffered_responses_are_not_replaced() {
        let (manager, _events, connector, mut peers) = manager_with(BridgeOptions::new());
        connector.set_delay(Duration::from_secs(1));

        let task = tokio::spawn({
            let manager = manager.clone();
            async move { manager.connect(BridgeMessage::init("first")).await }
        });
        while manager.state() != ChannelState::Connecting {
            tokio::task::yield_now().await;
        }

        manager
            .deliver(BridgeMessage::page_source_error(RequestId::from("r1"), "no active tab"))
            .await
            .expect("buffer");
        manager
            .deliver(BridgeMessage::button_click(json!({"button": 1})))
            .await
            .expect("buffer");
        manager
            .deliver(BridgeMessage::page_source(RequestId::from("r2"), "https://a.test/", "<p>a</p>"))
            .await
            .expect("buffer");

        task.await.expect("join").expect("connect");

        let mut peer = peers.recv().await.expect("peer");
        assert_eq!(peer.recv().await.expect("init")["message"], "first");
        assert_eq!(peer.recv().await.expect("r1")["request_id"], "r1");
        assert_eq!(peer.recv().await.expect("r2")["request_id"], "r2");
        assert_eq!(peer.recv().await.expect("click")["type"], "button_click");
        assert!(!manager.has_pending());
    }

    #[tokio::test]
    async fn test_oversized_message_is_rejected_not_buffered() {
        let (manager, _events, connector, _peers) = manager_with(BridgeOptions::new());

        let html = "x".repeat(MAX_OUTBOUND_FRAME_BYTES);
        let err = manager
            .deliver(BridgeMessage::page_source(RequestId::from("big"), "https://a.test/", html))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::FrameTooLarge { .. }));
        assert!(!manager.has_pending());
        assert!(connector.attempts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_disconnect_does_not_reconnect() {
        let (manager, mut events, connector, mut peers) = manager_with(BridgeOptions::new());
        manager
            .connect(BridgeMessage::init("x"))
            .await
            .expect("connect");
        let first = peers.recv().await.expect("peer");
        assert_eq!(events.recv().await, Some(BridgeEvent::Initialized));

        manager.disconnect();
        assert_eq!(
            events.recv().await,
            Some(BridgeEvent::Disconnected { reason: None })
        );
        drop(first);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(connector.attempts().len(), 1);
        assert_eq!(manager.state(), ChannelState::Disconnected);
        assert!(events.try_recv().is_err());

        manager
            .connect(BridgeMessage::init("again"))
            .await
            .expect("reconnect");
        let mut second = peers.recv().await.expect("peer");
        assert_eq!(second.recv().await.expect("init")["message"], "again");
        assert!(manager.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_spaced_and_stop_with_polling() {
        let options = BridgeOptions::new()
            .with_auto_reconnect(false)
            .with_reconnect_delay(Duration::from_secs(3))
            .with_poll_interval(Duration::from_secs(3600));
        let (manager, _events, connector, mut peers) = manager_with(options);

        manager
            .connect(BridgeMessage::init("x"))
            .await
            .expect("connect");
        let mut peer = peers.recv().await.expect("peer");
        manager.start_polling();

        for _ in 0..3 {
            drop(peer);
            peer = peers.recv().await.expect("reconnected peer");
        }

        let attempts = connector.attempts();
        assert_eq!(attempts.len(), 4);
        for pair in attempts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(3));
        }

        manager.stop_polling();
        drop(peer);
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(connector.attempts().len(), 4);
        assert!(peers.try_recv().is_err());
        assert_eq!(manager.state(), ChannelState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_attempts_are_capped() {
        let options = BridgeOptions::new()
            .with_reconnect_delay(Duration::from_secs(3))
            .with_max_reconnect_attempts(2);
        let (manager, _events, connector, mut peers) = manager_with(options);

        manager
            .connect(BridgeMessage::init("x"))
            .await
            .expect("connect");
        let peer = peers.recv().await.expect("peer");

        connector.set_failing(true);
        drop(peer);
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(connector.attempts().len(), 3);
        assert_eq!(manager.reconnect_attempts(), 2);
        assert_eq!(manager.state(), ChannelState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_frame_resets_attempts() {
        let options = BridgeOptions::new().with_reconnect_delay(Duration::from_secs(3));
        let (manager, mut events, _connector, mut peers) = manager_with(options);

        manager
            .connect(BridgeMessage::init("x"))
            .await
            .expect("connect");
        let peer = peers.recv().await.expect("peer");
        drop(peer);

        let mut peer = peers.recv().await.expect("reconnected peer");
        assert_eq!(manager.reconnect_attempts(), 1);

        peer.send(json!({"type": "notification"})).await;
        loop {
            if let Some(BridgeEvent::Inbound(_)) = events.recv().await {
                break;
            }
        }
        assert_eq!(manager.reconnect_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_probes_when_connected() {
        let options = BridgeOptions::new().with_poll_interval(Duration::from_secs(3));
        let (manager, _events, _connector, mut peers) = manager_with(options);

        manager
            .connect(BridgeMessage::init("x"))
            .await
            .expect("connect");
        let mut peer = peers.recv().await.expect("peer");

        let start = Instant::now();
        manager.start_polling();
        assert!(manager.is_polling());

        peer.recv_kind("check_messages").await;
        assert!(start.elapsed() >= Duration::from_secs(3));

        manager.stop_polling();
        assert!(!manager.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_connects_when_disconnected() {
        let options = BridgeOptions::new().with_poll_interval(Duration::from_secs(3));
        let (manager, _events, connector, mut peers) = manager_with(options);

        manager.start_polling();
        let mut peer = peers.recv().await.expect("peer");
        let init = peer.recv_kind("init").await;
        assert_eq!(init["message"], INIT_MESSAGE);
        assert_eq!(connector.attempts().len(), 1);
        assert!(manager.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_is_final() {
        let (manager, _events, connector, mut peers) = manager_with(BridgeOptions::new());
        manager
            .connect(BridgeMessage::init("x"))
            .await
            .expect("connect");
        manager.start_polling();
        let mut peer = peers.recv().await.expect("peer");

        manager.shutdown();
        assert!(!manager.is_polling());

        peer.recv_kind("init").await;
        assert!(peer.recv().await.is_none());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(connector.attempts().len(), 1);

        let err = manager
            .connect(BridgeMessage::init("y"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }
}

//! Bridge façade.
//!
//! Wires a [`ConnectionManager`] to a [`MessageRouter`] and runs the loop
//! that hands connection events to the router.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::connection::{
    BridgeEvent, ChannelState, ConnectOutcome, ConnectionManager, INIT_MESSAGE,
};
use crate::content::{ContentAgent, NotificationSurface, PageSource};
use crate::error::Result;
use crate::protocol::{BridgeMessage, ContentEvent};
use crate::router::MessageRouter;
use crate::tabs::TabHost;
use crate::transport::PeerConnector;

use super::builder::BridgeBuilder;
use super::options::BridgeOptions;

// ============================================================================
// Bridge
// ============================================================================

/// Shared bridge state.
struct BridgeInner {
    router: MessageRouter,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for BridgeInner {
    fn drop(&mut self) {
        if let Some(task) = self.dispatcher.get_mut().take() {
            task.abort();
        }
        self.router.manager().shutdown();
    }
}

/// Relay between browser tabs and the native peer.
///
/// Cheap to clone. Dropping the last handle shuts the bridge down.
///
/// # Example
///
/// ```ignore
/// let bridge = Bridge::builder()
///     .options(BridgeOptions::new().with_host_name("com.example.reader"))
///     .connector(Arc::new(ProcessConnector::new().register("com.example.reader", "/opt/reader/host")))
///     .tabs(tabs.clone())
///     .build()?;
///
/// bridge.start().await?;
/// bridge.start_polling();
/// ```
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("manager", self.manager())
            .field("router", &self.inner.router)
            .finish()
    }
}

// ============================================================================
// Bridge - Constructor & Accessors
// ============================================================================

impl Bridge {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::new()
    }

    /// Creates a bridge from validated parts.
    ///
    /// Must be called within a tokio runtime.
    pub(crate) fn new(
        options: BridgeOptions,
        connector: Arc<dyn PeerConnector>,
        tabs: Arc<dyn TabHost>,
    ) -> Self {
        let (manager, events) = ConnectionManager::new(options, connector);
        let router = MessageRouter::new(manager, tabs);

        let dispatcher = tokio::spawn(Self::run_dispatch(router.clone(), events));

        Self {
            inner: Arc::new(BridgeInner {
                router,
                dispatcher: Mutex::new(Some(dispatcher)),
            }),
        }
    }

    /// Returns the options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &BridgeOptions {
        self.manager().options()
    }

    /// Returns the connection manager.
    #[inline]
    #[must_use]
    pub fn manager(&self) -> &ConnectionManager {
        self.inner.router.manager()
    }

    /// Returns the router.
    #[inline]
    #[must_use]
    pub fn router(&self) -> &MessageRouter {
        &self.inner.router
    }

    /// Returns the channel state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.manager().state()
    }

    /// Returns `true` if a channel to the peer is open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.manager().is_connected()
    }

    /// Creates a content agent using this bridge's user event count and
    /// banner duration.
    #[must_use]
    pub fn content_agent(
        &self,
        page: Arc<dyn PageSource>,
        surface: Arc<dyn NotificationSurface>,
    ) -> ContentAgent {
        let options = self.options();
        ContentAgent::new(page, surface)
            .with_user_event_count(options.user_event_count)
            .with_banner_duration(options.banner_duration)
    }
}

// ============================================================================
// Bridge - Operations
// ============================================================================

impl Bridge {
    /// Connects to the native peer with the startup `init`.
    ///
    /// # Errors
    ///
    /// Returns the connect error; a reconnect is scheduled if keep-alive is
    /// enabled.
    pub async fn start(&self) -> Result<ConnectOutcome> {
        info!(host = %self.options().host_name, "Starting bridge");
        self.manager()
            .connect(BridgeMessage::init(INIT_MESSAGE))
            .await
    }

    /// Handles a user activation of the bridge.
    ///
    /// # Errors
    ///
    /// Returns the connect error if the bridge was disconnected and could
    /// not connect.
    pub async fn activate(&self) -> Result<()> {
        self.inner.router.activate().await
    }

    /// Forwards a user event raised in a tab.
    ///
    /// # Errors
    ///
    /// Returns the connect error if the event could not be delivered.
    pub async fn on_content_event(&self, event: ContentEvent) -> Result<()> {
        self.inner.router.dispatch_content(event).await
    }

    /// Starts polling the native peer.
    #[inline]
    pub fn start_polling(&self) {
        self.manager().start_polling();
    }

    /// Stops polling the native peer.
    #[inline]
    pub fn stop_polling(&self) {
        self.manager().stop_polling();
    }

    /// Stops the bridge.
    ///
    /// Cancels polling and reconnects and closes the channel. Later
    /// operations that need the peer fail with
    /// [`Error::ConnectionClosed`](crate::Error::ConnectionClosed).
    pub fn shutdown(&self) {
        if let Some(task) = self.inner.dispatcher.lock().take() {
            task.abort();
        }
        self.manager().shutdown();
    }
}

// ============================================================================
// Bridge - Dispatch Loop
// ============================================================================

impl Bridge {
    /// Hands connection events to the router.
    ///
    /// Each message is routed in its own task so that a slow tab cannot hold
    /// up heartbeats or other requests.
    async fn run_dispatch(router: MessageRouter, mut events: mpsc::UnboundedReceiver<BridgeEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                BridgeEvent::Inbound(message) => {
                    trace!(kind = message.kind(), "Routing peer message");
                    let router = router.clone();
                    tokio::spawn(async move { router.dispatch_peer(message).await });
                }

                BridgeEvent::Initialized => {
                    let router = router.clone();
                    tokio::spawn(async move { router.announce_initialized().await });
                }

                BridgeEvent::Disconnected { reason } => {
                    debug!(reason = reason.as_deref().unwrap_or("closed"), "Bridge lost peer");
                }
            }
        }
        debug!("Bridge dispatch loop stopped");
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

    use crate::content::{LogSurface, StaticPage};
    use crate::error::Error;
    use crate::identifiers::TabId;
    use crate::tabs::LocalTabs;
    use crate::testing::{DuplexConnector, FakePeer, init_tracing};

    struct Harness {
        bridge: Bridge,
        tabs: Arc<LocalTabs>,
        peers: mpsc::UnboundedReceiver<FakePeer>,
        connector: Arc<DuplexConnector>,
    }

    fn harness(options: BridgeOptions) -> Harness {
        init_tracing();
        let (connector, peers) = DuplexConnector::new();
        let tabs = Arc::new(LocalTabs::new());
        let bridge = Bridge::builder()
            .options(options)
            .connector(connector.clone())
            .tabs(tabs.clone())
            .build()
            .expect("build");
        Harness {
            bridge,
            tabs,
            peers,
            connector,
        }
    }

    fn open_tab(h: &Harness, url: &str, title: &str, html: &str) -> (TabId, Arc<LogSurface>) {
        let surface = Arc::new(LogSurface::with_display_region());
        let agent = h
            .bridge
            .content_agent(Arc::new(StaticPage::new(url, title, html)), surface.clone());
        (h.tabs.open(agent), surface)
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_announces_active_page() {
        let mut h = harness(BridgeOptions::new());
        let (_, surface) = open_tab(&h, "https://a.test/", "A", "<p>a</p>");

        let outcome = h.bridge.start().await.expect("start");
        assert_eq!(outcome, ConnectOutcome::Established);

        let mut peer = h.peers.recv().await.expect("peer");
        let init = peer.recv_kind("init").await;
        assert_eq!(init["message"], INIT_MESSAGE);

        let push = peer.recv_kind("set_active_page").await;
        assert_eq!(push["url"], "https://a.test/");
        assert_eq!(push["title"], "A");

        while surface.active_banners().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(surface.active_banners()[0].starts_with("connected to local service"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_without_tabs_gets_error_response() {
        let mut h = harness(BridgeOptions::new());
        h.bridge.start().await.expect("start");
        let mut peer = h.peers.recv().await.expect("peer");

        peer.send(json!({"type": "get_page_source", "request_id": "r1"}))
            .await;

        let response = peer.recv_kind("page_source_response").await;
        assert_eq!(response["type"], "page_source_response");
        assert_eq!(response["request_id"], "r1");
        assert_eq!(response["url"], "unknown");
        assert_eq!(response["error"], "no active tab");
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_not_forwarded_to_tab() {
        let mut h = harness(BridgeOptions::new());
        let (_, surface) = open_tab(&h, "https://a.test/", "A", "<p>a</p>");
        h.bridge.start().await.expect("start");
        let mut peer = h.peers.recv().await.expect("peer");

        peer.send(json!({"type": "heartbeat"})).await;
        peer.send(json!({"type": "notification", "content": "hi"}))
            .await;

        let ack = peer.recv_kind("heartbeat").await;
        assert_eq!(ack, json!({"action": "heartbeat"}));

        while surface.entries().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(
            surface.entries(),
            vec![r#"{"content":"hi","type":"notification"}"#.to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_follows_tab_switch() {
        let mut h = harness(BridgeOptions::new());
        let (first, _) = open_tab(&h, "https://a.test/", "A", "<p>a</p>");
        let (second, _) = open_tab(&h, "https://b.test/", "B", "<p>b</p>");

        h.bridge.start().await.expect("start");
        let mut peer = h.peers.recv().await.expect("peer");
        let announced = peer.recv_kind("set_active_page").await;
        assert_eq!(announced["title"], "B");

        h.tabs.activate(first).expect("activate");
        h.bridge.activate().await.expect("activate");
        assert_eq!(peer.recv_kind("set_active_page").await["title"], "A");

        h.tabs.activate(second).expect("activate");
        h.bridge.activate().await.expect("activate");
        assert_eq!(peer.recv_kind("set_active_page").await["title"], "B");
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_event_reaches_peer() {
        let mut h = harness(BridgeOptions::new());
        let surface = Arc::new(LogSurface::new());
        let agent = h.bridge.content_agent(
            Arc::new(StaticPage::new("https://a.test/", "A", "<p>a</p>")),
            surface,
        );
        h.bridge.start().await.expect("start");
        let mut peer = h.peers.recv().await.expect("peer");

        let event = agent.user_event(3, json!({"button": 3})).expect("event");
        h.bridge.on_content_event(event).await.expect("forward");

        let click = peer.recv_kind("button_click").await;
        assert_eq!(click["message"], json!({"button": 3}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_event_while_disconnected_is_flushed() {
        let mut h = harness(BridgeOptions::new());

        h.bridge
            .on_content_event(ContentEvent::ButtonClick {
                index: 1,
                message: json!("first"),
            })
            .await
            .expect("forward");

        let mut peer = h.peers.recv().await.expect("peer");
        assert_eq!(peer.recv_kind("init").await["message"], INIT_MESSAGE);
        assert_eq!(peer.recv().await.expect("click")["message"], "first");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_everything() {
        let mut h = harness(BridgeOptions::new());
        h.bridge.start().await.expect("start");
        h.bridge.start_polling();
        let mut peer = h.peers.recv().await.expect("peer");

        h.bridge.shutdown();
        assert_eq!(h.bridge.state(), ChannelState::Disconnected);

        while peer.recv().await.is_some() {}

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(h.connector.attempts().len(), 1);
        assert!(matches!(
            h.bridge.start().await.unwrap_err(),
            Error::ConnectionClosed
        ));
    }

    #[test]
    fn test_builder_requires_parts() {
        let err = Bridge::builder().build().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}

//! Message router.
//!
//! Classifies peer messages and content events and carries them to their
//! destination: the active tab, the native peer, or an internal handler.
//! The active tab is queried again for every operation.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::connection::ConnectionManager;
use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::{BridgeMessage, CaptureReply, ContentEvent, PeerMessage, TabMessage};
use crate::tabs::{ActiveTabRef, TabHost};

use super::pending::{Admission, PendingGuard, PendingRequests};

// ============================================================================
// Constants
// ============================================================================

/// Notice shown once the peer has been initialized.
pub const CONNECTED_NOTICE: &str = "connected to local service";

/// Appended to [`CONNECTED_NOTICE`] when the active page was pushed.
pub const ACTIVE_PAGE_NOTICE: &str = "current page set as active";

/// Notice shown while an activation waits for a connection.
pub const CONNECTING_NOTICE: &str = "connecting to local service";

/// `init` message sent when an activation opens the channel.
pub const ACTIVATION_MESSAGE: &str = "browser action activated";

// ============================================================================
// MessageRouter
// ============================================================================

/// Shared router state.
struct RouterInner {
    manager: ConnectionManager,
    tabs: Arc<dyn TabHost>,
    pending: PendingRequests,
    request_timeout: Duration,
    activation_delay: Duration,
}

/// Dispatches messages between the native peer and tabs.
///
/// Cheap to clone; every clone routes through the same pending table.
#[derive(Clone)]
pub struct MessageRouter {
    inner: Arc<RouterInner>,
}

impl fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageRouter")
            .field("pending", &self.inner.pending.len())
            .field("request_timeout", &self.inner.request_timeout)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// MessageRouter - Constructor & Accessors
// ============================================================================

impl MessageRouter {
    /// Creates a router over a connection manager and a tab host.
    ///
    /// Timeouts and delays come from the manager's options.
    #[must_use]
    pub fn new(manager: ConnectionManager, tabs: Arc<dyn TabHost>) -> Self {
        let options = manager.options();
        let request_timeout = options.request_timeout;
        let activation_delay = options.activation_delay;

        Self {
            inner: Arc::new(RouterInner {
                manager,
                tabs,
                pending: PendingRequests::new(),
                request_timeout,
                activation_delay,
            }),
        }
    }

    /// Returns the connection manager.
    #[inline]
    #[must_use]
    pub fn manager(&self) -> &ConnectionManager {
        &self.inner.manager
    }

    /// Returns the in-flight request table.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> &PendingRequests {
        &self.inner.pending
    }
}

// ============================================================================
// MessageRouter - Peer Messages
// ============================================================================

impl MessageRouter {
    /// Routes one message received from the native peer.
    ///
    /// Never fails: errors are answered or logged.
    pub async fn dispatch_peer(&self, message: PeerMessage) {
        match message {
            PeerMessage::Heartbeat | PeerMessage::HeartbeatAck => {
                debug!(kind = message.kind(), "Heartbeat reached router, ignoring");
            }

            PeerMessage::GetPageSource { request_id } => {
                self.answer_page_source(request_id).await;
            }

            PeerMessage::Forward(value) => {
                self.forward_to_active_tab(value).await;
            }
        }
    }

    /// Answers one `get_page_source` request.
    ///
    /// Exactly one response is sent per accepted request, success or error.
    /// A request whose ID is already in flight is left to the first exchange.
    pub async fn answer_page_source(&self, request_id: RequestId) {
        let response = match self.inner.pending.begin(&request_id) {
            Admission::Duplicate => {
                warn!(request_id = %request_id, "Duplicate in-flight request, not dispatching");
                return;
            }
            Admission::Full => {
                error!(request_id = %request_id, "Refusing request, too many pending");
                BridgeMessage::page_source_error(request_id.clone(), "too many pending requests")
            }
            Admission::Accepted => {
                let _guard = PendingGuard::new(&self.inner.pending, &request_id);
                self.capture_response(&request_id).await
            }
        };

        match self.inner.manager.deliver(response).await {
            Ok(()) => {}
            Err(e @ Error::FrameTooLarge { .. }) => {
                warn!(
                    request_id = %request_id,
                    error = %e,
                    "Page source too large, answering with error"
                );
                let fallback = BridgeMessage::page_source_error(request_id, e.wire_reason());
                if let Err(e) = self.inner.manager.deliver(fallback).await {
                    error!(error = %e, "Failed to deliver page source response");
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to deliver page source response");
            }
        }
    }

    async fn capture_response(&self, request_id: &RequestId) -> BridgeMessage {
        let limit = self.inner.request_timeout;

        let result = match timeout(limit, self.capture_active(request_id)).await {
            Ok(result) => result,
            Err(_) => Err(Error::request_timeout(
                request_id.clone(),
                limit.as_millis() as u64,
            )),
        };

        match result {
            Ok((tab, html)) => {
                debug!(
                    request_id = %request_id,
                    tab_id = %tab.tab_id,
                    bytes = html.len(),
                    "Page source captured"
                );
                BridgeMessage::page_source(request_id.clone(), tab.url, html)
            }
            Err(e) => {
                error!(request_id = %request_id, error = %e, "Page source request failed");
                BridgeMessage::page_source_error(request_id.clone(), e.wire_reason())
            }
        }
    }

    async fn forward_to_active_tab(&self, value: Value) {
        let tab = match self.resolve_active_tab().await {
            Ok(tab) => tab,
            Err(e) => {
                warn!(error = %e, "Dropping forwarded message");
                return;
            }
        };

        debug!(tab_id = %tab.tab_id, "Forwarding peer message to tab");
        if let Err(e) = self
            .inner
            .tabs
            .send_message(tab.tab_id, TabMessage::forward(value))
            .await
        {
            warn!(tab_id = %tab.tab_id, error = %e, "Failed to forward message to tab");
        }
    }
}

// ============================================================================
// MessageRouter - Bridge Operations
// ============================================================================

impl MessageRouter {
    /// Captures the active tab and pushes it as `set_active_page`.
    ///
    /// # Errors
    ///
    /// - [`Error::NoActiveTab`] if no tab is active
    /// - [`Error::TabUnreachable`] if the tab has no content agent
    /// - [`Error::CaptureFailed`] if the capture produced nothing
    /// - [`Error::RequestTimeout`] if the capture took too long
    /// - connection errors if the push could not be delivered
    pub async fn push_active_page(&self) -> Result<()> {
        let request_id = RequestId::generate();
        let limit = self.inner.request_timeout;

        let (tab, html) = timeout(limit, self.capture_active(&request_id))
            .await
            .map_err(|_| Error::request_timeout(request_id.clone(), limit.as_millis() as u64))??;

        info!(tab_id = %tab.tab_id, url = %tab.url, "Pushing active page");
        self.inner
            .manager
            .deliver(BridgeMessage::set_active_page(tab.url, tab.title, html))
            .await
    }

    /// Shows a notice in the active tab.
    ///
    /// Best effort: failures are logged.
    pub async fn notify_tab(&self, message: &str) {
        let tab = match self.resolve_active_tab().await {
            Ok(tab) => tab,
            Err(e) => {
                debug!(error = %e, "No tab to notify");
                return;
            }
        };

        if let Err(e) = self
            .inner
            .tabs
            .send_message(tab.tab_id, TabMessage::plugin_activated(message))
            .await
        {
            warn!(tab_id = %tab.tab_id, error = %e, "Failed to notify tab");
        }
    }

    /// Handles a user activation of the bridge.
    ///
    /// When connected, pushes the active page and reports the outcome to the
    /// tab. Otherwise connects with an `init` describing the active tab; the
    /// page is pushed by [`announce_initialized`](Self::announce_initialized)
    /// once the peer has it.
    ///
    /// # Errors
    ///
    /// Returns the connect error if the channel could not be opened.
    pub async fn activate(&self) -> Result<()> {
        if self.inner.manager.is_connected() {
            match self.push_active_page().await {
                Ok(()) => self.notify_tab(ACTIVE_PAGE_NOTICE).await,
                Err(e) => {
                    warn!(error = %e, "Failed to push active page");
                    self.notify_tab(&format!("failed to set active page: {}", e.wire_reason()))
                        .await;
                }
            }
            return Ok(());
        }

        let init = match self.resolve_active_tab().await {
            Ok(tab) => BridgeMessage::init_for_page(ACTIVATION_MESSAGE, tab.url, tab.title),
            Err(_) => BridgeMessage::init(ACTIVATION_MESSAGE),
        };

        self.notify_tab(CONNECTING_NOTICE).await;
        self.inner.manager.connect(init).await.map(|_| ())
    }

    /// Runs after an `init` reached the peer.
    ///
    /// Waits the activation delay, pushes the active page, then tells the
    /// tab the bridge is connected.
    pub async fn announce_initialized(&self) {
        sleep(self.inner.activation_delay).await;

        let notice = match self.push_active_page().await {
            Ok(()) => format!("{CONNECTED_NOTICE}, {ACTIVE_PAGE_NOTICE}"),
            Err(e) => {
                warn!(error = %e, "Could not push active page after init");
                CONNECTED_NOTICE.to_string()
            }
        };

        self.notify_tab(&notice).await;
    }

    /// Forwards a user event raised in a tab to the native peer.
    ///
    /// # Errors
    ///
    /// Returns the connect error if the event could not be delivered. The
    /// event stays buffered for the next channel.
    pub async fn dispatch_content(&self, event: ContentEvent) -> Result<()> {
        match event {
            ContentEvent::ButtonClick { index, message } => {
                debug!(index, "User event from tab");
                self.inner
                    .manager
                    .deliver(BridgeMessage::button_click(message))
                    .await
            }
        }
    }
}

// ============================================================================
// MessageRouter - Tab Access
// ============================================================================

impl MessageRouter {
    async fn resolve_active_tab(&self) -> Result<ActiveTabRef> {
        self.inner
            .tabs
            .query_active_tab()
            .await?
            .ok_or(Error::NoActiveTab)
    }

    /// Asks the active tab's content agent for a snapshot.
    async fn capture_active(&self, request_id: &RequestId) -> Result<(ActiveTabRef, String)> {
        let tab = self.resolve_active_tab().await?;

        let reply = self
            .inner
            .tabs
            .send_message(tab.tab_id, TabMessage::get_page_source(request_id.clone()))
            .await?;

        let reply = CaptureReply::from_reply(reply)?;
        if reply.request_id != *request_id {
            return Err(Error::capture_failed(format!(
                "reply for {} while waiting for {}",
                reply.request_id, request_id
            )));
        }

        Ok((tab, reply.into_result()?))
    }
}

// ============================================================================
// Tests
// ============================================================================

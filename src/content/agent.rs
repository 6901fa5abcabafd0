//! Tab content agent.
//!
//! The agent runs inside a page. It answers capture requests from the
//! bridge, renders forwarded messages, and turns numbered user events into
//! [`ContentEvent`]s.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::capture::{CaptureOptions, CapturePipeline, SanitizedSnapshot};
use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::{CaptureReply, ContentEvent, TabControl, TabMessage};

use super::notify::NotificationSurface;
use super::page::PageSource;

// ============================================================================
// Constants
// ============================================================================

/// Default number of user events.
pub const DEFAULT_USER_EVENT_COUNT: usize = 4;

/// Default banner display time.
pub const DEFAULT_BANNER_DURATION: Duration = Duration::from_secs(3);

// ============================================================================
// ContentAgent
// ============================================================================

/// Agent living in one tab.
///
/// # Example
///
/// ```ignore
/// let page = Arc::new(StaticPage::new("https://example.com/", "Example", html));
/// let agent = ContentAgent::new(page, Arc::new(LogSurface::new()));
///
/// let reply = agent.handle_message(TabMessage::get_page_source(id)).await;
/// ```
pub struct ContentAgent {
    page: Arc<dyn PageSource>,
    surface: Arc<dyn NotificationSurface>,
    pipeline: CapturePipeline,
    banner_duration: Duration,
    user_event_count: usize,
}

impl fmt::Debug for ContentAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentAgent")
            .field("url", &self.page.url())
            .field("pipeline", &self.pipeline)
            .field("user_event_count", &self.user_event_count)
            .finish_non_exhaustive()
    }
}

impl ContentAgent {
    /// Creates an agent with default options.
    pub fn new(page: Arc<dyn PageSource>, surface: Arc<dyn NotificationSurface>) -> Self {
        Self {
            page,
            surface,
            pipeline: CapturePipeline::default(),
            banner_duration: DEFAULT_BANNER_DURATION,
            user_event_count: DEFAULT_USER_EVENT_COUNT,
        }
    }

    /// Sets the capture options.
    #[must_use]
    pub fn with_capture_options(mut self, options: CaptureOptions) -> Self {
        self.pipeline = CapturePipeline::new(options);
        self
    }

    /// Sets the banner display time.
    #[must_use]
    pub fn with_banner_duration(mut self, duration: Duration) -> Self {
        self.banner_duration = duration;
        self
    }

    /// Sets the number of accepted user events.
    #[must_use]
    pub fn with_user_event_count(mut self, count: usize) -> Self {
        self.user_event_count = count;
        self
    }

    /// The page this agent lives in.
    #[inline]
    #[must_use]
    pub fn page(&self) -> &Arc<dyn PageSource> {
        &self.page
    }

    /// Captures the page.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CaptureFailed`] if no HTML could be obtained.
    pub async fn capture(&self) -> Result<SanitizedSnapshot> {
        self.pipeline.capture(self.page.as_ref()).await
    }

    /// Handles a message from the bridge.
    ///
    /// Returns the reply for messages that expect one. Never fails: capture
    /// errors become error replies and rendering falls back to a banner.
    pub async fn handle_message(&self, message: TabMessage) -> Option<Value> {
        match message {
            TabMessage::Control(TabControl::GetPageSource { request_id }) => {
                Some(self.answer_capture(request_id).await)
            }

            TabMessage::Control(TabControl::PluginActivated { message }) => {
                self.surface.show_banner(&message, self.banner_duration);
                None
            }

            TabMessage::Forward(value) => {
                self.render(&value);
                None
            }
        }
    }

    /// Builds the event for user event `index` (1-based).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUserEvent`] if `index` is outside
    /// `1..=user_event_count`.
    pub fn user_event(&self, index: usize, detail: Value) -> Result<ContentEvent> {
        if index == 0 || index > self.user_event_count {
            return Err(Error::invalid_user_event(index, self.user_event_count));
        }
        Ok(ContentEvent::ButtonClick {
            index,
            message: detail,
        })
    }

    async fn answer_capture(&self, request_id: RequestId) -> Value {
        debug!(request_id = %request_id, "Capture requested");

        let reply = match self.capture().await {
            Ok(snapshot) => CaptureReply::success(request_id, snapshot.into_html()),
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "Capture failed");
                CaptureReply::failure(request_id, e.wire_reason())
            }
        };

        serde_json::to_value(&reply).unwrap_or_else(|e| {
            warn!(error = %e, "Capture reply not serializable");
            Value::Null
        })
    }

    fn render(&self, value: &Value) {
        let text = render_text(value);
        if !self.surface.append_entry(&text) {
            debug!("No display region, showing banner");
            self.surface.show_banner(&text, self.banner_duration);
        }
    }
}

/// JSON text of a forwarded message; string payloads holding JSON are
/// decoded first.
fn render_text(value: &Value) -> String {
    match value {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(inner) => inner.to_string(),
            Err(_) => value.to_string(),
        },
        other => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Tab-local message types.
//!
//! Messages between the bridge background and a tab's content agent.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

// ============================================================================
// TabMessage
// ============================================================================

/// A message delivered to a content agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TabMessage {
    /// Messages the content agent acts on.
    Control(TabControl),
    /// Native peer message forwarded verbatim.
    Forward(Value),
}

/// Control messages understood by the content agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TabControl {
    /// Show a transient activation banner.
    PluginActivated {
        /// Banner text.
        message: String,
    },

    /// Capture the page and reply with a [`CaptureReply`].
    GetPageSource {
        /// Correlation ID echoed in the reply.
        request_id: RequestId,
    },
}

impl TabMessage {
    /// Creates an activation notice.
    #[inline]
    #[must_use]
    pub fn plugin_activated(message: impl Into<String>) -> Self {
        Self::Control(TabControl::PluginActivated {
            message: message.into(),
        })
    }

    /// Creates a capture request.
    #[inline]
    #[must_use]
    pub fn get_page_source(request_id: RequestId) -> Self {
        Self::Control(TabControl::GetPageSource { request_id })
    }

    /// Wraps a peer message for verbatim delivery.
    #[inline]
    #[must_use]
    pub fn forward(value: Value) -> Self {
        Self::Forward(value)
    }
}

// ============================================================================
// CaptureReply
// ============================================================================

/// Content agent reply to a capture request.
///
/// # Format
///
/// ```json
/// { "request_id": "r1", "source_code": "<!DOCTYPE html>..." }
/// { "request_id": "r1", "error": "document is gone" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureReply {
    /// Matches the request.
    pub request_id: RequestId,

    /// Snapshot HTML (if success).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_code: Option<String>,

    /// Failure reason (if error).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CaptureReply {
    /// Creates a success reply.
    #[inline]
    #[must_use]
    pub fn success(request_id: RequestId, source_code: String) -> Self {
        Self {
            request_id,
            source_code: Some(source_code),
            error: None,
        }
    }

    /// Creates an error reply.
    #[inline]
    #[must_use]
    pub fn failure(request_id: RequestId, error: impl Into<String>) -> Self {
        Self {
            request_id,
            source_code: None,
            error: Some(error.into()),
        }
    }

    /// Decodes a reply from the raw value returned by a tab.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CaptureFailed`] if there was no reply or it does not
    /// have the reply shape.
    pub fn from_reply(reply: Option<Value>) -> Result<Self> {
        let value = reply.ok_or_else(|| Error::capture_failed("content agent sent no reply"))?;
        serde_json::from_value(value)
            .map_err(|e| Error::capture_failed(format!("unreadable capture reply: {e}")))
    }

    /// Extracts the HTML, returning error if the agent reported one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CaptureFailed`] if the reply carries no HTML.
    pub fn into_result(self) -> Result<String> {
        match self.source_code {
            Some(html) if !html.is_empty() => Ok(html),
            _ => Err(Error::capture_failed(
                self.error
                    .unwrap_or_else(|| "content agent returned no source".to_string()),
            )),
        }
    }
}

// ============================================================================
// ContentEvent
// ============================================================================

/// User-originated event raised inside a tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentEvent {
    /// One of the numbered user events.
    ButtonClick {
        /// Event number, starting at 1.
        index: usize,
        /// Opaque detail payload.
        message: Value,
    },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_control_serialization() {
        let value = serde_json::to_value(TabMessage::plugin_activated("hello")).expect("serialize");
        assert_eq!(value, json!({"type": "plugin_activated", "message": "hello"}));

        let value = serde_json::to_value(TabMessage::get_page_source(RequestId::from("r2")))
            .expect("serialize");
        assert_eq!(value, json!({"type": "get_page_source", "request_id": "r2"}));
    }

    #[test]
    fn test_forward_is_verbatim() {
        let original = json!({"type": "notification", "content": "hi", "n": 1});
        let value = serde_json::to_value(TabMessage::forward(original.clone())).expect("serialize");
        assert_eq!(value, original);
    }

    #[test]
    fn test_untagged_parse_prefers_control() {
        let parsed: TabMessage =
            serde_json::from_value(json!({"type": "get_page_source", "request_id": "a"}))
                .expect("parse");
        assert_eq!(parsed, TabMessage::get_page_source(RequestId::from("a")));

        let parsed: TabMessage =
            serde_json::from_value(json!({"type": "system", "content": "x"})).expect("parse");
        assert!(matches!(parsed, TabMessage::Forward(_)));
    }

    #[test]
    fn test_capture_reply_success() {
        let reply = CaptureReply::from_reply(Some(json!({
            "request_id": "r1",
            "source_code": "<html></html>"
        })))
        .expect("decode");
        assert_eq!(reply.into_result().expect("html"), "<html></html>");
    }

    #[test]
    fn test_capture_reply_error() {
        let reply = CaptureReply::failure(RequestId::from("r1"), "boom");
        let err = reply.into_result().unwrap_err();
        assert_eq!(err.wire_reason(), "boom");
    }

    #[test]
    fn test_capture_reply_missing() {
        assert!(CaptureReply::from_reply(None).is_err());
        assert!(CaptureReply::from_reply(Some(json!("text"))).is_err());
    }

    #[test]
    fn test_empty_source_is_error() {
        let reply = CaptureReply::success(RequestId::from("r1"), String::new());
        assert!(reply.into_result().is_err());
    }

    #[test]
    fn test_content_event_serialization() {
        let event = ContentEvent::ButtonClick {
            index: 2,
            message: json!("pressed"),
        };
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value["type"], "button_click");
        assert_eq!(value["index"], 2);
    }
}

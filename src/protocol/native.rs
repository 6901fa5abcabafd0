//! Native peer message types.
//!
//! Messages exchanged with the native peer over the framed stdio channel.
//! Outbound messages carry either an `action` or a `type` discriminator,
//! mirroring what the peer expects; inbound messages are classified into
//! [`PeerMessage`].
//!
//! # Outbound
//!
//! | Message | Discriminator |
//! |---------|---------------|
//! | `init` | `action` |
//! | `check_messages` | `action` |
//! | `heartbeat` (ack) | `action` |
//! | `page_source_response` | `type` |
//! | `set_active_page` | `type` |
//! | `button_click` | `type` |

// ============================================================================
// Imports
// ============================================================================

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capture::escape_html;
use crate::error::{Error, Result};
use crate::identifiers::RequestId;

// ============================================================================
// Constants
// ============================================================================

/// URL reported in error responses.
pub const UNKNOWN_URL: &str = "unknown";

// ============================================================================
// BridgeMessage
// ============================================================================

/// A message from the bridge to the native peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BridgeMessage {
    /// Messages discriminated by `action`.
    Action(ActionMessage),
    /// Messages discriminated by `type`.
    Typed(TypedMessage),
}

/// Control messages discriminated by `action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionMessage {
    /// Connection probe sent first on every channel.
    Init {
        /// Human-readable reason for the connect.
        message: String,
        /// ISO-8601 timestamp.
        timestamp: String,
        /// Active tab URL, if known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        /// Active tab title, if known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },

    /// Polling-mode probe.
    CheckMessages,

    /// Heartbeat acknowledgement.
    Heartbeat,
}

/// Data messages discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypedMessage {
    /// Answer to a `get_page_source` request.
    PageSourceResponse {
        /// Request being answered.
        request_id: RequestId,
        /// Page URL, or `"unknown"` on error.
        url: String,
        /// Snapshot HTML, or a synthesized error page.
        source_code: String,
        /// Failure reason, present only on error.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Pushes the active tab's snapshot.
    SetActivePage {
        /// Page URL.
        url: String,
        /// Page title.
        title: String,
        /// Snapshot HTML.
        html_content: String,
    },

    /// User-originated event from a tab.
    ButtonClick {
        /// Opaque event detail.
        message: Value,
        /// ISO-8601 timestamp.
        timestamp: String,
    },
}

// ============================================================================
// BridgeMessage - Constructors
// ============================================================================

impl BridgeMessage {
    /// Creates an `init` probe.
    #[must_use]
    pub fn init(message: impl Into<String>) -> Self {
        Self::Action(ActionMessage::Init {
            message: message.into(),
            timestamp: timestamp_now(),
            url: None,
            title: None,
        })
    }

    /// Creates an `init` probe describing the page that triggered it.
    #[must_use]
    pub fn init_for_page(
        message: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self::Action(ActionMessage::Init {
            message: message.into(),
            timestamp: timestamp_now(),
            url: Some(url.into()),
            title: Some(title.into()),
        })
    }

    /// Creates a polling probe.
    #[inline]
    #[must_use]
    pub fn check_messages() -> Self {
        Self::Action(ActionMessage::CheckMessages)
    }

    /// Creates a heartbeat acknowledgement.
    #[inline]
    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self::Action(ActionMessage::Heartbeat)
    }

    /// Creates a successful page source response.
    #[must_use]
    pub fn page_source(
        request_id: RequestId,
        url: impl Into<String>,
        source_code: impl Into<String>,
    ) -> Self {
        Self::Typed(TypedMessage::PageSourceResponse {
            request_id,
            url: url.into(),
            source_code: source_code.into(),
            error: None,
        })
    }

    /// Creates an error page source response.
    ///
    /// The URL is always `"unknown"` and the body is a synthesized error page.
    #[must_use]
    pub fn page_source_error(request_id: RequestId, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::Typed(TypedMessage::PageSourceResponse {
            request_id,
            url: UNKNOWN_URL.to_string(),
            source_code: format!(
                "<html><body><h1>Error: {}</h1></body></html>",
                escape_html(&reason)
            ),
            error: Some(reason),
        })
    }

    /// Creates a `set_active_page` push.
    #[must_use]
    pub fn set_active_page(
        url: impl Into<String>,
        title: impl Into<String>,
        html_content: impl Into<String>,
    ) -> Self {
        Self::Typed(TypedMessage::SetActivePage {
            url: url.into(),
            title: title.into(),
            html_content: html_content.into(),
        })
    }

    /// Creates a `button_click` forward.
    #[must_use]
    pub fn button_click(message: Value) -> Self {
        Self::Typed(TypedMessage::ButtonClick {
            message,
            timestamp: timestamp_now(),
        })
    }
}

// ============================================================================
// BridgeMessage - Accessors
// ============================================================================

impl BridgeMessage {
    /// Returns the wire discriminator value.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Action(ActionMessage::Init { .. }) => "init",
            Self::Action(ActionMessage::CheckMessages) => "check_messages",
            Self::Action(ActionMessage::Heartbeat) => "heartbeat",
            Self::Typed(TypedMessage::PageSourceResponse { .. }) => "page_source_response",
            Self::Typed(TypedMessage::SetActivePage { .. }) => "set_active_page",
            Self::Typed(TypedMessage::ButtonClick { .. }) => "button_click",
        }
    }

    /// Returns `true` for an `init` probe.
    #[inline]
    #[must_use]
    pub fn is_init(&self) -> bool {
        matches!(self, Self::Action(ActionMessage::Init { .. }))
    }

    /// Returns the request ID for page source responses.
    #[must_use]
    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            Self::Typed(TypedMessage::PageSourceResponse { request_id, .. }) => Some(request_id),
            _ => None,
        }
    }
}

// ============================================================================
// PeerMessage
// ============================================================================

/// A classified message from the native peer.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerMessage {
    /// `{type:"heartbeat"}`; answered with an acknowledgement.
    Heartbeat,

    /// `{action:"heartbeat"}`; the peer acknowledging one of ours.
    HeartbeatAck,

    /// `{type:"get_page_source", request_id}`.
    GetPageSource {
        /// Correlation ID to echo in the response.
        request_id: RequestId,
    },

    /// Anything else; forwarded verbatim to the active tab.
    Forward(Value),
}

impl PeerMessage {
    /// Parses a raw frame payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedEnvelope`] if the payload is not a JSON
    /// object with a `type` or `action` discriminator, or if a
    /// `get_page_source` request carries no usable `request_id`.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let value: Value =
            serde_json::from_slice(payload).map_err(|e| Error::malformed(e.to_string()))?;
        Self::from_value(value)
    }

    /// Classifies an already-decoded JSON value.
    ///
    /// # Errors
    ///
    /// See [`PeerMessage::parse`].
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::malformed("expected a JSON object"));
        }

        let kind = value.get("type").and_then(Value::as_str).map(str::to_owned);
        let action = value.get("action").and_then(Value::as_str).map(str::to_owned);

        match (kind.as_deref(), action.as_deref()) {
            (Some("heartbeat"), _) => Ok(Self::Heartbeat),
            (Some("get_page_source"), _) => {
                let request_id = value
                    .get("request_id")
                    .and_then(RequestId::from_value)
                    .ok_or_else(|| Error::malformed("get_page_source without request_id"))?;
                Ok(Self::GetPageSource { request_id })
            }
            (None, Some("heartbeat")) => Ok(Self::HeartbeatAck),
            (Some(_), _) | (None, Some(_)) => Ok(Self::Forward(value)),
            (None, None) => Err(Error::malformed("missing type or action discriminator")),
        }
    }

    /// Returns a short label for logging.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Heartbeat => "heartbeat",
            Self::HeartbeatAck => "heartbeat_ack",
            Self::GetPageSource { .. } => "get_page_source",
            Self::Forward(value) => value
                .get("type")
                .or_else(|| value.get("action"))
                .and_then(Value::as_str)
                .unwrap_or("unknown"),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Current time as an ISO-8601 string with millisecond precision.
pub(crate) fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ============================================================================
// Tests
// ============================================================================

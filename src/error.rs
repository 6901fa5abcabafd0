//! Error types for the page bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use page_bridge::{Result, Error};
//!
//! async fn example(manager: &ConnectionManager) -> Result<()> {
//!     manager.send(BridgeMessage::check_messages())?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::NotConnected`], [`Error::PeerUnreachable`], [`Error::ConnectionClosed`] |
//! | Protocol | [`Error::MalformedEnvelope`], [`Error::FrameTooLarge`] |
//! | Tabs | [`Error::NoActiveTab`], [`Error::TabUnreachable`], [`Error::InvalidUserEvent`] |
//! | Capture | [`Error::CaptureFailed`] |
//! | Execution | [`Error::RequestTimeout`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::Http`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;

use crate::identifiers::{RequestId, TabId};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when bridge or capture options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// No channel to the native peer exists.
    ///
    /// The caller must connect before sending.
    #[error("Not connected to native peer")]
    NotConnected,

    /// The native peer could not be reached.
    ///
    /// Returned when the peer process cannot be started or a write fails.
    #[error("Native peer unreachable: {message}")]
    PeerUnreachable {
        /// Description of the failure.
        message: String,
    },

    /// Channel closed while an operation was in flight.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Inbound payload could not be classified.
    #[error("Malformed envelope: {message}")]
    MalformedEnvelope {
        /// Description of what was wrong with the payload.
        message: String,
    },

    /// Frame exceeds the native messaging size limit.
    #[error("Frame of {size} bytes exceeds limit of {max} bytes")]
    FrameTooLarge {
        /// Size of the offending frame.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    // ========================================================================
    // Tab Errors
    // ========================================================================
    /// No active tab in the current window.
    #[error("No active tab")]
    NoActiveTab,

    /// Message could not be delivered to the tab's content agent.
    #[error("Tab {tab_id} unreachable: {message}")]
    TabUnreachable {
        /// Target tab.
        tab_id: TabId,
        /// Description of the delivery failure.
        message: String,
    },

    /// User event index outside the accepted range.
    #[error("User event {index} out of range 1..={max}")]
    InvalidUserEvent {
        /// Requested event index.
        index: usize,
        /// Highest accepted index.
        max: usize,
    },

    // ========================================================================
    // Capture Errors
    // ========================================================================
    /// Page capture failed.
    ///
    /// Returned when neither the network refetch nor the DOM serialization
    /// produced any HTML.
    #[error("Capture failed: {message}")]
    CaptureFailed {
        /// Description of the capture failure.
        message: String,
    },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// Page source request timeout.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a peer unreachable error.
    #[inline]
    pub fn peer_unreachable(message: impl Into<String>) -> Self {
        Self::PeerUnreachable {
            message: message.into(),
        }
    }

    /// Creates a malformed envelope error.
    #[inline]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedEnvelope {
            message: message.into(),
        }
    }

    /// Creates a frame too large error.
    #[inline]
    pub fn frame_too_large(size: usize, max: usize) -> Self {
        Self::FrameTooLarge { size, max }
    }

    /// Creates a tab unreachable error.
    #[inline]
    pub fn tab_unreachable(tab_id: TabId, message: impl Into<String>) -> Self {
        Self::TabUnreachable {
            tab_id,
            message: message.into(),
        }
    }

    /// Creates an invalid user event error.
    #[inline]
    pub fn invalid_user_event(index: usize, max: usize) -> Self {
        Self::InvalidUserEvent { index, max }
    }

    /// Creates a capture failed error.
    #[inline]
    pub fn capture_failed(message: impl Into<String>) -> Self {
        Self::CaptureFailed {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::PeerUnreachable { .. } | Self::ConnectionClosed
        )
    }
}

// ============================================================================
// Wire Reasons
// ============================================================================

impl Error {
    /// Short reason placed in the `error` field of synthesized responses.
    #[must_use]
    pub fn wire_reason(&self) -> String {
        match self {
            Self::NoActiveTab => "no active tab".to_string(),
            Self::TabUnreachable { .. } => "content agent unreachable".to_string(),
            Self::CaptureFailed { message } => message.clone(),
            Self::RequestTimeout { .. } => "request timed out".to_string(),
            Self::FrameTooLarge { .. } => "page source too large".to_string(),
            Self::NotConnected | Self::ConnectionClosed | Self::PeerUnreachable { .. } => {
                "native peer unreachable".to_string()
            }
            other => other.to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

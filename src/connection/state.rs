//! Connection state types.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use crate::protocol::PeerMessage;

// ============================================================================
// ChannelState
// ============================================================================

/// State of the channel to the native peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// No channel exists.
    #[default]
    Disconnected,
    /// A connect is in progress.
    Connecting,
    /// A channel is open.
    Connected,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}

// ============================================================================
// ConnectOutcome
// ============================================================================

/// What a connect call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The existing channel was used.
    Reused,
    /// A new channel was opened.
    Established,
    /// Another connect is in progress; the message was buffered.
    InProgress,
}

// ============================================================================
// BridgeEvent
// ============================================================================

/// Event published by the connection manager.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// A peer message for the router. Heartbeats never appear here.
    Inbound(PeerMessage),
    /// An `init` probe was delivered to the peer.
    Initialized,
    /// The channel closed.
    Disconnected {
        /// Error that ended the channel, if any.
        reason: Option<String>,
    },
}

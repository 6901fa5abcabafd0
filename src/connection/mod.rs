//! Connection management for the native peer.
//!
//! The [`ConnectionManager`] owns the single [`Channel`](crate::transport::Channel)
//! and drives its state machine:
//!
//! ```text
//! Disconnected ──connect──► Connecting ──ok──► Connected
//!      ▲                        │                  │
//!      └────────failure─────────┘◄──peer close─────┘
//!                                    (reconnect after a flat delay
//!                                     when polling or auto-reconnect)
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `state` | [`ChannelState`], [`BridgeEvent`], [`ConnectOutcome`] |
//! | `manager` | [`ConnectionManager`] |

// ============================================================================
// Submodules
// ============================================================================

/// Connection manager.
pub mod manager;

/// Connection state types.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use manager::{ConnectionManager, INIT_MESSAGE};
pub use state::{BridgeEvent, ChannelState, ConnectOutcome};

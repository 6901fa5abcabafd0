//! Message types for the native peer and tab channels.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`BridgeMessage`] | Bridge → Peer | Probes, acks, responses, pushes |
//! | [`PeerMessage`] | Peer → Bridge | Heartbeats, capture requests, notifications |
//! | [`TabMessage`] | Bridge → Tab | Activation notices, capture requests, forwards |
//! | [`CaptureReply`] | Tab → Bridge | Capture result |
//! | [`ContentEvent`] | Tab → Bridge | User events |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `native` | Native peer messages |
//! | `tab` | Tab-local messages |

// ============================================================================
// Submodules
// ============================================================================

/// Native peer message types.
pub mod native;

/// Tab-local message types.
pub mod tab;

// ============================================================================
// Re-exports
// ============================================================================

pub use native::{ActionMessage, BridgeMessage, PeerMessage, TypedMessage, UNKNOWN_URL};
pub use tab::{CaptureReply, ContentEvent, TabControl, TabMessage};

//! Native messaging transport layer.
//!
//! This module handles communication between the bridge and the native peer
//! over a pair of byte streams (the peer's stdio).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐                         ┌─────────────────┐
//! │  ConnectionManager  │                         │  Native peer    │
//! │                     │   length-prefixed JSON  │  (child         │
//! │  Channel ──────────►│◄───────────────────────►│   process)      │
//! │  (event loop task)  │      stdin / stdout     │                 │
//! └─────────────────────┘                         └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `PeerConnector::connect` - Start the host, obtain its streams
//! 2. `Channel::open` - Spawn the event loop
//! 3. `Channel::send` / `ChannelEvent::Frame` - Exchange frames
//! 4. `ChannelEvent::Closed` - Peer exit, I/O error, or shutdown
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `codec` | Length-prefixed frame encoding |
//! | `channel` | Channel and event loop |
//! | `connector` | Peer connectors |

// ============================================================================
// Submodules
// ============================================================================

/// Channel to the native peer and its event loop.
pub mod channel;

/// Native messaging frame codec.
pub mod codec;

/// Native peer connectors.
pub mod connector;

// ============================================================================
// Re-exports
// ============================================================================

pub use channel::{Channel, ChannelEvent};
pub use connector::{PeerConnector, PeerIo, ProcessConnector};

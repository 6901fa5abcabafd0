//! Page Bridge - native messaging relay for browser pages.
//!
//! This library connects three parties: the content agent running in a
//! browser tab, the extension background that owns the tabs, and a local
//! application reached over native messaging.
//!
//! # Architecture
//!
//! - **Connection manager**: owns the single channel to the native peer,
//!   answers heartbeats, buffers one message across a connect, reconnects
//!   after a flat delay and polls on demand
//! - **Message router**: classifies peer messages, resolves the active tab
//!   for every operation and answers each `get_page_source` exactly once
//! - **Capture pipeline**: turns a page into a compact, self-contained HTML
//!   snapshot with embedded base64 images replaced by placeholders
//! - **Content agent**: the tab side; captures, renders notifications and
//!   raises numbered user events
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use page_bridge::content::{LogSurface, StaticPage};
//! use page_bridge::tabs::LocalTabs;
//! use page_bridge::transport::ProcessConnector;
//! use page_bridge::{Bridge, BridgeOptions, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let options = BridgeOptions::new().with_host_name("com.example.reader");
//!     let connector = ProcessConnector::new()
//!         .register("com.example.reader", "/opt/reader/host")
//!         .with_origin("chrome-extension://reader/");
//!     let tabs = Arc::new(LocalTabs::new());
//!
//!     let bridge = Bridge::builder()
//!         .options(options)
//!         .connector(Arc::new(connector))
//!         .tabs(tabs.clone())
//!         .build()?;
//!
//!     let agent = bridge.content_agent(
//!         Arc::new(StaticPage::new("https://example.com/", "Example", "<p>hi</p>")),
//!         Arc::new(LogSurface::with_display_region()),
//!     );
//!     tabs.open(agent);
//!
//!     bridge.start().await?;
//!     bridge.start_polling();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | [`Bridge`] façade, builder and options |
//! | [`capture`] | Snapshot sanitization pipeline |
//! | [`connection`] | Connection manager and channel state |
//! | [`content`] | Content agent, page sources, notification surfaces |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Native peer and tab message types |
//! | [`router`] | Message router and pending request table |
//! | [`tabs`] | Tab host abstraction and in-process tabs |
//! | [`transport`] | Native messaging framing, channel and connectors |

// ============================================================================
// Modules
// ============================================================================

/// Bridge façade and configuration.
///
/// Use [`Bridge::builder()`] to create a configured bridge.
pub mod bridge;

/// Page capture pipeline.
pub mod capture;

/// Connection manager for the native peer.
pub mod connection;

/// Tab-side content agent.
pub mod content;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for bridge entities.
pub mod identifiers;

/// Native peer and tab message types.
pub mod protocol;

/// Message routing between the native peer and tabs.
pub mod router;

/// Tab access.
pub mod tabs;

/// Native messaging transport layer.
///
/// Framing, the channel event loop and peer connectors.
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::{Bridge, BridgeBuilder, BridgeOptions};

// Capture types
pub use capture::{CaptureOptions, CapturePipeline, CaptureStats, SanitizedSnapshot};

// Connection types
pub use connection::{BridgeEvent, ChannelState, ConnectOutcome, ConnectionManager};

// Content types
pub use content::{ContentAgent, NotificationSurface, PageSource};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{RequestId, TabId};

// Message types
pub use protocol::{BridgeMessage, ContentEvent, PeerMessage, TabMessage};

// Routing types
pub use router::MessageRouter;

// Tab types
pub use tabs::{ActiveTabRef, LocalTabs, TabHost};

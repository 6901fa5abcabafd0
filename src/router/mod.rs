//! Message routing between the native peer and tabs.
//!
//! | Inbound | Destination |
//! |---------|-------------|
//! | `heartbeat` | answered by the connection manager, never routed |
//! | `get_page_source` | active tab capture, then `page_source_response` |
//! | any other peer message | active tab, verbatim |
//! | user event from a tab | native peer as `button_click` |
//!
//! Every accepted `get_page_source` is answered exactly once, with an error
//! response when the tab cannot be resolved, the capture fails or the
//! exchange exceeds the request timeout.

// ============================================================================
// Submodules
// ============================================================================

/// Router implementation.
pub mod core;

/// In-flight request table.
pub mod pending;

// ============================================================================
// Re-exports
// ============================================================================

pub use core::{
    ACTIVATION_MESSAGE, ACTIVE_PAGE_NOTICE, CONNECTED_NOTICE, CONNECTING_NOTICE, MessageRouter,
};
pub use pending::{Admission, MAX_PENDING_REQUESTS, PendingRequests};

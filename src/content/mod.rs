//! Tab content agent.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `agent` | [`ContentAgent`]: capture replies, rendering, user events |
//! | `page` | [`PageSource`] trait, [`StaticPage`], [`HttpFetcher`] |
//! | `notify` | [`NotificationSurface`] trait, [`LogSurface`] |

// ============================================================================
// Submodules
// ============================================================================

/// Content agent.
pub mod agent;

/// Notification surface.
pub mod notify;

/// Page sources.
pub mod page;

// ============================================================================
// Re-exports
// ============================================================================

pub use agent::{ContentAgent, DEFAULT_BANNER_DURATION, DEFAULT_USER_EVENT_COUNT};
pub use notify::{LogSurface, NotificationSurface};
pub use page::{DEFAULT_FETCH_TIMEOUT, HttpFetcher, PageSource, StaticPage};

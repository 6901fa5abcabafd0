//! Tab resolution and delivery.
//!
//! The bridge never holds on to a tab: every operation asks the
//! [`TabHost`] for the active tab again, because the user may switch tabs
//! between a request and its response.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `host` | [`TabHost`] trait, [`ActiveTabRef`] |
//! | `local` | [`LocalTabs`] in-process registry |

// ============================================================================
// Submodules
// ============================================================================

/// Tab host trait.
pub mod host;

/// In-process tab registry.
pub mod local;

// ============================================================================
// Re-exports
// ============================================================================

pub use host::{ActiveTabRef, TabHost};
pub use local::LocalTabs;

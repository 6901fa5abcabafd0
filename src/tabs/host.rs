//! Tab host abstraction.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::identifiers::TabId;
use crate::protocol::TabMessage;

// ============================================================================
// ActiveTabRef
// ============================================================================

/// Reference to the active tab at the time of a query.
///
/// Not kept across operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTabRef {
    /// Tab identifier.
    pub tab_id: TabId,
    /// Tab URL at query time.
    pub url: String,
    /// Tab title at query time.
    pub title: String,
}

// ============================================================================
// TabHost
// ============================================================================

/// Browser-side tab access used by the router.
#[async_trait]
pub trait TabHost: Send + Sync {
    /// Returns the active tab of the current window, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the tab query itself fails.
    async fn query_active_tab(&self) -> Result<Option<ActiveTabRef>>;

    /// Delivers `message` to the content agent of `tab_id` and returns its
    /// reply, if it sent one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TabUnreachable`](crate::Error::TabUnreachable) if the
    /// tab has no content agent.
    async fn send_message(&self, tab_id: TabId, message: TabMessage) -> Result<Option<Value>>;
}

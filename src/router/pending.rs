//! Table of in-flight `get_page_source` requests.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::time::Instant;
use tracing::{trace, warn};

use crate::identifiers::RequestId;

// ============================================================================
// Constants
// ============================================================================

/// Maximum in-flight requests before new ones are refused.
pub const MAX_PENDING_REQUESTS: usize = 100;

// ============================================================================
// Admission
// ============================================================================

/// Result of registering a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Registered; the caller must answer it.
    Accepted,
    /// Same ID already in flight; the earlier exchange answers it.
    Duplicate,
    /// Table is full.
    Full,
}

// ============================================================================
// PendingRequests
// ============================================================================

/// In-flight requests keyed by ID, with their start time.
#[derive(Default)]
pub struct PendingRequests {
    entries: Mutex<FxHashMap<RequestId, Instant>>,
}

impl fmt::Debug for PendingRequests {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequests")
            .field("len", &self.len())
            .finish()
    }
}

impl PendingRequests {
    /// Creates an empty table.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a request.
    pub fn begin(&self, request_id: &RequestId) -> Admission {
        let mut entries = self.entries.lock();

        if entries.contains_key(request_id) {
            return Admission::Duplicate;
        }

        if entries.len() >= MAX_PENDING_REQUESTS {
            warn!(
                pending = entries.len(),
                max = MAX_PENDING_REQUESTS,
                "Too many pending requests"
            );
            return Admission::Full;
        }

        entries.insert(request_id.clone(), Instant::now());
        Admission::Accepted
    }

    /// Removes a request, returning how long it was in flight.
    pub fn finish(&self, request_id: &RequestId) -> Option<Duration> {
        let started = self.entries.lock().remove(request_id)?;
        let elapsed = started.elapsed();
        trace!(request_id = %request_id, elapsed_ms = elapsed.as_millis() as u64, "Request finished");
        Some(elapsed)
    }

    /// Returns `true` if the request is in flight.
    #[inline]
    #[must_use]
    pub fn contains(&self, request_id: &RequestId) -> bool {
        self.entries.lock().contains_key(request_id)
    }

    /// Returns the number of in-flight requests.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is in flight.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

// ============================================================================
// PendingGuard
// ============================================================================

/// Removes its request from the table when dropped.
pub(crate) struct PendingGuard<'a> {
    table: &'a PendingRequests,
    request_id: &'a RequestId,
}

impl<'a> PendingGuard<'a> {
    pub(crate) fn new(table: &'a PendingRequests, request_id: &'a RequestId) -> Self {
        Self { table, request_id }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.table.finish(self.request_id);
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Notification surface of a content agent.
//!
//! The surface is where a content agent shows activation banners and
//! forwarded messages. [`LogSurface`] is the headless implementation: it
//! records what would be rendered and logs it.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::info;

// ============================================================================
// NotificationSurface
// ============================================================================

/// Rendering target for tab notifications.
pub trait NotificationSurface: Send + Sync {
    /// Shows a transient banner that dismisses itself after `duration`.
    fn show_banner(&self, text: &str, duration: Duration);

    /// Appends an entry to the page's display region.
    ///
    /// Returns `false` if the page has no display region.
    fn append_entry(&self, text: &str) -> bool;
}

// ============================================================================
// LogSurface
// ============================================================================

#[derive(Debug, Clone)]
struct Banner {
    text: String,
    expires_at: Instant,
}

/// Headless surface that logs and records notifications.
#[derive(Debug, Default)]
pub struct LogSurface {
    /// Whether the page has a display region.
    display_region: bool,
    entries: Mutex<Vec<String>>,
    banners: Mutex<Vec<Banner>>,
}

impl LogSurface {
    /// Creates a surface for a page without a display region.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a surface for a page with a display region.
    #[inline]
    #[must_use]
    pub fn with_display_region() -> Self {
        Self {
            display_region: true,
            ..Self::default()
        }
    }

    /// Entries appended to the display region, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Texts of banners that have not yet been dismissed.
    #[must_use]
    pub fn active_banners(&self) -> Vec<String> {
        let now = Instant::now();
        let mut banners = self.banners.lock();
        banners.retain(|b| b.expires_at > now);
        banners.iter().map(|b| b.text.clone()).collect()
    }
}

impl NotificationSurface for LogSurface {
    fn show_banner(&self, text: &str, duration: Duration) {
        info!(text, duration_ms = duration.as_millis() as u64, "Banner shown");
        let now = Instant::now();
        let mut banners = self.banners.lock();
        banners.retain(|b| b.expires_at > now);
        banners.push(Banner {
            text: text.to_string(),
            expires_at: now + duration,
        });
    }

    fn append_entry(&self, text: &str) -> bool {
        if !self.display_region {
            return false;
        }
        info!(text, "Entry appended");
        self.entries.lock().push(text.to_string());
        true
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_banner_dismisses() {
        let surface = LogSurface::new();
        surface.show_banner("hello", Duration::from_secs(3));
        assert_eq!(surface.active_banners(), vec!["hello".to_string()]);

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(surface.active_banners().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_banners_pruned_on_show() {
        let surface = LogSurface::new();
        for n in 0..50 {
            surface.show_banner(&format!("banner {n}"), Duration::from_secs(1));
            tokio::time::advance(Duration::from_secs(2)).await;
        }
        surface.show_banner("last", Duration::from_secs(1));

        assert_eq!(surface.banners.lock().len(), 1);
        assert_eq!(surface.active_banners(), vec!["last".to_string()]);
    }

    #[test]
    fn test_append_without_region() {
        let surface = LogSurface::new();
        assert!(!surface.append_entry("x"));
        assert!(surface.entries().is_empty());
    }

    #[test]
    fn test_append_with_region() {
        let surface = LogSurface::with_display_region();
        assert!(surface.append_entry("a"));
        assert!(surface.append_entry("b"));
        assert_eq!(surface.entries(), vec!["a".to_string(), "b".to_string()]);
    }
}

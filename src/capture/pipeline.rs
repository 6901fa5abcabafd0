//! Capture pipeline: page → sanitized snapshot.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use tracing::{debug, warn};

use crate::content::PageSource;
use crate::error::{Error, Result};

use super::document::{body_inner, extract_title, wrap_document};
use super::sanitize::walk_dom;
use super::scrub::scrub_base64_images;

// ============================================================================
// CaptureOptions
// ============================================================================

/// Capture pipeline configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Refetch the original HTML before falling back to the live DOM.
    pub refetch: bool,
    /// Run the layout-preserving DOM walk after scrubbing.
    pub dom_walk: bool,
    /// Wrap the result in a standalone document.
    pub wrap_document: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            refetch: true,
            dom_walk: false,
            wrap_document: true,
        }
    }
}

impl CaptureOptions {
    /// Creates default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to refetch the original HTML.
    #[inline]
    #[must_use]
    pub fn with_refetch(mut self, refetch: bool) -> Self {
        self.refetch = refetch;
        self
    }

    /// Sets whether to run the DOM walk.
    #[inline]
    #[must_use]
    pub fn with_dom_walk(mut self, dom_walk: bool) -> Self {
        self.dom_walk = dom_walk;
        self
    }

    /// Sets whether to wrap the result in a standalone document.
    #[inline]
    #[must_use]
    pub fn with_wrap_document(mut self, wrap_document: bool) -> Self {
        self.wrap_document = wrap_document;
        self
    }
}

// ============================================================================
// SanitizedSnapshot
// ============================================================================

/// Where the captured HTML came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureSource {
    /// Network refetch of the page URL.
    Network,
    /// Serialization of the live document.
    LiveDom,
}

/// Size statistics for one capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureStats {
    /// Length of the HTML before sanitization.
    pub original_length: usize,
    /// Number of image data URIs replaced.
    pub base64_count: usize,
    /// Decoded size of the replaced image payloads.
    pub base64_bytes: usize,
    /// Elements dropped by the DOM walk.
    pub removed_elements: usize,
    /// Length of the final snapshot.
    pub sanitized_length: usize,
}

/// Self-contained HTML snapshot of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedSnapshot {
    html: String,
    stats: CaptureStats,
    source: CaptureSource,
}

impl SanitizedSnapshot {
    /// Snapshot HTML.
    #[inline]
    #[must_use]
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Size statistics.
    #[inline]
    #[must_use]
    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    /// Where the HTML came from.
    #[inline]
    #[must_use]
    pub fn source(&self) -> CaptureSource {
        self.source
    }

    /// Consumes the snapshot, returning the HTML.
    #[inline]
    #[must_use]
    pub fn into_html(self) -> String {
        self.html
    }
}

// ============================================================================
// CapturePipeline
// ============================================================================

/// Turns a page into a [`SanitizedSnapshot`].
///
/// # Steps
///
/// 1. Refetch the original HTML, or serialize the live DOM on failure
/// 2. Scrub embedded base64 images
/// 3. Optionally walk the DOM, keeping layout only
/// 4. Optionally wrap the body in a standalone document
#[derive(Debug, Clone, Default)]
pub struct CapturePipeline {
    options: CaptureOptions,
}

impl CapturePipeline {
    /// Creates a pipeline.
    #[inline]
    #[must_use]
    pub fn new(options: CaptureOptions) -> Self {
        Self { options }
    }

    /// Returns the pipeline options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &CaptureOptions {
        &self.options
    }

    /// Captures `page`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CaptureFailed`] if neither the refetch nor the live
    /// DOM produced any HTML.
    pub async fn capture(&self, page: &dyn PageSource) -> Result<SanitizedSnapshot> {
        let (raw, source) = self.acquire(page).await?;
        Ok(self.sanitize(&raw, &page.title(), source))
    }

    /// Sanitizes already acquired HTML.
    #[must_use]
    pub fn sanitize(&self, raw: &str, title: &str, source: CaptureSource) -> SanitizedSnapshot {
        let scrubbed = scrub_base64_images(raw);

        let (html, removed_elements) = if self.options.dom_walk {
            let walked = walk_dom(&scrubbed.html);
            (walked.html, walked.removed_elements)
        } else {
            (scrubbed.html, 0)
        };

        let html = if self.options.wrap_document {
            let title = if title.trim().is_empty() {
                extract_title(raw).unwrap_or_default()
            } else {
                title.trim().to_string()
            };
            wrap_document(&title, body_inner(&html))
        } else {
            html
        };

        let stats = CaptureStats {
            original_length: raw.len(),
            base64_count: scrubbed.count,
            base64_bytes: scrubbed.bytes_removed,
            removed_elements,
            sanitized_length: html.len(),
        };

        debug!(
            original_length = stats.original_length,
            sanitized_length = stats.sanitized_length,
            base64_count = stats.base64_count,
            removed_elements = stats.removed_elements,
            ?source,
            "Page sanitized"
        );

        SanitizedSnapshot {
            html,
            stats,
            source,
        }
    }

    async fn acquire(&self, page: &dyn PageSource) -> Result<(String, CaptureSource)> {
        if self.options.refetch {
            match page.fetch_original().await {
                Ok(html) if !html.trim().is_empty() => return Ok((html, CaptureSource::Network)),
                Ok(_) => warn!(url = %page.url(), "Refetch returned an empty body, using live DOM"),
                Err(e) => warn!(url = %page.url(), error = %e, "Refetch failed, using live DOM"),
            }
        }

        let html = page.serialize_dom()?;
        if html.trim().is_empty() {
            return Err(Error::capture_failed("document is empty"));
        }
        Ok((html, CaptureSource::LiveDom))
    }
}

// ============================================================================
// Tests
// ============================================================================

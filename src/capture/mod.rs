//! Page capture and sanitization.
//!
//! Turns a page's HTML into a compact, self-rendering snapshot.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `scrub` | Base64 image placeholder replacement |
//! | `sanitize` | Layout-preserving DOM walk |
//! | `document` | Escaping, body extraction, standalone wrapper |
//! | `pipeline` | [`CapturePipeline`] and [`SanitizedSnapshot`] |

// ============================================================================
// Submodules
// ============================================================================

/// Snapshot document helpers.
pub mod document;

/// Capture pipeline.
pub mod pipeline;

/// Layout-preserving DOM walk.
pub mod sanitize;

/// Base64 image scrubbing.
pub mod scrub;

// ============================================================================
// Re-exports
// ============================================================================

pub use document::{body_inner, escape_html, extract_title, wrap_document};
pub use pipeline::{
    CaptureOptions, CapturePipeline, CaptureSource, CaptureStats, SanitizedSnapshot,
};
pub use sanitize::{WalkOutcome, walk_dom};
pub use scrub::{ScrubOutcome, scrub_base64_images};

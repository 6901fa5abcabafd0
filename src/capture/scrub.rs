//! Embedded image scrubbing.
//!
//! Replaces `data:image/...` URIs with a compact `[base64_image:<subtype>]`
//! token. Three locations are handled explicitly:
//!
//! | Location | Example |
//! |----------|---------|
//! | `<img src>` | `<img src="data:image/png;base64,...">` |
//! | `<style>` blocks | `background: url(data:image/gif;base64,...)` |
//! | `style` attributes | `style="background-image: url('data:image/jpeg;base64,...')"` |
//!
//! Any occurrence left after those passes (`srcset`, `<a href>`, text) is
//! replaced as well, so the output never contains `data:image`. The
//! transform is idempotent.

// ============================================================================
// Imports
// ============================================================================

use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use regex::{Captures, Regex};

// ============================================================================
// Patterns
// ============================================================================

static IMG_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<img\b[^>]*>").expect("valid img tag pattern"));

static IMG_SRC_DATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)\bsrc\s*=\s*(?:"\s*data:image/([a-z0-9.+-]*)[^"]*"|'\s*data:image/([a-z0-9.+-]*)[^']*'|data:image/([a-z0-9.+-]*)[^\s>]*)"#,
    )
    .expect("valid img src pattern")
});

static STYLE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)(<style\b[^>]*>)(.*?)(</style\s*>)").expect("valid style block pattern")
});

static STYLE_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)(\bstyle\s*=\s*)("[^"]*"|'[^']*')"#).expect("valid style attribute pattern")
});

static CSS_URL_DATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)url\(\s*(?:&quot;|["'])?\s*data:image/([a-z0-9.+-]*)[^)]*\)"#)
        .expect("valid css url pattern")
});

static ANY_DATA_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)data:image(?:/([a-z0-9.+-]*))?[^\s"'<>)]*"#)
        .expect("valid data uri pattern")
});

// ============================================================================
// ScrubOutcome
// ============================================================================

/// Result of scrubbing one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrubOutcome {
    /// HTML with every image data URI replaced.
    pub html: String,
    /// Number of replaced URIs.
    pub count: usize,
    /// Decoded size of the removed base64 payloads.
    pub bytes_removed: usize,
}

/// Running totals while scrubbing.
#[derive(Debug, Default)]
struct Tally {
    count: usize,
    bytes: usize,
}

impl Tally {
    /// Records one replaced URI and returns its placeholder.
    fn replace(&mut self, matched: &str, subtype: Option<&str>) -> String {
        self.count += 1;
        self.bytes += payload_size(matched);
        placeholder(subtype)
    }
}

// ============================================================================
// Scrubbing
// ============================================================================

/// Replaces every embedded image data URI with a placeholder token.
///
/// # Example
///
/// ```
/// use page_bridge::capture::scrub_base64_images;
///
/// let out = scrub_base64_images(r#"<img src="data:image/png;base64,AAAA">"#);
/// assert_eq!(out.html, r#"<img src="[base64_image:png]">"#);
/// assert_eq!(out.count, 1);
/// ```
#[must_use]
pub fn scrub_base64_images(html: &str) -> ScrubOutcome {
    let mut tally = Tally::default();

    let html = IMG_TAG
        .replace_all(html, |tag: &Captures<'_>| {
            IMG_SRC_DATA
                .replace_all(&tag[0], |src: &Captures<'_>| {
                    let token = tally.replace(&src[0], first_group(src));
                    format!("src=\"{token}\"")
                })
                .into_owned()
        })
        .into_owned();

    let html = STYLE_BLOCK
        .replace_all(&html, |block: &Captures<'_>| {
            let css = scrub_css_urls(&block[2], &mut tally);
            format!("{}{}{}", &block[1], css, &block[3])
        })
        .into_owned();

    let html = STYLE_ATTR
        .replace_all(&html, |attr: &Captures<'_>| {
            let value = scrub_css_urls(&attr[2], &mut tally);
            format!("{}{}", &attr[1], value)
        })
        .into_owned();

    let html = ANY_DATA_IMAGE
        .replace_all(&html, |uri: &Captures<'_>| {
            tally.replace(&uri[0], uri.get(1).map(|m| m.as_str()))
        })
        .into_owned();

    ScrubOutcome {
        html,
        count: tally.count,
        bytes_removed: tally.bytes,
    }
}

/// Replaces `url(data:image/...)` references inside CSS text.
fn scrub_css_urls(css: &str, tally: &mut Tally) -> String {
    CSS_URL_DATA
        .replace_all(css, |url: &Captures<'_>| {
            let token = tally.replace(&url[0], url.get(1).map(|m| m.as_str()));
            format!("url({token})")
        })
        .into_owned()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Builds the placeholder token for an image subtype.
fn placeholder(subtype: Option<&str>) -> String {
    let subtype = subtype
        .map(str::to_ascii_lowercase)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string());
    format!("[base64_image:{subtype}]")
}

/// Returns the first participating capture group.
fn first_group<'h>(caps: &Captures<'h>) -> Option<&'h str> {
    caps.iter().skip(1).flatten().next().map(|m| m.as_str())
}

/// Decoded size of the base64 payload inside a matched data URI.
///
/// Falls back to the length estimate for payloads that do not decode
/// cleanly, and to zero for URIs that are not base64 at all.
fn payload_size(matched: &str) -> usize {
    let lower = matched.to_ascii_lowercase();
    let Some(marker) = lower.find(";base64,") else {
        return 0;
    };

    let payload: String = matched[marker + ";base64,".len()..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='))
        .collect();

    Base64Standard
        .decode(payload.as_bytes())
        .map(|bytes| bytes.len())
        .unwrap_or_else(|_| base64::decoded_len_estimate(payload.len()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_img_src_scrubbed() {
        let out = scrub_base64_images(r#"<img src="data:image/png;base64,AAAA">"#);
        assert_eq!(out.html, r#"<img src="[base64_image:png]">"#);
        assert_eq!(out.count, 1);
        assert_eq!(out.bytes_removed, 3);
    }

    #[test]
    fn test_img_keeps_other_attributes() {
        let out = scrub_base64_images(
            r#"<IMG width="40" SRC='data:image/JPEG;base64,/9j/4AAQ' height=20 alt="x">"#,
        );
        assert_eq!(
            out.html,
            r#"<IMG width="40" src="[base64_image:jpeg]" height=20 alt="x">"#
        );
    }

    #[test]
    fn test_style_block_scrubbed() {
        let html = "<style>.a{background:url(\"data:image/gif;base64,R0lGOD\")}</style>";
        let out = scrub_base64_images(html);
        assert_eq!(out.html, "<style>.a{background:url([base64_image:gif])}</style>");
        assert_eq!(out.count, 1);
    }

    #[test]
    fn test_inline_style_scrubbed() {
        let html = r#"<div style="width:10px;background-image:url('data:image/webp;base64,UklGR')">x</div>"#;
        let out = scrub_base64_images(html);
        assert_eq!(
            out.html,
            r#"<div style="width:10px;background-image:url([base64_image:webp])">x</div>"#
        );
    }

    #[test]
    fn test_stray_occurrences_scrubbed() {
        let html = r#"<img srcset="data:image/svg+xml;utf8,<svg/> 2x"><a href="data:image/png;base64,QUJD">a</a>"#;
        let out = scrub_base64_images(html);
        assert!(!out.html.to_ascii_lowercase().contains("data:image"));
        assert_eq!(out.count, 2);
        assert!(out.html.contains("[base64_image:svg+xml]"));
    }

    #[test]
    fn test_no_images_is_unchanged() {
        let html = "<p>plain <b>text</b></p>";
        let out = scrub_base64_images(html);
        assert_eq!(out.html, html);
        assert_eq!(out.count, 0);
        assert_eq!(out.bytes_removed, 0);
    }

    #[test]
    fn test_missing_subtype_is_unknown() {
        let out = scrub_base64_images("see data:image here");
        assert_eq!(out.html, "see [base64_image:unknown] here");
    }

    fn html_fragment() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop_oneof![
                Just(r#"<img src="data:image/png;base64,AAAA">"#.to_string()),
                Just("<img src='DATA:IMAGE/GIF;base64,R0lG' width=3>".to_string()),
                Just("<style>b{background:url(data:image/jpeg;base64,/9j/)}</style>".to_string()),
                Just(r#"<i style="background:url('data:image/x-icon;base64,AA==')">"#.to_string()),
                Just("data:image".to_string()),
                Just("data:ima".to_string()),
                Just("ge/png;base64,".to_string()),
                "[a-z<>\"'=:;/,() ]{0,12}",
            ],
            0..12,
        )
        .prop_map(|parts| parts.concat())
    }

    proptest! {
        #[test]
        fn prop_scrub_is_idempotent(html in html_fragment()) {
            let once = scrub_base64_images(&html);
            let twice = scrub_base64_images(&once.html);
            prop_assert_eq!(&twice.html, &once.html);
            prop_assert_eq!(twice.count, 0);
        }

        #[test]
        fn prop_scrub_leaves_no_data_image(html in html_fragment()) {
            let once = scrub_base64_images(&html);
            prop_assert!(!once.html.to_ascii_lowercase().contains("data:image"));
        }
    }
}

//! Snapshot document helpers.

// ============================================================================
// Escaping
// ============================================================================

/// Escapes text for inclusion in HTML content or attribute values.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ============================================================================
// Extraction
// ============================================================================

/// Returns the content between `<body ...>` and `</body>`.
///
/// Falls back to the whole input when there is no body element.
#[must_use]
pub fn body_inner(html: &str) -> &str {
    let lower = html.to_ascii_lowercase();

    let Some(open) = find_tag(&lower, "<body", 0) else {
        return html;
    };
    let Some(open_end) = lower[open..].find('>').map(|i| open + i + 1) else {
        return html;
    };

    let close = lower[open_end..]
        .rfind("</body")
        .map_or(html.len(), |i| open_end + i);

    &html[open_end..close]
}

/// Returns the trimmed text of the first `<title>` element.
#[must_use]
pub fn extract_title(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();

    let open = find_tag(&lower, "<title", 0)?;
    let start = lower[open..].find('>').map(|i| open + i + 1)?;
    let end = lower[start..].find("</title").map(|i| start + i)?;

    let title = html[start..end].trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// Finds `prefix` as a whole tag name (followed by whitespace, `>` or `/`).
fn find_tag(lower: &str, prefix: &str, from: usize) -> Option<usize> {
    let bytes = lower.as_bytes();
    lower[from..]
        .match_indices(prefix)
        .map(|(i, _)| from + i)
        .find(|&i| {
            bytes
                .get(i + prefix.len())
                .is_some_and(|b| b.is_ascii_whitespace() || matches!(b, b'>' | b'/'))
        })
}

// ============================================================================
// Wrapping
// ============================================================================

/// Wraps body markup in a minimal standalone document.
#[must_use]
pub fn wrap_document(title: &str, body: &str) -> String {
    let title = escape_html(title);
    let mut doc = String::with_capacity(body.len() + title.len() + 192);
    doc.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    doc.push_str("<meta charset=\"utf-8\">\n");
    doc.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    doc.push_str("<title>");
    doc.push_str(&title);
    doc.push_str("</title>\n</head>\n<body>\n");
    doc.push_str(body.trim());
    doc.push_str("\n</body>\n</html>\n");
    doc
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_body_inner() {
        let html = "<html><head><title>T</title></head><BODY class=\"x\"><p>hi</p></Body></html>";
        assert_eq!(body_inner(html), "<p>hi</p>");
    }

    #[test]
    fn test_body_inner_ignores_lookalikes() {
        let html = "<bodyguard>no</bodyguard><body><p>yes</p></body>";
        assert_eq!(body_inner(html), "<p>yes</p>");
    }

    #[test]
    fn test_body_inner_without_body() {
        assert_eq!(body_inner("<p>fragment</p>"), "<p>fragment</p>");
        assert_eq!(body_inner("<body><p>open"), "<p>open");
    }

    #[test]
    fn test_extract_title() {
        assert_eq!(
            extract_title("<head><title> Hello </title></head>"),
            Some("Hello".to_string())
        );
        assert_eq!(extract_title("<title></title>"), None);
        assert_eq!(extract_title("<p>none</p>"), None);
    }

    #[test]
    fn test_wrap_document() {
        let doc = wrap_document("A <b> & c", "<p>x</p>");
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("<meta charset=\"utf-8\">"));
        assert!(doc.contains("name=\"viewport\""));
        assert!(doc.contains("<title>A &lt;b&gt; &amp; c</title>"));
        assert!(doc.contains("<body>\n<p>x</p>\n</body>"));
    }
}

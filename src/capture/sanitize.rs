//! Layout-preserving DOM walk.
//!
//! Rebuilds markup from a token walk over the document, keeping structure
//! and text while dropping everything a snapshot reader does not need:
//!
//! - `<script>`, `<style>`, `<link>` and `<noscript>` elements
//! - hidden elements (`hidden`, `display: none`, `visibility: hidden`,
//!   `<input type="hidden">`)
//! - comments, doctype and processing instructions
//! - `class` and `id` attributes
//! - inline style declarations other than box layout

// ============================================================================
// Constants
// ============================================================================

/// Elements removed together with their content.
const DROPPED_ELEMENTS: &[&str] = &["script", "style", "link", "noscript"];

/// Elements that never have content or an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose content is text up to the matching end tag.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title", "xmp"];

/// Attributes stripped from every kept element.
const STRIPPED_ATTRIBUTES: &[&str] = &["class", "id"];

/// Inline style properties kept by the walk.
const LAYOUT_PROPERTIES: &[&str] = &[
    "display", "position", "float", "margin", "padding", "width", "height",
];

// ============================================================================
// Types
// ============================================================================

/// Result of a DOM walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkOutcome {
    /// Rebuilt markup.
    pub html: String,
    /// Number of elements dropped with their subtree.
    pub removed_elements: usize,
}

#[derive(Debug)]
struct Attribute {
    name: String,
    value: Option<String>,
}

#[derive(Debug)]
struct StartTag {
    name: String,
    attributes: Vec<Attribute>,
    self_closing: bool,
}

impl StartTag {
    fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Whether an end tag is expected.
    fn opens_element(&self) -> bool {
        !self.self_closing && !VOID_ELEMENTS.contains(&self.name.as_str())
    }

    fn is_hidden(&self) -> bool {
        if self.attribute("hidden").is_some() {
            return true;
        }

        if self.name == "input"
            && let Some(value) = self.attribute("type").and_then(|a| a.value.as_deref())
            && value.trim().eq_ignore_ascii_case("hidden")
        {
            return true;
        }

        self.attribute("style")
            .and_then(|a| a.value.as_deref())
            .is_some_and(|style| {
                declarations(style).any(|(property, value)| {
                    let value = value.to_ascii_lowercase();
                    (property == "display" && value.starts_with("none"))
                        || (property == "visibility" && value.starts_with("hidden"))
                })
            })
    }

    fn is_dropped(&self) -> bool {
        DROPPED_ELEMENTS.contains(&self.name.as_str()) || self.is_hidden()
    }
}

#[derive(Debug)]
enum Markup {
    /// Comment, doctype or processing instruction ending at the offset.
    Ignored(usize),
    EndTag { name: String, end: usize },
    StartTag { tag: StartTag, end: usize },
    /// A `<` that does not start markup.
    Text,
}

#[derive(Debug)]
struct Skip {
    name: String,
    depth: usize,
}

// ============================================================================
// Walk
// ============================================================================

/// Walks the document and rebuilds layout-only markup.
#[must_use]
pub fn walk_dom(html: &str) -> WalkOutcome {
    let mut out = String::with_capacity(html.len());
    let mut removed_elements = 0;
    let mut skip: Option<Skip> = None;
    let mut pos = 0;

    while pos < html.len() {
        let Some(offset) = html[pos..].find('<') else {
            if skip.is_none() {
                out.push_str(&html[pos..]);
            }
            break;
        };

        let lt = pos + offset;
        if skip.is_none() {
            out.push_str(&html[pos..lt]);
        }

        match parse_markup(html, lt) {
            Markup::Ignored(end) => pos = end,

            Markup::EndTag { name, end } => {
                pos = end;
                if let Some(state) = skip.as_mut() {
                    if state.name == name {
                        state.depth -= 1;
                        if state.depth == 0 {
                            skip = None;
                        }
                    }
                    continue;
                }
                out.push_str("</");
                out.push_str(&name);
                out.push('>');
            }

            Markup::StartTag { tag, end } => {
                pos = end;
                let raw_end = (tag.opens_element()
                    && RAW_TEXT_ELEMENTS.contains(&tag.name.as_str()))
                .then(|| find_raw_text_end(html, pos, &tag.name));

                if let Some(state) = skip.as_mut() {
                    if state.name == tag.name && tag.opens_element() {
                        state.depth += 1;
                    }
                } else if tag.is_dropped() {
                    removed_elements += 1;
                    if tag.opens_element() {
                        skip = Some(Skip {
                            name: tag.name.clone(),
                            depth: 1,
                        });
                    }
                } else {
                    render_start_tag(&tag, &mut out);
                    if let Some(raw_end) = raw_end {
                        out.push_str(&html[pos..raw_end]);
                    }
                }

                if let Some(raw_end) = raw_end {
                    pos = raw_end;
                }
            }

            Markup::Text => {
                if skip.is_none() {
                    out.push('<');
                }
                pos = lt + 1;
            }
        }
    }

    WalkOutcome {
        html: out,
        removed_elements,
    }
}

// ============================================================================
// Tokenizer
// ============================================================================

fn parse_markup(html: &str, lt: usize) -> Markup {
    let rest = &html[lt..];

    if let Some(comment) = rest.strip_prefix("<!--") {
        let end = comment.find("-->").map_or(html.len(), |i| lt + 4 + i + 3);
        return Markup::Ignored(end);
    }

    if rest.starts_with("<!") || rest.starts_with("<?") {
        let end = rest.find('>').map_or(html.len(), |i| lt + i + 1);
        return Markup::Ignored(end);
    }

    if let Some(after) = rest.strip_prefix("</") {
        let name_len = tag_name_len(after);
        if name_len == 0 {
            return Markup::Text;
        }
        let end = after.find('>').map_or(html.len(), |i| lt + 2 + i + 1);
        return Markup::EndTag {
            name: after[..name_len].to_ascii_lowercase(),
            end,
        };
    }

    let name_len = tag_name_len(&rest[1..]);
    if name_len == 0 {
        return Markup::Text;
    }

    let name = rest[1..=name_len].to_ascii_lowercase();
    parse_start_tag(html, lt + 1 + name_len, name)
}

/// Length of the tag name at the start of `s`; zero if there is none.
fn tag_name_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    if !bytes.first().is_some_and(u8::is_ascii_alphabetic) {
        return 0;
    }
    bytes
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b':' | b'_'))
        .count()
}

fn parse_start_tag(html: &str, mut i: usize, name: String) -> Markup {
    let bytes = html.as_bytes();
    let len = bytes.len();
    let mut attributes = Vec::new();
    let mut self_closing = false;

    loop {
        while i < len && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= len {
            break;
        }

        match bytes[i] {
            b'>' => {
                i += 1;
                break;
            }
            b'/' => {
                i += 1;
                if bytes.get(i) == Some(&b'>') {
                    self_closing = true;
                    i += 1;
                    break;
                }
                continue;
            }
            _ => {}
        }

        let name_start = i;
        while i < len && !bytes[i].is_ascii_whitespace() && !matches!(bytes[i], b'=' | b'>' | b'/')
        {
            i += 1;
        }
        if i == name_start {
            // Stray '='
            i += 1;
            continue;
        }
        let attr_name = html[name_start..i].to_ascii_lowercase();

        let mut j = i;
        while j < len && bytes[j].is_ascii_whitespace() {
            j += 1;
        }

        let value = if bytes.get(j) == Some(&b'=') {
            j += 1;
            while j < len && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            match bytes.get(j) {
                Some(&quote @ (b'"' | b'\'')) => {
                    let start = j + 1;
                    let end = html[start..]
                        .find(quote as char)
                        .map_or(len, |k| start + k);
                    i = (end + 1).min(len);
                    Some(html[start..end].to_string())
                }
                _ => {
                    let start = j;
                    while j < len && !bytes[j].is_ascii_whitespace() && bytes[j] != b'>' {
                        j += 1;
                    }
                    i = j;
                    Some(html[start..j].to_string())
                }
            }
        } else {
            None
        };

        attributes.push(Attribute {
            name: attr_name,
            value,
        });
    }

    Markup::StartTag {
        tag: StartTag {
            name,
            attributes,
            self_closing,
        },
        end: i.min(len),
    }
}

/// Offset of the end tag closing a raw text element, or the input length.
fn find_raw_text_end(html: &str, from: usize, name: &str) -> usize {
    let bytes = html.as_bytes();
    for (offset, _) in html[from..].match_indices("</") {
        let start = from + offset;
        let name_start = start + 2;
        let name_end = name_start + name.len();
        if name_end <= bytes.len()
            && bytes[name_start..name_end].eq_ignore_ascii_case(name.as_bytes())
            && bytes
                .get(name_end)
                .is_none_or(|b| b.is_ascii_whitespace() || matches!(b, b'>' | b'/'))
        {
            return start;
        }
    }
    html.len()
}

// ============================================================================
// Rendering
// ============================================================================

fn render_start_tag(tag: &StartTag, out: &mut String) {
    out.push('<');
    out.push_str(&tag.name);

    for attribute in &tag.attributes {
        if STRIPPED_ATTRIBUTES.contains(&attribute.name.as_str()) {
            continue;
        }

        if attribute.name == "style" {
            let layout = attribute.value.as_deref().map(layout_style).unwrap_or_default();
            if !layout.is_empty() {
                push_attribute(out, "style", Some(&layout));
            }
            continue;
        }

        push_attribute(out, &attribute.name, attribute.value.as_deref());
    }

    out.push_str(if tag.self_closing { "/>" } else { ">" });
}

fn push_attribute(out: &mut String, name: &str, value: Option<&str>) {
    out.push(' ');
    out.push_str(name);
    if let Some(value) = value {
        out.push_str("=\"");
        out.push_str(&value.replace('"', "&quot;"));
        out.push('"');
    }
}

/// Keeps only box layout declarations from an inline style.
fn layout_style(style: &str) -> String {
    declarations(style)
        .filter(|(property, _)| is_layout_property(property))
        .map(|(property, value)| format!("{property}: {value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

fn is_layout_property(property: &str) -> bool {
    LAYOUT_PROPERTIES.contains(&property)
        || property.starts_with("margin-")
        || property.starts_with("padding-")
}

/// Splits an inline style into lowercase property names and trimmed values.
fn declarations(style: &str) -> impl Iterator<Item = (String, &str)> {
    style.split(';').filter_map(|declaration| {
        let (property, value) = declaration.split_once(':')?;
        let property = property.trim().to_ascii_lowercase();
        let value = value.trim();
        (!property.is_empty() && !value.is_empty()).then_some((property, value))
    })
}

// ============================================================================
// Tests
// ============================================================================

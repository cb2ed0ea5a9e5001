//! Scanner for the inline elements the editor embeds in note content.
//!
//! - Note link: `<a class="note-link" data-note-id="<uuid>" ...>text</a>`
//! - Annotation: `<span class="text-with-note" data-note-id="note-<ms>-<suffix>"
//!   data-note-text="<escaped text>" ...>anchor</span>`
//! - External link: any other `<a href="...">` whose href is not a `#`
//!   fragment, optionally tagged `data-link-id="<id>"`.
//!
//! Scanning is read-only and position based, so rewrites can splice content
//! by byte range without re-rendering the rest of the document.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

pub(crate) const NOTE_LINK_CLASS: &str = "note-link";
pub(crate) const ANNOTATION_CLASS: &str = "text-with-note";
pub(crate) const ID_ATTR: &str = "data-note-id";
pub(crate) const TEXT_ATTR: &str = "data-note-text";
pub(crate) const HREF_ATTR: &str = "href";
pub(crate) const LINK_ID_ATTR: &str = "data-link-id";

static OPEN_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<(a|span)\b([^>]*)>").expect("valid open tag regex"));
static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid attribute regex")
});
static SAME_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<(/?)(a|span)\b[^>]*>").expect("valid tag regex"));
static ANY_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

/// Which embedded element a span is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    NoteLink,
    Annotation,
    ExternalLink,
}

/// One attribute of an opening tag, with the byte range of its raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    /// Raw (still entity-escaped) value.
    pub value: String,
    pub value_range: Range<usize>,
}

/// One recognized element with absolute byte ranges into the scanned content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupElement {
    pub kind: ElementKind,
    /// Whole element, opening tag through closing tag.
    pub outer: Range<usize>,
    /// Markup between the opening and closing tags.
    pub inner: Range<usize>,
    pub attributes: Vec<Attribute>,
}

impl MarkupElement {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name.eq_ignore_ascii_case(name))
    }

    /// Embedded id (target note id for links, annotation id for annotations).
    pub fn embedded_id(&self) -> Option<&str> {
        self.attribute(ID_ATTR)
            .map(|attribute| attribute.value.as_str())
    }
}

/// Finds every note link and annotation element, in document order.
///
/// Elements without a closing tag are ignored.
pub fn scan(content: &str) -> Vec<MarkupElement> {
    let mut elements = Vec::new();
    for open in OPEN_TAG_RE.captures_iter(content) {
        let (Some(whole), Some(tag), Some(attrs)) = (open.get(0), open.get(1), open.get(2)) else {
            continue;
        };
        let attributes = parse_attributes(content, attrs.start(), attrs.as_str());
        let Some(kind) = classify(tag.as_str(), &attributes) else {
            continue;
        };
        let Some((inner_end, outer_end)) = find_close(content, whole.end(), tag.as_str()) else {
            continue;
        };
        elements.push(MarkupElement {
            kind,
            outer: whole.start()..outer_end,
            inner: whole.end()..inner_end,
            attributes,
        });
    }
    elements
}

fn parse_attributes(content: &str, offset: usize, raw: &str) -> Vec<Attribute> {
    ATTR_RE
        .captures_iter(raw)
        .filter_map(|caps| {
            let name = caps.get(1)?;
            let value = caps.get(2).or_else(|| caps.get(3))?;
            let value_range = offset + value.start()..offset + value.end();
            Some(Attribute {
                name: name.as_str().to_string(),
                value: content[value_range.clone()].to_string(),
                value_range,
            })
        })
        .collect()
}

fn classify(tag: &str, attributes: &[Attribute]) -> Option<ElementKind> {
    let has_class = |wanted: &str| {
        attributes.iter().any(|attribute| {
            attribute.name.eq_ignore_ascii_case("class")
                && attribute.value.split_whitespace().any(|class| class == wanted)
        })
    };
    let has_attr = |wanted: &str| {
        attributes
            .iter()
            .any(|attribute| attribute.name.eq_ignore_ascii_case(wanted))
    };

    if tag.eq_ignore_ascii_case("a") && has_class(NOTE_LINK_CLASS) && has_attr(ID_ATTR) {
        return Some(ElementKind::NoteLink);
    }
    if has_class(ANNOTATION_CLASS) && has_attr(ID_ATTR) && has_attr(TEXT_ATTR) {
        return Some(ElementKind::Annotation);
    }
    if tag.eq_ignore_ascii_case("a") && !has_class(NOTE_LINK_CLASS) {
        let external_href = attributes.iter().any(|attribute| {
            let href = attribute.value.trim();
            attribute.name.eq_ignore_ascii_case(HREF_ATTR) && !href.is_empty() && !href.starts_with('#')
        });
        if external_href {
            return Some(ElementKind::ExternalLink);
        }
    }
    None
}

/// Id of the `index`-th external link in document order: its
/// `data-link-id` when present, else `link-<index>`.
pub(crate) fn external_link_id(element: &MarkupElement, index: usize) -> String {
    element
        .attribute(LINK_ID_ATTR)
        .map(|attribute| attribute.value.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("link-{index}"))
}

/// Returns `(inner_end, outer_end)` of the closing tag matching an element of
/// kind `tag` whose opening tag ends at `from`.
fn find_close(content: &str, from: usize, tag: &str) -> Option<(usize, usize)> {
    let mut depth = 1usize;
    for caps in SAME_TAG_RE.captures_iter(&content[from..]) {
        let (Some(whole), Some(slash), Some(name)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        if !name.as_str().eq_ignore_ascii_case(tag) || whole.as_str().ends_with("/>") {
            continue;
        }
        if slash.as_str().is_empty() {
            depth += 1;
            continue;
        }
        depth -= 1;
        if depth == 0 {
            return Some((from + whole.start(), from + whole.end()));
        }
    }
    None
}

/// Escapes text for a double-quoted attribute value.
pub fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escapes text placed between tags.
pub fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Decodes the entities the editor emits. `&amp;` is decoded last so
/// `&amp;quot;` round-trips to the literal `&quot;`.
pub fn decode_entities(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Removes every tag from a markup fragment, leaving escaped text intact.
pub fn strip_tags(fragment: &str) -> String {
    ANY_TAG_RE.replace_all(fragment, "").into_owned()
}

/// Plain text of a markup fragment: tags removed, entities decoded.
pub fn text_content(fragment: &str) -> String {
    decode_entities(&strip_tags(fragment))
}

/// True when `position` falls inside a tag (between `<` and its `>`).
pub(crate) fn inside_tag(content: &str, position: usize) -> bool {
    let before = &content[..position];
    match (before.rfind('<'), before.rfind('>')) {
        (Some(open), Some(close)) => open > close,
        (Some(_), None) => true,
        _ => false,
    }
}

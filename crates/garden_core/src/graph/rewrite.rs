//! Content rewrites for authoring and editing links and annotations.
//!
//! External links are addressed by the ids `extract_external_links` reports.
//!
//! Every function takes the whole content field and returns the whole new
//! content field; callers hand the result to `NoteRepository::update`.

use super::markup::{
    escape_attribute, escape_text, external_link_id, inside_tag, scan, strip_tags, ElementKind,
    MarkupElement, ANNOTATION_CLASS, HREF_ATTR, ID_ATTR, NOTE_LINK_CLASS, TEXT_ATTR,
};
use crate::model::note::NoteId;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::Range;
use uuid::Uuid;

/// Rejected rewrite request. Content is never partially modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    AnnotationNotFound(String),
    LinkNotFound(NoteId),
    ExternalLinkNotFound(String),
    /// Blank url, or a `#` fragment that would stop it being external.
    InvalidUrl(String),
    /// Range is out of bounds, splits a character or a tag, or is empty
    /// where a span is required.
    InvalidRange { start: usize, end: usize },
    /// Annotation text is blank after trim.
    EmptyAnnotation,
}

impl Display for RewriteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AnnotationNotFound(id) => write!(f, "annotation not found: {id}"),
            Self::LinkNotFound(id) => write!(f, "no link to note {id} in content"),
            Self::ExternalLinkNotFound(id) => write!(f, "external link not found: {id}"),
            Self::InvalidUrl(url) => write!(f, "`{url}` is not an external link target"),
            Self::InvalidRange { start, end } => {
                write!(f, "range {start}..{end} does not select plain text")
            }
            Self::EmptyAnnotation => write!(f, "annotation text must not be blank"),
        }
    }
}

impl Error for RewriteError {}

pub type RewriteResult<T> = Result<T, RewriteError>;

/// Wraps `range` in a new annotation element.
///
/// Returns the new content and the generated annotation id.
pub fn annotate(
    content: &str,
    range: Range<usize>,
    text: &str,
    now_ms: i64,
) -> RewriteResult<(String, String)> {
    let text = text.trim();
    if text.is_empty() {
        return Err(RewriteError::EmptyAnnotation);
    }
    validate_plain_range(content, &range, false)?;

    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(9).collect();
    let id = format!("note-{now_ms}-{suffix}");
    let element = annotation_element(&id, text, &content[range.clone()]);
    Ok((splice(content, range, &element), id))
}

/// Wraps `range` in a link to `target_id`. An empty range inserts a link
/// whose text is the target title.
pub fn link_span(
    content: &str,
    range: Range<usize>,
    target_id: NoteId,
    target_title: &str,
) -> RewriteResult<String> {
    validate_plain_range(content, &range, true)?;
    let selected = &content[range.clone()];
    let link_text = if selected.is_empty() {
        escape_text(target_title)
    } else {
        selected.to_string()
    };
    let element = link_element(target_id, target_title, &link_text);
    Ok(splice(content, range, &element))
}

/// Replaces the text attribute of one annotation.
pub fn set_annotation_text(content: &str, annotation_id: &str, text: &str) -> RewriteResult<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(RewriteError::EmptyAnnotation);
    }
    let element = find_annotation(content, annotation_id)?;
    let Some(attribute) = element.attribute(TEXT_ATTR) else {
        return Err(RewriteError::AnnotationNotFound(annotation_id.to_string()));
    };
    Ok(splice(
        content,
        attribute.value_range.clone(),
        &escape_attribute(text),
    ))
}

/// Unwraps one annotation, keeping its anchor text as plain text.
pub fn remove_annotation(content: &str, annotation_id: &str) -> RewriteResult<String> {
    let element = find_annotation(content, annotation_id)?;
    let plain = strip_tags(&content[element.inner.clone()]);
    Ok(splice(content, element.outer, &plain))
}

/// Unwraps every link to `target_id`, keeping link text as plain text.
pub fn remove_link(content: &str, target_id: NoteId) -> RewriteResult<String> {
    let target = target_id.to_string();
    let links: Vec<MarkupElement> = scan(content)
        .into_iter()
        .filter(|element| {
            element.kind == ElementKind::NoteLink
                && element
                    .embedded_id()
                    .is_some_and(|id| id.eq_ignore_ascii_case(&target))
        })
        .collect();
    if links.is_empty() {
        return Err(RewriteError::LinkNotFound(target_id));
    }

    let mut rewritten = content.to_string();
    // Back to front so earlier ranges stay valid. A link enclosing one that
    // was already unwrapped has stale ranges and is left alone.
    let mut last_start = usize::MAX;
    for link in links.iter().rev() {
        if link.outer.end > last_start {
            continue;
        }
        let plain = strip_tags(&content[link.inner.clone()]);
        rewritten.replace_range(link.outer.clone(), &plain);
        last_start = link.outer.start;
    }
    Ok(rewritten)
}

/// Turns an annotation into a note link over the same anchor text.
pub fn reclassify_annotation_as_link(
    content: &str,
    annotation_id: &str,
    target_id: NoteId,
    target_title: &str,
) -> RewriteResult<String> {
    let element = find_annotation(content, annotation_id)?;
    let anchor = strip_tags(&content[element.inner.clone()]);
    let link_text = if anchor.trim().is_empty() {
        escape_text(target_title)
    } else {
        anchor
    };
    Ok(splice(
        content,
        element.outer,
        &link_element(target_id, target_title, &link_text),
    ))
}

/// Points one external link at `url`.
pub fn set_link_href(content: &str, link_id: &str, url: &str) -> RewriteResult<String> {
    let url = url.trim();
    if url.is_empty() || url.starts_with('#') {
        return Err(RewriteError::InvalidUrl(url.to_string()));
    }
    let element = find_external_link(content, link_id)?;
    let Some(href) = element.attribute(HREF_ATTR) else {
        return Err(RewriteError::ExternalLinkNotFound(link_id.to_string()));
    };
    Ok(splice(content, href.value_range.clone(), &escape_attribute(url)))
}

/// Unwraps one external link, keeping its text as plain text.
pub fn remove_external_link(content: &str, link_id: &str) -> RewriteResult<String> {
    let element = find_external_link(content, link_id)?;
    let plain = strip_tags(&content[element.inner.clone()]);
    Ok(splice(content, element.outer, &plain))
}

fn find_external_link(content: &str, link_id: &str) -> RewriteResult<MarkupElement> {
    scan(content)
        .into_iter()
        .filter(|element| element.kind == ElementKind::ExternalLink)
        .enumerate()
        .find(|(index, element)| external_link_id(element, *index) == link_id)
        .map(|(_, element)| element)
        .ok_or_else(|| RewriteError::ExternalLinkNotFound(link_id.to_string()))
}

fn find_annotation(content: &str, annotation_id: &str) -> RewriteResult<MarkupElement> {
    scan(content)
        .into_iter()
        .find(|element| {
            element.kind == ElementKind::Annotation && element.embedded_id() == Some(annotation_id)
        })
        .ok_or_else(|| RewriteError::AnnotationNotFound(annotation_id.to_string()))
}

fn validate_plain_range(content: &str, range: &Range<usize>, allow_empty: bool) -> RewriteResult<()> {
    let invalid = || RewriteError::InvalidRange {
        start: range.start,
        end: range.end,
    };
    if range.start > range.end
        || range.end > content.len()
        || !content.is_char_boundary(range.start)
        || !content.is_char_boundary(range.end)
    {
        return Err(invalid());
    }
    if range.is_empty() && !allow_empty {
        return Err(invalid());
    }
    if inside_tag(content, range.start) || content[range.clone()].contains(['<', '>']) {
        return Err(invalid());
    }
    Ok(())
}

fn splice(content: &str, range: Range<usize>, replacement: &str) -> String {
    let mut rewritten = String::with_capacity(content.len() + replacement.len());
    rewritten.push_str(&content[..range.start]);
    rewritten.push_str(replacement);
    rewritten.push_str(&content[range.end..]);
    rewritten
}

fn annotation_element(id: &str, text: &str, anchor_markup: &str) -> String {
    format!(
        r#"<span class="{ANNOTATION_CLASS}" {ID_ATTR}="{}" {TEXT_ATTR}="{}">{anchor_markup}</span>"#,
        escape_attribute(id),
        escape_attribute(text)
    )
}

fn link_element(target_id: NoteId, target_title: &str, text_markup: &str) -> String {
    format!(
        r##"<a href="#" class="{NOTE_LINK_CLASS}" {ID_ATTR}="{target_id}" data-note-title="{}">{text_markup}</a>"##,
        escape_attribute(target_title)
    )
}

#[cfg(test)]
mod tests {
    use super::{
        annotate, link_span, reclassify_annotation_as_link, remove_annotation,
        remove_external_link, remove_link, set_annotation_text, set_link_href, RewriteError,
    };
    use crate::graph::link_graph::{extract_annotations, extract_external_links, extract_outlinks};
    use uuid::Uuid;

    #[test]
    fn annotate_wraps_span_and_extracts_back() {
        let content = "<p>Rust ownership rules</p>";
        let (rewritten, id) = annotate(content, 8..17, "see \"the book\"", 1_700).unwrap();
        assert!(id.starts_with("note-1700-"));

        let annotations = extract_annotations(&rewritten);
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].id, id);
        assert_eq!(annotations[0].anchor_text, "ownership");
        assert_eq!(annotations[0].text, "see \"the book\"");
        assert_eq!(annotations[0].timestamp, 1_700);
    }

    #[test]
    fn annotate_rejects_ranges_touching_markup() {
        let content = "<p>text</p>";
        assert!(matches!(
            annotate(content, 1..4, "x", 0),
            Err(RewriteError::InvalidRange { .. })
        ));
        assert!(matches!(
            annotate(content, 3..3, "x", 0),
            Err(RewriteError::InvalidRange { .. })
        ));
        assert_eq!(annotate(content, 3..5, "  ", 0), Err(RewriteError::EmptyAnnotation));
    }

    #[test]
    fn edit_then_remove_annotation_restores_plain_text() {
        let content = "<p>keep this</p>";
        let (annotated, id) = annotate(content, 8..12, "old", 5).unwrap();
        let edited = set_annotation_text(&annotated, &id, "new & improved").unwrap();
        assert_eq!(extract_annotations(&edited)[0].text, "new & improved");

        let removed = remove_annotation(&edited, &id).unwrap();
        assert_eq!(removed, content);
        assert!(matches!(
            remove_annotation(&removed, &id),
            Err(RewriteError::AnnotationNotFound(_))
        ));
    }

    #[test]
    fn link_span_and_remove_link_round_trip() {
        let target = Uuid::new_v4();
        let content = "see other note";
        let linked = link_span(content, 4..9, target, "Other").unwrap();
        assert!(extract_outlinks(&linked).contains(&target));

        let unlinked = remove_link(&linked, target).unwrap();
        assert_eq!(unlinked, content);
        assert_eq!(
            remove_link(&unlinked, target),
            Err(RewriteError::LinkNotFound(target))
        );
    }

    #[test]
    fn empty_range_link_uses_escaped_title() {
        let target = Uuid::new_v4();
        let linked = link_span("x", 1..1, target, "R&D").unwrap();
        assert!(linked.contains(">R&amp;D</a>"));
    }

    #[test]
    fn reclassify_replaces_annotation_with_link() {
        let target = Uuid::new_v4();
        let (annotated, id) = annotate("read the manual", 5..8, "todo", 9).unwrap();
        let rewritten = reclassify_annotation_as_link(&annotated, &id, target, "Manual").unwrap();
        assert!(extract_annotations(&rewritten).is_empty());
        assert!(extract_outlinks(&rewritten).contains(&target));
        assert!(rewritten.contains(">the</a>"));
    }

    #[test]
    fn external_link_href_is_edited_in_place() {
        let content = r#"<p>see <a href="http://old.example" data-link-id="ref">docs</a> now</p>"#;
        let edited = set_link_href(content, "ref", " https://new.example/?q=a&b ").unwrap();
        assert_eq!(
            edited,
            r#"<p>see <a href="https://new.example/?q=a&amp;b" data-link-id="ref">docs</a> now</p>"#
        );
        assert_eq!(extract_external_links(&edited)[0].url, "https://new.example/?q=a&b");

        assert_eq!(
            set_link_href(content, "ref", "#top"),
            Err(RewriteError::InvalidUrl("#top".to_string()))
        );
        assert_eq!(
            set_link_href(content, "missing", "https://x.example"),
            Err(RewriteError::ExternalLinkNotFound("missing".to_string()))
        );
    }

    #[test]
    fn removing_external_link_keeps_its_text() {
        let content = r#"<p><a href="https://a.example">first</a> and <a href="https://b.example"><b>second</b></a></p>"#;
        let removed = remove_external_link(content, "link-1").unwrap();
        assert_eq!(removed, r#"<p><a href="https://a.example">first</a> and second</p>"#);
        assert_eq!(extract_external_links(&removed).len(), 1);
        assert!(matches!(
            remove_external_link(&removed, "link-1"),
            Err(RewriteError::ExternalLinkNotFound(_))
        ));
    }
}

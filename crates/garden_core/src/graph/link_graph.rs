//! Outlink/backlink index and annotation extraction.

use super::markup::{
    decode_entities, external_link_id, scan, text_content, ElementKind, HREF_ATTR, TEXT_ATTR,
};
use crate::model::note::{Note, NoteId};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use uuid::Uuid;

const ANNOTATION_ID_PREFIX: &str = "note-";

/// Inline comment attached to a span of note content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Embedded id, e.g. `note-1718000000000-k3j9x2a1b`.
    pub id: String,
    /// Plain text of the wrapped span.
    pub anchor_text: String,
    /// Decoded annotation text.
    pub text: String,
    /// Creation time in epoch ms, parsed from `id`; 0 when absent.
    pub timestamp: i64,
}

/// Hyperlink to something outside the garden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalLink {
    /// `data-link-id` of the element, else `link-<n>` by document position.
    /// Positional ids shift when an earlier untagged link is removed.
    pub id: String,
    pub text: String,
    /// Decoded `href`.
    pub url: String,
}

/// Link neighbourhood of one note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRelations {
    /// Notes this note references.
    pub outlinks: Vec<NoteId>,
    /// Notes referencing this note.
    pub backlinks: Vec<NoteId>,
}

/// Distinct target ids referenced by note links in `content`.
///
/// Targets that are not valid note ids are skipped.
pub fn extract_outlinks(content: &str) -> BTreeSet<NoteId> {
    scan(content)
        .into_iter()
        .filter(|element| element.kind == ElementKind::NoteLink)
        .filter_map(|element| element.embedded_id().and_then(|id| Uuid::parse_str(id).ok()))
        .collect()
}

/// Annotations in `content`, newest first.
pub fn extract_annotations(content: &str) -> Vec<Annotation> {
    let mut annotations: Vec<Annotation> = scan(content)
        .into_iter()
        .filter(|element| element.kind == ElementKind::Annotation)
        .filter_map(|element| {
            let id = element.embedded_id()?.to_string();
            let text = decode_entities(&element.attribute(TEXT_ATTR)?.value);
            if id.is_empty() || text.is_empty() {
                return None;
            }
            Some(Annotation {
                timestamp: annotation_timestamp(&id),
                anchor_text: text_content(&content[element.inner.clone()]),
                id,
                text,
            })
        })
        .collect();
    // Stable sort keeps document order among equal timestamps.
    annotations.sort_by(|left, right| right.timestamp.cmp(&left.timestamp));
    annotations
}

/// External hyperlinks in `content`, in document order.
pub fn extract_external_links(content: &str) -> Vec<ExternalLink> {
    scan(content)
        .into_iter()
        .filter(|element| element.kind == ElementKind::ExternalLink)
        .enumerate()
        .filter_map(|(index, element)| {
            let url = decode_entities(element.attribute(HREF_ATTR)?.value.trim());
            Some(ExternalLink {
                id: external_link_id(&element, index),
                text: text_content(&content[element.inner.clone()]),
                url,
            })
        })
        .collect()
}

/// Leading digits after the `note-` prefix, as epoch milliseconds.
pub fn annotation_timestamp(id: &str) -> i64 {
    let rest = id.strip_prefix(ANNOTATION_ID_PREFIX).unwrap_or(id);
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

/// Link index derived from the content of a full note set.
///
/// Never persisted; rebuild it whenever the note set changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkGraph {
    outlinks: BTreeMap<NoteId, BTreeSet<NoteId>>,
    backlinks: BTreeMap<NoteId, BTreeSet<NoteId>>,
    annotations: BTreeMap<NoteId, Vec<Annotation>>,
}

impl LinkGraph {
    /// Parses every note once. Links to unknown notes and self-links are dropped.
    pub fn build(notes: &[Note]) -> Self {
        let known: HashSet<NoteId> = notes.iter().map(|note| note.id).collect();
        let mut graph = Self::default();

        for note in notes {
            let targets: BTreeSet<NoteId> = extract_outlinks(&note.content)
                .into_iter()
                .filter(|target| *target != note.id && known.contains(target))
                .collect();
            for target in &targets {
                graph.backlinks.entry(*target).or_default().insert(note.id);
            }
            if !targets.is_empty() {
                graph.outlinks.insert(note.id, targets);
            }

            let annotations = extract_annotations(&note.content);
            if !annotations.is_empty() {
                graph.annotations.insert(note.id, annotations);
            }
        }
        graph
    }

    pub fn outlinks_of(&self, id: NoteId) -> BTreeSet<NoteId> {
        self.outlinks.get(&id).cloned().unwrap_or_default()
    }

    pub fn backlinks_of(&self, id: NoteId) -> BTreeSet<NoteId> {
        self.backlinks.get(&id).cloned().unwrap_or_default()
    }

    pub fn annotations_of(&self, id: NoteId) -> &[Annotation] {
        self.annotations.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    /// `None` when the note has neither outlinks nor backlinks.
    pub fn relations(&self, id: NoteId) -> Option<LinkRelations> {
        let outlinks = self.outlinks_of(id);
        let backlinks = self.backlinks_of(id);
        if outlinks.is_empty() && backlinks.is_empty() {
            return None;
        }
        Some(LinkRelations {
            outlinks: outlinks.into_iter().collect(),
            backlinks: backlinks.into_iter().collect(),
        })
    }

    /// Number of distinct (source, target) link pairs.
    pub fn edge_count(&self) -> usize {
        self.outlinks.values().map(BTreeSet::len).sum()
    }
}

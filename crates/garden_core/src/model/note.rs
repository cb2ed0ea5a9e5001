//! Note model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable note identifier, also the target id embedded in note links.
pub type NoteId = Uuid;

/// One rich-text note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    /// Markup-formatted body. Opaque to the repository; parsed only by
    /// `graph` and `growth`.
    pub content: String,
    /// Name of the owning category.
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Unix epoch milliseconds.
    #[serde(deserialize_with = "super::timestamp::deserialize")]
    pub created_at: i64,
    /// Unix epoch milliseconds, never earlier than `created_at`.
    #[serde(deserialize_with = "super::timestamp::deserialize")]
    pub updated_at: i64,
    #[serde(default)]
    pub is_published: bool,
}

impl Note {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|value| value == tag)
    }
}

/// Input for creating a note; id and timestamps are assigned by the repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    pub category: String,
    pub tags: Vec<String>,
    pub is_published: bool,
}

impl NewNote {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            category: category.into(),
            ..Self::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn published(mut self, is_published: bool) -> Self {
        self.is_published = is_published;
        self
    }
}

/// Partial update. `None` fields keep their current value.
///
/// There is deliberately no way to set `id` or `created_at`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_published: Option<bool>,
}

impl NotePatch {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Self::default()
        }
    }

    pub fn tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: Some(tags.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Trims tags, drops blanks and removes duplicates, keeping first occurrence.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let trimmed = tag.trim();
        if trimmed.is_empty() || normalized.iter().any(|existing| existing == trimmed) {
            continue;
        }
        normalized.push(trimmed.to_string());
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::{normalize_tags, Note, NotePatch};
    use uuid::Uuid;

    #[test]
    fn normalize_tags_trims_and_dedupes_in_order() {
        let tags = vec![
            " React ".to_string(),
            "".to_string(),
            "AI".to_string(),
            "React".to_string(),
        ];
        assert_eq!(normalize_tags(&tags), vec!["React", "AI"]);
    }

    #[test]
    fn note_serializes_with_camel_case_fields() {
        let note = Note {
            id: Uuid::nil(),
            title: "t".to_string(),
            content: "c".to_string(),
            category: "Essays".to_string(),
            tags: vec!["a".to_string()],
            created_at: 1,
            updated_at: 2,
            is_published: true,
        };
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["createdAt"], 1);
        assert_eq!(value["isPublished"], true);
    }

    #[test]
    fn legacy_payload_without_optional_fields_still_decodes() {
        let raw = r#"{"id":"00000000-0000-0000-0000-000000000000","title":"t","content":"","category":"x","createdAt":5,"updatedAt":5}"#;
        let note: Note = serde_json::from_str(raw).unwrap();
        assert!(note.tags.is_empty());
        assert!(!note.is_published);
    }

    #[test]
    fn web_app_payload_with_iso_timestamps_decodes() {
        let raw = r#"{"id":"00000000-0000-0000-0000-000000000000","title":"t","content":"","category":"x","tags":[],"createdAt":"2024-01-15T10:30:00.000Z","updatedAt":"2024-01-15T10:31:00.000Z"}"#;
        let note: Note = serde_json::from_str(raw).unwrap();
        assert_eq!(note.created_at, 1_705_314_600_000);
        assert_eq!(note.updated_at - note.created_at, 60_000);

        let rewritten = serde_json::to_value(&note).unwrap();
        assert_eq!(rewritten["createdAt"], 1_705_314_600_000_i64);
    }

    #[test]
    fn default_patch_is_empty() {
        assert!(NotePatch::default().is_empty());
        assert!(!NotePatch::title("x").is_empty());
    }
}

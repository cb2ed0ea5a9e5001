//! Note template model.

use serde::{Deserialize, Serialize};

/// Reusable starting content for new notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteTemplate {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "super::timestamp::deserialize")]
    pub created_at: i64,
    #[serde(deserialize_with = "super::timestamp::deserialize")]
    pub updated_at: i64,
    /// Built-in templates are never persisted and cannot be edited.
    #[serde(default)]
    pub is_system: bool,
}

/// Input for a user template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTemplate {
    pub name: String,
    pub description: Option<String>,
    pub content: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

/// Partial template update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplatePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

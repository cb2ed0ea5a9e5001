//! Tag model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TagId = Uuid;

/// Tag with a derived usage count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub color: String,
    /// Number of notes holding `name`. Only `TagRegistry::recompute_counts`
    /// writes it.
    #[serde(default)]
    pub count: u32,
}

/// Editable tag fields. `count` is derived and cannot be patched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagPatch {
    pub name: Option<String>,
    pub color: Option<String>,
}

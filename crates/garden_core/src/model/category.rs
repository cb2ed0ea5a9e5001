//! Category model and seed data.

use serde::{Deserialize, Serialize};

/// Category identifier. Seed categories use short numeric ids, new ones UUIDs.
pub type CategoryId = String;

/// One node of the category forest, stored flat with a parent reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    /// Unique among siblings at creation; unique globally after rename.
    pub name: String,
    pub icon: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Weak reference to another category id. `None` for roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<CategoryId>,
    /// Cached depth: 0 for roots, parent level + 1 otherwise.
    #[serde(default)]
    pub level: u32,
}

impl Category {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Tree view of a category with its children attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryNode {
    pub category: Category,
    pub children: Vec<CategoryNode>,
}

impl CategoryNode {
    /// Number of categories in this subtree, including the root.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(CategoryNode::subtree_len)
            .sum::<usize>()
    }
}

/// Categories used when nothing has been stored yet.
pub fn default_categories() -> Vec<Category> {
    [
        ("1", "Study Notes", "📚", "#3b82f6", "Notes from learning"),
        ("2", "Work Log", "💼", "#10b981", "Work-related records"),
        ("3", "Life Reflections", "🌱", "#f59e0b", "Thoughts on everyday life"),
        ("4", "Tech Sharing", "💻", "#8b5cf6", "Technical write-ups"),
        ("5", "Essays", "✍️", "#ef4444", "Loose ideas and drafts"),
    ]
    .into_iter()
    .map(|(id, name, icon, color, description)| Category {
        id: id.to_string(),
        name: name.to_string(),
        icon: icon.to_string(),
        color: color.to_string(),
        description: Some(description.to_string()),
        parent_id: None,
        level: 0,
    })
    .collect()
}

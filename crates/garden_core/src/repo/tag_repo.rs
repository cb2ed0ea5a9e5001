//! Tag registry.
//!
//! # Responsibility
//! - Own the `digital-garden-tags` collection.
//! - Recompute derived usage counts from the full note set.
//!
//! # Invariants
//! - After `recompute_counts(notes)`, every tag's `count` equals the number
//!   of notes in `notes` holding that tag name, and no tag has count 0.
//! - Tag names are unique.

use crate::model::note::Note;
use crate::model::palette_color_for;
use crate::model::tag::{Tag, TagId, TagPatch};
use crate::store::{CollectionKey, CollectionStore, KvBackend, StoreResult};
use log::debug;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Tag registry over one collection store.
pub struct TagRegistry<'s, B: KvBackend> {
    store: &'s CollectionStore<B>,
}

impl<'s, B: KvBackend> TagRegistry<'s, B> {
    pub fn new(store: &'s CollectionStore<B>) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Vec<Tag> {
        self.store
            .load::<Vec<Tag>>(CollectionKey::Tags)
            .into_value_or_default()
    }

    pub fn find_by_name(&self, name: &str) -> Option<Tag> {
        self.list().into_iter().find(|tag| tag.name == name)
    }

    /// Registers a tag, returning the existing one when the name is known.
    ///
    /// `Ok(None)` for a blank name.
    pub fn add(&self, name: &str, color: Option<&str>) -> StoreResult<Option<Tag>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        let mut tags = self.list();
        if let Some(existing) = tags.iter().find(|tag| tag.name == name) {
            return Ok(Some(existing.clone()));
        }

        let id = Uuid::new_v4();
        let tag = Tag {
            id,
            name: name.to_string(),
            color: color
                .map(str::to_string)
                .unwrap_or_else(|| palette_color_for(&id)),
            count: 0,
        };
        tags.push(tag.clone());
        self.store.save(CollectionKey::Tags, &tags)?;
        Ok(Some(tag))
    }

    /// Edits name and/or colour.
    ///
    /// `Ok(None)` when `id` is unknown or the new name belongs to another tag.
    pub fn update(&self, id: TagId, patch: TagPatch) -> StoreResult<Option<Tag>> {
        let mut tags = self.list();
        if let Some(name) = patch.name.as_deref() {
            let name = name.trim();
            if name.is_empty() || tags.iter().any(|tag| tag.id != id && tag.name == name) {
                return Ok(None);
            }
        }

        let Some(tag) = tags.iter_mut().find(|tag| tag.id == id) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            tag.name = name.trim().to_string();
        }
        if let Some(color) = patch.color {
            tag.color = color;
        }

        let tag = tag.clone();
        self.store.save(CollectionKey::Tags, &tags)?;
        Ok(Some(tag))
    }

    /// Removes a tag. `Ok(false)` when `id` is unknown.
    pub fn delete(&self, id: TagId) -> StoreResult<bool> {
        let mut tags = self.list();
        let before = tags.len();
        tags.retain(|tag| tag.id != id);
        if tags.len() == before {
            return Ok(false);
        }
        self.store.save(CollectionKey::Tags, &tags)?;
        Ok(true)
    }

    /// Rebuilds the tag collection from `notes` and persists it.
    pub fn recompute_counts(&self, notes: &[Note]) -> StoreResult<Vec<Tag>> {
        let tags = recount(&self.list(), notes);
        self.store.save(CollectionKey::Tags, &tags)?;
        debug!(
            "event=tag_recount module=tag status=ok tag_count={}",
            tags.len()
        );
        Ok(tags)
    }
}

/// Pure recount: keeps id/colour of known names, orders tags by first
/// appearance in `notes`, and drops names no note holds.
pub fn recount(existing: &[Tag], notes: &[Note]) -> Vec<Tag> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for note in notes {
        let mut seen_in_note: HashSet<&str> = HashSet::new();
        for name in &note.tags {
            if !seen_in_note.insert(name.as_str()) {
                continue;
            }
            let count = counts.entry(name.as_str()).or_insert_with(|| {
                order.push(name.as_str());
                0
            });
            *count += 1;
        }
    }

    order
        .into_iter()
        .map(|name| {
            let count = counts.get(name).copied().unwrap_or_default();
            match existing.iter().find(|tag| tag.name == name) {
                Some(tag) => Tag {
                    count,
                    ..tag.clone()
                },
                None => {
                    let id = Uuid::new_v4();
                    Tag {
                        id,
                        name: name.to_string(),
                        color: palette_color_for(&id),
                        count,
                    }
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::recount;
    use crate::model::note::Note;
    use crate::model::tag::Tag;
    use uuid::Uuid;

    fn note(tags: &[&str]) -> Note {
        Note {
            id: Uuid::new_v4(),
            title: String::new(),
            content: String::new(),
            category: String::new(),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            created_at: 0,
            updated_at: 0,
            is_published: false,
        }
    }

    #[test]
    fn recount_matches_note_membership() {
        let notes = vec![note(&["a", "b"]), note(&["b"]), note(&["c", "c"])];
        let tags = recount(&[], &notes);
        let counts: Vec<(&str, u32)> = tags
            .iter()
            .map(|tag| (tag.name.as_str(), tag.count))
            .collect();
        assert_eq!(counts, vec![("a", 1), ("b", 2), ("c", 1)]);
    }

    #[test]
    fn recount_keeps_identity_and_drops_unused() {
        let kept = Tag {
            id: Uuid::new_v4(),
            name: "b".to_string(),
            color: "#000000".to_string(),
            count: 99,
        };
        let unused = Tag {
            id: Uuid::new_v4(),
            name: "zzz".to_string(),
            color: "#ffffff".to_string(),
            count: 3,
        };
        let tags = recount(&[kept.clone(), unused], &[note(&["b"])]);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].id, kept.id);
        assert_eq!(tags[0].color, "#000000");
        assert_eq!(tags[0].count, 1);
    }
}

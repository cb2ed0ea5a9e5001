//! Note repository.
//!
//! # Responsibility
//! - Own the `digital-garden-notes` collection: add, update, delete, move.
//! - Assign ids and timestamps; normalize tag sets and category names.
//!
//! # Invariants
//! - Every mutation is read-modify-write of the whole collection.
//! - A written note's category is trimmed and never blank; blank falls back
//!   to the uncategorized sentinel.
//! - `update` refreshes `updated_at` and never touches `id` or `created_at`.
//! - Deleting an unknown id is a no-op, not an error.

use crate::config::DEFAULT_UNCATEGORIZED_NAME;
use crate::model::note::{normalize_tags, NewNote, Note, NoteId, NotePatch};
use crate::model::now_epoch_ms;
use crate::store::{CollectionKey, CollectionStore, KvBackend, SaveReport, StoreResult};
use log::info;
use uuid::Uuid;

/// A note as written, plus the persistence report of that write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteWrite {
    pub note: Note,
    pub report: SaveReport,
}

/// Note repository over one collection store.
pub struct NoteRepository<'s, B: KvBackend> {
    store: &'s CollectionStore<B>,
    fallback_category: &'s str,
}

impl<'s, B: KvBackend> NoteRepository<'s, B> {
    pub fn new(store: &'s CollectionStore<B>) -> Self {
        Self {
            store,
            fallback_category: DEFAULT_UNCATEGORIZED_NAME,
        }
    }

    /// Category given to notes written with a blank one.
    pub fn with_fallback_category(mut self, name: &'s str) -> Self {
        self.fallback_category = name;
        self
    }

    /// All notes, newest first. Empty when nothing (readable) is stored.
    pub fn list(&self) -> Vec<Note> {
        self.store
            .load::<Vec<Note>>(CollectionKey::Notes)
            .into_value_or_default()
    }

    pub fn get(&self, id: NoteId) -> Option<Note> {
        self.list().into_iter().find(|note| note.id == id)
    }

    /// Inserts a new note at the front of the collection.
    pub fn add(&self, new_note: NewNote) -> StoreResult<NoteWrite> {
        let now = now_epoch_ms();
        let note = Note {
            id: Uuid::new_v4(),
            title: new_note.title,
            content: new_note.content,
            category: self.normalize_category(&new_note.category),
            tags: normalize_tags(&new_note.tags),
            created_at: now,
            updated_at: now,
            is_published: new_note.is_published,
        };

        let mut notes = self.list();
        notes.insert(0, note.clone());
        let report = self.store.save(CollectionKey::Notes, &notes)?;
        info!(
            "event=note_add module=note status=ok note_count={}",
            notes.len()
        );
        Ok(NoteWrite { note, report })
    }

    /// Applies a partial update. `Ok(None)` when `id` is unknown.
    pub fn update(&self, id: NoteId, patch: NotePatch) -> StoreResult<Option<NoteWrite>> {
        let mut notes = self.list();
        let Some(note) = notes.iter_mut().find(|note| note.id == id) else {
            return Ok(None);
        };

        if let Some(title) = patch.title {
            note.title = title;
        }
        if let Some(content) = patch.content {
            note.content = content;
        }
        if let Some(category) = patch.category {
            note.category = normalize_category(&category, self.fallback_category);
        }
        if let Some(tags) = patch.tags {
            note.tags = normalize_tags(&tags);
        }
        if let Some(is_published) = patch.is_published {
            note.is_published = is_published;
        }
        note.updated_at = now_epoch_ms().max(note.created_at);

        let note = note.clone();
        let report = self.store.save(CollectionKey::Notes, &notes)?;
        Ok(Some(NoteWrite { note, report }))
    }

    /// Removes a note. Returns `Ok(false)` when `id` is unknown.
    pub fn delete(&self, id: NoteId) -> StoreResult<bool> {
        let mut notes = self.list();
        let before = notes.len();
        notes.retain(|note| note.id != id);
        if notes.len() == before {
            return Ok(false);
        }

        self.store.save(CollectionKey::Notes, &notes)?;
        info!(
            "event=note_delete module=note status=ok note_count={}",
            notes.len()
        );
        Ok(true)
    }

    pub fn move_to_category(
        &self,
        id: NoteId,
        category_name: &str,
    ) -> StoreResult<Option<NoteWrite>> {
        self.update(id, NotePatch::category(category_name))
    }

    /// Points every note in one of `from` at `to`, in a single write.
    ///
    /// Returns the ids of moved notes; nothing is written when none match.
    pub fn reassign_categories(&self, from: &[String], to: &str) -> StoreResult<Vec<NoteId>> {
        let to = self.normalize_category(to);
        let mut notes = self.list();
        let now = now_epoch_ms();
        let mut moved = Vec::new();
        for note in notes
            .iter_mut()
            .filter(|note| from.iter().any(|name| *name == note.category))
        {
            note.category = to.clone();
            note.updated_at = now.max(note.created_at);
            moved.push(note.id);
        }
        if moved.is_empty() {
            return Ok(moved);
        }

        self.store.save(CollectionKey::Notes, &notes)?;
        info!(
            "event=notes_reassigned module=note status=ok moved={}",
            moved.len()
        );
        Ok(moved)
    }

    /// Normalizes stored categories that are padded or blank, in one write.
    ///
    /// Returns how many notes changed; nothing is written when none.
    pub fn repair_categories(&self) -> StoreResult<usize> {
        let mut notes = self.list();
        let mut fixed = 0;
        for note in &mut notes {
            let normalized = normalize_category(&note.category, self.fallback_category);
            if normalized != note.category {
                note.category = normalized;
                fixed += 1;
            }
        }
        if fixed > 0 {
            self.store.save(CollectionKey::Notes, &notes)?;
        }
        Ok(fixed)
    }

    fn normalize_category(&self, raw: &str) -> String {
        normalize_category(raw, self.fallback_category)
    }
}

fn normalize_category(raw: &str, fallback: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        fallback.trim().to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::NoteRepository;
    use crate::config::QuotaPolicy;
    use crate::model::note::{NewNote, NotePatch};
    use crate::store::{CollectionKey, CollectionStore, MemoryKvBackend};

    fn store() -> CollectionStore<MemoryKvBackend> {
        CollectionStore::new(MemoryKvBackend::new(), QuotaPolicy::default())
    }

    #[test]
    fn categories_are_trimmed_and_blank_falls_back() {
        let store = store();
        let repo = NoteRepository::new(&store).with_fallback_category("Inbox");

        let padded = repo.add(NewNote::new("a", "", " Recipes ")).unwrap().note;
        assert_eq!(padded.category, "Recipes");
        let blank = repo.add(NewNote::new("b", "", "   ")).unwrap().note;
        assert_eq!(blank.category, "Inbox");

        let moved = repo
            .update(padded.id, NotePatch::category(""))
            .unwrap()
            .expect("note exists");
        assert_eq!(moved.note.category, "Inbox");
    }

    #[test]
    fn repair_normalizes_stored_categories_once() {
        let store = store();
        let repo = NoteRepository::new(&store);
        let note = repo.add(NewNote::new("a", "", "Essays")).unwrap().note;

        let mut raw = repo.list();
        raw[0].category = "  ".to_string();
        store.save(CollectionKey::Notes, &raw).unwrap();

        assert_eq!(repo.repair_categories().unwrap(), 1);
        assert_eq!(repo.get(note.id).unwrap().category, "Uncategorized");
        assert_eq!(repo.repair_categories().unwrap(), 0);
    }
}

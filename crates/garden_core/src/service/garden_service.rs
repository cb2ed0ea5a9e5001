//! `Garden`: the facade the UI talks to.
//!
//! # Responsibility
//! - Route note and category mutations through the repositories, then keep
//!   the derived collections (tag counts, growth state) in step.
//! - Repair inconsistent stored data at open time and log what was repaired.
//! - Buffer consumer events for the notification engine.
//!
//! # Invariants
//! - A failed note write changes nothing and surfaces as `Err`.
//! - Once a note write succeeded, failures of derived writes are logged at
//!   warn level and repaired on the next open; they never turn the call
//!   into an error.
//! - Every note category names an existing category after any mutation.
//! - Category rename and delete write notes before categories. If the
//!   category write then fails, notes point at a name the next repair
//!   creates.

use crate::config::{ConfigError, GardenConfig};
use crate::graph::rewrite::{self, RewriteError, RewriteResult};
use crate::graph::{Annotation, ExternalLink, LinkGraph};
use crate::growth::{GrowthEngine, GrowthUpdate, PlantGrowthState, PlantStage};
use crate::model::category::{Category, CategoryNode};
use crate::model::note::{NewNote, Note, NoteId, NotePatch};
use crate::model::now_epoch_ms;
use crate::repo::category_repo::{rename_allowed, split_subtree, CategoryTree};
use crate::repo::note_repo::NoteRepository;
use crate::repo::tag_repo::{recount, TagRegistry};
use crate::repo::template_repo::TemplateStore;
use crate::store::{
    CollectionStore, KvBackend, SaveReport, SqliteKvBackend, StorageUsage, StoreError,
};
use log::{info, warn};
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::Range;

/// Facade error. Unknown ids on lookups are values, not errors; only
/// operations that need an existing note report `NoteNotFound`.
#[derive(Debug)]
pub enum GardenError {
    Config(ConfigError),
    Store(StoreError),
    Rewrite(RewriteError),
    NoteNotFound(NoteId),
}

impl Display for GardenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Rewrite(err) => write!(f, "{err}"),
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
        }
    }
}

impl Error for GardenError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Rewrite(err) => Some(err),
            Self::NoteNotFound(_) => None,
        }
    }
}

impl From<ConfigError> for GardenError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<StoreError> for GardenError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<RewriteError> for GardenError {
    fn from(value: RewriteError) -> Self {
        Self::Rewrite(value)
    }
}

pub type GardenResult<T> = Result<T, GardenError>;

/// Notification for downstream consumers such as the easter-egg engine.
#[derive(Debug, Clone, PartialEq)]
pub enum GardenEvent {
    NoteCountChanged { previous: usize, current: usize },
    StageChanged {
        from: PlantStage,
        to: PlantStage,
        total_words: u64,
    },
    /// Storage crossed the warning threshold; `message` is user-facing.
    StorageWarning { message: String, used_bytes: u64 },
}

/// Knowledge-base facade over one storage backend.
pub struct Garden<B: KvBackend> {
    store: CollectionStore<B>,
    config: GardenConfig,
    growth: PlantGrowthState,
    events: Vec<GardenEvent>,
}

impl<'conn> Garden<SqliteKvBackend<'conn>> {
    /// Opens a garden over a migrated SQLite connection.
    pub fn open_sqlite(conn: &'conn Connection, config: GardenConfig) -> GardenResult<Self> {
        Self::open(SqliteKvBackend::try_new(conn)?, config)
    }
}

impl<B: KvBackend> Garden<B> {
    /// Validates `config`, loads growth state and repairs stored data.
    ///
    /// Repairs never fail the open; see [`Garden::repair`].
    pub fn open(backend: B, config: GardenConfig) -> GardenResult<Self> {
        config.validate()?;
        let store = CollectionStore::new(backend, config.quota);
        let growth = GrowthEngine::new(&store).load();
        let mut garden = Self {
            store,
            config,
            growth,
            events: Vec::new(),
        };
        garden.repair();
        Ok(garden)
    }

    pub fn config(&self) -> &GardenConfig {
        &self.config
    }

    /// Direct store access for export/clear flows.
    pub fn store(&self) -> &CollectionStore<B> {
        &self.store
    }

    /// Creates missing categories, recounts tags and rebuilds drifted growth
    /// state. Each step logs and carries on when its write fails.
    pub fn repair(&mut self) {
        match self.notes_repo().repair_categories() {
            Ok(fixed) if fixed > 0 => {
                warn!("event=note_category_repair module=garden status=warn fixed={fixed}")
            }
            Ok(_) => {}
            Err(err) => warn!("event=note_category_repair module=garden status=error error={err}"),
        }
        let notes = self.notes();

        let referenced = referenced_categories(&notes);
        match self.categories_repo().ensure_exists(&referenced) {
            Ok(created) if !created.is_empty() => warn!(
                "event=category_repair module=garden status=warn created={}",
                created.len()
            ),
            Ok(_) => {}
            Err(err) => warn!("event=category_repair module=garden status=error error={err}"),
        }

        match self.categories_repo().repair_levels() {
            Ok(fixed) if fixed > 0 => {
                warn!("event=category_repair module=garden status=warn levels_fixed={fixed}")
            }
            Ok(_) => {}
            Err(err) => warn!("event=category_repair module=garden status=error error={err}"),
        }

        let registry = TagRegistry::new(&self.store);
        let stored_tags = registry.list();
        if recount(&stored_tags, &notes) != stored_tags {
            if let Err(err) = registry.recompute_counts(&notes) {
                warn!("event=tag_recount module=garden status=error error={err}");
            }
        }

        if !self.growth.is_consistent() || !self.growth.matches_notes(&notes) {
            warn!(
                "event=growth_drift module=garden status=warn tracked_notes={} note_count={}",
                self.growth.note_word_counts.len(),
                notes.len()
            );
            if let Err(err) = self.recalculate_growth() {
                warn!("event=growth_recalculated module=garden status=error error={err}");
            }
        }
    }

    /// Pending events, oldest first. The buffer is left empty.
    pub fn drain_events(&mut self) -> Vec<GardenEvent> {
        std::mem::take(&mut self.events)
    }

    /// All notes, newest first.
    pub fn notes(&self) -> Vec<Note> {
        self.notes_repo().list()
    }

    pub fn note(&self, id: NoteId) -> Option<Note> {
        self.notes_repo().get(id)
    }

    pub fn add_note(&mut self, new_note: NewNote) -> GardenResult<Note> {
        let previous = self.notes().len();
        let write = self.notes_repo().add(new_note)?;
        self.observe_report(&write.report);
        self.events.push(GardenEvent::NoteCountChanged {
            previous,
            current: previous + 1,
        });

        self.ensure_category(&write.note.category);
        self.refresh_tags();
        self.track_words(write.note.id, &write.note.content);
        Ok(write.note)
    }

    /// Applies `patch` to one note and refreshes what the patch touched.
    pub fn update_note(&mut self, id: NoteId, patch: NotePatch) -> GardenResult<Note> {
        let tags_changed = patch.tags.is_some();
        let content_changed = patch.content.is_some();
        let category_changed = patch.category.is_some();
        let write = self
            .notes_repo()
            .update(id, patch)?
            .ok_or(GardenError::NoteNotFound(id))?;
        self.observe_report(&write.report);

        if category_changed {
            self.ensure_category(&write.note.category);
        }
        if tags_changed {
            self.refresh_tags();
        }
        if content_changed {
            self.track_words(id, &write.note.content);
        }
        Ok(write.note)
    }

    /// Returns `Ok(false)` when `id` is unknown.
    pub fn delete_note(&mut self, id: NoteId) -> GardenResult<bool> {
        let previous = self.notes().len();
        if !self.notes_repo().delete(id)? {
            return Ok(false);
        }
        self.events.push(GardenEvent::NoteCountChanged {
            previous,
            current: previous.saturating_sub(1),
        });

        self.refresh_tags();
        let engine = GrowthEngine::new(&self.store);
        match engine.remove_note_word_count(&mut self.growth, id) {
            Ok(update) => push_stage_event(&mut self.events, &update),
            Err(err) => warn!("event=growth_update module=garden status=error error={err}"),
        }
        Ok(true)
    }

    pub fn move_note(&mut self, id: NoteId, category_name: &str) -> GardenResult<Note> {
        self.update_note(id, NotePatch::category(category_name))
    }

    /// Creates a note from a template. `Ok(None)` for an unknown template.
    ///
    /// A blank `title` falls back to the template name; the category is
    /// `category`, else the template's, else the uncategorized sentinel.
    pub fn add_note_from_template(
        &mut self,
        template_id: &str,
        title: &str,
        category: Option<&str>,
    ) -> GardenResult<Option<Note>> {
        let Some(template) = self.templates().get(template_id) else {
            return Ok(None);
        };
        let title = if title.trim().is_empty() {
            template.name.clone()
        } else {
            title.to_string()
        };
        let category = category
            .map(str::to_string)
            .or(template.category)
            .unwrap_or_else(|| self.config.uncategorized_name.clone());
        let new_note = NewNote::new(title, template.content, category).with_tags(template.tags);
        self.add_note(new_note).map(Some)
    }

    pub fn categories(&self) -> Vec<Category> {
        self.categories_repo().list()
    }

    pub fn category_tree(&self) -> Vec<CategoryNode> {
        self.categories_repo().build_tree()
    }

    /// Breadcrumb such as `Work > Projects`.
    pub fn category_path(&self, name: &str) -> String {
        self.categories_repo().resolve_path(name)
    }

    /// `Ok(None)` on a blank or duplicate sibling name, or an unknown parent.
    pub fn add_category(
        &mut self,
        name: &str,
        parent_id: Option<&str>,
    ) -> GardenResult<Option<Category>> {
        Ok(self.categories_repo().add(name, parent_id)?)
    }

    /// Renames the first category named `old_name` and repoints its notes.
    /// `Ok(false)` when refused.
    ///
    /// Notes stay put when another category still carries `old_name`.
    pub fn rename_category(&mut self, old_name: &str, new_name: &str) -> GardenResult<bool> {
        let new_name = new_name.trim();
        let categories = self.categories();
        if !rename_allowed(&categories, old_name, new_name) {
            return Ok(false);
        }
        if old_name == new_name {
            return Ok(true);
        }

        let holders = categories
            .iter()
            .filter(|category| category.name == old_name)
            .count();
        if holders == 1 {
            self.notes_repo()
                .reassign_categories(&[old_name.to_string()], new_name)?;
        }
        Ok(self.categories_repo().rename(old_name, new_name)?)
    }

    /// Deletes a category with its descendants and moves notes whose category
    /// no longer exists to the uncategorized sentinel, created when needed.
    ///
    /// Notes are reassigned before the categories are removed. Returns the
    /// removed categories; empty when `name` is unknown.
    pub fn delete_category(&mut self, name: &str) -> GardenResult<Vec<Category>> {
        let Some((doomed, kept)) = split_subtree(self.categories(), name) else {
            return Ok(Vec::new());
        };

        let orphaned: Vec<String> = doomed
            .iter()
            .map(|category| category.name.clone())
            .filter(|removed| !kept.iter().any(|category| category.name == *removed))
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect();
        let sentinel = self.config.uncategorized_name.clone();
        let moved = if orphaned.is_empty() {
            Vec::new()
        } else {
            self.notes_repo().reassign_categories(&orphaned, &sentinel)?
        };

        let removed = self.categories_repo().delete(name)?;
        if !moved.is_empty() {
            self.categories_repo()
                .ensure_exists(std::slice::from_ref(&sentinel))?;
        }
        info!(
            "event=category_cascade module=garden status=ok removed={} notes_moved={}",
            removed.len(),
            moved.len()
        );
        Ok(removed)
    }

    pub fn tags(&self) -> TagRegistry<'_, B> {
        TagRegistry::new(&self.store)
    }

    pub fn templates(&self) -> TemplateStore<'_, B> {
        TemplateStore::new(&self.store)
    }

    /// Graph over the current note set. Rebuild after any note change.
    pub fn link_graph(&self) -> LinkGraph {
        LinkGraph::build(&self.notes())
    }

    /// Notes whose content links to `id` (its backlinks).
    pub fn notes_linking_to(&self, id: NoteId) -> Vec<Note> {
        let notes = self.notes();
        let sources = LinkGraph::build(&notes).backlinks_of(id);
        notes
            .into_iter()
            .filter(|note| sources.contains(&note.id))
            .collect()
    }

    /// Notes that `id` links to (its outlinks).
    pub fn outlinked_notes(&self, id: NoteId) -> Vec<Note> {
        let notes = self.notes();
        let targets = LinkGraph::build(&notes).outlinks_of(id);
        notes
            .into_iter()
            .filter(|note| targets.contains(&note.id))
            .collect()
    }

    /// Annotations of one note, newest first.
    pub fn annotations_of(&self, id: NoteId) -> Vec<Annotation> {
        self.note(id)
            .map(|note| crate::graph::extract_annotations(&note.content))
            .unwrap_or_default()
    }

    /// External hyperlinks of one note, in document order.
    pub fn external_links_of(&self, id: NoteId) -> Vec<ExternalLink> {
        self.note(id)
            .map(|note| crate::graph::extract_external_links(&note.content))
            .unwrap_or_default()
    }

    pub fn set_external_link_url(
        &mut self,
        id: NoteId,
        link_id: &str,
        url: &str,
    ) -> GardenResult<Note> {
        self.rewrite_content(id, |content| rewrite::set_link_href(content, link_id, url))
    }

    pub fn remove_external_link(&mut self, id: NoteId, link_id: &str) -> GardenResult<Note> {
        self.rewrite_content(id, |content| rewrite::remove_external_link(content, link_id))
    }

    /// Wraps `range` of a note's content in an annotation.
    ///
    /// Returns the updated note and the new annotation id.
    pub fn annotate_note(
        &mut self,
        id: NoteId,
        range: Range<usize>,
        text: &str,
    ) -> GardenResult<(Note, String)> {
        let note = self.note(id).ok_or(GardenError::NoteNotFound(id))?;
        let (content, annotation_id) = rewrite::annotate(&note.content, range, text, now_epoch_ms())?;
        let note = self.update_note(id, NotePatch::content(content))?;
        Ok((note, annotation_id))
    }

    /// Wraps `range` of a note's content in a link to `target_id`.
    pub fn link_note_span(
        &mut self,
        id: NoteId,
        range: Range<usize>,
        target_id: NoteId,
    ) -> GardenResult<Note> {
        let target = self
            .note(target_id)
            .ok_or(GardenError::NoteNotFound(target_id))?;
        self.rewrite_content(id, |content| {
            rewrite::link_span(content, range, target_id, &target.title)
        })
    }

    pub fn set_annotation_text(
        &mut self,
        id: NoteId,
        annotation_id: &str,
        text: &str,
    ) -> GardenResult<Note> {
        self.rewrite_content(id, |content| {
            rewrite::set_annotation_text(content, annotation_id, text)
        })
    }

    pub fn remove_annotation(&mut self, id: NoteId, annotation_id: &str) -> GardenResult<Note> {
        self.rewrite_content(id, |content| rewrite::remove_annotation(content, annotation_id))
    }

    pub fn remove_link(&mut self, id: NoteId, target_id: NoteId) -> GardenResult<Note> {
        self.rewrite_content(id, |content| rewrite::remove_link(content, target_id))
    }

    pub fn reclassify_annotation_as_link(
        &mut self,
        id: NoteId,
        annotation_id: &str,
        target_id: NoteId,
    ) -> GardenResult<Note> {
        let target = self
            .note(target_id)
            .ok_or(GardenError::NoteNotFound(target_id))?;
        self.rewrite_content(id, |content| {
            rewrite::reclassify_annotation_as_link(content, annotation_id, target_id, &target.title)
        })
    }

    pub fn growth_state(&self) -> &PlantGrowthState {
        &self.growth
    }

    /// Rebuilds growth state from every note.
    pub fn recalculate_growth(&mut self) -> GardenResult<GrowthUpdate> {
        let notes = self.notes();
        let update = GrowthEngine::new(&self.store).recalculate_all(&mut self.growth, &notes)?;
        push_stage_event(&mut self.events, &update);
        Ok(update)
    }

    /// Clears growth state, including achievement history.
    pub fn reset_growth(&mut self) -> GardenResult<()> {
        self.growth = GrowthEngine::new(&self.store).reset()?;
        Ok(())
    }

    pub fn storage_usage(&self) -> GardenResult<StorageUsage> {
        Ok(self.store.usage()?)
    }

    fn notes_repo(&self) -> NoteRepository<'_, B> {
        NoteRepository::new(&self.store).with_fallback_category(&self.config.uncategorized_name)
    }

    fn categories_repo(&self) -> CategoryTree<'_, B> {
        CategoryTree::new(&self.store, self.config.seed_default_categories)
    }

    fn rewrite_content<F>(&mut self, id: NoteId, edit: F) -> GardenResult<Note>
    where
        F: FnOnce(&str) -> RewriteResult<String>,
    {
        let note = self.note(id).ok_or(GardenError::NoteNotFound(id))?;
        let content = edit(&note.content)?;
        self.update_note(id, NotePatch::content(content))
    }

    fn observe_report(&mut self, report: &SaveReport) {
        if let Some(message) = &report.warning {
            self.events.push(GardenEvent::StorageWarning {
                message: message.clone(),
                used_bytes: report.total_bytes,
            });
        }
    }

    fn ensure_category(&self, name: &str) {
        if let Err(err) = self.categories_repo().ensure_exists(&[name.to_string()]) {
            warn!("event=category_repair module=garden status=error error={err}");
        }
    }

    fn refresh_tags(&self) {
        let notes = self.notes();
        if let Err(err) = self.tags().recompute_counts(&notes) {
            warn!("event=tag_recount module=garden status=error error={err}");
        }
    }

    fn track_words(&mut self, id: NoteId, content: &str) {
        let engine = GrowthEngine::new(&self.store);
        match engine.update_note_word_count(&mut self.growth, id, content) {
            Ok(update) => push_stage_event(&mut self.events, &update),
            Err(err) => warn!("event=growth_update module=garden status=error error={err}"),
        }
    }
}

fn push_stage_event(events: &mut Vec<GardenEvent>, update: &GrowthUpdate) {
    if update.stage_changed {
        events.push(GardenEvent::StageChanged {
            from: update.old_stage,
            to: update.new_stage,
            total_words: update.total_words,
        });
    }
}

/// Distinct non-blank category names used by `notes`, in first-seen order.
fn referenced_categories(notes: &[Note]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    notes
        .iter()
        .map(|note| note.category.trim())
        .filter(|name| !name.is_empty() && seen.insert(*name))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{referenced_categories, Garden, GardenError, GardenEvent};
    use crate::config::{GardenConfig, QuotaPolicy};
    use crate::growth::PlantStage;
    use crate::model::note::{NewNote, Note, NotePatch};
    use crate::store::MemoryKvBackend;
    use uuid::Uuid;

    fn garden() -> Garden<MemoryKvBackend> {
        Garden::open(MemoryKvBackend::new(), GardenConfig::default()).expect("open garden")
    }

    #[test]
    fn add_note_emits_count_event_and_counts_words() {
        let mut garden = garden();
        let note = garden
            .add_note(NewNote::new("Hello", "one two three", "Study Notes").with_tags(["rust"]))
            .unwrap();

        assert_eq!(garden.growth_state().total_words, 3);
        assert_eq!(garden.tags().find_by_name("rust").unwrap().count, 1);
        assert_eq!(
            garden.drain_events(),
            vec![GardenEvent::NoteCountChanged {
                previous: 0,
                current: 1
            }]
        );
        assert!(garden.drain_events().is_empty());

        assert!(garden.delete_note(note.id).unwrap());
        assert!(!garden.delete_note(note.id).unwrap());
        assert_eq!(garden.growth_state().total_words, 0);
        assert!(garden.tags().list().is_empty());
    }

    #[test]
    fn unknown_note_update_is_not_found() {
        let mut garden = garden();
        let missing = Uuid::new_v4();
        assert!(matches!(
            garden.update_note(missing, NotePatch::title("x")),
            Err(GardenError::NoteNotFound(id)) if id == missing
        ));
    }

    #[test]
    fn moving_to_new_category_creates_it() {
        let mut garden = garden();
        let note = garden
            .add_note(NewNote::new("t", "", "Study Notes"))
            .unwrap();
        garden.move_note(note.id, "Recipes").unwrap();
        assert!(garden
            .categories()
            .iter()
            .any(|category| category.name == "Recipes"));
    }

    #[test]
    fn stage_change_is_reported_as_event() {
        let mut garden = garden();
        let body = vec!["word"; 1_000].join(" ");
        garden.add_note(NewNote::new("long", body, "Essays")).unwrap();
        let events = garden.drain_events();
        assert!(events.contains(&GardenEvent::StageChanged {
            from: PlantStage::Seed,
            to: PlantStage::Sprout,
            total_words: 1_000,
        }));
    }

    #[test]
    fn storage_warning_is_reported_as_event() {
        let config = GardenConfig {
            quota: QuotaPolicy::new(64, 1_000_000).unwrap(),
            ..GardenConfig::default()
        };
        let mut garden = Garden::open(MemoryKvBackend::new(), config).unwrap();
        garden
            .add_note(NewNote::new("t", "enough text to cross a tiny threshold", "Essays"))
            .unwrap();
        assert!(garden
            .drain_events()
            .iter()
            .any(|event| matches!(event, GardenEvent::StorageWarning { .. })));
    }

    #[test]
    fn template_note_uses_template_content_and_fallbacks() {
        let mut garden = garden();
        let note = garden
            .add_note_from_template("system-diary", "  ", None)
            .unwrap()
            .expect("system template exists");
        assert_eq!(note.title, "Diary");
        assert!(note.content.starts_with("# Diary"));
        assert_eq!(note.category, "Uncategorized");
        assert!(garden
            .add_note_from_template("missing", "t", None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn referenced_categories_are_distinct_and_trimmed() {
        let note = |category: &str| Note {
            id: Uuid::new_v4(),
            title: String::new(),
            content: String::new(),
            category: category.to_string(),
            tags: Vec::new(),
            created_at: 0,
            updated_at: 0,
            is_published: false,
        };
        let notes = vec![note("A"), note(" A "), note(""), note("B")];
        assert_eq!(referenced_categories(&notes), vec!["A", "B"]);
    }
}

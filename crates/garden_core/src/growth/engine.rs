//! Growth state and its persistence boundary.

use super::stage::{progress_to_next_stage, stage_for, PlantStage};
use super::word_count::count_words;
use crate::model::note::{Note, NoteId};
use crate::model::now_epoch_ms;
use crate::store::{CollectionKey, CollectionStore, KvBackend, SaveReport, StoreResult};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot taken when a stage was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageAchievement {
    pub stage: PlantStage,
    /// Epoch milliseconds.
    #[serde(deserialize_with = "crate::model::timestamp::deserialize")]
    pub achieved_at: i64,
    pub total_words: u64,
    pub note_count: usize,
}

/// Persisted singleton growth state.
///
/// Missing fields in a stored payload fall back to their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlantGrowthState {
    pub total_words: u64,
    pub current_stage: PlantStage,
    /// At most one record per stage, in non-decreasing `achieved_at` order.
    pub achievements: Vec<StageAchievement>,
    /// Epoch milliseconds of the last save.
    #[serde(deserialize_with = "crate::model::timestamp::deserialize")]
    pub last_updated: i64,
    pub note_word_counts: BTreeMap<NoteId, u64>,
}

/// Result of one state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowthUpdate {
    pub stage_changed: bool,
    pub old_stage: PlantStage,
    pub new_stage: PlantStage,
    pub total_words: u64,
}

impl PlantGrowthState {
    /// Records `word_count` as the current size of `note_id`.
    ///
    /// A stage change upserts the achievement for the new stage; records
    /// for other stages are never removed.
    pub fn apply_word_count(&mut self, note_id: NoteId, word_count: u64, now: i64) -> GrowthUpdate {
        let old_stage = self.current_stage;
        let previous = self.note_word_counts.insert(note_id, word_count).unwrap_or(0);
        self.total_words = self
            .total_words
            .saturating_sub(previous)
            .saturating_add(word_count);

        let new_stage = stage_for(self.total_words);
        if new_stage != old_stage {
            self.current_stage = new_stage;
            self.upsert_achievement(new_stage, now);
        }
        self.update(old_stage)
    }

    /// Forgets one note. The stage follows the new total; achievements stay.
    pub fn forget_note(&mut self, note_id: NoteId) -> GrowthUpdate {
        let old_stage = self.current_stage;
        let previous = self.note_word_counts.remove(&note_id).unwrap_or(0);
        self.total_words = self.total_words.saturating_sub(previous);
        self.current_stage = stage_for(self.total_words);
        self.update(old_stage)
    }

    /// Rebuilds every count from `notes`.
    ///
    /// A stage not yet in the history is recorded; existing records are kept
    /// untouched.
    pub fn rebuild(&mut self, notes: &[Note], now: i64) -> GrowthUpdate {
        let old_stage = self.current_stage;
        self.note_word_counts = notes
            .iter()
            .map(|note| (note.id, count_words(&note.content)))
            .collect();
        self.total_words = self
            .note_word_counts
            .values()
            .fold(0u64, |sum, count| sum.saturating_add(*count));
        self.current_stage = stage_for(self.total_words);
        if self.current_stage != old_stage && !self.has_achieved(self.current_stage) {
            self.push_achievement(self.current_stage, now);
        }
        self.update(old_stage)
    }

    pub fn has_achieved(&self, stage: PlantStage) -> bool {
        self.achievements
            .iter()
            .any(|achievement| achievement.stage == stage)
    }

    /// Achievements sorted by `achieved_at`.
    pub fn stage_history(&self) -> Vec<StageAchievement> {
        let mut history = self.achievements.clone();
        history.sort_by_key(|achievement| achievement.achieved_at);
        history
    }

    pub fn progress_to_next_stage(&self) -> f64 {
        progress_to_next_stage(self.total_words, self.current_stage)
    }

    /// True when the total matches the per-note map and the stage matches
    /// the total.
    pub fn is_consistent(&self) -> bool {
        let sum = self
            .note_word_counts
            .values()
            .fold(0u64, |sum, count| sum.saturating_add(*count));
        sum == self.total_words && stage_for(self.total_words) == self.current_stage
    }

    /// True when the per-note map holds exactly `notes` at their current
    /// word counts.
    pub fn matches_notes(&self, notes: &[Note]) -> bool {
        notes.len() == self.note_word_counts.len()
            && notes.iter().all(|note| {
                self.note_word_counts.get(&note.id).copied() == Some(count_words(&note.content))
            })
    }

    fn upsert_achievement(&mut self, stage: PlantStage, now: i64) {
        self.achievements
            .retain(|achievement| achievement.stage != stage);
        self.push_achievement(stage, now);
    }

    fn push_achievement(&mut self, stage: PlantStage, now: i64) {
        // Appending keeps the history ordered only if time never goes back.
        let latest = self
            .achievements
            .iter()
            .map(|achievement| achievement.achieved_at)
            .max()
            .unwrap_or(i64::MIN);
        self.achievements.push(StageAchievement {
            stage,
            achieved_at: now.max(latest),
            total_words: self.total_words,
            note_count: self.note_word_counts.len(),
        });
    }

    fn update(&self, old_stage: PlantStage) -> GrowthUpdate {
        GrowthUpdate {
            stage_changed: self.current_stage != old_stage,
            old_stage,
            new_stage: self.current_stage,
            total_words: self.total_words,
        }
    }
}

/// Growth operations with load/save at the `digital_garden_plant_growth` key.
///
/// The state itself is passed in explicitly; nothing is cached here.
pub struct GrowthEngine<'s, B: KvBackend> {
    store: &'s CollectionStore<B>,
}

impl<'s, B: KvBackend> GrowthEngine<'s, B> {
    pub fn new(store: &'s CollectionStore<B>) -> Self {
        Self { store }
    }

    /// Stored state, or the default state when missing or unreadable.
    pub fn load(&self) -> PlantGrowthState {
        self.store
            .load::<PlantGrowthState>(CollectionKey::PlantGrowth)
            .into_value_or_default()
    }

    /// Stamps `last_updated` and persists `state`.
    pub fn save(&self, state: &mut PlantGrowthState) -> StoreResult<SaveReport> {
        state.last_updated = now_epoch_ms();
        self.store.save(CollectionKey::PlantGrowth, &*state)
    }

    pub fn update_note_word_count(
        &self,
        state: &mut PlantGrowthState,
        note_id: NoteId,
        content: &str,
    ) -> StoreResult<GrowthUpdate> {
        let mut next = state.clone();
        let update = next.apply_word_count(note_id, count_words(content), now_epoch_ms());
        self.commit(state, next)?;
        log_stage_change(&update);
        Ok(update)
    }

    pub fn remove_note_word_count(
        &self,
        state: &mut PlantGrowthState,
        note_id: NoteId,
    ) -> StoreResult<GrowthUpdate> {
        let mut next = state.clone();
        let update = next.forget_note(note_id);
        self.commit(state, next)?;
        log_stage_change(&update);
        Ok(update)
    }

    /// Full rebuild from `notes`, the repair path for drift or bulk imports.
    pub fn recalculate_all(
        &self,
        state: &mut PlantGrowthState,
        notes: &[Note],
    ) -> StoreResult<GrowthUpdate> {
        let mut next = state.clone();
        let update = next.rebuild(notes, now_epoch_ms());
        self.commit(state, next)?;
        info!(
            "event=growth_recalculated module=growth status=ok note_count={} total_words={} stage={}",
            notes.len(),
            update.total_words,
            update.new_stage
        );
        log_stage_change(&update);
        Ok(update)
    }

    /// Persists `next` and only then replaces `state` with it, so a refused
    /// write leaves the caller's state as it was.
    fn commit(&self, state: &mut PlantGrowthState, mut next: PlantGrowthState) -> StoreResult<()> {
        self.save(&mut next)?;
        *state = next;
        Ok(())
    }

    /// Drops the stored state and returns a fresh default.
    pub fn reset(&self) -> StoreResult<PlantGrowthState> {
        self.store.remove(CollectionKey::PlantGrowth)?;
        info!("event=growth_reset module=growth status=ok");
        Ok(PlantGrowthState::default())
    }
}

fn log_stage_change(update: &GrowthUpdate) {
    if update.stage_changed {
        info!(
            "event=growth_stage_changed module=growth status=ok from={} to={} total_words={}",
            update.old_stage, update.new_stage, update.total_words
        );
    }
}

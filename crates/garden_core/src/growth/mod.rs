//! Growth state machine.
//!
//! # Responsibility
//! - Track a word count per note and their running total.
//! - Derive the current stage from the total and record stage achievements.
//!
//! # Invariants
//! - `total_words == sum(note_word_counts)`.
//! - `current_stage == stage_for(total_words)`.
//! - Achievements hold at most one record per stage, ordered by
//!   `achieved_at`, and are never removed when the total shrinks.
//! - `recalculate_all(notes)` matches one `update_note_word_count` per note
//!   applied to an empty state, in any order.

mod engine;
mod stage;
mod word_count;

pub use engine::{GrowthEngine, GrowthUpdate, PlantGrowthState, StageAchievement};
pub use stage::{
    next_stage_config, progress_to_next_stage, stage_config, stage_for, PlantStage, StageConfig,
    STAGES,
};
pub use word_count::count_words;

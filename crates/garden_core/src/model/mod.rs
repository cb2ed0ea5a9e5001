//! Value types of the garden.
//!
//! # Responsibility
//! - Define the persisted shapes of notes, categories, tags and templates.
//! - Keep field names camelCase so payloads written by the web app decode.
//!   Timestamps are written as epoch milliseconds but ISO strings from those
//!   payloads are still accepted, see [`timestamp`].
//!
//! # Invariants
//! - `Note::id` never changes after creation.
//! - `Note::updated_at >= Note::created_at`.

pub mod category;
pub mod note;
pub mod tag;
pub mod template;
pub mod timestamp;

/// Colours handed to new categories and tags.
pub const PALETTE: [&str; 7] = [
    "#3b82f6", "#10b981", "#f59e0b", "#8b5cf6", "#ef4444", "#06b6d4", "#84cc16",
];

/// Current wall clock as Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Picks a palette colour from a fresh id so colours vary without an RNG.
pub(crate) fn palette_color_for(seed: &uuid::Uuid) -> String {
    let index = seed.as_bytes()[0] as usize % PALETTE.len();
    PALETTE[index].to_string()
}

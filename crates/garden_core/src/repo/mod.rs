//! Collection repositories.
//!
//! # Responsibility
//! - Give each persisted collection a use-case oriented API.
//! - Keep serialization and quota checks inside `store::CollectionStore`.
//!
//! # Invariants
//! - Every write goes through `CollectionStore::save` as a whole collection.
//! - Duplicate names and unknown ids are reported as `None`/`false`/empty
//!   values; only storage failures are `Err`.

pub mod category_repo;
pub mod note_repo;
pub mod tag_repo;
pub mod template_repo;

//! Persistence and derived-structure core of the digital garden.
//! This crate is the single source of truth for note, category and growth
//! invariants; UI layers only call into it.

pub mod config;
pub mod db;
pub mod graph;
pub mod growth;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use config::{ConfigError, GardenConfig, QuotaPolicy};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use graph::{Annotation, ExternalLink, LinkGraph, LinkRelations, RewriteError};
pub use growth::{GrowthEngine, GrowthUpdate, PlantGrowthState, PlantStage, StageAchievement};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::category::{Category, CategoryNode};
pub use model::note::{NewNote, Note, NoteId, NotePatch};
pub use model::tag::Tag;
pub use model::template::NoteTemplate;
pub use service::{Garden, GardenError, GardenEvent, GardenResult};
pub use store::{
    CollectionKey, CollectionStore, KvBackend, LoadOutcome, MemoryKvBackend, SqliteKvBackend,
    StorageUsage, StoreError, StoreResult,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}

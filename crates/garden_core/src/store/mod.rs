//! Quota-aware persistence engine.
//!
//! # Responsibility
//! - Serialize named collections to a bounded key-value backend.
//! - Estimate payload size before every write and fail closed on overflow.
//! - Degrade unreadable payloads to "no data" while keeping the cause visible.
//!
//! # Invariants
//! - Every collection is written as one whole value; there are no record-level
//!   updates at this boundary.
//! - A refused write leaves the previously stored value byte-for-byte intact.
//! - Loads never fail; callers get a `LoadOutcome` they may fold to a default.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod backend;
mod engine;

pub use backend::{KvBackend, MemoryKvBackend, SqliteKvBackend, StoredEntry};
pub use engine::{CollectionStore, SaveReport, StorageUsage};

/// Payload schema version written next to every value.
pub const PAYLOAD_SCHEMA_VERSION: u32 = 1;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub type StoreResult<T> = Result<T, StoreError>;

/// Stable identifiers of the persisted collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollectionKey {
    Notes,
    Categories,
    Tags,
    Templates,
    PlantGrowth,
}

impl CollectionKey {
    pub const ALL: [CollectionKey; 5] = [
        Self::Notes,
        Self::Categories,
        Self::Tags,
        Self::Templates,
        Self::PlantGrowth,
    ];

    /// Backend key. These strings are part of the on-disk layout.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Notes => "digital-garden-notes",
            Self::Categories => "digital-garden-categories",
            Self::Tags => "digital-garden-tags",
            Self::Templates => "digital-garden-templates",
            Self::PlantGrowth => "digital_garden_plant_growth",
        }
    }
}

impl Display for CollectionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Refused write: stored usage plus the candidate payload exceeds the ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaExceeded {
    pub key: CollectionKey,
    /// Bytes held by every other stored value.
    pub current_bytes: u64,
    /// Serialized size of the refused payload.
    pub payload_bytes: u64,
    pub limit_bytes: u64,
}

impl QuotaExceeded {
    /// User-facing explanation with remediation steps.
    pub fn remediation_message(&self) -> String {
        let current_mb = self.current_bytes as f64 / BYTES_PER_MB;
        let payload_mb = self.payload_bytes as f64 / BYTES_PER_MB;
        let limit_mb = self.limit_bytes as f64 / BYTES_PER_MB;
        format!(
            "Storage is almost full! Currently using {current_mb:.2}MB, this save needs \
             {payload_mb:.2}MB, {:.2}MB in total, over the {limit_mb:.2}MB limit.\n\n\
             Suggestions:\n\
             1. Delete notes you no longer need\n\
             2. Split long notes into several shorter ones\n\
             3. Export a backup, then clear old data",
            current_mb + payload_mb
        )
    }
}

/// Persistence failure surfaced to callers as an explicit value.
#[derive(Debug)]
pub enum StoreError {
    /// Write refused before touching the backend.
    QuotaExceeded(QuotaExceeded),
    /// Backend read/write failure.
    Db(DbError),
    /// Value could not be serialized.
    Serialize { key: CollectionKey, message: String },
    /// Stored value was written by a newer payload schema; overwriting is refused.
    SchemaTooNew {
        key: CollectionKey,
        stored: u32,
        supported: u32,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuotaExceeded(quota) => f.write_str(&quota.remediation_message()),
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialize { key, message } => {
                write!(f, "failed to serialize `{key}`: {message}")
            }
            Self::SchemaTooNew {
                key,
                stored,
                supported,
            } => write!(
                f,
                "`{key}` was written with payload schema {stored}, newer than supported {supported}"
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl StoreError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded(_))
    }
}

/// Result of reading one collection.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome<T> {
    Loaded(T),
    /// Nothing stored under the key yet.
    Missing,
    /// Stored payload could not be read or decoded.
    Corrupt { reason: String },
    /// Stored payload was written by a newer schema.
    UnsupportedSchema { stored: u32 },
}

impl<T> LoadOutcome<T> {
    /// Folds every non-loaded outcome to `None`.
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Loaded(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }

    pub fn into_value_or_else(self, fallback: impl FnOnce() -> T) -> T {
        self.into_option().unwrap_or_else(fallback)
    }
}

impl<T: Default> LoadOutcome<T> {
    /// "Empty on missing or corrupt".
    pub fn into_value_or_default(self) -> T {
        self.into_option().unwrap_or_default()
    }
}

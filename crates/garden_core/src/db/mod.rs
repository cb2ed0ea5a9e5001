//! SQLite file holding the garden's key-value collections.
//!
//! One table, `kv_entries`, stores every collection as a single row. Two
//! version numbers apply: `PRAGMA user_version` versions the table layout
//! (checked here), and each row's `schema_version` versions its payload
//! (checked by `store`).
//!
//! # Invariants
//! - `open_db*` returns connections at exactly `migrations::latest_version()`.
//! - `store::SqliteKvBackend` only wraps connections that pass
//!   [`ensure_current_schema`], so no collection is touched on a stale or
//!   foreign database.

use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failure opening or validating the garden database.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file was written by a newer build; it is left untouched.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// The connection was not opened through `open_db*`, or its migrations
    /// did not run.
    SchemaBehind { db_version: u32, required: u32 },
}

impl DbError {
    /// Whether the database layout, rather than SQLite itself, is the problem.
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedSchemaVersion { .. } | Self::SchemaBehind { .. }
        )
    }
}

/// Checks that `conn` carries exactly the table layout this build writes.
pub fn ensure_current_schema(conn: &Connection) -> DbResult<()> {
    let db_version = migrations::current_user_version(conn)?;
    let required = migrations::latest_version();
    if db_version > required {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported: required,
        });
    }
    if db_version < required {
        return Err(DbError::SchemaBehind {
            db_version,
            required,
        });
    }
    Ok(())
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "garden database layout v{db_version} was written by a newer build (this build reads up to v{latest_supported})"
            ),
            Self::SchemaBehind {
                db_version,
                required,
            } => write!(
                f,
                "garden database layout v{db_version} is not migrated to v{required}; open it with open_db"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::SchemaBehind { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{ensure_current_schema, open_db_in_memory, DbError};
    use rusqlite::Connection;

    #[test]
    fn migrated_connection_passes_schema_check() {
        let conn = open_db_in_memory().unwrap();
        ensure_current_schema(&conn).unwrap();
    }

    #[test]
    fn raw_and_future_connections_are_mismatches() {
        let raw = Connection::open_in_memory().unwrap();
        let err = ensure_current_schema(&raw).unwrap_err();
        assert!(matches!(err, DbError::SchemaBehind { db_version: 0, required: 1 }));
        assert!(err.is_schema_mismatch());

        raw.execute_batch("PRAGMA user_version = 42;").unwrap();
        assert!(matches!(
            ensure_current_schema(&raw),
            Err(DbError::UnsupportedSchemaVersion { db_version: 42, .. })
        ));
    }
}

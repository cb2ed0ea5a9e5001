//! Key-value backends for `CollectionStore`.
//!
//! # Invariants
//! - `write_entry` replaces the whole value in one statement; readers never
//!   observe a half-written value.
//! - Usage is measured in UTF-8 bytes of stored values, keys excluded.

use super::StoreResult;
use crate::db::ensure_current_schema;
use rusqlite::{params, Connection, OptionalExtension};
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Raw stored value plus the payload schema it was written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub value: String,
    pub schema_version: u32,
}

/// Bounded key-value storage seam.
///
/// Calls are synchronous and never retried; a failure is reported once.
pub trait KvBackend {
    /// Reads one entry, `None` when the key was never written.
    fn read_entry(&self, key: &str) -> StoreResult<Option<StoredEntry>>;
    /// Inserts or replaces one entry.
    fn write_entry(&self, key: &str, value: &str, schema_version: u32) -> StoreResult<()>;
    /// Removes one entry. Returns `false` when nothing was stored.
    fn remove_entry(&self, key: &str) -> StoreResult<bool>;
    /// Sums stored value bytes, optionally skipping one key.
    fn usage_bytes(&self, excluding: Option<&str>) -> StoreResult<u64>;
    /// Lists stored keys in ascending order.
    fn keys(&self) -> StoreResult<Vec<String>>;
}

/// SQLite-backed store over the migrated `kv_entries` table.
pub struct SqliteKvBackend<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteKvBackend<'conn> {
    /// Wraps a connection opened through `db::open_db*`.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_current_schema(conn)?;
        Ok(Self { conn })
    }
}

impl KvBackend for SqliteKvBackend<'_> {
    fn read_entry(&self, key: &str) -> StoreResult<Option<StoredEntry>> {
        let entry = self
            .conn
            .query_row(
                "SELECT value, schema_version FROM kv_entries WHERE key = ?1;",
                [key],
                |row| {
                    Ok(StoredEntry {
                        value: row.get(0)?,
                        schema_version: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    fn write_entry(&self, key: &str, value: &str, schema_version: u32) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO kv_entries (key, value, schema_version, updated_at)
             VALUES (?1, ?2, ?3, CAST(strftime('%s', 'now') AS INTEGER) * 1000)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                schema_version = excluded.schema_version,
                updated_at = excluded.updated_at;",
            params![key, value, schema_version],
        )?;
        Ok(())
    }

    fn remove_entry(&self, key: &str) -> StoreResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM kv_entries WHERE key = ?1;", [key])?;
        Ok(changed > 0)
    }

    fn usage_bytes(&self, excluding: Option<&str>) -> StoreResult<u64> {
        let total: i64 = match excluding {
            Some(key) => self.conn.query_row(
                "SELECT COALESCE(SUM(LENGTH(CAST(value AS BLOB))), 0)
                 FROM kv_entries
                 WHERE key <> ?1;",
                [key],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                "SELECT COALESCE(SUM(LENGTH(CAST(value AS BLOB))), 0) FROM kv_entries;",
                [],
                |row| row.get(0),
            )?,
        };
        Ok(u64::try_from(total).unwrap_or(0))
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM kv_entries ORDER BY key ASC;")?;
        let mut rows = stmt.query([])?;
        let mut keys = Vec::new();
        while let Some(row) = rows.next()? {
            keys.push(row.get(0)?);
        }
        Ok(keys)
    }
}

/// Process-local backend for ephemeral sessions and tests.
#[derive(Debug, Default)]
pub struct MemoryKvBackend {
    entries: RefCell<BTreeMap<String, StoredEntry>>,
}

impl MemoryKvBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a raw value without any quota or serialization checks.
    ///
    /// Used to seed legacy or damaged payloads.
    pub fn insert_raw(&self, key: &str, value: impl Into<String>, schema_version: u32) {
        self.entries.borrow_mut().insert(
            key.to_string(),
            StoredEntry {
                value: value.into(),
                schema_version,
            },
        );
    }
}

impl KvBackend for MemoryKvBackend {
    fn read_entry(&self, key: &str) -> StoreResult<Option<StoredEntry>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn write_entry(&self, key: &str, value: &str, schema_version: u32) -> StoreResult<()> {
        self.insert_raw(key, value, schema_version);
        Ok(())
    }

    fn remove_entry(&self, key: &str) -> StoreResult<bool> {
        Ok(self.entries.borrow_mut().remove(key).is_some())
    }

    fn usage_bytes(&self, excluding: Option<&str>) -> StoreResult<u64> {
        let total = self
            .entries
            .borrow()
            .iter()
            .filter(|(key, _)| Some(key.as_str()) != excluding)
            .map(|(_, entry)| entry.value.len() as u64)
            .sum();
        Ok(total)
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.entries.borrow().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{KvBackend, MemoryKvBackend, SqliteKvBackend};
    use crate::db::{open_db_in_memory, DbError};
    use crate::store::StoreError;
    use rusqlite::Connection;

    #[test]
    fn sqlite_backend_requires_migrated_connection() {
        let conn = Connection::open_in_memory().unwrap();
        let err = SqliteKvBackend::try_new(&conn)
            .err()
            .expect("unmigrated connection must be rejected");
        assert!(matches!(
            err,
            StoreError::Db(DbError::SchemaBehind { db_version: 0, .. })
        ));
    }

    #[test]
    fn sqlite_usage_counts_utf8_bytes_and_skips_excluded_key() {
        let conn = open_db_in_memory().unwrap();
        let backend = SqliteKvBackend::try_new(&conn).unwrap();
        backend.write_entry("a", "植物", 1).unwrap();
        backend.write_entry("b", "abc", 1).unwrap();

        assert_eq!(backend.usage_bytes(None).unwrap(), 9);
        assert_eq!(backend.usage_bytes(Some("a")).unwrap(), 3);
    }

    #[test]
    fn sqlite_write_replaces_existing_value() {
        let conn = open_db_in_memory().unwrap();
        let backend = SqliteKvBackend::try_new(&conn).unwrap();
        backend.write_entry("k", "first", 1).unwrap();
        backend.write_entry("k", "second", 2).unwrap();

        let entry = backend.read_entry("k").unwrap().unwrap();
        assert_eq!(entry.value, "second");
        assert_eq!(entry.schema_version, 2);
        assert_eq!(backend.keys().unwrap(), vec!["k".to_string()]);
        assert!(backend.remove_entry("k").unwrap());
        assert!(!backend.remove_entry("k").unwrap());
    }

    #[test]
    fn memory_backend_mirrors_usage_accounting() {
        let backend = MemoryKvBackend::new();
        backend.write_entry("x", "12345", 1).unwrap();
        backend.write_entry("y", "678", 1).unwrap();
        assert_eq!(backend.usage_bytes(None).unwrap(), 8);
        assert_eq!(backend.usage_bytes(Some("x")).unwrap(), 3);
        assert!(backend.read_entry("z").unwrap().is_none());
    }
}

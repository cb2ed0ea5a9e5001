//! `CollectionStore`: whole-collection load/save with quota enforcement.

use super::backend::KvBackend;
use super::{
    CollectionKey, LoadOutcome, QuotaExceeded, StoreError, StoreResult, BYTES_PER_MB,
    PAYLOAD_SCHEMA_VERSION,
};
use crate::config::QuotaPolicy;
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Successful write report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub key: CollectionKey,
    /// Serialized size of the written payload.
    pub payload_bytes: u64,
    /// Estimated total usage after the write.
    pub total_bytes: u64,
    /// Set when total usage crossed the warning threshold.
    pub warning: Option<String>,
}

impl SaveReport {
    pub fn has_warning(&self) -> bool {
        self.warning.is_some()
    }
}

/// Snapshot of backend usage against the configured policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageUsage {
    pub used_bytes: u64,
    pub warn_limit_bytes: u64,
    pub hard_limit_bytes: u64,
}

impl StorageUsage {
    pub fn used_mb(&self) -> f64 {
        self.used_bytes as f64 / BYTES_PER_MB
    }

    /// Usage as a percentage of the hard ceiling, clamped to `0..=100`.
    pub fn percent_of_hard_limit(&self) -> f64 {
        if self.hard_limit_bytes == 0 {
            return 100.0;
        }
        (self.used_bytes as f64 / self.hard_limit_bytes as f64 * 100.0).clamp(0.0, 100.0)
    }
}

/// Quota-aware persistence engine over one backend.
pub struct CollectionStore<B: KvBackend> {
    backend: B,
    policy: QuotaPolicy,
}

impl<B: KvBackend> CollectionStore<B> {
    pub fn new(backend: B, policy: QuotaPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn policy(&self) -> QuotaPolicy {
        self.policy
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Loads and decodes one collection.
    ///
    /// Never fails: backend errors and undecodable payloads become
    /// `LoadOutcome::Corrupt`, logged at warn level.
    pub fn load<T: DeserializeOwned>(&self, key: CollectionKey) -> LoadOutcome<T> {
        let entry = match self.backend.read_entry(key.as_str()) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!("event=collection_load module=store status=missing key={key}");
                return LoadOutcome::Missing;
            }
            Err(err) => {
                warn!(
                    "event=collection_load module=store status=corrupt key={key} reason=read_failed error={err}"
                );
                return LoadOutcome::Corrupt {
                    reason: format!("read failed: {err}"),
                };
            }
        };

        if entry.schema_version > PAYLOAD_SCHEMA_VERSION {
            warn!(
                "event=collection_load module=store status=unsupported_schema key={key} stored={} supported={}",
                entry.schema_version, PAYLOAD_SCHEMA_VERSION
            );
            return LoadOutcome::UnsupportedSchema {
                stored: entry.schema_version,
            };
        }

        match serde_json::from_str::<T>(&entry.value) {
            Ok(value) => {
                debug!(
                    "event=collection_load module=store status=ok key={key} bytes={}",
                    entry.value.len()
                );
                LoadOutcome::Loaded(value)
            }
            Err(err) => {
                warn!(
                    "event=collection_load module=store status=corrupt key={key} reason=decode_failed line={} column={}",
                    err.line(),
                    err.column()
                );
                LoadOutcome::Corrupt {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Serializes and writes one whole collection.
    ///
    /// # Errors
    /// - `QuotaExceeded` when other stored values plus this payload exceed the
    ///   hard limit. Nothing is written.
    /// - `SchemaTooNew` when the stored value came from a newer schema.
    /// - `Db` when the backend write itself fails.
    pub fn save<T: Serialize + ?Sized>(
        &self,
        key: CollectionKey,
        value: &T,
    ) -> StoreResult<SaveReport> {
        if let Some(existing) = self.backend.read_entry(key.as_str())? {
            if existing.schema_version > PAYLOAD_SCHEMA_VERSION {
                error!(
                    "event=collection_save module=store status=error key={key} error_code=schema_too_new stored={}",
                    existing.schema_version
                );
                return Err(StoreError::SchemaTooNew {
                    key,
                    stored: existing.schema_version,
                    supported: PAYLOAD_SCHEMA_VERSION,
                });
            }
        }

        let payload = serde_json::to_string(value).map_err(|err| StoreError::Serialize {
            key,
            message: err.to_string(),
        })?;
        let payload_bytes = payload.len() as u64;
        let current_bytes = self.backend.usage_bytes(Some(key.as_str()))?;
        let total_bytes = current_bytes.saturating_add(payload_bytes);

        if total_bytes > self.policy.hard_limit_bytes {
            error!(
                "event=collection_save module=store status=error key={key} error_code=quota_exceeded current_bytes={current_bytes} payload_bytes={payload_bytes} limit_bytes={}",
                self.policy.hard_limit_bytes
            );
            return Err(StoreError::QuotaExceeded(QuotaExceeded {
                key,
                current_bytes,
                payload_bytes,
                limit_bytes: self.policy.hard_limit_bytes,
            }));
        }

        self.backend
            .write_entry(key.as_str(), &payload, PAYLOAD_SCHEMA_VERSION)
            .inspect_err(|err| {
                error!(
                    "event=collection_save module=store status=error key={key} error_code=write_failed error={err}"
                );
            })?;

        let warning = if total_bytes > self.policy.warn_limit_bytes {
            let message = format!(
                "Warning: storage is running low! Currently using {:.2}MB of {:.2}MB. \
                 Consider cleaning up or exporting your data.",
                total_bytes as f64 / BYTES_PER_MB,
                self.policy.hard_limit_bytes as f64 / BYTES_PER_MB
            );
            warn!(
                "event=collection_save module=store status=warn key={key} payload_bytes={payload_bytes} total_bytes={total_bytes}"
            );
            Some(message)
        } else {
            info!(
                "event=collection_save module=store status=ok key={key} payload_bytes={payload_bytes} total_bytes={total_bytes}"
            );
            None
        };

        Ok(SaveReport {
            key,
            payload_bytes,
            total_bytes,
            warning,
        })
    }

    /// Clears one collection. Returns `false` when nothing was stored.
    pub fn remove(&self, key: CollectionKey) -> StoreResult<bool> {
        let removed = self.backend.remove_entry(key.as_str())?;
        info!("event=collection_remove module=store status=ok key={key} removed={removed}");
        Ok(removed)
    }

    pub fn usage(&self) -> StoreResult<StorageUsage> {
        Ok(StorageUsage {
            used_bytes: self.backend.usage_bytes(None)?,
            warn_limit_bytes: self.policy.warn_limit_bytes,
            hard_limit_bytes: self.policy.hard_limit_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::CollectionStore;
    use crate::config::QuotaPolicy;
    use crate::store::{CollectionKey, KvBackend, LoadOutcome, MemoryKvBackend, StoreError};

    fn small_store(warn: u64, hard: u64) -> CollectionStore<MemoryKvBackend> {
        CollectionStore::new(MemoryKvBackend::new(), QuotaPolicy::new(warn, hard).unwrap())
    }

    #[test]
    fn save_then_load_returns_same_collection() {
        let store = small_store(1_000, 2_000);
        let values = vec!["alpha".to_string(), "beta".to_string()];
        let report = store.save(CollectionKey::Tags, &values).unwrap();
        assert!(!report.has_warning());
        assert_eq!(report.payload_bytes, r#"["alpha","beta"]"#.len() as u64);

        let loaded: LoadOutcome<Vec<String>> = store.load(CollectionKey::Tags);
        assert_eq!(loaded, LoadOutcome::Loaded(values));
    }

    #[test]
    fn replaced_key_does_not_count_against_itself() {
        let store = small_store(40, 60);
        let big = "x".repeat(45);
        store.save(CollectionKey::Notes, &big).unwrap();
        // 47 bytes serialized; only the other keys count as current usage.
        let report = store.save(CollectionKey::Notes, &big).unwrap();
        assert_eq!(report.total_bytes, 47);
        assert!(report.has_warning());
    }

    #[test]
    fn quota_refusal_leaves_previous_value_untouched() {
        let store = small_store(20, 30);
        store.save(CollectionKey::Notes, "short").unwrap();
        let before = store.backend().read_entry("digital-garden-notes").unwrap();

        let err = store
            .save(CollectionKey::Notes, &"y".repeat(64))
            .expect_err("payload above ceiling must be refused");
        match err {
            StoreError::QuotaExceeded(quota) => {
                assert_eq!(quota.key, CollectionKey::Notes);
                assert_eq!(quota.payload_bytes, 66);
                assert_eq!(quota.limit_bytes, 30);
            }
            other => panic!("unexpected error: {other}"),
        }

        let after = store.backend().read_entry("digital-garden-notes").unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn undecodable_payload_loads_as_corrupt_and_missing_as_missing() {
        let store = small_store(1_000, 2_000);
        store
            .backend()
            .insert_raw(CollectionKey::Notes.as_str(), "{not json", 1);

        let corrupt: LoadOutcome<Vec<String>> = store.load(CollectionKey::Notes);
        assert!(corrupt.is_corrupt());
        let missing: LoadOutcome<Vec<String>> = store.load(CollectionKey::Tags);
        assert_eq!(missing, LoadOutcome::Missing);
    }

    #[test]
    fn newer_schema_is_reported_and_never_overwritten() {
        let store = small_store(1_000, 2_000);
        store
            .backend()
            .insert_raw(CollectionKey::Tags.as_str(), "[]", 9);

        let loaded: LoadOutcome<Vec<String>> = store.load(CollectionKey::Tags);
        assert_eq!(loaded, LoadOutcome::UnsupportedSchema { stored: 9 });

        let err = store
            .save(CollectionKey::Tags, &Vec::<String>::new())
            .expect_err("older build must not clobber newer payload");
        assert!(matches!(err, StoreError::SchemaTooNew { stored: 9, .. }));
    }

    #[test]
    fn usage_reports_total_bytes() {
        let store = small_store(1_000, 2_000);
        store.save(CollectionKey::Notes, "abc").unwrap();
        store.save(CollectionKey::Tags, "de").unwrap();
        let usage = store.usage().unwrap();
        assert_eq!(usage.used_bytes, 9);
        assert!(usage.percent_of_hard_limit() < 1.0);
        assert!(store.remove(CollectionKey::Tags).unwrap());
        assert_eq!(store.usage().unwrap().used_bytes, 5);
    }
}

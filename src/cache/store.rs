//! Cache entry persistence with freshness evaluation.
//!
//! [`CacheStore`] turns a raw [`ByteStore`] into a store of [`CacheEntry`] values. Storage problems
//! never escape as errors on the read path: an unavailable medium or an undecodable blob is logged
//! and reported as "absent", which sends the caller down the live-execution path.

use metrics::counter;
use tracing::{debug, warn};

use super::backend::{ByteStore, StoreError};
use super::clock::{Clock, SystemClock};
use super::entry::CacheEntry;
use super::keys::CacheKey;
use super::metric_names::{METRIC_CACHE_CORRUPT, METRIC_STORE_UNAVAILABLE};

const SOURCE: &str = "cache::store";

/// Outcome of [`CacheStore::purge_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub removed: usize,
    pub failed: usize,
}

/// Summary of one stored entry, without its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub key: CacheKey,
    pub stored_at: i64,
    pub age_secs: i64,
    pub row_count: usize,
}

pub struct CacheStore<S, C = SystemClock> {
    backend: S,
    clock: C,
}

impl<S: ByteStore> CacheStore<S> {
    pub fn new(backend: S) -> Self {
        Self::with_clock(backend, SystemClock)
    }
}

impl<S: ByteStore, C: Clock> CacheStore<S, C> {
    pub fn with_clock(backend: S, clock: C) -> Self {
        Self { backend, clock }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// True iff an entry exists and `now - stored_at <= max_age_secs`.
    pub fn is_fresh(&self, key: &CacheKey, max_age_secs: i64) -> bool {
        self.fresh_entry(key, max_age_secs).is_some()
    }

    pub fn read(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.load(key, "read")
    }

    /// Read the entry only if it is fresh, in a single backend round trip.
    pub fn fresh_entry(&self, key: &CacheKey, max_age_secs: i64) -> Option<CacheEntry> {
        if max_age_secs <= 0 {
            return None;
        }

        let entry = self.load(key, "fresh_entry")?;
        let now = self.clock.now();
        if entry.is_fresh_at(now, max_age_secs) {
            Some(entry)
        } else {
            debug!(
                target = SOURCE,
                op = "fresh_entry",
                key = %key,
                result = "stale",
                age_secs = entry.age_at(now),
                max_age_secs,
                "Cached entry is older than the allowed age"
            );
            None
        }
    }

    /// Replace the entry for `key`. The previous blob is superseded atomically by the backend.
    pub fn write(&self, key: &CacheKey, entry: &CacheEntry) -> Result<(), StoreError> {
        let bytes = entry.encode().map_err(|source| StoreError::Corrupt {
            name: key.file_name(),
            source,
        })?;
        self.backend.put(&key.file_name(), &bytes)?;
        debug!(
            target = SOURCE,
            op = "write",
            key = %key,
            rows = entry.rows.len(),
            bytes = bytes.len(),
            result = "ok",
            "Cache entry written"
        );
        Ok(())
    }

    /// Remove the entry for `key`. Returns `true` only if something was removed.
    pub fn delete(&self, key: &CacheKey) -> bool {
        match self.backend.remove(&key.file_name()) {
            Ok(removed) => removed,
            Err(err) => {
                self.report_failure("delete", Some(key), &err);
                false
            }
        }
    }

    /// Remove every entry this store manages. Individual failures are logged and counted.
    pub fn purge_all(&self) -> PurgeReport {
        let mut report = PurgeReport::default();
        for key in self.keys() {
            match self.backend.remove(&key.file_name()) {
                Ok(true) => report.removed += 1,
                Ok(false) => {}
                Err(err) => {
                    self.report_failure("purge_all", Some(&key), &err);
                    report.failed += 1;
                }
            }
        }
        debug!(
            target = SOURCE,
            op = "purge_all",
            removed = report.removed,
            failed = report.failed,
            "Cache purge finished"
        );
        report
    }

    /// Keys of all stored entries. Blobs whose names are not cache keys are ignored.
    pub fn keys(&self) -> Vec<CacheKey> {
        match self.backend.list_all() {
            Ok(names) => names
                .iter()
                .filter_map(|name| CacheKey::from_file_name(name))
                .collect(),
            Err(err) => {
                self.report_failure("keys", None, &err);
                Vec::new()
            }
        }
    }

    pub fn inspect(&self, key: &CacheKey) -> Option<EntryInfo> {
        let entry = self.load(key, "inspect")?;
        Some(EntryInfo {
            key: key.clone(),
            stored_at: entry.stored_at,
            age_secs: entry.age_at(self.clock.now()),
            row_count: entry.rows.len(),
        })
    }

    fn load(&self, key: &CacheKey, op: &'static str) -> Option<CacheEntry> {
        let name = key.file_name();
        let bytes = match self.backend.get(&name) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(err) => {
                self.report_failure(op, Some(key), &err);
                return None;
            }
        };

        match CacheEntry::decode(&bytes) {
            Ok(entry) => Some(entry),
            Err(source) => {
                let err = StoreError::Corrupt { name, source };
                self.report_failure(op, Some(key), &err);
                None
            }
        }
    }

    fn report_failure(&self, op: &'static str, key: Option<&CacheKey>, err: &StoreError) {
        match err {
            StoreError::Corrupt { .. } => counter!(METRIC_CACHE_CORRUPT).increment(1),
            StoreError::Unavailable { .. } => counter!(METRIC_STORE_UNAVAILABLE).increment(1),
            _ => {}
        }
        warn!(
            target = SOURCE,
            op,
            key = key.map(CacheKey::as_str).unwrap_or("-"),
            location = %self.backend.location(),
            result = "degraded",
            error_code = err.code(),
            error = %err,
            "Cache storage failure; treating entry as absent"
        );
    }
}

//! Query orchestration: answer "give me a cursor for this query", cached or live.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, warn};

use super::backend::{ByteStore, DirectoryStore, StoreError};
use super::clock::{Clock, SystemClock};
use super::cursor::{CachedCursor, LiveCursor, ResultCursor};
use super::entry::CacheEntry;
use super::error::QueryCacheError;
use super::executor::QueryExecutor;
use super::keys::derive_key;
use super::metric_names::{
    METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_CACHE_WRITE_FAILED, METRIC_LIVE_QUERY,
    METRIC_QUERY_MS,
};
use super::store::{CacheStore, PurgeReport};
use crate::config::CacheSettings;

const SOURCE: &str = "cache::query";

/// Executes read queries through a durable result cache.
///
/// A miss drains the live result set completely before anything is written: entries are single
/// blobs and there is no streamed or partial caching. Very large result sets are therefore held in
/// memory in full, and the first caller pays the whole fetch before seeing a row.
pub struct QueryCache<E, S, C = SystemClock> {
    executor: E,
    store: CacheStore<S, C>,
    default_max_age_secs: i64,
}

impl<E, S> QueryCache<E, S>
where
    E: QueryExecutor,
    S: ByteStore,
{
    pub fn new(executor: E, backend: S) -> Self {
        Self::with_store(executor, CacheStore::new(backend))
    }
}

impl<E: QueryExecutor> QueryCache<E, DirectoryStore> {
    /// Cache over the configured directory, using the configured default max age.
    ///
    /// The directory is created only when `create_directory` is set; otherwise a missing directory
    /// leaves caching disabled until it appears.
    pub fn from_settings(executor: E, settings: &CacheSettings) -> Result<Self, StoreError> {
        let backend = if settings.create_directory {
            DirectoryStore::create(settings.directory.clone())?
        } else {
            DirectoryStore::open(settings.directory.clone())
        };
        Ok(Self::new(executor, backend).with_default_max_age(settings.default_max_age_secs))
    }
}

impl<E, S, C> QueryCache<E, S, C>
where
    E: QueryExecutor,
    S: ByteStore,
    C: Clock,
{
    pub fn with_store(executor: E, store: CacheStore<S, C>) -> Self {
        Self {
            executor,
            store,
            default_max_age_secs: 0,
        }
    }

    /// Max age used by [`query_default`](Self::query_default). Zero, the default, disables caching.
    pub fn with_default_max_age(mut self, max_age_secs: i64) -> Self {
        self.default_max_age_secs = max_age_secs;
        self
    }

    pub fn default_max_age_secs(&self) -> i64 {
        self.default_max_age_secs
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn store(&self) -> &CacheStore<S, C> {
        &self.store
    }

    /// Run `sql`, serving it from the cache when an entry younger than `max_age_secs` exists.
    ///
    /// `max_age_secs <= 0` bypasses the cache and returns a live cursor. Storage problems never fail
    /// the call; only executor errors are returned.
    pub fn query(
        &self,
        sql: &str,
        max_age_secs: i64,
    ) -> Result<ResultCursor<E::Cursor>, QueryCacheError> {
        if max_age_secs <= 0 {
            return self.execute_uncached(sql);
        }

        let started_at = Instant::now();
        let key = derive_key(sql);

        if let Some(entry) = self.store.fresh_entry(&key, max_age_secs) {
            counter!(METRIC_CACHE_HIT).increment(1);
            histogram!(METRIC_QUERY_MS, "result" => "hit")
                .record(started_at.elapsed().as_secs_f64() * 1000.0);
            debug!(
                target = SOURCE,
                op = "query",
                result = "cache_hit",
                key = %key,
                rows = entry.rows.len(),
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "Query served from cache"
            );
            return Ok(ResultCursor::Cached(CachedCursor::new(
                key,
                Arc::from(entry.rows),
            )));
        }

        counter!(METRIC_CACHE_MISS).increment(1);
        counter!(METRIC_LIVE_QUERY).increment(1);
        let mut live = LiveCursor::new(self.executor.execute(sql)?);
        let rows = live.fetch_all()?;
        let entry = CacheEntry::new(self.store.now(), rows);

        if let Err(err) = self.store.write(&key, &entry) {
            counter!(METRIC_CACHE_WRITE_FAILED).increment(1);
            warn!(
                target = SOURCE,
                op = "query",
                key = %key,
                result = "write_failed",
                error_code = err.code(),
                error = %err,
                "Failed to persist query result; serving materialized rows uncached"
            );
        }

        let elapsed = started_at.elapsed();
        histogram!(METRIC_QUERY_MS, "result" => "miss").record(elapsed.as_secs_f64() * 1000.0);
        debug!(
            target = SOURCE,
            op = "query",
            result = "cache_miss",
            key = %key,
            rows = entry.rows.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Query executed live and cached"
        );

        Ok(ResultCursor::Cached(CachedCursor::new(
            key,
            Arc::from(entry.rows),
        )))
    }

    /// [`query`](Self::query) with the configured default max age.
    pub fn query_default(&self, sql: &str) -> Result<ResultCursor<E::Cursor>, QueryCacheError> {
        self.query(sql, self.default_max_age_secs)
    }

    /// Run `sql` live with no cache involvement.
    pub fn execute_uncached(&self, sql: &str) -> Result<ResultCursor<E::Cursor>, QueryCacheError> {
        let started_at = Instant::now();
        counter!(METRIC_LIVE_QUERY).increment(1);
        let rows = self.executor.execute(sql)?;
        histogram!(METRIC_QUERY_MS, "result" => "live")
            .record(started_at.elapsed().as_secs_f64() * 1000.0);
        debug!(
            target = SOURCE,
            op = "execute_uncached",
            result = "live",
            "Query executed without cache"
        );
        Ok(ResultCursor::Live(LiveCursor::new(rows)))
    }

    /// Drop the cached entry for `sql`. The text must be byte-identical to the cached query.
    pub fn clear_entry(&self, sql: &str) -> bool {
        self.store.delete(&derive_key(sql))
    }

    /// Drop every cached entry.
    pub fn clear_all(&self) -> PurgeReport {
        self.store.purge_all()
    }
}

//! Uniform iteration over live and cached result sets.
//!
//! A [`ResultCursor`] is either [`Live`](ResultCursor::Live), wrapping the executor's own cursor, or
//! [`Cached`](ResultCursor::Cached), walking a materialized row sequence. Each cursor owns its
//! position, so any number of cursors over the same cached entry iterate independently and the
//! position disappears with the cursor.

use std::sync::Arc;

use uuid::Uuid;

use super::entry::Row;
use super::error::QueryCacheError;
use super::executor::{ExecutorError, LiveRows};
use super::keys::CacheKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
    Live,
    Cached,
}

/// Identity of one in-progress iteration. Not persistent: it means nothing after the process exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorHandle {
    kind: CursorKind,
    key: Option<CacheKey>,
    disambiguator: Option<Uuid>,
}

impl CursorHandle {
    pub(crate) fn live() -> Self {
        Self {
            kind: CursorKind::Live,
            key: None,
            disambiguator: None,
        }
    }

    pub(crate) fn cached(key: CacheKey) -> Self {
        Self {
            kind: CursorKind::Cached,
            key: Some(key),
            disambiguator: Some(Uuid::new_v4()),
        }
    }

    /// Same kind and key, new disambiguator.
    fn reissue(&self) -> Self {
        Self {
            kind: self.kind,
            key: self.key.clone(),
            disambiguator: self.disambiguator.map(|_| Uuid::new_v4()),
        }
    }

    pub fn kind(&self) -> CursorKind {
        self.kind
    }

    pub fn key(&self) -> Option<&CacheKey> {
        self.key.as_ref()
    }

    pub fn disambiguator(&self) -> Option<Uuid> {
        self.disambiguator
    }
}

/// Cursor over a driver result set. Position tracking belongs to the driver.
#[derive(Debug)]
pub struct LiveCursor<R> {
    rows: R,
    handle: CursorHandle,
    yielded: usize,
    exhausted: bool,
}

impl<R: LiveRows> LiveCursor<R> {
    pub fn new(rows: R) -> Self {
        Self {
            rows,
            handle: CursorHandle::live(),
            yielded: 0,
            exhausted: false,
        }
    }

    pub fn fetch_next(&mut self) -> Result<Option<Row>, ExecutorError> {
        if self.exhausted {
            return Ok(None);
        }
        match self.rows.advance()? {
            Some(row) => {
                self.yielded += 1;
                Ok(Some(row))
            }
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }

    /// Drain every remaining row.
    pub fn fetch_all(&mut self) -> Result<Vec<Row>, ExecutorError> {
        let mut rows = Vec::with_capacity(self.rows.row_count().unwrap_or(0));
        while let Some(row) = self.fetch_next()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// The driver's native count when it has one. Otherwise the cursor must have been drained
    /// (normally through [`fetch_all`](Self::fetch_all)) and the number of rows it yielded is
    /// reported.
    pub fn count(&self) -> Result<usize, QueryCacheError> {
        match self.rows.row_count() {
            Some(count) => Ok(count),
            None if self.exhausted => Ok(self.yielded),
            None => Err(QueryCacheError::CountUnavailable),
        }
    }

    pub fn handle(&self) -> &CursorHandle {
        &self.handle
    }

    pub fn into_inner(self) -> R {
        self.rows
    }
}

/// Cursor over a materialized, shared row sequence.
#[derive(Debug, Clone)]
pub struct CachedCursor {
    rows: Arc<[Row]>,
    position: usize,
    handle: CursorHandle,
}

impl CachedCursor {
    pub fn new(key: CacheKey, rows: Arc<[Row]>) -> Self {
        Self {
            rows,
            position: 0,
            handle: CursorHandle::cached(key),
        }
    }

    pub fn fetch_next(&mut self) -> Option<Row> {
        let row = self.rows.get(self.position)?.clone();
        self.position += 1;
        Some(row)
    }

    /// The complete stored sequence. Does not move the cursor.
    pub fn fetch_all(&self) -> Vec<Row> {
        self.rows.to_vec()
    }

    /// Total stored rows, regardless of position. Does not move the cursor.
    ///
    /// Named apart from [`Iterator::count`], which consumes the cursor and counts only unread rows.
    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.rows.len().saturating_sub(self.position)
    }

    pub fn reset(&mut self) {
        self.position = 0;
    }

    pub fn handle(&self) -> &CursorHandle {
        &self.handle
    }

    /// Another cursor over the same rows, starting from the beginning with its own handle.
    pub fn fork(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
            position: 0,
            handle: self.handle.reissue(),
        }
    }
}

impl Iterator for CachedCursor {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.fetch_next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CachedCursor {}

/// A result set the caller can iterate without knowing where it came from.
#[derive(Debug)]
pub enum ResultCursor<R> {
    Live(LiveCursor<R>),
    Cached(CachedCursor),
}

impl<R: LiveRows> ResultCursor<R> {
    pub fn fetch_next(&mut self) -> Result<Option<Row>, ExecutorError> {
        match self {
            Self::Live(cursor) => cursor.fetch_next(),
            Self::Cached(cursor) => Ok(cursor.fetch_next()),
        }
    }

    pub fn fetch_all(&mut self) -> Result<Vec<Row>, ExecutorError> {
        match self {
            Self::Live(cursor) => cursor.fetch_all(),
            Self::Cached(cursor) => Ok(cursor.fetch_all()),
        }
    }

    pub fn count(&self) -> Result<usize, QueryCacheError> {
        match self {
            Self::Live(cursor) => cursor.count(),
            Self::Cached(cursor) => Ok(cursor.total_rows()),
        }
    }

    pub fn handle(&self) -> &CursorHandle {
        match self {
            Self::Live(cursor) => cursor.handle(),
            Self::Cached(cursor) => cursor.handle(),
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }
}

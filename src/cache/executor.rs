//! The relational executor the cache sits in front of.

use std::error::Error as StdError;

use thiserror::Error;

use super::entry::Row;

/// Failure reported by the injected executor. Passed to callers unchanged.
#[derive(Debug, Error)]
#[error("query execution failed: {message}")]
pub struct ExecutorError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl ExecutorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Runs query text against a database and yields a live cursor.
pub trait QueryExecutor {
    type Cursor: LiveRows;

    fn execute(&self, sql: &str) -> Result<Self::Cursor, ExecutorError>;
}

/// A driver-owned cursor positioned over a live result set.
pub trait LiveRows {
    /// Advance and return the next row, or `None` once the set is exhausted.
    fn advance(&mut self) -> Result<Option<Row>, ExecutorError>;

    /// Native row count. Drivers that cannot report one without draining return `None`.
    fn row_count(&self) -> Option<usize> {
        None
    }
}

impl<E: QueryExecutor + ?Sized> QueryExecutor for &E {
    type Cursor = E::Cursor;

    fn execute(&self, sql: &str) -> Result<Self::Cursor, ExecutorError> {
        (**self).execute(sql)
    }
}

impl<E: QueryExecutor + ?Sized> QueryExecutor for std::sync::Arc<E> {
    type Cursor = E::Cursor;

    fn execute(&self, sql: &str) -> Result<Self::Cursor, ExecutorError> {
        (**self).execute(sql)
    }
}

/// A fully buffered live cursor, for drivers that return whole result sets at once.
#[derive(Debug, Clone, Default)]
pub struct BufferedRows {
    rows: std::collections::VecDeque<Row>,
    total: usize,
}

impl BufferedRows {
    pub fn new(rows: Vec<Row>) -> Self {
        let total = rows.len();
        Self {
            rows: rows.into(),
            total,
        }
    }
}

impl LiveRows for BufferedRows {
    fn advance(&mut self) -> Result<Option<Row>, ExecutorError> {
        Ok(self.rows.pop_front())
    }

    fn row_count(&self) -> Option<usize> {
        Some(self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffered_rows_report_native_count() {
        let mut rows = BufferedRows::new(vec![Row::new().with("a", 1_i64), Row::new()]);
        assert_eq!(rows.row_count(), Some(2));
        assert!(rows.advance().expect("advance").is_some());
        assert!(rows.advance().expect("advance").is_some());
        assert!(rows.advance().expect("advance").is_none());
        assert_eq!(rows.row_count(), Some(2));
    }

    #[test]
    fn executor_error_keeps_source() {
        let io = std::io::Error::other("connection reset");
        let error = ExecutorError::with_source("SELECT 1", io);
        assert_eq!(error.message(), "SELECT 1");
        assert!(StdError::source(&error).is_some());
        assert_eq!(error.to_string(), "query execution failed: SELECT 1");
    }
}

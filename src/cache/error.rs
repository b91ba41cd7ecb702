use thiserror::Error;

use super::executor::ExecutorError;

/// Errors surfaced by [`QueryCache`](super::QueryCache) and [`ResultCursor`](super::ResultCursor).
///
/// Storage failures never appear here; they are absorbed by the cache store.
#[derive(Debug, Error)]
pub enum QueryCacheError {
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    #[error("row count unavailable: the driver has no native count and the cursor was not drained")]
    CountUnavailable,
}

//! Durable query-result cache.
//!
//! - [`CacheKey`]: SHA-256 identity of the exact query text
//! - [`CacheStore`]: freshness-aware entry persistence over a [`ByteStore`]
//! - [`ResultCursor`]: one iteration contract for live and cached result sets
//! - [`QueryCache`]: the composition root callers talk to
//!
//! ```no_run
//! use querystash::cache::{DirectoryStore, QueryCache};
//! # fn demo<E: querystash::cache::QueryExecutor>(executor: E) -> Result<(), querystash::cache::QueryCacheError> {
//! let cache = QueryCache::new(executor, DirectoryStore::open("sql-cache"));
//! let mut cursor = cache.query("SELECT id, email FROM users", 3600)?;
//! while let Some(row) = cursor.fetch_next()? {
//!     println!("{row:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod backend;
mod clock;
mod cursor;
mod entry;
mod error;
mod executor;
mod keys;
mod lock;
pub(crate) mod metric_names;
mod query;
mod store;

pub use backend::{ByteStore, DirectoryStore, MemoryStore, StoreError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use cursor::{CachedCursor, CursorHandle, CursorKind, LiveCursor, ResultCursor};
pub use entry::{CacheEntry, Row, Scalar};
pub use error::QueryCacheError;
pub use executor::{BufferedRows, ExecutorError, LiveRows, QueryExecutor};
pub use keys::{CacheKey, derive_key};
pub use query::QueryCache;
pub use store::{CacheStore, EntryInfo, PurgeReport};

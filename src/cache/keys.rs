//! Cache key derivation.
//!
//! A key is the SHA-256 digest of the exact query bytes, rendered as lowercase hex.
//! Nothing is normalised: `SELECT 1` and `select 1` are different entries.

use std::fmt;

use sha2::{Digest, Sha256};

const KEY_HEX_LEN: usize = 64;
const BLOB_EXTENSION: &str = "json";

/// Identity of a cache entry, derived solely from query text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a query.
    pub fn derive(query: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(query.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Accept an already-derived key, rejecting anything that is not 64 lowercase hex characters.
    pub fn parse(value: &str) -> Option<Self> {
        let valid = value.len() == KEY_HEX_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(value.to_string()))
    }

    /// Recover a key from a stored blob name such as `<hex>.json`.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(BLOB_EXTENSION)?.strip_suffix('.')?;
        Self::parse(stem)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name under which the entry is persisted.
    pub fn file_name(&self) -> String {
        format!("{}.{BLOB_EXTENSION}", self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the cache key for a query.
pub fn derive_key(query: &str) -> CacheKey {
    CacheKey::derive(query)
}

pub(crate) const METRIC_CACHE_HIT: &str = "querystash_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "querystash_cache_miss_total";
pub(crate) const METRIC_CACHE_WRITE_FAILED: &str = "querystash_cache_write_failed_total";
pub(crate) const METRIC_CACHE_CORRUPT: &str = "querystash_cache_corrupt_total";
pub(crate) const METRIC_STORE_UNAVAILABLE: &str = "querystash_store_unavailable_total";
pub(crate) const METRIC_LIVE_QUERY: &str = "querystash_live_query_total";
pub(crate) const METRIC_QUERY_MS: &str = "querystash_query_ms";

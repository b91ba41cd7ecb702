//! Durable query-result caching with uniform live and cached cursors, plus reversible field
//! obfuscation for values stored at rest.

pub mod cache;
pub mod cipher;
pub mod config;
pub mod infra;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the querystash binary.
#[derive(Debug, Parser)]
#[command(
    name = "querystash",
    version,
    about = "Inspect and maintain a query-result cache"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "QUERYSTASH_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print the cache key derived from a query.
    Key(KeyArgs),
    /// Obfuscate a value with the configured cipher seed.
    Obfuscate(CipherArgs),
    /// Reverse an obfuscated value.
    Decipher(CipherArgs),
    /// Print the salted one-way fingerprint of a value.
    Fingerprint(CipherArgs),
    /// List cached entries with their age and row count.
    List(StoreArgs),
    /// Print one cached entry as JSON.
    Inspect(InspectArgs),
    /// Remove the cached entry for a query.
    Clear(ClearArgs),
    /// Remove every cached entry.
    Purge(StoreArgs),
}

#[derive(Debug, Args, Clone)]
pub struct KeyArgs {
    /// Query text; must be byte-identical to the text the application runs.
    #[arg(value_name = "SQL")]
    pub sql: String,
}

#[derive(Debug, Args, Clone)]
pub struct CipherArgs {
    #[command(flatten)]
    pub overrides: CipherOverrides,

    /// Value to transform.
    #[arg(value_name = "TEXT")]
    pub text: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CipherOverrides {
    /// Override the cipher alphabet.
    #[arg(long = "cipher-alphabet", value_name = "SYMBOLS")]
    pub alphabet: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CacheOverrides {
    /// Override the cache directory.
    #[arg(long = "cache-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct StoreArgs {
    #[command(flatten)]
    pub cache: CacheOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct InspectArgs {
    #[command(flatten)]
    pub cache: CacheOverrides,

    /// Cache key (64 hex characters) as printed by `list`.
    #[arg(value_name = "KEY", required_unless_present = "sql")]
    pub key: Option<String>,

    /// Derive the key from query text instead.
    #[arg(long = "sql", value_name = "SQL", conflicts_with = "key")]
    pub sql: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct ClearArgs {
    #[command(flatten)]
    pub cache: CacheOverrides,

    /// Query text whose entry should be removed.
    #[arg(value_name = "SQL")]
    pub sql: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

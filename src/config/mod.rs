//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{path::PathBuf, str::FromStr};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cipher::DEFAULT_ALPHABET;

mod cli;

pub use cli::{
    CacheOverrides, CipherArgs, CipherOverrides, ClearArgs, CliArgs, Command, InspectArgs,
    KeyArgs, LoggingOverrides, StoreArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "querystash";
const DEFAULT_CACHE_DIR: &str = "sql-cache";
const DEFAULT_MAX_AGE_SECS: i64 = 0;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub cache: CacheSettings,
    pub cipher: CipherSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub directory: PathBuf,
    /// Max age applied by callers that do not pass one. Zero disables caching.
    pub default_max_age_secs: i64,
    /// Create the directory on startup instead of degrading to live execution when it is missing.
    pub create_directory: bool,
}

#[derive(Clone)]
pub struct CipherSettings {
    pub seed: Option<String>,
    pub alphabet: String,
}

impl std::fmt::Debug for CipherSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherSettings")
            .field("seed", &self.seed.as_ref().map(|_| "<redacted>"))
            .field("alphabet", &self.alphabet)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Parse CLI arguments and load settings.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let cli = CliArgs::parse();
    let settings = load(&cli)?;
    Ok((cli, settings))
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("QUERYSTASH").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_logging_overrides(&cli.logging);

    match &cli.command {
        Command::Obfuscate(args) | Command::Decipher(args) | Command::Fingerprint(args) => {
            raw.apply_cipher_overrides(&args.overrides)
        }
        Command::List(args) | Command::Purge(args) => raw.apply_cache_overrides(&args.cache),
        Command::Inspect(args) => raw.apply_cache_overrides(&args.cache),
        Command::Clear(args) => raw.apply_cache_overrides(&args.cache),
        Command::Key(_) => {}
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    cache: RawCacheSettings,
    cipher: RawCipherSettings,
    logging: RawLoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    directory: Option<PathBuf>,
    default_max_age_secs: Option<i64>,
    create_directory: Option<bool>,
}

#[derive(Clone, Deserialize, Default)]
#[serde(default)]
struct RawCipherSettings {
    seed: Option<String>,
    alphabet: Option<String>,
}

impl std::fmt::Debug for RawCipherSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawCipherSettings")
            .field("seed", &self.seed.as_ref().map(|_| "<redacted>"))
            .field("alphabet", &self.alphabet)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

impl RawSettings {
    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    fn apply_cache_overrides(&mut self, overrides: &CacheOverrides) {
        if let Some(directory) = overrides.directory.as_ref() {
            self.cache.directory = Some(directory.clone());
        }
    }

    fn apply_cipher_overrides(&mut self, overrides: &CipherOverrides) {
        if let Some(alphabet) = overrides.alphabet.as_ref() {
            self.cipher.alphabet = Some(alphabet.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            cache,
            cipher,
            logging,
        } = raw;

        let cache = build_cache_settings(cache)?;
        let cipher = build_cipher_settings(cipher)?;
        let logging = build_logging_settings(logging)?;

        Ok(Self {
            cache,
            cipher,
            logging,
        })
    }
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let directory = cache
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "cache.directory",
            "path must not be empty",
        ));
    }

    let default_max_age_secs = cache.default_max_age_secs.unwrap_or(DEFAULT_MAX_AGE_SECS);
    if default_max_age_secs < 0 {
        return Err(LoadError::invalid(
            "cache.default_max_age_secs",
            "must be zero (disabled) or positive",
        ));
    }

    Ok(CacheSettings {
        directory,
        default_max_age_secs,
        create_directory: cache.create_directory.unwrap_or(false),
    })
}

fn build_cipher_settings(cipher: RawCipherSettings) -> Result<CipherSettings, LoadError> {
    let alphabet = cipher
        .alphabet
        .unwrap_or_else(|| DEFAULT_ALPHABET.to_string());
    if alphabet.is_empty() {
        return Err(LoadError::invalid(
            "cipher.alphabet",
            "alphabet must not be empty",
        ));
    }

    let seed = cipher.seed.filter(|seed| !seed.is_empty());

    Ok(CipherSettings { seed, alphabet })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::WARN,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

use std::process;

use querystash::{
    cache::{CacheKey, CacheStore, DirectoryStore, StoreError, derive_key},
    cipher::Obfuscator,
    config::{self, CipherSettings, Command, LoadError, Settings},
    infra::{error::InfraError, telemetry},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

const SOURCE: &str = "querystash::cli";

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no cipher seed configured; set QUERYSTASH__CIPHER__SEED or `cipher.seed`")]
    MissingSeed,
    #[error("`{0}` is not a cache key")]
    InvalidKey(String),
    #[error("no cached entry for key {0}")]
    NotFound(CacheKey),
    #[error("failed to render entry: {0}")]
    Render(#[from] serde_json::Error),
}

fn main() {
    if let Err(error) = run() {
        report_cli_error(&error);
        process::exit(1);
    }
}

fn report_cli_error(error: &CliError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "command failed");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "command failed");
    });
}

fn run() -> Result<(), CliError> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    match cli_args.command {
        Command::Key(args) => {
            println!("{}", derive_key(&args.sql));
            Ok(())
        }
        Command::Obfuscate(args) => {
            println!("{}", obfuscator(&settings.cipher)?.obfuscate(&args.text));
            Ok(())
        }
        Command::Decipher(args) => {
            println!("{}", obfuscator(&settings.cipher)?.decipher(&args.text));
            Ok(())
        }
        Command::Fingerprint(args) => {
            println!("{}", obfuscator(&settings.cipher)?.fingerprint(&args.text));
            Ok(())
        }
        Command::List(_) => run_list(&settings),
        Command::Inspect(args) => {
            let key = match (args.key, args.sql) {
                (_, Some(sql)) => derive_key(&sql),
                (Some(raw), None) => CacheKey::parse(&raw).ok_or(CliError::InvalidKey(raw))?,
                (None, None) => return Err(CliError::InvalidKey(String::new())),
            };
            run_inspect(&settings, key)
        }
        Command::Clear(args) => {
            let store = open_store(&settings)?;
            let key = derive_key(&args.sql);
            let removed = store.delete(&key);
            info!(
                target = SOURCE,
                op = "clear",
                key = %key,
                removed,
                "Cache entry cleared"
            );
            println!("{}", if removed { "removed" } else { "absent" });
            Ok(())
        }
        Command::Purge(_) => {
            let report = open_store(&settings)?.purge_all();
            println!("removed {} failed {}", report.removed, report.failed);
            Ok(())
        }
    }
}

fn obfuscator(cipher: &CipherSettings) -> Result<Obfuscator, CliError> {
    let seed = cipher.seed.as_deref().ok_or(CliError::MissingSeed)?;
    Ok(Obfuscator::with_alphabet(&cipher.alphabet, seed))
}

fn open_store(settings: &Settings) -> Result<CacheStore<DirectoryStore>, CliError> {
    let backend = if settings.cache.create_directory {
        DirectoryStore::create(settings.cache.directory.clone())?
    } else {
        DirectoryStore::open(settings.cache.directory.clone())
    };
    Ok(CacheStore::new(backend))
}

fn run_list(settings: &Settings) -> Result<(), CliError> {
    let store = open_store(settings)?;
    for key in store.keys() {
        let Some(info) = store.inspect(&key) else {
            continue;
        };
        println!(
            "{}\t{}\t{}s\t{} rows",
            info.key,
            format_timestamp(info.stored_at),
            info.age_secs,
            info.row_count
        );
    }
    Ok(())
}

fn run_inspect(settings: &Settings, key: CacheKey) -> Result<(), CliError> {
    let store = open_store(settings)?;
    let entry = store.read(&key).ok_or(CliError::NotFound(key))?;
    println!("{}", serde_json::to_string_pretty(&entry)?);
    Ok(())
}

fn format_timestamp(unix: i64) -> String {
    OffsetDateTime::from_unix_timestamp(unix)
        .ok()
        .and_then(|stamp| stamp.format(&Rfc3339).ok())
        .unwrap_or_else(|| unix.to_string())
}

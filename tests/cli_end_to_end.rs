use assert_cmd::Command;
use predicates::str::{contains, starts_with};
use querystash::cache::{CacheEntry, CacheStore, DirectoryStore, Row, derive_key};
use tempfile::TempDir;

fn querystash(workdir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("querystash"));
    cmd.current_dir(workdir.path())
        .env_remove("QUERYSTASH_CONFIG_FILE")
        .env_remove("QUERYSTASH__CIPHER__SEED")
        .env_remove("QUERYSTASH__CACHE__DIRECTORY")
        .env_remove("RUST_LOG");
    cmd
}

fn seed_entries(dir: &std::path::Path, queries: &[&str]) {
    let store = CacheStore::new(DirectoryStore::open(dir));
    for sql in queries {
        store
            .write(
                &derive_key(sql),
                &CacheEntry::new(1_700_000_000, vec![Row::new().with("sql", *sql)]),
            )
            .expect("seed entry");
    }
}

#[test]
fn key_prints_sha256_of_query_text() {
    let workdir = TempDir::new().expect("workdir");
    querystash(&workdir)
        .args(["key", "SELECT * FROM t"])
        .assert()
        .success()
        .stdout("bdd379b02821e0bc9d5bab29094f054ce781e1cd351e51bd8f6329c0799638d4\n");
}

#[test]
fn obfuscate_and_decipher_use_seed_from_environment() {
    let workdir = TempDir::new().expect("workdir");
    querystash(&workdir)
        .env("QUERYSTASH__CIPHER__SEED", "seed123")
        .args(["obfuscate", "hello"])
        .assert()
        .success()
        .stdout("IFMMP\n");

    querystash(&workdir)
        .env("QUERYSTASH__CIPHER__SEED", "seed123")
        .args(["decipher", "IFMMP"])
        .assert()
        .success()
        .stdout("hello\n");
}

#[test]
fn seed_can_come_from_config_file() {
    let workdir = TempDir::new().expect("workdir");
    let config = workdir.path().join("custom.toml");
    std::fs::write(&config, "[cipher]\nseed = \"seed123\"\n").expect("config file");

    querystash(&workdir)
        .arg("--config-file")
        .arg(&config)
        .args(["fingerprint", "hunter2"])
        .assert()
        .success()
        .stdout("46023a143371937586539ff04bf4d76bc5f99116caf1eb5bd2a023bdb0186006\n");
}

#[test]
fn missing_seed_fails_fast() {
    let workdir = TempDir::new().expect("workdir");
    querystash(&workdir)
        .args(["obfuscate", "hello"])
        .assert()
        .failure()
        .stderr(contains("no cipher seed configured"));
}

#[test]
fn list_inspect_clear_and_purge_manage_the_directory() {
    let workdir = TempDir::new().expect("workdir");
    let cache_dir = workdir.path().join("sql-cache");
    std::fs::create_dir(&cache_dir).expect("cache dir");
    seed_entries(&cache_dir, &["SELECT 1", "SELECT 2"]);

    let listed = querystash(&workdir).arg("list").assert().success();
    let stdout = String::from_utf8_lossy(&listed.get_output().stdout).to_string();
    assert_eq!(stdout.lines().count(), 2);
    assert!(stdout.contains(derive_key("SELECT 1").as_str()));
    assert!(stdout.contains("2023-11-14T22:13:20Z"));

    querystash(&workdir)
        .args(["inspect", "--sql", "SELECT 2"])
        .assert()
        .success()
        .stdout(contains("\"stored_at\": 1700000000"))
        .stdout(contains("\"sql\": \"SELECT 2\""));

    querystash(&workdir)
        .args(["clear", "SELECT 1"])
        .assert()
        .success()
        .stdout("removed\n");
    querystash(&workdir)
        .args(["clear", "SELECT 1"])
        .assert()
        .success()
        .stdout("absent\n");

    querystash(&workdir)
        .arg("purge")
        .assert()
        .success()
        .stdout("removed 1 failed 0\n");
    assert_eq!(std::fs::read_dir(&cache_dir).expect("read dir").count(), 0);
}

#[test]
fn cache_dir_override_and_unknown_key() {
    let workdir = TempDir::new().expect("workdir");
    let elsewhere = TempDir::new().expect("cache dir");
    seed_entries(elsewhere.path(), &["SELECT 3"]);

    querystash(&workdir)
        .arg("list")
        .arg("--cache-dir")
        .arg(elsewhere.path())
        .assert()
        .success()
        .stdout(starts_with(derive_key("SELECT 3").as_str()));

    querystash(&workdir)
        .args(["inspect", "not-a-key"])
        .assert()
        .failure()
        .stderr(contains("is not a cache key"));
}

#[test]
fn missing_cache_directory_lists_nothing() {
    let workdir = TempDir::new().expect("workdir");
    querystash(&workdir)
        .arg("list")
        .assert()
        .success()
        .stdout("");
    assert!(!workdir.path().join("sql-cache").exists());
}

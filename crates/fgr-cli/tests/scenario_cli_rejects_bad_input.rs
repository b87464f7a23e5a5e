use predicates::prelude::*;
use std::io::Write;

fn fgr() -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("fgr").expect("fgr binary");
    cmd.env_remove(fgr_db::ENV_DB_URL).env_remove("RUST_LOG");
    cmd
}

#[test]
fn invalid_seed_strategy_fails_before_connecting() {
    fgr()
        .args(["reconcile", "--dry-run", "--seed-defaults-from", "everyone"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --seed-defaults-from"));
}

#[test]
fn conflicting_edge_scopes_are_rejected() {
    fgr()
        .args(["reconcile", "--only-deleted-edges", "--active-edges-only"])
        .assert()
        .failure();
}

#[test]
fn missing_database_url_is_reported() {
    fgr()
        .args(["reconcile", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing env var FGR_DATABASE_URL"));
}

#[test]
fn literal_credentials_in_config_are_refused() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "store:\n  database_url_env: \"postgres://app:hunter2@db/tsdd\"").unwrap();

    fgr()
        .args(["--config", f.path().to_str().unwrap(), "reconcile", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_SECRET_DETECTED"))
        .stderr(predicate::str::contains("hunter2").not());
}

#[test]
fn strict_config_fails_on_unknown_keys() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "reconcile:\n  dry_run: true").unwrap();

    fgr()
        .args(["--config", f.path().to_str().unwrap(), "--strict-config", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_UNUSED_KEYS"));
}

#[test]
fn config_hash_prints_hash_and_canonical_json() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "sequence:\n  edge_counter: seq:friend").unwrap();

    fgr()
        .args(["config-hash", f.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("config_hash="))
        .stdout(predicate::str::contains(r#"{"sequence":{"edge_counter":"seq:friend"}}"#));
}

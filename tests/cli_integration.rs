//! Integration tests for the Lockbox CLI.
//!
//! These tests exercise the binary end-to-end using `assert_cmd`.
//! Passwords come from `LOCKBOX_PASSWORD` / `LOCKBOX_NEW_PASSWORD` and
//! destructive commands use `--force`, so nothing prompts.

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

const PASSWORD: &str = "correct-horse";

/// Helper: get a Command pointing at the lockbox binary.
fn lockbox() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("lockbox").expect("binary should exist")
}

/// A project dir with a cheap KDF so tests stay fast.
fn project(storage: &str) -> TempDir {
    let tmp = TempDir::new().unwrap();
    tmp.child(".lockbox.toml")
        .write_str(&format!("storage = \"{storage}\"\nkdf_iterations = 1000\n"))
        .unwrap();
    tmp
}

fn run(tmp: &TempDir, password: &str, args: &[&str]) -> assert_cmd::assert::Assert {
    lockbox()
        .current_dir(tmp.path())
        .env("LOCKBOX_PASSWORD", password)
        .env_remove("LOCKBOX_NEW_PASSWORD")
        .env_remove("LOCKBOX_VAULT")
        .args(args)
        .assert()
}

// ---------------------------------------------------------------------------
// Help and usage
// ---------------------------------------------------------------------------

#[test]
fn help_flag_shows_usage() {
    lockbox()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Encrypted single-user secret vault"))
        .stdout(predicate::str::contains("set"))
        .stdout(predicate::str::contains("get"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("delete"))
        .stdout(predicate::str::contains("rotate"));
}

#[test]
fn version_flag_shows_version() {
    lockbox()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lockbox"));
}

#[test]
fn no_args_shows_help() {
    lockbox()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

// ---------------------------------------------------------------------------
// End-to-end flows
// ---------------------------------------------------------------------------

#[test]
fn set_get_list_delete_document_form() {
    let tmp = project("document");

    run(&tmp, PASSWORD, &["set", "github", "ghp_abc"])
        .success()
        .stdout(predicate::str::contains("added"));
    tmp.child("vault.enc.json").assert(predicate::path::exists());

    run(&tmp, PASSWORD, &["get", "github"])
        .success()
        .stdout("ghp_abc\n");

    run(&tmp, PASSWORD, &["set", "aws", "AKIA123"]).success();
    run(&tmp, PASSWORD, &["list"])
        .success()
        .stdout(predicate::str::contains("aws").and(predicate::str::contains("github")));

    run(&tmp, PASSWORD, &["delete", "aws", "--force"])
        .success()
        .stdout(predicate::str::contains("Deleted entry 'aws'"));
    run(&tmp, PASSWORD, &["get", "aws"])
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[cfg(feature = "sqlite-store")]
#[test]
fn set_get_table_form_via_flags() {
    let tmp = project("document");

    run(
        &tmp,
        PASSWORD,
        &["--storage", "table", "--vault", "vault.sqlite", "set", "github", "ghp_abc"],
    )
    .success();
    tmp.child("vault.sqlite").assert(predicate::path::exists());
    tmp.child("vault.enc.json").assert(predicate::path::missing());

    run(
        &tmp,
        PASSWORD,
        &["--storage", "table", "--vault", "vault.sqlite", "get", "github"],
    )
    .success()
    .stdout("ghp_abc\n");
}

#[test]
fn set_reads_piped_credential() {
    let tmp = project("document");

    lockbox()
        .current_dir(tmp.path())
        .env("LOCKBOX_PASSWORD", PASSWORD)
        .env_remove("LOCKBOX_VAULT")
        .args(["set", "token"])
        .write_stdin("from-stdin\n")
        .assert()
        .success();

    run(&tmp, PASSWORD, &["get", "token"])
        .success()
        .stdout("from-stdin\n");
}

#[test]
fn wrong_password_fails_with_message() {
    let tmp = project("document");
    run(&tmp, PASSWORD, &["set", "github", "ghp_abc"]).success();

    run(&tmp, "not-the-password", &["get", "github"])
        .failure()
        .stderr(predicate::str::contains("Authentication failed"));
}

#[test]
fn short_password_rejected_on_create() {
    let tmp = project("document");

    run(&tmp, "short", &["set", "github", "ghp_abc"])
        .failure()
        .stderr(predicate::str::contains("at least 8 characters"));
    tmp.child("vault.enc.json").assert(predicate::path::missing());
}

#[test]
fn rotate_switches_password() {
    for storage in ["document", "table"] {
        if storage == "table" && !cfg!(feature = "sqlite-store") {
            continue;
        }
        let tmp = project(storage);
        run(&tmp, PASSWORD, &["set", "github", "ghp_abc"]).success();

        lockbox()
            .current_dir(tmp.path())
            .env("LOCKBOX_PASSWORD", PASSWORD)
            .env("LOCKBOX_NEW_PASSWORD", "brand-new-password")
            .env_remove("LOCKBOX_VAULT")
            .args(["rotate", "--force"])
            .assert()
            .success()
            .stdout(predicate::str::contains("rotated"));

        run(&tmp, PASSWORD, &["get", "github"]).failure();
        run(&tmp, "brand-new-password", &["get", "github"])
            .success()
            .stdout("ghp_abc\n");
    }
}

#[test]
fn rotate_without_vault_fails() {
    let tmp = project("document");

    lockbox()
        .current_dir(tmp.path())
        .env("LOCKBOX_PASSWORD", PASSWORD)
        .env("LOCKBOX_NEW_PASSWORD", "brand-new-password")
        .env_remove("LOCKBOX_VAULT")
        .args(["rotate", "--force"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no vault"));
}

#[test]
fn bad_config_is_reported() {
    let tmp = TempDir::new().unwrap();
    tmp.child(".lockbox.toml").write_str("storage = \"cloud\"\n").unwrap();

    run(&tmp, PASSWORD, &["list"])
        .failure()
        .stderr(predicate::str::contains("Config file error"));
}

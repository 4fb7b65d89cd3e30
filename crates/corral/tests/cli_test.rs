#![allow(clippy::unwrap_used)]
// CLI surface tests: argument parsing, help text, and failure modes that
// don't need a live backend.

use assert_cmd::Command;
use predicates::prelude::*;

fn corral() -> Command {
    let mut cmd = Command::cargo_bin("corral").unwrap();
    // Hermetic: no ambient credentials or profile selection.
    cmd.env_remove("CORRAL_TOKEN")
        .env_remove("CORRAL_API_URL")
        .env_remove("CORRAL_PROFILE")
        .env_remove("XDG_CONFIG_HOME")
        .env("HOME", env!("CARGO_TARGET_TMPDIR"));
    cmd
}

#[test]
fn no_args_prints_help() {
    corral()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_lists_commands() {
    corral()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("rules"))
        .stdout(predicate::str::contains("suggest"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn version_flag_works() {
    corral()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("corral"));
}

#[test]
fn config_path_prints_a_path() {
    corral()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn rules_list_without_config_fails_cleanly() {
    corral()
        .args(["rules", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[test]
fn rules_list_without_token_is_an_auth_error() {
    corral()
        .args(["rules", "list", "--api-url", "https://api.example.com"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("token"));
}

#[test]
fn suggest_run_rejects_conflicting_selection_flags() {
    corral()
        .args(["suggest", "run", "--add-all", "--pick"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn completions_generate_for_bash() {
    corral()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("corral"));
}

#[test]
fn create_requires_name_and_cel() {
    corral()
        .args(["rules", "create", "--name", "x"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("--cel"));
}

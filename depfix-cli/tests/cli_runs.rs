//! End-to-end runs of the depfix binary against scratch repositories.

#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const APP: &str = "import requests\n\
r = requests.get('https://example.com', verify=False)\n\
print(r.status_code)\n";

fn depfix() -> Command {
    Command::cargo_bin("depfix").expect("depfix binary")
}

/// A repository with one insecure call and no remote.
fn create_temp_repo(config: &str) -> TempDir {
    let td = tempfile::tempdir().expect("tempdir");
    fs::write(td.path().join("app.py"), APP).unwrap();
    fs::write(td.path().join("depfix.toml"), config).unwrap();
    td
}

fn offline_repo() -> TempDir {
    create_temp_repo("[vcs]\npull = false\n")
}

fn read(path: impl AsRef<Path>) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn test_help_lists_subcommands() {
    depfix()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run").and(predicate::str::contains("resume")));
}

#[test]
fn test_run_writes_derived_file_and_artifacts() {
    let temp = offline_repo();

    depfix()
        .arg("run")
        .arg("--repo-root")
        .arg(temp.path())
        .arg("--no-tests")
        .assert()
        .success()
        .stdout(predicate::str::contains("depfix: success"));

    let fixed = read(temp.path().join("app_fixed.py"));
    assert_eq!(fixed, APP.replace("verify=False", "verify=True"));
    assert_eq!(read(temp.path().join("app.py")), APP);

    let out = temp.path().join(".depfix");
    let changelog = read(out.join("changelog.md"));
    assert!(changelog.contains("# depfix change log"));
    assert!(changelog.contains("```diff"));
    let result = read(out.join("result.json"));
    assert!(result.contains("depfix.result.v1"));
    assert!(result.contains("\"success\": true"));
    assert!(read(out.join("state.json")).contains("\"next_stage\": null"));
}

#[test]
fn test_dry_run_writes_no_derived_file() {
    let temp = offline_repo();

    depfix()
        .current_dir(temp.path())
        .arg("run")
        .arg("--dry-run")
        .arg("--no-tests")
        .assert()
        .success()
        .stdout(predicate::str::contains("[dry-run] would apply"));

    assert!(!temp.path().join("app_fixed.py").exists());
    assert!(read(temp.path().join(".depfix/changelog.md")).contains("(not written)"));
}

#[test]
fn test_config_file_controls_run_options() {
    let temp = create_temp_repo("[run]\ndry_run = true\nrun_tests = false\n[vcs]\npull = false\n");

    depfix()
        .current_dir(temp.path())
        .arg("run")
        .assert()
        .success();

    assert!(!temp.path().join("app_fixed.py").exists());
    assert!(!read(temp.path().join(".depfix/changelog.md")).contains("## Tests"));
}

#[test]
fn test_custom_out_dir() {
    let temp = offline_repo();
    let out = tempfile::tempdir().unwrap();

    depfix()
        .current_dir(temp.path())
        .arg("run")
        .arg("--no-tests")
        .arg("--out-dir")
        .arg(out.path())
        .assert()
        .success();

    assert!(out.path().join("changelog.md").exists());
    assert!(!temp.path().join(".depfix").exists());
}

#[test]
fn test_missing_repository_is_a_tool_error() {
    let temp = tempfile::tempdir().unwrap();

    depfix()
        .arg("run")
        .arg("--repo-root")
        .arg(temp.path().join("does-not-exist"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("is not a directory"));
}

#[test]
fn test_invalid_config_is_a_tool_error() {
    let temp = create_temp_repo("[run\ndry_run = ");

    depfix()
        .current_dir(temp.path())
        .arg("run")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("parse config file"));
}

#[test]
fn test_unknown_backend_flag_is_rejected() {
    depfix()
        .arg("run")
        .arg("--backend")
        .arg("oracle")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_resume_of_finished_run_only_reports() {
    let temp = offline_repo();

    depfix()
        .current_dir(temp.path())
        .arg("run")
        .arg("--no-tests")
        .assert()
        .success();
    fs::remove_file(temp.path().join("app_fixed.py")).unwrap();

    depfix()
        .current_dir(temp.path())
        .arg("resume")
        .arg("--checkpoint")
        .arg(temp.path().join(".depfix/state.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Changes applied: 1"));

    // Nothing was re-applied.
    assert!(!temp.path().join("app_fixed.py").exists());
}

#[test]
fn test_resume_rejects_garbage_checkpoint() {
    let temp = offline_repo();
    let checkpoint = temp.path().join("state.json");
    fs::write(&checkpoint, "{\"schema\": 1}").unwrap();

    depfix()
        .current_dir(temp.path())
        .arg("resume")
        .arg("--checkpoint")
        .arg(&checkpoint)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("parse checkpoint"));
}

#[cfg(unix)]
#[test]
fn test_passing_tests_run_the_derived_file() {
    let temp = create_temp_repo("[tests]\ncommand = [\"true\"]\n[vcs]\npull = false\n");

    depfix()
        .current_dir(temp.path())
        .arg("run")
        .assert()
        .success();

    let changelog = read(temp.path().join(".depfix/changelog.md"));
    assert!(changelog.contains("| `app.py` | `app_fixed.py` | pass |"));
}

#[cfg(unix)]
#[test]
fn test_failing_tests_exit_with_partial_status() {
    let temp = create_temp_repo(
        "[tests]\ncommand = [\"sh\", \"-c\", \"exit 1\", \"sh\"]\n[vcs]\npull = false\n",
    );

    depfix()
        .current_dir(temp.path())
        .arg("run")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("depfix: partial"))
        .stdout(predicate::str::contains("TestFailure"));

    assert!(temp.path().join("app_fixed.py").exists());
}

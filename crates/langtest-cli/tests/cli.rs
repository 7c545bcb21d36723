// End-to-end tests of the `langtest` binary against a throwaway suite.
// Requires: assert_cmd, predicates crates in [dev-dependencies]

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use serde_json::{json, Value};
use tempfile::TempDir;

fn write_test(root: &Path, name: &str, descriptor: Value, stdout: Option<&str>) {
    let dir = root.join("tests").join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("test.json"), descriptor.to_string()).unwrap();
    fs::write(dir.join("main.eo"), "[] > main").unwrap();
    if let Some(stdout) = stdout {
        fs::write(dir.join("expected_stdout"), stdout).unwrap();
    }
}

/// Suite whose "build" always succeeds and whose "run" prints the staged
/// `expected_stdout` file.
fn suite() -> TempDir {
    let root = tempfile::tempdir().unwrap();
    for env in ["compilation", "runtime"] {
        fs::create_dir_all(root.path().join("envs").join(env).join("src")).unwrap();
    }

    let config = json!({
        "tests_root": root.path().join("tests"),
        "environments_root": root.path().join("envs"),
        "sources_subdir": "src",
        "work_root": root.path().join("work"),
        "compilation": {
            "directory": "compilation",
            "build": { "command": ["true"] }
        },
        "runtime": {
            "directory": "runtime",
            "build": { "command": ["true"] },
            "run": { "command": ["sh", "-c", "cat {env}/src/expected_stdout"] }
        }
    });
    fs::write(root.path().join("langtest.json"), config.to_string()).unwrap();

    write_test(
        root.path(),
        "compiles",
        json!({"type": "compilation", "active": true, "result": "ok"}),
        None,
    );
    write_test(
        root.path(),
        "must-not-compile",
        json!({"type": "compilation", "active": true, "result": "fail"}),
        None,
    );
    write_test(
        root.path(),
        "disabled",
        json!({"type": "compilation", "active": false, "result": "ok"}),
        None,
    );
    write_test(
        root.path(),
        "prints-42",
        json!({"type": "runtime", "active": true, "result": "42\n"}),
        Some("42\n"),
    );
    root
}

fn langtest(root: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("langtest").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("LANGTEST_TESTS_ROOT")
        .env_remove("LANGTEST_ENVIRONMENTS_ROOT")
        .env_remove("LANGTEST_STAGING")
        .env("LANGTEST_CONFIG", root.path().join("langtest.json"));
    cmd
}

#[test]
fn matrix_prints_set_output_for_active_tests_of_kind() {
    let root = suite();
    let output = langtest(&root)
        .args(["matrix", "--kind", "compilation"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let body = stdout
        .trim_end()
        .strip_prefix("::set-output name=matrix::")
        .expect("set-output prefix");
    let matrix: Value = serde_json::from_str(body).unwrap();
    let mut dirs: Vec<&str> = matrix["include"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["directory"].as_str().unwrap())
        .collect();
    dirs.sort();
    assert_eq!(dirs, vec!["compiles", "must-not-compile"]);
}

#[test]
fn matrix_all_includes_inactive_tests() {
    let root = suite();
    let output = langtest(&root)
        .args(["matrix", "--all", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let matrix: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(matrix["include"].as_array().unwrap().len(), 4);
}

#[test]
fn matrix_fails_on_malformed_descriptor() {
    let root = suite();
    let broken = root.path().join("tests").join("broken");
    fs::create_dir_all(&broken).unwrap();
    fs::write(broken.join("test.json"), "{\"type\": ").unwrap();

    langtest(&root)
        .args(["matrix", "--kind", "runtime"])
        .assert()
        .failure()
        .stderr(contains("malformed descriptor"));
}

#[test]
fn run_passing_compilation_test_prints_ok() {
    let root = suite();
    langtest(&root)
        .args(["run", "compiles", "--kind", "compilation"])
        .assert()
        .success()
        .stdout(contains("OK!"));
}

#[test]
fn run_compilation_mismatch_exits_nonzero() {
    let root = suite();
    langtest(&root)
        .args(["run", "must-not-compile"])
        .assert()
        .failure()
        .stderr(contains("Expected compilation result").and(contains("\"fail\"")));
}

#[test]
fn run_runtime_test_writes_report() {
    let root = suite();
    let report_path = root.path().join("report.json");

    langtest(&root)
        .args(["run", "prints-42", "--report"])
        .arg(&report_path)
        .assert()
        .success()
        .stdout(contains("OK!"));

    let report: Value = serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["directory"], "prints-42");
    assert_eq!(report["verdict"]["status"], "pass");
    assert_eq!(report["run_stdout"], "42\n");
}

#[test]
fn run_rejects_wrong_kind() {
    let root = suite();
    langtest(&root)
        .args(["run", "prints-42", "--kind", "compilation"])
        .assert()
        .failure()
        .stderr(contains("unknown type of the test"));
}

#[test]
fn run_rejects_nested_test_name() {
    let root = suite();
    write_test(
        root.path(),
        "group/compiles",
        json!({"type": "compilation", "active": true, "result": "fail"}),
        None,
    );

    langtest(&root)
        .args(["run", "group/compiles"])
        .assert()
        .failure()
        .stderr(contains("invalid test name 'group/compiles'"));
}

//! End-to-end tests of the `ksail` binary that need neither Docker nor a
//! cluster tool.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn ksail() -> Command {
    let mut cmd = Command::from(std::process::Command::new(assert_cmd::cargo::cargo_bin("ksail")));
    cmd.env_remove("RUST_LOG")
        .env_remove("KSAIL_LOG_OUTPUT")
        .env_remove("KSAIL_LOG_LEVEL");
    cmd
}

#[test]
fn test_help_lists_commands() {
    ksail()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("cluster"))
        .stdout(predicate::str::contains("registry"))
        .stdout(predicate::str::contains("init"));
}

#[test]
fn test_init_writes_config() {
    let dir = tempdir().unwrap();

    ksail()
        .current_dir(dir.path())
        .args([
            "init",
            "--distribution",
            "k3d",
            "--name",
            "dev",
            "--mirror-registry",
            "docker.io",
            "--local-registry",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("ksail.yaml"));

    let content = fs::read_to_string(dir.path().join("ksail.yaml")).unwrap();
    assert!(content.contains("name: dev"));
    assert!(content.contains("k3d"));
    assert!(content.contains("host: docker.io"));
}

#[test]
fn test_init_refuses_existing_config() {
    let dir = tempdir().unwrap();

    ksail().current_dir(dir.path()).arg("init").assert().success();

    ksail()
        .current_dir(dir.path())
        .args(["init", "--name", "other"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    ksail()
        .current_dir(dir.path())
        .args(["init", "--name", "other", "--force"])
        .assert()
        .success();
    let content = fs::read_to_string(dir.path().join("ksail.yaml")).unwrap();
    assert!(content.contains("name: other"));
}

#[test]
fn test_init_explicit_config_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("custom.yaml");

    ksail()
        .arg("--config")
        .arg(&path)
        .arg("init")
        .assert()
        .success();
    assert!(path.exists());
}

#[test]
fn test_bad_mirror_spec_is_usage_error() {
    let dir = tempdir().unwrap();

    ksail()
        .current_dir(dir.path())
        .args(["init", "--mirror-registry", "docker.io=ftp://nope"])
        .assert()
        .code(2);
    assert!(!dir.path().join("ksail.yaml").exists());
}

#[test]
fn test_registry_create_rejects_invalid_name() {
    ksail()
        .args(["registry", "create", "Not Valid!"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("registry name"));
}

#[test]
fn test_registry_create_rejects_port_zero() {
    ksail()
        .args(["registry", "create", "local-registry", "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("port"));
}

#[test]
fn test_registry_create_rejects_non_http_upstream() {
    ksail()
        .args([
            "registry",
            "create",
            "mirror",
            "--upstream",
            "registry-1.docker.io",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("http://"));
}

#[test]
fn test_completion_bash() {
    ksail()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ksail"));
}

#[test]
fn test_completion_unsupported_shell() {
    ksail()
        .args(["completion", "tcsh"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not supported"));
}

#[test]
fn test_invalid_config_fails_before_touching_docker() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("ksail.yaml"),
        "cluster:\n  name: \"bad name\"\n",
    )
    .unwrap();

    ksail()
        .current_dir(dir.path())
        .args(["cluster", "create"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cluster name"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let dir = tempdir().unwrap();

    ksail()
        .current_dir(dir.path())
        .args(["--config", "missing.yaml", "cluster", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.yaml"));
}

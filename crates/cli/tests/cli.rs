use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

/// A sitepush command isolated from the caller's environment and config
fn sitepush(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("sitepush").unwrap();
    cmd.current_dir(cwd)
        .env("HOME", cwd)
        .env_remove("RUST_LOG")
        .env_remove("SITEPUSH_SECRET_ID")
        .env_remove("SITEPUSH_SECRET_KEY")
        .env_remove("SITEPUSH_BUCKET")
        .env_remove("SITEPUSH_REGION")
        .env_remove("SITEPUSH_APP_ID")
        .env_remove("SITEPUSH_ENDPOINT")
        .env_remove("COS_SECRET_ID")
        .env_remove("COS_SECRET_KEY")
        .env_remove("COS_BUCKET")
        .env_remove("COS_REGION");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let dir = tempfile::tempdir().unwrap();
    sitepush(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("plan"));
}

#[test]
fn deploy_without_configuration_prints_hint() {
    let dir = tempfile::tempdir().unwrap();
    sitepush(dir.path())
        .arg("deploy")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "missing required option(s): credential_id, credential_secret, bucket, region",
        ))
        .stderr(predicate::str::contains("SITEPUSH_SECRET_ID"))
        .stderr(predicate::str::contains("COS_SECRET_ID"));
}

#[test]
fn cos_environment_variables_are_accepted() {
    let dir = tempfile::tempdir().unwrap();
    sitepush(dir.path())
        .args(["plan", "--secret-id", "id"])
        .env("COS_SECRET_KEY", "secret")
        .env("COS_BUCKET", "blog")
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing required option(s): region"));
}

#[test]
fn environment_fills_missing_options() {
    let dir = tempfile::tempdir().unwrap();
    sitepush(dir.path())
        .args(["plan", "--bucket", "blog"])
        .env("SITEPUSH_SECRET_ID", "id")
        .env("SITEPUSH_SECRET_KEY", "secret")
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing required option(s): region"));
}

#[test]
fn explicit_config_file_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    sitepush(dir.path())
        .args(["plan", "--config", "missing.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[test]
fn invalid_concurrency_is_rejected_before_any_io() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("sitepush.toml"),
        "[storage]\ncredential_id = \"id\"\ncredential_secret = \"secret\"\nbucket = \"blog\"\nregion = \"us-east-1\"\n\n[deploy]\nconcurrency = 0\n",
    )
    .unwrap();

    sitepush(dir.path())
        .arg("deploy")
        .assert()
        .failure()
        .stderr(predicate::str::contains("concurrency must be at least 1"));
}

#[test]
fn missing_publish_directory_fails_before_listing() {
    let dir = tempfile::tempdir().unwrap();
    sitepush(dir.path())
        .args([
            "plan",
            "--public-dir",
            "public",
            "--bucket",
            "blog",
            "--region",
            "us-east-1",
            "--secret-id",
            "id",
            "--secret-key",
            "secret",
            "--endpoint",
            "http://127.0.0.1:9",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot scan"));
}

#[test]
fn completion_writes_script_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    sitepush(dir.path())
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sitepush"));
}

#[test]
fn unsupported_shell_fails() {
    let dir = tempfile::tempdir().unwrap();
    sitepush(dir.path())
        .args(["completion", "tcsh"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported shell"));
}

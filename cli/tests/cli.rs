#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::Path;

use anyhow::Result;
use predicates::prelude::*;
use predicates::str::contains;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

/// Keeps every run inside `home` and away from the network.
fn remotehand_command(home: &Path) -> Result<assert_cmd::Command> {
    let mut cmd = assert_cmd::Command::cargo_bin("remotehand")?;
    cmd.env("REMOTEHAND_HOME", home)
        .env_remove("TELEGRAM_TOKEN")
        .env_remove("TELEGRAM_CHAT_ID")
        .env_remove("REMOTEHAND_CREDENTIAL")
        .env_remove("REMOTEHAND_DEV_MODE")
        .env_remove("RUST_LOG");
    Ok(cmd)
}

fn write_config(home: &Path, body: &str) -> Result<()> {
    std::fs::write(home.join("config.toml"), body)?;
    Ok(())
}

#[test]
fn setup_writes_identity_to_config() -> Result<()> {
    let home = TempDir::new()?;

    remotehand_command(home.path())?
        .args(["setup", "--store", "12", "--location", "Dialog - Till"])
        .assert()
        .success()
        .stdout(contains("Saved 12 / Dialog - Till"));

    let config = std::fs::read_to_string(home.path().join("config.toml"))?;
    assert!(config.contains("store = \"12\""));
    assert!(config.contains("location = \"Dialog - Till\""));
    Ok(())
}

#[test]
fn setup_keeps_unrelated_tables() -> Result<()> {
    let home = TempDir::new()?;
    write_config(home.path(), "[rdp]\nhost = \"rdp.example.com\"\n")?;

    remotehand_command(home.path())?
        .args(["setup", "--store", "7", "--location", "Office"])
        .assert()
        .success();

    let config = std::fs::read_to_string(home.path().join("config.toml"))?;
    assert!(config.contains("host = \"rdp.example.com\""));
    assert!(config.contains("store = \"7\""));
    Ok(())
}

#[test]
fn rdp_without_endpoint_fails() -> Result<()> {
    let home = TempDir::new()?;

    remotehand_command(home.path())?
        .arg("rdp")
        .assert()
        .failure()
        .stderr(contains("no RDP endpoint configured"));
    Ok(())
}

#[test]
fn check_update_is_skipped_in_dev_mode() -> Result<()> {
    let home = TempDir::new()?;
    write_config(home.path(), "[update]\napi_base = \"http://127.0.0.1:9\"\n")?;

    remotehand_command(home.path())?
        .env("REMOTEHAND_DEV_MODE", "1")
        .arg("check-update")
        .assert()
        .success()
        .stdout(contains("Self-update skipped"));
    Ok(())
}

#[test]
fn first_start_points_at_setup() -> Result<()> {
    let home = TempDir::new()?;

    remotehand_command(home.path())?
        .env("REMOTEHAND_DEV_MODE", "1")
        .assert()
        .success()
        .stderr(contains("remotehand setup --store"));

    assert!(home.path().join("log").join("remotehand.log").exists());
    Ok(())
}

#[test]
fn remote_access_with_missing_tool_fails() -> Result<()> {
    let home = TempDir::new()?;

    remotehand_command(home.path())?
        .args(["remote-access", "--tool"])
        .arg(home.path().join("AnyDesk.exe"))
        .assert()
        .failure()
        .stderr(contains("remote tool not found at"));
    Ok(())
}

#[test]
fn help_lists_close_rdp() -> Result<()> {
    let home = TempDir::new()?;

    remotehand_command(home.path())?
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("close-rdp").and(contains("Terminate all running RDP client sessions")));
    Ok(())
}

#[test]
fn elevated_child_flags_are_hidden_and_paired() -> Result<()> {
    let home = TempDir::new()?;

    remotehand_command(home.path())?
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("set-credential").not());

    remotehand_command(home.path())?
        .args(["--set-credential", "/nonexistent/tool"])
        .assert()
        .code(2)
        .stderr(contains("--request-id"));
    Ok(())
}

#[test]
fn elevated_child_without_secret_never_succeeds() -> Result<()> {
    let home = TempDir::new()?;
    let flag_dir = home.path().join("flags");
    write_config(
        home.path(),
        &format!("[elevation]\nflag_dir = {:?}\n", flag_dir.display().to_string()),
    )?;

    // 3 when not elevated; 4 when the test runs as root and the target check
    // is reached.
    remotehand_command(home.path())?
        .args(["--set-credential", "/nonexistent/tool", "--request-id"])
        .arg(uuid::Uuid::new_v4().to_string())
        .assert()
        .failure()
        .code(predicate::in_iter([3, 4]));

    assert!(flag_dir.join("remotehand-elevated.log").exists());
    Ok(())
}

#[test]
fn version_flag_prints_package_version() -> Result<()> {
    let home = TempDir::new()?;
    let output = remotehand_command(home.path())?.arg("--version").output()?;
    assert_eq!(
        String::from_utf8(output.stdout)?.trim(),
        format!("remotehand {}", env!("CARGO_PKG_VERSION"))
    );
    Ok(())
}

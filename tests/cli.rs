mod common;

use assert_cmd::Command;
use common::{sysfs_fixture, EXPECTED_TEXT};

#[test]
fn once_prints_text_samples() {
    let dir = sysfs_fixture();

    Command::cargo_bin("drm-agent")
        .unwrap()
        .env_remove("RUST_LOG")
        .args(["--once", "--sys-path"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(EXPECTED_TEXT);
}

#[test]
fn once_prints_json_report() {
    let dir = sysfs_fixture();

    let output = Command::cargo_bin("drm-agent")
        .unwrap()
        .args(["--once", "--format", "json", "--agent-id", "test-agent", "--sys-path"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["agent_id"], "test-agent");
    assert_eq!(report["collector"], "drm");
    let samples = report["samples"].as_array().unwrap();
    assert_eq!(samples.len(), 24);
    assert_eq!(samples[0]["name"], "node_drm_card_enable");
    assert_eq!(samples[0]["labels"]["card"], "card0");
    assert_eq!(samples[0]["value"], 1.0);
}

#[test]
fn once_fails_when_poll_fails() {
    let dir = tempfile::tempdir().unwrap();

    Command::cargo_bin("drm-agent")
        .unwrap()
        .args(["--once", "--sys-path"])
        .arg(dir.path())
        .assert()
        .failure()
        .stdout("");
}

#[test]
fn missing_sys_path_fails_at_startup() {
    Command::cargo_bin("drm-agent")
        .unwrap()
        .args(["--once", "--sys-path", "/definitely/not/a/sysfs"])
        .assert()
        .failure();
}

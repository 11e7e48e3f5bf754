//! CLI integration tests
//!
//! These tests verify that the CLI works correctly with various options.

use assert_cmd::Command;
use manifest_merger::xml::{SourceFile, SourceKind, XmlLoader};
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;

/// Get the path to the test fixtures directory
fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture(name: &str) -> String {
    fixtures_path().join(name).display().to_string()
}

/// The binary, run from an empty directory so no config file is picked up
fn cli(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("manifest-merger").unwrap();
    cmd.current_dir(dir.path());
    cmd
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_help() {
    let dir = tempfile::tempdir().unwrap();
    cli(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--main"))
        .stdout(predicate::str::contains("--lib"));
}

#[test]
fn test_version() {
    let dir = tempfile::tempdir().unwrap();
    cli(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_main_fails() {
    let dir = tempfile::tempdir().unwrap();
    cli(&dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No main manifest configured"));
}

// ============================================================================
// Merging
// ============================================================================

#[test]
fn test_merge_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let output = cli(&dir)
        .args(["--main", &fixture("app/AndroidManifest.xml")])
        .args(["--overlay", &fixture("debug/AndroidManifest.xml")])
        .args(["--lib", &format!("lib={}", fixture("lib/AndroidManifest.xml"))])
        .assert()
        .success()
        .stderr(predicate::str::contains("Merge succeeded"))
        .get_output()
        .clone();

    // stdout holds the manifest and nothing else
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(!stdout.contains("Merge succeeded"));
    let merged = XmlLoader::load_str(&stdout, SourceFile::in_memory("stdout", SourceKind::Main)).unwrap();
    assert_eq!(merged.package(), Some("com.example.app"));
    assert!(stdout.contains("com.example.lib.LibActivity"));
    assert!(stdout.contains("com.example.app.provider"));
}

#[test]
fn test_merge_to_file_with_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("merged.xml");
    cli(&dir)
        .args(["--main", &fixture("app/AndroidManifest.xml")])
        .args(["--min-sdk", "21", "--version-code", "99"])
        .args(["--out", &out.display().to_string()])
        .assert()
        .success();

    let merged = fs::read_to_string(&out).unwrap();
    assert!(merged.contains("android:minSdkVersion=\"21\""));
    assert!(merged.contains("android:versionCode=\"99\""));
    assert!(!merged.contains("tools:"));
}

#[test]
fn test_conflict_exits_with_error() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("merged.xml");
    cli(&dir)
        .args(["--main", &fixture("conflict/main.xml")])
        .args(["--lib", &fixture("conflict/lib.xml")])
        .args(["--out", &out.display().to_string()])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("permission#com.example.permission.SYNC"));
    assert!(!out.exists());
}

#[test]
fn test_placeholder_flag() {
    let dir = tempfile::tempdir().unwrap();
    let main = dir.path().join("AndroidManifest.xml");
    fs::write(
        &main,
        r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="com.app">
    <application android:label="${appName}" />
</manifest>"#,
    )
    .unwrap();

    cli(&dir)
        .args(["--main", &main.display().to_string()])
        .args(["--placeholder", "appName=Demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("android:label=\"Demo\""));

    cli(&dir)
        .args(["--main", &main.display().to_string()])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("appName"));
}

#[test]
fn test_json_report() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("report.json");
    cli(&dir)
        .args(["--main", &fixture("app/AndroidManifest.xml")])
        .args(["--format", "json", "--report-output", &report.display().to_string()])
        .assert()
        .success();

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    // the unused tools:replace in the fixture is a warning
    assert_eq!(json["result"], "warning");
    assert_eq!(json["summary"]["errors"], 0);
    assert!(json["merged_document"].as_str().unwrap().contains("com.example.app"));
}

#[test]
fn test_blame_file() {
    let dir = tempfile::tempdir().unwrap();
    let blame = dir.path().join("blame.txt");
    cli(&dir)
        .args(["--main", &fixture("app/AndroidManifest.xml")])
        .args(["--lib", &fixture("lib/AndroidManifest.xml")])
        .args(["--blame", &blame.display().to_string(), "--simple-filenames", "-q"])
        .assert()
        .success();

    let blame = fs::read_to_string(&blame).unwrap();
    assert!(blame.contains("activity#com.example.lib.LibActivity"));
    assert!(blame.contains("ADDED from"));
}

#[test]
fn test_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("merged.xml");
    fs::write(
        dir.path().join("manifest-merger.yml"),
        format!(
            "main: {}\nlibraries:\n  - name: lib\n    path: {}\nproperties:\n  target_sdk_version: \"30\"\n",
            fixture("app/AndroidManifest.xml"),
            fixture("lib/AndroidManifest.xml")
        ),
    )
    .unwrap();

    cli(&dir)
        .args(["--out", &out.display().to_string()])
        .assert()
        .success();

    let merged = fs::read_to_string(&out).unwrap();
    assert!(merged.contains("android:targetSdkVersion=\"30\""));
    assert!(merged.contains("LibActivity"));
}

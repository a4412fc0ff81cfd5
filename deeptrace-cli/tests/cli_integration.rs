//! CLI integration tests for deeptrace-cli.
//!
//! These tests run the actual binary with mock models and check outputs
//! and exit codes.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Get a Command for the deeptrace binary.
fn deeptrace() -> Command {
    let mut cmd = Command::cargo_bin("deeptrace").unwrap();
    cmd.env_remove("INFERENCE_URL").env_remove("DATABASE_URL");
    cmd
}

fn write_png(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    image::RgbImage::from_pixel(32, 32, image::Rgb([200, 150, 120]))
        .save(&path)
        .unwrap();
    path
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    deeptrace()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Deepfake detection"))
        .stdout(predicate::str::contains("classify"))
        .stdout(predicate::str::contains("records"));
}

#[test]
fn test_help_shows_exit_codes() {
    deeptrace()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("65"))
        .stdout(predicate::str::contains("69"));
}

#[test]
fn test_version_displays_version() {
    deeptrace()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("deeptrace"));
}

#[test]
fn test_classify_help_shows_options() {
    deeptrace()
        .args(["classify", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--kind"))
        .stdout(predicate::str::contains("--mock"))
        .stdout(predicate::str::contains("--seed"))
        .stdout(predicate::str::contains("--json"));
}

// ============================================================================
// Error Handling Tests
// ============================================================================

#[test]
fn test_missing_file_returns_input_error() {
    deeptrace()
        .args(["classify", "--mock", "nonexistent_file.jpg"])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to read file"));
}

#[test]
fn test_unknown_extension_requires_kind() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("notes.txt");
    fs::write(&file, b"hello").unwrap();

    deeptrace()
        .args(["classify", "--mock", file.to_str().unwrap()])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("--kind"));
}

#[test]
fn test_invalid_kind_is_rejected() {
    deeptrace()
        .args(["classify", "--kind", "hologram", "x.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown media kind"));
}

#[test]
fn test_no_model_source_returns_unavailable() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_png(temp_dir.path(), "face.png");

    deeptrace()
        .args(["classify", file.to_str().unwrap()])
        .assert()
        .code(69)
        .stderr(predicate::str::contains("No inference service configured"));
}

#[test]
fn test_corrupt_image_returns_input_error() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("broken.png");
    fs::write(&file, b"not an image at all").unwrap();

    deeptrace()
        .args(["classify", "--mock", file.to_str().unwrap()])
        .assert()
        .code(66);
}

// ============================================================================
// Classification Tests
// ============================================================================

#[test]
fn test_classify_authentic_image() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_png(temp_dir.path(), "face.png");

    deeptrace()
        .args(["--color", "never", "classify", "--mock", file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("AUTHENTIC"))
        .stdout(predicate::str::contains("Media kind: image"));
}

#[test]
fn test_classify_manipulated_image_exit_code() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_png(temp_dir.path(), "face.png");

    deeptrace()
        .args([
            "--color",
            "never",
            "classify",
            "--mock",
            "--mock-score",
            "0.93",
            file.to_str().unwrap(),
        ])
        .assert()
        .code(65)
        .stdout(predicate::str::contains("MANIPULATED"));
}

#[test]
fn test_classify_json_output() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_png(temp_dir.path(), "face.png");

    let output = deeptrace()
        .args(["classify", "--mock", "--json", file.to_str().unwrap()])
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&output.get_output().stdout);
    let json: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(json["prediction"], "real");
    assert_eq!(json["media_format"], "image");
    assert!(json.get("frames").is_none());
}

#[test]
fn test_kind_override() {
    let temp_dir = TempDir::new().unwrap();
    let png = write_png(temp_dir.path(), "face.png");
    let renamed = temp_dir.path().join("face.upload");
    fs::rename(&png, &renamed).unwrap();

    deeptrace()
        .args([
            "classify",
            "--mock",
            "--json",
            "--kind",
            "image",
            renamed.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"prediction\":\"real\""));
}

#[test]
fn test_quiet_mode_minimal_output() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_png(temp_dir.path(), "face.png");

    let output = deeptrace()
        .args(["--quiet", "classify", "--mock", file.to_str().unwrap()])
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&output.get_output().stdout);
    assert!(
        stdout.trim().is_empty(),
        "Quiet mode should have no stdout, got: {}",
        stdout
    );
}

// ============================================================================
// Records Tests
// ============================================================================

#[test]
fn test_records_on_fresh_database() {
    let temp_dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", temp_dir.path().join("records.db").display());

    deeptrace()
        .args(["records", "--database", &url])
        .assert()
        .success()
        .stdout(predicate::str::contains("No records"));
}

#[test]
fn test_records_json_on_fresh_database() {
    let temp_dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", temp_dir.path().join("records.db").display());

    deeptrace()
        .args(["records", "--json", "--database", &url])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

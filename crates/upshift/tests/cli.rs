//! End-to-end CLI integration tests
//!
//! These tests invoke the compiled binary as a subprocess against real
//! temporary workspaces to verify the CLI behaves correctly from a user's
//! perspective.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Returns a Command configured to run our binary.
///
/// Note: `cargo_bin` is marked deprecated for edge cases involving custom
/// cargo build directories, but works correctly for standard project layouts.
#[allow(deprecated)]
fn cmd() -> Command {
    Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap()
}

fn workspace_with(content: &str) -> TempDir {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("module.py"), content).unwrap();
    tmp
}

fn module(tmp: &TempDir) -> String {
    std::fs::read_to_string(tmp.path().join("module.py")).unwrap()
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_shows_usage() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Options:"));
}

#[test]
fn version_flag_shows_version() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn invalid_flag_shows_error() {
    cmd()
        .arg("--not-a-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

// =============================================================================
// Error Cases
// =============================================================================

#[test]
fn fails_without_a_target_file() {
    let tmp = TempDir::new().unwrap();
    cmd()
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("target file is required"));
}

#[test]
fn fails_when_no_version_is_found() {
    let tmp = workspace_with("just a comment\n");
    cmd()
        .current_dir(tmp.path())
        .arg("module.py")
        .assert()
        .failure()
        .stderr(predicate::str::contains("version not found"));
}

// =============================================================================
// Release Workflows
// =============================================================================

#[test]
fn bumps_a_file_end_to_end() {
    let tmp = workspace_with("__version__ = '1.2.3.dev'\n");
    cmd()
        .current_dir(tmp.path())
        .arg("module.py")
        .assert()
        .success()
        .stdout(predicate::str::contains("released version 1.2.3"));
    assert_eq!(module(&tmp), "__version__ = '1.2.3'\n");
}

#[test]
fn part_flag_bumps_the_requested_component() {
    let tmp = workspace_with("__version__ = '1.2.3.dev'\n");
    cmd()
        .current_dir(tmp.path())
        .args(["-M", "module.py"])
        .assert()
        .success();
    assert_eq!(module(&tmp), "__version__ = '2.0.0'\n");
}

#[test]
fn prepare_flags_drive_the_next_cycle() {
    let tmp = workspace_with("__version__ = '1.2.3.dev'\n");
    cmd()
        .current_dir(tmp.path())
        .args(["--prepare-patch", "--prepare-suffix", "dev", "module.py"])
        .assert()
        .success();
    // Bump to 1.2.3, then prepare to the next dev version.
    assert_eq!(module(&tmp), "__version__ = '1.2.4.dev'\n");
}

#[test]
fn bump_only_stops_after_the_bump() {
    let tmp = workspace_with("__version__ = '1.2.3.dev'\n");
    cmd()
        .current_dir(tmp.path())
        .args(["-b", "--prepare-patch", "--prepare-suffix", "dev", "module.py"])
        .assert()
        .success();
    assert_eq!(module(&tmp), "__version__ = '1.2.3'\n");
}

#[test]
fn config_file_drives_the_release() {
    let tmp = workspace_with("__version__ = '1.2.3.dev'\n");
    std::fs::write(
        tmp.path().join(".upshift.toml"),
        "file = \"module.py\"\n\n[bump]\npart = \"minor\"\n",
    )
    .unwrap();
    cmd()
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("released version 1.3.0"));
    assert_eq!(module(&tmp), "__version__ = '1.3.0'\n");
}

// =============================================================================
// Dry Run
// =============================================================================

#[test]
fn dryrun_reports_a_diff_and_changes_nothing() {
    let tmp = workspace_with("__version__ = '1.2.3.dev'\n");
    cmd()
        .current_dir(tmp.path())
        .args(["-d", "module.py"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-__version__ = '1.2.3.dev'"))
        .stdout(predicate::str::contains("+__version__ = '1.2.3'"))
        .stdout(predicate::str::contains("dry run complete"));
    assert_eq!(module(&tmp), "__version__ = '1.2.3.dev'\n");
}

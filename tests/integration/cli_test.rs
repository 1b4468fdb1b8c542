//! Integration tests for the castplay CLI

use tempfile::TempDir;

use super::helpers::{fixtures_dir, run_castplay, temp_fixture};

fn fixture(name: &str) -> String {
    fixtures_dir().join(name).display().to_string()
}

// ============================================================================
// Help Output Tests
// ============================================================================

#[test]
fn help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    let (stdout, _stderr, exit_code) = run_castplay(&home, &["--help"]);

    assert_eq!(exit_code, 0);
    for command in ["play", "info", "config", "completions"] {
        assert!(stdout.contains(command), "missing {command} in help");
    }
}

#[test]
fn play_help_documents_keys() {
    let home = TempDir::new().unwrap();
    let (stdout, _stderr, exit_code) = run_castplay(&home, &["play", "--help"]);

    assert_eq!(exit_code, 0);
    assert!(stdout.contains("--speed"));
    assert!(stdout.contains("--pause-on-markers"));
    assert!(stdout.contains("space pause/resume"));
}

// ============================================================================
// Headless Playback Tests
// ============================================================================

#[test]
fn headless_play_prints_final_screen() {
    let home = TempDir::new().unwrap();
    let (stdout, stderr, exit_code) =
        run_castplay(&home, &["play", &fixture("sample.cast"), "--speed", "10"]);

    assert_eq!(exit_code, 0, "stderr: {stderr}");
    insta::assert_snapshot!(stdout.trim_end(), @r"
    hello
    world
    $
    ");
}

#[test]
fn headless_play_ttyrec() {
    let home = TempDir::new().unwrap();
    let (stdout, stderr, exit_code) =
        run_castplay(&home, &["play", &fixture("sample.ttyrec"), "--speed", "10"]);

    assert_eq!(exit_code, 0, "stderr: {stderr}");
    assert_eq!(stdout.lines().collect::<Vec<_>>(), ["first", "second"]);
}

#[test]
fn headless_play_typescript_with_timing() {
    let home = TempDir::new().unwrap();
    let (stdout, stderr, exit_code) = run_castplay(
        &home,
        &[
            "play",
            &fixture("typescript"),
            "--timing",
            &fixture("typescript.timing"),
            "--speed",
            "10",
        ],
    );

    assert_eq!(exit_code, 0, "stderr: {stderr}");
    assert_eq!(stdout.lines().collect::<Vec<_>>(), ["ls", "file.txt"]);
}

#[test]
fn headless_play_runs_through_marker_pauses() {
    let home = TempDir::new().unwrap();
    let (stdout, stderr, exit_code) = run_castplay(
        &home,
        &[
            "play",
            &fixture("with_markers.cast"),
            "--pause-on-markers",
            "--speed",
            "10",
        ],
    );

    assert_eq!(exit_code, 0, "stderr: {stderr}");
    assert_eq!(stdout.lines().last(), Some("done"));
}

#[test]
fn headless_live_file_stream() {
    let home = TempDir::new().unwrap();
    let (stdout, stderr, exit_code) =
        run_castplay(&home, &["play", "--live", &fixture("sample.cast")]);

    assert_eq!(exit_code, 0, "stderr: {stderr}");
    assert!(stdout.contains("hello"));
    assert!(stdout.contains("world"));
}

// ============================================================================
// Info Tests
// ============================================================================

#[test]
fn info_describes_recording() {
    let home = TempDir::new().unwrap();
    let (stdout, stderr, exit_code) = run_castplay(&home, &["info", &fixture("with_markers.cast")]);

    assert_eq!(exit_code, 0, "stderr: {stderr}");
    assert!(stdout.contains("Format:     asciicast"));
    assert!(stdout.contains("Size:       40x5"));
    assert!(stdout.contains("Markers:    2"));
    assert!(stdout.contains("build"));
    assert!(stdout.contains("test"));
}

#[test]
fn info_detects_ttyrec_by_extension() {
    let home = TempDir::new().unwrap();
    let (stdout, stderr, exit_code) = run_castplay(&home, &["info", &fixture("sample.ttyrec")]);

    assert_eq!(exit_code, 0, "stderr: {stderr}");
    assert!(stdout.contains("Format:     ttyrec"));
    assert!(stdout.contains("Events:     2 output, 0 input"));
}

#[test]
fn info_format_flag_overrides_detection() {
    let home = TempDir::new().unwrap();
    let (_temp_dir, path) = temp_fixture("sample.ttyrec");
    let renamed = path.with_extension("bin");
    std::fs::rename(&path, &renamed).unwrap();

    let (stdout, stderr, exit_code) = run_castplay(
        &home,
        &["info", &renamed.display().to_string(), "--format", "ttyrec"],
    );

    assert_eq!(exit_code, 0, "stderr: {stderr}");
    assert!(stdout.contains("Format:     ttyrec"));
}

// ============================================================================
// Error Handling Tests
// ============================================================================

#[test]
fn play_nonexistent_file_exits_nonzero() {
    let home = TempDir::new().unwrap();
    let (_stdout, stderr, exit_code) = run_castplay(&home, &["play", "nonexistent.cast"]);

    assert_eq!(exit_code, 1);
    assert!(stderr.contains("nonexistent.cast"));
}

#[test]
fn info_rejects_garbage() {
    let home = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("garbage.cast");
    std::fs::write(&path, "not a recording\n").unwrap();

    let (_stdout, stderr, exit_code) = run_castplay(&home, &["info", &path.display().to_string()]);

    assert_eq!(exit_code, 1);
    assert!(stderr.contains("garbage.cast"));
}

#[test]
fn play_rejects_zero_speed() {
    let home = TempDir::new().unwrap();
    let (_stdout, stderr, exit_code) =
        run_castplay(&home, &["play", &fixture("sample.cast"), "--speed", "0"]);

    assert_eq!(exit_code, 1);
    assert!(stderr.contains("Speed must be a positive number"));
}

#[test]
fn play_without_file_is_usage_error() {
    let home = TempDir::new().unwrap();
    let (_stdout, stderr, exit_code) = run_castplay(&home, &["play"]);

    assert_eq!(exit_code, 2);
    assert!(stderr.contains("<FILE>"));
}

// ============================================================================
// Completions
// ============================================================================

#[test]
fn completions_for_bash() {
    let home = TempDir::new().unwrap();
    let (stdout, _stderr, exit_code) = run_castplay(&home, &["completions", "bash"]);

    assert_eq!(exit_code, 0);
    assert!(stdout.contains("_castplay()"));
}

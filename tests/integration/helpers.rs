//! Shared helpers for integration tests

use std::path::PathBuf;
use std::process::Command;

use tempfile::TempDir;
use tokio::sync::broadcast;

use castplay::PlayerEvent;

/// Directory holding the recording fixtures.
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("integration")
        .join("fixtures")
}

pub fn load_fixture(name: &str) -> String {
    std::fs::read_to_string(fixtures_dir().join(name))
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", name, e))
}

pub fn load_fixture_bytes(name: &str) -> Vec<u8> {
    std::fs::read(fixtures_dir().join(name))
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", name, e))
}

/// Copy a fixture into a fresh temp directory.
///
/// The directory is removed when the returned `TempDir` is dropped.
pub fn temp_fixture(name: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join(name);
    std::fs::copy(fixtures_dir().join(name), &path).expect("Failed to copy fixture");
    (temp_dir, path)
}

/// Run the castplay binary with an isolated config directory.
///
/// Returns stdout, stderr and the exit code.
pub fn run_castplay(config_home: &TempDir, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_castplay"))
        .args(args)
        .env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("CASTPLAY_LOG")
        .output()
        .expect("Failed to execute castplay");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let exit_code = output.status.code().unwrap_or(-1);

    (stdout, stderr, exit_code)
}

/// Collect session events until one matches `done`.
pub async fn events_until(
    rx: &mut broadcast::Receiver<PlayerEvent>,
    done: impl Fn(&PlayerEvent) -> bool,
) -> Vec<PlayerEvent> {
    let mut seen = Vec::new();
    loop {
        let event = rx.recv().await.expect("session closed early");
        let finished = done(&event);
        seen.push(event);
        if finished {
            return seen;
        }
    }
}

//! Integration tests for configuration loading and the config command

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use castplay::config::LoopSetting;
use castplay::{Config, Loop};

fn castplay(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("castplay").expect("castplay binary");
    cmd.env("XDG_CONFIG_HOME", config_home.path());
    cmd
}

#[test]
fn config_path_lives_under_config_home() {
    let home = TempDir::new().unwrap();

    castplay(&home)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("castplay").and(predicate::str::contains("config.toml")));
}

#[test]
fn config_init_writes_defaults_once() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("castplay").join("config.toml");

    castplay(&home).args(["config", "init"]).assert().success();
    assert_eq!(Config::load_from(&path).unwrap(), Config::default());

    castplay(&home)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    castplay(&home).args(["config", "init", "--force"]).assert().success();
}

#[test]
fn config_show_prints_sections() {
    let home = TempDir::new().unwrap();

    castplay(&home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[playback]").and(predicate::str::contains("speed = 1.0")));
}

#[test]
fn config_file_values_reach_options() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[playback]\nspeed = 2.0\nidle_time_limit = 1.5\nloop = 3\n\n[live]\nbuffer_time = 0.5\n",
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.playback.speed, 2.0);
    assert_eq!(config.playback.looping, LoopSetting::Times(3));

    let recording = config.recording_options();
    assert_eq!(recording.idle_time_limit, Some(1.5));
    assert_eq!(recording.looping, Loop::Times(3));
    assert_eq!(config.live_options().buffer_time, 0.5);
}

#[test]
fn invalid_config_fails_play() {
    let home = TempDir::new().unwrap();
    let dir = home.path().join("castplay");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), "[playback\nspeed = ").unwrap();

    castplay(&home)
        .args(["play", "whatever.cast"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config file"));
}

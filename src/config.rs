//! Configuration module for castplay
//!
//! Handles loading and saving configuration from ~/.config/castplay/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::driver::{LiveOptions, Loop, RecordingOptions};
use crate::recording::DEFAULT_MIN_FRAME_TIME;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub live: LiveConfig,
}

/// Recording playback defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybackConfig {
    /// Speed multiplier (1.0 = recorded speed)
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// Cap on pauses between events, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_time_limit: Option<f64>,
    /// `false`, `true` (forever) or a number of passes
    #[serde(default, rename = "loop")]
    pub looping: LoopSetting,
    #[serde(default)]
    pub pause_on_markers: bool,
    /// Output closer together than this is merged into one frame, in seconds
    #[serde(default = "default_min_frame_time")]
    pub min_frame_time: f64,
}

/// Live stream pacing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LiveConfig {
    /// Presentation delay, in seconds
    #[serde(default)]
    pub buffer_time: f64,
    /// Longest pause shown during a live stream, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_limit: Option<f64>,
}

/// The `loop` key accepts a bool or a pass count.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum LoopSetting {
    Enabled(bool),
    Times(u32),
}

impl Default for LoopSetting {
    fn default() -> Self {
        LoopSetting::Enabled(false)
    }
}

impl From<LoopSetting> for Loop {
    fn from(setting: LoopSetting) -> Self {
        match setting {
            LoopSetting::Enabled(false) | LoopSetting::Times(0) => Loop::Off,
            LoopSetting::Enabled(true) => Loop::Forever,
            LoopSetting::Times(n) => Loop::Times(n),
        }
    }
}

fn default_speed() -> f64 {
    1.0
}

fn default_min_frame_time() -> f64 {
    DEFAULT_MIN_FRAME_TIME
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            idle_time_limit: None,
            looping: LoopSetting::default(),
            pause_on_markers: false,
            min_frame_time: default_min_frame_time(),
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            buffer_time: 0.0,
            idle_limit: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to
    /// defaults when the file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join("castplay").join("config.toml"))
    }

    /// Recording options from the `[playback]` section.
    pub fn recording_options(&self) -> RecordingOptions {
        RecordingOptions {
            min_frame_time: self.playback.min_frame_time,
            idle_time_limit: self.playback.idle_time_limit,
            looping: self.playback.looping.into(),
            pause_on_markers: self.playback.pause_on_markers,
            ..RecordingOptions::default()
        }
    }

    /// Live options from the `[live]` section.
    pub fn live_options(&self) -> LiveOptions {
        LiveOptions {
            buffer_time: self.live.buffer_time,
            idle_limit: self.live.idle_limit,
            min_frame_time: self.playback.min_frame_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.playback.speed, 1.0);
        assert_eq!(config.recording_options().looping, Loop::Off);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[playback]\nspeed = 2.0\nloop = 3\n\n[live]\nidle_limit = 1.5\n").unwrap();

        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.playback.speed, 2.0);
        assert_eq!(config.playback.looping, LoopSetting::Times(3));
        assert_eq!(config.recording_options().looping, Loop::Times(3));
        assert_eq!(config.playback.min_frame_time, DEFAULT_MIN_FRAME_TIME);
        assert_eq!(config.live_options().idle_limit, Some(1.5));
    }

    #[test]
    fn loop_accepts_bool() {
        let config: Config = toml::from_str("[playback]\nloop = true\n").unwrap();
        assert_eq!(Loop::from(config.playback.looping), Loop::Forever);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.playback.idle_time_limit = Some(2.0);
        config.playback.pause_on_markers = true;
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn invalid_toml_is_reported_with_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[playback\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}

//! Player states.

use std::fmt;

/// Why playback is stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Paused by a command or by a marker
    Paused,
    /// Reached the end of the recording
    Ended,
}

/// Lifecycle of a session.
///
/// `Uninitialized` becomes `Stopped` or `Errored` on first use.
/// `Stopped` and `Playing` alternate. Drivers may push any state into
/// `Loading`, `Offline` or `Errored`; only `Errored` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    #[default]
    Uninitialized,
    Loading,
    Stopped(Option<StopReason>),
    Playing,
    Offline,
    Errored,
}

impl PlayerState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlayerState::Playing)
    }

    pub fn is_ended(&self) -> bool {
        matches!(self, PlayerState::Stopped(Some(StopReason::Ended)))
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerState::Uninitialized => write!(f, "uninitialized"),
            PlayerState::Loading => write!(f, "loading"),
            PlayerState::Stopped(None) => write!(f, "stopped"),
            PlayerState::Stopped(Some(StopReason::Paused)) => write!(f, "paused"),
            PlayerState::Stopped(Some(StopReason::Ended)) => write!(f, "ended"),
            PlayerState::Playing => write!(f, "playing"),
            PlayerState::Offline => write!(f, "offline"),
            PlayerState::Errored => write!(f, "errored"),
        }
    }
}

//! castplay - terminal session player
//!
//! Replays asciicast, ttyrec and typescript recordings, or follows a live
//! asciicast stream, through a virtual terminal.
//!
//! # Layers
//!
//! - [`recording`] / [`asciicast`]: parsing and preparing recordings
//! - [`stream`]: lazy, composable event sequences used by the parsers
//! - [`driver`]: scheduling events against a speed-scaled clock
//! - [`session`]: the player state machine and its command queue
//! - [`terminal`]: the virtual terminal output is fed into
//! - [`player`]: terminal front ends for a session

pub mod asciicast;
pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod player;
pub mod recording;
pub mod session;
pub mod stream;
pub mod terminal;

pub use config::Config;
pub use driver::{LiveOptions, LiveSource, Loop, RecordingOptions, RecordingSource, SeekTarget};
pub use error::{PlayerError, Result};
pub use recording::{Event, EventData, Format, Marker, SourceSpec};
pub use session::{PlayerEvent, PlayerState, Poster, Session, SessionOptions};
pub use terminal::{Terminal, TerminalBuffer};

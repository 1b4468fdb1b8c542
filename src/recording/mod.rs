//! Recording model, loading and preparation.
//!
//! Parsers turn a source encoding into a lazy sequence of [`Event`]s
//! ([`Parsed`]); [`prepare`] runs that sequence through the stream pipeline
//! and realizes the per-kind timelines the scheduler indexes into.
//!
//! # Module Structure
//!
//! - [`prepare`] - Marker merge, frame batching and idle-time limiting
//! - [`ttyrec`] - ttyrec binary framing
//! - [`typescript`] - `script(1)` timing + data files

pub mod prepare;
pub mod ttyrec;
pub mod typescript;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::asciicast;
use crate::error::{PlayerError, Result};

pub use prepare::{prepare, Batcher, IdleLimiter, PrepareOptions, Prepared};

/// Default minimum interval between two delivered frames, in seconds.
pub const DEFAULT_MIN_FRAME_TIME: f64 = 1.0 / 60.0;

/// Event type codes as they appear in asciicast event lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Output (data written to terminal)
    Output, // "o"
    /// Input (data read from terminal)
    Input, // "i"
    /// Marker (annotation)
    Marker, // "m"
    /// Resize (terminal resize)
    Resize, // "r"
    /// Exit (process exit code)
    Exit, // "x"
}

impl EventType {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "o" => Some(EventType::Output),
            "i" => Some(EventType::Input),
            "m" => Some(EventType::Marker),
            "r" => Some(EventType::Resize),
            "x" => Some(EventType::Exit),
            _ => None,
        }
    }

    pub fn to_code(&self) -> &'static str {
        match self {
            EventType::Output => "o",
            EventType::Input => "i",
            EventType::Marker => "m",
            EventType::Resize => "r",
            EventType::Exit => "x",
        }
    }
}

/// Event payloads the player acts on.
#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
    Output(String),
    Input(String),
    Resize { cols: u16, rows: u16 },
    Marker(String),
}

impl EventData {
    pub fn event_type(&self) -> EventType {
        match self {
            EventData::Output(_) => EventType::Output,
            EventData::Input(_) => EventType::Input,
            EventData::Resize { .. } => EventType::Resize,
            EventData::Marker(_) => EventType::Marker,
        }
    }
}

/// A timestamped event. `time` is seconds from the start of the recording.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub time: f64,
    pub data: EventData,
}

impl Event {
    pub fn output(time: f64, text: impl Into<String>) -> Self {
        Self {
            time,
            data: EventData::Output(text.into()),
        }
    }

    pub fn input(time: f64, text: impl Into<String>) -> Self {
        Self {
            time,
            data: EventData::Input(text.into()),
        }
    }

    pub fn resize(time: f64, cols: u16, rows: u16) -> Self {
        Self {
            time,
            data: EventData::Resize { cols, rows },
        }
    }

    pub fn marker(time: f64, label: impl Into<String>) -> Self {
        Self {
            time,
            data: EventData::Marker(label.into()),
        }
    }

    pub fn is_output(&self) -> bool {
        matches!(self.data, EventData::Output(_))
    }

    pub fn is_marker(&self) -> bool {
        matches!(self.data, EventData::Marker(_))
    }
}

/// A named point on the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub time: f64,
    pub label: String,
}

impl Marker {
    pub fn new(time: f64, label: impl Into<String>) -> Self {
        Self {
            time,
            label: label.into(),
        }
    }

    /// A marker given only by its time, with an empty label.
    pub fn at(time: f64) -> Self {
        Self::new(time, "")
    }
}

/// A prepared recording, ready for scheduling.
///
/// The output timeline holds `Output` and `Resize` events in time order;
/// `duration` is the time of its last event.
#[derive(Debug, Clone)]
pub struct Recording {
    pub cols: u16,
    pub rows: u16,
    pub output: Vec<Event>,
    pub input: Vec<Event>,
    pub markers: Vec<Marker>,
    pub duration: f64,
    pub idle_time_limit: Option<f64>,
}

/// Parser output: terminal size plus a lazy, time-ordered event sequence.
pub struct Parsed<'a> {
    pub cols: u16,
    pub rows: u16,
    pub idle_time_limit: Option<f64>,
    pub events: Box<dyn Iterator<Item = Result<Event>> + 'a>,
}

impl fmt::Debug for Parsed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parsed")
            .field("cols", &self.cols)
            .field("rows", &self.rows)
            .field("idle_time_limit", &self.idle_time_limit)
            .finish_non_exhaustive()
    }
}

/// Supported recording encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Asciicast,
    Ttyrec,
    Typescript,
}

impl Format {
    /// Guess the encoding of a file from its name.
    pub fn detect(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("ttyrec") => Format::Ttyrec,
            _ => Format::Asciicast,
        }
    }
}

impl FromStr for Format {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "asciicast" => Ok(Format::Asciicast),
            "ttyrec" => Ok(Format::Ttyrec),
            "typescript" => Ok(Format::Typescript),
            other => Err(PlayerError::format(format!("unknown format: {other}"))),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Asciicast => "asciicast",
            Format::Ttyrec => "ttyrec",
            Format::Typescript => "typescript",
        };
        f.write_str(name)
    }
}

/// Where to read a recording from.
#[derive(Debug, Clone)]
pub struct SourceSpec {
    pub path: PathBuf,
    pub format: Option<Format>,
    /// Timing file for typescript recordings.
    pub timing: Option<PathBuf>,
    /// Separate input log for typescript recordings.
    pub input: Option<PathBuf>,
}

impl SourceSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: None,
            timing: None,
            input: None,
        }
    }

    pub fn format(&self) -> Format {
        match self.format {
            Some(format) => format,
            None if self.timing.is_some() => Format::Typescript,
            None => Format::detect(&self.path),
        }
    }
}

/// Raw recording bytes, as fetched.
#[derive(Debug, Clone)]
pub enum Source {
    Asciicast(String),
    Ttyrec(Vec<u8>),
    Typescript {
        timing: String,
        data: Vec<u8>,
        input: Option<Vec<u8>>,
    },
}

impl Source {
    /// Read the files a [`SourceSpec`] names.
    pub async fn load(spec: &SourceSpec) -> Result<Self> {
        let source = match spec.format() {
            Format::Asciicast => Source::Asciicast(read_text(&spec.path).await?),
            Format::Ttyrec => Source::Ttyrec(read_bytes(&spec.path).await?),
            Format::Typescript => {
                let timing_path = match &spec.timing {
                    Some(path) => path.clone(),
                    None => with_suffix(&spec.path, ".timing"),
                };
                let input = match &spec.input {
                    Some(path) => Some(read_bytes(path).await?),
                    None => None,
                };

                Source::Typescript {
                    timing: read_text(&timing_path).await?,
                    data: read_bytes(&spec.path).await?,
                    input,
                }
            }
        };

        tracing::debug!(path = %spec.path.display(), format = %spec.format(), "loaded recording");
        Ok(source)
    }

    pub fn parse(&self) -> Result<Parsed<'_>> {
        match self {
            Source::Asciicast(text) => asciicast::parse(text),
            Source::Ttyrec(bytes) => ttyrec::parse(bytes),
            Source::Typescript {
                timing,
                data,
                input,
            } => typescript::parse(timing, data, input.as_deref()),
        }
    }
}

async fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|source| PlayerError::Transport {
            path: path.to_path_buf(),
            source,
        })
}

async fn read_text(path: &Path) -> Result<String> {
    let bytes = read_bytes(path).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

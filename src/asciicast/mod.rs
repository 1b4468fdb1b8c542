//! asciicast parser (v1, v2 and v3)
//!
//! Reference: https://docs.asciinema.org/manual/asciicast/v2/ and
//! https://docs.asciinema.org/manual/asciicast/v3/
//!
//! v2 and v3 are newline-delimited JSON: a header object followed by
//! `[time, code, data]` event lines. v2 times are absolute, v3 times are
//! relative to the previous event. v1 is a single JSON document whose
//! `stdout` holds `[delay, text]` pairs.

mod header;

use serde_json::Value;

use crate::error::{PlayerError, Result};
use crate::recording::{Event, EventData, EventType, Parsed};

pub use header::{Header, TermInfo, V1Document};

/// Parse a whole recording. Event lines are decoded lazily.
pub fn parse(text: &str) -> Result<Parsed<'_>> {
    let first_line = text.lines().next().unwrap_or_default();

    match serde_json::from_str::<Header>(first_line) {
        Ok(header) if header.version != 1 => parse_jsonl(header, text),
        _ => parse_v1(text),
    }
}

/// Parse and validate a v2/v3 header line.
pub fn parse_header(line: &str) -> Result<Header> {
    let header: Header = serde_json::from_str(line)?;

    if !matches!(header.version, 2 | 3) {
        return Err(PlayerError::UnsupportedVersion(header.version));
    }

    Ok(header)
}

/// Decode one event line into its written time and payload.
///
/// Events the player does not act on (exit codes, unknown codes) decode to
/// `None` but still carry their time, which matters for v3's relative
/// timestamps.
pub fn parse_event(line: &str) -> Result<(f64, Option<EventData>)> {
    decode_event(line).map_err(PlayerError::Format)
}

/// Converts written event times to absolute ones.
#[derive(Debug, Clone)]
pub struct Timeline {
    relative: bool,
    time: f64,
}

impl Timeline {
    pub fn new(version: u64) -> Self {
        Self {
            relative: version >= 3,
            time: 0.0,
        }
    }

    pub fn advance(&mut self, written: f64) -> f64 {
        if self.relative {
            self.time += written;
        } else {
            self.time = written;
        }
        self.time
    }
}

fn parse_jsonl(header: Header, text: &str) -> Result<Parsed<'_>> {
    if !matches!(header.version, 2 | 3) {
        return Err(PlayerError::UnsupportedVersion(header.version));
    }

    let (cols, rows) = header
        .size()
        .ok_or_else(|| PlayerError::format("header is missing the terminal size"))?;

    let mut timeline = Timeline::new(header.version);

    let events = text
        .lines()
        .enumerate()
        .skip(1)
        .filter(|(_, line)| line.starts_with('['))
        .filter_map(move |(index, line)| match decode_event(line) {
            Ok((time, data)) => {
                let time = timeline.advance(time);
                data.map(|data| Ok(Event { time, data }))
            }
            Err(msg) => Some(Err(PlayerError::Format(format!("line {}: {msg}", index + 1)))),
        });

    Ok(Parsed {
        cols,
        rows,
        idle_time_limit: header.idle_time_limit,
        events: Box::new(events),
    })
}

fn parse_v1(text: &str) -> Result<Parsed<'static>> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| PlayerError::format(format!("not an asciicast recording: {e}")))?;

    match value.get("version").and_then(Value::as_u64) {
        Some(1) => {}
        Some(version) => return Err(PlayerError::UnsupportedVersion(version)),
        None => return Err(PlayerError::format("missing version")),
    }

    let doc: V1Document = serde_json::from_value(value)?;
    let mut time = 0.0;

    let events = doc.stdout.into_iter().map(move |(delay, text)| {
        time += delay;
        Ok(Event::output(time, text))
    });

    Ok(Parsed {
        cols: doc.width,
        rows: doc.height,
        idle_time_limit: None,
        events: Box::new(events),
    })
}

fn decode_event(line: &str) -> std::result::Result<(f64, Option<EventData>), String> {
    let (time, code, data): (f64, String, Value) =
        serde_json::from_str(line).map_err(|e| format!("invalid event: {e}"))?;

    let text = || {
        data.as_str()
            .map(str::to_string)
            .ok_or_else(|| format!("event data for '{code}' must be a string"))
    };

    let data = match EventType::from_code(&code) {
        Some(EventType::Output) => Some(EventData::Output(text()?)),
        Some(EventType::Input) => Some(EventData::Input(text()?)),
        Some(EventType::Marker) => Some(EventData::Marker(text()?)),
        Some(EventType::Resize) => {
            let (cols, rows) = parse_size(&text()?)?;
            Some(EventData::Resize { cols, rows })
        }
        Some(EventType::Exit) | None => None,
    };

    Ok((time, data))
}

/// Parse a `COLSxROWS` resize payload.
fn parse_size(s: &str) -> std::result::Result<(u16, u16), String> {
    let (cols, rows) = s
        .split_once('x')
        .ok_or_else(|| format!("invalid terminal size: {s}"))?;

    let cols = cols.trim().parse().map_err(|_| format!("invalid terminal size: {s}"))?;
    let rows = rows.trim().parse().map_err(|_| format!("invalid terminal size: {s}"))?;
    Ok((cols, rows))
}

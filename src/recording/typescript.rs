//! `script(1)` typescript parser.
//!
//! A typescript recording is a data file (first line is a `Script started`
//! header, optionally with `COLUMNS="c" LINES="r"`) plus a timing file.
//! Timing lines come in two shapes:
//!
//! - classic: `<delay> <byte count>`, all output
//! - advanced (`--logging-format advanced`): `<O|I|S|H> <delay> ...`
//!
//! Input bytes live in a separate file when one is given, otherwise they
//! are interleaved with output in the data file.

use crate::error::{PlayerError, Result};

use super::{Event, Parsed};

pub fn parse<'a>(timing: &'a str, data: &'a [u8], input: Option<&'a [u8]>) -> Result<Parsed<'a>> {
    let data_offset = data.iter().position(|&b| b == b'\n').map_or(0, |i| i + 1);
    let header = String::from_utf8_lossy(&data[..data_offset]);

    let (mut cols, mut rows) = header_size(&header).unzip();

    // H entries sit at the top of an advanced timing file
    for entry in entries(timing).filter(|e| e.first() == Some(&"H")) {
        match (entry.get(2), entry.get(3)) {
            (Some(&"COLUMNS"), Some(value)) => cols = value.parse().ok().or(cols),
            (Some(&"LINES"), Some(value)) => rows = value.parse().ok().or(rows),
            _ => {}
        }
    }

    let events = TimingEvents {
        lines: timing.lines().enumerate(),
        advanced: is_advanced(timing),
        time: 0.0,
        output: Cursor::new(data, data_offset),
        input: input.map(|bytes| Cursor::new(bytes, data_offset)),
        failed: false,
    };

    Ok(Parsed {
        cols: cols.unwrap_or(80),
        rows: rows.unwrap_or(24),
        idle_time_limit: None,
        events: Box::new(events),
    })
}

fn entries(timing: &str) -> impl Iterator<Item = Vec<&str>> {
    timing
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| line.split(' ').collect())
}

fn is_advanced(timing: &str) -> bool {
    entries(timing).next().is_some_and(|entry| entry.len() >= 3)
}

fn header_size(header: &str) -> Option<(u16, u16)> {
    let cols = quoted_value(header, "COLUMNS=\"")?;
    let rows = quoted_value(header, "LINES=\"")?;
    Some((cols, rows))
}

fn quoted_value(text: &str, key: &str) -> Option<u16> {
    let start = text.find(key)? + key.len();
    let len = text[start..].find('"')?;
    text[start..start + len].parse().ok()
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    fn read(&mut self, count: usize) -> Option<String> {
        let start = self.pos.min(self.bytes.len());
        let next = start.checked_add(count)?;
        let end = next.min(self.bytes.len());
        self.pos = next;
        Some(String::from_utf8_lossy(&self.bytes[start..end]).into_owned())
    }
}

struct TimingEvents<'a, L> {
    lines: L,
    advanced: bool,
    time: f64,
    output: Cursor<'a>,
    input: Option<Cursor<'a>>,
    failed: bool,
}

impl<'a, L> TimingEvents<'a, L>
where
    L: Iterator<Item = (usize, &'a str)>,
{
    fn decode(&mut self, line: &str) -> std::result::Result<Option<Event>, String> {
        let fields: Vec<&str> = line.split(' ').collect();
        let (kind, fields) = if self.advanced {
            (fields[0], &fields[1..])
        } else {
            ("O", &fields[..])
        };

        let delay: f64 = fields
            .first()
            .and_then(|d| d.parse().ok())
            .ok_or_else(|| format!("invalid delay in '{line}'"))?;
        self.time += delay;

        let count = || -> std::result::Result<usize, String> {
            fields
                .get(1)
                .and_then(|c| c.parse().ok())
                .ok_or_else(|| format!("invalid byte count in '{line}'"))
        };

        let overflow = || format!("byte count out of range in '{line}'");

        let event = match kind {
            "O" => {
                let text = self.output.read(count()?).ok_or_else(overflow)?;
                Some(Event::output(self.time, text))
            }
            "I" => {
                let cursor = self.input.as_mut().unwrap_or(&mut self.output);
                let text = cursor.read(count()?).ok_or_else(overflow)?;
                Some(Event::input(self.time, text))
            }
            "S" if fields.get(1) == Some(&"SIGWINCH") => {
                let rows = fields.get(2).and_then(|f| f.strip_prefix("ROWS="));
                let cols = fields.get(3).and_then(|f| f.strip_prefix("COLS="));

                match (cols.and_then(|c| c.parse().ok()), rows.and_then(|r| r.parse().ok())) {
                    (Some(cols), Some(rows)) => Some(Event::resize(self.time, cols, rows)),
                    _ => return Err(format!("invalid SIGWINCH entry '{line}'")),
                }
            }
            _ => None,
        };

        Ok(event)
    }
}

impl<'a, L> Iterator for TimingEvents<'a, L>
where
    L: Iterator<Item = (usize, &'a str)>,
{
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            let (index, line) = self.lines.next()?;
            if line.is_empty() {
                continue;
            }

            match self.decode(line) {
                Ok(Some(event)) => return Some(Ok(event)),
                Ok(None) => continue,
                Err(msg) => {
                    self.failed = true;
                    return Some(Err(PlayerError::Format(format!("timing line {}: {msg}", index + 1))));
                }
            }
        }
    }
}

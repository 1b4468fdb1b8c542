//! ttyrec parser.
//!
//! A ttyrec file is a sequence of frames, each a 12-byte header
//! (`sec: u32 LE`, `usec: u32 LE`, `len: u32 LE`) followed by `len` bytes
//! of output. Times are made relative to the first frame.

use crate::error::{PlayerError, Result};

use super::{Event, Parsed};

const HEADER_LEN: usize = 12;

/// A frame header with its raw payload.
struct Frame<'a> {
    time: f64,
    data: &'a [u8],
}

pub fn parse(bytes: &[u8]) -> Result<Parsed<'_>> {
    let (cols, rows) = match read_frame(bytes)? {
        Some((first, _)) => size_report(&String::from_utf8_lossy(first.data)).unwrap_or((80, 24)),
        None => (80, 24),
    };

    Ok(Parsed {
        cols,
        rows,
        idle_time_limit: None,
        events: Box::new(Frames {
            bytes,
            base_time: None,
            failed: false,
        }),
    })
}

struct Frames<'a> {
    bytes: &'a [u8],
    base_time: Option<f64>,
    failed: bool,
}

impl Iterator for Frames<'_> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        match read_frame(self.bytes) {
            Ok(Some((frame, rest))) => {
                self.bytes = rest;
                let base = *self.base_time.get_or_insert(frame.time);
                let text = String::from_utf8_lossy(frame.data).into_owned();
                Some(Ok(Event::output(frame.time - base, text)))
            }
            Ok(None) => None,
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

fn read_frame(bytes: &[u8]) -> Result<Option<(Frame<'_>, &[u8])>> {
    if bytes.len() < HEADER_LEN {
        return Ok(None);
    }

    let sec = u32_le(&bytes[0..4]);
    let usec = u32_le(&bytes[4..8]);
    let len = u32_le(&bytes[8..12]) as usize;
    let body = &bytes[HEADER_LEN..];

    if body.len() < len {
        return Err(PlayerError::format(format!(
            "truncated ttyrec frame: expected {len} bytes, found {}",
            body.len()
        )));
    }

    let (data, rest) = body.split_at(len);
    let frame = Frame {
        time: sec as f64 + usec as f64 / 1_000_000.0,
        data,
    };

    Ok(Some((frame, rest)))
}

fn u32_le(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

/// Find an `ESC [ 8 ; rows ; cols t` window size report.
pub(crate) fn size_report(text: &str) -> Option<(u16, u16)> {
    text.match_indices("\x1b[8;").find_map(|(at, prefix)| {
        let rest = &text[at + prefix.len()..];
        let end = rest.find('t')?;
        let (rows, cols) = rest[..end].split_once(';')?;
        Some((cols.parse().ok()?, rows.parse().ok()?))
    })
}

//! Buffered playback of streamed asciicast.
//!
//! Two tasks per stream: a reader that decodes header and event lines as
//! they arrive, and a player that paces them onto the terminal through a
//! [`LiveBuffer`]. They are joined by an unbounded queue so a slow terminal
//! never stalls the transport.

use std::fmt;
use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::asciicast::{parse_event, parse_header, Timeline};
use crate::error::PlayerError;
use crate::recording::{Event, EventData, Marker, DEFAULT_MIN_FRAME_TIME};
use crate::session::PlayerState;

use super::{Callbacks, Driver};

/// Where a live stream is read from.
pub enum LiveSource {
    Stdin,
    /// A file that may still be growing.
    File(PathBuf),
    /// `host:port` of a TCP server writing asciicast lines.
    Tcp(String),
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl fmt::Debug for LiveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiveSource::Stdin => write!(f, "Stdin"),
            LiveSource::File(path) => f.debug_tuple("File").field(path).finish(),
            LiveSource::Tcp(addr) => f.debug_tuple("Tcp").field(addr).finish(),
            LiveSource::Reader(_) => write!(f, "Reader(..)"),
        }
    }
}

impl fmt::Display for LiveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiveSource::Stdin => write!(f, "stdin"),
            LiveSource::File(path) => write!(f, "{}", path.display()),
            LiveSource::Tcp(addr) => write!(f, "tcp://{addr}"),
            LiveSource::Reader(_) => write!(f, "reader"),
        }
    }
}

/// Pacing parameters, in seconds.
#[derive(Debug, Clone)]
pub struct LiveOptions {
    /// Fixed presentation delay absorbing arrival jitter.
    pub buffer_time: f64,
    /// Longest pause shown on screen; longer gaps are fast-forwarded.
    pub idle_limit: Option<f64>,
    pub min_frame_time: f64,
}

impl Default for LiveOptions {
    fn default() -> Self {
        Self {
            buffer_time: 0.0,
            idle_limit: None,
            min_frame_time: DEFAULT_MIN_FRAME_TIME,
        }
    }
}

pub struct LiveDriver {
    source: Option<LiveSource>,
    options: LiveOptions,
    cb: Callbacks,
    tasks: Vec<JoinHandle<()>>,
}

impl LiveDriver {
    pub fn new(source: LiveSource, cb: Callbacks, options: LiveOptions) -> Self {
        Self {
            source: Some(source),
            options,
            cb,
            tasks: Vec::new(),
        }
    }

    fn abort(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

#[async_trait]
impl Driver for LiveDriver {
    fn play(&mut self) -> bool {
        if !self.tasks.is_empty() {
            return true;
        }

        // a stream can be consumed once
        let Some(source) = self.source.take() else {
            return false;
        };

        info!(%source, "starting live stream");
        let (tx, rx) = mpsc::unbounded_channel();
        self.tasks.push(tokio::spawn(read_stream(source, tx, self.cb.clone())));
        self.tasks.push(tokio::spawn(play_stream(rx, self.cb.clone(), self.options.clone())));
        true
    }

    fn stop(&mut self) {
        debug!("stopping live stream");
        self.abort();
    }
}

impl Drop for LiveDriver {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Reader to player messages.
#[derive(Debug)]
enum Incoming {
    Header { cols: u16, rows: u16 },
    Event(Event),
    Offline(PlayerError),
    Errored(String),
    Ended,
}

async fn open(source: LiveSource) -> io::Result<Box<dyn AsyncBufRead + Send + Unpin>> {
    Ok(match source {
        LiveSource::Stdin => Box::new(BufReader::new(tokio::io::stdin())),
        LiveSource::File(path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
        LiveSource::Tcp(addr) => Box::new(BufReader::new(tokio::net::TcpStream::connect(addr).await?)),
        LiveSource::Reader(reader) => Box::new(BufReader::new(reader)),
    })
}

async fn read_stream(source: LiveSource, tx: mpsc::UnboundedSender<Incoming>, cb: Callbacks) {
    cb.set_state(PlayerState::Loading);

    let reader = match open(source).await {
        Ok(reader) => reader,
        Err(e) => {
            let _ = tx.send(Incoming::Errored(format!("failed to open stream: {e}")));
            return;
        }
    };

    let final_message = decode_lines(reader, &tx).await;
    let _ = tx.send(final_message);
}

/// Decode lines until the stream ends, returning the closing message.
async fn decode_lines<R>(reader: R, tx: &mpsc::UnboundedSender<Incoming>) -> Incoming
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut timeline: Option<Timeline> = None;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return Incoming::Ended,
            Err(e) => return Incoming::Offline(e.into()),
        };

        let line = line.trim();

        if line.starts_with('{') {
            // a new header restarts the stream
            let header = match parse_header(line) {
                Ok(header) => header,
                Err(e) => return Incoming::Errored(e.to_string()),
            };
            let Some((cols, rows)) = header.size() else {
                return Incoming::Errored("header is missing the terminal size".into());
            };

            debug!(cols, rows, version = header.version, "live header");
            timeline = Some(Timeline::new(header.version));
            if tx.send(Incoming::Header { cols, rows }).is_err() {
                return Incoming::Ended;
            }
        } else if line.starts_with('[') {
            let Some(timeline) = timeline.as_mut() else {
                warn!("event before header, skipped");
                continue;
            };

            match parse_event(line) {
                Ok((time, data)) => {
                    let time = timeline.advance(time);
                    if let Some(data) = data {
                        if tx.send(Incoming::Event(Event { time, data })).is_err() {
                            return Incoming::Ended;
                        }
                    }
                }
                Err(e) => warn!("skipping malformed event: {e}"),
            }
        }
    }
}

async fn play_stream(mut rx: mpsc::UnboundedReceiver<Incoming>, cb: Callbacks, options: LiveOptions) {
    let mut buffer = LiveBuffer::new(&options);
    let mut marker_index = 0;

    while let Some(incoming) = rx.recv().await {
        match incoming {
            Incoming::Header { cols, rows } => {
                buffer = LiveBuffer::new(&options);
                marker_index = 0;
                cb.reset(cols, rows, None);
                cb.set_state(PlayerState::Playing);
            }
            Incoming::Event(event) => {
                if let Timing::After(ms) = buffer.schedule(event.time, cb.now()) {
                    cb.sleep(ms).await;
                }

                match event.data {
                    EventData::Output(text) => cb.feed(text),
                    EventData::Input(text) => cb.on_input(text),
                    EventData::Resize { cols, rows } => cb.resize(cols, rows),
                    EventData::Marker(label) => {
                        cb.on_marker(marker_index, &Marker::new(event.time, label));
                        marker_index += 1;
                    }
                }
            }
            Incoming::Offline(err) => {
                warn!("{err}");
                cb.set_state_with_message(PlayerState::Offline, err.to_string());
                return;
            }
            Incoming::Errored(message) => {
                warn!("{message}");
                cb.set_state_with_message(PlayerState::Errored, message);
                return;
            }
            Incoming::Ended => {
                info!("live stream ended");
                cb.ended();
                return;
            }
        }
    }
}

/// When to deliver a buffered event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Timing {
    Immediate,
    /// After this many virtual milliseconds.
    After(f64),
}

/// Maps stream time onto wall time with a fixed delay and a capped idle
/// pause. All internal times are milliseconds.
#[derive(Debug, Clone)]
pub struct LiveBuffer {
    buffer_time: f64,
    idle_limit: f64,
    min_frame_time: f64,
    base_stream_time: Option<f64>,
    start_wall_time: f64,
    prev_stream_time: Option<f64>,
    fast_forward: f64,
}

impl LiveBuffer {
    pub fn new(options: &LiveOptions) -> Self {
        Self {
            buffer_time: options.buffer_time * 1000.0,
            idle_limit: options.idle_limit.map_or(f64::INFINITY, |l| l * 1000.0),
            min_frame_time: options.min_frame_time * 1000.0,
            base_stream_time: None,
            start_wall_time: 0.0,
            prev_stream_time: None,
            fast_forward: 0.0,
        }
    }

    /// Decide when an event stamped `time` (seconds) goes out, given the
    /// current clock reading `now` (ms). The first event anchors the clock.
    pub fn schedule(&mut self, time: f64, now: f64) -> Timing {
        let base = match self.base_stream_time {
            Some(base) => base,
            None => {
                self.start_wall_time = now;
                *self.base_stream_time.insert(time)
            }
        };

        let elapsed_stream = (time - base) * 1000.0 + self.buffer_time;

        if let Some(prev) = self.prev_stream_time {
            if elapsed_stream - prev < self.min_frame_time {
                return Timing::Immediate;
            }
        }
        self.prev_stream_time = Some(elapsed_stream);

        let wall_elapsed = now - self.start_wall_time;
        let mut delay = elapsed_stream - (wall_elapsed + self.fast_forward);

        if delay > self.idle_limit {
            self.fast_forward += delay - self.idle_limit;
            delay = self.idle_limit;
        }

        if delay > 0.0 {
            Timing::After(delay)
        } else {
            Timing::Immediate
        }
    }

    /// Accumulated skipped idle time, in ms.
    pub fn fast_forward(&self) -> f64 {
        self.fast_forward
    }
}

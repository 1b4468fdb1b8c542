//! Scheduler for prepared recordings.
//!
//! Three timelines (output, input, markers) are walked against one shared
//! start time. Each timeline has at most one pending deadline; when it
//! passes, the due event is delivered together with every following event
//! that is already late ("catch-up"), then the next deadline is armed.
//!
//! Driver-local states:
//!
//! - **idle**: initialized, never started (`pause_elapsed == Some(0)`)
//! - **running**: an output deadline is pending
//! - **paused**: no deadlines, `pause_elapsed` holds the frozen position

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{PlayerError, Result};
use crate::recording::{prepare, EventData, Marker, PrepareOptions, Recording, Source, SourceSpec};
use crate::session::{PlayerState, StopReason};

use super::{Callbacks, Driver, Metadata, SeekTarget};

/// Upper bound on events delivered by one timer firing. Past it the timer
/// re-arms immediately so the session gets a turn in between.
pub const MAX_CATCH_UP_EVENTS: usize = 1024;

/// Terminal reset (RIS).
const RESET: &str = "\x1bc";

/// Tolerance when deciding whether a deadline has passed, in ms. Absorbs
/// float error from converting deadlines to instants and back.
const TIMER_SLACK: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Loop {
    #[default]
    Off,
    Forever,
    /// Play this many passes in total.
    Times(u32),
}

impl Loop {
    fn repeats_after(&self, passes: u32) -> bool {
        match self {
            Loop::Off => false,
            Loop::Forever => true,
            Loop::Times(n) => passes < *n,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordingOptions {
    pub min_frame_time: f64,
    pub idle_time_limit: Option<f64>,
    pub start_at: Option<f64>,
    pub looping: Loop,
    pub pause_on_markers: bool,
    /// Replace the recording's markers.
    pub markers: Option<Vec<Marker>>,
}

impl Default for RecordingOptions {
    fn default() -> Self {
        Self {
            min_frame_time: crate::recording::DEFAULT_MIN_FRAME_TIME,
            idle_time_limit: None,
            start_at: None,
            looping: Loop::Off,
            pause_on_markers: false,
            markers: None,
        }
    }
}

impl RecordingOptions {
    fn prepare_options(&self) -> PrepareOptions {
        PrepareOptions {
            min_frame_time: self.min_frame_time,
            idle_time_limit: self.idle_time_limit,
            start_at: self.start_at,
            markers: self.markers.clone(),
        }
    }
}

/// Where the recording comes from.
#[derive(Debug, Clone)]
pub enum RecordingSource {
    File(SourceSpec),
    Data(Source),
}

pub struct RecordingDriver {
    source: RecordingSource,
    options: RecordingOptions,
    cb: Callbacks,
    playback: Option<Playback>,
}

impl RecordingDriver {
    pub fn new(source: RecordingSource, cb: Callbacks, options: RecordingOptions) -> Self {
        Self {
            source,
            options,
            cb,
            playback: None,
        }
    }

    /// The prepared recording, once initialized.
    pub fn recording(&self) -> Option<&Recording> {
        self.playback.as_ref().map(|p| &p.recording)
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    async fn init(&mut self) -> Result<Metadata> {
        if self.playback.is_none() {
            let source = match &self.source {
                RecordingSource::File(spec) => Source::load(spec).await?,
                RecordingSource::Data(source) => source.clone(),
            };

            let prepared = prepare(source.parse()?, &self.options.prepare_options())?;
            info!(
                cols = prepared.recording.cols,
                rows = prepared.recording.rows,
                duration = prepared.recording.duration,
                "recording loaded"
            );

            self.playback = Some(Playback::new(
                prepared.recording,
                prepared.effective_start_at,
                self.cb.clone(),
                &self.options,
            ));
        }

        let recording = &self.playback.as_ref().ok_or(PlayerError::EmptyRecording)?.recording;

        Ok(Metadata {
            cols: Some(recording.cols),
            rows: Some(recording.rows),
            duration: Some(recording.duration),
            markers: recording.markers.clone(),
        })
    }

    fn play(&mut self) -> bool {
        self.playback.as_mut().is_some_and(Playback::play)
    }

    fn pause(&mut self) -> bool {
        self.playback.as_mut().is_some_and(Playback::pause)
    }

    fn seek(&mut self, target: SeekTarget) -> Result<bool> {
        match self.playback.as_mut() {
            Some(playback) => playback.seek(target),
            None => Ok(false),
        }
    }

    fn step(&mut self) {
        if let Some(playback) = self.playback.as_mut() {
            playback.step();
        }
    }

    fn stop(&mut self) {
        if let Some(playback) = self.playback.as_mut() {
            playback.pause();
        }
    }

    fn current_time(&self) -> Option<f64> {
        Some(self.playback.as_ref().map_or(0.0, Playback::current_time))
    }

    fn poster(&self, time: f64) -> Option<String> {
        self.playback.as_ref().map(|p| p.poster(time))
    }

    fn next_deadline(&self) -> Option<f64> {
        self.playback.as_ref().and_then(Playback::next_deadline)
    }

    fn on_deadline(&mut self) {
        if let Some(playback) = self.playback.as_mut() {
            playback.on_deadline();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Timer {
    Output,
    Input,
    Marker,
}

/// Cursor state over a loaded recording. Times are virtual milliseconds.
struct Playback {
    recording: Recording,
    cb: Callbacks,
    looping: Loop,
    pause_on_markers: bool,
    /// Honored by the first `play`.
    start_at: Option<f64>,
    next_output: usize,
    next_input: usize,
    next_marker: usize,
    last_output_time: f64,
    start_time: f64,
    pause_elapsed: Option<f64>,
    play_count: u32,
    resized: bool,
    output_deadline: Option<f64>,
    input_deadline: Option<f64>,
    marker_deadline: Option<f64>,
}

impl Playback {
    fn new(recording: Recording, start_at: Option<f64>, cb: Callbacks, options: &RecordingOptions) -> Self {
        Self {
            recording,
            cb,
            looping: options.looping,
            pause_on_markers: options.pause_on_markers,
            start_at,
            next_output: 0,
            next_input: 0,
            next_marker: 0,
            last_output_time: 0.0,
            start_time: 0.0,
            pause_elapsed: Some(0.0),
            play_count: 0,
            resized: false,
            output_deadline: None,
            input_deadline: None,
            marker_deadline: None,
        }
    }

    fn is_running(&self) -> bool {
        self.output_deadline.is_some()
    }

    fn duration_ms(&self) -> f64 {
        self.recording.duration * 1000.0
    }

    fn play(&mut self) -> bool {
        if self.is_running() {
            return true;
        }

        if self.next_output >= self.recording.output.len() {
            debug!("play at end of recording, rewinding");
            self.play_count = 0;
            self.seek_to(0.0);
        }

        if let Some(start_at) = self.start_at.take() {
            self.seek_to(start_at * 1000.0);
        }

        self.resume();
        true
    }

    fn pause(&mut self) -> bool {
        if !self.is_running() {
            return true;
        }

        self.cancel_timers();
        self.pause_elapsed = Some(self.cb.now() - self.start_time);
        true
    }

    fn resume(&mut self) {
        let elapsed = self.pause_elapsed.take().unwrap_or(0.0);
        self.start_time = self.cb.now() - elapsed;
        self.schedule_input();
        self.schedule_marker();
        self.schedule_output();
    }

    fn seek(&mut self, target: SeekTarget) -> Result<bool> {
        let time = target.resolve(self.current_time(), self.recording.duration, &self.recording.markers)?;
        let was_running = self.is_running();

        if was_running {
            self.pause();
        }

        self.seek_to(time * 1000.0);
        debug!(%target, time, "seeked");

        if was_running {
            self.resume();
        }

        Ok(true)
    }

    /// Move to `target` ms while paused. Output up to and including the
    /// target is replayed; input and markers up to it are skipped, and
    /// later ones become pending again.
    fn seek_to(&mut self, target: f64) {
        if target < self.last_output_time {
            self.reset_terminal();
            self.rewind();
        }

        while let Some(event) = self.recording.output.get(self.next_output) {
            let time = event.time * 1000.0;
            if time > target {
                break;
            }
            deliver(&self.cb, &event.data, &mut self.resized);
            self.last_output_time = time;
            self.next_output += 1;
        }

        self.move_cursors_to(target);
        self.pause_elapsed = Some(target);
        self.start_at = None;
    }

    fn step(&mut self) {
        if self.is_running() {
            return;
        }

        let Some(event) = self.recording.output.get(self.next_output) else {
            self.pause_elapsed = Some(self.duration_ms());
            self.cb.ended();
            return;
        };

        let time = event.time * 1000.0;
        deliver(&self.cb, &event.data, &mut self.resized);
        self.next_output += 1;
        self.last_output_time = time;
        self.pause_elapsed = Some(time);
        self.move_cursors_to(time);
        self.start_at = None;
    }

    fn current_time(&self) -> f64 {
        let elapsed = match self.pause_elapsed {
            Some(elapsed) if !self.is_running() => elapsed,
            _ => self.cb.now() - self.start_time,
        };
        elapsed / 1000.0
    }

    fn poster(&self, time: f64) -> String {
        self.recording
            .output
            .iter()
            .take_while(|e| e.time < time)
            .filter_map(|e| match &e.data {
                EventData::Output(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn next_deadline(&self) -> Option<f64> {
        [self.output_deadline, self.input_deadline, self.marker_deadline]
            .into_iter()
            .flatten()
            .min_by(f64::total_cmp)
    }

    /// Fire every timer due now, earliest first, output before input
    /// before markers on ties. Each timer fires at most once per call.
    fn on_deadline(&mut self) {
        let now = self.cb.now() + TIMER_SLACK;
        let mut due: Vec<(f64, Timer)> = [
            (self.output_deadline, Timer::Output),
            (self.input_deadline, Timer::Input),
            (self.marker_deadline, Timer::Marker),
        ]
        .into_iter()
        .filter_map(|(deadline, timer)| deadline.filter(|&d| d <= now).map(|d| (d, timer)))
        .collect();

        due.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        for (_, timer) in due {
            // an earlier timer may have paused or ended playback
            let armed = match timer {
                Timer::Output => self.output_deadline,
                Timer::Input => self.input_deadline,
                Timer::Marker => self.marker_deadline,
            };
            if !armed.is_some_and(|d| d <= now) {
                continue;
            }

            match timer {
                Timer::Output => self.run_output(),
                Timer::Input => self.run_input(),
                Timer::Marker => self.run_marker(),
            }
        }
    }

    fn schedule_output(&mut self) {
        match self.recording.output.get(self.next_output) {
            Some(event) => self.output_deadline = Some(self.start_time + event.time * 1000.0),
            None => self.on_end(),
        }
    }

    fn schedule_input(&mut self) {
        self.input_deadline = self
            .recording
            .input
            .get(self.next_input)
            .map(|e| self.start_time + e.time * 1000.0);
    }

    fn schedule_marker(&mut self) {
        self.marker_deadline = self
            .recording
            .markers
            .get(self.next_marker)
            .map(|m| self.start_time + m.time * 1000.0);
    }

    fn run_output(&mut self) {
        self.output_deadline = None;
        let mut delivered = 0;

        while let Some(event) = self.recording.output.get(self.next_output) {
            deliver(&self.cb, &event.data, &mut self.resized);
            self.last_output_time = event.time * 1000.0;
            self.next_output += 1;
            delivered += 1;

            let elapsed = self.cb.now() - self.start_time;
            match self.recording.output.get(self.next_output) {
                Some(next) if elapsed > next.time * 1000.0 => {
                    if delivered >= MAX_CATCH_UP_EVENTS {
                        debug!(delivered, "catch-up limit reached, yielding");
                        self.output_deadline = Some(self.cb.now());
                        return;
                    }
                }
                _ => break,
            }
        }

        self.schedule_output();
    }

    fn run_input(&mut self) {
        self.input_deadline = None;
        let mut delivered = 0;

        while let Some(event) = self.recording.input.get(self.next_input) {
            if let EventData::Input(data) = &event.data {
                self.cb.on_input(data.clone());
            }
            self.next_input += 1;
            delivered += 1;

            let elapsed = self.cb.now() - self.start_time;
            match self.recording.input.get(self.next_input) {
                Some(next) if elapsed > next.time * 1000.0 => {
                    if delivered >= MAX_CATCH_UP_EVENTS {
                        self.input_deadline = Some(self.cb.now());
                        return;
                    }
                }
                _ => break,
            }
        }

        self.schedule_input();
    }

    fn run_marker(&mut self) {
        self.marker_deadline = None;

        while let Some(marker) = self.recording.markers.get(self.next_marker) {
            let index = self.next_marker;
            let time = marker.time * 1000.0;
            self.cb.on_marker(index, marker);
            self.next_marker += 1;

            if self.pause_on_markers {
                self.pause();
                self.pause_elapsed = Some(time);
                debug!(index, "paused on marker");
                self.cb.set_state(PlayerState::Stopped(Some(StopReason::Paused)));
                return;
            }

            let elapsed = self.cb.now() - self.start_time;
            match self.recording.markers.get(self.next_marker) {
                Some(next) if elapsed > next.time * 1000.0 => {}
                _ => break,
            }
        }

        self.schedule_marker();
    }

    fn on_end(&mut self) {
        self.deliver_tail();
        self.play_count += 1;

        if self.looping.repeats_after(self.play_count) {
            debug!(pass = self.play_count, "looping");
            self.reset_terminal();
            self.rewind();
            self.start_time = self.cb.now();
            self.schedule_input();
            self.schedule_marker();
            self.schedule_output();
        } else {
            self.cancel_timers();
            self.pause_elapsed = Some(self.duration_ms());
            debug!(passes = self.play_count, "ended");
            self.cb.ended();
        }
    }

    fn rewind(&mut self) {
        self.next_output = 0;
        self.next_input = 0;
        self.next_marker = 0;
        self.last_output_time = 0.0;
    }

    fn reset_terminal(&mut self) {
        self.cb.feed(RESET);

        if self.resized {
            self.cb.resize(self.recording.cols, self.recording.rows);
            self.resized = false;
        }
    }

    /// Point the input and marker cursors at the first event after `target`.
    fn move_cursors_to(&mut self, target: f64) {
        self.next_input = self.recording.input.partition_point(|e| e.time * 1000.0 <= target);
        self.next_marker = self.recording.markers.partition_point(|m| m.time * 1000.0 <= target);
    }

    /// Input and markers not after the last output, still pending when
    /// output runs out. Markers here never pause: playback is ending anyway.
    fn deliver_tail(&mut self) {
        let end = self.duration_ms() + TIMER_SLACK;

        while let Some(event) = self.recording.input.get(self.next_input) {
            if event.time * 1000.0 > end {
                break;
            }
            if let EventData::Input(data) = &event.data {
                self.cb.on_input(data.clone());
            }
            self.next_input += 1;
        }

        while let Some(marker) = self.recording.markers.get(self.next_marker) {
            if marker.time * 1000.0 > end {
                break;
            }
            self.cb.on_marker(self.next_marker, marker);
            self.next_marker += 1;
        }
    }

    fn cancel_timers(&mut self) {
        self.output_deadline = None;
        self.input_deadline = None;
        self.marker_deadline = None;
    }
}

/// Deliver one output-timeline event.
fn deliver(cb: &Callbacks, data: &EventData, resized: &mut bool) {
    match data {
        EventData::Output(text) => cb.feed(text.clone()),
        EventData::Resize { cols, rows } => {
            cb.resize(*cols, *rows);
            *resized = true;
        }
        _ => {}
    }
}

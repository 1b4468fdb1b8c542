//! Turning a parsed event sequence into schedulable timelines.
//!
//! The pipeline is, in order:
//!
//! 1. caller markers replace embedded ones (time-ordered merge),
//! 2. [`Batcher`] coalesces output arriving faster than one frame,
//! 3. [`IdleLimiter`] compresses gaps longer than the idle time limit.
//!
//! Nothing is collected until the final split into per-kind arrays.

use crate::error::{PlayerError, Result};
use crate::stream::{try_process, Stream, Transducer};

use super::{Event, EventData, Marker, Parsed, Recording, DEFAULT_MIN_FRAME_TIME};

#[derive(Debug, Clone)]
pub struct PrepareOptions {
    pub min_frame_time: f64,
    /// Overrides the recording's own limit when set.
    pub idle_time_limit: Option<f64>,
    pub start_at: Option<f64>,
    /// Replaces markers embedded in the recording when set.
    pub markers: Option<Vec<Marker>>,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            min_frame_time: DEFAULT_MIN_FRAME_TIME,
            idle_time_limit: None,
            start_at: None,
            markers: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Prepared {
    pub recording: Recording,
    /// `start_at` moved onto the compressed timeline.
    pub effective_start_at: Option<f64>,
}

/// Run the preparation pipeline and realize the timelines.
pub fn prepare(parsed: Parsed<'_>, options: &PrepareOptions) -> Result<Prepared> {
    let idle_time_limit = options.idle_time_limit.or(parsed.idle_time_limit);
    let replace_markers = options.markers.is_some();

    let mut caller_markers: Vec<Event> = options
        .markers
        .iter()
        .flatten()
        .map(|m| Event::marker(m.time, m.label.clone()))
        .collect();
    caller_markers.sort_by(|a, b| a.time.total_cmp(&b.time));

    let (output, input, markers, effective_start_at) = try_process(parsed.events, |events| {
        let mut stream = Stream::new(events)
            .filter(|e: &Event| !(replace_markers && e.is_marker()))
            .multiplex(caller_markers, |l, r| l.time <= r.time)
            .transform(Batcher::new(options.min_frame_time))
            .transform(IdleLimiter::new(idle_time_limit, options.start_at));

        let mut output = Vec::new();
        let mut input = Vec::new();
        let mut markers = Vec::new();

        for event in stream.by_ref() {
            match event.data {
                EventData::Output(_) | EventData::Resize { .. } => output.push(event),
                EventData::Input(_) => input.push(event),
                EventData::Marker(label) => markers.push(Marker::new(event.time, label)),
            }
        }

        let effective_start_at = stream.into_transducer().second.effective_start_at();
        (output, input, markers, effective_start_at)
    })?;

    if !output.iter().any(Event::is_output) {
        return Err(PlayerError::EmptyRecording);
    }

    let duration = output.last().map_or(0.0, |e| e.time);

    tracing::debug!(
        output = output.len(),
        input = input.len(),
        markers = markers.len(),
        duration,
        "prepared recording"
    );

    Ok(Prepared {
        recording: Recording {
            cols: parsed.cols,
            rows: parsed.rows,
            output,
            input,
            markers,
            duration,
            idle_time_limit,
        },
        effective_start_at,
    })
}

/// Coalesces output events closer than `min_frame_time` to the pending one.
///
/// The merged event keeps the time of the first event of the batch. Any
/// other kind of event closes the batch, so relative order is preserved.
#[derive(Debug)]
pub struct Batcher {
    min_frame_time: f64,
    pending: Option<Event>,
    seen: usize,
    emitted: usize,
}

impl Batcher {
    pub fn new(min_frame_time: f64) -> Self {
        Self {
            min_frame_time,
            pending: None,
            seen: 0,
            emitted: 0,
        }
    }
}

impl Transducer<Event> for Batcher {
    type Out = Event;

    fn step(&mut self, event: Event, emit: &mut dyn FnMut(Event)) {
        self.seen += 1;

        let Some(prev) = self.pending.as_mut() else {
            self.pending = Some(event);
            return;
        };

        if let (EventData::Output(text), EventData::Output(more)) = (&mut prev.data, &event.data) {
            if event.time - prev.time < self.min_frame_time {
                text.push_str(more);
                return;
            }
        }

        if let Some(prev) = self.pending.replace(event) {
            self.emitted += 1;
            emit(prev);
        }
    }

    fn flush(&mut self, emit: &mut dyn FnMut(Event)) {
        if let Some(prev) = self.pending.take() {
            self.emitted += 1;
            emit(prev);
        }

        tracing::debug!("batched {} frames to {} frames", self.seen, self.emitted);
    }
}

/// Caps every gap between consecutive events at `limit` seconds, shifting
/// all later events back by the accumulated excess.
#[derive(Debug)]
pub struct IdleLimiter {
    limit: f64,
    prev_time: f64,
    shift: f64,
    start_at: Option<f64>,
    effective_start_at: Option<f64>,
}

impl IdleLimiter {
    pub fn new(limit: Option<f64>, start_at: Option<f64>) -> Self {
        Self {
            limit: limit.unwrap_or(f64::INFINITY),
            prev_time: 0.0,
            shift: 0.0,
            start_at,
            effective_start_at: start_at,
        }
    }

    /// The start offset translated onto the compressed timeline.
    pub fn effective_start_at(&self) -> Option<f64> {
        self.effective_start_at
    }
}

impl Transducer<Event> for IdleLimiter {
    type Out = Event;

    fn step(&mut self, mut event: Event, emit: &mut dyn FnMut(Event)) {
        let excess = (event.time - self.prev_time) - self.limit;

        if excess > 0.0 {
            self.shift += excess;

            if let (Some(start_at), Some(effective)) = (self.start_at, self.effective_start_at.as_mut()) {
                if event.time <= start_at {
                    *effective -= excess;
                } else if self.prev_time < start_at {
                    // start_at falls inside this gap
                    *effective -= ((start_at - self.prev_time) - self.limit).max(0.0);
                }
            }
        }

        self.prev_time = event.time;
        event.time -= self.shift;
        emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(events: Vec<Event>) -> Parsed<'static> {
        Parsed {
            cols: 80,
            rows: 24,
            idle_time_limit: None,
            events: Box::new(events.into_iter().map(Ok)),
        }
    }

    fn run<X: Transducer<Event, Out = Event>>(mut xf: X, events: Vec<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        for event in events {
            xf.step(event, &mut |e| out.push(e));
        }
        xf.flush(&mut |e| out.push(e));
        out
    }

    #[test]
    fn batcher_merges_events_within_one_frame() {
        let out = run(
            Batcher::new(1.0 / 60.0),
            vec![Event::output(0.0, "a"), Event::output(0.01, "b"), Event::output(2.0, "c")],
        );

        assert_eq!(out, vec![Event::output(0.0, "ab"), Event::output(2.0, "c")]);
    }

    #[test]
    fn batcher_measures_from_first_event_of_batch() {
        let out = run(
            Batcher::new(0.1),
            vec![Event::output(0.0, "a"), Event::output(0.06, "b"), Event::output(0.12, "c")],
        );

        assert_eq!(out, vec![Event::output(0.0, "ab"), Event::output(0.12, "c")]);
    }

    #[test]
    fn batcher_never_merges_across_other_kinds() {
        let out = run(
            Batcher::new(1.0),
            vec![
                Event::output(0.0, "a"),
                Event::marker(0.1, "m"),
                Event::output(0.2, "b"),
                Event::input(0.3, "k"),
                Event::output(0.4, "c"),
                Event::output(0.5, "d"),
            ],
        );

        assert_eq!(
            out,
            vec![
                Event::output(0.0, "a"),
                Event::marker(0.1, "m"),
                Event::output(0.2, "b"),
                Event::input(0.3, "k"),
                Event::output(0.4, "cd"),
            ]
        );
    }

    #[test]
    fn batcher_is_lossless() {
        let events: Vec<_> = (0..50).map(|i| Event::output(i as f64 * 0.007, format!("{i},"))).collect();
        let expected: String = events
            .iter()
            .map(|e| match &e.data {
                EventData::Output(text) => text.as_str(),
                _ => "",
            })
            .collect();

        let out = run(Batcher::new(1.0 / 60.0), events);
        let joined: String = out
            .iter()
            .map(|e| match &e.data {
                EventData::Output(text) => text.as_str(),
                _ => "",
            })
            .collect();

        assert_eq!(joined, expected);
        assert!(out.windows(2).all(|w| w[0].time <= w[1].time));
    }

    #[test]
    fn idle_limiter_caps_long_gaps() {
        let out = run(
            IdleLimiter::new(Some(1.0), None),
            vec![Event::output(0.0, "x"), Event::output(5.0, "y")],
        );

        assert_eq!(out, vec![Event::output(0.0, "x"), Event::output(1.0, "y")]);
    }

    #[test]
    fn idle_limiter_shrinks_duration_by_total_excess() {
        let times = [0.0, 0.5, 4.5, 5.0, 12.0, 12.2];
        let out = run(
            IdleLimiter::new(Some(2.0), None),
            times.iter().map(|&t| Event::output(t, ".")).collect(),
        );

        // gaps of 4.0 and 7.0 lose 2.0 and 5.0
        let last = out.last().unwrap().time;
        assert!((last - (12.2 - 7.0)).abs() < 1e-9);
        assert!((out[2].time - out[1].time - 2.0).abs() < 1e-9);
        assert!((out[4].time - out[3].time - 2.0).abs() < 1e-9);
    }

    #[test]
    fn idle_limiter_moves_start_at_after_gap() {
        let mut limiter = IdleLimiter::new(Some(1.0), Some(7.0));
        run_ref(&mut limiter, vec![Event::output(0.0, "x"), Event::output(5.0, "y"), Event::output(8.0, "z")]);

        // first gap (5s) lies before start_at: shifted by 4; the second
        // gap (3s) contains start_at, which sits 2s into it: shifted by 1
        assert_eq!(limiter.effective_start_at(), Some(2.0));
    }

    fn run_ref(limiter: &mut IdleLimiter, events: Vec<Event>) {
        for event in events {
            limiter.step(event, &mut |_| {});
        }
    }

    #[test]
    fn prepare_scenario_batches_and_splits_timelines() {
        let prepared = prepare(
            parsed(vec![
                Event::output(0.0, "a"),
                Event::output(0.01, "b"),
                Event::input(1.0, "q"),
                Event::resize(1.5, 100, 30),
                Event::output(2.0, "c"),
                Event::marker(2.5, "done"),
            ]),
            &PrepareOptions::default(),
        )
        .unwrap();

        let recording = prepared.recording;
        assert_eq!(
            recording.output,
            vec![Event::output(0.0, "ab"), Event::resize(1.5, 100, 30), Event::output(2.0, "c")]
        );
        assert_eq!(recording.input, vec![Event::input(1.0, "q")]);
        assert_eq!(recording.markers, vec![Marker::new(2.5, "done")]);
        assert_eq!(recording.duration, 2.0);
    }

    #[test]
    fn prepare_applies_idle_limit_to_duration() {
        let prepared = prepare(
            parsed(vec![Event::output(0.0, "x"), Event::output(5.0, "y")]),
            &PrepareOptions {
                idle_time_limit: Some(1.0),
                ..PrepareOptions::default()
            },
        )
        .unwrap();

        assert_eq!(prepared.recording.duration, 1.0);
        assert_eq!(prepared.recording.idle_time_limit, Some(1.0));
    }

    #[test]
    fn caller_markers_replace_embedded_ones() {
        let prepared = prepare(
            parsed(vec![
                Event::output(0.0, "a"),
                Event::marker(0.2, "embedded"),
                Event::output(2.0, "b"),
            ]),
            &PrepareOptions {
                markers: Some(vec![Marker::new(1.1, "second"), Marker::new(0.5, "first")]),
                ..PrepareOptions::default()
            },
        )
        .unwrap();

        assert_eq!(
            prepared.recording.markers,
            vec![Marker::new(0.5, "first"), Marker::new(1.1, "second")]
        );
    }

    #[test]
    fn recording_without_output_is_rejected() {
        let err = prepare(
            parsed(vec![Event::input(0.0, "a"), Event::marker(1.0, "m")]),
            &PrepareOptions::default(),
        )
        .unwrap_err();

        assert!(matches!(err, PlayerError::EmptyRecording));
    }

    #[test]
    fn malformed_event_aborts_preparation() {
        let events = vec![Ok(Event::output(0.0, "a")), Err(PlayerError::format("line 3"))];
        let parsed = Parsed {
            cols: 80,
            rows: 24,
            idle_time_limit: None,
            events: Box::new(events.into_iter()),
        };

        let err = prepare(parsed, &PrepareOptions::default()).unwrap_err();
        assert!(matches!(err, PlayerError::Format(_)));
    }
}

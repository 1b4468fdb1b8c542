//! Integration tests for playing fixture recordings through a Session

use castplay::driver::MarkerRef;
use castplay::recording::Source;
use castplay::{
    PlayerEvent, PlayerState, RecordingOptions, RecordingSource, SeekTarget, Session,
    SessionOptions, SourceSpec,
};
use tokio::sync::broadcast;

use super::helpers::{events_until, load_fixture, load_fixture_bytes, temp_fixture};

fn asciicast(name: &str) -> RecordingSource {
    RecordingSource::Data(Source::Asciicast(load_fixture(name)))
}

fn start(source: RecordingSource, recording: RecordingOptions) -> (Session, broadcast::Receiver<PlayerEvent>) {
    Session::recording(source, SessionOptions::default(), recording)
}

async fn play_to_end(source: RecordingSource) -> Session {
    let (session, mut rx) = start(source, RecordingOptions::default());
    session.play().await.unwrap();
    events_until(&mut rx, |e| *e == PlayerEvent::Ended).await;
    session
}

fn assert_close(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("value present");
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

// ============================================================================
// Formats
// ============================================================================

#[tokio::test(start_paused = true)]
async fn asciicast_v2_plays_to_final_screen() {
    let session = play_to_end(asciicast("sample.cast")).await;

    let lines = session.lines().await.unwrap();
    assert_eq!(&lines[..3], ["hello", "world", "$"]);
    assert_eq!(session.size().await.unwrap(), (40, 5));
    assert_close(session.duration().await.unwrap(), 0.8);
}

#[tokio::test(start_paused = true)]
async fn asciicast_v1_document_plays() {
    let session = play_to_end(asciicast("v1.json")).await;

    assert_eq!(session.lines().await.unwrap(), ["one", "two", ""]);
    assert_eq!(session.size().await.unwrap(), (30, 3));
    assert_close(session.duration().await.unwrap(), 0.5);
}

#[tokio::test(start_paused = true)]
async fn asciicast_v3_uses_intervals_and_resizes() {
    let (session, mut rx) = start(asciicast("v3.cast"), RecordingOptions::default());
    session.play().await.unwrap();
    let seen = events_until(&mut rx, |e| *e == PlayerEvent::Ended).await;

    assert!(seen.contains(&PlayerEvent::Resize { cols: 20, rows: 4 }));
    assert_eq!(session.size().await.unwrap(), (20, 4));
    assert_eq!(session.lines().await.unwrap()[0], "abc");
    assert_close(session.duration().await.unwrap(), 1.0);
}

#[tokio::test(start_paused = true)]
async fn ttyrec_times_are_relative_to_first_frame() {
    let source = RecordingSource::Data(Source::Ttyrec(load_fixture_bytes("sample.ttyrec")));
    let session = play_to_end(source).await;

    let lines = session.lines().await.unwrap();
    assert_eq!(&lines[..2], ["first", "second"]);
    assert_close(session.duration().await.unwrap(), 0.5);
}

#[tokio::test(start_paused = true)]
async fn typescript_uses_timing_and_header_size() {
    let source = RecordingSource::Data(Source::Typescript {
        timing: load_fixture("typescript.timing"),
        data: load_fixture_bytes("typescript"),
        input: None,
    });
    let session = play_to_end(source).await;

    assert_eq!(session.size().await.unwrap(), (30, 4));
    let lines = session.lines().await.unwrap();
    assert_eq!(&lines[..2], ["ls", "file.txt"]);
    assert_close(session.duration().await.unwrap(), 0.75);
}

#[tokio::test(start_paused = true)]
async fn idle_time_limit_from_header_compresses_gaps() {
    let session = play_to_end(asciicast("idle.cast")).await;

    assert_eq!(session.lines().await.unwrap()[0], "start end");
    assert_close(session.duration().await.unwrap(), 1.5);
}

// ============================================================================
// Markers and seeking
// ============================================================================

#[tokio::test(start_paused = true)]
async fn pause_on_markers_stops_at_each_marker() {
    let options = RecordingOptions {
        pause_on_markers: true,
        ..RecordingOptions::default()
    };
    let (session, mut rx) = start(asciicast("with_markers.cast"), options);

    session.play().await.unwrap();
    let seen = events_until(&mut rx, |e| *e == PlayerEvent::Pause).await;
    assert!(seen.contains(&PlayerEvent::Marker {
        index: 0,
        time: 0.5,
        label: "build".into()
    }));
    assert_close(session.current_time().await.unwrap(), 0.5);
    assert_eq!(session.lines().await.unwrap()[..2], ["step one", ""]);

    session.play().await.unwrap();
    events_until(&mut rx, |e| *e == PlayerEvent::Pause).await;
    assert_close(session.current_time().await.unwrap(), 1.5);
    assert_eq!(session.lines().await.unwrap()[1], "step two");

    session.play().await.unwrap();
    events_until(&mut rx, |e| *e == PlayerEvent::Ended).await;
    assert_eq!(session.lines().await.unwrap()[2], "done");
}

#[tokio::test(start_paused = true)]
async fn seeking_between_markers_while_stopped() {
    let options = SessionOptions {
        preload: true,
        ..SessionOptions::default()
    };
    let (session, _rx) = Session::recording(
        asciicast("with_markers.cast"),
        options,
        RecordingOptions::default(),
    );

    let next = SeekTarget::Marker(MarkerRef::Next);
    assert!(session.seek(next).await.unwrap());
    assert_close(session.current_time().await.unwrap(), 0.5);
    assert_eq!(session.lines().await.unwrap()[0], "step one");

    assert!(session.seek(next).await.unwrap());
    assert_close(session.current_time().await.unwrap(), 1.5);
    assert_eq!(session.lines().await.unwrap()[1], "step two");

    assert!(session.seek(SeekTarget::Marker(MarkerRef::Prev)).await.unwrap());
    assert_close(session.current_time().await.unwrap(), 0.5);
    assert_eq!(session.lines().await.unwrap()[1], "");
    assert_eq!(session.state().await.unwrap(), PlayerState::Stopped(None));
}

#[tokio::test(start_paused = true)]
async fn start_at_fast_forwards_earlier_output() {
    let options = RecordingOptions {
        start_at: Some(1.2),
        ..RecordingOptions::default()
    };
    let (session, mut rx) = start(asciicast("with_markers.cast"), options);

    session.play().await.unwrap();
    events_until(&mut rx, |e| *e == PlayerEvent::Playing).await;

    let lines = session.lines().await.unwrap();
    assert_eq!(&lines[..2], ["step one", "step two"]);
    assert!(session.current_time().await.unwrap().unwrap() >= 1.2);
}

#[tokio::test(start_paused = true)]
async fn seeking_back_short_of_replay_still_pauses_on_markers() {
    let options = SessionOptions {
        preload: true,
        ..SessionOptions::default()
    };
    let recording = RecordingOptions {
        pause_on_markers: true,
        ..RecordingOptions::default()
    };
    let (session, mut rx) = Session::recording(asciicast("with_markers.cast"), options, recording);

    // both targets are past the last delivered output (1.0), so no replay
    session.seek(SeekTarget::Time(1.7)).await.unwrap();
    session.seek(SeekTarget::Time(1.2)).await.unwrap();

    session.play().await.unwrap();
    let seen = events_until(&mut rx, |e| *e == PlayerEvent::Pause).await;
    assert!(seen.contains(&PlayerEvent::Marker {
        index: 1,
        time: 1.5,
        label: "test".into()
    }));
    assert_close(session.current_time().await.unwrap(), 1.5);
}

#[tokio::test(start_paused = true)]
async fn marker_on_the_last_frame_fires_before_ended() {
    let cast = concat!(
        "{\"version\": 2, \"width\": 20, \"height\": 3}\n",
        "[0.5, \"o\", \"hi\"]\n",
        "[1.0, \"o\", \"!\"]\n",
        "[1.0, \"m\", \"done\"]\n",
    );
    let source = RecordingSource::Data(Source::Asciicast(cast.into()));
    let (session, mut rx) = start(source, RecordingOptions::default());

    session.play().await.unwrap();
    let seen = events_until(&mut rx, |e| *e == PlayerEvent::Ended).await;

    assert!(seen.contains(&PlayerEvent::Marker {
        index: 0,
        time: 1.0,
        label: "done".into()
    }));
    assert_eq!(session.lines().await.unwrap()[0], "hi!");
}

// ============================================================================
// Files
// ============================================================================

#[tokio::test]
async fn plays_recording_from_file() {
    let (_temp_dir, path) = temp_fixture("sample.cast");
    let options = SessionOptions {
        speed: 20.0,
        ..SessionOptions::default()
    };
    let (session, mut rx) = Session::recording(
        RecordingSource::File(SourceSpec::new(path)),
        options,
        RecordingOptions::default(),
    );

    session.play().await.unwrap();
    events_until(&mut rx, |e| *e == PlayerEvent::Ended).await;

    assert_eq!(session.lines().await.unwrap()[1], "world");
    session.shutdown().await.unwrap();
}

#[tokio::test]
async fn missing_file_errors_the_session() {
    let (session, mut rx) = Session::recording(
        RecordingSource::File(SourceSpec::new("/nonexistent/path/file.cast")),
        SessionOptions::default(),
        RecordingOptions::default(),
    );

    assert!(session.play().await.is_err());
    let seen = events_until(&mut rx, |e| matches!(e, PlayerEvent::Errored { .. })).await;

    let Some(PlayerEvent::Errored { message }) = seen.last() else {
        unreachable!()
    };
    assert!(message.as_deref().unwrap_or_default().contains("file.cast"));
    assert_eq!(session.state().await.unwrap(), PlayerState::Errored);
}

//! Playback drivers.
//!
//! A driver decides *when* output reaches the terminal. The session owns
//! the driver and talks to it through [`Driver`]; the driver talks back
//! only through [`Callbacks`], which turns every callback into a
//! [`DriverEvent`] for the session actor to apply.
//!
//! Drivers don't own timers. A driver reports its earliest pending deadline
//! on the session [`Clock`] via [`Driver::next_deadline`], and the session
//! calls [`Driver::on_deadline`] once that time has passed. Cancelling a
//! timer is clearing the deadline, which happens inside the same actor turn
//! as the cursor mutation that made it stale.
//!
//! # Module Structure
//!
//! - [`recording`] - Scheduler for prepared, seekable recordings
//! - [`live`] - Buffered playback of streamed asciicast
//! - [`seek`] - Seek targets and NPT parsing
//! - [`clock`] - Speed-scaled clocks

pub mod clock;
pub mod live;
pub mod recording;
pub mod seek;

pub use clock::{Clock, PlaybackClock};
pub use live::{LiveDriver, LiveOptions, LiveSource};
pub use recording::{Loop, RecordingDriver, RecordingOptions, RecordingSource};
pub use seek::{parse_npt, MarkerRef, SeekTarget};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::recording::Marker;
use crate::session::{PlayerState, StopReason};

/// What a driver knows about its recording once initialized.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub cols: Option<u16>,
    pub rows: Option<u16>,
    pub duration: Option<f64>,
    pub markers: Vec<Marker>,
}

/// A playback source. Every method has a safe default so partial drivers,
/// e.g. unseekable live streams, need only implement what they support.
#[async_trait]
pub trait Driver: Send {
    async fn init(&mut self) -> Result<Metadata> {
        Ok(Metadata::default())
    }

    /// Start or resume playback. `true` means the driver is now playing.
    fn play(&mut self) -> bool {
        false
    }

    /// `true` means the driver is now paused.
    fn pause(&mut self) -> bool {
        false
    }

    fn seek(&mut self, _target: SeekTarget) -> Result<bool> {
        Ok(false)
    }

    fn step(&mut self) {}

    fn stop(&mut self) {}

    /// Current position in seconds, for drivers that track one.
    fn current_time(&self) -> Option<f64> {
        None
    }

    /// Terminal output accumulated before `time`, used as a poster.
    fn poster(&self, _time: f64) -> Option<String> {
        None
    }

    /// Earliest pending timer, in virtual ms on the session clock.
    fn next_deadline(&self) -> Option<f64> {
        None
    }

    /// Fire the timers whose deadline has passed.
    fn on_deadline(&mut self) {}
}

/// Messages from a driver to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    Feed(String),
    Input(String),
    Marker {
        index: usize,
        time: f64,
        label: String,
    },
    Reset {
        cols: u16,
        rows: u16,
        init: Option<String>,
    },
    Resize {
        cols: u16,
        rows: u16,
    },
    State {
        state: PlayerState,
        message: Option<String>,
    },
}

/// The session side of the driver contract. Cheap to clone; clones feed the
/// same session.
#[derive(Debug, Clone)]
pub struct Callbacks {
    tx: mpsc::UnboundedSender<DriverEvent>,
    clock: Clock,
}

impl Callbacks {
    pub fn new(tx: mpsc::UnboundedSender<DriverEvent>, clock: Clock) -> Self {
        Self { tx, clock }
    }

    /// A callbacks handle plus the receiving end, for driving a driver
    /// without a session.
    pub fn channel(clock: Clock) -> (Self, mpsc::UnboundedReceiver<DriverEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx, clock), rx)
    }

    fn send(&self, event: DriverEvent) {
        // A closed channel means the session is shutting down.
        let _ = self.tx.send(event);
    }

    pub fn feed(&self, data: impl Into<String>) {
        self.send(DriverEvent::Feed(data.into()));
    }

    pub fn on_input(&self, data: impl Into<String>) {
        self.send(DriverEvent::Input(data.into()));
    }

    pub fn on_marker(&self, index: usize, marker: &Marker) {
        self.send(DriverEvent::Marker {
            index,
            time: marker.time,
            label: marker.label.clone(),
        });
    }

    pub fn reset(&self, cols: u16, rows: u16, init: Option<String>) {
        self.send(DriverEvent::Reset { cols, rows, init });
    }

    pub fn resize(&self, cols: u16, rows: u16) {
        self.send(DriverEvent::Resize { cols, rows });
    }

    pub fn set_state(&self, state: PlayerState) {
        self.send(DriverEvent::State { state, message: None });
    }

    pub fn set_state_with_message(&self, state: PlayerState, message: impl Into<String>) {
        self.send(DriverEvent::State {
            state,
            message: Some(message.into()),
        });
    }

    pub fn ended(&self) {
        self.set_state(PlayerState::Stopped(Some(StopReason::Ended)));
    }

    /// Virtual milliseconds on the session clock.
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Sleep for `ms` virtual milliseconds.
    pub async fn sleep(&self, ms: f64) {
        tokio::time::sleep(self.clock.real_duration(ms)).await;
    }

    /// A ticker firing every `ms` virtual milliseconds.
    pub fn interval(&self, ms: f64) -> tokio::time::Interval {
        tokio::time::interval(self.clock.real_duration(ms.max(1.0)))
    }
}

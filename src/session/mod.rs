//! The player core: one actor task owning driver, terminal and state.
//!
//! Every public operation is a [`Command`] sent to the actor over an
//! unbounded channel and answered over a oneshot. Commands run to completion
//! in submission order; driver callbacks arrive on a second channel and are
//! applied by the same task, so nothing touches the terminal concurrently.
//!
//! # Module Structure
//!
//! - [`state`] - Player states
//! - [`events`] - Notifications broadcast to subscribers

mod events;
mod state;

pub use events::PlayerEvent;
pub use state::{PlayerState, StopReason};

use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::str::FromStr;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::driver::{
    parse_npt, Callbacks, Clock, Driver, DriverEvent, LiveDriver, LiveOptions, LiveSource, Metadata,
    PlaybackClock, RecordingDriver, RecordingOptions, RecordingSource, SeekTarget,
};
use crate::error::{PlayerError, Result};
use crate::recording::Marker;
use crate::terminal::{Cursor, Terminal, TerminalBuffer};

pub const DEFAULT_COLS: u16 = 80;
pub const DEFAULT_ROWS: u16 = 24;

/// Buffered notifications per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 1024;

/// Terminal reset (RIS).
const RESET: &str = "\x1bc";

/// What to show before playback starts.
#[derive(Debug, Clone, PartialEq)]
pub enum Poster {
    /// Literal terminal text, from `data:text/plain,<text>`.
    Text(String),
    /// The recording's screen at a time, from `npt:<time>`.
    Npt(f64),
}

impl FromStr for Poster {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(text) = s.strip_prefix("data:text/plain,") {
            Ok(Poster::Text(text.to_string()))
        } else if let Some(time) = s.strip_prefix("npt:") {
            parse_npt(time).map(Poster::Npt)
        } else {
            Err(PlayerError::format(format!("unsupported poster: {s}")))
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Terminal size overrides; the recording's size is used otherwise.
    pub cols: Option<u16>,
    pub rows: Option<u16>,
    pub speed: f64,
    pub auto_play: bool,
    /// Initialize the driver right away instead of on first use.
    pub preload: bool,
    pub poster: Option<Poster>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            cols: None,
            rows: None,
            speed: 1.0,
            auto_play: false,
            preload: false,
            poster: None,
        }
    }
}

type Reply<T> = oneshot::Sender<T>;

enum Command {
    Play(Reply<Result<()>>),
    Pause(Reply<Result<()>>),
    TogglePlay(Reply<Result<()>>),
    Seek(SeekTarget, Reply<Result<bool>>),
    Step(Reply<Result<()>>),
    Stop(Reply<Result<()>>),
    CurrentTime(Reply<Option<f64>>),
    Duration(Reply<Option<f64>>),
    Markers(Reply<Vec<Marker>>),
    Lines(Reply<Vec<String>>),
    Cursor(Reply<Cursor>),
    ChangedLines(Reply<BTreeSet<usize>>),
    State(Reply<PlayerState>),
    Size(Reply<(u16, u16)>),
    Shutdown(Reply<()>),
}

/// Handle to a running player session.
///
/// Cheap operations are still asynchronous: they queue behind whatever
/// command is running.
pub struct Session {
    command_tx: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<PlayerEvent>,
    task: JoinHandle<()>,
}

impl Session {
    /// Start a session around the driver `driver` builds, with the default
    /// terminal. Returns the handle and a subscription that sees every
    /// event, including those emitted during startup.
    pub fn spawn<F>(options: SessionOptions, driver: F) -> (Self, broadcast::Receiver<PlayerEvent>)
    where
        F: FnOnce(Callbacks) -> Box<dyn Driver>,
    {
        let terminal = TerminalBuffer::new(
            options.cols.unwrap_or(DEFAULT_COLS),
            options.rows.unwrap_or(DEFAULT_ROWS),
        );
        Self::spawn_with(options, Box::new(terminal), driver)
    }

    pub fn spawn_with<F>(
        options: SessionOptions,
        terminal: Box<dyn Terminal>,
        driver: F,
    ) -> (Self, broadcast::Receiver<PlayerEvent>)
    where
        F: FnOnce(Callbacks) -> Box<dyn Driver>,
    {
        let clock = Clock::new(options.speed);
        let (driver_tx, driver_rx) = mpsc::unbounded_channel();
        let driver = driver(Callbacks::new(driver_tx, clock));
        let (events, events_rx) = broadcast::channel(EVENT_CAPACITY);
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let core = Core {
            options,
            state: PlayerState::Uninitialized,
            driver,
            driver_rx,
            terminal,
            events: events.clone(),
            clock,
            duration: None,
            markers: Vec::new(),
            dirty: BTreeSet::new(),
            needs_clear: false,
            fallback_clock: None,
        };

        let task = tokio::spawn(core.run(command_rx));

        (
            Self {
                command_tx,
                events,
                task,
            },
            events_rx,
        )
    }

    /// A session playing a recording.
    pub fn recording(
        source: RecordingSource,
        options: SessionOptions,
        recording: RecordingOptions,
    ) -> (Self, broadcast::Receiver<PlayerEvent>) {
        Self::spawn(options, |cb| Box::new(RecordingDriver::new(source, cb, recording)))
    }

    /// A session following a live stream.
    pub fn live(
        source: LiveSource,
        options: SessionOptions,
        live: LiveOptions,
    ) -> (Self, broadcast::Receiver<PlayerEvent>) {
        Self::spawn(options, |cb| Box::new(LiveDriver::new(source, cb, live)))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(command(response_tx))
            .map_err(|_| PlayerError::Closed)?;
        response_rx.await.map_err(|_| PlayerError::Closed)
    }

    pub async fn play(&self) -> Result<()> {
        self.request(Command::Play).await?
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(Command::Pause).await?
    }

    pub async fn toggle_play(&self) -> Result<()> {
        self.request(Command::TogglePlay).await?
    }

    /// `Ok(true)` when the driver moved.
    pub async fn seek(&self, target: SeekTarget) -> Result<bool> {
        self.request(|tx| Command::Seek(target, tx)).await?
    }

    pub async fn step(&self) -> Result<()> {
        self.request(Command::Step).await?
    }

    pub async fn stop(&self) -> Result<()> {
        self.request(Command::Stop).await?
    }

    pub async fn current_time(&self) -> Result<Option<f64>> {
        self.request(Command::CurrentTime).await
    }

    pub async fn duration(&self) -> Result<Option<f64>> {
        self.request(Command::Duration).await
    }

    pub async fn markers(&self) -> Result<Vec<Marker>> {
        self.request(Command::Markers).await
    }

    pub async fn lines(&self) -> Result<Vec<String>> {
        self.request(Command::Lines).await
    }

    pub async fn cursor(&self) -> Result<Cursor> {
        self.request(Command::Cursor).await
    }

    /// Lines changed since the previous call.
    pub async fn changed_lines(&self) -> Result<BTreeSet<usize>> {
        self.request(Command::ChangedLines).await
    }

    pub async fn state(&self) -> Result<PlayerState> {
        self.request(Command::State).await
    }

    pub async fn size(&self) -> Result<(u16, u16)> {
        self.request(Command::Size).await
    }

    /// Stop the driver and wait for the actor to exit.
    pub async fn shutdown(self) -> Result<()> {
        self.request(Command::Shutdown).await?;
        self.task.await.map_err(|_| PlayerError::Closed)
    }
}

struct Core {
    options: SessionOptions,
    state: PlayerState,
    driver: Box<dyn Driver>,
    driver_rx: mpsc::UnboundedReceiver<DriverEvent>,
    terminal: Box<dyn Terminal>,
    events: broadcast::Sender<PlayerEvent>,
    clock: Clock,
    duration: Option<f64>,
    markers: Vec<Marker>,
    dirty: BTreeSet<usize>,
    /// A poster is on screen and must be wiped before real output.
    needs_clear: bool,
    /// Position for drivers that don't report one.
    fallback_clock: Option<PlaybackClock>,
}

impl Core {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        self.start().await;

        loop {
            let deadline = self.driver.next_deadline();
            let wake = deadline.map_or_else(Instant::now, |d| self.clock.instant_at(d));

            tokio::select! {
                biased;

                Some(event) = self.driver_rx.recv() => self.apply(event),

                command = commands.recv() => {
                    let Some(command) = command else { break };
                    if self.handle(command).await.is_break() {
                        break;
                    }
                }

                _ = tokio::time::sleep_until(wake), if deadline.is_some() => {
                    self.driver.on_deadline();
                    self.drain();
                }
            }
        }

        self.driver.stop();
        debug!("session closed");
    }

    async fn start(&mut self) {
        let poster_time = match self.options.poster {
            Some(Poster::Npt(time)) if !self.options.auto_play => Some(time),
            _ => None,
        };

        if self.options.preload || poster_time.is_some() {
            // failures leave the session errored; nothing else to do here
            if self.initialize().await.is_ok() {
                if let Some(text) = poster_time.and_then(|t| self.driver.poster(t)) {
                    self.feed(&text);
                    self.needs_clear = true;
                }
            }
        }

        if self.options.auto_play {
            if let Err(e) = self.play().await {
                warn!("auto play failed: {e}");
            }
        } else if let Some(Poster::Text(text)) = self.options.poster.clone() {
            self.feed(&text);
            self.needs_clear = true;
        }
    }

    async fn handle(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Play(tx) => {
                self.clear_if_needed();
                let result = self.play().await;
                let _ = tx.send(result);
            }
            Command::Pause(tx) => {
                self.pause();
                let _ = tx.send(Ok(()));
            }
            Command::TogglePlay(tx) => {
                self.clear_if_needed();
                let result = if self.state.is_playing() {
                    self.pause();
                    Ok(())
                } else {
                    self.play().await
                };
                let _ = tx.send(result);
            }
            Command::Seek(target, tx) => {
                self.clear_if_needed();
                let result = self.seek(target).await;
                let _ = tx.send(result);
            }
            Command::Step(tx) => {
                self.clear_if_needed();
                let result = self.step().await;
                let _ = tx.send(result);
            }
            Command::Stop(tx) => {
                self.stop();
                let _ = tx.send(Ok(()));
            }
            Command::CurrentTime(tx) => {
                let _ = tx.send(self.current_time());
            }
            Command::Duration(tx) => {
                let _ = tx.send(self.duration);
            }
            Command::Markers(tx) => {
                let _ = tx.send(self.markers.clone());
            }
            Command::Lines(tx) => {
                let _ = tx.send(self.terminal.lines());
            }
            Command::Cursor(tx) => {
                let _ = tx.send(self.terminal.cursor());
            }
            Command::ChangedLines(tx) => {
                let _ = tx.send(std::mem::take(&mut self.dirty));
            }
            Command::State(tx) => {
                let _ = tx.send(self.state);
            }
            Command::Size(tx) => {
                let _ = tx.send(self.terminal.size());
            }
            Command::Shutdown(tx) => {
                let _ = tx.send(());
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }

    async fn initialize(&mut self) -> Result<()> {
        match self.driver.init().await {
            Ok(meta) => {
                self.apply_metadata(meta);
                self.set_state(PlayerState::Stopped(None), None);
                self.drain();
                Ok(())
            }
            Err(e) => {
                warn!("failed to initialize driver: {e}");
                self.set_state(PlayerState::Errored, Some(e.to_string()));
                Err(e)
            }
        }
    }

    fn apply_metadata(&mut self, meta: Metadata) {
        let cols = self.options.cols.or(meta.cols).filter(|&c| c > 0).unwrap_or(DEFAULT_COLS);
        let rows = self.options.rows.or(meta.rows).filter(|&r| r > 0).unwrap_or(DEFAULT_ROWS);

        self.duration = meta.duration;
        self.markers = meta.markers;
        self.terminal.resize(cols, rows);
        info!(cols, rows, duration = ?self.duration, "session initialized");

        self.emit(PlayerEvent::Init {
            cols,
            rows,
            duration: self.duration,
            markers: self.markers.clone(),
        });
        self.touch_all_lines();
    }

    async fn play(&mut self) -> Result<()> {
        match self.state {
            PlayerState::Uninitialized => {
                self.emit(PlayerEvent::Play);
                self.initialize().await?;
                self.start_driver();
            }
            PlayerState::Stopped(_) => {
                self.emit(PlayerEvent::Play);
                self.start_driver();
            }
            _ => {}
        }

        Ok(())
    }

    fn start_driver(&mut self) {
        if self.driver.play() {
            if self.driver.current_time().is_none() {
                self.fallback_clock = Some(PlaybackClock::start(self.clock.speed()));
            }
            self.set_state(PlayerState::Playing, None);
        }
        self.drain();
    }

    fn pause(&mut self) {
        if self.state.is_playing() && self.driver.pause() {
            self.set_state(PlayerState::Stopped(Some(StopReason::Paused)), None);
        }
        self.drain();
    }

    async fn seek(&mut self, target: SeekTarget) -> Result<bool> {
        match self.state {
            PlayerState::Uninitialized => self.initialize().await?,
            PlayerState::Stopped(_) | PlayerState::Playing => {}
            _ => return Ok(false),
        }

        let seeked = self.driver.seek(target)?;
        self.drain();

        if seeked {
            if self.state.is_ended() {
                self.set_state(PlayerState::Stopped(None), None);
            }
            self.emit(PlayerEvent::Seeked);
        }

        Ok(seeked)
    }

    async fn step(&mut self) -> Result<()> {
        match self.state {
            PlayerState::Uninitialized => self.initialize().await?,
            PlayerState::Stopped(_) => {}
            _ => return Ok(()),
        }

        self.driver.step();
        self.drain();
        Ok(())
    }

    fn stop(&mut self) {
        match self.state {
            PlayerState::Uninitialized | PlayerState::Errored => {}
            PlayerState::Stopped(_) => self.driver.stop(),
            PlayerState::Playing | PlayerState::Loading | PlayerState::Offline => {
                self.driver.stop();
                self.set_state(PlayerState::Stopped(None), None);
            }
        }
        self.drain();
    }

    fn current_time(&self) -> Option<f64> {
        self.driver
            .current_time()
            .or_else(|| self.fallback_clock.map(|clock| clock.time()))
    }

    /// Apply every callback the driver has queued so far.
    fn drain(&mut self) {
        while let Ok(event) = self.driver_rx.try_recv() {
            self.apply(event);
        }
    }

    fn apply(&mut self, event: DriverEvent) {
        match event {
            DriverEvent::Feed(data) => self.feed(&data),
            DriverEvent::Input(data) => self.emit(PlayerEvent::Input { data }),
            DriverEvent::Marker { index, time, label } => {
                self.emit(PlayerEvent::Marker { index, time, label })
            }
            DriverEvent::Reset { cols, rows, init } => self.reset(cols, rows, init),
            DriverEvent::Resize { cols, rows } => self.resize(cols, rows),
            DriverEvent::State { state, message } => self.set_state(state, message),
        }
    }

    fn feed(&mut self, data: &str) {
        let changes = self.terminal.feed(data);

        if changes.resized {
            let (cols, rows) = self.terminal.size();
            self.emit(PlayerEvent::Resize { cols, rows });
            self.touch_all_lines();
        } else if !changes.lines.is_empty() {
            self.dirty.extend(changes.lines.iter().copied());
            self.emit(PlayerEvent::TerminalUpdate { lines: changes.lines });
        }
    }

    fn reset(&mut self, cols: u16, rows: u16, init: Option<String>) {
        debug!(cols, rows, "terminal reset");
        self.terminal.resize(cols, rows);
        self.terminal.feed(RESET);

        if let Some(init) = init.filter(|s| !s.is_empty()) {
            self.terminal.feed(&init);
        }

        if let Some(clock) = self.fallback_clock.as_mut() {
            clock.set_time(0.0);
        }

        self.emit(PlayerEvent::Reset { cols, rows });
        self.touch_all_lines();
    }

    fn resize(&mut self, cols: u16, rows: u16) {
        if self.terminal.size() == (cols, rows) {
            return;
        }

        debug!(cols, rows, "terminal resize");
        self.terminal.resize(cols, rows);
        self.emit(PlayerEvent::Resize { cols, rows });
        self.touch_all_lines();
    }

    fn touch_all_lines(&mut self) {
        let (_, rows) = self.terminal.size();
        let lines: BTreeSet<usize> = (0..rows as usize).collect();
        self.dirty.extend(lines.iter().copied());
        self.emit(PlayerEvent::TerminalUpdate { lines });
    }

    fn clear_if_needed(&mut self) {
        if std::mem::take(&mut self.needs_clear) {
            self.feed(RESET);
        }
    }

    fn set_state(&mut self, state: PlayerState, message: Option<String>) {
        if self.state == state || self.state == PlayerState::Errored {
            return;
        }

        debug!(from = %self.state, to = %state, "state change");
        self.state = state;

        let event = match state {
            PlayerState::Uninitialized => return,
            PlayerState::Loading => PlayerEvent::Loading,
            PlayerState::Playing => PlayerEvent::Playing,
            PlayerState::Stopped(None) => PlayerEvent::Stopped,
            PlayerState::Stopped(Some(StopReason::Paused)) => PlayerEvent::Pause,
            PlayerState::Stopped(Some(StopReason::Ended)) => PlayerEvent::Ended,
            PlayerState::Offline => PlayerEvent::Offline { message },
            PlayerState::Errored => PlayerEvent::Errored { message },
        };
        self.emit(event);
    }

    fn emit(&self, event: PlayerEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

//! Terminal front end for a [`Session`].
//!
//! Two ways of presenting a session:
//!
//! - [`play_interactive`]: alternate screen, raw keys, progress and status bars
//! - [`play_headless`]: play to the end without a TTY and return the final screen
//!
//! # Module Structure
//!
//! - `input`: key reading and key-to-action mapping
//! - `render`: screen, progress bar and status bar painting

pub mod input;
pub mod render;

use std::io::{self, Stdout, Write};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossterm::cursor::{Hide, Show};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{execute, queue};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::PlayerError;
use crate::recording::Marker;
use crate::session::{PlayerEvent, Session};
use input::{action_for_key, spawn_key_reader, Action};
use render::{render_cursor, render_progress_bar, render_screen, render_status_bar, Viewport};

/// Redraw interval, about 30 frames per second.
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// How an interactive playback finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Playback reached the end.
    Finished,
    /// The user quit.
    Interrupted,
}

/// Raw mode and the alternate screen, undone on drop.
struct TerminalGuard {
    stdout: Stdout,
}

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen, Hide, Clear(ClearType::All)) {
            let _ = disable_raw_mode();
            return Err(e).context("Failed to enter alternate screen");
        }
        Ok(Self { stdout })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(self.stdout, Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

/// What the front end remembers between frames.
struct View {
    speed: f64,
    duration: Option<f64>,
    markers: Vec<Marker>,
    marker_label: Option<String>,
    full_redraw: bool,
    window: (u16, u16),
}

impl View {
    fn apply(&mut self, event: &PlayerEvent) {
        match event {
            PlayerEvent::Init {
                duration, markers, ..
            } => {
                self.duration = *duration;
                self.markers = markers.clone();
                self.full_redraw = true;
            }
            PlayerEvent::Reset { .. } | PlayerEvent::Resize { .. } | PlayerEvent::Seeked => {
                self.full_redraw = true;
                if matches!(event, PlayerEvent::Seeked) {
                    self.marker_label = None;
                }
            }
            PlayerEvent::Marker { label, .. } => {
                self.marker_label = Some(label.clone());
            }
            _ => {}
        }
    }
}

/// Play `session` on the controlling terminal until the user quits or the
/// recording ends.
///
/// `events` should be the subscription returned when the session was spawned,
/// so the initial `Init` is not missed.
pub async fn play_interactive(
    session: &Session,
    mut events: broadcast::Receiver<PlayerEvent>,
    speed: f64,
    start_paused: bool,
) -> Result<Outcome> {
    let mut guard = TerminalGuard::enter()?;
    let (mut keys, reader) = spawn_key_reader();

    let mut frame = tokio::time::interval(FRAME_INTERVAL);
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut view = View {
        speed,
        duration: session.duration().await?,
        markers: session.markers().await?,
        marker_label: None,
        full_redraw: true,
        window: crossterm::terminal::size().unwrap_or((80, 24)),
    };

    if !start_paused {
        session.play().await?;
    }

    let outcome = loop {
        tokio::select! {
            key = keys.recv() => {
                let Some(key) = key else {
                    break Outcome::Interrupted;
                };
                match action_for_key(&key) {
                    Some(Action::Quit) => break Outcome::Interrupted,
                    Some(Action::TogglePlay) => session.toggle_play().await?,
                    Some(Action::Step) => session.step().await?,
                    Some(Action::Seek(target)) => match session.seek(target).await {
                        Ok(_) => {}
                        Err(e @ PlayerError::InvalidSeekTarget(_)) => debug!("Seek ignored: {}", e),
                        Err(e) => return Err(e.into()),
                    },
                    None => {}
                }
            }
            event = events.recv() => match event {
                Ok(PlayerEvent::Ended) => break Outcome::Finished,
                Ok(PlayerEvent::Errored { message }) => {
                    bail!("Playback failed: {}", message.unwrap_or_else(|| "unknown error".into()));
                }
                Ok(event) => view.apply(&event),
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Front end lagged by {} events", skipped);
                    view.full_redraw = true;
                }
                Err(RecvError::Closed) => break Outcome::Finished,
            },
            _ = frame.tick() => {
                draw(session, &mut view, &mut guard.stdout).await?;
            }
        }
    };

    drop(keys);
    drop(guard);
    if let Err(e) = reader.await {
        warn!("Key reader panicked: {}", e);
    }

    Ok(outcome)
}

async fn draw(session: &Session, view: &mut View, out: &mut Stdout) -> Result<()> {
    let window = crossterm::terminal::size().unwrap_or(view.window);
    if window != view.window {
        view.window = window;
        view.full_redraw = true;
    }
    let viewport = Viewport::for_window(window.0, window.1);

    let changed = session.changed_lines().await?;
    let lines = session.lines().await?;

    if view.full_redraw {
        queue!(out, Clear(ClearType::All))?;
        render_screen(out, viewport, &lines, None)?;
        view.full_redraw = false;
    } else if !changed.is_empty() {
        render_screen(out, viewport, &lines, Some(&changed))?;
    }

    let current = session.current_time().await?.unwrap_or(0.0);
    let state = session.state().await?;

    render_progress_bar(
        out,
        viewport.cols,
        viewport.progress_row(),
        current,
        view.duration,
        &view.markers,
    )?;
    render_status_bar(
        out,
        viewport.cols,
        viewport.status_row(),
        state,
        view.speed,
        view.marker_label.as_deref(),
    )?;
    render_cursor(out, viewport, session.cursor().await?)?;

    out.flush()?;
    Ok(())
}

/// Play `session` to the end without a terminal and return the final
/// screen, trailing blank lines dropped.
///
/// Marker pauses are resumed right away. A live stream going offline counts
/// as its end.
pub async fn play_headless(
    session: &Session,
    mut events: broadcast::Receiver<PlayerEvent>,
) -> Result<Vec<String>> {
    session.play().await?;

    loop {
        match events.recv().await {
            Ok(PlayerEvent::Pause) => {
                debug!("Resuming after marker pause");
                session.play().await?;
            }
            Ok(PlayerEvent::Ended) | Ok(PlayerEvent::Offline { .. }) => break,
            Ok(PlayerEvent::Errored { message }) => {
                bail!("Playback failed: {}", message.unwrap_or_else(|| "unknown error".into()));
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => debug!("Headless player lagged by {} events", skipped),
            Err(RecvError::Closed) => break,
        }
    }

    let mut lines = session.lines().await?;
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    Ok(lines)
}

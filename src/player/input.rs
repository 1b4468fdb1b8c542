//! Keyboard input for the interactive player.
//!
//! Keys are read on a blocking thread and forwarded over a channel so the
//! player loop can `select!` on them next to session events.

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::driver::seek::{LARGE_STEP, SMALL_STEP};
use crate::driver::{MarkerRef, SeekTarget};

/// How long the reader blocks before re-checking whether anyone listens.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    TogglePlay,
    Seek(SeekTarget),
    Step,
    Quit,
}

/// Map a key press to a player action.
pub fn action_for_key(key: &KeyEvent) -> Option<Action> {
    if key.kind == KeyEventKind::Release {
        return None;
    }

    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    let action = match key.code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,

        KeyCode::Char(' ') => Action::TogglePlay,
        KeyCode::Char('.') => Action::Step,

        KeyCode::Left if shift => Action::Seek(SeekTarget::RelativeFraction(-LARGE_STEP)),
        KeyCode::Right if shift => Action::Seek(SeekTarget::RelativeFraction(LARGE_STEP)),
        KeyCode::Left => Action::Seek(SeekTarget::Relative(-SMALL_STEP)),
        KeyCode::Right => Action::Seek(SeekTarget::Relative(SMALL_STEP)),

        KeyCode::Char('[') => Action::Seek(SeekTarget::Marker(MarkerRef::Prev)),
        KeyCode::Char(']') => Action::Seek(SeekTarget::Marker(MarkerRef::Next)),

        KeyCode::Char(c @ '0'..='9') => {
            let digit = c.to_digit(10).unwrap_or(0);
            Action::Seek(SeekTarget::Percent(f64::from(digit) * 10.0))
        }

        _ => return None,
    };

    Some(action)
}

/// Forward key presses from the terminal until the receiver is dropped.
pub fn spawn_key_reader() -> (mpsc::UnboundedReceiver<KeyEvent>, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = tokio::task::spawn_blocking(move || {
        while !tx.is_closed() {
            match event::poll(POLL_INTERVAL) {
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) => {
                        if tx.send(key).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!("Key reader stopped: {}", e);
                        break;
                    }
                },
                Ok(false) => {}
                Err(e) => {
                    debug!("Key reader stopped: {}", e);
                    break;
                }
            }
        }
    });

    (rx, handle)
}

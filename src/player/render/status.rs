//! Status bar rendering.
//!
//! Displays playback state, speed, the last marker passed and key hints.

use std::io::Write;

use anyhow::Result;

use crate::session::{PlayerState, StopReason};

/// Render the status/controls bar at `row` (0-indexed).
pub fn render_status_bar(
    out: &mut impl Write,
    width: u16,
    row: u16,
    state: PlayerState,
    speed: f64,
    marker: Option<&str>,
) -> Result<()> {
    const WHITE: &str = "\x1b[97m";
    const MAGENTA: &str = "\x1b[35m";
    const DARK_GREY: &str = "\x1b[90m";

    let (color, label) = state_label(state);
    let mut plain_len = 0;
    let mut output = format!("\x1b[{};1H\x1b[48;5;236m", row + 1);

    fn push(output: &mut String, color: &str, text: &str) -> usize {
        output.push_str(color);
        output.push_str(text);
        text.chars().count()
    }

    plain_len += push(&mut output, color, &format!(" {label}"));
    plain_len += push(&mut output, WHITE, &format!("  {speed}x"));

    if let Some(marker) = marker.filter(|m| !m.is_empty()) {
        plain_len += push(&mut output, MAGENTA, &format!("  ◆ {marker}"));
    }

    let hints = "  space:pause  ←/→:seek  [/]:marker  .:step  q:quit";
    if plain_len + hints.chars().count() <= width as usize {
        push(&mut output, DARK_GREY, hints);
    }

    output.push_str("\x1b[K\x1b[0m");
    write!(out, "{}", output)?;
    Ok(())
}

fn state_label(state: PlayerState) -> (&'static str, &'static str) {
    match state {
        PlayerState::Playing => ("\x1b[32m", "▶ playing"),
        PlayerState::Stopped(Some(StopReason::Paused)) => ("\x1b[33m", "⏸ paused"),
        PlayerState::Stopped(Some(StopReason::Ended)) => ("\x1b[97m", "■ ended"),
        PlayerState::Stopped(None) | PlayerState::Uninitialized => ("\x1b[97m", "■ stopped"),
        PlayerState::Loading => ("\x1b[33m", "… loading"),
        PlayerState::Offline => ("\x1b[31m", "✕ offline"),
        PlayerState::Errored => ("\x1b[31m", "✕ error"),
    }
}

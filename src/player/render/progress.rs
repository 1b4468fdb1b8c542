//! Progress bar rendering.
//!
//! Displays playback progress with marker indicators.

use std::io::Write;

use anyhow::Result;

use crate::recording::Marker;

/// Format a duration in seconds to MM:SS format.
pub fn format_duration(seconds: f64) -> String {
    let total_secs = seconds as u64;
    let mins = total_secs / 60;
    let secs = total_secs % 60;
    format!("{:02}:{:02}", mins, secs)
}

/// Build the progress bar character array.
///
/// Returns the bar characters and how many leading positions are filled.
/// The playhead sits at the first unfilled position and hides any marker
/// there.
pub fn build_progress_bar_chars(
    bar_width: usize,
    current_time: f64,
    total_duration: f64,
    markers: &[Marker],
) -> (Vec<char>, usize) {
    let progress = if total_duration > 0.0 {
        (current_time / total_duration).clamp(0.0, 1.0)
    } else {
        1.0
    };

    let filled = (bar_width as f64 * progress) as usize;

    let mut bar: Vec<char> = vec!['─'; bar_width];

    if filled < bar_width {
        bar[filled] = '⏺';
    }

    for marker in markers {
        let marker_pos = if total_duration > 0.0 {
            ((marker.time / total_duration) * bar_width as f64) as usize
        } else {
            0
        };
        if marker_pos < bar_width && bar[marker_pos] != '⏺' {
            bar[marker_pos] = '◆';
        }
    }

    (bar, filled)
}

/// Render the progress bar with markers at `row` (0-indexed).
///
/// Without a known duration (live streams) only the elapsed time is shown.
pub fn render_progress_bar(
    out: &mut impl Write,
    width: u16,
    row: u16,
    current_time: f64,
    total_duration: Option<f64>,
    markers: &[Marker],
) -> Result<()> {
    const GREEN: &str = "\x1b[32m";
    const YELLOW: &str = "\x1b[33m";
    const WHITE: &str = "\x1b[97m";
    const DARK_GREY: &str = "\x1b[90m";
    const GREY: &str = "\x1b[37m";

    let mut output = String::with_capacity(width as usize * 4);
    output.push_str(&format!("\x1b[{};1H", row + 1));
    output.push_str("\x1b[48;5;236m ");

    let Some(total_duration) = total_duration else {
        let time_display = format!("{GREY}● live {}", format_duration(current_time));
        output.push_str(&time_display);
        output.push_str("\x1b[K\x1b[0m");
        write!(out, "{}", output)?;
        return Ok(());
    };

    // padding plus " MM:SS/MM:SS"
    let bar_width = (width as usize).saturating_sub(14);
    let (bar, filled) = build_progress_bar_chars(bar_width, current_time, total_duration, markers);
    let time_display = format!(
        " {}/{}",
        format_duration(current_time),
        format_duration(total_duration)
    );

    output.push_str(GREEN);
    for (i, &c) in bar.iter().enumerate() {
        if i < filled {
            if c == '◆' {
                output.push_str(YELLOW);
                output.push(c);
                output.push_str(GREEN);
            } else {
                output.push('━');
            }
        } else if i == filled {
            output.push_str(WHITE);
            output.push(c);
        } else if c == '◆' {
            output.push_str(YELLOW);
            output.push(c);
        } else {
            output.push_str(DARK_GREY);
            output.push(c);
        }
    }

    output.push_str(GREY);
    output.push_str(&time_display);

    let used_width = 1 + bar_width + time_display.len();
    let remaining = (width as usize).saturating_sub(used_width);
    output.extend(std::iter::repeat(' ').take(remaining));

    output.push_str("\x1b[0m");
    write!(out, "{}", output)?;

    Ok(())
}

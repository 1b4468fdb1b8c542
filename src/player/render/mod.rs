//! Rendering for the interactive player.
//!
//! The screen is the recording's terminal in the top rows, followed by a
//! progress bar and a status bar. Only lines the session reports as changed
//! are repainted between full redraws.

mod progress;
mod status;

pub use progress::{build_progress_bar_chars, format_duration, render_progress_bar};
pub use status::render_status_bar;

use std::collections::BTreeSet;
use std::io::Write;

use anyhow::Result;
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};

use crate::terminal::Cursor;

/// Rows reserved below the recording for progress and status.
pub const STATUS_LINES: u16 = 2;

/// Visible part of the host terminal available to the recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub cols: u16,
    pub rows: u16,
}

impl Viewport {
    /// Viewport for a host terminal of `cols` x `rows`.
    pub fn for_window(cols: u16, rows: u16) -> Self {
        Self {
            cols,
            rows: rows.saturating_sub(STATUS_LINES),
        }
    }

    pub fn progress_row(&self) -> u16 {
        self.rows
    }

    pub fn status_row(&self) -> u16 {
        self.rows + 1
    }
}

/// Paint `lines` into the viewport.
///
/// With `changed` set, only those line indices are repainted; otherwise the
/// whole viewport is cleared and redrawn. Lines are clipped to the viewport.
pub fn render_screen(
    out: &mut impl Write,
    viewport: Viewport,
    lines: &[String],
    changed: Option<&BTreeSet<usize>>,
) -> Result<()> {
    let rows = viewport.rows as usize;

    match changed {
        Some(changed) => {
            for &n in changed.iter().filter(|&&n| n < rows) {
                render_line(out, viewport, n, lines.get(n).map(String::as_str))?;
            }
        }
        None => {
            for n in 0..rows {
                render_line(out, viewport, n, lines.get(n).map(String::as_str))?;
            }
        }
    }

    Ok(())
}

fn render_line(out: &mut impl Write, viewport: Viewport, n: usize, text: Option<&str>) -> Result<()> {
    let clipped: String = text
        .unwrap_or_default()
        .chars()
        .take(viewport.cols as usize)
        .collect();

    queue!(
        out,
        MoveTo(0, n as u16),
        Print(clipped),
        Clear(ClearType::UntilNewLine)
    )?;
    Ok(())
}

/// Place the host cursor where the recording's cursor is, hiding it when the
/// recording hides it or it falls outside the viewport.
pub fn render_cursor(out: &mut impl Write, viewport: Viewport, cursor: Cursor) -> Result<()> {
    let inside = cursor.col < viewport.cols as usize && cursor.row < viewport.rows as usize;

    if cursor.visible && inside {
        queue!(out, MoveTo(cursor.col as u16, cursor.row as u16), Show)?;
    } else {
        queue!(out, Hide)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn viewport_reserves_status_rows() {
        let viewport = Viewport::for_window(80, 24);
        assert_eq!(viewport.rows, 22);
        assert_eq!(viewport.progress_row(), 22);
        assert_eq!(viewport.status_row(), 23);
        assert_eq!(Viewport::for_window(80, 1).rows, 0);
    }

    #[test]
    fn full_redraw_clips_to_viewport() {
        let viewport = Viewport { cols: 3, rows: 2 };
        let mut out = Vec::new();
        render_screen(&mut out, viewport, &lines(&["abcdef", "xy", "hidden"]), None).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("abc"));
        assert!(!text.contains("abcd"));
        assert!(text.contains("xy"));
        assert!(!text.contains("hidden"));
    }

    #[test]
    fn partial_redraw_only_touches_changed_lines() {
        let viewport = Viewport { cols: 10, rows: 3 };
        let changed = BTreeSet::from([1]);
        let mut out = Vec::new();
        render_screen(&mut out, viewport, &lines(&["one", "two", "three"]), Some(&changed)).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("two"));
        assert!(!text.contains("one"));
        assert!(!text.contains("three"));
    }

    #[test]
    fn cursor_hidden_outside_viewport() {
        let viewport = Viewport { cols: 10, rows: 3 };
        let mut out = Vec::new();
        let cursor = Cursor {
            col: 2,
            row: 5,
            visible: true,
        };
        render_cursor(&mut out, viewport, cursor).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\x1b[?25l"));
    }
}

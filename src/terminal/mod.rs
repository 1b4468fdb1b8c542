//! Virtual terminal emulator boundary.
//!
//! The player only needs a narrow contract from an emulator: feed it text,
//! learn which lines changed, read lines and the cursor back. [`Terminal`]
//! is that contract; [`TerminalBuffer`] is a small VTE-based implementation
//! covering printable text, cursor movement, erasing, scrolling and `ESC c`.
//! Colors and attributes are parsed and dropped.

mod performer;
mod types;

pub use types::{Changes, Cursor};

use std::collections::BTreeSet;
use std::fmt;

use vte::Parser;

/// What the session needs from a terminal emulator.
pub trait Terminal: Send {
    /// Process output and report what changed.
    fn feed(&mut self, data: &str) -> Changes;

    fn resize(&mut self, cols: u16, rows: u16);

    /// Text of line `n`, trailing blanks trimmed.
    fn line(&self, n: usize) -> Option<String>;

    fn cursor(&self) -> Cursor;

    fn size(&self) -> (u16, u16);

    fn lines(&self) -> Vec<String> {
        let (_, rows) = self.size();
        (0..rows as usize).filter_map(|n| self.line(n)).collect()
    }
}

/// A virtual terminal buffer that processes ANSI escape sequences.
pub struct TerminalBuffer {
    width: usize,
    height: usize,
    grid: Vec<Vec<char>>,
    cursor: Cursor,
    parser: Parser,
    /// Saved cursor position (for CSI s/u and ESC 7/8)
    saved_cursor: Option<(usize, usize)>,
    /// Scroll region, 0-indexed and inclusive
    scroll_top: usize,
    scroll_bottom: usize,
}

impl TerminalBuffer {
    pub fn new(cols: u16, rows: u16) -> Self {
        let (width, height) = (cols.max(1) as usize, rows.max(1) as usize);
        Self {
            width,
            height,
            grid: vec![vec![' '; width]; height],
            cursor: Cursor::default(),
            parser: Parser::new(),
            saved_cursor: None,
            scroll_top: 0,
            scroll_bottom: height - 1,
        }
    }
}

impl Terminal for TerminalBuffer {
    fn feed(&mut self, data: &str) -> Changes {
        let mut dirty = BTreeSet::new();
        let mut perf = performer::TerminalPerformer {
            grid: &mut self.grid,
            width: self.width,
            height: self.height,
            cursor: &mut self.cursor,
            saved_cursor: &mut self.saved_cursor,
            scroll_top: self.scroll_top,
            scroll_bottom: self.scroll_bottom,
            dirty: &mut dirty,
            resized: false,
        };
        self.parser.advance(&mut perf, data.as_bytes());

        let resized = perf.resized;
        self.width = perf.width;
        self.height = perf.height;
        self.scroll_top = perf.scroll_top;
        self.scroll_bottom = perf.scroll_bottom;

        Changes { lines: dirty, resized }
    }

    fn resize(&mut self, cols: u16, rows: u16) {
        let (width, height) = (cols.max(1) as usize, rows.max(1) as usize);
        if (width, height) == (self.width, self.height) {
            return;
        }

        performer::resize_grid(&mut self.grid, width, height);
        self.width = width;
        self.height = height;
        self.cursor.col = self.cursor.col.min(width - 1);
        self.cursor.row = self.cursor.row.min(height - 1);
        self.scroll_top = 0;
        self.scroll_bottom = height - 1;

        if let Some((row, col)) = self.saved_cursor {
            if row >= height || col >= width {
                self.saved_cursor = None;
            }
        }
    }

    fn line(&self, n: usize) -> Option<String> {
        self.grid
            .get(n)
            .map(|row| row.iter().collect::<String>().trim_end().to_string())
    }

    fn cursor(&self) -> Cursor {
        Cursor {
            col: self.cursor.col.min(self.width - 1),
            ..self.cursor
        }
    }

    fn size(&self) -> (u16, u16) {
        (self.width as u16, self.height as u16)
    }
}

impl fmt::Display for TerminalBuffer {
    /// Screen content without trailing blanks or trailing empty lines.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = self.lines();

        while lines.last().is_some_and(|s| s.is_empty()) {
            lines.pop();
        }

        write!(f, "{}", lines.join("\n"))
    }
}

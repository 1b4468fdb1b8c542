//! vte `Perform` implementation driving the screen grid.

use std::collections::BTreeSet;

use vte::{Params, Perform};

use super::types::Cursor;

/// Borrows the buffer's state for the duration of one `advance` call.
pub(super) struct TerminalPerformer<'a> {
    pub grid: &'a mut Vec<Vec<char>>,
    pub width: usize,
    pub height: usize,
    pub cursor: &'a mut Cursor,
    pub saved_cursor: &'a mut Option<(usize, usize)>,
    pub scroll_top: usize,
    pub scroll_bottom: usize,
    pub dirty: &'a mut BTreeSet<usize>,
    /// Set when `CSI 8 ; rows ; cols t` changed the size.
    pub resized: bool,
}

/// Resize a grid in place, keeping the top-left content.
pub(super) fn resize_grid(grid: &mut Vec<Vec<char>>, cols: usize, rows: usize) {
    grid.resize_with(rows, Vec::new);
    for line in grid.iter_mut() {
        line.resize(cols, ' ');
    }
}

impl TerminalPerformer<'_> {
    fn put(&mut self, c: char) {
        if self.cursor.col >= self.width {
            self.cursor.col = 0;
            self.linefeed();
        }

        if let Some(cell) = self
            .grid
            .get_mut(self.cursor.row)
            .and_then(|row| row.get_mut(self.cursor.col))
        {
            *cell = c;
            self.dirty.insert(self.cursor.row);
        }

        self.cursor.col += 1;
    }

    fn linefeed(&mut self) {
        if self.cursor.row == self.scroll_bottom {
            self.scroll_up(1);
        } else if self.cursor.row + 1 < self.height {
            self.cursor.row += 1;
        }
    }

    fn reverse_index(&mut self) {
        if self.cursor.row == self.scroll_top {
            self.scroll_down(1);
        } else {
            self.cursor.row = self.cursor.row.saturating_sub(1);
        }
    }

    fn scroll_up(&mut self, n: usize) {
        for _ in 0..n.min(self.region_height()) {
            self.grid.remove(self.scroll_top);
            self.grid.insert(self.scroll_bottom, vec![' '; self.width]);
        }
        self.dirty.extend(self.scroll_top..=self.scroll_bottom);
    }

    fn scroll_down(&mut self, n: usize) {
        for _ in 0..n.min(self.region_height()) {
            self.grid.remove(self.scroll_bottom);
            self.grid.insert(self.scroll_top, vec![' '; self.width]);
        }
        self.dirty.extend(self.scroll_top..=self.scroll_bottom);
    }

    fn region_height(&self) -> usize {
        self.scroll_bottom + 1 - self.scroll_top
    }

    fn clear_cells(&mut self, row: usize, cols: std::ops::Range<usize>) {
        if let Some(line) = self.grid.get_mut(row) {
            let end = cols.end.min(line.len());
            let start = cols.start.min(end);
            line[start..end].fill(' ');
            self.dirty.insert(row);
        }
    }

    fn erase_in_display(&mut self, mode: u16) {
        let (row, col) = (self.cursor.row, self.cursor.col);
        match mode {
            0 => {
                self.clear_cells(row, col..self.width);
                for r in row + 1..self.height {
                    self.clear_cells(r, 0..self.width);
                }
            }
            1 => {
                for r in 0..row {
                    self.clear_cells(r, 0..self.width);
                }
                self.clear_cells(row, 0..col + 1);
            }
            2 | 3 => {
                for r in 0..self.height {
                    self.clear_cells(r, 0..self.width);
                }
            }
            _ => {}
        }
    }

    fn erase_in_line(&mut self, mode: u16) {
        let (row, col) = (self.cursor.row, self.cursor.col);
        match mode {
            0 => self.clear_cells(row, col..self.width),
            1 => self.clear_cells(row, 0..col + 1),
            2 => self.clear_cells(row, 0..self.width),
            _ => {}
        }
    }

    fn insert_lines(&mut self, n: usize) {
        let row = self.cursor.row;
        if row < self.scroll_top || row > self.scroll_bottom {
            return;
        }
        for _ in 0..n.min(self.scroll_bottom + 1 - row) {
            self.grid.remove(self.scroll_bottom);
            self.grid.insert(row, vec![' '; self.width]);
        }
        self.dirty.extend(row..=self.scroll_bottom);
    }

    fn delete_lines(&mut self, n: usize) {
        let row = self.cursor.row;
        if row < self.scroll_top || row > self.scroll_bottom {
            return;
        }
        for _ in 0..n.min(self.scroll_bottom + 1 - row) {
            self.grid.remove(row);
            self.grid.insert(self.scroll_bottom, vec![' '; self.width]);
        }
        self.dirty.extend(row..=self.scroll_bottom);
    }

    fn shift_chars(&mut self, n: usize, insert: bool) {
        let (row, col) = (self.cursor.row, self.cursor.col.min(self.width));
        let Some(line) = self.grid.get_mut(row) else {
            return;
        };

        let n = n.min(self.width - col);
        if insert {
            line[col..].rotate_right(n);
            line[col..col + n].fill(' ');
        } else {
            line[col..].rotate_left(n);
            let len = line.len();
            line[len - n..].fill(' ');
        }
        self.dirty.insert(row);
    }

    /// `ESC c`: clear everything and home the cursor.
    fn full_reset(&mut self) {
        for line in self.grid.iter_mut() {
            line.fill(' ');
        }
        *self.cursor = Cursor::default();
        *self.saved_cursor = None;
        self.scroll_top = 0;
        self.scroll_bottom = self.height - 1;
        self.dirty.extend(0..self.height);
    }

    fn resize(&mut self, cols: usize, rows: usize) {
        let (cols, rows) = (cols.max(1), rows.max(1));
        if (cols, rows) == (self.width, self.height) {
            return;
        }

        resize_grid(self.grid, cols, rows);
        self.width = cols;
        self.height = rows;
        self.scroll_top = 0;
        self.scroll_bottom = rows - 1;
        self.move_to(self.cursor.row, self.cursor.col);
        self.dirty.retain(|&row| row < rows);
        self.resized = true;
    }

    fn move_to(&mut self, row: usize, col: usize) {
        self.cursor.row = row.min(self.height.saturating_sub(1));
        self.cursor.col = col.min(self.width.saturating_sub(1));
    }
}

/// First value of the `idx`th parameter, with 0 meaning "use the default".
fn param(params: &Params, idx: usize, default: u16) -> u16 {
    match params.iter().nth(idx).and_then(|p| p.first().copied()) {
        Some(0) | None => default,
        Some(value) => value,
    }
}

impl Perform for TerminalPerformer<'_> {
    fn print(&mut self, c: char) {
        self.put(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' | 0x0b | 0x0c => self.linefeed(),
            b'\r' => self.cursor.col = 0,
            0x08 => self.cursor.col = self.cursor.col.min(self.width).saturating_sub(1),
            b'\t' => {
                let next = (self.cursor.col / 8 + 1) * 8;
                self.cursor.col = next.min(self.width.saturating_sub(1));
            }
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], ignore: bool, action: char) {
        if ignore {
            return;
        }

        if intermediates.first() == Some(&b'?') {
            if params.iter().any(|p| p.first() == Some(&25)) {
                match action {
                    'h' => self.cursor.visible = true,
                    'l' => self.cursor.visible = false,
                    _ => {}
                }
            }
            return;
        }

        let n = param(params, 0, 1) as usize;
        let (row, col) = (self.cursor.row, self.cursor.col);

        match action {
            'A' => self.move_to(row.saturating_sub(n).max(self.scroll_top.min(row)), col),
            'B' | 'e' => self.move_to(row + n, col),
            'C' | 'a' => self.move_to(row, col + n),
            'D' => self.move_to(row, col.saturating_sub(n)),
            'E' => self.move_to(row + n, 0),
            'F' => self.move_to(row.saturating_sub(n), 0),
            'G' | '`' => self.move_to(row, n - 1),
            'd' => self.move_to(n - 1, col),
            'H' | 'f' => {
                let r = param(params, 0, 1) as usize;
                let c = param(params, 1, 1) as usize;
                self.move_to(r - 1, c - 1);
            }
            'J' => self.erase_in_display(params.iter().next().and_then(|p| p.first().copied()).unwrap_or(0)),
            'K' => self.erase_in_line(params.iter().next().and_then(|p| p.first().copied()).unwrap_or(0)),
            'L' => self.insert_lines(n),
            'M' => self.delete_lines(n),
            '@' => self.shift_chars(n, true),
            'P' => self.shift_chars(n, false),
            'X' => self.clear_cells(row, col..col + n),
            'S' => self.scroll_up(n),
            'T' => self.scroll_down(n),
            'r' => {
                let top = param(params, 0, 1) as usize - 1;
                let bottom = (param(params, 1, self.height as u16) as usize).min(self.height) - 1;
                if top < bottom {
                    self.scroll_top = top;
                    self.scroll_bottom = bottom;
                    self.move_to(0, 0);
                }
            }
            's' => *self.saved_cursor = Some((row, col)),
            'u' => {
                if let Some((r, c)) = *self.saved_cursor {
                    self.move_to(r, c);
                }
            }
            't' if param(params, 0, 0) == 8 => {
                let rows = param(params, 1, self.height as u16) as usize;
                let cols = param(params, 2, self.width as u16) as usize;
                self.resize(cols, rows);
            }
            _ => {}
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], ignore: bool, byte: u8) {
        if ignore || !intermediates.is_empty() {
            return;
        }

        match byte {
            b'c' => self.full_reset(),
            b'7' => *self.saved_cursor = Some((self.cursor.row, self.cursor.col)),
            b'8' => {
                if let Some((r, c)) = *self.saved_cursor {
                    self.move_to(r, c);
                }
            }
            b'D' => self.linefeed(),
            b'E' => {
                self.cursor.col = 0;
                self.linefeed();
            }
            b'M' => self.reverse_index(),
            _ => {}
        }
    }
}

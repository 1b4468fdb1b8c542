//! Terminal data types.
//!
//! - Changes: what a feed did to the screen
//! - Cursor: cursor position and visibility

use std::collections::BTreeSet;

/// Screen delta produced by one feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changes {
    /// Indices of lines whose content changed.
    pub lines: BTreeSet<usize>,
    /// Whether the feed resized the terminal (e.g. `CSI 8 ; rows ; cols t`).
    pub resized: bool,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && !self.resized
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub col: usize,
    pub row: usize,
    pub visible: bool,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            col: 0,
            row: 0,
            visible: true,
        }
    }
}

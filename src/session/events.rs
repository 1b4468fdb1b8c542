use std::collections::BTreeSet;

use crate::recording::Marker;

/// Notifications broadcast to session subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// The driver was initialized; size is what the terminal now uses.
    Init {
        cols: u16,
        rows: u16,
        duration: Option<f64>,
        markers: Vec<Marker>,
    },
    /// A play command was accepted, before the driver starts.
    Play,
    Playing,
    /// Stopped without a reason (initialized, or seeked after the end).
    Stopped,
    Pause,
    Ended,
    Loading,
    Offline {
        message: Option<String>,
    },
    Errored {
        message: Option<String>,
    },
    /// The terminal was recreated at a new size.
    Reset {
        cols: u16,
        rows: u16,
    },
    Seeked,
    Resize {
        cols: u16,
        rows: u16,
    },
    Input {
        data: String,
    },
    Marker {
        index: usize,
        time: f64,
        label: String,
    },
    /// Lines touched by the last feed.
    TerminalUpdate {
        lines: BTreeSet<usize>,
    },
}

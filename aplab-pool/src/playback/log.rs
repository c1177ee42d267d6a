//! Playback log
//!
//! Append-only record of play attempts, one entry per attempt, with the
//! offset from run start. Cleared only by a reset.

use aplab_common::time::format_elapsed;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use super::pool::slot_name;

/// What happened to a play attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntryOutcome {
    Played,
    Blocked { reason: String },
    /// The slot had no playback resource
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackLogEntry {
    pub position: usize,
    pub slot_index: usize,
    /// Logical label (`#<position+1>`)
    pub content_label: String,
    /// Label of the base item bound to the slot
    pub source_label: String,
    pub src_was_changed: bool,
    pub outcome: EntryOutcome,
    /// Milliseconds since run start
    pub elapsed_ms: u64,
}

impl PlaybackLogEntry {
    pub fn is_blocked(&self) -> bool {
        matches!(self.outcome, EntryOutcome::Blocked { .. })
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }
}

impl fmt::Display for PlaybackLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} → Pool {} ({})",
            format_elapsed(self.elapsed()),
            self.content_label,
            slot_name(self.slot_index),
            self.source_label
        )?;
        match &self.outcome {
            EntryOutcome::Played if self.src_was_changed => write!(f, " src changed"),
            EntryOutcome::Played => Ok(()),
            EntryOutcome::Blocked { reason } => write!(f, " ✗ blocked: {}", reason),
            EntryOutcome::Unavailable => write!(f, " ✗ no playback resource"),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct PlaybackLog {
    entries: Vec<PlaybackLogEntry>,
}

impl PlaybackLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: PlaybackLogEntry) {
        self.entries.push(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[PlaybackLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&PlaybackLogEntry> {
        self.entries.last()
    }
}

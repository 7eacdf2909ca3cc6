//! The on-screen console: an append-only, newest-first event log.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Neutral progress message.
    Info,
    /// Something the player did was rejected or failed.
    Error,
    /// An order (or the whole game) was completed.
    Success,
    /// Chef advice: hints and nudges.
    Advisory,
}

/// A single console line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique within the session.
    pub id: u64,
    /// When the entry was appended.
    pub timestamp: DateTime<Utc>,
    /// Entry category.
    pub kind: EventKind,
    /// Text shown to the player.
    pub message: String,
}

/// Newest-first event log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
    next_id: u64,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepends a new entry and returns a copy of it.
    pub fn append(&mut self, kind: EventKind, message: impl Into<String>) -> LogEntry {
        self.next_id += 1;
        let entry = LogEntry {
            id: self.next_id,
            timestamp: Utc::now(),
            kind,
            message: message.into(),
        };
        self.entries.push_front(entry.clone());
        entry
    }

    /// Removes every entry. Ids keep increasing afterwards.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterates newest first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// The most recent error entry, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&LogEntry> {
        self.entries.iter().find(|e| e.kind == EventKind::Error)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the log has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

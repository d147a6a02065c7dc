//! The scrolling console log.

use std::collections::VecDeque;

use chrono::{DateTime, Local};

/// What produced a log line; drives its styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    /// Echo of a submitted command line.
    Command,
    /// Server output (call results, G-code responses).
    Response,
    Error,
    /// Client-internal messages (connect/disconnect, /about, ...).
    Internal,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub kind: LogKind,
    pub at: DateTime<Local>,
    pub text: String,
}

impl LogEntry {
    pub fn new(kind: LogKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            at: Local::now(),
            text: text.into(),
        }
    }

    pub fn command(text: impl Into<String>) -> Self {
        Self::new(LogKind::Command, text)
    }

    pub fn response(text: impl Into<String>) -> Self {
        Self::new(LogKind::Response, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(LogKind::Error, text)
    }

    pub fn internal(text: impl Into<String>) -> Self {
        Self::new(LogKind::Internal, text)
    }
}

/// Bounded scrollback. `offset` counts entries up from the bottom; pushing
/// while scrolled keeps the view anchored to what the user is reading.
pub struct OutputLog {
    entries: VecDeque<LogEntry>,
    max_entries: usize,
    offset: usize,
}

impl OutputLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries,
            offset: 0,
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        // A response line may span multiple lines (e.g. pretty-printed
        // JSON); keep one entry per line so scrolling stays line-accurate.
        for line in entry.text.split('\n') {
            if self.entries.len() == self.max_entries {
                let _ = self.entries.pop_front();
                self.offset = self.offset.saturating_sub(1);
            }
            self.entries.push_back(LogEntry {
                kind: entry.kind,
                at: entry.at,
                text: line.to_string(),
            });
            if self.offset > 0 {
                self.offset += 1;
            }
        }
        self.offset = self.offset.min(self.entries.len());
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.offset = (self.offset + lines).min(self.entries.len());
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.offset = self.offset.saturating_sub(lines);
    }

    pub fn scroll_to_end(&mut self) {
        self.offset = 0;
    }

    /// The most recent `height` entries above the scroll offset, oldest
    /// first.
    pub fn visible(&self, height: usize) -> impl Iterator<Item = &LogEntry> {
        let end = self.entries.len().saturating_sub(self.offset);
        let start = end.saturating_sub(height);
        self.entries.range(start..end)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

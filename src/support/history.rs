//! Audit history
//!
//! Fixed-capacity ring buffer of human-readable lines describing every
//! message exchanged with the CSMS and every local lifecycle step.

use std::collections::VecDeque;

use chrono::Utc;
use parking_lot::Mutex;

/// Number of lines kept before the oldest is evicted.
pub const HISTORY_CAPACITY: usize = 50;

#[derive(Debug)]
pub struct History {
    entries: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl History {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    /// At least one line is always kept.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append a line, prefixed with the current UTC timestamp.
    pub fn record(&self, line: impl AsRef<str>) {
        let entry = format!("[{}] {}", Utc::now().to_rfc3339(), line.as_ref());
        let mut entries = self.entries.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Outbound message (`>>`).
    pub fn sent(&self, message: impl AsRef<str>) {
        self.record(format!(">> {}", message.as_ref()));
    }

    /// Inbound message (`<<`).
    pub fn received(&self, message: impl AsRef<str>) {
        self.record(format!("<< {}", message.as_ref()));
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Entries containing `term`, case-insensitively.
    pub fn filtered(&self, term: &str) -> Vec<String> {
        let needle = term.to_lowercase();
        self.entries
            .lock()
            .iter()
            .filter(|e| e.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_first() {
        let history = History::with_capacity(3);
        for i in 0..5 {
            history.record(format!("line {}", i));
        }
        let entries = history.entries();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].ends_with("line 2"));
        assert!(entries[2].ends_with("line 4"));
    }

    #[test]
    fn zero_capacity_keeps_only_latest() {
        let history = History::with_capacity(0);
        for i in 0..10 {
            history.record(format!("line {}", i));
        }
        assert_eq!(history.len(), 1);
        assert!(history.entries()[0].ends_with("line 9"));
    }

    #[test]
    fn default_capacity_is_fifty() {
        let history = History::new();
        for i in 0..60 {
            history.sent(format!("Heartbeat {}", i));
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);
    }

    #[test]
    fn direction_markers_and_filter() {
        let history = History::new();
        history.sent("Heartbeat");
        history.received("RequestStartTransaction");
        assert!(history.entries()[0].contains(">> Heartbeat"));
        assert!(history.entries()[1].contains("<< RequestStartTransaction"));

        let hits = history.filtered("requeststart");
        assert_eq!(hits.len(), 1);
    }
}

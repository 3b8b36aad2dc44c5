// ── Operator log feed ──
//
// Bounded FIFO of `LogEntry`. Every entry is mirrored to `tracing` at
// the matching level so the feed and the process log never disagree.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{error, info, warn};

use crate::model::{LogEntry, Severity};

pub(crate) struct LogFeed {
    entries: Mutex<VecDeque<Arc<LogEntry>>>,
    capacity: usize,
}

impl LogFeed {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    /// Append an entry, evicting the oldest once full.
    pub(crate) fn push(&self, severity: Severity, message: impl Into<String>) -> Arc<LogEntry> {
        let entry = Arc::new(LogEntry::new(severity, message));
        match severity {
            Severity::Info | Severity::Success => {
                info!(target: "obsdeck::feed", severity = %severity, "{}", entry.message);
            }
            Severity::Warning => warn!(target: "obsdeck::feed", "{}", entry.message),
            Severity::Error => error!(target: "obsdeck::feed", "{}", entry.message),
        }

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(Arc::clone(&entry));
        entry
    }

    /// Oldest-first copy of the retained entries.
    pub(crate) fn history(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| LogEntry::clone(e))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_most_recent_entries_oldest_first() {
        let feed = LogFeed::new(50);
        for n in 0..73 {
            feed.push(Severity::Info, format!("entry {n}"));
        }
        let history = feed.history();
        assert_eq!(history.len(), 50);
        assert_eq!(history[0].message, "entry 23");
        assert_eq!(history[49].message, "entry 72");
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn under_capacity_keeps_everything() {
        let feed = LogFeed::new(50);
        feed.push(Severity::Warning, "one");
        feed.push(Severity::Error, "two");
        let history = feed.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].severity, Severity::Error);
    }
}

//! Run log collection
//!
//! Stages report progress through a [`LogSink`]. The orchestrator keeps one
//! buffer per run so logs can be fetched while the run is still executing.

use hoist_core::domain::log::{LogEntry, LogLevel};
use hoist_core::domain::run::StageKind;
use std::sync::{Arc, Mutex};

/// Receiver for run log entries
pub trait LogSink: Send + Sync {
    fn add_entry(&self, entry: LogEntry);

    fn info(&self, stage: Option<StageKind>, message: String) {
        self.add_entry(LogEntry::new(LogLevel::Info, stage, message));
    }

    fn warn(&self, stage: Option<StageKind>, message: String) {
        self.add_entry(LogEntry::new(LogLevel::Warning, stage, message));
    }

    fn error(&self, stage: Option<StageKind>, message: String) {
        self.add_entry(LogEntry::new(LogLevel::Error, stage, message));
    }
}

/// In-memory log buffer
///
/// Clones share the same underlying buffer.
#[derive(Clone, Default)]
pub struct InMemoryLogBuffer {
    buffer: Arc<Mutex<Vec<LogEntry>>>,
}

impl InMemoryLogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every entry collected so far
    pub fn snapshot(&self) -> Vec<LogEntry> {
        match self.buffer.lock() {
            Ok(buffer) => buffer.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Removes and returns every entry
    pub fn drain(&self) -> Vec<LogEntry> {
        match self.buffer.lock() {
            Ok(mut buffer) => buffer.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        }
    }
}

impl LogSink for InMemoryLogBuffer {
    fn add_entry(&self, entry: LogEntry) {
        match self.buffer.lock() {
            Ok(mut buffer) => buffer.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_keeps_entries() {
        let buffer = InMemoryLogBuffer::new();
        buffer.info(Some(StageKind::Fetch), "cloning".to_string());
        buffer.error(None, "boom".to_string());

        let entries = buffer.snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].stage, Some(StageKind::Fetch));
        assert_eq!(entries[1].level, LogLevel::Error);
        assert_eq!(buffer.snapshot().len(), 2);
    }

    #[test]
    fn test_drain_empties_buffer() {
        let buffer = InMemoryLogBuffer::new();
        let shared = buffer.clone();
        shared.warn(None, "slow host".to_string());

        assert_eq!(buffer.drain().len(), 1);
        assert!(shared.snapshot().is_empty());
    }
}

// Activity Log Storage Abstraction
//
// Defines the contract for where activity entries live. The terminal
// only ships an in-memory store; sessions are not persisted.

use super::{LogEntry, LogError, Sequence};

/// Storage backend for the activity log.
///
/// Properties required from implementations:
/// - Append-only
/// - Ordered
/// - Gap-free sequence numbers starting at 1
///
/// Implementations MUST NOT:
/// - Reorder entries
/// - Mutate or drop existing entries
pub trait LogStore: Send + Sync {
    /// Append an entry.
    ///
    /// Implementations must enforce:
    /// - entry.id == current_sequence + 1
    fn append(&mut self, entry: &LogEntry) -> Result<(), LogError>;

    /// Load all entries, oldest first.
    fn load(&self) -> Result<Vec<LogEntry>, LogError>;

    /// Sequence of the last stored entry, 0 when empty.
    fn current_sequence(&self) -> Result<Sequence, LogError>;
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryLogStore {
    entries: Vec<LogEntry>,
}

impl LogStore for InMemoryLogStore {
    fn append(&mut self, entry: &LogEntry) -> Result<(), LogError> {
        let expected = self.entries.last().map(|e| e.id + 1).unwrap_or(1);

        if entry.id != expected {
            return Err(LogError::SequenceConflict {
                expected,
                actual: entry.id,
            });
        }

        self.entries.push(entry.clone());
        Ok(())
    }

    fn load(&self) -> Result<Vec<LogEntry>, LogError> {
        Ok(self.entries.clone())
    }

    fn current_sequence(&self) -> Result<Sequence, LogError> {
        Ok(self.entries.last().map(|e| e.id).unwrap_or(0))
    }
}

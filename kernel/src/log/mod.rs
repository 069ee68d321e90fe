use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod store;

pub use store::{InMemoryLogStore, LogStore};

/// Position of an entry in the activity log.
pub type Sequence = u64;

/// Subject recorded for events not tied to a vehicle.
pub const SYSTEM_SUBJECT: &str = "SYSTEM";

/// Subject recorded for image uploads, before a plate is read.
pub const UPLOAD_SUBJECT: &str = "IMAGE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogAction {
    Demo,
    Scan,
    Upload,
    ScanRejected,
    EntrySuccess,
    EntryFailed,
    GateClosed,
    ExitScan,
    ExitFailed,
    Payment,
    PaymentFailed,
    ExitComplete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Sequence,
    pub timestamp: DateTime<Utc>,
    pub action: LogAction,
    /// Plate as presented, or a sentinel subject.
    pub plate: String,
    pub details: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LogError {
    #[error("sequence conflict: expected {expected}, got {actual}")]
    SequenceConflict { expected: Sequence, actual: Sequence },

    #[error("log storage failure: {0}")]
    Storage(String),
}

/// Append-only audit trail of everything the terminal did.
pub struct ActivityLog {
    store: Box<dyn LogStore>,
}

impl std::fmt::Debug for ActivityLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityLog").finish_non_exhaustive()
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(InMemoryLogStore::default())
    }
}

impl ActivityLog {
    pub fn new<S: LogStore + 'static>(store: S) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    /// Append a new entry and return its sequence number.
    pub fn record(
        &mut self,
        timestamp: DateTime<Utc>,
        action: LogAction,
        plate: impl Into<String>,
        details: impl Into<String>,
    ) -> Result<Sequence, LogError> {
        let id = self.store.current_sequence()? + 1;

        self.store.append(&LogEntry {
            id,
            timestamp,
            action,
            plate: plate.into(),
            details: details.into(),
        })?;

        Ok(id)
    }

    /// Entries in the order they were written.
    pub fn replay(&self) -> Result<Vec<LogEntry>, LogError> {
        self.store.load()
    }

    /// Entries newest first, the order the dashboard shows them.
    pub fn newest_first(&self) -> Result<Vec<LogEntry>, LogError> {
        let mut entries = self.store.load()?;
        entries.reverse();
        Ok(entries)
    }

    pub fn current_sequence(&self) -> Result<Sequence, LogError> {
        self.store.current_sequence()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_read_back() {
        let now = Utc::now();
        let mut log = ActivityLog::default();

        log.record(now, LogAction::EntrySuccess, "B1234ABC", "entrance gate opened")
            .unwrap();
        log.record(now, LogAction::GateClosed, "B1234ABC", "entrance gate closed")
            .unwrap();

        let oldest: Vec<_> = log.replay().unwrap();
        assert_eq!(oldest.len(), 2);
        assert_eq!(oldest[0].id, 1);
        assert_eq!(oldest[1].id, 2);

        let newest = log.newest_first().unwrap();
        assert_eq!(newest[0].action, LogAction::GateClosed);
        assert_eq!(log.current_sequence().unwrap(), 2);
    }

    #[test]
    fn actions_serialize_in_screaming_case() {
        let json = serde_json::to_string(&LogAction::ExitComplete).unwrap();
        assert_eq!(json, "\"EXIT_COMPLETE\"");
    }
}

// Occupancy Replay
//
// Rebuilds which plates are inside the lot purely from the activity log,
// as an audit cross-check against the vehicle records.

use std::collections::BTreeSet;

use crate::log::{LogAction, LogEntry, Sequence};

/// Errors that can occur during replay.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReplayError {
    #[error("entry #{sequence}: {plate} entered while already inside")]
    DoubleEntry { sequence: Sequence, plate: String },

    #[error("entry #{sequence}: {plate} exited without entering")]
    ExitWithoutEntry { sequence: Sequence, plate: String },
}

/// Replay entries (oldest first) and return the plates still inside.
pub fn replay_occupancy<'a>(
    entries: impl IntoIterator<Item = &'a LogEntry>,
) -> Result<BTreeSet<String>, ReplayError> {
    let mut inside = BTreeSet::new();

    for entry in entries {
        match entry.action {
            LogAction::EntrySuccess => {
                if !inside.insert(entry.plate.clone()) {
                    return Err(ReplayError::DoubleEntry {
                        sequence: entry.id,
                        plate: entry.plate.clone(),
                    });
                }
            }
            LogAction::ExitComplete => {
                if !inside.remove(&entry.plate) {
                    return Err(ReplayError::ExitWithoutEntry {
                        sequence: entry.id,
                        plate: entry.plate.clone(),
                    });
                }
            }
            // Everything else is informational.
            _ => {}
        }
    }

    Ok(inside)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(id: Sequence, action: LogAction, plate: &str) -> LogEntry {
        LogEntry {
            id,
            timestamp: Utc::now(),
            action,
            plate: plate.into(),
            details: String::new(),
        }
    }

    #[test]
    fn replay_tracks_entries_and_exits() {
        let log = vec![
            entry(1, LogAction::EntrySuccess, "B1234ABC"),
            entry(2, LogAction::EntrySuccess, "D5678XYZ"),
            entry(3, LogAction::GateClosed, "D5678XYZ"),
            entry(4, LogAction::ExitComplete, "B1234ABC"),
        ];

        let inside = replay_occupancy(&log).unwrap();
        assert_eq!(inside.into_iter().collect::<Vec<_>>(), vec!["D5678XYZ"]);
    }

    #[test]
    fn replay_fails_on_exit_without_entry() {
        let log = vec![entry(1, LogAction::ExitComplete, "B1234ABC")];

        let err = replay_occupancy(&log).unwrap_err();
        assert_eq!(
            err,
            ReplayError::ExitWithoutEntry {
                sequence: 1,
                plate: "B1234ABC".into()
            }
        );
    }

    #[test]
    fn failed_entries_do_not_count() {
        let log = vec![
            entry(1, LogAction::EntryFailed, "12345"),
            entry(2, LogAction::EntrySuccess, "B1234ABC"),
            entry(3, LogAction::EntryFailed, "B1234ABC"),
        ];

        assert_eq!(replay_occupancy(&log).unwrap().len(), 1);
    }
}

// Deferred Task Scheduler
//
// Holds fire-and-forget continuations keyed by due time. Nothing runs
// on its own: the owner asks for due tasks with the current time, so
// time advancement is fully deterministic.

use chrono::{DateTime, Duration, Utc};

/// A delay pushed a deadline past the representable range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("deadline {delay} after {from} is out of range")]
pub struct DeadlineOverflow {
    pub from: DateTime<Utc>,
    pub delay: Duration,
}

/// `from + delay`, or an error instead of a panic when it overflows.
pub fn deadline(
    from: DateTime<Utc>,
    delay: Duration,
) -> Result<DateTime<Utc>, DeadlineOverflow> {
    from.checked_add_signed(delay).ok_or(DeadlineOverflow { from, delay })
}

#[derive(Debug, Clone)]
struct Scheduled<T> {
    due: DateTime<Utc>,
    seq: u64,
    task: T,
}

/// Timed task queue ordered by (due time, insertion order).
#[derive(Debug, Clone)]
pub struct Scheduler<T> {
    tasks: Vec<Scheduled<T>>,
    next_seq: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn schedule_at(&mut self, due: DateTime<Utc>, task: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.tasks.push(Scheduled { due, seq, task });
    }

    /// Remove and return every task due at or before `now`, earliest first.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<T> {
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.tasks.drain(..).partition(|s| s.due <= now);
        self.tasks = pending;

        due.sort_by_key(|s| (s.due, s.seq));
        due.into_iter().map(|s| s.task).collect()
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.tasks.iter().map(|s| s.due).min()
    }

    pub fn any(&self, mut pred: impl FnMut(&T) -> bool) -> bool {
        self.tasks.iter().any(|s| pred(&s.task))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

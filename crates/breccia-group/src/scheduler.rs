//! Logical-time scheduling of delayed callbacks.
//!
//! Schedule commands do not fire inline: the handler validates membership,
//! wraps the commit in a [`DelayedTask`], and hands it to the [`Executor`].
//! Tasks come back to the state machine through
//! [`MembershipGroup::advance_time`](crate::group::MembershipGroup::advance_time)
//! and fire as ordinary transitions on the state machine thread.
//!
//! # Determinism
//!
//! Wall-clock time never enters this module. [`LogicalExecutor`] orders
//! tasks by (fire time, submission sequence), so two replicas that advance
//! logical time through the same points fire the same tasks in the same
//! order. Tasks scheduled for the same instant fire in submission order.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

use crate::commit::Commit;

/// A Schedule commit waiting for its logical fire time.
///
/// The task owns the commit: dropping an unfired task (executor teardown,
/// group deletion) releases the log entry, and firing transfers the commit
/// back to the state machine, which closes it after the callback is
/// delivered or skipped.
#[derive(Debug)]
pub struct DelayedTask {
    commit: Commit,
}

impl DelayedTask {
    pub(crate) fn new(commit: Commit) -> Self {
        Self { commit }
    }

    pub(crate) fn into_commit(self) -> Commit {
        self.commit
    }
}

/// Error returned when the executor refuses a delayed task.
///
/// The refused task is dropped by the executor, which releases its commit.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct ScheduleError {
    reason: String,
}

impl ScheduleError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// The delayed-execution seam between the group and its runtime.
///
/// Implementations must invoke tasks deterministically in log-time order;
/// [`LogicalExecutor`] is the reference implementation.
pub trait Executor {
    /// Registers a task to fire after `delay` of logical time.
    fn schedule(&mut self, delay: Duration, task: DelayedTask) -> Result<(), ScheduleError>;

    /// Advances logical time to `now` and removes every task that became
    /// due, in deterministic fire order.
    fn take_due(&mut self, now: Duration) -> Vec<DelayedTask>;

    /// Removes all pending tasks, due or not.
    fn drain(&mut self) -> Vec<DelayedTask>;

    /// Number of tasks still waiting.
    fn pending(&self) -> usize;
}

/// Deterministic logical-time executor backed by a min-heap.
#[derive(Default)]
pub struct LogicalExecutor {
    now: Duration,
    queue: BinaryHeap<Reverse<QueueEntry>>,
    next_seq: u64,
}

struct QueueEntry {
    fire_at: Duration,
    seq: u64,
    task: DelayedTask,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.seq == other.seq
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Fire time first, submission order as the tie-break.
        self.fire_at
            .cmp(&other.fire_at)
            .then(self.seq.cmp(&other.seq))
    }
}

impl LogicalExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current logical time.
    pub fn now(&self) -> Duration {
        self.now
    }
}

impl Executor for LogicalExecutor {
    fn schedule(&mut self, delay: Duration, task: DelayedTask) -> Result<(), ScheduleError> {
        let seq = self.next_seq;
        self.next_seq += 1;

        self.queue.push(Reverse(QueueEntry {
            fire_at: self.now + delay,
            seq,
            task,
        }));

        Ok(())
    }

    fn take_due(&mut self, now: Duration) -> Vec<DelayedTask> {
        // Logical time never rewinds.
        self.now = self.now.max(now);

        let mut due = Vec::new();
        while self
            .queue
            .peek()
            .is_some_and(|Reverse(entry)| entry.fire_at <= self.now)
        {
            if let Some(Reverse(entry)) = self.queue.pop() {
                due.push(entry.task);
            }
        }

        due
    }

    fn drain(&mut self) -> Vec<DelayedTask> {
        let mut entries: Vec<QueueEntry> =
            std::mem::take(&mut self.queue).into_iter().map(|Reverse(e)| e).collect();
        entries.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then(a.seq.cmp(&b.seq)));
        entries.into_iter().map(|e| e.task).collect()
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}

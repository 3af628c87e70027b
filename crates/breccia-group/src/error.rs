//! Errors surfaced by the membership group.

use breccia_types::MemberId;

/// Errors that can occur when applying a command to the group.
///
/// A failed command never mutates state, and its commit is always closed
/// before the error reaches the log runtime.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupError {
    /// Send, Execute, or Schedule referenced a member that is not in the
    /// group.
    #[error("unknown member: {0}")]
    UnknownMember(MemberId),

    /// The executor refused a delayed task.
    #[error("schedule rejected: {0}")]
    ScheduleRejected(String),

    /// The group was deleted; no further commands are applied.
    #[error("group deleted")]
    Deleted,

    /// An unexpected condition inside a handler. The log runtime treats this
    /// as fatal for the state machine instance.
    #[error("internal group failure: {0}")]
    Internal(String),
}

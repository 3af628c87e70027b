//! # breccia-types: Core types for `breccia`
//!
//! This crate contains shared types used across the `breccia` system:
//! - Entity IDs ([`MemberId`], [`SessionId`], [`LogIndex`])
//! - Leadership epochs ([`Term`])
//! - Session lifecycle ([`SessionState`])
//!
//! All IDs are cheap 8-byte `Copy` values. A member's identity is the log
//! index of the Join commit that created it, so [`MemberId`] and [`LogIndex`]
//! convert into each other without loss.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

// ============================================================================
// Entity IDs - All Copy (cheap 8-byte values)
// ============================================================================

/// Total-order position of a committed entry in the replicated log.
///
/// Indices are assigned by consensus, are unique per entry, and increase
/// monotonically for the lifetime of the log.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct LogIndex(u64);

impl LogIndex {
    pub const ZERO: LogIndex = LogIndex(0);

    pub fn new(index: u64) -> Self {
        Self(index)
    }

    /// Returns the index as a `u64`.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the index following this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for LogIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for LogIndex {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<LogIndex> for u64 {
    fn from(index: LogIndex) -> Self {
        index.0
    }
}

/// Unique identifier for a group member.
///
/// A member's ID is the log index of the Join commit that created it, which
/// makes IDs unique and monotonically increasing for the lifetime of the
/// group.
///
/// # Examples
///
/// ```
/// # use breccia_types::{LogIndex, MemberId};
/// let member = MemberId::from_index(LogIndex::new(7));
/// assert_eq!(member.as_u64(), 7);
/// assert_eq!(LogIndex::from(member), LogIndex::new(7));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId(u64);

impl MemberId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Creates a member ID from the log index of its Join commit.
    pub fn from_index(index: LogIndex) -> Self {
        Self(index.as_u64())
    }

    /// Returns the member ID as a `u64`.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "member#{}", self.0)
    }
}

impl From<u64> for MemberId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<MemberId> for u64 {
    fn from(id: MemberId) -> Self {
        id.0
    }
}

impl From<LogIndex> for MemberId {
    fn from(index: LogIndex) -> Self {
        Self(index.as_u64())
    }
}

impl From<MemberId> for LogIndex {
    fn from(id: MemberId) -> Self {
        LogIndex::new(id.0)
    }
}

/// Unique identifier for a client session of the replicated log.
///
/// Sessions are created by the log runtime; the state machine only ever
/// observes their stable IDs. Event publication iterates sessions in
/// ascending ID order so that every replica publishes in the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the session ID as a `u64`.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

impl From<u64> for SessionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<SessionId> for u64 {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

// ============================================================================
// Leadership Term
// ============================================================================

/// Monotonically non-decreasing leadership epoch.
///
/// The term is set to the log index of the transition that established it,
/// so observing a term tells you exactly where in the log the current
/// leadership began.
///
/// # Examples
///
/// ```
/// # use breccia_types::{LogIndex, Term};
/// let term = Term::at(LogIndex::new(42));
/// assert_eq!(term.as_u64(), 42);
/// assert!(!term.is_zero());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Term(u64);

impl Term {
    pub const ZERO: Term = Term(0);

    pub fn new(term: u64) -> Self {
        Self(term)
    }

    /// Creates the term established at the given log index.
    pub fn at(index: LogIndex) -> Self {
        Self(index.as_u64())
    }

    /// Returns the term as a `u64`.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns true if no term has been established yet.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Term {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Term> for u64 {
    fn from(term: Term) -> Self {
        term.0
    }
}

// ============================================================================
// Session State
// ============================================================================

/// Lifecycle state of a client session, as reported by the log runtime.
///
/// Events are only published to sessions whose state is [`SessionState::Open`].
/// The state machine treats `Closed` and `Expired` identically when tearing
/// down a session's members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Session is connected and may receive events.
    Open,
    /// Session closed normally.
    Closed,
    /// Session was expired by the log runtime (missed heartbeats).
    Expired,
}

impl SessionState {
    /// Returns true if the session may receive published events.
    pub fn is_open(&self) -> bool {
        matches!(self, SessionState::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_id_round_trips_through_log_index() {
        let index = LogIndex::new(17);
        let member = MemberId::from_index(index);

        assert_eq!(member.as_u64(), 17);
        assert_eq!(LogIndex::from(member), index);
    }

    #[test]
    fn term_tracks_establishing_index() {
        assert!(Term::ZERO.is_zero());
        assert_eq!(Term::default(), Term::ZERO);

        let term = Term::at(LogIndex::new(9));
        assert!(!term.is_zero());
        assert_eq!(term.as_u64(), 9);
        assert!(term > Term::ZERO);
    }

    #[test]
    fn log_index_next_increments() {
        assert_eq!(LogIndex::ZERO.next(), LogIndex::new(1));
        assert_eq!(LogIndex::new(41).next().as_u64(), 42);
    }

    #[test]
    fn session_state_openness() {
        assert!(SessionState::Open.is_open());
        assert!(!SessionState::Closed.is_open());
        assert!(!SessionState::Expired.is_open());
    }

    #[test]
    fn ids_display_with_kind_prefix() {
        assert_eq!(MemberId::new(3).to_string(), "member#3");
        assert_eq!(SessionId::new(5).to_string(), "session#5");
        assert_eq!(LogIndex::new(8).to_string(), "8");
    }
}

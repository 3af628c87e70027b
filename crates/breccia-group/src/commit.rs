//! Committed log entries and their release bookkeeping.
//!
//! Every decision of the replicated log reaches the state machine as a
//! [`Commit`]: the operation payload, its total-order index, and the session
//! that submitted it. The log retains the underlying entry until the state
//! machine releases the handle, so the group must release every commit
//! exactly once: either right away (queries, rejected commands) or when the
//! state the commit backs is torn down (Leave, RemoveProperty, delete).
//!
//! # Ownership
//!
//! A `Commit` is a uniquely-owned resource. [`Commit::close`] consumes the
//! handle, and release happens in `Drop`, so a double release is
//! unrepresentable and an early error path cannot leak the entry. What CAN
//! go wrong is retention past the owning state's lifetime; the
//! [`CommitRegistry`] live set exists so tests can pin that down.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};

use breccia_types::{LogIndex, SessionId};

use crate::command::Command;
use crate::session::SessionRef;

/// Tracks which log entries are still retained by the state machine.
///
/// The log runtime mints one [`Commit`] per committed entry via
/// [`CommitRegistry::mint`]; the entry stays in the live set until the
/// handle is dropped. Reclamation of the underlying log entry is the log's
/// business; the registry only does the counting.
///
/// Single-threaded by contract (strict serial application), hence
/// `Rc<RefCell<..>>`.
#[derive(Clone, Default)]
pub struct CommitRegistry {
    inner: Rc<RefCell<RegistryInner>>,
}

#[derive(Default)]
struct RegistryInner {
    live: BTreeSet<LogIndex>,
    minted: u64,
    released: u64,
}

impl CommitRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints the commit for a newly committed log entry.
    ///
    /// Indices come from consensus: unique and monotonically increasing.
    pub fn mint(&self, index: LogIndex, session: SessionRef, operation: Command) -> Commit {
        let mut inner = self.inner.borrow_mut();
        let fresh = inner.live.insert(index);
        debug_assert!(fresh, "log index {index} minted twice");
        inner.minted += 1;

        Commit {
            index,
            session,
            operation,
            release: ReleaseGuard {
                registry: Rc::downgrade(&self.inner),
                index,
            },
        }
    }

    /// Number of commits currently retained somewhere in the state machine.
    pub fn live_count(&self) -> usize {
        self.inner.borrow().live.len()
    }

    /// Returns true if the entry at `index` has not been released yet.
    pub fn is_live(&self, index: LogIndex) -> bool {
        self.inner.borrow().live.contains(&index)
    }

    /// Total commits minted over the registry's lifetime.
    pub fn minted(&self) -> u64 {
        self.inner.borrow().minted
    }

    /// Total commits released over the registry's lifetime.
    pub fn released(&self) -> u64 {
        self.inner.borrow().released
    }
}

/// A committed log entry handed to the state machine.
///
/// Holds the operation, the total-order log index, and a handle to the
/// submitting session. The entry is released back to the log when the
/// commit is dropped; [`Commit::close`] makes that release explicit at the
/// call sites the lifecycle rules name.
pub struct Commit {
    index: LogIndex,
    session: SessionRef,
    operation: Command,
    release: ReleaseGuard,
}

impl Commit {
    /// The total-order index of this entry. For a Join commit this is also
    /// the member ID it creates.
    pub fn index(&self) -> LogIndex {
        self.index
    }

    /// The session that submitted the operation.
    pub fn session(&self) -> &SessionRef {
        &self.session
    }

    /// ID of the submitting session.
    pub fn session_id(&self) -> SessionId {
        self.session.id()
    }

    /// The operation payload.
    pub fn operation(&self) -> &Command {
        &self.operation
    }

    /// Releases the underlying log entry.
    ///
    /// Consuming `self` makes release-exactly-once a property of the type:
    /// a closed commit cannot be closed again, and a commit that goes out of
    /// scope on an error path releases on drop.
    pub fn close(self) {
        // Release happens in ReleaseGuard::drop.
    }
}

impl std::fmt::Debug for Commit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Commit")
            .field("index", &self.index)
            .field("session", &self.session.id())
            .field("operation", &self.operation)
            .finish()
    }
}

struct ReleaseGuard {
    registry: Weak<RefCell<RegistryInner>>,
    index: LogIndex,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            let mut inner = inner.borrow_mut();
            let was_live = inner.live.remove(&self.index);
            debug_assert!(was_live, "log index {} released twice", self.index);
            inner.released += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use breccia_types::{SessionId, SessionState};

    use super::*;
    use crate::event::GroupEvent;
    use crate::session::Session;

    struct NullSession {
        id: SessionId,
        state: Cell<SessionState>,
    }

    impl Session for NullSession {
        fn id(&self) -> SessionId {
            self.id
        }

        fn state(&self) -> SessionState {
            self.state.get()
        }

        fn publish(&self, _event: GroupEvent) {}
    }

    fn session(id: u64) -> SessionRef {
        Rc::new(NullSession {
            id: SessionId::new(id),
            state: Cell::new(SessionState::Open),
        })
    }

    #[test]
    fn minted_commits_are_live_until_closed() {
        let registry = CommitRegistry::new();
        let commit = registry.mint(LogIndex::new(1), session(1), Command::join());

        assert_eq!(registry.live_count(), 1);
        assert!(registry.is_live(LogIndex::new(1)));

        commit.close();

        assert_eq!(registry.live_count(), 0);
        assert!(!registry.is_live(LogIndex::new(1)));
        assert_eq!(registry.minted(), 1);
        assert_eq!(registry.released(), 1);
    }

    #[test]
    fn dropping_a_commit_releases_it() {
        let registry = CommitRegistry::new();
        {
            let _commit = registry.mint(LogIndex::new(7), session(1), Command::listen());
            assert_eq!(registry.live_count(), 1);
        }
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn commits_outlive_the_registry_handle() {
        let registry = CommitRegistry::new();
        let commit = registry.mint(LogIndex::new(3), session(2), Command::join());

        let clone = registry.clone();
        drop(registry);

        // The clone still observes the release.
        commit.close();
        assert_eq!(clone.live_count(), 0);
        assert_eq!(clone.released(), 1);
    }

    #[test]
    fn commit_exposes_entry_fields() {
        let registry = CommitRegistry::new();
        let commit = registry.mint(
            LogIndex::new(9),
            session(4),
            Command::leave(breccia_types::MemberId::new(2)),
        );

        assert_eq!(commit.index(), LogIndex::new(9));
        assert_eq!(commit.session_id(), SessionId::new(4));
        assert_eq!(commit.operation().kind(), "leave");
    }
}

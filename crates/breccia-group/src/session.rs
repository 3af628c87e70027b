//! Client sessions and the listener set.
//!
//! Sessions are owned by the log runtime; the group only holds handles to
//! them. The [`Session`] trait is the seam between the two: the group calls
//! `publish` and reads `state`, nothing else.
//!
//! # Determinism
//!
//! The source of truth for event ordering is [`SessionSet`]: broadcast
//! publication iterates sessions in ascending session-ID order, so every
//! replica publishes the same events to the same sessions in the same order.

use std::collections::BTreeMap;
use std::rc::Rc;

use breccia_types::{SessionId, SessionState};

use crate::event::GroupEvent;

/// A client session of the replicated log.
///
/// Implementations are provided by the log runtime (or a test harness).
/// `publish` must not block: delivery is a hand-off into the session's
/// outbound queue.
pub trait Session {
    /// Stable identifier of this session.
    fn id(&self) -> SessionId;

    /// Current lifecycle state as reported by the log runtime.
    fn state(&self) -> SessionState;

    /// Queues an event for delivery to this session's client.
    fn publish(&self, event: GroupEvent);
}

/// Shared handle to a session.
///
/// The state machine is strictly single-threaded (one command at a time, in
/// log order), so `Rc` is sufficient.
pub type SessionRef = Rc<dyn Session>;

/// The set of listener sessions, keyed by session ID.
///
/// A session enters the set via Listen and stays until it closes or the
/// group is deleted.
#[derive(Default)]
pub(crate) struct SessionSet {
    sessions: BTreeMap<SessionId, SessionRef>,
}

impl SessionSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a session to the listener set. Re-listening is a no-op.
    pub(crate) fn insert(&mut self, session: SessionRef) {
        self.sessions.insert(session.id(), session);
    }

    /// Removes a session from the listener set.
    pub(crate) fn remove(&mut self, id: SessionId) -> Option<SessionRef> {
        self.sessions.remove(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Publishes an event to every open listener, in ascending session-ID
    /// order.
    pub(crate) fn publish_open(&self, event: &GroupEvent) {
        for session in self.sessions.values() {
            if session.state().is_open() {
                session.publish(event.clone());
            }
        }
    }

    /// Calls `f` for every open listener, in ascending session-ID order.
    ///
    /// Used where several events must be delivered per session before moving
    /// to the next session.
    pub(crate) fn for_each_open(&self, mut f: impl FnMut(&SessionRef)) {
        for session in self.sessions.values() {
            if session.state().is_open() {
                f(session);
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.sessions.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use breccia_types::MemberId;

    struct ProbeSession {
        id: SessionId,
        state: Cell<SessionState>,
        received: RefCell<Vec<GroupEvent>>,
    }

    impl Session for ProbeSession {
        fn id(&self) -> SessionId {
            self.id
        }

        fn state(&self) -> SessionState {
            self.state.get()
        }

        fn publish(&self, event: GroupEvent) {
            self.received.borrow_mut().push(event);
        }
    }

    fn probe(id: u64) -> Rc<ProbeSession> {
        Rc::new(ProbeSession {
            id: SessionId::new(id),
            state: Cell::new(SessionState::Open),
            received: RefCell::new(Vec::new()),
        })
    }

    #[test]
    fn publish_skips_non_open_sessions() {
        let mut set = SessionSet::new();
        let open = probe(1);
        let closed = probe(2);
        closed.state.set(SessionState::Closed);

        set.insert(open.clone());
        set.insert(closed.clone());

        set.publish_open(&GroupEvent::Join {
            member: MemberId::new(3),
        });

        assert_eq!(open.received.borrow().len(), 1);
        assert!(closed.received.borrow().is_empty());
    }

    #[test]
    fn for_each_open_visits_in_ascending_id_order() {
        let mut set = SessionSet::new();
        let c = probe(30);
        let a = probe(10);
        let b = probe(20);

        // Insertion order deliberately scrambled.
        set.insert(c);
        set.insert(a);
        set.insert(b);

        let mut visited = Vec::new();
        set.for_each_open(|session| visited.push(session.id().as_u64()));

        assert_eq!(visited, [10, 20, 30]);
    }

    #[test]
    fn relisten_is_a_no_op() {
        let mut set = SessionSet::new();
        let session = probe(1);

        set.insert(session.clone());
        set.insert(session);

        assert_eq!(set.len(), 1);
    }
}

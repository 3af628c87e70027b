//! # breccia-sim: Deterministic replay harness for the group core
//!
//! Stands in for the replicated log runtime in tests and simulation: mints
//! commits at monotonically increasing indices, applies them in order,
//! drives session lifecycle and logical time, and records every event each
//! session receives.
//!
//! Replica divergence is the bug class this crate exists to catch: a
//! [`Script`] is pure data, so the same script can be replayed against as
//! many fresh state machines as needed and the results compared: both the
//! observable indices (via [`GroupState::state_hash`]) and the per-session
//! event sequences.
//!
//! [`GroupState::state_hash`]: breccia_group::GroupState::state_hash

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use breccia_group::{
    Command, CommitRegistry, GroupError, GroupEvent, MembershipGroup, Reply, Session, SessionRef,
};
use breccia_types::{LogIndex, SessionId, SessionState};

// ============================================================================
// RecordingSession
// ============================================================================

/// A session that records every event published to it.
pub struct RecordingSession {
    id: SessionId,
    state: Cell<SessionState>,
    events: RefCell<Vec<GroupEvent>>,
}

impl RecordingSession {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            state: Cell::new(SessionState::Open),
            events: RefCell::new(Vec::new()),
        }
    }

    /// Everything published to this session so far, in delivery order.
    pub fn events(&self) -> Vec<GroupEvent> {
        self.events.borrow().clone()
    }

    /// Event wire names, in delivery order.
    pub fn event_names(&self) -> Vec<&'static str> {
        self.events.borrow().iter().map(GroupEvent::name).collect()
    }

    pub fn set_state(&self, state: SessionState) {
        self.state.set(state);
    }
}

impl Session for RecordingSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn state(&self) -> SessionState {
        self.state.get()
    }

    fn publish(&self, event: GroupEvent) {
        self.events.borrow_mut().push(event);
    }
}

// ============================================================================
// LogDriver
// ============================================================================

/// Drives one state machine the way the log runtime would.
///
/// Indices start at 1 and advance by one per submitted command or lifecycle
/// transition. [`LogDriver::skip_to`] models the gaps a shared log produces
/// when other resources' entries interleave.
pub struct LogDriver {
    registry: CommitRegistry,
    group: MembershipGroup,
    sessions: BTreeMap<SessionId, Rc<RecordingSession>>,
    next_index: LogIndex,
    now: Duration,
}

impl Default for LogDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl LogDriver {
    pub fn new() -> Self {
        Self {
            registry: CommitRegistry::new(),
            group: MembershipGroup::new(),
            sessions: BTreeMap::new(),
            next_index: LogIndex::new(1),
            now: Duration::ZERO,
        }
    }

    /// Returns the session with the given ID, creating it open if needed.
    pub fn session(&mut self, id: u64) -> Rc<RecordingSession> {
        self.sessions
            .entry(SessionId::new(id))
            .or_insert_with(|| Rc::new(RecordingSession::new(SessionId::new(id))))
            .clone()
    }

    /// Jumps the next log index forward (entries of other resources sharing
    /// the log). Never rewinds.
    pub fn skip_to(&mut self, index: u64) {
        self.next_index = self.next_index.max(LogIndex::new(index));
    }

    fn take_index(&mut self) -> LogIndex {
        let index = self.next_index;
        self.next_index = index.next();
        index
    }

    /// Commits one command from a session and applies it.
    pub fn submit(&mut self, session: u64, command: Command) -> Result<Reply, GroupError> {
        let handle: SessionRef = self.session(session);
        let index = self.take_index();
        let commit = self.registry.mint(index, handle, command);
        self.group.apply(commit)
    }

    /// Closes a session and delivers the lifecycle transition.
    pub fn close_session(&mut self, session: u64) {
        let handle = self.session(session);
        handle.set_state(SessionState::Closed);
        let index = self.take_index();
        self.group.on_session_close(handle.id(), index);
    }

    /// Expires a session and delivers the lifecycle transition.
    pub fn expire_session(&mut self, session: u64) {
        let handle = self.session(session);
        handle.set_state(SessionState::Expired);
        let index = self.take_index();
        self.group.on_session_expire(handle.id(), index);
    }

    /// Advances logical time by `delay`, firing due callbacks.
    pub fn advance_time(&mut self, delay: Duration) {
        self.now += delay;
        self.group.advance_time(self.now);
    }

    /// Destroys the group.
    pub fn delete(&mut self) {
        self.group.delete();
    }

    pub fn group(&self) -> &MembershipGroup {
        &self.group
    }

    pub fn registry(&self) -> &CommitRegistry {
        &self.registry
    }

    /// Events received by a session so far (empty if never seen).
    pub fn events_for(&self, session: u64) -> Vec<GroupEvent> {
        self.sessions
            .get(&SessionId::new(session))
            .map(|s| s.events())
            .unwrap_or_default()
    }
}

// ============================================================================
// Scripted replay
// ============================================================================

/// One step of a replayable run. Pure data: no handles, no clocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Commit one command from a session.
    Submit { session: u64, command: Command },
    /// Close a session.
    CloseSession { session: u64 },
    /// Expire a session.
    ExpireSession { session: u64 },
    /// Advance logical time by the given delay.
    AdvanceTime { millis: u64 },
}

/// A replayable run.
pub type Script = Vec<Step>;

/// Replays a script against a fresh state machine.
///
/// Command errors (unknown members and the like) are part of the replicated
/// behavior, not harness failures, so they are swallowed here; assertions
/// belong to the caller.
pub fn replay(script: &[Step]) -> LogDriver {
    let mut driver = LogDriver::new();
    for step in script {
        match step {
            Step::Submit { session, command } => {
                let _ = driver.submit(*session, command.clone());
            }
            Step::CloseSession { session } => driver.close_session(*session),
            Step::ExpireSession { session } => driver.expire_session(*session),
            Step::AdvanceTime { millis } => driver.advance_time(Duration::from_millis(*millis)),
        }
    }
    driver
}

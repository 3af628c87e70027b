//! The membership group state machine.
//!
//! [`MembershipGroup::apply`] is invoked once per committed log entry, in
//! strict log order, and is the only place state changes. Session lifecycle
//! notifications ([`MembershipGroup::on_session_close`] /
//! [`MembershipGroup::on_session_expire`]) and delayed-task firing
//! ([`MembershipGroup::advance_time`]) are transitions of the same machine,
//! driven by the same thread.
//!
//! # Commit lifecycle
//!
//! Every handler either retains its commit in an index (Join, SetProperty)
//! or releases it before returning. Error paths release by construction:
//! a commit that goes out of scope on `?` or early return is released on
//! drop (see [`crate::commit`]).
//!
//! # Event ordering
//!
//! Within one transition: `Resign` precedes `Term` precedes `Elect`, and
//! member-removal events follow the election bookkeeping they caused.
//! Broadcasts iterate listeners in ascending session-ID order.

use std::time::Duration;

use breccia_types::{LogIndex, MemberId, SessionId, Term};
use bytes::Bytes;

use crate::command::{Command, Reply};
use crate::commit::Commit;
use crate::error::GroupError;
use crate::event::GroupEvent;
use crate::scheduler::{DelayedTask, Executor, LogicalExecutor};
use crate::session::{SessionRef, SessionSet};
use crate::state::GroupState;

/// The deterministic core of the group coordination primitive.
///
/// Generic over its [`Executor`] so tests and simulation drive logical time
/// explicitly while a production runtime can plug in its own timer source.
pub struct MembershipGroup<E: Executor = LogicalExecutor> {
    state: GroupState,
    listeners: SessionSet,
    executor: E,
    /// Log index of the transition currently being applied; terms are
    /// assigned from it.
    applying: LogIndex,
    deleted: bool,
}

impl MembershipGroup<LogicalExecutor> {
    /// Creates a group driven by the deterministic logical-time executor.
    pub fn new() -> Self {
        Self::with_executor(LogicalExecutor::new())
    }
}

impl Default for MembershipGroup<LogicalExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Executor> MembershipGroup<E> {
    /// Creates a group with the given executor.
    pub fn with_executor(executor: E) -> Self {
        Self {
            state: GroupState::new(),
            listeners: SessionSet::new(),
            executor,
            applying: LogIndex::ZERO,
            deleted: false,
        }
    }

    /// Read-only view of the replicated indices.
    pub fn state(&self) -> &GroupState {
        &self.state
    }

    /// The executor holding pending delayed tasks.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Number of listener sessions.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    // ========================================================================
    // Command Dispatcher
    // ========================================================================

    /// Applies one committed log entry.
    ///
    /// # Errors
    ///
    /// [`GroupError::UnknownMember`] for Send/Execute/Schedule naming an
    /// absent member, [`GroupError::ScheduleRejected`] when the executor
    /// refuses a task, [`GroupError::Deleted`] after group deletion. Failed
    /// commands do not mutate state; their commit is released before the
    /// error propagates.
    pub fn apply(&mut self, commit: Commit) -> Result<Reply, GroupError> {
        if self.deleted {
            return Err(GroupError::Deleted);
        }

        debug_assert!(
            commit.index() > self.applying || self.applying == LogIndex::ZERO,
            "commits must arrive in log order"
        );
        self.applying = commit.index();
        tracing::trace!(index = %commit.index(), kind = commit.operation().kind(), "applying commit");

        match commit.operation().clone() {
            Command::Join => self.join(commit).map(Reply::MemberId),
            Command::Leave { member } => self.leave(commit, member).map(|()| Reply::None),
            Command::Listen => self.listen(commit).map(Reply::Members),
            Command::Resign { member } => self.resign(commit, member).map(|()| Reply::None),
            Command::SetProperty { member, name, .. } => {
                self.set_property(commit, member, name).map(|()| Reply::None)
            }
            Command::GetProperty { member, name } => {
                self.get_property(commit, member, &name).map(Reply::Property)
            }
            Command::RemoveProperty { member, name } => {
                self.remove_property(commit, member, &name).map(|()| Reply::None)
            }
            Command::Send {
                member,
                topic,
                message,
            } => self.send(commit, member, topic, message).map(|()| Reply::None),
            Command::Schedule {
                member, delay_ms, ..
            } => self.schedule(commit, member, delay_ms).map(|()| Reply::None),
            Command::Execute { member, callback } => {
                self.execute(commit, member, callback).map(|()| Reply::None)
            }
        }
    }

    // ========================================================================
    // Membership
    // ========================================================================

    fn join(&mut self, commit: Commit) -> Result<MemberId, GroupError> {
        let member = self.state.insert_member(commit);

        self.publish_all(GroupEvent::Join { member });

        if self.state.term().is_zero() {
            self.increment_term();
        }
        if self.state.leader().is_none() {
            self.elect_leader();
        }

        tracing::debug!(%member, "member joined");
        Ok(member)
    }

    fn leave(&mut self, commit: Commit, member: MemberId) -> Result<(), GroupError> {
        if let Some(exit) = self.state.evict_member(member) {
            for property in exit.properties {
                property.close();
            }

            if self.state.leader() == Some(member) {
                self.resign_leader(false);
                self.increment_term();
                self.elect_leader();
            }

            self.publish_all(GroupEvent::Leave { member });
            exit.join.close();
            tracing::debug!(%member, "member left");
        }

        commit.close();
        Ok(())
    }

    fn listen(&mut self, commit: Commit) -> Result<std::collections::BTreeSet<MemberId>, GroupError> {
        self.listeners.insert(commit.session().clone());
        let members = self.state.member_ids();
        commit.close();
        Ok(members)
    }

    fn resign(&mut self, commit: Commit, member: MemberId) -> Result<(), GroupError> {
        // Resigning a member that is not the current leader (or resigning
        // with no leader at all) is a no-op.
        if self.state.leader() == Some(member) {
            self.resign_leader(true);
            self.increment_term();
            self.elect_leader();
        }

        commit.close();
        Ok(())
    }

    // ========================================================================
    // Properties
    // ========================================================================

    fn set_property(
        &mut self,
        commit: Commit,
        member: MemberId,
        name: String,
    ) -> Result<(), GroupError> {
        // Properties are scoped to live members; a write for an absent
        // member would outlive any teardown path.
        if !self.state.contains_member(member) {
            commit.close();
            return Ok(());
        }

        if let Some(displaced) = self.state.set_property(member, name, commit) {
            displaced.close();
        }
        Ok(())
    }

    fn get_property(
        &mut self,
        commit: Commit,
        member: MemberId,
        name: &str,
    ) -> Result<Option<Bytes>, GroupError> {
        let value = self.state.property_value(member, name);
        commit.close();
        Ok(value)
    }

    fn remove_property(
        &mut self,
        commit: Commit,
        member: MemberId,
        name: &str,
    ) -> Result<(), GroupError> {
        if let Some(previous) = self.state.remove_property(member, name) {
            previous.close();
        }
        commit.close();
        Ok(())
    }

    // ========================================================================
    // Messaging & Execution
    // ========================================================================

    fn send(
        &mut self,
        commit: Commit,
        member: MemberId,
        topic: String,
        message: Bytes,
    ) -> Result<(), GroupError> {
        let Some(target) = self.state.member_session(member) else {
            return Err(GroupError::UnknownMember(member));
        };

        publish_to(
            target,
            GroupEvent::Message {
                sender: member,
                topic,
                payload: message,
            },
        );

        commit.close();
        Ok(())
    }

    fn execute(
        &mut self,
        commit: Commit,
        member: MemberId,
        callback: Bytes,
    ) -> Result<(), GroupError> {
        let Some(target) = self.state.member_session(member) else {
            return Err(GroupError::UnknownMember(member));
        };

        publish_to(target, GroupEvent::Execute { callback });

        commit.close();
        Ok(())
    }

    fn schedule(
        &mut self,
        commit: Commit,
        member: MemberId,
        delay_ms: u64,
    ) -> Result<(), GroupError> {
        if !self.state.contains_member(member) {
            return Err(GroupError::UnknownMember(member));
        }

        let delay = Duration::from_millis(delay_ms);
        self.executor
            .schedule(delay, DelayedTask::new(commit))
            .map_err(|err| GroupError::ScheduleRejected(err.to_string()))
    }

    /// Advances logical time and fires every task that became due, in
    /// deterministic order, on this thread.
    pub fn advance_time(&mut self, now: Duration) {
        for task in self.executor.take_due(now) {
            self.fire_delayed(task);
        }
    }

    fn fire_delayed(&mut self, task: DelayedTask) {
        let commit = task.into_commit();

        if let Command::Schedule {
            member, callback, ..
        } = commit.operation()
        {
            let member = *member;
            match self.state.member_session(member) {
                Some(target) => publish_to(
                    target,
                    GroupEvent::Execute {
                        callback: callback.clone(),
                    },
                ),
                // The member left between scheduling and firing; the
                // callback is skipped but the commit still closes.
                None => tracing::trace!(%member, "dropping callback for departed member"),
            }
        }

        commit.close();
    }

    // ========================================================================
    // Session Lifecycle
    // ========================================================================

    /// Handles a session closing normally.
    ///
    /// `index` is the log index of the lifecycle transition; a term change
    /// caused by the departure is assigned from it.
    pub fn on_session_close(&mut self, session: SessionId, index: LogIndex) {
        self.session_departed(session, index);
    }

    /// Handles a session expiry. Identical to a close: membership is bound
    /// to the session either way.
    pub fn on_session_expire(&mut self, session: SessionId, index: LogIndex) {
        self.session_departed(session, index);
    }

    /// Session registration hook; the group reacts to Listen, not to
    /// registration.
    pub fn on_session_register(&mut self, _session: &SessionRef) {}

    /// Session unregistration hook; teardown happens on close or expire.
    pub fn on_session_unregister(&mut self, _session: &SessionRef) {}

    fn session_departed(&mut self, session: SessionId, index: LogIndex) {
        if self.deleted {
            return;
        }

        self.applying = index;
        self.listeners.remove(session);

        let exits = self.state.evict_session_members(session);
        if exits.is_empty() {
            return;
        }

        let mut left = Vec::with_capacity(exits.len());
        let mut joins = Vec::with_capacity(exits.len());
        for exit in exits {
            for property in exit.properties {
                property.close();
            }
            left.push(exit.member);
            joins.push(exit.join);
        }

        tracing::debug!(%session, members = left.len(), "session departed");

        // Election runs only after every departing member is out of the
        // directory and the candidate queue.
        if let Some(leader) = self.state.leader() {
            if left.contains(&leader) {
                self.resign_leader(false);
                self.increment_term();
                self.elect_leader();
            }
        }

        self.listeners.for_each_open(|listener| {
            for member in &left {
                listener.publish(GroupEvent::Leave { member: *member });
            }
        });

        for join in joins {
            join.close();
        }
    }

    // ========================================================================
    // Leader Elector
    // ========================================================================

    fn increment_term(&mut self) {
        let term = Term::at(self.applying);
        self.state.set_term(term);
        self.publish_all(GroupEvent::Term { term });
    }

    fn resign_leader(&mut self, to_candidate: bool) {
        if let Some(leader) = self.state.leader() {
            self.publish_all(GroupEvent::Resign { member: leader });

            if to_candidate {
                self.state.push_candidate(leader);
            }
            self.state.set_leader(None);
            tracing::debug!(%leader, to_candidate, "leader resigned");
        }
    }

    fn elect_leader(&mut self) {
        if self.state.leader().is_some() {
            return;
        }

        if let Some(next) = self.state.pop_candidate() {
            self.state.set_leader(Some(next));
            self.publish_all(GroupEvent::Elect { member: next });
            tracing::debug!(leader = %next, term = %self.state.term(), "leader elected");
        }
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    /// Destroys the group: every retained commit is released, all indices
    /// are cleared, and no further commands are applied.
    pub fn delete(&mut self) {
        // Deletion cancels pending callbacks; only the release happens.
        for task in self.executor.drain() {
            task.into_commit().close();
        }

        for commit in self.state.drain_commits() {
            commit.close();
        }

        self.listeners.clear();
        self.deleted = true;
        tracing::debug!("group deleted");
    }

    fn publish_all(&self, event: GroupEvent) {
        self.listeners.publish_open(&event);
    }
}

fn publish_to(target: &SessionRef, event: GroupEvent) {
    if target.state().is_open() {
        target.publish(event);
    }
}

//! In-memory indices of the membership group.
//!
//! [`GroupState`] owns every retained commit: the member directory holds
//! Join commits, the property store holds SetProperty commits. Mutators
//! return displaced commits to the caller instead of closing them, so the
//! handler decides where release happens within its transition.
//!
//! All maps are `BTreeMap` and the candidate queue is a `VecDeque`: iteration
//! order is a replicated artifact here, not an implementation detail.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use breccia_types::{MemberId, SessionId, Term};
use bytes::Bytes;

use crate::command::Command;
use crate::commit::Commit;
use crate::session::SessionRef;

/// Everything a member leaves behind when it is removed.
///
/// The caller closes the property commits and, after election bookkeeping
/// and event publication, the Join commit.
pub(crate) struct MemberExit {
    pub(crate) member: MemberId,
    pub(crate) join: Commit,
    pub(crate) properties: Vec<Commit>,
}

/// The replicated indices: member directory, property store, candidate
/// queue, leader, and term.
#[derive(Default)]
pub struct GroupState {
    /// Member directory: member ID → the Join commit that created it.
    members: BTreeMap<MemberId, Commit>,
    /// Property store: member ID → property name → the SetProperty commit
    /// backing the stored value.
    properties: BTreeMap<MemberId, BTreeMap<String, Commit>>,
    /// FIFO election queue. Contains only current members, never the leader.
    candidates: VecDeque<MemberId>,
    /// The currently elected member, if any.
    leader: Option<MemberId>,
    /// Leadership epoch; equals the log index that established it.
    term: Term,
}

impl GroupState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Member Directory
    // ========================================================================

    /// Admits a member: the Join commit's index becomes its ID and the
    /// member is queued as an election candidate.
    pub(crate) fn insert_member(&mut self, join: Commit) -> MemberId {
        let member = MemberId::from_index(join.index());
        self.members.insert(member, join);
        self.candidates.push_back(member);
        member
    }

    /// Removes a member from the directory, its property sub-map, and the
    /// candidate queue, returning everything it owned.
    ///
    /// The leader slot is deliberately left untouched: resignation publishes
    /// the departing leader's ID, so the caller resigns after removal.
    pub(crate) fn evict_member(&mut self, member: MemberId) -> Option<MemberExit> {
        let join = self.members.remove(&member)?;

        let properties = self
            .properties
            .remove(&member)
            .map(|props| props.into_values().collect())
            .unwrap_or_default();

        self.candidates.retain(|candidate| *candidate != member);

        Some(MemberExit {
            member,
            join,
            properties,
        })
    }

    /// Removes every member owned by `session`, in ascending member-ID
    /// order.
    pub(crate) fn evict_session_members(&mut self, session: SessionId) -> Vec<MemberExit> {
        let departing: Vec<MemberId> = self
            .members
            .iter()
            .filter(|(_, join)| join.session_id() == session)
            .map(|(member, _)| *member)
            .collect();

        departing
            .into_iter()
            .filter_map(|member| self.evict_member(member))
            .collect()
    }

    pub fn contains_member(&self, member: MemberId) -> bool {
        self.members.contains_key(&member)
    }

    /// The session that owns a member's Join commit.
    pub(crate) fn member_session(&self, member: MemberId) -> Option<&SessionRef> {
        self.members.get(&member).map(Commit::session)
    }

    /// Snapshot of the current member IDs, ascending.
    pub fn member_ids(&self) -> BTreeSet<MemberId> {
        self.members.keys().copied().collect()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub(crate) fn members(&self) -> &BTreeMap<MemberId, Commit> {
        &self.members
    }

    // ========================================================================
    // Property Store
    // ========================================================================

    /// Stores a SetProperty commit, returning the commit it displaced.
    pub(crate) fn set_property(
        &mut self,
        member: MemberId,
        name: String,
        commit: Commit,
    ) -> Option<Commit> {
        self.properties
            .entry(member)
            .or_default()
            .insert(name, commit)
    }

    /// Reads the value stored for a member's property.
    pub fn property_value(&self, member: MemberId, name: &str) -> Option<Bytes> {
        let commit = self.properties.get(&member)?.get(name)?;
        match commit.operation() {
            Command::SetProperty { value, .. } => Some(value.clone()),
            _ => None,
        }
    }

    /// Removes a member's property, returning the stored commit. An emptied
    /// per-member sub-map is removed with it.
    pub(crate) fn remove_property(&mut self, member: MemberId, name: &str) -> Option<Commit> {
        let props = self.properties.get_mut(&member)?;
        let removed = props.remove(name);

        if props.is_empty() {
            self.properties.remove(&member);
        }

        removed
    }

    /// Names of a member's properties, ascending.
    pub fn property_names(&self, member: MemberId) -> Vec<String> {
        self.properties
            .get(&member)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn properties(&self) -> &BTreeMap<MemberId, BTreeMap<String, Commit>> {
        &self.properties
    }

    // ========================================================================
    // Candidate Queue & Leadership
    // ========================================================================

    /// Appends a member at the candidate tail.
    pub(crate) fn push_candidate(&mut self, member: MemberId) {
        self.candidates.push_back(member);
    }

    /// Pops the candidate head: the longest-waiting member.
    pub(crate) fn pop_candidate(&mut self) -> Option<MemberId> {
        self.candidates.pop_front()
    }

    /// Candidates in queue order (head first).
    pub fn candidate_order(&self) -> Vec<MemberId> {
        self.candidates.iter().copied().collect()
    }

    pub fn leader(&self) -> Option<MemberId> {
        self.leader
    }

    pub(crate) fn set_leader(&mut self, leader: Option<MemberId>) {
        self.leader = leader;
    }

    pub fn term(&self) -> Term {
        self.term
    }

    pub(crate) fn set_term(&mut self, term: Term) {
        debug_assert!(term >= self.term, "term went backwards: {} -> {}", self.term, term);
        self.term = term;
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Empties every index, returning all retained commits for release.
    pub(crate) fn drain_commits(&mut self) -> Vec<Commit> {
        let mut commits: Vec<Commit> = std::mem::take(&mut self.members).into_values().collect();

        for (_, props) in std::mem::take(&mut self.properties) {
            commits.extend(props.into_values());
        }

        self.candidates.clear();
        self.leader = None;

        commits
    }
}

//! Deterministic state hashing for the group indices.
//!
//! The hash is deterministic: same observable state → same hash. Replicas
//! applying the same command sequence can compare hashes instead of
//! structures.
//!
//! # Algorithm
//!
//! BLAKE3 over all replicated fields in a fixed order:
//! 1. Member count, then every member sorted by ID (ID, Join index, owning
//!    session ID)
//! 2. Property map (sorted by member ID, then property name; names and
//!    values are length-prefixed)
//! 3. Candidate queue, in queue order
//! 4. Leader (presence tag + ID)
//! 5. Term
//!
//! `BTreeMap` iteration is sorted and the candidate queue is a true FIFO,
//! so no extra ordering work is needed.

use blake3::Hasher;

use crate::command::Command;
use crate::state::GroupState;

impl GroupState {
    /// Computes a deterministic hash of the replicated group state.
    ///
    /// Two replicas that applied the same command sequence hold the same
    /// hash; any divergence in directory contents, property store,
    /// candidate order, leader, or term changes it.
    pub fn state_hash(&self) -> [u8; 32] {
        let mut hasher = Hasher::new();

        // Member directory
        hasher.update(&(self.member_count() as u64).to_le_bytes());
        for (member, join) in self.members() {
            hasher.update(&member.as_u64().to_le_bytes());
            hasher.update(&join.index().as_u64().to_le_bytes());
            hasher.update(&join.session_id().as_u64().to_le_bytes());
        }

        // Property store
        hasher.update(&(self.properties().len() as u64).to_le_bytes());
        for (member, props) in self.properties() {
            hasher.update(&member.as_u64().to_le_bytes());
            hasher.update(&(props.len() as u64).to_le_bytes());
            for (name, commit) in props {
                hasher.update(&(name.len() as u64).to_le_bytes());
                hasher.update(name.as_bytes());
                if let Command::SetProperty { value, .. } = commit.operation() {
                    hasher.update(&(value.len() as u64).to_le_bytes());
                    hasher.update(value);
                }
            }
        }

        // Candidate queue, in queue order
        let candidates = self.candidate_order();
        hasher.update(&(candidates.len() as u64).to_le_bytes());
        for candidate in candidates {
            hasher.update(&candidate.as_u64().to_le_bytes());
        }

        // Leader
        match self.leader() {
            Some(leader) => {
                hasher.update(&[1u8]);
                hasher.update(&leader.as_u64().to_le_bytes());
            }
            None => {
                hasher.update(&[0u8]);
            }
        }

        // Term
        hasher.update(&self.term().as_u64().to_le_bytes());

        *hasher.finalize().as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use breccia_types::{LogIndex, MemberId, SessionId, SessionState};

    use crate::command::Command;
    use crate::commit::CommitRegistry;
    use crate::event::GroupEvent;
    use crate::group::MembershipGroup;
    use crate::session::{Session, SessionRef};

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

    fn joined_group(indices: &[u64]) -> (MembershipGroup, CommitRegistry) {
        let registry = CommitRegistry::new();
        let mut group = MembershipGroup::new();
        for index in indices {
            group
                .apply(registry.mint(LogIndex::new(*index), session(1), Command::join()))
                .unwrap();
        }
        (group, registry)
    }

    #[test]
    fn empty_groups_hash_identically() {
        let group1 = MembershipGroup::new();
        let group2 = MembershipGroup::new();

        assert_eq!(group1.state().state_hash(), group2.state().state_hash());
    }

    #[test]
    fn same_joins_same_hash() {
        let (group1, _r1) = joined_group(&[2, 3, 5]);
        let (group2, _r2) = joined_group(&[2, 3, 5]);

        assert_eq!(group1.state().state_hash(), group2.state().state_hash());
    }

    #[test]
    fn membership_difference_changes_hash() {
        let (group1, _r1) = joined_group(&[2, 3]);
        let (group2, _r2) = joined_group(&[2, 4]);

        assert_ne!(group1.state().state_hash(), group2.state().state_hash());
    }

    #[test]
    fn property_value_changes_hash() {
        let (mut group, registry) = joined_group(&[2]);
        let before = group.state().state_hash();

        group
            .apply(registry.mint(
                LogIndex::new(3),
                session(1),
                Command::set_property(MemberId::new(2), "zone", "a"),
            ))
            .unwrap();

        assert_ne!(before, group.state().state_hash());
    }

    #[test]
    fn repeated_hashing_is_stable() {
        let (group, _registry) = joined_group(&[2, 3]);

        let hash1 = group.state().state_hash();
        let hash2 = group.state().state_hash();
        assert_eq!(hash1, hash2);
    }
}

//! # breccia-group: Deterministic membership group state machine
//!
//! The replicated core of `breccia`'s group coordination primitive. A group
//! is a named collection of member registrations contributed by client
//! sessions of a replicated log. The state machine tracks live members,
//! elects one leader per group, keeps per-member key/value properties,
//! routes direct messages, and schedules delayed callbacks, all as
//! deterministic transitions driven by committed log entries.
//!
//! ## Key Principles
//!
//! - **No IO, no clocks, no randomness**: time is logical
//!   ([`LogicalExecutor`]), IDs come from log indices, and every observable
//!   iteration runs in a fixed order. Replicas applying the same command
//!   sequence hold identical state (compare with
//!   [`GroupState::state_hash`]).
//! - **Strict serial application**: one command at a time, in log order,
//!   on one thread. This contract with the log runtime is what makes the
//!   `Rc`-based session and commit handles sound.
//! - **Commit conservation**: every retained log entry is released exactly
//!   once. The [`commit`] module makes the "exactly once" part a property
//!   of the type system.
//!
//! ## Architecture
//!
//! - [`command`]: operations applied to the group and their replies
//! - [`commit`]: committed-entry handles and release bookkeeping
//! - [`event`]: events published to sessions
//! - [`session`]: the session seam and the deterministic listener set
//! - [`state`]: member directory, property store, candidate queue
//! - [`group`]: the dispatcher, leader elector, and session lifecycle
//! - [`scheduler`]: logical-time delayed execution
//!
//! ## Example
//!
//! ```
//! use std::rc::Rc;
//!
//! use breccia_group::{Command, CommitRegistry, GroupEvent, MembershipGroup, Reply, Session};
//! use breccia_types::{LogIndex, SessionId, SessionState};
//!
//! struct Quiet(SessionId);
//!
//! impl Session for Quiet {
//!     fn id(&self) -> SessionId {
//!         self.0
//!     }
//!     fn state(&self) -> SessionState {
//!         SessionState::Open
//!     }
//!     fn publish(&self, _event: GroupEvent) {}
//! }
//!
//! let registry = CommitRegistry::new();
//! let session: Rc<dyn Session> = Rc::new(Quiet(SessionId::new(1)));
//!
//! let mut group = MembershipGroup::new();
//! let reply = group
//!     .apply(registry.mint(LogIndex::new(1), session, Command::join()))
//!     .unwrap();
//!
//! assert!(matches!(reply, Reply::MemberId(member) if member.as_u64() == 1));
//! assert_eq!(group.state().leader().map(|m| m.as_u64()), Some(1));
//! ```

pub mod command;
pub mod commit;
pub mod error;
pub mod event;
pub mod group;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod state_hash;


// Re-export commonly used items
pub use command::{Command, Reply};
pub use commit::{Commit, CommitRegistry};
pub use error::GroupError;
pub use event::GroupEvent;
pub use group::MembershipGroup;
pub use scheduler::{DelayedTask, Executor, LogicalExecutor, ScheduleError};
pub use session::{Session, SessionRef};
pub use state::GroupState;

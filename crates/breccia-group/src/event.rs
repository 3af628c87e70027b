//! Events published from the group to client sessions.
//!
//! The group is the only producer; sessions are the only consumers. Events
//! published during one command are delivered to each recipient session
//! before any events from a subsequent command.

use breccia_types::{MemberId, Term};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A named event published to a session.
///
/// Broadcast events (`Join`, `Leave`, `Elect`, `Resign`, `Term`) go to every
/// open listener in ascending session-ID order. Directed events (`Message`,
/// `Execute`) go to a single member's owning session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupEvent {
    /// A member entered the group.
    Join { member: MemberId },

    /// A member left the group.
    Leave { member: MemberId },

    /// A member became leader.
    Elect { member: MemberId },

    /// The leader stepped down.
    Resign { member: MemberId },

    /// A new leadership term was established.
    Term { term: Term },

    /// A direct message for one member.
    Message {
        sender: MemberId,
        topic: String,
        payload: Bytes,
    },

    /// A callback for one member to run.
    Execute { callback: Bytes },
}

impl GroupEvent {
    /// Returns the wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            GroupEvent::Join { .. } => "join",
            GroupEvent::Leave { .. } => "leave",
            GroupEvent::Elect { .. } => "elect",
            GroupEvent::Resign { .. } => "resign",
            GroupEvent::Term { .. } => "term",
            GroupEvent::Message { .. } => "message",
            GroupEvent::Execute { .. } => "execute",
        }
    }
}

//! Commands applied to the membership group, and their replies.
//!
//! Commands are submitted by clients, ordered by consensus, and delivered to
//! the state machine wrapped in a [`Commit`](crate::commit::Commit). Payloads
//! that the group does not interpret (property values, message bodies,
//! callbacks) stay opaque [`Bytes`].

use std::collections::BTreeSet;

use breccia_types::MemberId;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// An operation on the membership group.
///
/// One command is carried per committed log entry. The group dispatches on
/// the kind in [`MembershipGroup::apply`](crate::group::MembershipGroup::apply).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Register the submitting session as a group member.
    ///
    /// The new member's ID is the log index of this commit.
    Join,

    /// Remove a member from the group.
    Leave { member: MemberId },

    /// Subscribe the submitting session to group events.
    ///
    /// Replies with a snapshot of the current member IDs.
    Listen,

    /// Ask the named member to give up leadership.
    ///
    /// A no-op unless the named member is the current leader.
    Resign { member: MemberId },

    /// Bind a named property to a member, replacing any previous value.
    SetProperty {
        member: MemberId,
        name: String,
        value: Bytes,
    },

    /// Read a member's property.
    GetProperty { member: MemberId, name: String },

    /// Remove a member's property.
    RemoveProperty { member: MemberId, name: String },

    /// Deliver a direct message to a member's owning session.
    Send {
        member: MemberId,
        topic: String,
        message: Bytes,
    },

    /// Deliver a callback to a member's owning session after a logical delay.
    Schedule {
        member: MemberId,
        delay_ms: u64,
        callback: Bytes,
    },

    /// Deliver a callback to a member's owning session immediately.
    Execute { member: MemberId, callback: Bytes },
}

impl Command {
    /// Creates a Join command.
    pub fn join() -> Self {
        Command::Join
    }

    /// Creates a Leave command for the given member.
    pub fn leave(member: MemberId) -> Self {
        Command::Leave { member }
    }

    /// Creates a Listen command.
    pub fn listen() -> Self {
        Command::Listen
    }

    /// Creates a Resign command for the given member.
    pub fn resign(member: MemberId) -> Self {
        Command::Resign { member }
    }

    /// Creates a SetProperty command.
    pub fn set_property(
        member: MemberId,
        name: impl Into<String>,
        value: impl Into<Bytes>,
    ) -> Self {
        Command::SetProperty {
            member,
            name: name.into(),
            value: value.into(),
        }
    }

    /// Creates a GetProperty command.
    pub fn get_property(member: MemberId, name: impl Into<String>) -> Self {
        Command::GetProperty {
            member,
            name: name.into(),
        }
    }

    /// Creates a RemoveProperty command.
    pub fn remove_property(member: MemberId, name: impl Into<String>) -> Self {
        Command::RemoveProperty {
            member,
            name: name.into(),
        }
    }

    /// Creates a Send command.
    pub fn send(member: MemberId, topic: impl Into<String>, message: impl Into<Bytes>) -> Self {
        Command::Send {
            member,
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Creates a Schedule command.
    pub fn schedule(member: MemberId, delay_ms: u64, callback: impl Into<Bytes>) -> Self {
        Command::Schedule {
            member,
            delay_ms,
            callback: callback.into(),
        }
    }

    /// Creates an Execute command.
    pub fn execute(member: MemberId, callback: impl Into<Bytes>) -> Self {
        Command::Execute {
            member,
            callback: callback.into(),
        }
    }

    /// Returns the command kind as a static string, for tracing.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Join => "join",
            Command::Leave { .. } => "leave",
            Command::Listen => "listen",
            Command::Resign { .. } => "resign",
            Command::SetProperty { .. } => "set_property",
            Command::GetProperty { .. } => "get_property",
            Command::RemoveProperty { .. } => "remove_property",
            Command::Send { .. } => "send",
            Command::Schedule { .. } => "schedule",
            Command::Execute { .. } => "execute",
        }
    }
}

/// The per-command reply surfaced to the submitting client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    /// The command has no return value.
    None,

    /// The member ID assigned by a Join.
    MemberId(MemberId),

    /// The member snapshot returned by Listen.
    Members(BTreeSet<MemberId>),

    /// The value returned by GetProperty (`None` for absent member or key).
    Property(Option<Bytes>),
}

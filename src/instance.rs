//! Instance identity and the command payload carried through the log.
use std::collections::BTreeSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifies a consensus slot: the replica that opened it, and its position
/// in that replica's own column of the log. Each replica allocates its own
/// instance numbers monotonically, so no coordination is needed to open a
/// fresh instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Instance {
    pub leader_index: i32,
    pub instance_number: i32,
}

impl Instance {
    pub const fn new(leader_index: i32, instance_number: i32) -> Self {
        Self {
            leader_index,
            instance_number,
        }
    }
}

/// Address of a client, as far as this crate is concerned: an opaque,
/// comparable token supplied by the transport. Real wire addresses live
/// outside this crate.
pub type ClientAddress = u64;

/// Distinguishes repeated submissions from the same client session so at
/// most one of them is ever applied.
pub type ClientPseudonym = u64;

/// A command the state machine can run, or a no-op used to fill recovered
/// instances whose original command could not be recovered.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CommandOrNoop {
    Command(Command),
    Noop,
}

impl CommandOrNoop {
    pub fn is_noop(&self) -> bool {
        matches!(self, CommandOrNoop::Noop)
    }
}

/// A single client-submitted operation, opaque to everything but the state
/// machine that eventually applies `payload`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Command {
    pub client_address: ClientAddress,
    pub client_pseudonym: ClientPseudonym,
    pub client_id: u64,
    pub payload: Vec<u8>,
}

/// The triple a PreAccept/Accept/Commit carries: the command itself, its
/// interference sequence number, and the set of instances it depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CommandTriple {
    pub command: CommandOrNoop,
    pub seq: i32,
    pub deps: BTreeSet<Instance>,
}

impl CommandTriple {
    pub fn new(command: CommandOrNoop, seq: i32, deps: BTreeSet<Instance>) -> Self {
        Self { command, seq, deps }
    }
}

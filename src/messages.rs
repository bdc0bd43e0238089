//! Wire message types exchanged between replicas and between a replica and
//! its clients. The envelope (framing, address serialisation) is owned by
//! the transport; this crate only defines the payload shapes.
use std::collections::BTreeSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ballot::Ballot;
use crate::instance::{ClientAddress, ClientPseudonym, CommandOrNoop, Instance};

/// The vote this replica cast for an instance, as reported back in a
/// `PrepareOk` during recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VoteStatus {
    NotSeen,
    PreAccepted,
    Accepted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Message {
    PreAccept(PreAccept),
    PreAcceptOk(PreAcceptOk),
    Accept(Accept),
    AcceptOk(AcceptOk),
    Commit(Commit),
    Prepare(Prepare),
    PrepareOk(PrepareOk),
    Nack(Nack),
    ClientRequest(ClientRequest),
    ClientReply(ClientReply),
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PreAccept {
    pub instance: Instance,
    pub ballot: Ballot,
    pub command: CommandOrNoop,
    pub seq: i32,
    pub deps: BTreeSet<Instance>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PreAcceptOk {
    pub instance: Instance,
    pub ballot: Ballot,
    pub replica_index: i32,
    pub seq: i32,
    pub deps: BTreeSet<Instance>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Accept {
    pub instance: Instance,
    pub ballot: Ballot,
    pub command: CommandOrNoop,
    pub seq: i32,
    pub deps: BTreeSet<Instance>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AcceptOk {
    pub instance: Instance,
    pub ballot: Ballot,
    pub replica_index: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Commit {
    pub instance: Instance,
    pub command: CommandOrNoop,
    pub seq: i32,
    pub deps: BTreeSet<Instance>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Prepare {
    pub instance: Instance,
    pub ballot: Ballot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PrepareOk {
    pub instance: Instance,
    pub ballot: Ballot,
    pub replica_index: i32,
    pub vote_ballot: Ballot,
    pub status: VoteStatus,
    pub command: Option<CommandOrNoop>,
    pub seq: i32,
    pub deps: BTreeSet<Instance>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Nack {
    pub instance: Instance,
    pub largest_ballot: Ballot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClientRequest {
    pub client_address: ClientAddress,
    pub client_pseudonym: ClientPseudonym,
    pub client_id: u64,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClientReply {
    pub client_pseudonym: ClientPseudonym,
    pub client_id: u64,
    pub result: Vec<u8>,
}

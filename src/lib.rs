//! An Egalitarian Paxos replica core.
//!
//! This crate implements the consensus and execution machinery of an
//! EPaxos replica: the command log and its ballot/vote discipline, the
//! leader's fast- and slow-path logic, Paxos-style recovery, and the
//! dependency-graph executor that turns a set of committed instances into
//! a single deterministic application order. It does not own a network
//! transport, a durable log, or a state machine; those are supplied by the
//! embedding binary through the [`transport::Transport`] and
//! [`state_machine::StateMachine`] traits.
//!
//! [`replica::Replica`] is the single entry point: feed it client requests,
//! inbound peer messages, and timer ticks, and it drives everything else.
pub mod ballot;
pub mod config;
pub mod error;
pub mod executor;
pub mod instance;
pub mod interference;
pub mod leader;
pub mod log;
pub mod logging;
pub mod messages;
pub mod metrics;
pub mod quorum;
pub mod recovery;
pub mod replica;
pub mod state_machine;
pub mod timers;
pub mod transport;

pub use ballot::Ballot;
pub use config::ReplicaConfig;
pub use error::FatalError;
pub use instance::{ClientAddress, ClientPseudonym, Command, CommandOrNoop, CommandTriple, Instance};
pub use messages::Message;
pub use quorum::Quorum;
pub use replica::Replica;
pub use state_machine::StateMachine;
pub use transport::Transport;

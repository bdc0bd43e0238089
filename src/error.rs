//! Error taxonomy for the replica core.
//!
//! Protocol-invariant violations are not recoverable: they are logged at
//! `crit` and raised via [`FatalError`], whose only legal handling is to
//! abort the process.
use std::fmt;

/// Violations of a core invariant. These can only mean a bug in this crate or
/// in the transport/state-machine it was wired to; the only correct response
/// is to abort so an operator can restart with a recovery peer taking over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FatalError {
    /// A `Committed` entry was asked to move to anything other than `Executed`.
    CommittedEntryOverwritten {
        instance_leader: i32,
        instance_number: i32,
    },
    /// The executor's condensation DAG contained a cycle; the condensation of
    /// a graph's SCCs is acyclic by construction, so this can only mean the
    /// SCC computation itself is wrong.
    CondensationCycle,
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalError::CommittedEntryOverwritten {
                instance_leader,
                instance_number,
            } => write!(
                f,
                "invariant violated: committed entry overwritten for instance ({}, {})",
                instance_leader, instance_number
            ),
            FatalError::CondensationCycle => {
                write!(f, "invariant violated: cycle in executor condensation DAG")
            }
        }
    }
}

impl std::error::Error for FatalError {}

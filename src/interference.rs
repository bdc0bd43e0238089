//! Interference (conflict) oracle.
//!
//! The command log only needs one predicate from the state machine: does
//! command A interfere with command B, i.e. would applying them out of
//! relative order change the result. Everything else in the log layer is
//! mechanical once that predicate, and a running tally of (seq, deps) per
//! known instance, are available.
//!
//! Two oracles are provided. `ConflictsAll` is the conservative default: any
//! two non-noop commands interfere, which is always safe but serialises
//! everything through dependencies. `KeyedConflict` is for state machines
//! whose opaque payload happens to start with an extractable key; commands
//! only interfere if their key sets intersect.
use std::collections::BTreeSet;

use crate::instance::{CommandOrNoop, Instance};

/// A record of an already-known command's interference footprint, used to
/// extend a new command's own (seq, deps) against it.
#[derive(Debug, Clone)]
pub struct KnownCommand {
    pub instance: Instance,
    pub seq: i32,
    pub command: CommandOrNoop,
}

/// Decides whether two commands interfere with each other.
pub trait InterferenceOracle {
    fn interferes(&self, a: &CommandOrNoop, b: &CommandOrNoop) -> bool;

    /// Extends an incoming (seq, deps) proposal with this replica's local
    /// knowledge: union in every interfering known instance, and bump `seq`
    /// past all of theirs.
    fn extend(
        &self,
        command: &CommandOrNoop,
        proposed_seq: i32,
        proposed_deps: &BTreeSet<Instance>,
        known: &[KnownCommand],
    ) -> (i32, BTreeSet<Instance>) {
        let mut seq = proposed_seq;
        let mut deps = proposed_deps.clone();
        for other in known {
            if other.command.is_noop() || command.is_noop() {
                continue;
            }
            if self.interferes(command, &other.command) {
                deps.insert(other.instance);
                if other.seq >= seq {
                    seq = other.seq + 1;
                }
            }
        }
        (seq, deps)
    }
}

/// Every pair of non-noop commands interferes. Always safe; sacrifices the
/// parallelism EPaxos is designed to exploit.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictsAll;

impl InterferenceOracle for ConflictsAll {
    fn interferes(&self, a: &CommandOrNoop, b: &CommandOrNoop) -> bool {
        !a.is_noop() && !b.is_noop()
    }
}

/// Commands interfere only if a caller-supplied key extractor reports
/// overlapping key sets. `extract` must be deterministic and side-effect
/// free; it is called on every candidate pair.
pub struct KeyedConflict<F> {
    extract: F,
}

impl<F> KeyedConflict<F>
where
    F: Fn(&CommandOrNoop) -> BTreeSet<Vec<u8>>,
{
    pub fn new(extract: F) -> Self {
        Self { extract }
    }
}

impl<F> InterferenceOracle for KeyedConflict<F>
where
    F: Fn(&CommandOrNoop) -> BTreeSet<Vec<u8>>,
{
    fn interferes(&self, a: &CommandOrNoop, b: &CommandOrNoop) -> bool {
        if a.is_noop() || b.is_noop() {
            return false;
        }
        let keys_a = (self.extract)(a);
        let keys_b = (self.extract)(b);
        keys_a.intersection(&keys_b).next().is_some()
    }
}

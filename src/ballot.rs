//! Ballot algebra: a total order over proposer rounds.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A proposer round, ordered lexicographically on `(ordering, replica_index)`.
///
/// The `replica_index` tiebreaker guarantees any two distinct replicas can
/// never propose the same ballot, without requiring coordination between
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ballot {
    pub ordering: i32,
    pub replica_index: i32,
}

impl Ballot {
    pub const fn new(ordering: i32, replica_index: i32) -> Self {
        Self {
            ordering,
            replica_index,
        }
    }

    /// The ballot below any ballot a replica can legally hold.
    pub const fn null() -> Self {
        Self::new(-1, -1)
    }

    /// The ballot every fast-path PreAccept is sent in: ordering 0, owned by
    /// the instance's leader.
    pub const fn default_for_leader(leader_index: i32) -> Self {
        Self::new(0, leader_index)
    }

    pub fn is_null(&self) -> bool {
        *self == Self::null()
    }

    /// The next ballot this replica may propose that is guaranteed greater
    /// than `self`.
    pub fn increment(&self, replica_index: i32) -> Self {
        Self::new(self.ordering + 1, replica_index)
    }
}

impl PartialOrd for Ballot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ballot {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.ordering, self.replica_index).cmp(&(other.ordering, other.replica_index))
    }
}

impl Default for Ballot {
    fn default() -> Self {
        Self::null()
    }
}

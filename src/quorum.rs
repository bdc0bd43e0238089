//! Quorum sizing: a small value type that answers "is this many responses
//! enough" for each phase.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Derived quorum sizes for a cluster of `n` replicas.
///
/// `fast_quorum = n - n/4` and `slow_quorum = n/2 + 1`, per the published
/// EPaxos definitions. `f = n/2` is the maximum number of simultaneous
/// failures tolerated.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Quorum {
    n: usize,
    fast_quorum: usize,
    slow_quorum: usize,
    f: usize,
}

impl Quorum {
    pub fn for_cluster_size(n: usize) -> Self {
        assert!(n > 0, "a cluster must have at least one replica");
        Self {
            n,
            fast_quorum: n - n / 4,
            slow_quorum: n / 2 + 1,
            f: n / 2,
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn fast_quorum(&self) -> usize {
        self.fast_quorum
    }

    pub fn slow_quorum(&self) -> usize {
        self.slow_quorum
    }

    pub fn f(&self) -> usize {
        self.f
    }

    /// Number of non-leader PreAcceptOk replies that must agree on the same
    /// `(seq, deps)` for the fast path to be legal.
    pub fn fast_path_match_threshold(&self) -> usize {
        self.fast_quorum - 1
    }

    pub fn is_fast_quorum(&self, count: usize) -> bool {
        count >= self.fast_quorum
    }

    pub fn is_slow_quorum(&self, count: usize) -> bool {
        count >= self.slow_quorum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_replicas_matches_epaxos_paper() {
        let q = Quorum::for_cluster_size(5);
        assert_eq!(q.fast_quorum(), 4);
        assert_eq!(q.slow_quorum(), 3);
        assert_eq!(q.f(), 2);
        assert_eq!(q.fast_path_match_threshold(), 3);
    }

    #[test]
    fn three_replicas() {
        let q = Quorum::for_cluster_size(3);
        assert_eq!(q.fast_quorum(), 3);
        assert_eq!(q.slow_quorum(), 2);
        assert_eq!(q.f(), 1);
    }

    #[test]
    fn seven_replicas() {
        let q = Quorum::for_cluster_size(7);
        assert_eq!(q.fast_quorum(), 6);
        assert_eq!(q.slow_quorum(), 4);
        assert_eq!(q.f(), 3);
    }

    #[test]
    fn single_replica_degenerates_to_itself() {
        let q = Quorum::for_cluster_size(1);
        assert_eq!(q.fast_quorum(), 1);
        assert_eq!(q.slow_quorum(), 1);
        assert_eq!(q.f(), 0);
    }

    #[test]
    fn is_fast_and_slow_quorum_thresholds() {
        let q = Quorum::for_cluster_size(5);
        assert!(!q.is_fast_quorum(3));
        assert!(q.is_fast_quorum(4));
        assert!(!q.is_slow_quorum(2));
        assert!(q.is_slow_quorum(3));
    }
}

//! Leader-role state: the fast path and slow path a replica drives while it
//! leads an instance. Keeps one role-specific bundle of per-peer response
//! bookkeeping alive only while this replica is actually leading a round,
//! torn down on commit or on yielding to a higher ballot.
use std::collections::BTreeSet;

use crate::ballot::Ballot;
use crate::instance::{CommandOrNoop, CommandTriple, Instance};
use crate::messages::{PrepareOk, VoteStatus};
use crate::quorum::Quorum;

/// Per-peer response map, keyed by replica index. `nohash_hasher::IntMap`
/// skips re-hashing small integer keys.
pub type NodeMap<T> = nohash_hasher::IntMap<i32, T>;

/// One PreAcceptOk's payload, recorded per responding replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreAcceptVote {
    pub seq: i32,
    pub deps: BTreeSet<Instance>,
}

#[derive(Debug, Clone)]
pub enum LeaderState {
    PreAccepting {
        ballot: Ballot,
        command: CommandOrNoop,
        responses: NodeMap<PreAcceptVote>,
        avoid_fast_path: bool,
        slow_path_armed: bool,
    },
    Accepting {
        ballot: Ballot,
        triple: CommandTriple,
        responses: BTreeSet<i32>,
    },
    Preparing {
        ballot: Ballot,
        responses: NodeMap<PrepareOk>,
    },
}

impl LeaderState {
    pub fn ballot(&self) -> Ballot {
        match self {
            LeaderState::PreAccepting { ballot, .. } => *ballot,
            LeaderState::Accepting { ballot, .. } => *ballot,
            LeaderState::Preparing { ballot, .. } => *ballot,
        }
    }

    pub fn new_pre_accepting(
        ballot: Ballot,
        command: CommandOrNoop,
        self_replica_index: i32,
        seq: i32,
        deps: BTreeSet<Instance>,
    ) -> Self {
        let mut responses = NodeMap::default();
        responses.insert(self_replica_index, PreAcceptVote { seq, deps });
        LeaderState::PreAccepting {
            ballot,
            command,
            responses,
            avoid_fast_path: false,
            slow_path_armed: false,
        }
    }

    pub fn new_preparing(ballot: Ballot) -> Self {
        LeaderState::Preparing {
            ballot,
            responses: NodeMap::default(),
        }
    }
}

/// What the replica should do next after feeding a reply into the current
/// `LeaderState`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaderOutcome {
    /// Not enough responses yet; keep waiting.
    Wait,
    /// Arm the one-shot slow-path timer; slow quorum was just reached for
    /// the first time and the fast path is still possible.
    ArmSlowPathTimer,
    /// Commit on the fast path with this triple.
    FastCommit(CommandTriple),
    /// Abandon the fast path and broadcast Accept for this triple.
    BeginSlowPath(CommandTriple),
    /// Slow-quorum AcceptOks collected; commit.
    SlowCommit,
}

/// Folds one `PreAcceptOk` into `PreAccepting` state and decides the
/// fast/slow-path outcome. `self_index` is excluded from the "non-leader"
/// match count per the fast-path definition.
pub fn on_pre_accept_ok(
    state: &mut LeaderState,
    quorum: &Quorum,
    self_index: i32,
    from: i32,
    ballot: Ballot,
    seq: i32,
    deps: BTreeSet<Instance>,
) -> LeaderOutcome {
    let LeaderState::PreAccepting {
        ballot: current_ballot,
        command,
        responses,
        avoid_fast_path,
        slow_path_armed,
    } = state
    else {
        return LeaderOutcome::Wait;
    };
    if ballot != *current_ballot {
        return LeaderOutcome::Wait;
    }
    responses.insert(from, PreAcceptVote { seq, deps });

    let count = responses.len();

    // Fast-commit is only legal in the default ballot: a recovery-restarted
    // round always sets avoid_fast_path, and must never fast-commit even on
    // a coincidental match.
    if *avoid_fast_path {
        if quorum.is_slow_quorum(count) {
            return begin_slow_path(command, responses);
        }
        return LeaderOutcome::Wait;
    }

    if quorum.is_fast_quorum(count) {
        let threshold = quorum.fast_path_match_threshold();
        let mut tally: std::collections::HashMap<(i32, &BTreeSet<Instance>), usize> =
            std::collections::HashMap::new();
        for (replica, vote) in responses.iter() {
            if *replica == self_index {
                continue;
            }
            *tally.entry((vote.seq, &vote.deps)).or_insert(0) += 1;
        }
        if let Some(((seq, deps), _)) = tally.into_iter().find(|(_, n)| *n >= threshold) {
            return LeaderOutcome::FastCommit(CommandTriple::new(
                command.clone(),
                seq,
                deps.clone(),
            ));
        }
    }

    if quorum.is_slow_quorum(count) {
        if !*slow_path_armed {
            *slow_path_armed = true;
            return LeaderOutcome::ArmSlowPathTimer;
        }
    }
    LeaderOutcome::Wait
}

fn begin_slow_path(
    command: &CommandOrNoop,
    responses: &NodeMap<PreAcceptVote>,
) -> LeaderOutcome {
    let seq = responses.values().map(|v| v.seq).max().unwrap_or(0);
    let mut deps = BTreeSet::new();
    for vote in responses.values() {
        deps.extend(vote.deps.iter().copied());
    }
    LeaderOutcome::BeginSlowPath(CommandTriple::new(command.clone(), seq, deps))
}

/// Called when the one-shot slow-path timer fires while still
/// `PreAccepting`: unconditionally take the slow path with whatever has been
/// collected so far.
pub fn on_slow_path_timer(state: &LeaderState) -> Option<LeaderOutcome> {
    match state {
        LeaderState::PreAccepting {
            command, responses, ..
        } => Some(begin_slow_path(command, responses)),
        _ => None,
    }
}

pub fn on_accept_ok(
    state: &mut LeaderState,
    quorum: &Quorum,
    from: i32,
    ballot: Ballot,
) -> LeaderOutcome {
    let LeaderState::Accepting {
        ballot: current_ballot,
        responses,
        ..
    } = state
    else {
        return LeaderOutcome::Wait;
    };
    if ballot != *current_ballot {
        return LeaderOutcome::Wait;
    }
    responses.insert(from);
    if quorum.is_slow_quorum(responses.len()) {
        LeaderOutcome::SlowCommit
    } else {
        LeaderOutcome::Wait
    }
}

/// The recovery decision once a `Preparing` leader has collected a slow
/// quorum of `PrepareOk`s. See `recovery.rs` for the case analysis this
/// feeds into.
pub fn prepare_responses_at_quorum<'a>(
    responses: &'a NodeMap<PrepareOk>,
    quorum: &Quorum,
) -> Option<Vec<&'a PrepareOk>> {
    if quorum.is_slow_quorum(responses.len()) {
        Some(responses.values().collect())
    } else {
        None
    }
}

pub fn record_prepare_ok(state: &mut LeaderState, ballot: Ballot, reply: PrepareOk) {
    if let LeaderState::Preparing {
        ballot: current_ballot,
        responses,
    } = state
    {
        if ballot == *current_ballot {
            responses.insert(reply.replica_index, reply);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Command;

    fn cmd() -> CommandOrNoop {
        CommandOrNoop::Command(Command {
            client_address: 0,
            client_pseudonym: 0,
            client_id: 0,
            payload: vec![1],
        })
    }

    #[test]
    fn fast_commit_on_matching_non_leader_replies() {
        let quorum = Quorum::for_cluster_size(5);
        let ballot = Ballot::default_for_leader(0);
        let mut state = LeaderState::new_pre_accepting(ballot, cmd(), 0, 0, BTreeSet::new());
        for replica in [1, 2, 3] {
            let outcome =
                on_pre_accept_ok(&mut state, &quorum, 0, replica, ballot, 0, BTreeSet::new());
            if replica == 3 {
                assert_eq!(
                    outcome,
                    LeaderOutcome::FastCommit(CommandTriple::new(cmd(), 0, BTreeSet::new()))
                );
            }
        }
    }

    #[test]
    fn diverging_replies_arm_slow_path_timer_then_go_slow() {
        let quorum = Quorum::for_cluster_size(5);
        let ballot = Ballot::default_for_leader(0);
        let mut state = LeaderState::new_pre_accepting(ballot, cmd(), 0, 0, BTreeSet::new());

        let mut deps_a = BTreeSet::new();
        deps_a.insert(Instance::new(1, 0));
        let first = on_pre_accept_ok(&mut state, &quorum, 0, 1, ballot, 0, BTreeSet::new());
        assert_eq!(first, LeaderOutcome::Wait);
        let second = on_pre_accept_ok(&mut state, &quorum, 0, 2, ballot, 1, deps_a.clone());
        assert_eq!(second, LeaderOutcome::ArmSlowPathTimer);
        let third = on_pre_accept_ok(&mut state, &quorum, 0, 3, ballot, 2, BTreeSet::new());
        assert!(matches!(third, LeaderOutcome::Wait) || matches!(third, LeaderOutcome::BeginSlowPath(_)));
    }

    #[test]
    fn avoid_fast_path_never_fast_commits_even_on_a_full_match() {
        let quorum = Quorum::for_cluster_size(5);
        let ballot = Ballot::new(1, 0); // a recovery-restarted round, not the default ballot
        let mut state = LeaderState::new_pre_accepting(ballot, cmd(), 0, 0, BTreeSet::new());
        if let LeaderState::PreAccepting { avoid_fast_path, .. } = &mut state {
            *avoid_fast_path = true;
        }
        let mut outcomes = Vec::new();
        for replica in [1, 2, 3] {
            outcomes.push(on_pre_accept_ok(
                &mut state,
                &quorum,
                0,
                replica,
                ballot,
                0,
                BTreeSet::new(),
            ));
        }
        assert!(
            outcomes.iter().all(|o| !matches!(o, LeaderOutcome::FastCommit(_))),
            "avoid_fast_path must never fast-commit, got {:?}",
            outcomes
        );
        assert_eq!(
            outcomes[1], // slow quorum (3) reached on the second reply
            LeaderOutcome::BeginSlowPath(CommandTriple::new(cmd(), 0, BTreeSet::new()))
        );
    }

    #[test]
    fn slow_quorum_of_accept_oks_commits() {
        let quorum = Quorum::for_cluster_size(5);
        let ballot = Ballot::new(1, 0);
        let mut state = LeaderState::Accepting {
            ballot,
            triple: CommandTriple::new(cmd(), 0, BTreeSet::new()),
            responses: BTreeSet::from([0]),
        };
        assert_eq!(
            on_accept_ok(&mut state, &quorum, 1, ballot),
            LeaderOutcome::Wait
        );
        assert_eq!(
            on_accept_ok(&mut state, &quorum, 2, ballot),
            LeaderOutcome::SlowCommit
        );
    }
}

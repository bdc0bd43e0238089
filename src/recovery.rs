//! Recovery: the Prepare/PrepareOk case analysis run once a `Preparing`
//! leader has collected a slow quorum of replies.
use std::collections::BTreeSet;

use crate::ballot::Ballot;
use crate::instance::{CommandOrNoop, CommandTriple, Instance};
use crate::messages::{PrepareOk, VoteStatus};
use crate::quorum::Quorum;

/// What a replica should do once recovery has decided what the instance's
/// outcome must be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Some responder saw the instance `Accepted`; pick up where they left
    /// off and drive it through the slow path.
    ResumeAccepting(CommandTriple),
    /// An f-match of `PreAccepted` replies in the default ballot lets us
    /// skip straight to Accept (the Fast-Paxos-style recovery rule).
    ResumeAcceptingFromFastMatch(CommandTriple),
    /// At least one `PreAccepted` reply, but no f-match: restart PreAccept
    /// with that command, with the fast path disabled for this round.
    RestartPreAccept {
        command: CommandOrNoop,
        avoid_fast_path: bool,
    },
    /// No replica had seen anything for this instance: it is safe to close
    /// it with a no-op.
    RestartPreAcceptWithNoop,
}

/// Runs the five-way case analysis from the recovery design over a
/// slow-quorum-sized set of `PrepareOk` replies, all already known to share
/// the instance's current recovery ballot. `self_index` is excluded from the
/// "replicaIndex ≠ self" scoped checks (the f-match tally and the
/// Accepted-reply check).
pub fn decide(
    instance: Instance,
    leader_index: i32,
    self_index: i32,
    quorum: &Quorum,
    responses: &[&PrepareOk],
) -> RecoveryOutcome {
    debug_assert!(responses.iter().all(|r| r.instance == instance));

    let max_vote_ballot = responses
        .iter()
        .map(|r| r.vote_ballot)
        .max()
        .unwrap_or_else(Ballot::null);

    let retained: Vec<&&PrepareOk> = responses
        .iter()
        .filter(|r| r.vote_ballot == max_vote_ballot)
        .collect();
    let retained_non_self: Vec<&&&PrepareOk> = retained
        .iter()
        .filter(|r| r.replica_index != self_index)
        .collect();

    if let Some(accepted) = retained_non_self
        .iter()
        .find(|r| r.status == VoteStatus::Accepted)
    {
        let triple = CommandTriple::new(
            accepted.command.clone().expect("Accepted reply carries a command"),
            accepted.seq,
            accepted.deps.clone(),
        );
        return RecoveryOutcome::ResumeAccepting(triple);
    }

    let default_ballot = Ballot::default_for_leader(leader_index);
    let fast_match_candidates: Vec<_> = retained_non_self
        .iter()
        .filter(|r| {
            r.status == VoteStatus::PreAccepted
                && r.ballot == default_ballot
        })
        .collect();

    let mut tally: std::collections::HashMap<(i32, &BTreeSet<Instance>), usize> =
        std::collections::HashMap::new();
    for r in &fast_match_candidates {
        *tally.entry((r.seq, &r.deps)).or_insert(0) += 1;
    }
    if let Some(((seq, deps), _)) = tally.into_iter().find(|(_, n)| *n >= quorum.f()) {
        let command = fast_match_candidates
            .iter()
            .find(|r| r.seq == *seq && &r.deps == deps)
            .and_then(|r| r.command.clone())
            .expect("fast-match candidate carries a command");
        return RecoveryOutcome::ResumeAcceptingFromFastMatch(CommandTriple::new(
            command,
            *seq,
            deps.clone(),
        ));
    }

    if let Some(pre_accepted) = retained
        .iter()
        .find(|r| r.status == VoteStatus::PreAccepted)
    {
        return RecoveryOutcome::RestartPreAccept {
            command: pre_accepted
                .command
                .clone()
                .expect("PreAccepted reply carries a command"),
            avoid_fast_path: true,
        };
    }

    RecoveryOutcome::RestartPreAcceptWithNoop
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(
        replica_index: i32,
        vote_ballot: Ballot,
        status: VoteStatus,
        command: Option<CommandOrNoop>,
        seq: i32,
        deps: BTreeSet<Instance>,
    ) -> PrepareOk {
        PrepareOk {
            instance: Instance::new(0, 0),
            ballot: Ballot::new(1, 2),
            replica_index,
            vote_ballot,
            status,
            command,
            seq,
            deps,
        }
    }

    #[test]
    fn accepted_reply_wins_over_pre_accepted() {
        let quorum = Quorum::for_cluster_size(5);
        let accepted = ok(
            1,
            Ballot::new(0, 0),
            VoteStatus::Accepted,
            Some(CommandOrNoop::Noop),
            3,
            BTreeSet::new(),
        );
        let pre_accepted = ok(
            2,
            Ballot::new(0, 0),
            VoteStatus::PreAccepted,
            Some(CommandOrNoop::Noop),
            1,
            BTreeSet::new(),
        );
        let responses = vec![&accepted, &pre_accepted];
        let outcome = decide(Instance::new(0, 0), 0, 9, &quorum, &responses);
        assert_eq!(
            outcome,
            RecoveryOutcome::ResumeAccepting(CommandTriple::new(CommandOrNoop::Noop, 3, BTreeSet::new()))
        );
    }

    #[test]
    fn f_matching_pre_accepted_in_default_ballot_fast_forwards() {
        let quorum = Quorum::for_cluster_size(5); // f = 2
        let default_ballot = Ballot::default_for_leader(0);
        let r1 = ok(
            1,
            default_ballot,
            VoteStatus::PreAccepted,
            Some(CommandOrNoop::Noop),
            5,
            BTreeSet::new(),
        );
        let r2 = ok(
            2,
            default_ballot,
            VoteStatus::PreAccepted,
            Some(CommandOrNoop::Noop),
            5,
            BTreeSet::new(),
        );
        let responses = vec![&r1, &r2];
        let outcome = decide(Instance::new(0, 0), 0, 9, &quorum, &responses);
        assert_eq!(
            outcome,
            RecoveryOutcome::ResumeAcceptingFromFastMatch(CommandTriple::new(
                CommandOrNoop::Noop,
                5,
                BTreeSet::new()
            ))
        );
    }

    #[test]
    fn single_pre_accepted_restarts_with_fast_path_disabled() {
        let quorum = Quorum::for_cluster_size(5);
        let r1 = ok(
            1,
            Ballot::new(0, 0),
            VoteStatus::PreAccepted,
            Some(CommandOrNoop::Noop),
            1,
            BTreeSet::new(),
        );
        let responses = vec![&r1];
        let outcome = decide(Instance::new(0, 0), 0, 9, &quorum, &responses);
        assert_eq!(
            outcome,
            RecoveryOutcome::RestartPreAccept {
                command: CommandOrNoop::Noop,
                avoid_fast_path: true,
            }
        );
    }

    #[test]
    fn all_not_seen_restarts_with_noop() {
        let quorum = Quorum::for_cluster_size(5);
        let r1 = ok(1, Ballot::null(), VoteStatus::NotSeen, None, 0, BTreeSet::new());
        let responses = vec![&r1];
        let outcome = decide(Instance::new(0, 0), 0, 9, &quorum, &responses);
        assert_eq!(outcome, RecoveryOutcome::RestartPreAcceptWithNoop);
    }

    #[test]
    fn self_replica_index_is_excluded_from_the_f_match_tally() {
        let quorum = Quorum::for_cluster_size(5); // f = 2
        let default_ballot = Ballot::default_for_leader(0);
        // Self already saw the original leader's PreAccept (very plausible
        // for the replica driving recovery) plus only one genuine peer
        // match: without excluding self this would reach f = 2 and
        // fast-forward; with it excluded it must fall through to a plain
        // restart instead.
        let self_vote = ok(
            7,
            default_ballot,
            VoteStatus::PreAccepted,
            Some(CommandOrNoop::Noop),
            5,
            BTreeSet::new(),
        );
        let peer_vote = ok(
            1,
            default_ballot,
            VoteStatus::PreAccepted,
            Some(CommandOrNoop::Noop),
            5,
            BTreeSet::new(),
        );
        let responses = vec![&self_vote, &peer_vote];
        let outcome = decide(Instance::new(0, 0), 0, 7, &quorum, &responses);
        assert_eq!(
            outcome,
            RecoveryOutcome::RestartPreAccept {
                command: CommandOrNoop::Noop,
                avoid_fast_path: true,
            }
        );
    }
}

//! The command log: per-instance state and the acceptor-role transitions
//! driven by inbound `PreAccept`/`Accept`/`Commit`/`Prepare` messages.
use std::collections::HashMap;

use crate::ballot::Ballot;
use crate::error::FatalError;
use crate::instance::{CommandOrNoop, CommandTriple, Instance};
use crate::messages::{Accept, Commit, PreAccept, Prepare, PrepareOk, VoteStatus};

/// The state recorded for a single instance.
///
/// `ballot` is this replica's view of the highest ballot seen for the
/// instance (what the design calls `largestBallot`, scoped per-instance);
/// `voteBallot` is the ballot in which the stored triple was last voted on.
/// `voteBallot <= ballot` always.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CmdLogEntry {
    NoCommand { ballot: Ballot },
    PreAccepted {
        ballot: Ballot,
        vote_ballot: Ballot,
        triple: CommandTriple,
    },
    Accepted {
        ballot: Ballot,
        vote_ballot: Ballot,
        triple: CommandTriple,
    },
    Committed { triple: CommandTriple },
    Executed { triple: CommandTriple },
}

impl CmdLogEntry {
    pub fn ballot(&self) -> Ballot {
        match self {
            CmdLogEntry::NoCommand { ballot } => *ballot,
            CmdLogEntry::PreAccepted { ballot, .. } => *ballot,
            CmdLogEntry::Accepted { ballot, .. } => *ballot,
            CmdLogEntry::Committed { .. } | CmdLogEntry::Executed { .. } => Ballot::null(),
        }
    }

    pub fn triple(&self) -> Option<&CommandTriple> {
        match self {
            CmdLogEntry::NoCommand { .. } => None,
            CmdLogEntry::PreAccepted { triple, .. }
            | CmdLogEntry::Accepted { triple, .. }
            | CmdLogEntry::Committed { triple }
            | CmdLogEntry::Executed { triple } => Some(triple),
        }
    }

    pub fn is_committed_or_executed(&self) -> bool {
        matches!(
            self,
            CmdLogEntry::Committed { .. } | CmdLogEntry::Executed { .. }
        )
    }
}

/// What the acceptor-role code should have the replica do in response to a
/// message, after the log has been updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogAction {
    /// Reply with this instance's committed triple (it was already decided).
    ReplyCommit { instance: Instance, triple: CommandTriple },
    /// Reply `Nack`: the inbound ballot was stale.
    ReplyNack { instance: Instance, largest_ballot: Ballot },
    /// Reply `PreAcceptOk` with the (possibly extended) seq/deps.
    ReplyPreAcceptOk {
        instance: Instance,
        ballot: Ballot,
        seq: i32,
        deps: std::collections::BTreeSet<Instance>,
    },
    /// Reply `AcceptOk`.
    ReplyAcceptOk { instance: Instance, ballot: Ballot },
    /// Reply `PrepareOk` describing whatever this replica knows.
    ReplyPrepareOk(PrepareOk),
    /// The instance just transitioned to `Committed`; hand it to the
    /// executor with its final triple.
    DeliverToExecutor { instance: Instance, triple: CommandTriple },
}

#[derive(Default)]
pub struct CommandLog {
    entries: HashMap<Instance, CmdLogEntry>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, instance: &Instance) -> Option<&CmdLogEntry> {
        self.entries.get(instance)
    }

    /// Replies with the cached result instead of re-deriving it when the
    /// same ballot is seen twice, per the idempotent re-reply rule.
    fn existing_vote_in_ballot(
        &self,
        instance: Instance,
        ballot: Ballot,
    ) -> Option<LogAction> {
        match self.entries.get(&instance)? {
            CmdLogEntry::PreAccepted {
                vote_ballot,
                triple,
                ..
            } if *vote_ballot == ballot => Some(LogAction::ReplyPreAcceptOk {
                instance,
                ballot,
                seq: triple.seq,
                deps: triple.deps.clone(),
            }),
            CmdLogEntry::Accepted { vote_ballot, .. } if *vote_ballot == ballot => {
                Some(LogAction::ReplyAcceptOk { instance, ballot })
            }
            _ => None,
        }
    }

    /// Handles an inbound `PreAccept`. `extend` has already computed the
    /// (possibly widened) seq/deps from the local interference oracle.
    pub fn handle_pre_accept(
        &mut self,
        msg: &PreAccept,
        extended_seq: i32,
        extended_deps: std::collections::BTreeSet<Instance>,
    ) -> Result<LogAction, FatalError> {
        let instance = msg.instance;
        if let Some(entry) = self.entries.get(&instance) {
            if let CmdLogEntry::Committed { triple } | CmdLogEntry::Executed { triple } = entry {
                return Ok(LogAction::ReplyCommit {
                    instance,
                    triple: triple.clone(),
                });
            }
            if msg.ballot < entry.ballot() {
                return Ok(LogAction::ReplyNack {
                    instance,
                    largest_ballot: entry.ballot(),
                });
            }
            if let Some(action) = self.existing_vote_in_ballot(instance, msg.ballot) {
                return Ok(action);
            }
        }

        let triple = CommandTriple::new(msg.command.clone(), extended_seq, extended_deps);
        self.entries.insert(
            instance,
            CmdLogEntry::PreAccepted {
                ballot: msg.ballot,
                vote_ballot: msg.ballot,
                triple: triple.clone(),
            },
        );
        Ok(LogAction::ReplyPreAcceptOk {
            instance,
            ballot: msg.ballot,
            seq: triple.seq,
            deps: triple.deps,
        })
    }

    pub fn handle_accept(&mut self, msg: &Accept) -> Result<LogAction, FatalError> {
        let instance = msg.instance;
        if let Some(entry) = self.entries.get(&instance) {
            if let CmdLogEntry::Committed { triple } | CmdLogEntry::Executed { triple } = entry {
                return Ok(LogAction::ReplyCommit {
                    instance,
                    triple: triple.clone(),
                });
            }
            if msg.ballot < entry.ballot() {
                return Ok(LogAction::ReplyNack {
                    instance,
                    largest_ballot: entry.ballot(),
                });
            }
            if let Some(action) = self.existing_vote_in_ballot(instance, msg.ballot) {
                return Ok(action);
            }
        }

        let triple = CommandTriple::new(msg.command.clone(), msg.seq, msg.deps.clone());
        self.entries.insert(
            instance,
            CmdLogEntry::Accepted {
                ballot: msg.ballot,
                vote_ballot: msg.ballot,
                triple,
            },
        );
        Ok(LogAction::ReplyAcceptOk {
            instance,
            ballot: msg.ballot,
        })
    }

    /// A `Commit` is a decision, not a vote: it always wins, regardless of
    /// stored ballot. Returns `Ok(None)` if the instance was already
    /// (identically) committed, which is a safe no-op replay.
    pub fn handle_commit(&mut self, msg: &Commit) -> Result<LogAction, FatalError> {
        let instance = msg.instance;
        let triple = CommandTriple::new(msg.command.clone(), msg.seq, msg.deps.clone());

        if let Some(CmdLogEntry::Committed { triple: existing }) = self.entries.get(&instance) {
            if *existing != triple {
                return Err(FatalError::CommittedEntryOverwritten {
                    instance_leader: instance.leader_index,
                    instance_number: instance.instance_number,
                });
            }
            return Ok(LogAction::DeliverToExecutor {
                instance,
                triple: existing.clone(),
            });
        }
        if matches!(self.entries.get(&instance), Some(CmdLogEntry::Executed { .. })) {
            return Ok(LogAction::DeliverToExecutor { instance, triple });
        }

        self.entries
            .insert(instance, CmdLogEntry::Committed { triple: triple.clone() });
        Ok(LogAction::DeliverToExecutor { instance, triple })
    }

    pub fn handle_prepare(&mut self, msg: &Prepare, self_replica_index: i32) -> LogAction {
        let instance = msg.instance;
        let current_ballot = self
            .entries
            .get(&instance)
            .map(|e| e.ballot())
            .unwrap_or_else(Ballot::null);

        if current_ballot > msg.ballot {
            return LogAction::ReplyNack {
                instance,
                largest_ballot: current_ballot,
            };
        }

        match self.entries.get(&instance).cloned() {
            None => {
                self.entries
                    .insert(instance, CmdLogEntry::NoCommand { ballot: msg.ballot });
                LogAction::ReplyPrepareOk(PrepareOk {
                    instance,
                    ballot: msg.ballot,
                    replica_index: self_replica_index,
                    vote_ballot: Ballot::null(),
                    status: VoteStatus::NotSeen,
                    command: None,
                    seq: 0,
                    deps: Default::default(),
                })
            }
            Some(CmdLogEntry::NoCommand { .. }) => {
                self.entries
                    .insert(instance, CmdLogEntry::NoCommand { ballot: msg.ballot });
                LogAction::ReplyPrepareOk(PrepareOk {
                    instance,
                    ballot: msg.ballot,
                    replica_index: self_replica_index,
                    vote_ballot: Ballot::null(),
                    status: VoteStatus::NotSeen,
                    command: None,
                    seq: 0,
                    deps: Default::default(),
                })
            }
            Some(CmdLogEntry::PreAccepted {
                vote_ballot,
                triple,
                ..
            }) => {
                self.entries.insert(
                    instance,
                    CmdLogEntry::PreAccepted {
                        ballot: msg.ballot,
                        vote_ballot,
                        triple: triple.clone(),
                    },
                );
                LogAction::ReplyPrepareOk(PrepareOk {
                    instance,
                    ballot: msg.ballot,
                    replica_index: self_replica_index,
                    vote_ballot,
                    status: VoteStatus::PreAccepted,
                    command: Some(triple.command),
                    seq: triple.seq,
                    deps: triple.deps,
                })
            }
            Some(CmdLogEntry::Accepted {
                vote_ballot,
                triple,
                ..
            }) => {
                self.entries.insert(
                    instance,
                    CmdLogEntry::Accepted {
                        ballot: msg.ballot,
                        vote_ballot,
                        triple: triple.clone(),
                    },
                );
                LogAction::ReplyPrepareOk(PrepareOk {
                    instance,
                    ballot: msg.ballot,
                    replica_index: self_replica_index,
                    vote_ballot,
                    status: VoteStatus::Accepted,
                    command: Some(triple.command),
                    seq: triple.seq,
                    deps: triple.deps,
                })
            }
            Some(CmdLogEntry::Committed { triple }) | Some(CmdLogEntry::Executed { triple }) => {
                LogAction::ReplyCommit { instance, triple }
            }
        }
    }

    /// Marks an instance `Executed` once the executor has applied it.
    /// No-op if the instance was not `Committed` (a safe replay guard).
    pub fn mark_executed(&mut self, instance: Instance) {
        if let Some(CmdLogEntry::Committed { triple }) = self.entries.get(&instance).cloned() {
            self.entries.insert(instance, CmdLogEntry::Executed { triple });
        }
    }

    /// Directly installs a fast-committed or slow-committed decision from
    /// the leader role, bypassing the acceptor-message path.
    pub fn commit_locally(&mut self, instance: Instance, triple: CommandTriple) {
        self.entries
            .insert(instance, CmdLogEntry::Committed { triple });
    }

    pub fn set_pre_accepted_local(
        &mut self,
        instance: Instance,
        ballot: Ballot,
        triple: CommandTriple,
    ) {
        self.entries.insert(
            instance,
            CmdLogEntry::PreAccepted {
                ballot,
                vote_ballot: ballot,
                triple,
            },
        );
    }

    pub fn set_accepted_local(&mut self, instance: Instance, ballot: Ballot, triple: CommandTriple) {
        self.entries.insert(
            instance,
            CmdLogEntry::Accepted {
                ballot,
                vote_ballot: ballot,
                triple,
            },
        );
    }

    /// Raises the stored ballot to `max(current, ballot)`; never regresses it.
    /// `ballot` typically comes from an untrusted, reorderable Nack, so a
    /// stale one arriving after the ballot has already advanced further must
    /// be a no-op.
    pub fn bump_ballot(&mut self, instance: Instance, ballot: Ballot) {
        let next = match self.entries.get(&instance) {
            None => CmdLogEntry::NoCommand { ballot },
            Some(CmdLogEntry::NoCommand { ballot: current }) => CmdLogEntry::NoCommand {
                ballot: ballot.max(*current),
            },
            Some(CmdLogEntry::PreAccepted {
                ballot: current,
                vote_ballot,
                triple,
            }) => CmdLogEntry::PreAccepted {
                ballot: ballot.max(*current),
                vote_ballot: *vote_ballot,
                triple: triple.clone(),
            },
            Some(CmdLogEntry::Accepted {
                ballot: current,
                vote_ballot,
                triple,
            }) => CmdLogEntry::Accepted {
                ballot: ballot.max(*current),
                vote_ballot: *vote_ballot,
                triple: triple.clone(),
            },
            Some(entry @ CmdLogEntry::Committed { .. })
            | Some(entry @ CmdLogEntry::Executed { .. }) => entry.clone(),
        };
        self.entries.insert(instance, next);
    }

    /// Commands known so far, for feeding the interference oracle: every
    /// instance that has at least been proposed, newest overwrite wins.
    pub fn known_commands(&self) -> impl Iterator<Item = (Instance, &CommandTriple)> {
        self.entries
            .iter()
            .filter_map(|(i, e)| e.triple().map(|t| (*i, t)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::CommandOrNoop as C;
    use std::collections::BTreeSet;

    fn noop_pre_accept(instance: Instance, ballot: Ballot) -> PreAccept {
        PreAccept {
            instance,
            ballot,
            command: C::Noop,
            seq: 0,
            deps: BTreeSet::new(),
        }
    }

    #[test]
    fn pre_accept_on_fresh_instance_installs_pre_accepted() {
        let mut log = CommandLog::new();
        let instance = Instance::new(0, 0);
        let msg = noop_pre_accept(instance, Ballot::new(0, 0));
        let action = log
            .handle_pre_accept(&msg, 0, BTreeSet::new())
            .unwrap();
        assert_eq!(
            action,
            LogAction::ReplyPreAcceptOk {
                instance,
                ballot: Ballot::new(0, 0),
                seq: 0,
                deps: BTreeSet::new(),
            }
        );
        assert!(matches!(
            log.get(&instance),
            Some(CmdLogEntry::PreAccepted { .. })
        ));
    }

    #[test]
    fn stale_ballot_is_nacked() {
        let mut log = CommandLog::new();
        let instance = Instance::new(0, 0);
        log.handle_pre_accept(&noop_pre_accept(instance, Ballot::new(1, 0)), 0, BTreeSet::new())
            .unwrap();
        let action = log
            .handle_pre_accept(&noop_pre_accept(instance, Ballot::new(0, 0)), 0, BTreeSet::new())
            .unwrap();
        assert_eq!(
            action,
            LogAction::ReplyNack {
                instance,
                largest_ballot: Ballot::new(1, 0),
            }
        );
    }

    #[test]
    fn re_reply_on_same_ballot_is_idempotent() {
        let mut log = CommandLog::new();
        let instance = Instance::new(0, 0);
        let msg = noop_pre_accept(instance, Ballot::new(0, 0));
        let first = log.handle_pre_accept(&msg, 2, BTreeSet::new()).unwrap();
        let second = log.handle_pre_accept(&msg, 99, BTreeSet::new()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn commit_overrides_regardless_of_ballot() {
        let mut log = CommandLog::new();
        let instance = Instance::new(0, 0);
        log.handle_pre_accept(&noop_pre_accept(instance, Ballot::new(5, 0)), 0, BTreeSet::new())
            .unwrap();
        let commit = Commit {
            instance,
            command: C::Noop,
            seq: 0,
            deps: BTreeSet::new(),
        };
        let action = log.handle_commit(&commit).unwrap();
        assert!(matches!(action, LogAction::DeliverToExecutor { .. }));
        assert!(log.get(&instance).unwrap().is_committed_or_executed());
    }

    #[test]
    fn replaying_commit_is_a_no_op() {
        let mut log = CommandLog::new();
        let instance = Instance::new(0, 0);
        let commit = Commit {
            instance,
            command: C::Noop,
            seq: 0,
            deps: BTreeSet::new(),
        };
        log.handle_commit(&commit).unwrap();
        let result = log.handle_commit(&commit);
        assert!(result.is_ok());
    }

    #[test]
    fn bump_ballot_never_regresses_the_stored_ballot() {
        let mut log = CommandLog::new();
        let instance = Instance::new(0, 0);
        log.bump_ballot(instance, Ballot::new(5, 0));
        log.bump_ballot(instance, Ballot::new(2, 0)); // stale, arrives after the fact
        assert_eq!(log.get(&instance).unwrap().ballot(), Ballot::new(5, 0));
        log.bump_ballot(instance, Ballot::new(9, 0));
        assert_eq!(log.get(&instance).unwrap().ballot(), Ballot::new(9, 0));
    }

    #[test]
    fn prepare_on_unknown_instance_reports_not_seen() {
        let mut log = CommandLog::new();
        let instance = Instance::new(0, 0);
        let action = log.handle_prepare(
            &Prepare {
                instance,
                ballot: Ballot::new(1, 2),
            },
            2,
        );
        match action {
            LogAction::ReplyPrepareOk(ok) => assert_eq!(ok.status, VoteStatus::NotSeen),
            _ => panic!("expected PrepareOk"),
        }
    }

    #[test]
    fn prepare_on_committed_instance_replies_commit() {
        let mut log = CommandLog::new();
        let instance = Instance::new(0, 0);
        log.handle_commit(&Commit {
            instance,
            command: C::Noop,
            seq: 0,
            deps: BTreeSet::new(),
        })
        .unwrap();
        let action = log.handle_prepare(
            &Prepare {
                instance,
                ballot: Ballot::new(9, 1),
            },
            1,
        );
        assert!(matches!(action, LogAction::ReplyCommit { .. }));
    }
}

//! The top-level replica: a single-threaded event loop over the command
//! log, leader states, and executor. No field here is ever touched from more
//! than one call frame at a time, so none of it needs a lock — every
//! `handle_*` method runs to completion before the next message or timer is
//! processed.
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::Ordering;
use std::time::Instant;

use rand::Rng;

use crate::ballot::Ballot;
use crate::config::ReplicaConfig;
use crate::error::FatalError;
use crate::executor::{ClientReply as ExecutedReply, ExecutorState};
use crate::instance::{Command, CommandOrNoop, Instance};
use crate::interference::{InterferenceOracle, KnownCommand};
use crate::leader::{self, LeaderOutcome, LeaderState};
use crate::log::{CommandLog, LogAction};
use crate::logging::{discard_logger, log_crit, log_debug, log_warn, Logger};
use crate::messages::{
    Accept, AcceptOk, ClientReply, ClientRequest, Commit, Message, Nack, PreAccept, PreAcceptOk,
    Prepare, PrepareOk,
};
use crate::metrics::Metrics;
use crate::quorum::Quorum;
use crate::recovery::{self, RecoveryOutcome};
use crate::state_machine::StateMachine;
use crate::timers::{TimerKind, TimerWheel};
use crate::transport::Transport;

pub struct Replica<T: Transport, S: StateMachine, O: InterferenceOracle> {
    config: ReplicaConfig,
    quorum: Quorum,
    log: CommandLog,
    leader_states: HashMap<Instance, LeaderState>,
    next_instance_number: i32,
    executor: ExecutorState<S>,
    oracle: O,
    timers: TimerWheel,
    metrics: Metrics,
    logger: Logger,
    transport: T,
}

impl<T: Transport, S: StateMachine, O: InterferenceOracle> Replica<T, S, O> {
    pub fn new(config: ReplicaConfig, state_machine: S, oracle: O, transport: T) -> Self {
        let quorum = config.quorum();
        let watermark = config.client_table_gc_watermark;
        Self {
            config,
            quorum,
            log: CommandLog::new(),
            leader_states: HashMap::new(),
            next_instance_number: 0,
            executor: ExecutorState::new(state_machine, watermark),
            oracle,
            timers: TimerWheel::new(),
            metrics: Metrics::new(),
            logger: discard_logger(),
            transport,
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Current committed-but-not-executed vertex count in the executor's
    /// dependency graph, for a gauge-style metrics export.
    pub fn graph_size(&self) -> usize {
        self.executor.graph_size()
    }

    /// A protocol invariant was violated: log at `crit` and abort. The only
    /// correct response to a `FatalError` is to terminate the process so an
    /// operator can restart with a recovery peer taking over.
    fn abort_on_fatal<V>(&self, result: Result<V, FatalError>) -> V {
        match result {
            Ok(value) => value,
            Err(fatal) => {
                log_crit!(self.logger, "protocol invariant violated"; "error" => format!("{}", fatal));
                panic!("{}", fatal);
            }
        }
    }

    fn self_index(&self) -> i32 {
        self.config.this_replica
    }

    fn peers(&self) -> Vec<i32> {
        self.config.peer_indices()
    }

    fn known_commands(&self) -> Vec<KnownCommand> {
        self.log
            .known_commands()
            .map(|(instance, triple)| KnownCommand {
                instance,
                seq: triple.seq,
                command: triple.command.clone(),
            })
            .collect()
    }

    /// Tears down any leader role this replica holds for `instance` and
    /// cancels its timers. Called whenever a higher ballot is observed for
    /// an instance we are leading.
    fn yield_leadership(&mut self, instance: Instance) {
        self.leader_states.remove(&instance);
        self.timers.cancel_all_for(instance);
    }

    fn yield_if_outranked(&mut self, instance: Instance, incoming_ballot: Ballot) {
        if let Some(state) = self.leader_states.get(&instance) {
            if incoming_ballot > state.ballot() {
                self.yield_leadership(instance);
            }
        }
    }

    // ---- client-facing entry point ----------------------------------

    pub fn handle_client_request(&mut self, now: Instant, req: ClientRequest) {
        let instance = Instance::new(self.self_index(), self.next_instance_number);
        self.next_instance_number += 1;
        log_debug!(self.logger, "client request"; "instance" => format!("{:?}", instance));

        let command = CommandOrNoop::Command(Command {
            client_address: req.client_address,
            client_pseudonym: req.client_pseudonym,
            client_id: req.client_id,
            payload: req.payload,
        });
        self.begin_pre_accept(now, instance, Ballot::default_for_leader(self.self_index()), command, false)
    }

    fn begin_pre_accept(
        &mut self,
        now: Instant,
        instance: Instance,
        ballot: Ballot,
        command: CommandOrNoop,
        avoid_fast_path: bool,
    ) {
        let known = self.known_commands();
        let (seq, deps) = self.oracle.extend(&command, 0, &BTreeSet::new(), &known);

        self.log.set_pre_accepted_local(
            instance,
            ballot,
            crate::instance::CommandTriple::new(command.clone(), seq, deps.clone()),
        );

        let mut state = LeaderState::new_pre_accepting(ballot, command.clone(), self.self_index(), seq, deps.clone());
        if avoid_fast_path {
            if let LeaderState::PreAccepting { avoid_fast_path, .. } = &mut state {
                *avoid_fast_path = true;
            }
        }
        self.leader_states.insert(instance, state);

        let peers = self.peers();
        self.metrics.pre_accept_sent.fetch_add(peers.len() as u64, Ordering::Relaxed);
        self.transport.broadcast(
            &peers,
            Message::PreAccept(PreAccept {
                instance,
                ballot,
                command,
                seq,
                deps,
            }),
        );
        self.timers
            .arm(instance, TimerKind::ResendPreAccept, now, self.config.resend_period);
    }

    // ---- inbound message dispatch ------------------------------------

    pub fn handle(&mut self, now: Instant, from: i32, msg: Message) {
        match msg {
            Message::PreAccept(m) => self.on_pre_accept(now, m),
            Message::PreAcceptOk(m) => self.on_pre_accept_ok(now, from, m),
            Message::Accept(m) => self.on_accept(now, m),
            Message::AcceptOk(m) => self.on_accept_ok(from, m),
            Message::Commit(m) => self.on_commit(m),
            Message::Prepare(m) => self.on_prepare(now, m),
            Message::PrepareOk(m) => self.on_prepare_ok(now, m),
            Message::Nack(m) => self.on_nack(now, m),
            Message::ClientRequest(m) => self.handle_client_request(now, m),
            Message::ClientReply(_) => {} // replicas never receive replies
        }
    }

    fn on_pre_accept(&mut self, now: Instant, msg: PreAccept) {
        let instance = msg.instance;
        log_debug!(self.logger, "pre-accept"; "instance" => format!("{:?}", instance), "ballot" => format!("{:?}", msg.ballot));
        self.yield_if_outranked(instance, msg.ballot);

        let known = self.known_commands();
        let (seq, deps) = self.oracle.extend(&msg.command, msg.seq, &msg.deps, &known);
        let result = self.log.handle_pre_accept(&msg, seq, deps);
        let action = self.abort_on_fatal(result);
        self.apply_log_action(now, msg.instance, action);
    }

    fn on_accept(&mut self, now: Instant, msg: Accept) {
        log_debug!(self.logger, "accept"; "instance" => format!("{:?}", msg.instance), "ballot" => format!("{:?}", msg.ballot));
        self.yield_if_outranked(msg.instance, msg.ballot);
        let result = self.log.handle_accept(&msg);
        let action = self.abort_on_fatal(result);
        self.apply_log_action(now, msg.instance, action);
    }

    fn on_commit(&mut self, msg: Commit) {
        let instance = msg.instance;
        log_debug!(self.logger, "commit"; "instance" => format!("{:?}", instance));
        let result = self.log.handle_commit(&msg);
        let action = self.abort_on_fatal(result);
        self.leader_states.remove(&instance);
        self.timers.cancel_all_for(instance);
        self.apply_log_action(Instant::now(), instance, action);
    }

    fn on_prepare(&mut self, now: Instant, msg: Prepare) {
        let instance = msg.instance;
        log_debug!(self.logger, "prepare"; "instance" => format!("{:?}", instance), "ballot" => format!("{:?}", msg.ballot));
        self.yield_if_outranked(instance, msg.ballot);
        let action = self.log.handle_prepare(&msg, self.self_index());
        self.apply_log_action(now, instance, action);
    }

    fn apply_log_action(&mut self, now: Instant, instance: Instance, action: LogAction) {
        match action {
            LogAction::ReplyCommit { triple, .. } => {
                self.metrics.commit_sent.fetch_add(1, Ordering::Relaxed);
                self.transport.send(
                    self.owning_from(instance),
                    Message::Commit(Commit {
                        instance,
                        command: triple.command,
                        seq: triple.seq,
                        deps: triple.deps,
                    }),
                );
            }
            LogAction::ReplyNack {
                instance,
                largest_ballot,
            } => {
                log_warn!(self.logger, "stale ballot"; "instance" => format!("{:?}", instance));
                self.metrics.nack_sent.fetch_add(1, Ordering::Relaxed);
                self.transport.send(
                    self.owning_from(instance),
                    Message::Nack(Nack {
                        instance,
                        largest_ballot,
                    }),
                );
            }
            LogAction::ReplyPreAcceptOk {
                instance,
                ballot,
                seq,
                deps,
            } => {
                self.metrics.pre_accept_ok_sent.fetch_add(1, Ordering::Relaxed);
                self.transport.send(
                    self.owning_from(instance),
                    Message::PreAcceptOk(PreAcceptOk {
                        instance,
                        ballot,
                        replica_index: self.self_index(),
                        seq,
                        deps,
                    }),
                );
            }
            LogAction::ReplyAcceptOk { instance, ballot } => {
                self.metrics.accept_ok_sent.fetch_add(1, Ordering::Relaxed);
                self.transport.send(
                    self.owning_from(instance),
                    Message::AcceptOk(AcceptOk {
                        instance,
                        ballot,
                        replica_index: self.self_index(),
                    }),
                );
            }
            LogAction::ReplyPrepareOk(reply) => {
                self.metrics.prepare_ok_sent.fetch_add(1, Ordering::Relaxed);
                self.transport.send(self.owning_from(instance), Message::PrepareOk(reply));
            }
            LogAction::DeliverToExecutor { instance, triple } => {
                self.deliver_to_executor(now, instance, triple);
            }
        }
    }

    /// The message-reply routing target: for everything except a `Commit`
    /// broadcast, replies only ever go back to the instance's leader.
    fn owning_from(&self, instance: Instance) -> i32 {
        instance.leader_index
    }

    fn deliver_to_executor(&mut self, _now: Instant, instance: Instance, triple: crate::instance::CommandTriple) {
        let result = self
            .executor
            .commit(instance, triple.command, triple.seq, triple.deps);
        let applied = self.abort_on_fatal(result);
        let mut executed_count = 0u64;
        for (executed_instance, replies) in applied {
            self.log.mark_executed(executed_instance);
            executed_count += 1;
            for reply in replies {
                self.send_client_reply(reply);
            }
        }
        self.metrics.record_executed(executed_count);
        self.metrics.set_graph_size(self.executor.graph_size() as u64);
    }

    fn send_client_reply(&mut self, reply: ExecutedReply) {
        self.transport.reply_client(
            reply.client_address,
            Message::ClientReply(ClientReply {
                client_pseudonym: reply.client_pseudonym,
                client_id: reply.client_id,
                result: reply.result,
            }),
        );
    }

    // ---- leader-role replies ------------------------------------------

    fn on_pre_accept_ok(&mut self, now: Instant, from: i32, msg: PreAcceptOk) {
        let instance = msg.instance;
        log_debug!(self.logger, "pre-accept-ok"; "instance" => format!("{:?}", instance), "from" => from);
        let self_index = self.self_index();
        let Some(state) = self.leader_states.get_mut(&instance) else {
            return;
        };
        let outcome = leader::on_pre_accept_ok(state, &self.quorum, self_index, from, msg.ballot, msg.seq, msg.deps);
        self.act_on_leader_outcome(now, instance, msg.ballot, outcome);
    }

    fn on_accept_ok(&mut self, from: i32, msg: AcceptOk) {
        let instance = msg.instance;
        log_debug!(self.logger, "accept-ok"; "instance" => format!("{:?}", instance), "from" => from);
        let Some(state) = self.leader_states.get_mut(&instance) else {
            return;
        };
        let outcome = leader::on_accept_ok(state, &self.quorum, from, msg.ballot);
        if outcome == LeaderOutcome::SlowCommit {
            if let Some(LeaderState::Accepting { triple, .. }) = self.leader_states.remove(&instance) {
                self.metrics.record_slow_commit();
                self.timers.cancel_all_for(instance);
                self.log.commit_locally(instance, triple.clone());
                let peers = self.peers();
                self.metrics.commit_sent.fetch_add(peers.len() as u64, Ordering::Relaxed);
                self.transport.broadcast(
                    &peers,
                    Message::Commit(Commit {
                        instance,
                        command: triple.command.clone(),
                        seq: triple.seq,
                        deps: triple.deps.clone(),
                    }),
                );
                self.deliver_to_executor(Instant::now(), instance, triple);
            }
        }
    }

    fn act_on_leader_outcome(&mut self, now: Instant, instance: Instance, ballot: Ballot, outcome: LeaderOutcome) {
        match outcome {
            LeaderOutcome::Wait => {}
            LeaderOutcome::ArmSlowPathTimer => {
                self.timers
                    .arm(instance, TimerKind::DefaultToSlowPath, now, self.config.slow_path_timeout);
            }
            LeaderOutcome::FastCommit(triple) => {
                self.metrics.record_fast_commit();
                self.timers.cancel_all_for(instance);
                self.leader_states.remove(&instance);
                self.log.commit_locally(instance, triple.clone());
                let peers = self.peers();
                self.metrics.commit_sent.fetch_add(peers.len() as u64, Ordering::Relaxed);
                self.transport.broadcast(
                    &peers,
                    Message::Commit(Commit {
                        instance,
                        command: triple.command.clone(),
                        seq: triple.seq,
                        deps: triple.deps.clone(),
                    }),
                );
                self.deliver_to_executor(now, instance, triple);
            }
            LeaderOutcome::BeginSlowPath(triple) => {
                self.timers.cancel_all_for(instance);
                self.log.set_accepted_local(instance, ballot, triple.clone());
                self.leader_states.insert(
                    instance,
                    LeaderState::Accepting {
                        ballot,
                        triple: triple.clone(),
                        responses: BTreeSet::from([self.self_index()]),
                    },
                );
                let peers = self.peers();
                self.metrics.accept_sent.fetch_add(peers.len() as u64, Ordering::Relaxed);
                self.transport.broadcast(
                    &peers,
                    Message::Accept(Accept {
                        instance,
                        ballot,
                        command: triple.command,
                        seq: triple.seq,
                        deps: triple.deps,
                    }),
                );
                self.timers
                    .arm(instance, TimerKind::ResendAccept, now, self.config.resend_period);
            }
            LeaderOutcome::SlowCommit => unreachable!("SlowCommit only arises from AcceptOk handling"),
        }
    }

    // ---- recovery -------------------------------------------------------

    pub fn on_suspected_failure(&mut self, now: Instant, instance: Instance) {
        self.start_recovery(now, instance);
    }

    fn start_recovery(&mut self, now: Instant, instance: Instance) {
        let base_ballot = self
            .log
            .get(&instance)
            .map(|e| e.ballot())
            .unwrap_or_else(Ballot::null);
        let ballot = base_ballot.increment(self.self_index());

        self.log.bump_ballot(instance, ballot);
        self.leader_states
            .insert(instance, LeaderState::new_preparing(ballot));
        self.metrics.record_recovery_started();

        // Drive our own vote through the acceptor path too, same as every
        // other replica, so our own knowledge counts toward the quorum.
        let self_action = self.log.handle_prepare(
            &Prepare { instance, ballot },
            self.self_index(),
        );
        if let LogAction::ReplyPrepareOk(reply) = self_action {
            leader::record_prepare_ok(self.leader_states.get_mut(&instance).unwrap(), ballot, reply);
        }

        let peers = self.config.peer_indices();
        self.metrics.prepare_sent.fetch_add(peers.len() as u64, Ordering::Relaxed);
        self.transport.broadcast(
            &peers,
            Message::Prepare(Prepare { instance, ballot }),
        );
        let jitter = rand::thread_rng().gen_range(0..=self.config.recovery_backoff_base.as_millis() as u64);
        self.timers.arm(
            instance,
            TimerKind::ResendPrepare,
            now,
            self.config.recovery_backoff_base + std::time::Duration::from_millis(jitter),
        );
    }

    fn on_prepare_ok(&mut self, now: Instant, msg: PrepareOk) {
        let instance = msg.instance;
        let ballot = msg.ballot;
        log_debug!(self.logger, "prepare-ok"; "instance" => format!("{:?}", instance), "from" => msg.replica_index);
        {
            let Some(state) = self.leader_states.get_mut(&instance) else {
                return;
            };
            leader::record_prepare_ok(state, ballot, msg);
        }

        let ready = {
            let Some(LeaderState::Preparing { responses, .. }) = self.leader_states.get(&instance) else {
                return;
            };
            leader::prepare_responses_at_quorum(responses, &self.quorum).map(|refs| {
                refs.into_iter().cloned().collect::<Vec<_>>()
            })
        };
        let Some(responses) = ready else {
            return;
        };
        let response_refs: Vec<&PrepareOk> = responses.iter().collect();
        let outcome = recovery::decide(
            instance,
            instance.leader_index,
            self.self_index(),
            &self.quorum,
            &response_refs,
        );
        self.apply_recovery_outcome(now, instance, ballot, outcome);
    }

    fn apply_recovery_outcome(&mut self, now: Instant, instance: Instance, ballot: Ballot, outcome: RecoveryOutcome) {
        self.timers.cancel_all_for(instance);
        match outcome {
            RecoveryOutcome::ResumeAccepting(triple) | RecoveryOutcome::ResumeAcceptingFromFastMatch(triple) => {
                self.log.set_accepted_local(instance, ballot, triple.clone());
                self.leader_states.insert(
                    instance,
                    LeaderState::Accepting {
                        ballot,
                        triple: triple.clone(),
                        responses: BTreeSet::from([self.self_index()]),
                    },
                );
                let peers = self.peers();
                self.metrics.accept_sent.fetch_add(peers.len() as u64, Ordering::Relaxed);
                self.transport.broadcast(
                    &peers,
                    Message::Accept(Accept {
                        instance,
                        ballot,
                        command: triple.command,
                        seq: triple.seq,
                        deps: triple.deps,
                    }),
                );
                self.timers
                    .arm(instance, TimerKind::ResendAccept, now, self.config.resend_period);
            }
            RecoveryOutcome::RestartPreAccept {
                command,
                avoid_fast_path,
            } => {
                self.begin_pre_accept(now, instance, ballot, command, avoid_fast_path);
            }
            RecoveryOutcome::RestartPreAcceptWithNoop => {
                self.begin_pre_accept(now, instance, ballot, CommandOrNoop::Noop, true);
            }
        }
    }

    fn on_nack(&mut self, now: Instant, msg: Nack) {
        log_debug!(self.logger, "nack"; "instance" => format!("{:?}", msg.instance), "largest_ballot" => format!("{:?}", msg.largest_ballot));
        self.log.bump_ballot(msg.instance, msg.largest_ballot);
        self.yield_leadership(msg.instance);
        self.start_recovery(now, msg.instance);
    }

    // ---- timer firing ----------------------------------------------------

    pub fn poll_timers(&mut self, now: Instant) {
        for (instance, kind) in self.timers.poll(now) {
            self.fire_timer(now, instance, kind);
        }
    }

    fn fire_timer(&mut self, now: Instant, instance: Instance, kind: TimerKind) {
        match kind {
            TimerKind::ResendPreAccept => {
                if self.leader_states.contains_key(&instance) {
                    if let Some(triple) = self.log.get(&instance).and_then(|e| e.triple()).cloned() {
                        let ballot = self.leader_states[&instance].ballot();
                        let peers = self.peers();
                        self.metrics.pre_accept_sent.fetch_add(peers.len() as u64, Ordering::Relaxed);
                        self.transport.broadcast(
                            &peers,
                            Message::PreAccept(PreAccept {
                                instance,
                                ballot,
                                command: triple.command,
                                seq: triple.seq,
                                deps: triple.deps,
                            }),
                        );
                    }
                    self.timers
                        .arm(instance, TimerKind::ResendPreAccept, now, self.config.resend_period);
                }
            }
            TimerKind::ResendAccept => {
                if let Some(LeaderState::Accepting { ballot, triple, .. }) = self.leader_states.get(&instance) {
                    let (ballot, triple) = (*ballot, triple.clone());
                    let peers = self.peers();
                    self.metrics.accept_sent.fetch_add(peers.len() as u64, Ordering::Relaxed);
                    self.transport.broadcast(
                        &peers,
                        Message::Accept(Accept {
                            instance,
                            ballot,
                            command: triple.command,
                            seq: triple.seq,
                            deps: triple.deps,
                        }),
                    );
                    self.timers
                        .arm(instance, TimerKind::ResendAccept, now, self.config.resend_period);
                }
            }
            TimerKind::ResendPrepare => {
                if self.leader_states.contains_key(&instance) {
                    self.start_recovery(now, instance);
                }
            }
            TimerKind::DefaultToSlowPath => {
                if let Some(outcome) = leader::on_slow_path_timer(
                    self.leader_states
                        .get(&instance)
                        .expect("slow-path timer fired with no leader state"),
                ) {
                    let ballot = self.leader_states[&instance].ballot();
                    self.act_on_leader_outcome(now, instance, ballot, outcome);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interference::ConflictsAll;
    use crate::messages::{ClientRequest, Nack, PrepareOk, VoteStatus};
    use crate::state_machine::EchoStateMachine;

    fn replica(this_replica: i32) -> Replica<crate::transport::RecordingTransport, EchoStateMachine, ConflictsAll> {
        let config = ReplicaConfig::new(
            vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()],
            this_replica,
        );
        Replica::new(
            config,
            EchoStateMachine,
            ConflictsAll,
            crate::transport::RecordingTransport::default(),
        )
    }

    #[test]
    fn fast_path_commit_applies_the_command_and_replies_to_the_client() {
        let mut r = replica(0);
        let now = Instant::now();
        r.handle_client_request(
            now,
            ClientRequest {
                client_address: 42,
                client_pseudonym: 1,
                client_id: 1,
                payload: b"hi".to_vec(),
            },
        );

        let instance = Instance::new(0, 0);
        assert_eq!(r.transport.sent.len(), 4);

        let ballot = Ballot::default_for_leader(0);
        for from in [1, 2, 3] {
            r.handle(
                now,
                from,
                Message::PreAcceptOk(PreAcceptOk {
                    instance,
                    ballot,
                    replica_index: from,
                    seq: 0,
                    deps: BTreeSet::new(),
                }),
            );
        }

        assert!(matches!(
            r.log.get(&instance),
            Some(crate::log::CmdLogEntry::Executed { .. })
        ));
        assert_eq!(r.transport.client_replies.len(), 1);
        assert_eq!(r.transport.client_replies[0].0, 42);
        assert_eq!(r.metrics.snapshot().fast_commits, 1);
    }

    #[test]
    fn nack_for_an_unknown_instance_recovers_it_as_a_noop() {
        let mut r = replica(0);
        let now = Instant::now();
        let instance = Instance::new(2, 7);

        r.handle(
            now,
            3,
            Message::Nack(Nack {
                instance,
                largest_ballot: Ballot::new(5, 3),
            }),
        );

        let recovery_ballot = r.leader_states[&instance].ballot();
        assert_eq!(recovery_ballot, Ballot::new(6, 0));

        for from in [1, 2] {
            r.handle(
                now,
                from,
                Message::PrepareOk(PrepareOk {
                    instance,
                    ballot: recovery_ballot,
                    replica_index: from,
                    vote_ballot: Ballot::null(),
                    status: VoteStatus::NotSeen,
                    command: None,
                    seq: 0,
                    deps: BTreeSet::new(),
                }),
            );
        }

        match r.log.get(&instance) {
            Some(crate::log::CmdLogEntry::PreAccepted { triple, ballot, .. }) => {
                assert_eq!(triple.command, CommandOrNoop::Noop);
                assert_eq!(*ballot, recovery_ballot);
            }
            other => panic!("expected a restarted PreAccepted entry, got {:?}", other),
        }
        assert_eq!(r.metrics.snapshot().recoveries_started, 1);
    }
}

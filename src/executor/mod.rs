//! Ties the dependency graph to the client table and the user state
//! machine: turns `commit()` calls into an ordered stream of applied
//! commands and client replies.
pub mod client_table;
pub mod graph;

use std::collections::BTreeSet;

use crate::error::FatalError;
use crate::instance::{ClientAddress, ClientPseudonym, CommandOrNoop, Instance};
use crate::state_machine::StateMachine;

pub use client_table::ClientTable;
pub use graph::DependencyGraph;

/// A reply ready to be sent back to a client once its command has executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientReply {
    pub client_address: ClientAddress,
    pub client_pseudonym: ClientPseudonym,
    pub client_id: u64,
    pub result: Vec<u8>,
}

pub struct ExecutorState<S: StateMachine> {
    graph: DependencyGraph,
    client_table: ClientTable,
    commands: std::collections::HashMap<Instance, CommandOrNoop>,
    state_machine: S,
    client_table_gc_watermark: u64,
}

impl<S: StateMachine> ExecutorState<S> {
    pub fn new(state_machine: S, client_table_gc_watermark: u64) -> Self {
        Self {
            graph: DependencyGraph::new(),
            client_table: ClientTable::new(),
            commands: std::collections::HashMap::new(),
            state_machine,
            client_table_gc_watermark,
        }
    }

    /// Feeds a newly committed instance to the graph and applies everything
    /// that becomes eligible as a result, in deterministic order.
    pub fn commit(
        &mut self,
        instance: Instance,
        command: CommandOrNoop,
        seq: i32,
        deps: BTreeSet<Instance>,
    ) -> Result<Vec<(Instance, Vec<ClientReply>)>, FatalError> {
        self.commands.insert(instance, command);
        self.graph.commit(instance, seq, deps);
        let ready = self.graph.drain_ready()?;
        if ready.is_empty() {
            return Ok(Vec::new());
        }

        let mut applied = Vec::with_capacity(ready.len());
        for inst in ready {
            let command = self
                .commands
                .remove(&inst)
                .expect("executed instance must have a recorded command");
            let replies = self.apply_one(command);
            applied.push((inst, replies));
        }
        self.client_table.advance_generation();
        self.client_table.gc(self.client_table_gc_watermark);
        Ok(applied)
    }

    fn apply_one(&mut self, command: CommandOrNoop) -> Vec<ClientReply> {
        let cmd = match command {
            CommandOrNoop::Noop => return Vec::new(),
            CommandOrNoop::Command(cmd) => cmd,
        };

        let cached = match self
            .client_table
            .check(cmd.client_address, cmd.client_pseudonym, cmd.client_id)
        {
            client_table::DedupOutcome::Cached(result) => Some(result.to_vec()),
            client_table::DedupOutcome::Fresh => None,
        };

        let result = match cached {
            Some(result) => result,
            None => {
                let result = self.state_machine.run(&cmd.payload);
                self.client_table.record(
                    cmd.client_address,
                    cmd.client_pseudonym,
                    cmd.client_id,
                    result.clone(),
                );
                result
            }
        };

        vec![ClientReply {
            client_address: cmd.client_address,
            client_pseudonym: cmd.client_pseudonym,
            client_id: cmd.client_id,
            result,
        }]
    }

    pub fn state_machine(&self) -> &S {
        &self.state_machine
    }

    /// Committed-but-not-yet-executed vertex count in the dependency graph.
    pub fn graph_size(&self) -> usize {
        self.graph.committed_vertex_count()
    }
}

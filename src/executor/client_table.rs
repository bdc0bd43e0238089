//! At-least-once client deduplication.
//!
//! Keyed by `(clientAddress, clientPseudonym)`, each entry remembers the
//! highest client id applied and the result it produced, so a retried
//! request can be answered without re-running the state machine. Entries
//! are garbage collected by generation rather than wall-clock time: every
//! drained batch of ready instances advances the generation counter, and an
//! entry is evicted once it falls `watermark` generations behind.
use std::collections::HashMap;

use crate::instance::{ClientAddress, ClientPseudonym};

#[derive(Debug, Clone)]
struct ClientRecord {
    highest_client_id: u64,
    last_result: Vec<u8>,
    generation: u64,
}

#[derive(Default)]
pub struct ClientTable {
    records: HashMap<(ClientAddress, ClientPseudonym), ClientRecord>,
    generation: u64,
}

pub enum DedupOutcome<'a> {
    /// Never seen before (or older than recorded): go ahead and apply.
    Fresh,
    /// Already applied; here is the cached reply.
    Cached(&'a [u8]),
}

impl ClientTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(
        &self,
        address: ClientAddress,
        pseudonym: ClientPseudonym,
        client_id: u64,
    ) -> DedupOutcome<'_> {
        match self.records.get(&(address, pseudonym)) {
            Some(record) if client_id <= record.highest_client_id => {
                DedupOutcome::Cached(&record.last_result)
            }
            _ => DedupOutcome::Fresh,
        }
    }

    pub fn record(
        &mut self,
        address: ClientAddress,
        pseudonym: ClientPseudonym,
        client_id: u64,
        result: Vec<u8>,
    ) {
        self.records.insert(
            (address, pseudonym),
            ClientRecord {
                highest_client_id: client_id,
                last_result: result,
                generation: self.generation,
            },
        );
    }

    /// Call once per drained batch of executor output, so GC has a notion
    /// of "how long ago" independent of wall-clock time.
    pub fn advance_generation(&mut self) {
        self.generation += 1;
    }

    /// Evicts entries untouched for more than `watermark` generations.
    pub fn gc(&mut self, watermark: u64) {
        let current = self.generation;
        self.records
            .retain(|_, record| current.saturating_sub(record.generation) <= watermark);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_request_is_not_cached() {
        let table = ClientTable::new();
        assert!(matches!(table.check(1, 7, 42), DedupOutcome::Fresh));
    }

    #[test]
    fn repeated_request_returns_cached_result() {
        let mut table = ClientTable::new();
        table.record(1, 7, 42, b"ok".to_vec());
        match table.check(1, 7, 42) {
            DedupOutcome::Cached(result) => assert_eq!(result, b"ok"),
            DedupOutcome::Fresh => panic!("expected cached result"),
        }
    }

    #[test]
    fn higher_client_id_is_treated_as_fresh() {
        let mut table = ClientTable::new();
        table.record(1, 7, 42, b"ok".to_vec());
        assert!(matches!(table.check(1, 7, 43), DedupOutcome::Fresh));
    }

    #[test]
    fn gc_evicts_entries_past_the_watermark() {
        let mut table = ClientTable::new();
        table.record(1, 7, 42, b"ok".to_vec());
        for _ in 0..5 {
            table.advance_generation();
        }
        table.gc(2);
        assert!(matches!(table.check(1, 7, 42), DedupOutcome::Fresh));
    }

    #[test]
    fn gc_keeps_recent_entries() {
        let mut table = ClientTable::new();
        table.record(1, 7, 42, b"ok".to_vec());
        table.advance_generation();
        table.gc(5);
        assert!(matches!(table.check(1, 7, 42), DedupOutcome::Cached(_)));
    }
}

//! The live fact set rebuilt by every replay.

use std::collections::HashMap;

use tracing::debug;

use cfrm_ops::{FactSink, Publish, Retract, Triple};
use cfrm_types::OpId;

/// Facts currently in force, keyed by the id of the publishing operation.
///
/// A publishing id normally carries one triple; a flattened document
/// publishes several under one id. Each id remembers when it was first
/// applied so facts can be listed in application order, which decides the
/// order of values under one subject and predicate.
#[derive(Clone, Debug, Default)]
pub struct LiveFacts {
    entries: HashMap<OpId, FactEntry>,
    next_seq: u64,
}

#[derive(Clone, Debug)]
struct FactEntry {
    seq: u64,
    triples: Vec<Triple>,
}

impl LiveFacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live triples.
    pub fn len(&self) -> usize {
        self.entries.values().map(|entry| entry.triples.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if the publication `id` is currently live.
    pub fn contains(&self, id: &OpId) -> bool {
        self.entries.contains_key(id)
    }

    /// Triples published under `id`, if live.
    pub fn get(&self, id: &OpId) -> Option<&[Triple]> {
        self.entries.get(id).map(|entry| entry.triples.as_slice())
    }

    /// Live publishing ids in application order.
    pub fn publishers(&self) -> Vec<OpId> {
        let mut ids: Vec<(u64, OpId)> = self
            .entries
            .iter()
            .map(|(id, entry)| (entry.seq, *id))
            .collect();
        ids.sort_unstable();
        ids.into_iter().map(|(_, id)| id).collect()
    }

    /// Every live triple with its publishing id, in application order.
    pub fn ordered(&self) -> Vec<(OpId, &Triple)> {
        self.publishers()
            .into_iter()
            .filter_map(|id| self.entries.get(&id).map(|entry| (id, entry)))
            .flat_map(|(id, entry)| entry.triples.iter().map(move |triple| (id, triple)))
            .collect()
    }
}

impl FactSink for LiveFacts {
    fn publish(&mut self, op: &Publish) {
        let next_seq = &mut self.next_seq;
        let entry = self.entries.entry(op.id()).or_insert_with(|| {
            let seq = *next_seq;
            *next_seq += 1;
            FactEntry {
                seq,
                triples: Vec::new(),
            }
        });
        if !entry.triples.contains(op.triple()) {
            entry.triples.push(op.triple().clone());
        }
    }

    fn retract(&mut self, op: &Retract) {
        if let Some(entry) = self.entries.remove(&op.base()) {
            debug!(
                target_op = %op.base().short_id(),
                triples = entry.triples.len(),
                "retracted publication"
            );
        }
    }
}

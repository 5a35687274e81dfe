//! The merge engine.
//!
//! A [`Document`] owns the causal forest of every operation it has seen and
//! the live fact set derived from it. Each ingest inserts the batch and then
//! replays the whole forest from scratch in canonical order. Publish and
//! retract application is idempotent and the forest does not depend on
//! arrival order, so the replayed state is the same for every delivery order
//! and every split of the operations into batches.

use tracing::{debug, info, warn};

use cfrm_forest::CausalForest;
use cfrm_ops::{Operation, Triple};
use cfrm_types::OpId;

use crate::canonical::{materialize, CanonicalDocument};
use crate::error::{DocumentError, DocumentResult};
use crate::facts::LiveFacts;

/// Outcome of one [`Document::ingest`] call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Operations in the batch.
    pub received: usize,
    /// Operations that were new to the document.
    pub added: usize,
    /// Operations already known, ignored.
    pub duplicates: usize,
    /// Known operation ids still waiting for their base.
    pub pending: usize,
    /// Live triples after replay.
    pub live_facts: usize,
}

/// A convergent document built from publish/retract operations.
#[derive(Clone, Debug, Default)]
pub struct Document {
    forest: CausalForest,
    facts: LiveFacts,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from one batch.
    pub fn from_operations<I>(ops: I) -> DocumentResult<Self>
    where
        I: IntoIterator<Item = Operation>,
    {
        let mut doc = Self::new();
        doc.ingest(ops)?;
        Ok(doc)
    }

    /// Add a batch of operations in any order and replay.
    ///
    /// The batch is all-or-nothing: if any operation is malformed or
    /// conflicts with a known one under the same id, the document is left
    /// unchanged.
    pub fn ingest<I>(&mut self, ops: I) -> DocumentResult<IngestReport>
    where
        I: IntoIterator<Item = Operation>,
    {
        let mut forest = self.forest.clone();
        let mut report = IngestReport::default();

        for (index, op) in ops.into_iter().enumerate() {
            report.received += 1;
            match forest.insert(op) {
                Ok(true) => report.added += 1,
                Ok(false) => report.duplicates += 1,
                Err(source) => {
                    warn!(index, error = %source, "rejected operation batch");
                    return Err(DocumentError::Rejected { index, source });
                }
            }
        }

        debug_assert!(forest.validate().is_ok(), "forest index out of sync");
        self.facts = replay(&forest);
        self.forest = forest;

        let pending = self.forest.unreachable();
        for node in &pending {
            debug!(node = %node.summary(), "waiting for base");
        }
        report.pending = pending.len();
        report.live_facts = self.facts.len();
        info!(
            received = report.received,
            added = report.added,
            duplicates = report.duplicates,
            pending = report.pending,
            live_facts = report.live_facts,
            "ingested operations"
        );
        Ok(report)
    }

    /// Decode a JSON array of wire records and ingest it.
    pub fn ingest_json(&mut self, json: &str) -> DocumentResult<IngestReport> {
        let ops = cfrm_ops::decode_batch(json)?;
        self.ingest(ops)
    }

    /// The canonical document for the current live facts.
    pub fn snapshot(&self) -> CanonicalDocument {
        materialize(self.facts.ordered().into_iter().map(|(_, triple)| triple))
    }

    /// Live triples with their publishing ids, in replay order.
    pub fn live_facts(&self) -> Vec<(OpId, &Triple)> {
        self.facts.ordered()
    }

    pub fn facts(&self) -> &LiveFacts {
        &self.facts
    }

    /// Every known operation in canonical order, suitable for re-broadcast.
    pub fn operations(&self) -> Vec<&Operation> {
        self.forest.operations()
    }

    pub fn forest(&self) -> &CausalForest {
        &self.forest
    }

    /// Number of known operations.
    pub fn len(&self) -> usize {
        self.forest.operation_count()
    }

    pub fn is_empty(&self) -> bool {
        self.forest.is_empty()
    }
}

/// Apply every reachable operation, in canonical order, to a fresh fact set.
fn replay(forest: &CausalForest) -> LiveFacts {
    let mut facts = LiveFacts::new();
    for node in forest.traverse() {
        for op in node.members() {
            op.apply(&mut facts);
        }
    }
    facts
}

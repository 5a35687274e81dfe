//! Merge fixtures and the permutation checks run against them.
//!
//! A fixture file is a JSON array of cases:
//!
//! ```json
//! [{"case": "publish then read",
//!   "operations": [{"id": "…", "subject": "root0", "predicate": "A", "object": 42}],
//!   "result": [{"@id": "root0", "A": [42]}]}]
//! ```
//!
//! [`verify_case`] ingests the operations of a case in many delivery orders,
//! optionally split across two ingests, and compares every snapshot with the
//! expected result. Small cases are checked over all permutations, larger ones
//! over a seeded random sample.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;
use tracing::{debug, warn};

use cfrm_ops::{decode_records, Operation, WireOperation};

use crate::document::Document;
use crate::error::{DocumentError, DocumentResult};

/// One `{case, operations, result}` record.
#[derive(Clone, Debug, PartialEq)]
pub struct FixtureCase {
    pub case: String,
    pub operations: Vec<Operation>,
    pub result: serde_json::Value,
}

#[derive(Deserialize)]
struct RawCase {
    case: String,
    operations: Vec<WireOperation>,
    result: serde_json::Value,
}

/// Parse a fixture file.
pub fn load_fixtures(json: &str) -> DocumentResult<Vec<FixtureCase>> {
    let raw: Vec<RawCase> =
        serde_json::from_str(json).map_err(|e| DocumentError::Serialization(e.to_string()))?;

    raw.into_iter()
        .map(|raw| {
            if !raw.result.is_array() {
                return Err(DocumentError::InvalidFixture {
                    case: raw.case,
                    reason: "result must be an array of nodes".into(),
                });
            }
            let operations = decode_records(raw.operations).map_err(|e| DocumentError::InvalidFixture {
                case: raw.case.clone(),
                reason: e.to_string(),
            })?;
            Ok(FixtureCase {
                case: raw.case,
                operations,
                result: raw.result,
            })
        })
        .collect()
}

/// How thoroughly [`verify_case`] explores delivery orders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Cases with at most this many operations are checked over every
    /// permutation.
    pub exhaustive_limit: usize,
    /// Random permutations checked for larger cases.
    pub sampled_permutations: usize,
    /// Also deliver every ordering split across two ingests.
    pub split_deliveries: bool,
    /// Seed for the sampled permutations.
    pub seed: u64,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            exhaustive_limit: 7,
            sampled_permutations: 256,
            split_deliveries: true,
            seed: 0,
        }
    }
}

/// A delivery that produced the wrong document.
#[derive(Clone, Debug, PartialEq)]
pub struct Mismatch {
    /// Indexes into the case's operations, in delivery order.
    pub ordering: Vec<usize>,
    /// Where the delivery was split into two ingests, if it was.
    pub split: Option<usize>,
    pub actual: serde_json::Value,
}

/// Result of checking one case.
#[derive(Clone, Debug, PartialEq)]
pub struct CaseReport {
    pub case: String,
    /// Deliveries checked before finishing or hitting a mismatch.
    pub deliveries: usize,
    pub mismatch: Option<Mismatch>,
}

impl CaseReport {
    pub fn passed(&self) -> bool {
        self.mismatch.is_none()
    }
}

/// Check that every explored delivery of `case` converges on its result.
pub fn verify_case(case: &FixtureCase, options: &VerifyOptions) -> DocumentResult<CaseReport> {
    let n = case.operations.len();
    let mut report = CaseReport {
        case: case.case.clone(),
        deliveries: 0,
        mismatch: None,
    };

    for ordering in orderings(n, options) {
        let ops: Vec<Operation> = ordering.iter().map(|&i| case.operations[i].clone()).collect();
        let mut splits = vec![None];
        if options.split_deliveries && n > 1 {
            splits.push(Some(1 + report.deliveries % (n - 1)));
        }

        for split in splits {
            let actual = deliver(&ops, split)?;
            report.deliveries += 1;
            if actual != case.result {
                warn!(case = %case.case, ?ordering, ?split, "fixture case diverged");
                report.mismatch = Some(Mismatch {
                    ordering,
                    split,
                    actual,
                });
                return Ok(report);
            }
        }
    }

    debug!(case = %case.case, deliveries = report.deliveries, "fixture case converged");
    Ok(report)
}

fn deliver(ops: &[Operation], split: Option<usize>) -> DocumentResult<serde_json::Value> {
    let mut doc = Document::new();
    match split {
        Some(at) => {
            doc.ingest(ops[..at].iter().cloned())?;
            doc.ingest(ops[at..].iter().cloned())?;
        }
        None => {
            doc.ingest(ops.iter().cloned())?;
        }
    }
    doc.snapshot().to_json()
}

fn orderings(n: usize, options: &VerifyOptions) -> Vec<Vec<usize>> {
    if n <= options.exhaustive_limit {
        return Permutations::new(n).collect();
    }
    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut ordering: Vec<usize> = (0..n).collect();
    let mut result = vec![ordering.clone()];
    for _ in 0..options.sampled_permutations {
        ordering.shuffle(&mut rng);
        result.push(ordering.clone());
    }
    result
}

/// Every permutation of `0..n`, generated with Heap's algorithm.
///
/// The first item is the identity ordering; `n == 0` yields one empty
/// ordering.
#[derive(Clone, Debug)]
pub struct Permutations {
    current: Vec<usize>,
    counters: Vec<usize>,
    i: usize,
    started: bool,
}

impl Permutations {
    pub fn new(n: usize) -> Self {
        Self {
            current: (0..n).collect(),
            counters: vec![0; n],
            i: 1,
            started: false,
        }
    }
}

impl Iterator for Permutations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.started = true;
            return Some(self.current.clone());
        }
        while self.i < self.current.len() {
            let i = self.i;
            if self.counters[i] < i {
                if i % 2 == 0 {
                    self.current.swap(0, i);
                } else {
                    self.current.swap(self.counters[i], i);
                }
                self.counters[i] += 1;
                self.i = 1;
                return Some(self.current.clone());
            }
            self.counters[i] = 0;
            self.i += 1;
        }
        None
    }
}

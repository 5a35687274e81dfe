//! Merge engine and canonicalizer for the convergent fact-record merge
//! engine.
//!
//! This crate provides:
//! - [`Document`]: ingests operation batches in any order and replays the
//!   whole causal forest into a [`LiveFacts`] set
//! - [`materialize`]: the subject-grouped, reference-inlining, sorted
//!   [`CanonicalDocument`] every replica agrees on
//! - [`fixture`]: language-agnostic `{case, operations, result}` fixtures
//!   and the permutation checks run against them

pub mod canonical;
pub mod document;
pub mod error;
pub mod facts;
pub mod fixture;

pub use canonical::{materialize, CanonicalDocument, Node, Value};
pub use document::{Document, IngestReport};
pub use error::{DocumentError, DocumentResult};
pub use facts::LiveFacts;
pub use fixture::{load_fixtures, verify_case, CaseReport, FixtureCase, Mismatch, Permutations, VerifyOptions};

//! Operation model for the convergent fact-record merge engine.
//!
//! - [`Operation`]: immutable edit intents, either a [`Publish`] of one
//!   subject–predicate–object [`Triple`] or a [`Retract`] of an earlier
//!   publication
//! - [`FactSink`]: the double-dispatch boundary operations apply themselves to
//! - [`WireOperation`]: the transport record and batch codec
//! - [`flatten`]: decomposition of nested JSON documents into operations

pub mod error;
pub mod flatten;
pub mod operation;
pub mod wire;

pub use error::{OperationError, OperationResult};
pub use flatten::{flatten, flatten_with};
pub use operation::{FactSink, Operation, OperationKind, Publish, Retract, Triple};
pub use wire::{decode_batch, decode_records, encode_batch, WireOperation};

//! Error types for the merge engine.

use cfrm_forest::ForestError;
use cfrm_ops::OperationError;

/// Errors raised by [`Document`](crate::Document) and fixture handling.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// An operation could not be decoded or is malformed.
    #[error(transparent)]
    Operation(#[from] OperationError),

    /// An ingested batch was rejected; the document is unchanged.
    #[error("batch rejected at operation {index}: {source}")]
    Rejected {
        index: usize,
        #[source]
        source: ForestError,
    },

    /// A fixture file is malformed.
    #[error("invalid fixture {case:?}: {reason}")]
    InvalidFixture { case: String, reason: String },

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias for document results.
pub type DocumentResult<T> = Result<T, DocumentError>;

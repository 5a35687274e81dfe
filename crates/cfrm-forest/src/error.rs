//! Error types for the causal forest.

use cfrm_ops::OperationError;
use cfrm_types::OpId;

/// Errors that can occur while inserting into the forest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForestError {
    /// The operation itself is malformed.
    #[error(transparent)]
    Invalid(#[from] OperationError),

    /// An operation reuses a known id with a different kind or base.
    #[error("conflicting operation for id {id}: {reason}")]
    ConflictingOperation {
        /// The reused id.
        id: OpId,
        /// What differs from the known operation.
        reason: String,
    },

    /// The roots/children index disagrees with the stored nodes.
    #[error("corrupt forest index at {0}")]
    CorruptIndex(OpId),
}

/// Convenience alias for forest results.
pub type ForestResult<T> = Result<T, ForestError>;

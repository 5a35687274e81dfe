//! Error types for the operation model.

use cfrm_types::OpId;

use crate::operation::OperationKind;

/// Errors raised while building, decoding or flattening operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
    /// A required field is absent or empty.
    #[error("{kind} operation {id} is missing required field `{field}`")]
    MissingField {
        id: OpId,
        kind: OperationKind,
        field: &'static str,
    },

    /// A publish uses the node identity key as its predicate.
    #[error("operation {0} uses the reserved predicate \"@id\"")]
    ReservedPredicate(OpId),

    /// An operation names itself as its base.
    #[error("operation {0} names itself as its base")]
    SelfReference(OpId),

    /// A record in a decoded batch is malformed.
    #[error("record {index}: {source}")]
    InvalidRecord {
        index: usize,
        #[source]
        source: Box<OperationError>,
    },

    /// A flattened value is not a JSON object where one is required.
    #[error("expected a JSON object at {path}")]
    NotAnObject { path: String },

    /// A flattened object has no string `@id`.
    #[error("object at {path} has no string \"@id\"")]
    MissingNodeId { path: String },

    /// A flattened value cannot be expressed as a fact object.
    #[error("unsupported {found} value for {subject}.{predicate}")]
    UnsupportedValue {
        subject: String,
        predicate: String,
        found: &'static str,
    },

    /// An envelope key (`id`, `base`, `operation`) of a flattened document
    /// is invalid.
    #[error("invalid envelope key `{key}`: {reason}")]
    InvalidEnvelope { key: &'static str, reason: String },

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias for operation results.
pub type OperationResult<T> = Result<T, OperationError>;

//! Transport record for operations and the JSON batch codec.
//!
//! On the wire an operation is a flat record:
//!
//! ```json
//! {"id": "018a742e-2b96-7000-82ec-7d22b1ddad71",
//!  "subject": "root0", "predicate": "A", "object": {"@id": "sub0"},
//!  "base": "…", "operation": "publish"}
//! ```
//!
//! `operation` defaults to `"publish"` when absent and is omitted when
//! encoding publishes. Retractions only carry `id`, `base` and `operation`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use cfrm_types::{Object, OpId};

use crate::error::{OperationError, OperationResult};
use crate::operation::{Operation, OperationKind, Publish, Retract, Triple};

/// Flat wire representation of an [`Operation`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireOperation {
    pub id: OpId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Object>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<OpId>,
    #[serde(default, skip_serializing_if = "OperationKind::is_publish")]
    pub operation: OperationKind,
}

impl TryFrom<WireOperation> for Operation {
    type Error = OperationError;

    fn try_from(wire: WireOperation) -> Result<Self, Self::Error> {
        let missing = |field| OperationError::MissingField {
            id: wire.id,
            kind: wire.operation,
            field,
        };

        let operation = match wire.operation {
            OperationKind::Publish => {
                let subject = wire.subject.clone().filter(|s| !s.is_empty()).ok_or_else(|| missing("subject"))?;
                let predicate = wire.predicate.clone().filter(|p| !p.is_empty()).ok_or_else(|| missing("predicate"))?;
                let object = wire.object.clone().ok_or_else(|| missing("object"))?;
                let publish = Publish::from_triple(wire.id, Triple::new(subject, predicate, object));
                match wire.base {
                    Some(base) => Operation::Publish(publish.with_base(base)),
                    None => Operation::Publish(publish),
                }
            }
            OperationKind::Retract => {
                let base = wire.base.ok_or_else(|| missing("base"))?;
                if wire.subject.is_some() || wire.object.is_some() {
                    debug!(id = %wire.id, "ignoring triple fields on retraction");
                }
                Operation::Retract(Retract::from_ids(wire.id, base))
            }
        };

        operation.validate()?;
        Ok(operation)
    }
}

impl From<Operation> for WireOperation {
    fn from(op: Operation) -> Self {
        match op {
            Operation::Publish(p) => Self {
                id: p.id(),
                subject: Some(p.subject().to_string()),
                predicate: Some(p.predicate().to_string()),
                object: Some(p.object().clone()),
                base: p.base(),
                operation: OperationKind::Publish,
            },
            Operation::Retract(r) => Self {
                id: r.id(),
                subject: None,
                predicate: None,
                object: None,
                base: Some(r.base()),
                operation: OperationKind::Retract,
            },
        }
    }
}

/// Decode a JSON array of wire records.
///
/// Every record is validated; the first malformed record fails the whole
/// batch with its index.
pub fn decode_batch(json: &str) -> OperationResult<Vec<Operation>> {
    let records: Vec<WireOperation> =
        serde_json::from_str(json).map_err(|e| OperationError::Serialization(e.to_string()))?;
    decode_records(records)
}

/// Convert already-parsed wire records, reporting the index of the first
/// malformed one.
pub fn decode_records(records: Vec<WireOperation>) -> OperationResult<Vec<Operation>> {
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            Operation::try_from(record).map_err(|source| OperationError::InvalidRecord {
                index,
                source: Box::new(source),
            })
        })
        .collect()
}

/// Encode operations as a JSON array of wire records.
pub fn encode_batch(ops: &[Operation]) -> OperationResult<String> {
    serde_json::to_string(ops).map_err(|e| OperationError::Serialization(e.to_string()))
}

//! Flatten nested JSON documents into operations.
//!
//! Every object carries its node identity under `"@id"`. Each
//! predicate/value pair becomes one [`Publish`]; a nested object becomes a
//! reference edge followed by its own flattened facts. Arrays become one
//! operation per element.
//!
//! The top-level object may carry envelope keys, which are not emitted as
//! predicates there. On nested objects they are ordinary predicates.
//!
//! - `id`: id shared by every emitted operation (minted when absent)
//! - `base`: causal predecessor of every emitted publish
//! - `operation`: `"publish"` (default) or `"retract"`; a retraction
//!   flattens to a single [`Retract`] of `base`

use serde_json::{Map, Value};
use tracing::debug;

use cfrm_types::{IdGenerator, Object, OpId, Scalar, NODE_ID_KEY};

use crate::error::{OperationError, OperationResult};
use crate::operation::{Operation, OperationKind, Publish, Retract, Triple};

const ENVELOPE_KEYS: [&str; 4] = [NODE_ID_KEY, "id", "base", "operation"];

/// Flatten a document, minting from the process-wide generator.
pub fn flatten(document: &Value) -> OperationResult<Vec<Operation>> {
    flatten_with(document, cfrm_types::global())
}

/// Flatten a document, minting from `generator` when it carries no `id`.
pub fn flatten_with(document: &Value, generator: &IdGenerator) -> OperationResult<Vec<Operation>> {
    let root = document.as_object().ok_or_else(|| OperationError::NotAnObject {
        path: "$".into(),
    })?;

    let id = match root.get("id") {
        Some(value) => parse_envelope_id("id", value)?,
        None => generator.mint(),
    };
    let base = root
        .get("base")
        .map(|value| parse_envelope_id("base", value))
        .transpose()?;
    let kind = match root.get("operation") {
        None => OperationKind::Publish,
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            OperationError::InvalidEnvelope {
                key: "operation",
                reason: e.to_string(),
            }
        })?,
    };

    if kind == OperationKind::Retract {
        let base = base.ok_or_else(|| OperationError::InvalidEnvelope {
            key: "base",
            reason: "a retraction needs the id it undoes".into(),
        })?;
        return Ok(vec![Operation::Retract(Retract::from_ids(id, base))]);
    }

    let mut flattener = Flattener {
        id,
        base,
        ops: Vec::new(),
    };
    flattener.object(root, "$", true)?;
    debug!(id = %id, operations = flattener.ops.len(), "flattened document");
    Ok(flattener.ops)
}

fn parse_envelope_id(key: &'static str, value: &Value) -> OperationResult<OpId> {
    let text = value.as_str().ok_or_else(|| OperationError::InvalidEnvelope {
        key,
        reason: "expected an id string".into(),
    })?;
    text.parse().map_err(|e: cfrm_types::TypeError| OperationError::InvalidEnvelope {
        key,
        reason: e.to_string(),
    })
}

struct Flattener {
    id: OpId,
    base: Option<OpId>,
    ops: Vec<Operation>,
}

impl Flattener {
    fn object(&mut self, object: &Map<String, Value>, path: &str, is_root: bool) -> OperationResult<()> {
        let subject = node_id(object, path)?;
        for (predicate, value) in object {
            let skip = if is_root {
                ENVELOPE_KEYS.contains(&predicate.as_str())
            } else {
                predicate == NODE_ID_KEY
            };
            if skip {
                continue;
            }
            let path = format!("{path}.{predicate}");
            self.value(&subject, predicate, value, &path, true)?;
        }
        Ok(())
    }

    fn value(
        &mut self,
        subject: &str,
        predicate: &str,
        value: &Value,
        path: &str,
        allow_array: bool,
    ) -> OperationResult<()> {
        match value {
            Value::Object(child) => {
                let child_id = node_id(child, path)?;
                self.emit(subject, predicate, Object::reference(child_id));
                self.object(child, path, false)
            }
            Value::Array(items) if allow_array => {
                for (index, item) in items.iter().enumerate() {
                    self.value(subject, predicate, item, &format!("{path}[{index}]"), false)?;
                }
                Ok(())
            }
            other => {
                let scalar = Scalar::from_json(other).ok_or_else(|| OperationError::UnsupportedValue {
                    subject: subject.to_string(),
                    predicate: predicate.to_string(),
                    found: json_type(other),
                })?;
                self.emit(subject, predicate, Object::Scalar(scalar));
                Ok(())
            }
        }
    }

    fn emit(&mut self, subject: &str, predicate: &str, object: Object) {
        let publish = Publish::from_triple(self.id, Triple::new(subject, predicate, object));
        let publish = match self.base {
            Some(base) => publish.with_base(base),
            None => publish,
        };
        self.ops.push(Operation::Publish(publish));
    }
}

fn node_id(object: &Map<String, Value>, path: &str) -> OperationResult<String> {
    object
        .get(NODE_ID_KEY)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| OperationError::MissingNodeId { path: path.to_string() })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "nested array",
        Value::Object(_) => "object",
    }
}

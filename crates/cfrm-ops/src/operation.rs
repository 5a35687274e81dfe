//! Publish / Retract operations and the [`FactSink`] they apply to.
//!
//! Operations are immutable once built. The consuming `with_*` builders only
//! exist to supply an explicit id or base at construction time, e.g. for
//! deterministic tests or when a writer re-derives a known id.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use cfrm_types::{Object, OpId, NODE_ID_KEY};

use crate::error::{OperationError, OperationResult};
use crate::wire::WireOperation;

/// Discriminant of an [`Operation`], as carried on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    #[default]
    Publish,
    Retract,
}

impl OperationKind {
    pub fn is_publish(&self) -> bool {
        matches!(self, Self::Publish)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Publish => write!(f, "publish"),
            Self::Retract => write!(f, "retract"),
        }
    }
}

/// One subject–predicate–object fact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: Object,
}

impl Triple {
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: impl Into<Object>) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// Stable ordering key (subject, predicate, object).
    /// Order by subject, then predicate, then object (see
    /// [`Object::canonical_cmp`]).
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.subject
            .cmp(&other.subject)
            .then_with(|| self.predicate.cmp(&other.predicate))
            .then_with(|| self.object.canonical_cmp(&other.object))
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

/// Assert one fact. The fact is keyed by the publish's own id.
#[derive(Clone, Debug, PartialEq)]
pub struct Publish {
    id: OpId,
    triple: Triple,
    base: Option<OpId>,
}

impl Publish {
    /// New publish with a freshly minted id and no base.
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: impl Into<Object>) -> Self {
        Self {
            id: cfrm_types::mint(),
            triple: Triple::new(subject, predicate, object),
            base: None,
        }
    }

    /// New publish of an existing triple under an explicit id.
    pub fn from_triple(id: OpId, triple: Triple) -> Self {
        Self {
            id,
            triple,
            base: None,
        }
    }

    /// Replace the minted id with an explicit one.
    pub fn with_id(mut self, id: OpId) -> Self {
        self.id = id;
        self
    }

    /// Name the operation this publish causally follows.
    pub fn with_base(mut self, base: OpId) -> Self {
        self.base = Some(base);
        self
    }

    pub fn id(&self) -> OpId {
        self.id
    }

    pub fn base(&self) -> Option<OpId> {
        self.base
    }

    pub fn triple(&self) -> &Triple {
        &self.triple
    }

    pub fn subject(&self) -> &str {
        &self.triple.subject
    }

    pub fn predicate(&self) -> &str {
        &self.triple.predicate
    }

    pub fn object(&self) -> &Object {
        &self.triple.object
    }
}

/// Undo the publication whose id is `base`.
#[derive(Clone, Debug, PartialEq)]
pub struct Retract {
    id: OpId,
    base: OpId,
}

impl Retract {
    /// New retraction of `base` with a freshly minted id.
    pub fn new(base: OpId) -> Self {
        Self {
            id: cfrm_types::mint(),
            base,
        }
    }

    /// Retraction with explicit id and target.
    pub fn from_ids(id: OpId, base: OpId) -> Self {
        Self { id, base }
    }

    /// Replace the minted id with an explicit one.
    pub fn with_id(mut self, id: OpId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> OpId {
        self.id
    }

    /// The publication being undone.
    pub fn base(&self) -> OpId {
        self.base
    }
}

/// Receiver of applied operations.
///
/// [`Operation::apply`] dispatches publishes to [`FactSink::publish`] and
/// retractions to [`FactSink::retract`]. Both must be idempotent: applying
/// the same operation twice leaves the sink as applying it once.
pub trait FactSink {
    /// Upsert the fact keyed by `op.id()`.
    fn publish(&mut self, op: &Publish);

    /// Remove the facts keyed by `op.base()`; a no-op if there are none.
    fn retract(&mut self, op: &Retract);
}

/// An immutable edit intent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireOperation", into = "WireOperation")]
pub enum Operation {
    Publish(Publish),
    Retract(Retract),
}

impl Operation {
    /// Shorthand for a minted [`Publish`].
    pub fn publish(subject: impl Into<String>, predicate: impl Into<String>, object: impl Into<Object>) -> Self {
        Self::Publish(Publish::new(subject, predicate, object))
    }

    /// Shorthand for a minted [`Retract`].
    pub fn retract(base: OpId) -> Self {
        Self::Retract(Retract::new(base))
    }

    pub fn id(&self) -> OpId {
        match self {
            Self::Publish(p) => p.id,
            Self::Retract(r) => r.id,
        }
    }

    /// Causal predecessor: optional for publishes, the target for
    /// retractions.
    pub fn base(&self) -> Option<OpId> {
        match self {
            Self::Publish(p) => p.base,
            Self::Retract(r) => Some(r.base),
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Publish(_) => OperationKind::Publish,
            Self::Retract(_) => OperationKind::Retract,
        }
    }

    pub fn as_publish(&self) -> Option<&Publish> {
        match self {
            Self::Publish(p) => Some(p),
            Self::Retract(_) => None,
        }
    }

    /// Structural validation applied at the ingestion boundary.
    pub fn validate(&self) -> OperationResult<()> {
        if self.base() == Some(self.id()) {
            return Err(OperationError::SelfReference(self.id()));
        }
        if let Self::Publish(p) = self {
            let missing = if p.subject().is_empty() {
                Some("subject")
            } else if p.predicate().is_empty() {
                Some("predicate")
            } else {
                None
            };
            if let Some(field) = missing {
                return Err(OperationError::MissingField {
                    id: p.id,
                    kind: OperationKind::Publish,
                    field,
                });
            }
            if p.predicate() == NODE_ID_KEY {
                return Err(OperationError::ReservedPredicate(p.id));
            }
        }
        Ok(())
    }

    /// Apply this operation to a sink.
    pub fn apply<S: FactSink + ?Sized>(&self, sink: &mut S) {
        match self {
            Self::Publish(p) => sink.publish(p),
            Self::Retract(r) => sink.retract(r),
        }
    }

    /// Deterministic order of operations sharing one id, independent of the
    /// order they were delivered in: publishes first, by triple;
    /// retractions by target.
    ///
    /// A flattened array therefore comes back with booleans first, numbers
    /// ascending, then strings, then references.
    pub fn member_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Publish(a), Self::Publish(b)) => a.triple.canonical_cmp(&b.triple),
            (Self::Retract(a), Self::Retract(b)) => a.base.cmp(&b.base),
            (Self::Publish(_), Self::Retract(_)) => Ordering::Less,
            (Self::Retract(_), Self::Publish(_)) => Ordering::Greater,
        }
    }
}

impl From<Publish> for Operation {
    fn from(p: Publish) -> Self {
        Self::Publish(p)
    }
}

impl From<Retract> for Operation {
    fn from(r: Retract) -> Self {
        Self::Retract(r)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Publish(p) => write!(f, "publish {} [{}]", p.id.short_id(), p.triple),
            Self::Retract(r) => write!(f, "retract {} of {}", r.id.short_id(), r.base.short_id()),
        }
    }
}

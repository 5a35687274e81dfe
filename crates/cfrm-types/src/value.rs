use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// JSON key naming a node's identity, on the wire and in documents.
pub const NODE_ID_KEY: &str = "@id";

/// A literal value in the object position of a fact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(Number),
    String(String),
}

impl Scalar {
    /// Convert a JSON value into a scalar. Objects, arrays and `null` are
    /// not scalars.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => Some(Self::Number(n.clone())),
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
        }
    }

    /// Total order: booleans, then numbers by value, then strings.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Number(a), Self::Number(b)) => cmp_numbers(a, b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Number(_) => 1,
            Self::String(_) => 2,
        }
    }
}

/// Numeric order; equal values with different spellings (`1` and `1.0`)
/// fall back to their text so the order stays total.
fn cmp_numbers(a: &Number, b: &Number) -> Ordering {
    let by_value = if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        x.cmp(&y)
    } else if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        x.cmp(&y)
    } else {
        let x = a.as_f64().unwrap_or(f64::NAN);
        let y = b.as_f64().unwrap_or(f64::NAN);
        x.total_cmp(&y)
    };
    by_value.then_with(|| a.to_string().cmp(&b.to_string()))
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<u64> for Scalar {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

/// Reference to another node: `{"@id": "<subject>"}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeRef {
    #[serde(rename = "@id")]
    pub id: String,
}

impl NodeRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// The object position of a fact: a scalar or a reference to a node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Object {
    Ref(NodeRef),
    Scalar(Scalar),
}

impl Object {
    /// Reference to the node with the given subject id.
    pub fn reference(id: impl Into<String>) -> Self {
        Self::Ref(NodeRef::new(id))
    }

    /// The referenced subject, if this object is a reference.
    pub fn as_ref_id(&self) -> Option<&str> {
        match self {
            Self::Ref(r) => Some(&r.id),
            Self::Scalar(_) => None,
        }
    }

    /// Deterministic total order: scalars (see [`Scalar::canonical_cmp`])
    /// before references, references by subject id.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => a.canonical_cmp(b),
            (Self::Ref(a), Self::Ref(b)) => a.id.cmp(&b.id),
            (Self::Scalar(_), Self::Ref(_)) => Ordering::Less,
            (Self::Ref(_), Self::Scalar(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ref(r) => write!(f, "<{}>", r.id),
            Self::Scalar(s) => write!(f, "{s}"),
        }
    }
}

impl From<Scalar> for Object {
    fn from(s: Scalar) -> Self {
        Self::Scalar(s)
    }
}

macro_rules! object_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Object {
                fn from(value: $ty) -> Self {
                    Self::Scalar(Scalar::from(value))
                }
            }
        )*
    };
}

object_from_scalar!(bool, i64, u64, &str, String);

impl From<NodeRef> for Object {
    fn from(r: NodeRef) -> Self {
        Self::Ref(r)
    }
}

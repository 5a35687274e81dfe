//! Canonical documents: the live fact set as nested, sorted JSON nodes.
//!
//! [`materialize`] groups facts by subject into [`Node`]s mapping each
//! predicate to its ordered values. A reference to a subject that has facts
//! of its own is replaced by that subject's full node, recursively. A
//! reference to a subject without facts stays a bare `{"@id": …}`. Every
//! subject with facts is also listed at the top level, so a referenced node
//! appears both standalone and nested inside its referrer. Top-level nodes
//! are sorted by id.
//!
//! # Invariants
//!
//! - Values under one predicate keep the order facts were applied in;
//!   identical values collapse into the first.
//! - A node already being inlined on the current path is emitted as a bare
//!   reference, so reference cycles terminate.
//! - Serialization writes `"@id"` first, then predicates in sorted order.
//! - Neither inlining nor [`CanonicalDocument::to_json_string`] recurses,
//!   so nesting depth is limited by memory only.

use std::collections::{btree_map, BTreeMap, HashMap};
use std::io;
use std::sync::Arc;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter};
use tracing::debug;

use cfrm_ops::Triple;
use cfrm_types::{NodeRef, Object, Scalar, NODE_ID_KEY};

use crate::error::{DocumentError, DocumentResult};

/// One value under a predicate.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    /// A referenced subject inlined with all of its facts. Subtrees that
    /// expand the same way wherever they appear are shared.
    Node(Arc<Node>),
    /// A reference to a subject without facts, or one already being inlined.
    Ref(NodeRef),
}

impl Value {
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Self::Node(node) => Some(&**node),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Scalar(scalar) => scalar.serialize(serializer),
            Self::Node(node) => node.serialize(serializer),
            Self::Ref(reference) => reference.serialize(serializer),
        }
    }
}

/// A subject and its predicates.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    id: String,
    properties: BTreeMap<String, Vec<Value>>,
}

impl Node {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Values under `predicate`, in application order.
    pub fn get(&self, predicate: &str) -> Option<&[Value]> {
        self.properties.get(predicate).map(Vec::as_slice)
    }

    /// Predicates in sorted order.
    pub fn predicates(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.properties.len() + 1))?;
        map.serialize_entry(NODE_ID_KEY, &self.id)?;
        for (predicate, values) in &self.properties {
            map.serialize_entry(predicate, values)?;
        }
        map.end()
    }
}

/// The canonical form of a document: top-level nodes sorted by id.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CanonicalDocument {
    nodes: Vec<Node>,
}

impl CanonicalDocument {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The top-level node for `subject`.
    pub fn get(&self, subject: &str) -> Option<&Node> {
        self.nodes
            .binary_search_by(|node| node.id.as_str().cmp(subject))
            .ok()
            .map(|index| &self.nodes[index])
    }

    pub fn to_json(&self) -> DocumentResult<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| DocumentError::Serialization(e.to_string()))
    }

    /// Serialize to a JSON string; identical documents give identical bytes.
    ///
    /// Output matches `serde_json::to_string` (or `to_string_pretty`) but is
    /// written without recursion, so any nesting depth is fine.
    pub fn to_json_string(&self, pretty: bool) -> DocumentResult<String> {
        let mut out = Vec::new();
        let written = if pretty {
            write_nodes(&self.nodes, &mut out, &mut PrettyFormatter::new())
        } else {
            write_nodes(&self.nodes, &mut out, &mut CompactFormatter)
        };
        written.map_err(|e| DocumentError::Serialization(e.to_string()))?;
        String::from_utf8(out).map_err(|e| DocumentError::Serialization(e.to_string()))
    }
}

/// Output still to be written by [`write_nodes`].
enum Token<'n> {
    Node(&'n Node),
    Ref(&'n str),
    Values(&'n [Value]),
    Key(&'n str, bool),
    Str(&'n str),
    Scalar(&'n Scalar),
    ArrayValue(bool),
    EndArrayValue,
    EndArray,
    EndObjectValue,
    EndObject,
}

fn write_nodes<F: Formatter>(nodes: &[Node], out: &mut Vec<u8>, f: &mut F) -> io::Result<()> {
    f.begin_array(out)?;
    let mut stack = vec![Token::EndArray];
    for (index, node) in nodes.iter().enumerate().rev() {
        stack.extend([Token::EndArrayValue, Token::Node(node), Token::ArrayValue(index == 0)]);
    }

    while let Some(token) = stack.pop() {
        match token {
            Token::Node(node) => {
                f.begin_object(out)?;
                stack.push(Token::EndObject);
                for (predicate, values) in node.properties.iter().rev() {
                    stack.extend([
                        Token::EndObjectValue,
                        Token::Values(values),
                        Token::Key(predicate, false),
                    ]);
                }
                stack.extend([
                    Token::EndObjectValue,
                    Token::Str(&node.id),
                    Token::Key(NODE_ID_KEY, true),
                ]);
            }
            Token::Ref(id) => {
                f.begin_object(out)?;
                stack.extend([
                    Token::EndObject,
                    Token::EndObjectValue,
                    Token::Str(id),
                    Token::Key(NODE_ID_KEY, true),
                ]);
            }
            Token::Values(values) => {
                f.begin_array(out)?;
                stack.push(Token::EndArray);
                for (index, value) in values.iter().enumerate().rev() {
                    let token = match value {
                        Value::Scalar(scalar) => Token::Scalar(scalar),
                        Value::Node(node) => Token::Node(node),
                        Value::Ref(reference) => Token::Ref(&reference.id),
                    };
                    stack.extend([Token::EndArrayValue, token, Token::ArrayValue(index == 0)]);
                }
            }
            Token::Key(key, first) => {
                f.begin_object_key(out, first)?;
                serde_json::to_writer(&mut *out, key)?;
                f.end_object_key(out)?;
                f.begin_object_value(out)?;
            }
            Token::Str(text) => serde_json::to_writer(&mut *out, text)?,
            Token::Scalar(scalar) => serde_json::to_writer(&mut *out, scalar)?,
            Token::ArrayValue(first) => f.begin_array_value(out, first)?,
            Token::EndArrayValue => f.end_array_value(out)?,
            Token::EndArray => f.end_array(out)?,
            Token::EndObjectValue => f.end_object_value(out)?,
            Token::EndObject => f.end_object(out)?,
        }
    }
    Ok(())
}

type Grouped<'a> = BTreeMap<&'a str, BTreeMap<&'a str, Vec<&'a Object>>>;

/// Build the canonical document from live facts given in application order.
pub fn materialize<'a, I>(facts: I) -> CanonicalDocument
where
    I: IntoIterator<Item = &'a Triple>,
{
    let mut grouped: Grouped<'a> = BTreeMap::new();
    for triple in facts {
        let values = grouped
            .entry(triple.subject.as_str())
            .or_default()
            .entry(triple.predicate.as_str())
            .or_default();
        if !values.contains(&&triple.object) {
            values.push(&triple.object);
        }
    }

    let mut builder = Builder {
        grouped: &grouped,
        memo: HashMap::new(),
    };
    let nodes: Vec<Node> = grouped
        .keys()
        .map(|subject| Node::clone(&builder.build(*subject)))
        .collect();
    debug!(nodes = nodes.len(), shared = builder.memo.len(), "materialized canonical document");
    CanonicalDocument { nodes }
}

/// Inlines nodes with an explicit stack, so nesting depth is bounded by
/// memory rather than by the call stack.
///
/// A finished node is memoized when nothing below it was cut short by a
/// subject at or above its own depth. Such a node is not on a reference
/// cycle and expands the same way under every path, so its subtree is
/// shared instead of rebuilt.
struct Builder<'g, 'a> {
    grouped: &'g Grouped<'a>,
    memo: HashMap<&'a str, Arc<Node>>,
}

/// A node being inlined.
struct Frame<'g, 'a> {
    subject: &'a str,
    predicates: btree_map::Iter<'g, &'a str, Vec<&'a Object>>,
    /// Predicate being filled and its remaining objects.
    current: Option<(&'a str, std::slice::Iter<'g, &'a Object>)>,
    values: Vec<Value>,
    properties: BTreeMap<String, Vec<Value>>,
    /// Shallowest path depth cut short anywhere below this frame.
    cut: usize,
}

impl<'g, 'a> Frame<'g, 'a> {
    /// The next object to place, moving to the following predicate as each
    /// one runs out.
    fn next_object(&mut self) -> Option<&'a Object> {
        loop {
            if let Some((predicate, objects)) = &mut self.current {
                if let Some(object) = objects.next() {
                    return Some(*object);
                }
                let values = std::mem::take(&mut self.values);
                self.properties.insert(predicate.to_string(), values);
                self.current = None;
            }
            let (predicate, objects) = self.predicates.next()?;
            self.current = Some((*predicate, objects.iter()));
        }
    }

    fn into_node(self) -> Node {
        Node {
            id: self.subject.to_string(),
            properties: self.properties,
        }
    }
}

impl<'g, 'a> Builder<'g, 'a> {
    fn frame(&self, subject: &'a str) -> Frame<'g, 'a> {
        let grouped: &'g Grouped<'a> = self.grouped;
        let predicates = match grouped.get(subject) {
            Some(predicates) => predicates.iter(),
            None => btree_map::Iter::default(),
        };
        Frame {
            subject,
            predicates,
            current: None,
            values: Vec::new(),
            properties: BTreeMap::new(),
            cut: usize::MAX,
        }
    }

    fn build(&mut self, root: &'a str) -> Arc<Node> {
        if let Some(node) = self.memo.get(root) {
            return Arc::clone(node);
        }

        // Ancestors of `frame`, outermost first.
        let mut path: Vec<Frame<'g, 'a>> = Vec::new();
        let mut frame = self.frame(root);
        loop {
            match frame.next_object() {
                Some(Object::Scalar(scalar)) => frame.values.push(Value::Scalar(scalar.clone())),
                Some(Object::Ref(reference)) => {
                    let target = reference.id.as_str();
                    let depth = if target == frame.subject {
                        Some(path.len())
                    } else {
                        path.iter().position(|ancestor| ancestor.subject == target)
                    };
                    if let Some(node) = self.memo.get(target) {
                        frame.values.push(Value::Node(Arc::clone(node)));
                    } else if let Some(depth) = depth {
                        frame.cut = frame.cut.min(depth);
                        frame.values.push(Value::Ref(reference.clone()));
                    } else if self.grouped.contains_key(target) {
                        let child = self.frame(target);
                        path.push(std::mem::replace(&mut frame, child));
                    } else {
                        frame.values.push(Value::Ref(reference.clone()));
                    }
                }
                None => {
                    let depth = path.len();
                    let cut = frame.cut;
                    match path.pop() {
                        Some(parent) => {
                            let done = std::mem::replace(&mut frame, parent);
                            let node = self.finish(done, depth);
                            frame.cut = frame.cut.min(cut);
                            frame.values.push(Value::Node(node));
                        }
                        None => return self.finish(frame, depth),
                    }
                }
            }
        }
    }

    fn finish(&mut self, frame: Frame<'g, 'a>, depth: usize) -> Arc<Node> {
        let subject = frame.subject;
        let shareable = frame.cut > depth;
        let node = Arc::new(frame.into_node());
        if shareable {
            self.memo.insert(subject, Arc::clone(&node));
        }
        node
    }
}

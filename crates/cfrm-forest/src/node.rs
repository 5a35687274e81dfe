//! Forest node: every operation known under one id.
//!
//! An id normally names one operation. A flattened document publishes
//! several triples under one shared id; those form the node's member group.
//! Members share the node's kind and base and are kept in a deterministic
//! order (see [`Operation::member_cmp`]).

use cfrm_ops::{Operation, OperationKind};
use cfrm_types::OpId;

use crate::error::{ForestError, ForestResult};

/// A node in the causal forest.
#[derive(Clone, Debug, PartialEq)]
pub struct ForestNode {
    id: OpId,
    kind: OperationKind,
    base: Option<OpId>,
    members: Vec<Operation>,
}

impl ForestNode {
    /// Create a node from its first operation.
    pub fn new(op: Operation) -> Self {
        Self {
            id: op.id(),
            kind: op.kind(),
            base: op.base(),
            members: vec![op],
        }
    }

    pub fn id(&self) -> OpId {
        self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// The id this node causally follows.
    pub fn base(&self) -> Option<OpId> {
        self.base
    }

    /// Returns `true` if this node has no base (i.e., it is a root).
    pub fn is_root(&self) -> bool {
        self.base.is_none()
    }

    /// Operations under this id, in deterministic order.
    pub fn members(&self) -> &[Operation] {
        &self.members
    }

    /// Add an operation sharing this node's id.
    ///
    /// Returns `Ok(false)` if an identical operation is already a member.
    pub fn add_member(&mut self, op: Operation) -> ForestResult<bool> {
        debug_assert_eq!(op.id(), self.id);
        if op.kind() != self.kind {
            return Err(self.conflict(format!("kind {} differs from known {}", op.kind(), self.kind)));
        }
        if op.base() != self.base {
            return Err(self.conflict(format!(
                "base {} differs from known {}",
                describe(op.base()),
                describe(self.base)
            )));
        }
        if self.members.contains(&op) {
            return Ok(false);
        }
        let position = self
            .members
            .partition_point(|known| known.member_cmp(&op).is_lt());
        self.members.insert(position, op);
        Ok(true)
    }

    /// Returns a human-readable summary of this node.
    pub fn summary(&self) -> String {
        format!(
            "{} {} ({} member(s), base {})",
            self.kind,
            self.id.short_id(),
            self.members.len(),
            describe(self.base),
        )
    }

    fn conflict(&self, reason: String) -> ForestError {
        ForestError::ConflictingOperation {
            id: self.id,
            reason,
        }
    }
}

fn describe(base: Option<OpId>) -> String {
    base.map_or_else(|| "none".to_string(), |b| b.short_id())
}

#[cfg(test)]
mod tests {
    use cfrm_ops::{Publish, Retract};

    use super::*;

    fn publish(id: OpId, subject: &str, value: i64) -> Operation {
        Publish::new(subject, "p", value).with_id(id).into()
    }

    #[test]
    fn root_node_has_no_base() {
        let node = ForestNode::new(Operation::publish("a", "b", "c"));
        assert!(node.is_root());
        assert_eq!(node.members().len(), 1);
    }

    #[test]
    fn retraction_is_not_a_root() {
        let target = cfrm_types::mint();
        let node = ForestNode::new(Operation::retract(target));
        assert!(!node.is_root());
        assert_eq!(node.base(), Some(target));
        assert_eq!(node.kind(), OperationKind::Retract);
    }

    #[test]
    fn identical_member_is_ignored() {
        let id = cfrm_types::mint();
        let mut node = ForestNode::new(publish(id, "a", 1));
        assert!(!node.add_member(publish(id, "a", 1)).unwrap());
        assert_eq!(node.members().len(), 1);
    }

    #[test]
    fn members_are_ordered_independently_of_arrival() {
        let id = cfrm_types::mint();
        let mut forward = ForestNode::new(publish(id, "a", 1));
        forward.add_member(publish(id, "b", 1)).unwrap();
        forward.add_member(publish(id, "c", 1)).unwrap();

        let mut backward = ForestNode::new(publish(id, "c", 1));
        backward.add_member(publish(id, "b", 1)).unwrap();
        backward.add_member(publish(id, "a", 1)).unwrap();

        assert_eq!(forward, backward);
    }

    #[test]
    fn differing_kind_conflicts() {
        let id = cfrm_types::mint();
        let mut node = ForestNode::new(publish(id, "a", 1));
        let retract: Operation = Retract::from_ids(id, cfrm_types::mint()).into();
        let err = node.add_member(retract).unwrap_err();
        assert!(matches!(err, ForestError::ConflictingOperation { .. }));
    }

    #[test]
    fn differing_base_conflicts() {
        let id = cfrm_types::mint();
        let mut node = ForestNode::new(publish(id, "a", 1));
        let rebased: Operation = Publish::new("a", "p", 2i64)
            .with_id(id)
            .with_base(cfrm_types::mint())
            .into();
        assert!(node.add_member(rebased).is_err());
    }

    #[test]
    fn summary_contains_key_info() {
        let node = ForestNode::new(Operation::publish("a", "b", "c"));
        let summary = node.summary();
        assert!(summary.starts_with("publish"));
        assert!(summary.contains("1 member(s)"));
    }
}

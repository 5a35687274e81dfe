//! The causal forest and its canonical traversal.
//!
//! [`CausalForest`] stores one [`ForestNode`] per operation id in a
//! [`HashMap`] and maintains a forward-edge index (`children`) from each id
//! to the ids that name it as their base. Nodes without a base are tracked
//! separately as roots.
//!
//! # Invariants
//!
//! - Every id appears as at most one node.
//! - Each node has at most one base, so the reachable part is a forest.
//! - `roots` and every `children` list are sorted by id.
//! - A node whose base is not (yet) known is stored but unreachable; it
//!   joins the traversal as soon as its base arrives.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use cfrm_ops::Operation;
use cfrm_types::OpId;

use crate::error::{ForestError, ForestResult};
use crate::node::ForestNode;

/// Operations linked by their `base` into a forest of causal trees.
#[derive(Clone, Debug, Default)]
pub struct CausalForest {
    /// All nodes, keyed by operation id.
    nodes: HashMap<OpId, ForestNode>,
    /// Forward-edge index: base -> sorted ids of the nodes that follow it.
    children: HashMap<OpId, Vec<OpId>>,
    /// Sorted ids of nodes without a base.
    roots: Vec<OpId>,
}

impl CausalForest {
    /// Create an empty forest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct operation ids.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Number of stored operations, counting every member of every node.
    pub fn operation_count(&self) -> usize {
        self.nodes.values().map(|node| node.members().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &OpId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &OpId) -> Option<&ForestNode> {
        self.nodes.get(id)
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Insert an operation.
    ///
    /// Returns `Ok(false)` if an identical operation is already stored.
    /// An operation reusing a known id joins that id's member group when its
    /// kind and base match, and is rejected otherwise. The base does not have
    /// to be known yet.
    pub fn insert(&mut self, op: Operation) -> ForestResult<bool> {
        op.validate()?;
        let id = op.id();

        if let Some(node) = self.nodes.get_mut(&id) {
            let added = node.add_member(op)?;
            if added {
                debug!(node = %id.short_id(), members = node.members().len(), "extended forest node");
            }
            return Ok(added);
        }

        let node = ForestNode::new(op);
        match node.base() {
            None => insert_sorted(&mut self.roots, id),
            Some(base) => insert_sorted(self.children.entry(base).or_default(), id),
        }
        debug!(node = %id.short_id(), kind = %node.kind(), "added forest node");
        self.nodes.insert(id, node);
        Ok(true)
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// Ids of all nodes without a base, in id order.
    pub fn roots(&self) -> &[OpId] {
        &self.roots
    }

    /// Ids of the nodes naming `id` as their base, in id order.
    ///
    /// Children may be present even when `id` itself is not.
    pub fn children(&self, id: &OpId) -> &[OpId] {
        self.children.get(id).map_or(&[], Vec::as_slice)
    }

    /// Canonical depth-first pre-order over everything reachable from the
    /// roots: roots in id order, each node before its descendants, siblings
    /// in id order.
    ///
    /// The order depends only on the set of stored operations, never on the
    /// order they were inserted in.
    pub fn traverse(&self) -> Vec<&ForestNode> {
        let mut result = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<OpId> = self.roots.iter().rev().copied().collect();

        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            result.push(node);
            stack.extend(self.children(&id).iter().rev().copied());
        }

        result
    }

    /// Nodes not reachable from any root, in id order.
    ///
    /// These wait for a base that has not been delivered (or sit on a base
    /// cycle, which no root can reach).
    pub fn unreachable(&self) -> Vec<&ForestNode> {
        let reached: HashSet<OpId> = self.traverse().iter().map(|node| node.id()).collect();
        let mut pending: Vec<&ForestNode> = self
            .nodes
            .values()
            .filter(|node| !reached.contains(&node.id()))
            .collect();
        pending.sort_by_key(|node| node.id());
        pending
    }

    /// Every stored operation: reachable ones in traversal order followed by
    /// unreachable ones in id order.
    pub fn operations(&self) -> Vec<&Operation> {
        self.traverse()
            .into_iter()
            .chain(self.unreachable())
            .flat_map(|node| node.members().iter())
            .collect()
    }

    // ---------------------------------------------------------------
    // Integrity
    // ---------------------------------------------------------------

    /// Check that the roots and children indexes agree with the nodes.
    pub fn validate(&self) -> ForestResult<()> {
        let mut indexed = HashSet::with_capacity(self.nodes.len());

        for window in self.roots.windows(2) {
            if window[0] >= window[1] {
                return Err(ForestError::CorruptIndex(window[1]));
            }
        }
        for id in &self.roots {
            match self.nodes.get(id) {
                Some(node) if node.is_root() => indexed.insert(*id),
                _ => return Err(ForestError::CorruptIndex(*id)),
            };
        }

        for (base, ids) in &self.children {
            for window in ids.windows(2) {
                if window[0] >= window[1] {
                    return Err(ForestError::CorruptIndex(window[1]));
                }
            }
            for id in ids {
                match self.nodes.get(id) {
                    Some(node) if node.base() == Some(*base) => indexed.insert(*id),
                    _ => return Err(ForestError::CorruptIndex(*id)),
                };
            }
        }

        match self.nodes.keys().find(|id| !indexed.contains(*id)) {
            Some(id) => Err(ForestError::CorruptIndex(*id)),
            None => Ok(()),
        }
    }
}

fn insert_sorted(ids: &mut Vec<OpId>, id: OpId) {
    if let Err(position) = ids.binary_search(&id) {
        ids.insert(position, id);
    }
}

#[cfg(test)]
mod tests {
    use cfrm_ops::{Publish, Retract};

    use super::*;

    fn id(n: u64) -> OpId {
        OpId::from_parts(1_000 + n, 0, n)
    }

    fn make_publish(n: u64, base: Option<u64>) -> Operation {
        let publish = Publish::new("s", "p", n).with_id(id(n));
        match base {
            Some(b) => publish.with_base(id(b)).into(),
            None => publish.into(),
        }
    }

    fn make_retract(n: u64, base: u64) -> Operation {
        Retract::from_ids(id(n), id(base)).into()
    }

    fn traversal_ids(forest: &CausalForest) -> Vec<OpId> {
        forest.traverse().iter().map(|node| node.id()).collect()
    }

    fn build(ops: &[Operation]) -> CausalForest {
        let mut forest = CausalForest::new();
        for op in ops {
            forest.insert(op.clone()).unwrap();
        }
        forest
    }

    #[test]
    fn empty_forest() {
        let forest = CausalForest::new();
        assert!(forest.is_empty());
        assert!(forest.traverse().is_empty());
        assert!(forest.unreachable().is_empty());
        forest.validate().unwrap();
    }

    #[test]
    fn roots_and_children_are_sorted() {
        let forest = build(&[
            make_publish(3, None),
            make_publish(1, None),
            make_publish(5, Some(1)),
            make_publish(4, Some(1)),
        ]);
        assert_eq!(forest.roots(), &[id(1), id(3)]);
        assert_eq!(forest.children(&id(1)), &[id(4), id(5)]);
        assert!(forest.children(&id(3)).is_empty());
        forest.validate().unwrap();
    }

    #[test]
    fn traversal_is_depth_first_pre_order() {
        // 1 ─┬─ 2 ── 4
        //    └─ 3
        // 5
        let forest = build(&[
            make_publish(1, None),
            make_publish(2, Some(1)),
            make_publish(3, Some(1)),
            make_publish(4, Some(2)),
            make_publish(5, None),
        ]);
        assert_eq!(traversal_ids(&forest), vec![id(1), id(2), id(4), id(3), id(5)]);
    }

    #[test]
    fn traversal_ignores_insertion_order() {
        let ops = vec![
            make_publish(1, None),
            make_publish(2, Some(1)),
            make_retract(3, 2),
            make_publish(4, Some(2)),
            make_publish(5, None),
        ];
        let forward = build(&ops);
        let mut reversed = ops.clone();
        reversed.reverse();
        let backward = build(&reversed);
        assert_eq!(traversal_ids(&forward), traversal_ids(&backward));
        assert_eq!(forward.operations(), backward.operations());
    }

    #[test]
    fn missing_base_is_unreachable_until_it_arrives() {
        let mut forest = build(&[make_publish(2, Some(1)), make_retract(3, 2)]);
        assert!(forest.traverse().is_empty());
        let pending: Vec<OpId> = forest.unreachable().iter().map(|n| n.id()).collect();
        assert_eq!(pending, vec![id(2), id(3)]);
        assert_eq!(forest.operations().len(), 2);

        forest.insert(make_publish(1, None)).unwrap();
        assert_eq!(traversal_ids(&forest), vec![id(1), id(2), id(3)]);
        assert!(forest.unreachable().is_empty());
        forest.validate().unwrap();
    }

    #[test]
    fn base_cycle_is_unreachable() {
        let forest = build(&[make_publish(1, Some(2)), make_publish(2, Some(1))]);
        assert!(forest.traverse().is_empty());
        assert_eq!(forest.unreachable().len(), 2);
    }

    #[test]
    fn identical_insert_is_a_no_op() {
        let mut forest = CausalForest::new();
        assert!(forest.insert(make_publish(1, None)).unwrap());
        assert!(!forest.insert(make_publish(1, None)).unwrap());
        assert_eq!(forest.len(), 1);
        assert_eq!(forest.operation_count(), 1);
        assert_eq!(forest.roots(), &[id(1)]);
    }

    #[test]
    fn shared_id_forms_a_member_group() {
        let shared = id(1);
        let mut forest = CausalForest::new();
        forest.insert(Publish::new("a", "p", 1i64).with_id(shared).into()).unwrap();
        forest.insert(Publish::new("b", "p", 2i64).with_id(shared).into()).unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest.operation_count(), 2);
        assert_eq!(forest.roots(), &[shared]);
    }

    #[test]
    fn conflicting_reuse_of_an_id_is_rejected() {
        let mut forest = build(&[make_publish(1, None), make_publish(2, None)]);
        let err = forest.insert(make_retract(2, 1)).unwrap_err();
        assert!(matches!(err, ForestError::ConflictingOperation { id: conflict, .. } if conflict == id(2)));
        let err = forest.insert(make_publish(2, Some(1))).unwrap_err();
        assert!(matches!(err, ForestError::ConflictingOperation { .. }));
        assert_eq!(forest.operation_count(), 2);
        forest.validate().unwrap();
    }

    #[test]
    fn self_referencing_operation_is_rejected() {
        let mut forest = CausalForest::new();
        let err = forest.insert(make_retract(1, 1)).unwrap_err();
        assert!(matches!(err, ForestError::Invalid(_)));
        assert!(forest.is_empty());
    }

    #[test]
    fn long_chain_does_not_recurse() {
        let mut forest = CausalForest::new();
        forest.insert(make_publish(0, None)).unwrap();
        for n in 1..50_000 {
            forest.insert(make_publish(n, Some(n - 1))).unwrap();
        }
        let order = traversal_ids(&forest);
        assert_eq!(order.len(), 50_000);
        assert_eq!(order[49_999], id(49_999));
    }

    #[test]
    fn validate_detects_corrupt_index() {
        let mut forest = build(&[make_publish(1, None), make_publish(2, Some(1))]);
        forest.children.clear();
        assert!(matches!(forest.validate(), Err(ForestError::CorruptIndex(_))));
    }
}

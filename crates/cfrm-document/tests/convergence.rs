//! Property tests for delivery-order independence of the merge engine.
//!
//! Batches are generated as causal histories (publishes, rebased publishes,
//! retractions of earlier operations), then delivered shuffled, split, and
//! repeated. Every delivery must produce the same canonical bytes.

use cfrm_document::{Document, Permutations};
use cfrm_ops::{Operation, Publish, Retract};
use cfrm_types::{Object, OpId};
use proptest::prelude::*;

const SUBJECTS: [&str; 4] = ["root0", "sub0", "sub1", "sub2"];

#[derive(Clone, Debug)]
enum Step {
    Publish { subject: usize, value: i64 },
    Link { subject: usize, target: usize },
    Rebase { earlier: usize, subject: usize, value: i64 },
    Retract { earlier: usize },
}

fn op_id(index: usize) -> OpId {
    OpId::from_parts(1_000 + index as u64, 0, index as u64)
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0..SUBJECTS.len(), 0i64..5).prop_map(|(subject, value)| Step::Publish { subject, value }),
        (0..SUBJECTS.len(), 0..SUBJECTS.len()).prop_map(|(subject, target)| Step::Link { subject, target }),
        (any::<usize>(), 0..SUBJECTS.len(), 0i64..5)
            .prop_map(|(earlier, subject, value)| Step::Rebase { earlier, subject, value }),
        any::<usize>().prop_map(|earlier| Step::Retract { earlier }),
    ]
}

fn build_history(steps: &[Step]) -> Vec<Operation> {
    steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let id = op_id(index);
            match *step {
                Step::Retract { earlier } if index > 0 => {
                    Retract::from_ids(id, op_id(earlier % index)).into()
                }
                Step::Rebase { earlier, subject, value } if index > 0 => {
                    Publish::new(SUBJECTS[subject], "v", value)
                        .with_id(id)
                        .with_base(op_id(earlier % index))
                        .into()
                }
                Step::Link { subject, target } => {
                    Publish::new(SUBJECTS[subject], "link", Object::reference(SUBJECTS[target]))
                        .with_id(id)
                        .into()
                }
                Step::Publish { subject, value }
                | Step::Rebase { subject, value, .. } => {
                    Publish::new(SUBJECTS[subject], "v", value).with_id(id).into()
                }
                Step::Retract { .. } => Publish::new(SUBJECTS[0], "v", 0i64).with_id(id).into(),
            }
        })
        .collect()
}

fn canonical_bytes(doc: &Document) -> String {
    doc.snapshot()
        .to_json_string(false)
        .unwrap_or_else(|e| panic!("serialize snapshot failed: {e}"))
}

fn history_and_shuffle() -> impl Strategy<Value = (Vec<Operation>, Vec<Operation>, usize)> {
    prop::collection::vec(step_strategy(), 1..24).prop_flat_map(|steps| {
        let ops = build_history(&steps);
        let len = ops.len();
        (Just(ops.clone()), Just(ops).prop_shuffle(), 0..=len)
    })
}

proptest! {
    #[test]
    fn shuffled_delivery_converges((ops, shuffled, _split) in history_and_shuffle()) {
        let expected = Document::from_operations(ops).unwrap();
        let actual = Document::from_operations(shuffled).unwrap();
        prop_assert_eq!(canonical_bytes(&expected), canonical_bytes(&actual));
    }

    #[test]
    fn split_delivery_converges((ops, shuffled, split) in history_and_shuffle()) {
        let expected = Document::from_operations(ops).unwrap();

        let mut actual = Document::new();
        actual.ingest(shuffled[..split].to_vec()).unwrap();
        actual.ingest(shuffled[split..].to_vec()).unwrap();
        prop_assert_eq!(canonical_bytes(&expected), canonical_bytes(&actual));
    }

    #[test]
    fn one_at_a_time_delivery_converges((ops, shuffled, _split) in history_and_shuffle()) {
        let expected = Document::from_operations(ops).unwrap();

        let mut actual = Document::new();
        for op in shuffled {
            actual.ingest([op]).unwrap();
        }
        prop_assert_eq!(canonical_bytes(&expected), canonical_bytes(&actual));
        prop_assert_eq!(expected.len(), actual.len());
    }

    #[test]
    fn reingest_is_idempotent((ops, shuffled, _split) in history_and_shuffle()) {
        let mut doc = Document::from_operations(ops).unwrap();
        let before = canonical_bytes(&doc);
        let report = doc.ingest(shuffled).unwrap();
        prop_assert_eq!(report.added, 0);
        prop_assert_eq!(before, canonical_bytes(&doc));
    }
}

#[test]
fn retract_then_republish_chain_converges_for_every_permutation() {
    let ops: Vec<Operation> = vec![
        Publish::new("a", "b", "c").with_id(op_id(0)).into(),
        Retract::from_ids(op_id(1), op_id(0)).into(),
        Publish::new("a", "b", "d").with_id(op_id(2)).with_base(op_id(1)).into(),
        Retract::from_ids(op_id(3), op_id(2)).into(),
        Publish::new("a", "b", "c").with_id(op_id(4)).with_base(op_id(3)).into(),
    ];

    let mut checked = 0;
    for ordering in Permutations::new(ops.len()) {
        let delivered: Vec<Operation> = ordering.iter().map(|&i| ops[i].clone()).collect();
        let doc = Document::from_operations(delivered).unwrap();
        assert_eq!(canonical_bytes(&doc), r#"[{"@id":"a","b":["c"]}]"#);
        checked += 1;
    }
    assert_eq!(checked, 120);
}

#[test]
fn full_retraction_clears_live_facts_in_every_order() {
    let pub0: Operation = Publish::new("root0", "A", 42i64).with_id(op_id(0)).into();
    let pub1: Operation = Publish::new("root0", "A", "hi").with_id(op_id(1)).into();
    let ret0: Operation = Retract::from_ids(op_id(2), op_id(0)).into();
    let ret1: Operation = Retract::from_ids(op_id(3), op_id(1)).into();
    let ops = [pub0, pub1, ret0, ret1];

    for ordering in Permutations::new(ops.len()) {
        let doc = Document::from_operations(ordering.iter().map(|&i| ops[i].clone())).unwrap();
        assert!(doc.facts().is_empty());
        assert!(doc.snapshot().is_empty());
    }
}

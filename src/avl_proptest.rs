#![cfg(test)]

// Property tests for the AVL core, kept in-crate so they can reuse the
// sorted-placement helpers from `avl::tests`.

use crate::avl::tests::{in_order, insert, Item};
use crate::avl::{unlink, verify};
use crate::avl_order::{rank, select};
use proptest::prelude::*;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
enum Op {
    Insert(i32),
    // Index into the sorted live set, taken modulo its length.
    Remove(usize),
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        3 => (-500i32..500).prop_map(Op::Insert),
        2 => any::<usize>().prop_map(Op::Remove),
    ];
    proptest::collection::vec(op, 1..300)
}

// Property: model equivalence against a BTreeMap of live value -> record.
// After every operation:
// - `verify` passes (parent links, height, count, AVL bound) and counts the
//   model's length;
// - in-order traversal equals the model's sorted sequence;
// - rank/select agree with positions in the model;
// - an unlinked record comes back detached.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_matches_sorted_model(ops in arb_ops()) {
        let mut store: Vec<Item> = Vec::new();
        let mut root: Option<usize> = None;
        let mut model: BTreeMap<i32, usize> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(v) => {
                    if !model.contains_key(&v) {
                        root = Some(insert(&mut store, root, v));
                        model.insert(v, store.len() - 1);
                    }
                }
                Op::Remove(i) => {
                    if model.is_empty() {
                        continue;
                    }
                    let v = *model.keys().nth(i % model.len()).unwrap();
                    let k = model.remove(&v).unwrap();
                    root = unlink(&mut store, k);
                    prop_assert!(store[k].node.is_detached());
                }
            }

            prop_assert_eq!(verify(&store, root), Ok(model.len()));

            let mut seen = Vec::new();
            in_order(&store, root, &mut seen);
            let expected: Vec<i32> = model.keys().copied().collect();
            prop_assert_eq!(&seen, &expected);

            if let Some(mid) = expected.get(expected.len() / 2) {
                let k = select(&store, root, expected.len() / 2).unwrap();
                prop_assert_eq!(store[k].val, *mid);
                prop_assert_eq!(rank(&store, k), expected.len() / 2);
            }
        }
    }
}

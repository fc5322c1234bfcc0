#![cfg(test)]

// Property tests for HMap kept inside the crate so they can use a tiny
// rehash policy and watch every migration step.

use crate::hmap::{HMap, RehashPolicy, RehashState};
use crate::table::{ByHash, HashLinked, HashNode};
use proptest::prelude::*;
use slotmap::{DefaultKey, SlotMap};
use std::collections::HashMap;

struct Entry {
    key: u32,
    node: HashNode<DefaultKey>,
}

impl HashLinked<DefaultKey> for Entry {
    fn hash_node(&self) -> &HashNode<DefaultKey> {
        &self.node
    }
    fn hash_node_mut(&mut self) -> &mut HashNode<DefaultKey> {
        &mut self.node
    }
}

// Deliberately weak hash so chains collide.
fn hash_of(key: u32) -> u64 {
    u64::from(key % 97)
}

fn probe(key: u32) -> ByHash<impl Fn(&Entry) -> bool> {
    ByHash::new(hash_of(key), move |e: &Entry| e.key == key)
}

#[derive(Clone, Debug)]
enum Op {
    Insert(u32),
    Delete(u32),
    Lookup(u32),
    Advance,
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let key = 0u32..400;
    let op = prop_oneof![
        6 => key.clone().prop_map(Op::Insert),
        2 => key.clone().prop_map(Op::Delete),
        3 => key.prop_map(Op::Lookup),
        1 => Just(Op::Advance),
    ];
    proptest::collection::vec(op, 1..600)
}

fn pending(m: &HMap<DefaultKey>) -> usize {
    match m.state() {
        RehashState::Stable => 0,
        RehashState::Migrating { pending, .. } => pending,
    }
}

// Property: state-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences with a policy that
// resizes early and migrates slowly:
// - `lookup` finds exactly the keys inserted and not yet deleted;
// - `delete` returns the record inserted for that key, then it is gone;
// - `len` matches the model after every operation, mid-migration included;
// - one call never drains more than `quota` nodes from the older table
//   (plus the node a delete removes itself);
// - `verify` passes after every operation.
proptest! {
    #![proptest_config(ProptestConfig { cases: 48, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine(quota in 1usize..6, ops in arb_ops()) {
        let policy = RehashPolicy::new()
            .with_min_capacity(1)
            .with_max_load_factor(2)
            .with_migration_quota(quota);
        let mut store: SlotMap<DefaultKey, Entry> = SlotMap::new();
        let mut sut: HMap<DefaultKey> = HMap::with_policy(policy);
        let mut model: HashMap<u32, DefaultKey> = HashMap::new();

        for op in ops {
            let before = pending(&sut);
            let mut deleted = 0;
            match op {
                Op::Insert(k) => {
                    if !model.contains_key(&k) {
                        let id = store.insert(Entry { key: k, node: HashNode::new(hash_of(k)) });
                        sut.insert(&mut store, id);
                        model.insert(k, id);
                    }
                }
                Op::Delete(k) => {
                    let got = sut.delete(&mut store, &probe(k));
                    prop_assert_eq!(got, model.remove(&k));
                    if let Some(id) = got {
                        store.remove(id);
                        deleted = 1;
                    }
                }
                Op::Lookup(k) => {
                    let got = sut.lookup(&mut store, &probe(k));
                    prop_assert_eq!(got, model.get(&k).copied());
                }
                Op::Advance => {
                    prop_assert!(sut.advance_migration(&mut store) <= quota);
                }
            }

            let after = pending(&sut);
            if after > 0 || before > 0 {
                prop_assert!(
                    before.saturating_sub(after) <= quota + deleted,
                    "drained {} nodes with quota {}", before - after, quota
                );
            }
            prop_assert_eq!(sut.len(), model.len());
            prop_assert!(sut.verify(&store).is_ok());
        }

        // Every live key is still reachable after the run.
        for (k, id) in &model {
            prop_assert_eq!(sut.lookup(&mut store, &probe(*k)), Some(*id));
        }
    }
}

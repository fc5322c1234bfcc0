// A sorted set built from both structures.
//
// Each member record embeds a `HashNode` (indexed by name) and an `AvlNode`
// (ordered by score, then name) and lives once in a shared SlotMap. This is
// the layout a sorted-set value in a key-value store uses: O(1) membership by
// name plus rank and range queries through the tree's subtree counts.
use kvcore::{
    attach, offset, rank, rebalance, select, unlink, AvlLinked, AvlNode, ByHash, HMap, HashLinked,
    HashNode, InOrder, Side,
};
use slotmap::{DefaultKey, SlotMap};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

struct Member {
    name: String,
    score: i64,
    by_name: HashNode<DefaultKey>,
    by_score: AvlNode<DefaultKey>,
}

impl HashLinked<DefaultKey> for Member {
    fn hash_node(&self) -> &HashNode<DefaultKey> {
        &self.by_name
    }
    fn hash_node_mut(&mut self) -> &mut HashNode<DefaultKey> {
        &mut self.by_name
    }
}

impl AvlLinked<DefaultKey> for Member {
    fn avl(&self) -> &AvlNode<DefaultKey> {
        &self.by_score
    }
    fn avl_mut(&mut self) -> &mut AvlNode<DefaultKey> {
        &mut self.by_score
    }
}

fn hash_name(name: &str) -> u64 {
    let mut h = DefaultHasher::new();
    name.hash(&mut h);
    h.finish()
}

fn by_name(name: &str) -> ByHash<impl Fn(&Member) -> bool + '_> {
    ByHash::new(hash_name(name), move |m: &Member| m.name == name)
}

#[derive(Default)]
struct SortedSet {
    members: SlotMap<DefaultKey, Member>,
    index: HMap<DefaultKey>,
    root: Option<DefaultKey>,
}

impl SortedSet {
    fn len(&self) -> usize {
        self.index.len()
    }

    fn find(&mut self, name: &str) -> Option<DefaultKey> {
        self.index.lookup(&mut self.members, &by_name(name))
    }

    fn score(&mut self, name: &str) -> Option<i64> {
        self.find(name).map(|k| self.members[k].score)
    }

    fn tree_insert(&mut self, k: DefaultKey) {
        let key = (self.members[k].score, self.members[k].name.clone());
        let mut cur = match self.root {
            Some(r) => r,
            None => {
                self.root = Some(rebalance(&mut self.members, k));
                return;
            }
        };
        loop {
            let m = &self.members[cur];
            let side = if (key.0, key.1.as_str()) < (m.score, m.name.as_str()) {
                Side::Left
            } else {
                Side::Right
            };
            match m.by_score.child(side) {
                Some(next) => cur = next,
                None => {
                    attach(&mut self.members, cur, side, k);
                    self.root = Some(rebalance(&mut self.members, k));
                    return;
                }
            }
        }
    }

    // Returns true when the name is new.
    fn add(&mut self, name: &str, score: i64) -> bool {
        if let Some(k) = self.find(name) {
            if self.members[k].score != score {
                self.root = unlink(&mut self.members, k);
                self.members[k].score = score;
                self.tree_insert(k);
            }
            return false;
        }
        let k = self.members.insert(Member {
            name: name.to_string(),
            score,
            by_name: HashNode::new(hash_name(name)),
            by_score: AvlNode::new(),
        });
        self.index.insert(&mut self.members, k);
        self.tree_insert(k);
        true
    }

    fn remove(&mut self, name: &str) -> bool {
        match self.index.delete(&mut self.members, &by_name(name)) {
            Some(k) => {
                self.root = unlink(&mut self.members, k);
                self.members.remove(k);
                true
            }
            None => false,
        }
    }

    fn rank_of(&mut self, name: &str) -> Option<usize> {
        self.find(name).map(|k| rank(&self.members, k))
    }

    // First member with score >= min.
    fn lower_bound(&self, min: i64) -> Option<DefaultKey> {
        let mut cur = self.root;
        let mut best = None;
        while let Some(k) = cur {
            let m = &self.members[k];
            if m.score >= min {
                best = Some(k);
                cur = m.by_score.left();
            } else {
                cur = m.by_score.right();
            }
        }
        best
    }

    // Up to `limit` names with score >= min, skipping the first `skip`.
    fn range(&self, min: i64, skip: i64, limit: usize) -> Vec<String> {
        let mut out = Vec::new();
        let mut cur = self.lower_bound(min).and_then(|k| offset(&self.members, k, skip));
        while let Some(k) = cur {
            if out.len() == limit {
                break;
            }
            out.push(self.members[k].name.clone());
            cur = offset(&self.members, k, 1);
        }
        out
    }

    fn names(&self) -> Vec<String> {
        InOrder::new(&self.members, self.root)
            .map(|k| self.members[k].name.clone())
            .collect()
    }

    fn check(&self) {
        assert_eq!(kvcore::avl::verify(&self.members, self.root), Ok(self.len()));
        self.index.verify(&self.members).unwrap();
    }
}

// Test: add, update and remove with both indexes checked.
// Verifies: name lookups and score order stay consistent after each change.
#[test]
fn add_update_remove() {
    let mut set = SortedSet::default();
    assert!(set.add("carol", 30));
    assert!(set.add("alice", 10));
    assert!(set.add("bob", 20));
    assert!(set.add("dave", 20));
    set.check();
    assert_eq!(set.names(), ["alice", "bob", "dave", "carol"]);
    assert_eq!(set.rank_of("dave"), Some(2));

    // Rescoring moves the record in the tree but not in the hash index.
    assert!(!set.add("alice", 25));
    set.check();
    assert_eq!(set.names(), ["bob", "dave", "alice", "carol"]);
    assert_eq!(set.score("alice"), Some(25));
    assert_eq!(set.rank_of("alice"), Some(2));

    assert!(set.remove("dave"));
    assert!(!set.remove("dave"));
    set.check();
    assert_eq!(set.names(), ["bob", "alice", "carol"]);
    assert_eq!(set.rank_of("dave"), None);
    assert_eq!(set.len(), 3);
}

// Test: range queries through lower bound plus offset.
// Verifies: skip and limit select the expected window of the score order.
#[test]
fn range_by_score_with_offset() {
    let mut set = SortedSet::default();
    for i in 0..100i64 {
        set.add(&format!("m{:03}", i), i * 10);
    }
    set.check();

    assert_eq!(set.range(250, 0, 3), ["m025", "m026", "m027"]);
    // A bound between scores starts at the next member.
    assert_eq!(set.range(255, 0, 2), ["m026", "m027"]);
    assert_eq!(set.range(250, 5, 2), ["m030", "m031"]);
    assert_eq!(set.range(980, 0, 10), ["m098", "m099"]);
    assert!(set.range(980, 2, 10).is_empty());
    assert!(set.range(2000, 0, 10).is_empty());

    let k = select(&set.members, set.root, 42).unwrap();
    assert_eq!(set.members[k].name, "m042");
}

// Test: a randomized workload against a sorted Vec model.
// Verifies: ranks and membership agree with the model while the hash index
// migrates through several resizes.
#[test]
fn randomized_against_sorted_model() {
    let mut set = SortedSet::default();
    let mut model: Vec<(i64, String)> = Vec::new();
    let mut s: u64 = 0xfeed;
    let mut next = move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        s >> 33
    };

    for step in 0..5000 {
        let r = next();
        let name = format!("n{}", r % 700);
        let score = (next() % 1000) as i64;
        if r % 4 == 0 {
            let removed = set.remove(&name);
            let pos = model.iter().position(|(_, n)| *n == name);
            assert_eq!(removed, pos.is_some());
            if let Some(pos) = pos {
                model.remove(pos);
            }
        } else {
            let added = set.add(&name, score);
            let pos = model.iter().position(|(_, n)| *n == name);
            assert_eq!(added, pos.is_none());
            if let Some(pos) = pos {
                model.remove(pos);
            }
            model.push((score, name.clone()));
            model.sort();
            let expected = model.iter().position(|(_, n)| *n == name);
            assert_eq!(set.rank_of(&name), expected);
        }
        assert_eq!(set.len(), model.len());
        if step % 500 == 0 {
            set.check();
        }
    }

    set.check();
    let expected: Vec<String> = model.iter().map(|(_, n)| n.clone()).collect();
    assert_eq!(set.names(), expected);
}

//! In-order navigation and order statistics over the `count` augmentation.
//!
//! None of these mutate the tree. Rank walks are O(log n) because every
//! node knows the size of its subtree.

use crate::avl::{count, links, AvlLinked};
use crate::store::NodeStore;

/// Leftmost node under `root`.
pub fn first<S>(store: &S, root: Option<S::Key>) -> Option<S::Key>
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    let mut node = root?;
    while let Some(l) = links(store, node).left() {
        node = l;
    }
    Some(node)
}

/// Rightmost node under `root`.
pub fn last<S>(store: &S, root: Option<S::Key>) -> Option<S::Key>
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    let mut node = root?;
    while let Some(r) = links(store, node).right() {
        node = r;
    }
    Some(node)
}

pub fn successor<S>(store: &S, node: S::Key) -> Option<S::Key>
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    if let Some(r) = links(store, node).right() {
        return first(store, Some(r));
    }
    let mut cur = node;
    while let Some(parent) = links(store, cur).parent() {
        if links(store, parent).left() == Some(cur) {
            return Some(parent);
        }
        cur = parent;
    }
    None
}

pub fn predecessor<S>(store: &S, node: S::Key) -> Option<S::Key>
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    if let Some(l) = links(store, node).left() {
        return last(store, Some(l));
    }
    let mut cur = node;
    while let Some(parent) = links(store, cur).parent() {
        if links(store, parent).right() == Some(cur) {
            return Some(parent);
        }
        cur = parent;
    }
    None
}

/// The node `delta` positions away from `node` in sorted order, or `None`
/// when that position falls outside the tree.
///
/// `pos` tracks the rank of the current node relative to the start. Each step
/// either descends into the subtree that must contain the target or climbs to
/// the parent, adjusting `pos` by the size of the subtree skipped over.
pub fn offset<S>(store: &S, node: S::Key, delta: i64) -> Option<S::Key>
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    let mut node = node;
    let mut pos: i64 = 0;
    while pos != delta {
        let n = links(store, node);
        let right_cnt = i64::from(count(store, n.right()));
        let left_cnt = i64::from(count(store, n.left()));
        if pos < delta && pos + right_cnt >= delta {
            let r = n.right()?;
            node = r;
            pos += i64::from(count(store, links(store, r).left())) + 1;
        } else if pos > delta && pos - left_cnt <= delta {
            let l = n.left()?;
            node = l;
            pos -= i64::from(count(store, links(store, l).right())) + 1;
        } else {
            let parent = n.parent()?;
            if links(store, parent).right() == Some(node) {
                pos -= left_cnt + 1;
            } else {
                pos += right_cnt + 1;
            }
            node = parent;
        }
    }
    Some(node)
}

/// Zero-based position of `node` in the sorted order of its tree.
pub fn rank<S>(store: &S, node: S::Key) -> usize
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    let mut r = count(store, links(store, node).left()) as usize;
    let mut cur = node;
    while let Some(parent) = links(store, cur).parent() {
        let p = links(store, parent);
        if p.right() == Some(cur) {
            r += count(store, p.left()) as usize + 1;
        }
        cur = parent;
    }
    r
}

/// The node at zero-based position `index` under `root`.
pub fn select<S>(store: &S, root: Option<S::Key>, index: usize) -> Option<S::Key>
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    let mut node = root?;
    let mut index = index;
    loop {
        let n = links(store, node);
        let left = count(store, n.left()) as usize;
        if index < left {
            node = n.left()?;
        } else if index == left {
            return Some(node);
        } else {
            index -= left + 1;
            node = n.right()?;
        }
    }
}

/// Iterator over the keys of a tree in sorted order.
pub struct InOrder<'a, S: NodeStore> {
    store: &'a S,
    next: Option<S::Key>,
}

impl<'a, S> InOrder<'a, S>
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    pub fn new(store: &'a S, root: Option<S::Key>) -> Self {
        Self {
            store,
            next: first(store, root),
        }
    }
}

impl<'a, S> Iterator for InOrder<'a, S>
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    type Item = S::Key;

    fn next(&mut self) -> Option<S::Key> {
        let cur = self.next?;
        self.next = successor(self.store, cur);
        Some(cur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avl::tests::{insert, Item};

    fn build(vals: &[i32]) -> (Vec<Item>, Option<usize>) {
        let mut store = Vec::new();
        let mut root = None;
        for &v in vals {
            root = Some(insert(&mut store, root, v));
        }
        (store, root)
    }

    fn key_of(store: &[Item], val: i32) -> usize {
        store.iter().position(|i| i.val == val).unwrap()
    }

    /// Invariant: in-order iteration yields the sorted sequence.
    #[test]
    fn in_order_is_sorted() {
        let (store, root) = build(&[5, 3, 8, 1, 4, 7, 9, 2, 6, 0]);
        let vals: Vec<i32> = InOrder::new(&store, root).map(|k| store[k].val).collect();
        assert_eq!(vals, (0..10).collect::<Vec<_>>());
    }

    /// Invariant: successor/predecessor step through neighbours and stop at the ends.
    #[test]
    fn neighbours() {
        let (store, root) = build(&[5, 3, 8, 1, 4, 7, 9]);
        assert_eq!(successor(&store, key_of(&store, 4)), Some(key_of(&store, 5)));
        assert_eq!(predecessor(&store, key_of(&store, 7)), Some(key_of(&store, 5)));
        assert_eq!(successor(&store, key_of(&store, 9)), None);
        assert_eq!(predecessor(&store, key_of(&store, 1)), None);
        assert_eq!(first(&store, root), Some(key_of(&store, 1)));
        assert_eq!(last(&store, root), Some(key_of(&store, 9)));
        assert_eq!(first(&store, None), None);
    }

    /// Invariant: rank and select are inverse; offset moves by exact positions.
    #[test]
    fn rank_select_offset() {
        let vals: Vec<i32> = (0..50).map(|i| (i * 37) % 50).collect();
        let (store, root) = build(&vals);
        for v in 0..50 {
            let k = key_of(&store, v);
            assert_eq!(rank(&store, k), v as usize);
            assert_eq!(select(&store, root, v as usize), Some(k));
        }
        assert_eq!(select(&store, root, 50), None);

        let start = key_of(&store, 20);
        for delta in -20i64..30 {
            let target = offset(&store, start, delta).map(|k| store[k].val);
            assert_eq!(target, Some(20 + delta as i32), "delta {}", delta);
        }
        assert_eq!(offset(&store, start, -21), None);
        assert_eq!(offset(&store, start, 30), None);
    }
}

//! Intrusive AVL tree core.
//!
//! The tree never compares payloads. Callers descend with their own ordering,
//! `attach` a fresh node at the leaf position they found, then call
//! `rebalance` from that node; `unlink` removes a member and hands back the
//! new root. Every mutation keeps two augmentations exact on every node:
//! `height` (AVL balance) and `count` (subtree size, for rank queries in
//! `avl_order`).

use crate::error::InvariantError;
use crate::store::NodeStore;

/// Which child slot of a parent a node occupies.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Side {
    Left,
    Right,
}

/// Link and augmentation fields embedded in a caller record.
///
/// A one-node tree and a detached node share the same links, so membership
/// is tracked separately: `attach` and `rebalance` set it, `unlink` clears it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AvlNode<K> {
    parent: Option<K>,
    left: Option<K>,
    right: Option<K>,
    height: u32,
    count: u32,
    linked: bool,
}

impl<K: Copy> AvlNode<K> {
    /// A detached single-node subtree.
    pub const fn new() -> Self {
        Self {
            parent: None,
            left: None,
            right: None,
            height: 1,
            count: 1,
            linked: false,
        }
    }

    pub fn parent(&self) -> Option<K> {
        self.parent
    }
    pub fn left(&self) -> Option<K> {
        self.left
    }
    pub fn right(&self) -> Option<K> {
        self.right
    }

    pub fn child(&self, side: Side) -> Option<K> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of nodes in the subtree rooted here, this node included.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// True when the node is not a member of any tree.
    pub fn is_detached(&self) -> bool {
        !self.linked
    }

    fn set_child(&mut self, side: Side, child: Option<K>) {
        match side {
            Side::Left => self.left = child,
            Side::Right => self.right = child,
        }
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

impl<K: Copy> Default for AvlNode<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Access to the `AvlNode` embedded in a caller record.
pub trait AvlLinked<K> {
    fn avl(&self) -> &AvlNode<K>;
    fn avl_mut(&mut self) -> &mut AvlNode<K>;
}

impl<K> AvlLinked<K> for AvlNode<K> {
    #[inline]
    fn avl(&self) -> &AvlNode<K> {
        self
    }
    #[inline]
    fn avl_mut(&mut self) -> &mut AvlNode<K> {
        self
    }
}

#[inline]
pub(crate) fn links<S>(store: &S, key: S::Key) -> &AvlNode<S::Key>
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    store.node(key).avl()
}

#[inline]
fn links_mut<S>(store: &mut S, key: S::Key) -> &mut AvlNode<S::Key>
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    store.node_mut(key).avl_mut()
}

/// Height of an optional subtree; an absent subtree has height 0.
#[inline]
pub fn height<S>(store: &S, node: Option<S::Key>) -> u32
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    node.map_or(0, |k| links(store, k).height)
}

/// Size of an optional subtree; an absent subtree holds 0 nodes.
#[inline]
pub fn count<S>(store: &S, node: Option<S::Key>) -> u32
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    node.map_or(0, |k| links(store, k).count)
}

fn update<S>(store: &mut S, node: S::Key)
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    let (left, right) = {
        let n = links(store, node);
        (n.left, n.right)
    };
    let h = 1 + height(store, left).max(height(store, right));
    let c = 1 + count(store, left) + count(store, right);
    let n = links_mut(store, node);
    n.height = h;
    n.count = c;
    n.linked = true;
}

/// The slot of `parent` that holds `child`. Panics if the back-link is torn.
fn side_of<S>(store: &S, parent: S::Key, child: S::Key) -> Side
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    let p = links(store, parent);
    if p.left == Some(child) {
        Side::Left
    } else if p.right == Some(child) {
        Side::Right
    } else {
        panic!(
            "node {:?} is not a child of its recorded parent {:?}",
            child, parent
        )
    }
}

fn rotate_left<S>(store: &mut S, node: S::Key) -> S::Key
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    let (parent, new_root) = {
        let n = links(store, node);
        (n.parent, n.right.expect("left rotation needs a right child"))
    };
    let inner = links(store, new_root).left;

    links_mut(store, node).right = inner;
    if let Some(inner) = inner {
        links_mut(store, inner).parent = Some(node);
    }
    {
        let r = links_mut(store, new_root);
        r.parent = parent;
        r.left = Some(node);
    }
    links_mut(store, node).parent = Some(new_root);

    update(store, node);
    update(store, new_root);
    new_root
}

fn rotate_right<S>(store: &mut S, node: S::Key) -> S::Key
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    let (parent, new_root) = {
        let n = links(store, node);
        (n.parent, n.left.expect("right rotation needs a left child"))
    };
    let inner = links(store, new_root).right;

    links_mut(store, node).left = inner;
    if let Some(inner) = inner {
        links_mut(store, inner).parent = Some(node);
    }
    {
        let r = links_mut(store, new_root);
        r.parent = parent;
        r.right = Some(node);
    }
    links_mut(store, node).parent = Some(new_root);

    update(store, node);
    update(store, new_root);
    new_root
}

// Left subtree is two levels taller.
fn fix_left<S>(store: &mut S, node: S::Key) -> S::Key
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    let left = links(store, node)
        .left
        .expect("left-heavy node has a left child");
    let (ll, lr) = {
        let l = links(store, left);
        (l.left, l.right)
    };
    if height(store, ll) < height(store, lr) {
        let new_left = rotate_left(store, left);
        links_mut(store, node).left = Some(new_left);
    }
    rotate_right(store, node)
}

// Right subtree is two levels taller.
fn fix_right<S>(store: &mut S, node: S::Key) -> S::Key
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    let right = links(store, node)
        .right
        .expect("right-heavy node has a right child");
    let (rl, rr) = {
        let r = links(store, right);
        (r.left, r.right)
    };
    if height(store, rr) < height(store, rl) {
        let new_right = rotate_right(store, right);
        links_mut(store, node).right = Some(new_right);
    }
    rotate_left(store, node)
}

/// Link a detached `child` into the empty `side` slot of `parent`.
///
/// This is the placement half of an insertion: the caller finds the leaf
/// position with its own comparator, attaches, then calls `rebalance(child)`.
pub fn attach<S>(store: &mut S, parent: S::Key, side: Side, child: S::Key)
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    assert!(
        links(store, child).is_detached(),
        "attach: node {:?} is already in a tree",
        child
    );
    assert!(
        links(store, parent).child(side).is_none(),
        "attach: {:?} slot of {:?} is occupied",
        side,
        parent
    );
    links_mut(store, parent).set_child(side, Some(child));
    let c = links_mut(store, child);
    c.parent = Some(parent);
    c.linked = true;
}

/// Restore height/count and the AVL bound from `node` up to the root.
///
/// `node` is typically a freshly attached leaf or the parent of a removed
/// node. Returns the root of the whole tree, which may have changed.
pub fn rebalance<S>(store: &mut S, mut node: S::Key) -> S::Key
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    loop {
        let parent = links(store, node).parent;
        let side = parent.map(|p| side_of(store, p, node));

        update(store, node);

        let (left, right) = {
            let n = links(store, node);
            (n.left, n.right)
        };
        let l = height(store, left);
        let r = height(store, right);
        let fixed = if l == r + 2 {
            fix_left(store, node)
        } else if l + 2 == r {
            fix_right(store, node)
        } else {
            node
        };

        match (parent, side) {
            (Some(parent), Some(side)) => {
                links_mut(store, parent).set_child(side, Some(fixed));
                node = parent;
            }
            _ => return fixed,
        }
    }
}

// Remove a node with at most one child and rebalance from its parent.
fn unlink_easy<S>(store: &mut S, node: S::Key) -> Option<S::Key>
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    let (parent, left, right) = {
        let n = links(store, node);
        (n.parent, n.left, n.right)
    };
    assert!(
        left.is_none() || right.is_none(),
        "node {:?} has two children",
        node
    );
    let child = left.or(right);

    if let Some(child) = child {
        links_mut(store, child).parent = parent;
    }
    let parent = match parent {
        Some(p) => p,
        None => return child,
    };
    let side = side_of(store, parent, node);
    links_mut(store, parent).set_child(side, child);
    Some(rebalance(store, parent))
}

// Move `successor` (already unlinked) into the position `node` holds now.
// Heights and counts below that position were fixed while unlinking the
// successor, so the cached values of `node` are exact for its replacement.
fn relocate<S>(
    store: &mut S,
    node: S::Key,
    successor: S::Key,
    root: Option<S::Key>,
) -> Option<S::Key>
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    let (parent, left, right, h, c) = {
        let n = links(store, node);
        (n.parent, n.left, n.right, n.height, n.count)
    };
    {
        let s = links_mut(store, successor);
        s.parent = parent;
        s.left = left;
        s.right = right;
        s.height = h;
        s.count = c;
    }
    for child in [left, right].into_iter().flatten() {
        links_mut(store, child).parent = Some(successor);
    }

    match parent {
        Some(parent) => {
            let side = side_of(store, parent, node);
            links_mut(store, parent).set_child(side, Some(successor));
            root
        }
        None => Some(successor),
    }
}

/// Remove `node` from the tree it belongs to and return the new root, or
/// `None` if the tree is now empty.
///
/// A node with two children is replaced by its in-order successor. The
/// removed node comes back detached, ready to be attached again.
///
/// Panics if `node` is not in a tree.
pub fn unlink<S>(store: &mut S, node: S::Key) -> Option<S::Key>
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    let (left, right) = {
        let n = links(store, node);
        assert!(n.linked, "unlink: node {:?} is not in a tree", node);
        (n.left, n.right)
    };
    let root = match (left, right) {
        (Some(_), Some(right)) => {
            let mut successor = right;
            while let Some(l) = links(store, successor).left {
                successor = l;
            }
            let root = unlink_easy(store, successor);
            relocate(store, node, successor, root)
        }
        _ => unlink_easy(store, node),
    };
    links_mut(store, node).reset();
    root
}

/// Check every link and cached augmentation under `root`.
///
/// Returns the number of nodes on success.
pub fn verify<S>(store: &S, root: Option<S::Key>) -> Result<usize, InvariantError<S::Key>>
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    let root = match root {
        Some(r) => r,
        None => return Ok(0),
    };
    if links(store, root).parent.is_some() {
        return Err(InvariantError::RootHasParent { node: root });
    }
    verify_subtree(store, root).map(|(_, c)| c as usize)
}

fn verify_subtree<S>(store: &S, node: S::Key) -> Result<(u32, u32), InvariantError<S::Key>>
where
    S: NodeStore,
    S::Node: AvlLinked<S::Key>,
{
    let n = links(store, node);
    let mut sides = [(0u32, 0u32); 2];
    for (slot, child) in [n.left, n.right].into_iter().enumerate() {
        if let Some(child) = child {
            if links(store, child).parent != Some(node) {
                return Err(InvariantError::ParentLink {
                    node: child,
                    expected: Some(node),
                });
            }
            sides[slot] = verify_subtree(store, child)?;
        }
    }
    let [(lh, lc), (rh, rc)] = sides;

    let h = 1 + lh.max(rh);
    if n.height != h {
        return Err(InvariantError::Height {
            node,
            stored: n.height,
            actual: h,
        });
    }
    let c = 1 + lc + rc;
    if n.count != c {
        return Err(InvariantError::Count {
            node,
            stored: n.count,
            actual: c,
        });
    }
    if lh.abs_diff(rh) > 1 {
        return Err(InvariantError::Unbalanced {
            node,
            left: lh,
            right: rh,
        });
    }
    Ok((h, c))
}

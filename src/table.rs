//! Intrusive hash nodes and the fixed-capacity chained table.

use crate::error::AllocError;
use crate::store::NodeStore;

/// Chain link and cached hash code embedded in a caller record.
///
/// The hash code must be set before the node is inserted and must not change
/// while the node is in a map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashNode<K> {
    next: Option<K>,
    hash_code: u64,
}

impl<K: Copy> HashNode<K> {
    pub const fn new(hash_code: u64) -> Self {
        Self {
            next: None,
            hash_code,
        }
    }

    pub fn hash_code(&self) -> u64 {
        self.hash_code
    }

    pub fn set_hash_code(&mut self, hash_code: u64) {
        self.hash_code = hash_code;
    }

    pub fn next(&self) -> Option<K> {
        self.next
    }
}

/// Access to the `HashNode` embedded in a caller record.
pub trait HashLinked<K> {
    fn hash_node(&self) -> &HashNode<K>;
    fn hash_node_mut(&mut self) -> &mut HashNode<K>;
}

impl<K> HashLinked<K> for HashNode<K> {
    #[inline]
    fn hash_node(&self) -> &HashNode<K> {
        self
    }
    #[inline]
    fn hash_node_mut(&mut self) -> &mut HashNode<K> {
        self
    }
}

/// A search key: its hash code plus equality against stored records.
///
/// `equals` is only consulted for records whose cached hash code matches, and
/// must agree with it: records that compare equal share a hash code.
pub trait Lookup<N: ?Sized> {
    fn hash_code(&self) -> u64;
    fn equals(&self, candidate: &N) -> bool;
}

/// Adapts a hash code and an equality closure into a `Lookup`.
pub struct ByHash<F> {
    pub hash_code: u64,
    pub eq: F,
}

impl<F> ByHash<F> {
    pub fn new(hash_code: u64, eq: F) -> Self {
        Self { hash_code, eq }
    }
}

impl<N: ?Sized, F> Lookup<N> for ByHash<F>
where
    F: Fn(&N) -> bool,
{
    #[inline]
    fn hash_code(&self) -> u64 {
        self.hash_code
    }
    #[inline]
    fn equals(&self, candidate: &N) -> bool {
        (self.eq)(candidate)
    }
}

#[inline]
pub(crate) fn hlinks<S>(store: &S, key: S::Key) -> &HashNode<S::Key>
where
    S: NodeStore,
    S::Node: HashLinked<S::Key>,
{
    store.node(key).hash_node()
}

#[inline]
fn hlinks_mut<S>(store: &mut S, key: S::Key) -> &mut HashNode<S::Key>
where
    S: NodeStore,
    S::Node: HashLinked<S::Key>,
{
    store.node_mut(key).hash_node_mut()
}

/// The slot that points at a chained node: a bucket head or the `next`
/// field of the previous node in the chain.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Link<K> {
    Head(usize),
    After(K),
}

/// Fixed-capacity chained table. Capacity is zero (no storage) or a power of
/// two; a node lives in bucket `hash_code & mask`.
#[derive(Debug)]
pub(crate) struct Table<K> {
    buckets: Box<[Option<K>]>,
    mask: usize,
    size: usize,
}

impl<K: Copy + Eq> Table<K> {
    pub(crate) fn unallocated() -> Self {
        Self {
            buckets: Box::default(),
            mask: 0,
            size: 0,
        }
    }

    /// Allocate `capacity` empty buckets. Panics unless `capacity` is a
    /// nonzero power of two.
    pub(crate) fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
        assert!(
            capacity.is_power_of_two(),
            "table capacity {} is not a power of two",
            capacity
        );
        let mut buckets = Vec::new();
        buckets.try_reserve_exact(capacity)?;
        buckets.resize(capacity, None);
        Ok(Self {
            buckets: buckets.into_boxed_slice(),
            mask: capacity - 1,
            size: 0,
        })
    }

    pub(crate) fn is_allocated(&self) -> bool {
        !self.buckets.is_empty()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.buckets.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.size
    }

    pub(crate) fn bucket_of(&self, hash_code: u64) -> usize {
        (hash_code as usize) & self.mask
    }

    pub(crate) fn head(&self, bucket: usize) -> Option<K> {
        self.buckets[bucket]
    }

    /// Push `node` at the head of its bucket's chain.
    pub(crate) fn push<S>(&mut self, store: &mut S, node: S::Key)
    where
        S: NodeStore<Key = K>,
        S::Node: HashLinked<K>,
    {
        debug_assert!(self.is_allocated());
        let pos = self.bucket_of(hlinks(store, node).hash_code);
        hlinks_mut(store, node).next = self.buckets[pos];
        self.buckets[pos] = Some(node);
        self.size += 1;
    }

    /// Find the first node matching `probe`, along with the slot pointing at it.
    pub(crate) fn find<S, Q>(&self, store: &S, probe: &Q) -> Option<(Link<K>, K)>
    where
        S: NodeStore<Key = K>,
        S::Node: HashLinked<K>,
        Q: Lookup<S::Node> + ?Sized,
    {
        if !self.is_allocated() {
            return None;
        }
        let hash_code = probe.hash_code();
        let pos = self.bucket_of(hash_code);
        let mut from = Link::Head(pos);
        let mut cur = self.buckets[pos];
        while let Some(node) = cur {
            let rec = store.node(node);
            let h = rec.hash_node();
            if h.hash_code == hash_code && probe.equals(rec) {
                return Some((from, node));
            }
            from = Link::After(node);
            cur = h.next;
        }
        None
    }

    /// Unlink `node`, which `from` points at, and return it.
    pub(crate) fn detach<S>(&mut self, store: &mut S, from: Link<K>, node: K) -> K
    where
        S: NodeStore<Key = K>,
        S::Node: HashLinked<K>,
    {
        let next = hlinks_mut(store, node).next.take();
        match from {
            Link::Head(pos) => {
                assert!(self.buckets[pos] == Some(node), "bucket head is not the detached node");
                self.buckets[pos] = next;
            }
            Link::After(prev) => {
                let prev = hlinks_mut(store, prev);
                assert!(prev.next == Some(node), "chain link is not the detached node");
                prev.next = next;
            }
        }
        self.size -= 1;
        node
    }

    /// Detach and return the head of `bucket`, if any.
    pub(crate) fn pop_head<S>(&mut self, store: &mut S, bucket: usize) -> Option<K>
    where
        S: NodeStore<Key = K>,
        S::Node: HashLinked<K>,
    {
        let node = self.buckets[bucket]?;
        Some(self.detach(store, Link::Head(bucket), node))
    }
}

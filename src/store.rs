//! Node storage: the arena that owns caller records.
//!
//! Both structures address nodes through stable keys into a caller-owned
//! store instead of raw pointers. The store is passed into every operation;
//! the core only reads and rewrites the link fields embedded in its records.

use core::fmt::Debug;
use slotmap::{DenseSlotMap, SlotMap};

/// Arena of caller records addressed by stable keys.
///
/// A key that does not resolve to a live record is a programmer error:
/// implementations panic instead of returning `None`, since a link pointing
/// at a freed record means the structure is already torn.
pub trait NodeStore {
    type Key: Copy + Eq + Debug;
    type Node;

    fn node(&self, key: Self::Key) -> &Self::Node;
    fn node_mut(&mut self, key: Self::Key) -> &mut Self::Node;
}

impl<K: slotmap::Key, V> NodeStore for SlotMap<K, V> {
    type Key = K;
    type Node = V;

    #[inline]
    fn node(&self, key: K) -> &V {
        match self.get(key) {
            Some(v) => v,
            None => panic!("stale node key {:?}", key),
        }
    }

    #[inline]
    fn node_mut(&mut self, key: K) -> &mut V {
        match self.get_mut(key) {
            Some(v) => v,
            None => panic!("stale node key {:?}", key),
        }
    }
}

impl<K: slotmap::Key, V> NodeStore for DenseSlotMap<K, V> {
    type Key = K;
    type Node = V;

    #[inline]
    fn node(&self, key: K) -> &V {
        match self.get(key) {
            Some(v) => v,
            None => panic!("stale node key {:?}", key),
        }
    }

    #[inline]
    fn node_mut(&mut self, key: K) -> &mut V {
        match self.get_mut(key) {
            Some(v) => v,
            None => panic!("stale node key {:?}", key),
        }
    }
}

/// Plain index arena. Indices are never reused by the core, but a caller
/// that recycles slots must unlink them first.
impl<V> NodeStore for Vec<V> {
    type Key = usize;
    type Node = V;

    #[inline]
    fn node(&self, key: usize) -> &V {
        &self[key]
    }

    #[inline]
    fn node_mut(&mut self, key: usize) -> &mut V {
        &mut self[key]
    }
}

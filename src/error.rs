//! Error types.
//!
//! Structural precondition violations panic at the call site; the types here
//! cover the two conditions a caller can meaningfully observe: a bucket array
//! that could not be allocated, and an invariant report from `verify`.

use std::collections::TryReserveError;
use thiserror::Error;

/// Bucket array allocation failed. The map is left exactly as it was before
/// the failing call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// Doubling the table would overflow `usize`.
    #[error("hash table capacity overflow")]
    CapacityOverflow,

    /// The allocator refused the bucket array.
    #[error("bucket array allocation failed: {0}")]
    Reserve(#[from] TryReserveError),
}

/// A structural invariant found broken by `avl::verify` or `HMap::verify`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantError<K: core::fmt::Debug> {
    #[error("root {node:?} has a parent link")]
    RootHasParent { node: K },

    #[error("node {node:?} does not point back to its parent {expected:?}")]
    ParentLink { node: K, expected: Option<K> },

    #[error("node {node:?} caches height {stored}, subtree height is {actual}")]
    Height { node: K, stored: u32, actual: u32 },

    #[error("node {node:?} caches count {stored}, subtree holds {actual}")]
    Count { node: K, stored: u32, actual: u32 },

    #[error("node {node:?} is unbalanced: left height {left}, right height {right}")]
    Unbalanced { node: K, left: u32, right: u32 },

    #[error("node {node:?} sits in bucket {bucket}, its hash selects {expected}")]
    Misplaced {
        node: K,
        bucket: usize,
        expected: usize,
    },

    #[error("table records {stored} entries, its chains hold {actual}")]
    Size { stored: usize, actual: usize },

    #[error("table capacity {0} is not a power of two")]
    Capacity(usize),

    #[error("migration in flight with no entries left to move")]
    EmptyMigration,

    #[error("older bucket {bucket} still holds entries behind migration cursor {cursor}")]
    CursorSkipped { bucket: usize, cursor: usize },
}

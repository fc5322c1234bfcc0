//! kvcore: the two intrusive structures under an in-memory key-value store,
//! an AVL tree with subtree counts and a hash map with progressive rehashing.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: keep the structural work (links, balance, growth) separate from
//!   the records it organizes, so a single record can sit in a hash index and
//!   an ordered index at once without extra allocation.
//! - Layers:
//!   - `NodeStore`: the caller's arena of records, addressed by stable keys
//!     (`SlotMap` generational keys or plain `Vec` indices).
//!   - `avl`: `rebalance` and `unlink` over `AvlNode` links embedded in
//!     records; `avl_order` adds navigation and rank queries on top of the
//!     maintained subtree counts.
//!   - `HMap`: chained buckets over `HashNode` links embedded in records,
//!     with a two-table migration that bounds per-call work.
//!
//! Constraints
//! - Single-threaded: every operation that relinks takes `&mut` to both the
//!   structure and the store, so exclusive access is checked statically.
//! - No per-record allocation: only `HMap` allocates, and only its bucket
//!   arrays.
//! - The tree never compares payloads; callers place new nodes with their own
//!   ordering and then call `avl::rebalance`.
//! - Records are matched by their cached hash code first, then by the
//!   caller's `Lookup::equals`.
//!
//! Failure model
//! - Torn links, stale keys and other precondition violations panic: a
//!   structure whose invariants are already broken cannot be repaired.
//! - Bucket allocation failure is reported by `HMap::try_insert` as
//!   `AllocError` before anything is relinked.
//! - `avl::verify` and `HMap::verify` report broken invariants as
//!   `InvariantError` for tests and debugging.
//!
//! Rehashing
//! - A resize starts only when no migration is in flight; while one is, the
//!   newer table may run above its nominal load factor until the older one
//!   drains.
//!
//! Features
//! - `tracing`: emit `tracing` events on resize, migration progress and
//!   allocation failure.

pub mod avl;
mod avl_order;
mod avl_proptest;
mod error;
mod hmap;
mod hmap_proptest;
mod store;
mod table;

// Public surface
pub use avl::{attach, rebalance, unlink, AvlLinked, AvlNode, Side};
pub use avl_order::{first, last, offset, predecessor, rank, select, successor, InOrder};
pub use error::{AllocError, InvariantError};
pub use hmap::{HMap, Iter, RehashPolicy, RehashState};
pub use store::NodeStore;
pub use table::{ByHash, HashLinked, HashNode, Lookup};

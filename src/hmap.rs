//! HMap: chained hash map with progressive rehashing.
//!
//! Growth never happens in one pass. When the live table fills past its load
//! factor it becomes the `older` table of a migration, a table of twice the
//! capacity takes its place, and every later call moves at most
//! `migration_quota` nodes across before doing its own work. Lookups and
//! deletes consult both tables while a migration is in flight; inserts only
//! ever go to the newer one.

use crate::error::{AllocError, InvariantError};
use crate::store::NodeStore;
use crate::table::{hlinks, HashLinked, Lookup, Table};

/// Growth and migration parameters.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RehashPolicy {
    /// Capacity of the first table. Must be a power of two.
    pub min_capacity: usize,
    /// Average chain length that triggers a resize.
    pub max_load_factor: usize,
    /// Upper bound on nodes moved per public call.
    pub migration_quota: usize,
}

impl RehashPolicy {
    pub const fn new() -> Self {
        Self {
            min_capacity: 4,
            max_load_factor: 8,
            migration_quota: 128,
        }
    }

    pub fn with_min_capacity(mut self, min_capacity: usize) -> Self {
        self.min_capacity = min_capacity;
        self
    }

    pub fn with_max_load_factor(mut self, max_load_factor: usize) -> Self {
        self.max_load_factor = max_load_factor;
        self
    }

    pub fn with_migration_quota(mut self, migration_quota: usize) -> Self {
        self.migration_quota = migration_quota;
        self
    }
}

impl Default for RehashPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
enum Phase<K> {
    Stable,
    /// `older` always holds at least one node; `cursor` is the next bucket
    /// of `older` to drain.
    Migrating { older: Table<K>, cursor: usize },
}

/// Observable rehashing state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RehashState {
    Stable,
    Migrating {
        /// Nodes still waiting in the older table.
        pending: usize,
        /// Next bucket of the older table to drain.
        cursor: usize,
        old_capacity: usize,
    },
}

/// Intrusive hash map over records held in a `NodeStore`.
///
/// The map owns only its bucket arrays. Records stay in the caller's store
/// and are linked through their embedded `HashNode`. Inserting a record whose
/// key is already present adds a second entry; callers that want unique keys
/// delete first.
#[derive(Debug)]
pub struct HMap<K> {
    newer: Table<K>,
    phase: Phase<K>,
    policy: RehashPolicy,
}

impl<K: Copy + Eq> HMap<K> {
    pub fn new() -> Self {
        Self::with_policy(RehashPolicy::default())
    }

    pub fn with_policy(policy: RehashPolicy) -> Self {
        assert!(
            policy.min_capacity.is_power_of_two(),
            "min_capacity {} is not a power of two",
            policy.min_capacity
        );
        assert!(policy.max_load_factor > 0, "max_load_factor must be nonzero");
        assert!(policy.migration_quota > 0, "migration_quota must be nonzero");
        Self {
            newer: Table::unallocated(),
            phase: Phase::Stable,
            policy,
        }
    }

    pub fn policy(&self) -> &RehashPolicy {
        &self.policy
    }

    /// Live entries across both tables.
    pub fn len(&self) -> usize {
        self.newer.len() + self.older_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bucket count of the table receiving writes; 0 before the first insert.
    pub fn capacity(&self) -> usize {
        self.newer.capacity()
    }

    pub fn state(&self) -> RehashState {
        match &self.phase {
            Phase::Stable => RehashState::Stable,
            Phase::Migrating { older, cursor } => RehashState::Migrating {
                pending: older.len(),
                cursor: *cursor,
                old_capacity: older.capacity(),
            },
        }
    }

    pub fn is_migrating(&self) -> bool {
        matches!(self.phase, Phase::Migrating { .. })
    }

    fn older_len(&self) -> usize {
        match &self.phase {
            Phase::Stable => 0,
            Phase::Migrating { older, .. } => older.len(),
        }
    }

    /// Release both bucket arrays and return to the empty state. Records are
    /// not touched; their chain links are stale afterwards.
    pub fn clear(&mut self) {
        #[cfg(feature = "tracing")]
        tracing::trace!(len = self.len(), "hmap: clear");
        self.newer = Table::unallocated();
        self.phase = Phase::Stable;
    }

    /// Move up to `migration_quota` nodes from the older table into the newer
    /// one. Returns the number of nodes moved. Finishing the migration
    /// releases the older table.
    ///
    /// Every lookup, insert and delete runs this first; calling it directly
    /// lets an idle caller drain a migration early.
    pub fn advance_migration<S>(&mut self, store: &mut S) -> usize
    where
        S: NodeStore<Key = K>,
        S::Node: HashLinked<K>,
    {
        let Self {
            newer,
            phase,
            policy,
        } = &mut *self;
        let (moved, drained) = match phase {
            Phase::Stable => return 0,
            Phase::Migrating { older, cursor } => {
                let mut moved = 0;
                while moved < policy.migration_quota && older.len() > 0 {
                    assert!(
                        *cursor < older.capacity(),
                        "migration cursor ran past the older table with {} nodes left",
                        older.len()
                    );
                    match older.pop_head(store, *cursor) {
                        Some(node) => {
                            newer.push(store, node);
                            moved += 1;
                        }
                        None => *cursor += 1,
                    }
                }
                #[cfg(feature = "tracing")]
                tracing::trace!(moved, cursor = *cursor, pending = older.len(), "hmap: migration step");
                (moved, older.len() == 0)
            }
        };
        if drained {
            self.finish_migration();
        }
        moved
    }

    fn finish_migration(&mut self) {
        #[cfg(feature = "tracing")]
        tracing::debug!(capacity = self.newer.capacity(), len = self.newer.len(), "hmap: migration finished");
        self.phase = Phase::Stable;
    }

    /// Find the record matching `probe`.
    ///
    /// Takes the store mutably because the migration step relinks nodes.
    pub fn lookup<S, Q>(&mut self, store: &mut S, probe: &Q) -> Option<K>
    where
        S: NodeStore<Key = K>,
        S::Node: HashLinked<K>,
        Q: Lookup<S::Node> + ?Sized,
    {
        self.advance_migration(store);
        if let Some((_, node)) = self.newer.find(store, probe) {
            return Some(node);
        }
        match &self.phase {
            Phase::Stable => None,
            Phase::Migrating { older, .. } => older.find(store, probe).map(|(_, node)| node),
        }
    }

    /// Insert `node`, whose hash code is already set.
    ///
    /// Panics if a bucket array cannot be allocated; see `try_insert`.
    pub fn insert<S>(&mut self, store: &mut S, node: K)
    where
        S: NodeStore<Key = K>,
        S::Node: HashLinked<K>,
    {
        if let Err(err) = self.try_insert(store, node) {
            panic!("hmap insert: {}", err);
        }
    }

    /// Insert `node`, reporting bucket allocation failure instead of
    /// panicking. Allocation happens before any node is linked, so on error
    /// `node` is not inserted and no resize has begun.
    pub fn try_insert<S>(&mut self, store: &mut S, node: K) -> Result<(), AllocError>
    where
        S: NodeStore<Key = K>,
        S::Node: HashLinked<K>,
    {
        if !self.newer.is_allocated() {
            self.newer = Self::alloc_table(self.policy.min_capacity)?;
        }

        // A resize starts only from the stable phase.
        let grown = if self.is_migrating() {
            None
        } else {
            let threshold = self
                .newer
                .capacity()
                .saturating_mul(self.policy.max_load_factor);
            if self.newer.len() + 1 >= threshold {
                let capacity = self
                    .newer
                    .capacity()
                    .checked_mul(2)
                    .ok_or(AllocError::CapacityOverflow)?;
                Some(Self::alloc_table(capacity)?)
            } else {
                None
            }
        };

        self.newer.push(store, node);

        if let Some(fresh) = grown {
            let older = std::mem::replace(&mut self.newer, fresh);
            #[cfg(feature = "tracing")]
            tracing::debug!(
                from = older.capacity(),
                to = self.newer.capacity(),
                len = older.len(),
                "hmap: resize triggered"
            );
            self.phase = Phase::Migrating { older, cursor: 0 };
        }

        self.advance_migration(store);
        Ok(())
    }

    fn alloc_table(capacity: usize) -> Result<Table<K>, AllocError> {
        let res = Table::with_capacity(capacity);
        #[cfg(feature = "tracing")]
        {
            if let Err(err) = &res {
                tracing::warn!(capacity, error = %err, "hmap: bucket allocation failed");
            }
        }
        res
    }

    /// Detach and return the record matching `probe`.
    pub fn delete<S, Q>(&mut self, store: &mut S, probe: &Q) -> Option<K>
    where
        S: NodeStore<Key = K>,
        S::Node: HashLinked<K>,
        Q: Lookup<S::Node> + ?Sized,
    {
        self.advance_migration(store);
        if let Some((from, node)) = self.newer.find(store, probe) {
            return Some(self.newer.detach(store, from, node));
        }
        let (node, drained) = match &mut self.phase {
            Phase::Stable => return None,
            Phase::Migrating { older, .. } => {
                let (from, node) = older.find(store, probe)?;
                let node = older.detach(store, from, node);
                (node, older.len() == 0)
            }
        };
        if drained {
            self.finish_migration();
        }
        Some(node)
    }

    /// Iterate over every record key, newer table first.
    pub fn iter<'a, S>(&'a self, store: &'a S) -> Iter<'a, S>
    where
        S: NodeStore<Key = K>,
        S::Node: HashLinked<K>,
    {
        let older = match &self.phase {
            Phase::Stable => None,
            Phase::Migrating { older, .. } => Some(older),
        };
        Iter {
            store,
            tables: [Some(&self.newer), older],
            table: 0,
            bucket: 0,
            next: None,
        }
    }

    /// Check chain placement, size accounting and the phase invariants,
    /// including that no bucket behind the migration cursor holds entries.
    pub fn verify<S>(&self, store: &S) -> Result<(), InvariantError<K>>
    where
        S: NodeStore<Key = K>,
        S::Node: HashLinked<K>,
        K: core::fmt::Debug,
    {
        verify_table(&self.newer, store)?;
        if let Phase::Migrating { older, cursor } = &self.phase {
            if older.len() == 0 {
                return Err(InvariantError::EmptyMigration);
            }
            // Buckets below the cursor have been drained.
            if let Some(bucket) = (0..*cursor).find(|&b| older.head(b).is_some()) {
                return Err(InvariantError::CursorSkipped {
                    bucket,
                    cursor: *cursor,
                });
            }
            verify_table(older, store)?;
        }
        Ok(())
    }
}

impl<K: Copy + Eq> Default for HMap<K> {
    fn default() -> Self {
        Self::new()
    }
}

fn verify_table<S>(table: &Table<S::Key>, store: &S) -> Result<(), InvariantError<S::Key>>
where
    S: NodeStore,
    S::Node: HashLinked<S::Key>,
{
    let capacity = table.capacity();
    if capacity != 0 && !capacity.is_power_of_two() {
        return Err(InvariantError::Capacity(capacity));
    }
    let mut actual = 0;
    for bucket in 0..capacity {
        let mut cur = table.head(bucket);
        while let Some(node) = cur {
            let h = hlinks(store, node);
            let expected = table.bucket_of(h.hash_code());
            if expected != bucket {
                return Err(InvariantError::Misplaced {
                    node,
                    bucket,
                    expected,
                });
            }
            actual += 1;
            cur = h.next();
        }
    }
    if actual != table.len() {
        return Err(InvariantError::Size {
            stored: table.len(),
            actual,
        });
    }
    Ok(())
}

/// Iterator over the keys of every record in an `HMap`.
pub struct Iter<'a, S: NodeStore> {
    store: &'a S,
    tables: [Option<&'a Table<S::Key>>; 2],
    table: usize,
    bucket: usize,
    next: Option<S::Key>,
}

impl<'a, S> Iterator for Iter<'a, S>
where
    S: NodeStore,
    S::Node: HashLinked<S::Key>,
{
    type Item = S::Key;

    fn next(&mut self) -> Option<S::Key> {
        loop {
            if let Some(node) = self.next {
                self.next = hlinks(self.store, node).next();
                return Some(node);
            }
            let table = (*self.tables.get(self.table)?)?;
            if self.bucket < table.capacity() {
                self.next = table.head(self.bucket);
                self.bucket += 1;
            } else {
                self.table += 1;
                self.bucket = 0;
            }
        }
    }
}

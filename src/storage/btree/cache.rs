//! Direct-mapped row cache.
//!
//! Row `id` may only live in slot `id % capacity`. A colliding full-row store
//! replaces the occupant; there is no recency bookkeeping. The cache is never
//! the source of truth, so dropping a row is always safe.

use crate::storage::backend::RowStore;
use crate::storage::btree::node::row_len;
use crate::storage::btree::stats::TreeStats;
use crate::types::Result;
use std::sync::Arc;

#[derive(Debug)]
struct CachedRow {
    id: u32,
    words: Vec<u32>,
}

/// Fixed-capacity cache of node rows for one order.
#[derive(Debug)]
pub struct RowCache {
    order: usize,
    slots: Vec<Option<CachedRow>>,
}

impl RowCache {
    /// Creates a cache with `capacity` slots for rows of `order`.
    ///
    /// A capacity of zero yields a cache that never holds anything.
    pub fn new(capacity: usize, order: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { order, slots }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Order of the rows held.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Switches to another order; every cached row is dropped if it changes.
    pub fn set_order(&mut self, order: usize) {
        if order != self.order {
            tracing::debug!(
                target: "bplus_index::cache",
                from = self.order,
                to = order,
                "order changed, invalidating row cache"
            );
            self.clear();
            self.order = order;
        }
    }

    /// Drops every cached row.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    /// Number of occupied slots.
    pub fn resident(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Returns `true` if row `id` is cached.
    pub fn contains(&self, id: u32) -> bool {
        self.entry(id).is_some()
    }

    fn slot_index(&self, id: u32) -> Option<usize> {
        match self.slots.len() {
            0 => None,
            capacity => Some(id as usize % capacity),
        }
    }

    fn entry(&self, id: u32) -> Option<&CachedRow> {
        let index = self.slot_index(id)?;
        self.slots[index].as_ref().filter(|row| row.id == id)
    }

    /// Copies words `start..start + out.len()` of row `id` into `out`, clamped
    /// to the row. Returns the row length on a hit, `None` on a miss.
    pub fn fetch(&self, id: u32, start: usize, out: &mut [u32]) -> Option<usize> {
        let row = self.entry(id)?;
        let len = row.words.len();
        let begin = start.min(len);
        let end = start.saturating_add(out.len()).min(len);
        out[..end - begin].copy_from_slice(&row.words[begin..end]);
        Some(len)
    }

    /// Records a write of `words` at `start` into row `id`.
    ///
    /// A resident row is patched in place. Otherwise only a full row may claim
    /// the slot, and any other write evicts the slot's current occupant.
    pub fn store(&mut self, id: u32, start: usize, words: &[u32]) {
        let width = row_len(self.order);
        let Some(index) = self.slot_index(id) else {
            return;
        };
        if let Some(row) = self.slots[index].as_mut().filter(|row| row.id == id) {
            let begin = start.min(width);
            let end = start.saturating_add(words.len()).min(width);
            row.words[begin..end].copy_from_slice(&words[..end - begin]);
            return;
        }
        if start != 0 || words.len() != width {
            self.slots[index] = None;
            return;
        }
        let mut copy = Vec::new();
        if copy.try_reserve_exact(width).is_err() {
            self.slots[index] = None;
            return;
        }
        copy.extend_from_slice(words);
        if let Some(previous) = &self.slots[index] {
            tracing::trace!(
                target: "bplus_index::cache",
                evicted = previous.id,
                claimed = id,
                "row cache collision"
            );
        }
        self.slots[index] = Some(CachedRow { id, words: copy });
    }

    /// Drops row `id` if cached.
    pub fn invalidate(&mut self, id: u32) {
        if let Some(index) = self.slot_index(id) {
            if self.slots[index].as_ref().is_some_and(|row| row.id == id) {
                self.slots[index] = None;
            }
        }
    }
}

/// A [`RowStore`] that consults a [`RowCache`] before the wrapped store.
///
/// Fetches of full rows that miss are claimed into the cache; every store is
/// written through to both.
#[derive(Debug)]
pub struct CachedStore<S> {
    inner: S,
    cache: RowCache,
    stats: Arc<TreeStats>,
}

impl<S: RowStore> CachedStore<S> {
    /// Wraps `inner` with a cache of `capacity` slots for rows of `order`.
    pub fn new(inner: S, capacity: usize, order: usize, stats: Arc<TreeStats>) -> Self {
        Self {
            inner,
            cache: RowCache::new(capacity, order),
            stats,
        }
    }

    /// The cache.
    pub fn cache(&self) -> &RowCache {
        &self.cache
    }

    /// Mutable access to the cache.
    pub fn cache_mut(&mut self) -> &mut RowCache {
        &mut self.cache
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Mutable access to the wrapped store, bypassing the cache.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Unwraps the store.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: RowStore> RowStore for CachedStore<S> {
    fn fetch(&mut self, id: u32, start: usize, out: &mut [u32]) -> Result<usize> {
        if let Some(len) = self.cache.fetch(id, start, out) {
            self.stats.inc_cache_hits();
            return Ok(len);
        }
        self.stats.inc_cache_misses();
        self.stats.inc_rows_fetched();
        let len = self.inner.fetch(id, start, out)?;
        if start == 0 && out.len() == len {
            self.cache.store(id, 0, out);
        }
        Ok(len)
    }

    fn allocate(&mut self) -> u32 {
        self.inner.allocate()
    }

    fn store(&mut self, id: u32, start: usize, words: &[u32]) {
        self.stats.inc_rows_stored();
        self.inner.store(id, start, words);
        self.cache.store(id, start, words);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::backend::MemStore;

    fn row(order: usize, seed: u32) -> Vec<u32> {
        (0..row_len(order) as u32).map(|i| seed * 100 + i).collect()
    }

    #[test]
    fn hit_returns_clamped_range() {
        let mut cache = RowCache::new(8, 3);
        cache.store(5, 0, &row(3, 1));
        let mut out = [0u32; 4];
        assert_eq!(cache.fetch(5, 5, &mut out), Some(7));
        assert_eq!(out, [105, 106, 0, 0]);
        assert_eq!(cache.fetch(13, 0, &mut out), None);
    }

    #[test]
    fn partial_store_patches_resident_row_only() {
        let mut cache = RowCache::new(8, 3);
        cache.store(2, 0, &row(3, 1));
        cache.store(2, 5, &[77]);
        let mut out = [0u32; 7];
        cache.fetch(2, 0, &mut out);
        assert_eq!(out[5], 77);

        cache.store(3, 5, &[77]);
        assert!(!cache.contains(3));
    }

    #[test]
    fn collisions_replace_or_evict() {
        let mut cache = RowCache::new(4, 3);
        cache.store(1, 0, &row(3, 1));
        cache.store(5, 0, &row(3, 5));
        assert!(!cache.contains(1));
        assert!(cache.contains(5));

        cache.store(9, 2, &[0]);
        assert!(!cache.contains(5));
        assert_eq!(cache.resident(), 0);
    }

    #[test]
    fn order_change_drops_everything() {
        let mut cache = RowCache::new(4, 3);
        cache.store(1, 0, &row(3, 1));
        cache.set_order(3);
        assert!(cache.contains(1));
        cache.set_order(4);
        assert!(!cache.contains(1));
        cache.store(1, 0, &row(3, 1));
        assert!(!cache.contains(1), "row of the old width must not be claimed");
    }

    #[test]
    fn zero_capacity_is_inert() {
        let mut cache = RowCache::new(0, 3);
        cache.store(1, 0, &row(3, 1));
        let mut out = [0u32; 7];
        assert_eq!(cache.fetch(1, 0, &mut out), None);
        cache.invalidate(1);
    }

    #[test]
    fn cached_store_serves_repeat_fetches() -> Result<()> {
        let stats = Arc::new(TreeStats::default());
        let mut store = CachedStore::new(MemStore::new(), 16, 3, stats.clone());
        let id = store.allocate();
        store.inner_mut().store(id, 0, &row(3, 2));

        let mut out = vec![0u32; row_len(3)];
        store.fetch(id, 0, &mut out)?;
        store.fetch(id, 0, &mut out)?;
        assert_eq!(store.inner().fetch_count(), 1);
        assert_eq!(out, row(3, 2));

        store.store(id, 1, &[11]);
        store.fetch(id, 0, &mut out)?;
        assert_eq!(out[1], 11);
        assert_eq!(store.inner().row(id).map(|r| r[1]), Some(11));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.cache_hits, 2);
        assert_eq!(snapshot.cache_misses, 1);
        Ok(())
    }
}

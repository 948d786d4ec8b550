use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Snapshot of tree statistics at a point in time.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct TreeStatsSnapshot {
    /// Searches driven to completion
    pub finds: u64,
    /// Records inserted
    pub inserts: u64,
    /// Inserts the decision hook declined
    pub skipped_inserts: u64,
    /// Leaf splits performed
    pub leaf_splits: u64,
    /// Internal node splits performed
    pub internal_splits: u64,
    /// Times the tree gained a level
    pub growths: u64,
    /// Children whose parent slot was rewritten
    pub reparented: u64,
    /// Row fetches served from the row cache
    pub cache_hits: u64,
    /// Row fetches that went to storage
    pub cache_misses: u64,
    /// Rows read from storage
    pub rows_fetched: u64,
    /// Row writes sent to storage
    pub rows_stored: u64,
}

/// Thread-safe statistics for one tree.
#[derive(Default, Debug)]
pub struct TreeStats {
    finds: AtomicU64,
    inserts: AtomicU64,
    skipped_inserts: AtomicU64,
    leaf_splits: AtomicU64,
    internal_splits: AtomicU64,
    growths: AtomicU64,
    reparented: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    rows_fetched: AtomicU64,
    rows_stored: AtomicU64,
}

macro_rules! counters {
    ($($field:ident => $inc:ident),* $(,)?) => {
        $(
            pub(crate) fn $inc(&self) {
                self.$field.fetch_add(1, AtomicOrdering::Relaxed);
            }
        )*
    };
}

impl TreeStats {
    counters! {
        finds => inc_finds,
        inserts => inc_inserts,
        skipped_inserts => inc_skipped_inserts,
        leaf_splits => inc_leaf_splits,
        internal_splits => inc_internal_splits,
        growths => inc_growths,
        cache_hits => inc_cache_hits,
        cache_misses => inc_cache_misses,
        rows_fetched => inc_rows_fetched,
        rows_stored => inc_rows_stored,
    }

    pub(crate) fn add_reparented(&self, count: u64) {
        self.reparented.fetch_add(count, AtomicOrdering::Relaxed);
    }

    /// Returns the number of completed searches.
    pub fn finds(&self) -> u64 {
        self.finds.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of inserted records.
    pub fn inserts(&self) -> u64 {
        self.inserts.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of times the tree gained a level.
    pub fn growths(&self) -> u64 {
        self.growths.load(AtomicOrdering::Relaxed)
    }

    /// Creates a snapshot of all current statistics.
    pub fn snapshot(&self) -> TreeStatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(AtomicOrdering::Relaxed);
        TreeStatsSnapshot {
            finds: load(&self.finds),
            inserts: load(&self.inserts),
            skipped_inserts: load(&self.skipped_inserts),
            leaf_splits: load(&self.leaf_splits),
            internal_splits: load(&self.internal_splits),
            growths: load(&self.growths),
            reparented: load(&self.reparented),
            cache_hits: load(&self.cache_hits),
            cache_misses: load(&self.cache_misses),
            rows_fetched: load(&self.rows_fetched),
            rows_stored: load(&self.rows_stored),
        }
    }

    /// Emits current statistics to the tracing infrastructure.
    pub fn emit_tracing(&self) {
        let snapshot = self.snapshot();
        tracing::info!(
            target: "bplus_index::stats",
            finds = snapshot.finds,
            inserts = snapshot.inserts,
            skipped_inserts = snapshot.skipped_inserts,
            leaf_splits = snapshot.leaf_splits,
            internal_splits = snapshot.internal_splits,
            growths = snapshot.growths,
            reparented = snapshot.reparented,
            cache_hits = snapshot.cache_hits,
            cache_misses = snapshot.cache_misses,
            rows_fetched = snapshot.rows_fetched,
            rows_stored = snapshot.rows_stored,
            "tree stats snapshot"
        );
    }
}

use std::sync::Arc;

use parking_lot::Mutex;

use crate::storage::backend::{KeyCompare, RowStore};
use crate::storage::btree::{Batch, Decision, Key, Record, Tree, TreeStatsSnapshot, Window};
use crate::types::Result;

/// Cloneable handle serializing access to one [`Tree`].
///
/// Mutations take the lock for their whole duration. Cache warming is
/// advisory and never waits for it.
#[derive(Debug)]
pub struct SharedTree<S: RowStore> {
    inner: Arc<Mutex<Tree<S>>>,
}

impl<S: RowStore> Clone for SharedTree<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: RowStore> SharedTree<S> {
    /// Wraps `tree`.
    pub fn new(tree: Tree<S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(tree)),
        }
    }

    /// Inserts `record` as key and value.
    pub fn insert(&self, cmp: &mut dyn KeyCompare<u32>, record: u32, back: bool) -> Result<()> {
        self.inner.lock().insert(cmp, record, back)
    }

    /// Searches `key` and inserts whatever `decide` asks for.
    pub fn insert_with<H, F>(&self, cmp: &mut dyn KeyCompare<H>, key: &Key<H>, decide: F) -> Result<Option<u32>>
    where
        H: Clone + PartialEq,
        F: FnOnce(Option<Record>) -> Decision,
    {
        self.inner.lock().insert_with(cmp, key, decide)
    }

    /// Values stored under `key`, paginated with `window`.
    pub fn lookup<H>(&self, cmp: &mut dyn KeyCompare<H>, key: &Key<H>, window: Window) -> Result<Batch<u32>>
    where
        H: Clone + PartialEq,
    {
        self.inner.lock().lookup(cmp, key, window)
    }

    /// Loads `ids` into the row cache unless the tree is busy. Returns the
    /// number of rows read, 0 when the lock was held.
    pub fn warm(&self, ids: &[u32]) -> Result<usize> {
        match self.inner.try_lock() {
            Some(mut tree) => tree.warm(ids),
            None => {
                tracing::debug!(target: "bplus_index::cache", rows = ids.len(), "skipped warming, tree busy");
                Ok(0)
            }
        }
    }

    /// Current root id.
    pub fn root(&self) -> u32 {
        self.inner.lock().root()
    }

    /// Statistics snapshot.
    pub fn stats_snapshot(&self) -> TreeStatsSnapshot {
        self.inner.lock().stats_snapshot()
    }

    /// Runs `f` with exclusive access to the tree.
    pub fn with<T>(&self, f: impl FnOnce(&mut Tree<S>) -> T) -> T {
        f(&mut self.inner.lock())
    }
}

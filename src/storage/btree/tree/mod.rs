//! Blocking driver over the resumable components.
//!
//! [`Tree`] owns a [`RowStore`] behind a [`RowCache`] and services every
//! request a component makes until it is done. Callers that need to
//! interleave I/O differently can drive the components themselves.

mod check;
mod ops;
mod options;

use std::sync::Arc;

use smallvec::SmallVec;

use crate::storage::backend::{KeyCompare, RowStore};
use crate::storage::btree::cache::{CachedStore, RowCache};
use crate::storage::btree::node::{self, order_for_row_len, Node};
use crate::storage::btree::request::{FetchRequest, Requests, StateMachine, Window};
use crate::storage::btree::stats::{TreeStats, TreeStatsSnapshot};
use crate::types::{Error, Result};

pub use check::TreeShape;
pub use ops::Decision;
pub use options::TreeOptions;

/// A B+ tree over `u32` keys and values, stored as rows in `S`.
#[derive(Debug)]
pub struct Tree<S: RowStore> {
    store: CachedStore<S>,
    order: usize,
    root: u32,
    options: TreeOptions,
    stats: Arc<TreeStats>,
}

/// The row of an empty leaf root of `order`.
pub fn prime_row(order: usize) -> Vec<u32> {
    Node::empty_leaf(order).encode()
}

impl<S: RowStore> Tree<S> {
    /// Opens the tree rooted at `options.root`, or creates an empty one.
    ///
    /// An existing tree keeps the order its root row was written with.
    pub fn open_or_create(mut store: S, mut options: TreeOptions) -> Result<Self> {
        options.validate()?;
        let stats = Arc::new(TreeStats::default());
        let (root, order) = match options.root {
            Some(root) => {
                let node = node::fetch(&mut store, root, options.order)?;
                if !node.is_root() {
                    return Err(Error::Invalid("node is not a root"));
                }
                (root, node.order())
            }
            None => {
                let root = store.allocate();
                store.store(root, 0, &prime_row(options.order));
                options.root = Some(root);
                tracing::debug!(
                    target: "bplus_index::insert",
                    root,
                    order = options.order,
                    "created empty tree"
                );
                (root, options.order)
            }
        };
        options.order = order;
        Ok(Self {
            store: CachedStore::new(store, options.cache_capacity, order, Arc::clone(&stats)),
            order,
            root,
            options,
            stats,
        })
    }

    /// Current root id; persist it to reopen the tree.
    pub fn root(&self) -> u32 {
        self.root
    }

    /// Maximum children per internal node.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Options in effect, with `root` and `order` kept current.
    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    /// Access the live statistics counters for this tree.
    pub fn stats(&self) -> Arc<TreeStats> {
        Arc::clone(&self.stats)
    }

    /// Snapshot the current statistics counters.
    pub fn stats_snapshot(&self) -> TreeStatsSnapshot {
        self.stats.snapshot()
    }

    /// The row cache.
    pub fn cache(&self) -> &RowCache {
        self.store.cache()
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        self.store.inner()
    }

    /// Gives the underlying store back.
    pub fn into_store(self) -> S {
        self.store.into_inner()
    }

    /// Reads node `id`, through the cache.
    pub fn fetch_node(&mut self, id: u32) -> Result<Node> {
        node::fetch(&mut self.store, id, self.order)
    }

    /// Loads rows into the cache ahead of use. Returns how many were read.
    pub fn warm(&mut self, ids: &[u32]) -> Result<usize> {
        let mut loaded = 0;
        for &id in ids {
            if !self.store.cache().contains(id) {
                self.fetch_node(id)?;
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    fn read(&mut self, request: FetchRequest) -> Result<Vec<u32>> {
        let mut row = vec![0; request.length];
        let len = self.store.fetch(request.id, request.start, &mut row)?;
        if request.start == 0 && len != request.length {
            return Err(Error::OrderMismatch {
                id: request.id,
                expected: self.order,
                actual: order_for_row_len(len).unwrap_or(0),
            });
        }
        row.truncate(len.saturating_sub(request.start).min(request.length));
        Ok(row)
    }

    /// Services `machine` until it is done.
    ///
    /// Stores are applied first, then fetches, comparisons and allocations are
    /// answered, and finally the stores are acknowledged.
    pub fn drive<H, M>(&mut self, machine: &mut M, cmp: &mut dyn KeyCompare<H>) -> Result<()>
    where
        H: Clone,
        M: StateMachine<H>,
    {
        let window = Window::new(0, self.options.batch_window);
        loop {
            let mut requests = Requests::new(window);
            if machine.status(&mut requests).is_done() {
                return Ok(());
            }
            if requests.is_empty() {
                return Err(Error::Corruption("state machine stalled"));
            }
            let fetches: SmallVec<[FetchRequest; 4]> = requests.fetches.iter().copied().collect();
            let compares = requests.compares.items().to_vec();
            let allocations = requests.allocations;
            let mut stored: SmallVec<[u32; 8]> = SmallVec::new();
            for store in &requests.stores {
                self.store.store(store.id, store.start, store.words);
                stored.push(store.id);
            }
            drop(requests);

            for request in fetches {
                let row = self.read(request)?;
                machine.data(request.id, request.start, &row);
            }
            for request in compares {
                let ordering = cmp.compare(&request.a, &request.b)?;
                machine.compared(&request, ordering);
            }
            for _ in 0..allocations {
                let id = self.store.allocate();
                if !machine.allocated(id) {
                    tracing::warn!(target: "bplus_index::insert", id, "allocated id went unused");
                }
            }
            for id in stored {
                machine.updated(id);
            }
        }
    }
}

use std::ops::ControlFlow;

use super::Tree;
use crate::storage::backend::{KeyCompare, NoCompare, RowStore};
use crate::storage::btree::finder::Finder;
use crate::storage::btree::growth::Growth;
use crate::storage::btree::insertion::Insertion;
use crate::storage::btree::node::Node;
use crate::storage::btree::range::{Range, Record};
use crate::storage::btree::request::{Batch, Window};
use crate::storage::btree::Key;
use crate::types::{Error, Result};

/// Answer of an insertion hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Leave the tree unchanged.
    Skip,
    /// Insert `record` as key and value, after equal keys when `back` is set.
    Insert {
        /// Record to insert.
        record: u32,
        /// Place after, rather than before, keys comparing equal.
        back: bool,
    },
}

impl<S: RowStore> Tree<S> {
    /// Positions a range over every record whose key equals `key`.
    pub fn find<H>(&mut self, cmp: &mut dyn KeyCompare<H>, key: &Key<H>) -> Result<Range>
    where
        H: Clone + PartialEq,
    {
        let root = self.fetch_node(self.root)?;
        let mut finder = Finder::new(self.order);
        finder.setup(key.clone(), self.root, &root)?;
        self.drive(&mut finder, cmp)?;
        self.stats.inc_finds();
        let span = finder
            .span()
            .ok_or(Error::Corruption("search ended above the leaves"))?;
        tracing::trace!(
            target: "bplus_index::search",
            depth = finder.depth(),
            first_leaf = span.first_id,
            last_leaf = span.last_id,
            "search done"
        );
        Range::from_span(span)
    }

    /// Calls `visit` on every record of `range`, in key order, until it
    /// breaks.
    pub fn walk<F>(&mut self, range: &mut Range, mut visit: F) -> Result<()>
    where
        F: FnMut(Record) -> ControlFlow<()>,
    {
        loop {
            let mut records = Batch::new(Window::ALL);
            let mut fetches = Batch::new(Window::ALL);
            let has_next = range.get(&mut records, &mut fetches);
            for record in &records {
                if visit(*record).is_break() {
                    return Ok(());
                }
            }
            if !has_next {
                return Ok(());
            }
            for request in &fetches {
                let row = self.read(*request)?;
                range.data(request.id, request.start, &row);
            }
            range.next()?;
        }
    }

    /// Visits every record whose key equals `key`.
    pub fn for_each<H, F>(&mut self, cmp: &mut dyn KeyCompare<H>, key: &Key<H>, visit: F) -> Result<()>
    where
        H: Clone + PartialEq,
        F: FnMut(Record) -> ControlFlow<()>,
    {
        let mut range = self.find(cmp, key)?;
        self.walk(&mut range, visit)
    }

    /// Returns the values stored under `key` that fall in `window`, along
    /// with the total number of matches.
    pub fn lookup<H>(&mut self, cmp: &mut dyn KeyCompare<H>, key: &Key<H>, window: Window) -> Result<Batch<u32>>
    where
        H: Clone + PartialEq,
    {
        let mut values = Batch::new(window);
        self.for_each(cmp, key, |record| {
            values.push(record.value);
            ControlFlow::Continue(())
        })?;
        Ok(values)
    }

    /// Every record of the tree, in key order.
    pub fn records(&mut self) -> Result<Vec<Record>> {
        let (head_id, head) = self.outer_leaf(false)?;
        let (tail_id, tail) = self.outer_leaf(true)?;
        let stop = tail.len();
        let mut range = Range::new();
        range.setup(head_id, head, 0, tail_id, tail, stop)?;
        let mut records = Vec::new();
        self.walk(&mut range, |record| {
            records.push(record);
            ControlFlow::Continue(())
        })?;
        Ok(records)
    }

    /// Leftmost leaf, or with `last` the rightmost one.
    fn outer_leaf(&mut self, last: bool) -> Result<(u32, Node)> {
        let mut id = self.root;
        let mut node = self.fetch_node(id)?;
        loop {
            let children = node.children();
            let next = if last { children.last() } else { children.first() };
            match next {
                Some(&child) => {
                    id = child;
                    node = self.fetch_node(id)?;
                }
                None => return Ok((id, node)),
            }
        }
    }

    /// Inserts `record` as key and value, before (or with `back`, after) any
    /// equal keys.
    pub fn insert(&mut self, cmp: &mut dyn KeyCompare<u32>, record: u32, back: bool) -> Result<()> {
        self.insert_entry(cmp, record, record, back)
    }

    /// Inserts `(key, value)`, before (or with `back`, after) any equal keys.
    pub fn insert_entry(
        &mut self,
        cmp: &mut dyn KeyCompare<u32>,
        key: u32,
        value: u32,
        back: bool,
    ) -> Result<()> {
        let range = self.find(cmp, &Key::Known(key))?;
        self.apply(key, value, &range, back)
    }

    /// Searches `key` and lets `decide` choose what to insert.
    ///
    /// `decide` is given the first record equal to `key`, if any. Returns the
    /// inserted record, or `None` when the hook skipped.
    pub fn insert_with<H, F>(&mut self, cmp: &mut dyn KeyCompare<H>, key: &Key<H>, decide: F) -> Result<Option<u32>>
    where
        H: Clone + PartialEq,
        F: FnOnce(Option<Record>) -> Decision,
    {
        let range = self.find(cmp, key)?;
        let mut first = None;
        if !range.is_empty() {
            // The head leaf may end before the first match.
            let mut cursor = range.clone();
            self.walk(&mut cursor, |record| {
                first = Some(record);
                ControlFlow::Break(())
            })?;
        }
        match decide(first) {
            Decision::Skip => {
                self.stats.inc_skipped_inserts();
                Ok(None)
            }
            Decision::Insert { record, back } => {
                self.apply(record, record, &range, back)?;
                Ok(Some(record))
            }
        }
    }

    fn apply(&mut self, key: u32, value: u32, range: &Range, back: bool) -> Result<()> {
        let mut insertion = Insertion::new(self.order);
        insertion.setup_entry(key, value, range, back)?;
        self.drive(&mut insertion, &mut NoCompare)?;
        let report = insertion.report();
        self.stats.inc_inserts();
        for _ in 0..report.leaf_splits {
            self.stats.inc_leaf_splits();
        }
        for _ in 0..report.internal_splits {
            self.stats.inc_internal_splits();
        }
        self.stats.add_reparented(report.reparented as u64);
        if let Some(root) = report.new_root {
            self.adopt_root(root);
        }
        Ok(())
    }

    /// Adds a level above the root and returns the new root id.
    pub fn grow(&mut self) -> Result<u32> {
        let mut growth = Growth::new();
        growth.setup(self.root, self.order);
        self.drive(&mut growth, &mut NoCompare)?;
        let (root, _) = growth
            .outcome()
            .ok_or(Error::Corruption("growth ended without a root"))?;
        self.adopt_root(root);
        Ok(root)
    }

    fn adopt_root(&mut self, root: u32) {
        tracing::info!(
            target: "bplus_index::insert",
            previous = self.root,
            root,
            "tree gained a level"
        );
        self.root = root;
        self.options.root = Some(root);
        self.stats.inc_growths();
    }
}

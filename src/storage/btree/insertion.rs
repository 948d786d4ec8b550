//! One insertion, with splits cascading towards the root.
//!
//! Each level goes through the same steps: place the entry in the target
//! node, split it if it overflows, grow the tree if the target was the root,
//! then store the touched rows, repoint the moved children, and load the
//! parent. A split hands its separator and new sibling to the parent level.

use crate::storage::btree::divider::{Divider, Split};
use crate::storage::btree::fetcher::ParentFetcher;
use crate::storage::btree::growth::Growth;
use crate::storage::btree::node::Node;
use crate::storage::btree::range::Range;
use crate::storage::btree::reparentor::Reparentor;
use crate::storage::btree::request::{Phase, Requests, StateMachine, StoreRequest};
use crate::types::{Error, Result};

/// What an insertion changed in the shape of the tree.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InsertionReport {
    /// Leaves split.
    pub leaf_splits: usize,
    /// Internal nodes split.
    pub internal_splits: usize,
    /// Children whose parent slot was rewritten.
    pub reparented: usize,
    /// Root created when the old root split.
    pub new_root: Option<u32>,
}

#[derive(Debug, Clone)]
struct PendingRow {
    id: u32,
    row: Vec<u32>,
    stored: bool,
}

impl PendingRow {
    fn new(id: u32, node: &Node) -> Self {
        Self {
            id,
            row: node.encode(),
            stored: false,
        }
    }
}

/// Final step of a level: rows written, children repointed, parent loaded.
#[derive(Debug, Clone)]
struct Commit {
    target: PendingRow,
    /// The new sibling and the separator to propagate, after a split.
    sibling: Option<(PendingRow, u32)>,
    reparentor: Option<Reparentor>,
    parent: Option<ParentFetcher>,
}

impl Commit {
    fn is_complete(&self) -> bool {
        self.target.stored
            && self.sibling.as_ref().map_or(true, |(row, _)| row.stored)
            && self.reparentor.as_ref().map_or(true, Reparentor::is_done)
            && self.parent.as_ref().map_or(true, |parent| parent.node().is_some())
    }
}

#[derive(Debug, Clone)]
enum Level {
    Dividing(Divider),
    Growing {
        target_id: u32,
        target: Node,
        split: Split,
        growth: Growth,
    },
    Committing(Commit),
    Done,
}

/// Resumable insertion of one entry at a position found by a search.
#[derive(Debug, Clone)]
pub struct Insertion {
    order: usize,
    level: Option<Level>,
    report: InsertionReport,
}

impl Insertion {
    /// An insertion into a tree of `order`, not yet set up.
    pub fn new(order: usize) -> Self {
        Self {
            order,
            level: None,
            report: InsertionReport::default(),
        }
    }

    /// Inserts `record`, as both key and value, at one end of `range`: before
    /// the keys equal to it, or after them when `back` is set.
    pub fn setup(&mut self, record: u32, range: &Range, back: bool) -> Result<()> {
        self.setup_entry(record, record, range, back)
    }

    /// Inserts `(key, value)` at one end of `range`.
    pub fn setup_entry(&mut self, key: u32, value: u32, range: &Range, back: bool) -> Result<()> {
        let (leaf_id, leaf, position) = range
            .extremity(back)
            .ok_or(Error::Invalid("range is not set up"))?;
        if position > leaf.len() {
            return Err(Error::Invalid("insertion position past the end of the leaf"));
        }
        self.report = InsertionReport::default();
        self.place(key, value, leaf_id, leaf.clone(), position);
        Ok(())
    }

    /// Shape changes made so far.
    pub fn report(&self) -> InsertionReport {
        self.report
    }

    /// The new root id, if the tree grew.
    pub fn new_root(&self) -> Option<u32> {
        self.report.new_root
    }

    /// Puts `(key, value)` at key position `position` of `target`.
    fn place(&mut self, key: u32, value: u32, target_id: u32, mut target: Node, position: usize) {
        let (last_key, last_value) = target.bubble(position, key, value);
        let mut divider = Divider::new();
        divider.setup(target_id, target, last_key, last_value);
        self.level = Some(Level::Dividing(divider));
        self.settle();
    }

    /// Takes every transition that needs no further feedback.
    fn settle(&mut self) {
        loop {
            let next = match self.level.take() {
                Some(Level::Dividing(divider)) => {
                    if divider.outcome().is_none() {
                        self.level = Some(Level::Dividing(divider));
                        return;
                    }
                    match divider.into_outcome() {
                        Some((id, node, split)) => self.divided(id, node, split),
                        None => Level::Done,
                    }
                }
                Some(Level::Growing {
                    target_id,
                    mut target,
                    mut split,
                    growth,
                }) => {
                    let Some((root_id, root)) = growth.outcome() else {
                        self.level = Some(Level::Growing {
                            target_id,
                            target,
                            split,
                            growth,
                        });
                        return;
                    };
                    self.report.new_root = Some(root_id);
                    target.set_parent(root_id);
                    split.sibling.set_parent(root_id);
                    let parent = ParentFetcher::loaded(target_id, root_id, root.clone());
                    Self::commit(target_id, &target, Some(split), Some(parent))
                }
                Some(Level::Committing(commit)) if commit.is_complete() => {
                    self.report.reparented += commit.reparentor.as_ref().map_or(0, Reparentor::fixed);
                    match (commit.sibling, commit.parent) {
                        (Some((sibling, separator)), Some(parent)) => {
                            let position = parent.position();
                            let parent_id = parent.parent_id();
                            match (position, parent.node()) {
                                (Some(position), Some(node)) => {
                                    self.place(separator, sibling.id, parent_id, node.clone(), position);
                                    return;
                                }
                                _ => Level::Done,
                            }
                        }
                        _ => Level::Done,
                    }
                }
                other => {
                    self.level = other;
                    return;
                }
            };
            self.level = Some(next);
        }
    }

    /// Chooses the next step once the divider has placed the entry.
    ///
    /// A full root splits before it grows: the divider's allocation comes
    /// first, so the sibling gets the lower fresh id and the new root the
    /// next one.
    fn divided(&mut self, target_id: u32, target: Node, split: Option<Split>) -> Level {
        let Some(split) = split else {
            return Self::commit(target_id, &target, None, None);
        };
        if target.is_leaf() {
            self.report.leaf_splits += 1;
        } else {
            self.report.internal_splits += 1;
        }
        match target.parent() {
            None => {
                let mut growth = Growth::new();
                growth.setup(target_id, self.order);
                Level::Growing {
                    target_id,
                    target,
                    split,
                    growth,
                }
            }
            Some(parent_id) => {
                let parent = ParentFetcher::new(target_id, parent_id, self.order);
                Self::commit(target_id, &target, Some(split), Some(parent))
            }
        }
    }

    fn commit(target_id: u32, target: &Node, split: Option<Split>, parent: Option<ParentFetcher>) -> Level {
        let reparentor = split.as_ref().filter(|s| !s.sibling.is_leaf()).map(|s| {
            let mut reparentor = Reparentor::new();
            reparentor.setup(s.sibling_id, &s.sibling);
            reparentor
        });
        Level::Committing(Commit {
            target: PendingRow::new(target_id, target),
            sibling: split.map(|s| (PendingRow::new(s.sibling_id, &s.sibling), s.separator)),
            reparentor,
            parent,
        })
    }
}

impl StateMachine for Insertion {
    fn status<'a>(&'a self, requests: &mut Requests<'a>) -> Phase {
        match &self.level {
            None => Phase::Uninitialized,
            Some(Level::Done) => Phase::Done,
            Some(Level::Dividing(divider)) => divider.status(requests),
            Some(Level::Growing { growth, .. }) => growth.status(requests),
            Some(Level::Committing(commit)) => {
                let rows = std::iter::once(&commit.target)
                    .chain(commit.sibling.as_ref().map(|(row, _)| row));
                for row in rows.filter(|row| !row.stored) {
                    requests.stores.push(StoreRequest {
                        id: row.id,
                        start: 0,
                        words: &row.row,
                    });
                }
                if let Some(reparentor) = &commit.reparentor {
                    reparentor.status(requests);
                }
                if let Some(parent) = &commit.parent {
                    parent.request(&mut requests.fetches);
                }
                requests.phase()
            }
        }
    }

    fn data(&mut self, id: u32, start: usize, words: &[u32]) {
        if let Some(Level::Committing(commit)) = &mut self.level {
            if let Some(reparentor) = &mut commit.reparentor {
                reparentor.data(id, start, words);
            }
            if let Some(parent) = &mut commit.parent {
                parent.data(id, start, words);
            }
        }
        self.settle();
    }

    fn allocated(&mut self, id: u32) -> bool {
        let taken = match &mut self.level {
            Some(Level::Dividing(divider)) => divider.allocated(id),
            Some(Level::Growing { growth, .. }) => growth.allocated(id),
            _ => false,
        };
        self.settle();
        taken
    }

    fn updated(&mut self, id: u32) {
        match &mut self.level {
            Some(Level::Growing { growth, .. }) => growth.updated(id),
            Some(Level::Committing(commit)) => {
                let rows = std::iter::once(&mut commit.target)
                    .chain(commit.sibling.as_mut().map(|(row, _)| row));
                for row in rows.filter(|row| row.id == id) {
                    row.stored = true;
                }
                if let Some(reparentor) = &mut commit.reparentor {
                    reparentor.updated(id);
                }
            }
            _ => {}
        }
        self.settle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::btree::request::Window;
    use crate::types::{NO_NEXT_LEAF, NO_PARENT};

    fn positioned(id: u32, leaf: Node, at: usize) -> Range {
        let mut range = Range::new();
        range.setup(id, leaf.clone(), at, id, leaf, at).unwrap();
        range
    }

    /// Acknowledges stores and hands out ids until the insertion needs a row.
    /// Returns the full rows written, in order.
    fn pump(insertion: &mut Insertion, next_id: &mut u32) -> Vec<(u32, Vec<u32>)> {
        let mut written = Vec::new();
        loop {
            let mut requests = Requests::new(Window::ALL);
            let phase = insertion.status(&mut requests);
            if phase.is_done() || !requests.fetches.is_empty() {
                return written;
            }
            let stores: Vec<(u32, usize, Vec<u32>)> = requests
                .stores
                .iter()
                .map(|s| (s.id, s.start, s.words.to_vec()))
                .collect();
            let allocations = requests.allocations;
            drop(requests);
            for _ in 0..allocations {
                assert!(insertion.allocated(*next_id));
                *next_id += 1;
            }
            for (id, start, words) in stores {
                insertion.updated(id);
                if start == 0 {
                    written.push((id, words));
                }
            }
        }
    }

    #[test]
    fn insert_into_leaf_with_room() -> Result<()> {
        let leaf = Node::leaf(3, vec![3], vec![3], NO_NEXT_LEAF, NO_PARENT);
        let mut insertion = Insertion::new(3);
        insertion.setup(4, &positioned(0, leaf, 1), false)?;
        let mut next_id = 1;
        let written = pump(&mut insertion, &mut next_id);
        assert_eq!(written.len(), 1);
        let stored = Node::decode(3, &written[0].1)?;
        assert_eq!(stored.keys(), &[3, 4]);
        assert_eq!(insertion.report(), InsertionReport::default());
        Ok(())
    }

    #[test]
    fn root_leaf_split_grows_tree() -> Result<()> {
        let leaf = Node::leaf(3, vec![3, 4], vec![3, 4], NO_NEXT_LEAF, NO_PARENT);
        let mut insertion = Insertion::new(3);
        insertion.setup(5, &positioned(0, leaf, 2), false)?;
        let mut next_id = 1;
        let written = pump(&mut insertion, &mut next_id);

        // split allocates sibling 1, then growth allocates root 2
        let mut requests = Requests::new(Window::ALL);
        assert_eq!(insertion.status(&mut requests), Phase::Done);
        assert_eq!(insertion.new_root(), Some(2));
        let row = |id: u32| {
            written
                .iter()
                .rev()
                .find(|(written_id, _)| *written_id == id)
                .map(|(_, words)| Node::decode(3, words))
                .unwrap()
        };
        let old = row(0)?;
        let sibling = row(1)?;
        let root = row(2)?;
        assert_eq!(old.keys(), &[3, 4]);
        assert_eq!(old.next_leaf(), Some(1));
        assert_eq!(old.parent(), Some(2));
        assert_eq!(sibling.keys(), &[5]);
        assert_eq!(sibling.parent(), Some(2));
        assert_eq!(root.keys(), &[4]);
        assert_eq!(root.children(), &[0, 1]);
        assert!(root.is_root());
        assert_eq!(insertion.report().leaf_splits, 1);
        Ok(())
    }

    #[test]
    fn split_below_root_fetches_parent() -> Result<()> {
        let leaf = Node::leaf(3, vec![3, 4], vec![3, 4], NO_NEXT_LEAF, 7);
        let parent = Node::internal(3, vec![4], vec![0, 8], NO_PARENT);
        let mut insertion = Insertion::new(3);
        insertion.setup(2, &positioned(0, leaf, 0), false)?;
        let mut next_id = 20;
        pump(&mut insertion, &mut next_id);

        let mut requests = Requests::new(Window::ALL);
        assert_eq!(insertion.status(&mut requests), Phase::WaitingForFetch);
        assert_eq!(requests.fetches.items()[0].id, 7);
        drop(requests);
        insertion.data(7, 0, &parent.encode());

        let written = pump(&mut insertion, &mut next_id);
        let updated = Node::decode(3, &written.last().unwrap().1)?;
        assert_eq!(written.last().unwrap().0, 7);
        assert_eq!(updated.keys(), &[3, 4]);
        assert_eq!(updated.children(), &[0, 20, 8]);
        assert_eq!(insertion.new_root(), None);
        Ok(())
    }
}

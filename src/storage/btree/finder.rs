//! Root-to-leaf descent bounding every occurrence of a key.

use std::cmp::Ordering;

use crate::storage::btree::dichotomy::{Bound, Dichotomy};
use crate::storage::btree::explorer::Explorer;
use crate::storage::btree::node::Node;
use crate::storage::btree::request::{CompareRequest, Phase, Requests, StateMachine};
use crate::storage::btree::Key;
use crate::types::Result;

/// Where the occurrences of a key start and stop, at leaf level.
///
/// Records `first_index..` of the first leaf up to `..last_index` of the last
/// leaf, following the leaf chain, are exactly those equal to the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafSpan {
    /// Leaf holding the first occurrence.
    pub first_id: u32,
    /// Its contents.
    pub first: Node,
    /// Index of the first occurrence in `first`.
    pub first_index: usize,
    /// Leaf holding the last occurrence.
    pub last_id: u32,
    /// Its contents.
    pub last: Node,
    /// One past the last occurrence in `last`.
    pub last_index: usize,
}

#[derive(Debug, Clone)]
struct LeafSearch<H> {
    first_id: u32,
    first: Node,
    last_id: u32,
    last: Node,
    first_dichotomy: Dichotomy<H>,
    /// `None` when both ends lie in the same leaf.
    last_dichotomy: Option<Dichotomy<H>>,
}

impl<H: Clone + PartialEq> LeafSearch<H> {
    fn new(key: Key<H>, first_id: u32, first: Node, last_id: u32, last: Node) -> Self {
        let first_dichotomy = Dichotomy::new(key.clone(), first.keys());
        let last_dichotomy = (first_id != last_id).then(|| Dichotomy::new(key, last.keys()));
        Self {
            first_id,
            first,
            last_id,
            last,
            first_dichotomy,
            last_dichotomy,
        }
    }

    fn last_dichotomy(&self) -> &Dichotomy<H> {
        self.last_dichotomy.as_ref().unwrap_or(&self.first_dichotomy)
    }

    fn span(&self) -> Option<LeafSpan> {
        Some(LeafSpan {
            first_id: self.first_id,
            first: self.first.clone(),
            first_index: self.first_dichotomy.index(Bound::First)?,
            last_id: self.last_id,
            last: self.last.clone(),
            last_index: self.last_dichotomy().index(Bound::Last)?,
        })
    }
}

#[derive(Debug, Clone)]
enum Search<H> {
    Descending { key: Key<H>, explorer: Explorer<H> },
    Leaves(LeafSearch<H>),
}

/// Resumable search from the root down to the leaves.
#[derive(Debug, Clone)]
pub struct Finder<H> {
    order: usize,
    depth: usize,
    search: Option<Search<H>>,
}

impl<H: Clone + PartialEq> Finder<H> {
    /// A finder for a tree of `order`, not yet set up.
    pub fn new(order: usize) -> Self {
        Self {
            order,
            depth: 0,
            search: None,
        }
    }

    /// Starts searching `key` from the root.
    pub fn setup(&mut self, key: Key<H>, root_id: u32, root: &Node) -> Result<()> {
        self.depth = 0;
        if root.is_leaf() {
            let leaves = LeafSearch::new(key, root_id, root.clone(), root_id, root.clone());
            self.search = Some(Search::Leaves(leaves));
            return Ok(());
        }
        let mut explorer = Explorer::new(self.order);
        explorer.setup(key.clone(), root_id, root, root_id, root)?;
        self.search = Some(Search::Descending { key, explorer });
        Ok(())
    }

    /// Number of internal levels crossed so far.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The leaf span, once done.
    pub fn span(&self) -> Option<LeafSpan> {
        match &self.search {
            Some(Search::Leaves(leaves)) => leaves.span(),
            _ => None,
        }
    }

    /// Moves down one level for every level the explorer has finished.
    fn descend(&mut self) {
        while let Some(Search::Descending { key, explorer }) = &mut self.search {
            let Some((first_id, first, last_id, last)) = explorer.outcome() else {
                return;
            };
            self.depth += 1;
            tracing::trace!(
                target: "bplus_index::search",
                depth = self.depth,
                first_id,
                last_id,
                "descending"
            );
            debug_assert_eq!(first.is_leaf(), last.is_leaf(), "leaves at unequal depth");
            if first.is_leaf() {
                let leaves =
                    LeafSearch::new(key.clone(), first_id, first.clone(), last_id, last.clone());
                self.search = Some(Search::Leaves(leaves));
                return;
            }
            let (first, last) = (first.clone(), last.clone());
            let mut next = Explorer::new(self.order);
            if next.setup(key.clone(), first_id, &first, last_id, &last).is_err() {
                return;
            }
            *explorer = next;
        }
    }
}

impl<H: Clone + PartialEq> StateMachine<H> for Finder<H> {
    fn status<'a>(&'a self, requests: &mut Requests<'a, H>) -> Phase {
        match &self.search {
            None => Phase::Uninitialized,
            Some(Search::Descending { explorer, .. }) => explorer.status(requests),
            Some(Search::Leaves(leaves)) => {
                let first = leaves.first_dichotomy.request(Bound::First);
                let last = leaves.last_dichotomy().request(Bound::Last);
                if first.is_none() && last.is_none() {
                    return Phase::Done;
                }
                if let Some(first) = &first {
                    requests.compares.push(first.clone());
                }
                if let Some(last) = last {
                    if first.as_ref() != Some(&last) {
                        requests.compares.push(last);
                    }
                }
                requests.phase()
            }
        }
    }

    fn data(&mut self, id: u32, start: usize, words: &[u32]) {
        if let Some(Search::Descending { explorer, .. }) = &mut self.search {
            explorer.data(id, start, words);
            self.descend();
        }
    }

    fn compared(&mut self, request: &CompareRequest<H>, ordering: Ordering) {
        match &mut self.search {
            Some(Search::Descending { explorer, .. }) => explorer.compared(request, ordering),
            Some(Search::Leaves(leaves)) => {
                leaves.first_dichotomy.compared(request, ordering);
                if let Some(last) = &mut leaves.last_dichotomy {
                    last.compared(request, ordering);
                }
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::btree::request::Window;
    use crate::types::{NO_NEXT_LEAF, NO_PARENT};

    #[test]
    fn leaf_root_needs_no_fetch() -> Result<()> {
        let root = Node::leaf(4, vec![3, 4, 5], vec![3, 4, 5], NO_NEXT_LEAF, NO_PARENT);
        let mut finder: Finder<u32> = Finder::new(4);
        finder.setup(Key::Known(4), 0, &root)?;
        loop {
            let mut requests = Requests::new(Window::ALL);
            let phase = finder.status(&mut requests);
            if phase.is_done() {
                break;
            }
            assert_eq!(phase, Phase::WaitingForCompare);
            assert!(requests.fetches.is_empty());
            let compares = requests.compares.items().to_vec();
            drop(requests);
            for request in compares {
                let a = request.a.known().unwrap();
                finder.compared(&request, a.cmp(&4));
            }
        }
        let span = finder.span().unwrap();
        assert_eq!((span.first_id, span.first_index), (0, 1));
        assert_eq!((span.last_id, span.last_index), (0, 2));
        assert_eq!(finder.depth(), 0);
        Ok(())
    }

    #[test]
    fn not_set_up_is_uninitialized() {
        let finder: Finder<u32> = Finder::new(4);
        let mut requests = Requests::new(Window::ALL);
        assert_eq!(finder.status(&mut requests), Phase::Uninitialized);
        assert!(finder.span().is_none());
    }
}

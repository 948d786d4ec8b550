//! One level of a descent: picks and loads the children holding the first
//! and the last occurrence of a key.

use std::cmp::Ordering;

use crate::storage::btree::dichotomy::{Bound, Dichotomy};
use crate::storage::btree::fetcher::Fetcher;
use crate::storage::btree::node::Node;
use crate::storage::btree::request::{CompareRequest, Phase, Requests, StateMachine};
use crate::storage::btree::Key;
use crate::types::{Error, Result};

#[derive(Debug, Clone)]
struct Exploration<H> {
    first_children: Vec<u32>,
    last_children: Vec<u32>,
    first: Dichotomy<H>,
    /// `None` when both bounds are searched in the same node.
    last: Option<Dichotomy<H>>,
    first_child: Option<Fetcher>,
    last_child: Option<Fetcher>,
}

impl<H: Clone + PartialEq> Exploration<H> {
    fn last_dichotomy(&self) -> &Dichotomy<H> {
        self.last.as_ref().unwrap_or(&self.first)
    }

    /// Starts loading children once both child indices are known.
    fn advance(&mut self, order: usize) {
        if self.first_child.is_some() {
            return;
        }
        let first = self.first.index(Bound::First);
        let last = self.last_dichotomy().index(Bound::Last);
        if let (Some(first), Some(last)) = (first, last) {
            self.first_child = Some(Fetcher::new(self.first_children[first], order));
            self.last_child = Some(Fetcher::new(self.last_children[last], order));
        }
    }
}

/// Selects and fetches the children to descend into for a pivot.
///
/// The first child is the one left of the first key not less than the pivot;
/// the last child is the one right of the last key not greater than it.
#[derive(Debug, Clone)]
pub struct Explorer<H> {
    order: usize,
    state: Option<Exploration<H>>,
}

impl<H: Clone + PartialEq> Explorer<H> {
    /// An explorer with nothing to do yet.
    pub fn new(order: usize) -> Self {
        Self { order, state: None }
    }

    /// Explores `first` for the first occurrence of `key` and `last` for the
    /// last one. Both must be internal nodes; they may be the same node.
    pub fn setup(
        &mut self,
        key: Key<H>,
        first_id: u32,
        first: &Node,
        last_id: u32,
        last: &Node,
    ) -> Result<()> {
        if first.is_leaf() || last.is_leaf() {
            return Err(Error::Invalid("explorer needs internal nodes"));
        }
        let first_dichotomy = Dichotomy::new(key.clone(), first.keys());
        let last_dichotomy = (first_id != last_id).then(|| Dichotomy::new(key, last.keys()));
        let mut exploration = Exploration {
            first_children: first.children().to_vec(),
            last_children: last.children().to_vec(),
            first: first_dichotomy,
            last: last_dichotomy,
            first_child: None,
            last_child: None,
        };
        exploration.advance(self.order);
        self.state = Some(exploration);
        Ok(())
    }

    /// The loaded children, once done.
    pub fn outcome(&self) -> Option<(u32, &Node, u32, &Node)> {
        let state = self.state.as_ref()?;
        let first = state.first_child.as_ref()?;
        let last = state.last_child.as_ref()?;
        Some((first.id(), first.node()?, last.id(), last.node()?))
    }
}

impl<H: Clone + PartialEq> StateMachine<H> for Explorer<H> {
    fn status<'a>(&'a self, requests: &mut Requests<'a, H>) -> Phase {
        let Some(state) = &self.state else {
            return Phase::Uninitialized;
        };
        match (&state.first_child, &state.last_child) {
            (Some(first), Some(last)) => {
                if first.is_loaded() && last.is_loaded() {
                    return Phase::Done;
                }
                first.request(&mut requests.fetches);
                if first.is_loaded() || first.id() != last.id() {
                    last.request(&mut requests.fetches);
                }
            }
            _ => {
                let first = state.first.request(Bound::First);
                let last = state.last_dichotomy().request(Bound::Last);
                if let Some(first) = &first {
                    requests.compares.push(first.clone());
                }
                if let Some(last) = last {
                    if first.as_ref() != Some(&last) {
                        requests.compares.push(last);
                    }
                }
            }
        }
        requests.phase()
    }

    fn data(&mut self, id: u32, start: usize, words: &[u32]) {
        let Some(state) = &mut self.state else { return };
        if let Some(first) = &mut state.first_child {
            first.data(id, start, words);
        }
        if let Some(last) = &mut state.last_child {
            last.data(id, start, words);
        }
    }

    fn compared(&mut self, request: &CompareRequest<H>, ordering: Ordering) {
        let order = self.order;
        let Some(state) = &mut self.state else { return };
        state.first.compared(request, ordering);
        if let Some(last) = &mut state.last {
            last.compared(request, ordering);
        }
        state.advance(order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::btree::request::Window;
    use crate::types::{NO_NEXT_LEAF, NO_PARENT};

    fn answer(explorer: &mut Explorer<u32>, pivot: u32) {
        loop {
            let mut requests = Requests::new(Window::ALL);
            if explorer.status(&mut requests) != Phase::WaitingForCompare {
                return;
            }
            let compares = requests.compares.items().to_vec();
            drop(requests);
            for request in compares {
                let a = request.a.known().unwrap();
                explorer.compared(&request, a.cmp(&pivot));
            }
        }
    }

    #[test]
    fn shared_node_selects_both_children() -> Result<()> {
        let root = Node::internal(4, vec![10, 20, 20], vec![1, 2, 3, 4], NO_PARENT);
        let mut explorer = Explorer::new(4);
        explorer.setup(Key::Known(20), 0, &root, 0, &root)?;
        answer(&mut explorer, 20);

        let mut requests = Requests::new(Window::ALL);
        assert_eq!(explorer.status(&mut requests), Phase::WaitingForFetch);
        let ids: Vec<u32> = requests.fetches.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![2, 4]);
        drop(requests);

        let leaf = |id: u32| Node::leaf(4, vec![id], vec![id], NO_NEXT_LEAF, 0).encode();
        explorer.data(2, 0, &leaf(2));
        explorer.data(4, 0, &leaf(4));
        let mut requests = Requests::new(Window::ALL);
        assert_eq!(explorer.status(&mut requests), Phase::Done);
        let (first_id, _, last_id, _) = explorer.outcome().unwrap();
        assert_eq!((first_id, last_id), (2, 4));
        Ok(())
    }

    #[test]
    fn same_child_is_fetched_once() -> Result<()> {
        let root = Node::internal(4, vec![10, 20], vec![1, 2, 3], NO_PARENT);
        let mut explorer = Explorer::new(4);
        explorer.setup(Key::Known(15), 0, &root, 0, &root)?;
        answer(&mut explorer, 15);
        let mut requests = Requests::new(Window::ALL);
        explorer.status(&mut requests);
        assert_eq!(requests.fetches.total(), 1);
        assert_eq!(requests.fetches.items()[0].id, 2);
        Ok(())
    }

    #[test]
    fn rejects_leaves() {
        let leaf = Node::empty_leaf(4);
        let mut explorer: Explorer<u32> = Explorer::new(4);
        assert!(explorer.setup(Key::Known(1), 0, &leaf, 0, &leaf).is_err());
        let mut requests = Requests::new(Window::ALL);
        assert_eq!(explorer.status(&mut requests), Phase::Uninitialized);
    }
}

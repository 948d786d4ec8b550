//! Adds a level above the root.

use crate::storage::btree::node::{parent_slot, Node};
use crate::storage::btree::request::{Phase, Requests, StateMachine, StoreRequest};

#[derive(Debug, Clone)]
struct NewRoot {
    id: u32,
    node: Node,
    row: Vec<u32>,
    /// Parent word written into the previous root.
    pointer: [u32; 1],
    root_stored: bool,
    previous_stored: bool,
}

#[derive(Debug, Clone)]
struct Growing {
    order: usize,
    previous_root: u32,
    new_root: Option<NewRoot>,
}

/// Places a fresh internal root above the current one.
///
/// The new root has the previous root as its only child and no key. Only the
/// new root row and the previous root's parent word are written; the previous
/// root keeps its id, so nothing below it moves.
#[derive(Debug, Clone, Default)]
pub struct Growth {
    state: Option<Growing>,
}

impl Growth {
    /// A growth with nothing to do yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grows the tree of `order` whose root is `root_id`.
    pub fn setup(&mut self, root_id: u32, order: usize) {
        self.state = Some(Growing {
            order,
            previous_root: root_id,
            new_root: None,
        });
    }

    /// Id and contents of the new root, once both rows are stored.
    pub fn outcome(&self) -> Option<(u32, &Node)> {
        let root = self.state.as_ref()?.new_root.as_ref()?;
        (root.root_stored && root.previous_stored).then_some((root.id, &root.node))
    }
}

impl StateMachine for Growth {
    fn status<'a>(&'a self, requests: &mut Requests<'a>) -> Phase {
        let Some(state) = &self.state else {
            return Phase::Uninitialized;
        };
        let Some(root) = &state.new_root else {
            requests.allocations += 1;
            return requests.phase();
        };
        if !root.root_stored {
            requests.stores.push(StoreRequest {
                id: root.id,
                start: 0,
                words: &root.row,
            });
        }
        if !root.previous_stored {
            requests.stores.push(StoreRequest {
                id: state.previous_root,
                start: parent_slot(state.order),
                words: &root.pointer,
            });
        }
        match requests.phase() {
            Phase::Setup => Phase::Done,
            phase => phase,
        }
    }

    fn data(&mut self, _id: u32, _start: usize, _words: &[u32]) {}

    fn allocated(&mut self, id: u32) -> bool {
        let Some(state) = &mut self.state else {
            return false;
        };
        if state.new_root.is_some() {
            return false;
        }
        let node = Node::single_child_root(state.order, state.previous_root);
        tracing::debug!(
            target: "bplus_index::insert",
            previous_root = state.previous_root,
            new_root = id,
            "growing tree"
        );
        state.new_root = Some(NewRoot {
            id,
            row: node.encode(),
            node,
            pointer: [id],
            root_stored: false,
            previous_stored: false,
        });
        true
    }

    fn updated(&mut self, id: u32) {
        let Some(state) = &mut self.state else { return };
        let previous = state.previous_root;
        if let Some(root) = &mut state.new_root {
            if id == root.id {
                root.root_stored = true;
            }
            if id == previous {
                root.previous_stored = true;
            }
        }
    }
}

//! Adds one entry to a node, splitting it in two when it is full.

use crate::storage::btree::node::{Links, Node};
use crate::storage::btree::request::{Phase, Requests, StateMachine};

/// The upper half produced by a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    /// Id allocated for the new node.
    pub sibling_id: u32,
    /// The new node, right of the split one.
    pub sibling: Node,
    /// Key to insert into the parent, left of `sibling_id`.
    pub separator: u32,
}

#[derive(Debug, Clone)]
struct Division {
    node_id: u32,
    node: Node,
    /// Entry waiting for a fresh id to split around.
    pending: Option<(u32, u32)>,
    split: Option<Split>,
}

/// Appends `(key, value)` past the last entry of a node.
///
/// The entry must sort after every key of the node, which is what
/// [`Node::bubble`] leaves behind. A full node asks for one allocation, then
/// keeps the lower half while a new sibling takes the upper half.
#[derive(Debug, Clone, Default)]
pub struct Divider {
    state: Option<Division>,
}

impl Divider {
    /// A divider with nothing to do yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `(key, value)` to `node`. For an internal node `value` is the
    /// child right of `key`.
    pub fn setup(&mut self, node_id: u32, mut node: Node, key: u32, value: u32) {
        let pending = if node.is_full() {
            Some((key, value))
        } else {
            node.push(key, value);
            None
        };
        self.state = Some(Division {
            node_id,
            node,
            pending,
            split: None,
        });
    }

    /// The node, and the split if there was one, once done.
    pub fn outcome(&self) -> Option<(u32, &Node, Option<&Split>)> {
        let state = self.state.as_ref()?;
        if state.pending.is_some() {
            return None;
        }
        Some((state.node_id, &state.node, state.split.as_ref()))
    }

    /// Consumes the divider, returning the node and its split once done.
    pub fn into_outcome(self) -> Option<(u32, Node, Option<Split>)> {
        let state = self.state?;
        if state.pending.is_some() {
            return None;
        }
        Some((state.node_id, state.node, state.split))
    }
}

/// Splits a full `node` with one extra trailing entry around a new sibling.
fn split(node: &mut Node, sibling_id: u32, key: u32, value: u32) -> Split {
    let order = node.order();
    let parent = node.parent_word();
    let (keys, links) = node.parts_mut();
    keys.push(key);
    match links {
        Links::Leaf { values, next_leaf } => {
            values.push(value);
            let given = keys.len() / 2;
            let kept = keys.len() - given;
            let sibling_keys = keys.split_off(kept);
            let sibling_values = values.split_off(kept);
            let separator = keys[kept - 1];
            let sibling = Node::leaf(order, sibling_keys, sibling_values, *next_leaf, parent);
            *next_leaf = sibling_id;
            Split {
                sibling_id,
                sibling,
                separator,
            }
        }
        Links::Internal { children } => {
            children.push(value);
            let given = children.len() / 2;
            let kept = children.len() - given;
            let sibling_children = children.split_off(kept);
            let sibling_keys = keys.split_off(kept);
            let separator = keys.pop().unwrap_or(key);
            let sibling = Node::internal(order, sibling_keys, sibling_children, parent);
            Split {
                sibling_id,
                sibling,
                separator,
            }
        }
    }
}

impl StateMachine for Divider {
    fn status<'a>(&'a self, requests: &mut Requests<'a>) -> Phase {
        match &self.state {
            None => Phase::Uninitialized,
            Some(state) if state.pending.is_some() => {
                requests.allocations += 1;
                requests.phase()
            }
            Some(_) => Phase::Done,
        }
    }

    fn data(&mut self, _id: u32, _start: usize, _words: &[u32]) {}

    fn allocated(&mut self, id: u32) -> bool {
        let Some(state) = &mut self.state else {
            return false;
        };
        let Some((key, value)) = state.pending.take() else {
            return false;
        };
        let split = split(&mut state.node, id, key, value);
        tracing::debug!(
            target: "bplus_index::insert",
            node = state.node_id,
            sibling = id,
            separator = split.separator,
            leaf = state.node.is_leaf(),
            "split node"
        );
        state.split = Some(split);
        true
    }
}

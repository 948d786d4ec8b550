//! Points a node's children back at it after a structural change.

use crate::storage::btree::node::{parent_slot, row_len, Node};
use crate::storage::btree::request::{FetchRequest, Phase, Requests, StateMachine, StoreRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Check {
    Unread,
    Fixing,
    Verified,
}

#[derive(Debug, Clone)]
struct Reparenting {
    order: usize,
    /// Single-word buffer the store requests borrow from.
    parent: [u32; 1],
    children: Vec<(u32, Check)>,
    fixed: usize,
}

/// Verifies, and rewrites where needed, the parent slot of every child.
///
/// Only the parent word of a mismatching child is written.
#[derive(Debug, Clone, Default)]
pub struct Reparentor {
    state: Option<Reparenting>,
}

impl Reparentor {
    /// A reparentor with nothing to do yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks the children of `node`, which is stored as `node_id`.
    pub fn setup(&mut self, node_id: u32, node: &Node) {
        self.state = Some(Reparenting {
            order: node.order(),
            parent: [node_id],
            children: node.children().iter().map(|&id| (id, Check::Unread)).collect(),
            fixed: 0,
        });
    }

    /// Returns `true` once every child is verified or fixed.
    pub fn is_done(&self) -> bool {
        self.state.as_ref().map_or(false, |state| {
            state.children.iter().all(|(_, check)| *check == Check::Verified)
        })
    }

    /// Number of children whose parent slot had to be rewritten.
    pub fn fixed(&self) -> usize {
        self.state.as_ref().map_or(0, |state| state.fixed)
    }
}

impl StateMachine for Reparentor {
    fn status<'a>(&'a self, requests: &mut Requests<'a>) -> Phase {
        let Some(state) = &self.state else {
            return Phase::Uninitialized;
        };
        for &(id, check) in &state.children {
            match check {
                Check::Unread => requests.fetches.push(FetchRequest {
                    id,
                    start: 0,
                    length: row_len(state.order),
                }),
                Check::Fixing => requests.stores.push(StoreRequest {
                    id,
                    start: parent_slot(state.order),
                    words: &state.parent,
                }),
                Check::Verified => {}
            }
        }
        match requests.phase() {
            Phase::Setup => Phase::Done,
            phase => phase,
        }
    }

    fn data(&mut self, id: u32, start: usize, words: &[u32]) {
        let Some(state) = &mut self.state else { return };
        if start != 0 || words.len() != row_len(state.order) {
            return;
        }
        let parent = state.parent[0];
        let stored = words[parent_slot(state.order)];
        for (child, check) in state.children.iter_mut() {
            if *child == id && *check == Check::Unread {
                if stored == parent {
                    *check = Check::Verified;
                } else {
                    tracing::trace!(
                        target: "bplus_index::insert",
                        child = id,
                        from = stored,
                        to = parent,
                        "reparenting child"
                    );
                    *check = Check::Fixing;
                    state.fixed += 1;
                }
            }
        }
    }

    fn updated(&mut self, id: u32) {
        let Some(state) = &mut self.state else { return };
        for (child, check) in state.children.iter_mut() {
            if *child == id && *check == Check::Fixing {
                *check = Check::Verified;
            }
        }
    }
}

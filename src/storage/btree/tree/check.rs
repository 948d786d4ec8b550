use std::cmp::Ordering;

use super::Tree;
use crate::storage::backend::{KeyCompare, RowStore};
use crate::storage::btree::Key;
use crate::types::{Error, Result, NO_PARENT};

/// Summary of a tree that passed [`Tree::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct TreeShape {
    /// Number of levels, leaves included.
    pub height: usize,
    /// Number of leaves.
    pub leaves: usize,
    /// Number of internal nodes.
    pub internal_nodes: usize,
    /// Number of records.
    pub records: usize,
}

impl<S: RowStore> Tree<S> {
    /// Walks every node and verifies the structure.
    ///
    /// Checks that keys never decrease in key order (within nodes and along
    /// the leaf chain), that every child points back at its parent, that all
    /// leaves sit at the same depth and that the leaf chain visits the leaves
    /// left to right.
    pub fn check<H>(&mut self, cmp: &mut dyn KeyCompare<H>) -> Result<TreeShape> {
        let mut shape = TreeShape::default();
        let mut leaf_depth = None;
        let mut leaves = Vec::new();
        let mut last_key: Option<u32> = None;
        let mut stack = vec![(self.root, NO_PARENT, 1usize)];

        while let Some((id, parent, depth)) = stack.pop() {
            let node = self.fetch_node(id)?;
            if node.parent_word() != parent {
                tracing::warn!(target: "bplus_index::search", id, parent, found = node.parent_word(), "bad parent");
                return Err(Error::Corruption("child does not point at its parent"));
            }
            for pair in node.keys().windows(2) {
                if ordered(cmp, pair[0], pair[1])? == Ordering::Greater {
                    return Err(Error::Corruption("node keys out of order"));
                }
            }
            if node.is_leaf() {
                if *leaf_depth.get_or_insert(depth) != depth {
                    return Err(Error::Corruption("leaves at different depths"));
                }
                if let (Some(previous), Some(&first)) = (last_key, node.keys().first()) {
                    if ordered(cmp, previous, first)? == Ordering::Greater {
                        return Err(Error::Corruption("leaf chain out of order"));
                    }
                }
                if let Some(&last) = node.keys().last() {
                    last_key = Some(last);
                }
                shape.leaves += 1;
                shape.records += node.len();
                leaves.push((id, node.next_leaf()));
            } else {
                if node.children().len() != node.len() + 1 {
                    return Err(Error::Corruption("internal node child count"));
                }
                shape.internal_nodes += 1;
                stack.extend(node.children().iter().rev().map(|&child| (child, id, depth + 1)));
            }
        }

        for pair in leaves.windows(2) {
            if pair[0].1 != Some(pair[1].0) {
                return Err(Error::Corruption("leaf chain skips a leaf"));
            }
        }
        if leaves.last().and_then(|(_, next)| *next).is_some() {
            return Err(Error::Corruption("last leaf has a successor"));
        }
        shape.height = leaf_depth.unwrap_or(0);
        Ok(shape)
    }
}

fn ordered<H>(cmp: &mut dyn KeyCompare<H>, a: u32, b: u32) -> Result<Ordering> {
    cmp.compare(&Key::Known(a), &Key::Known(b))
}

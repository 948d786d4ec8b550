//! Node representation and its row codec.
//!
//! On storage a node of order `m` is a row of `2m + 1` words:
//!
//! ```text
//! [ key 0 .. key m-2 | value 0 .. value m-1 | parent | flags ]
//! ```
//!
//! Unused key slots hold [`NO_KEY`]. For a leaf the last value slot is the id
//! of the next leaf; for an internal node the value slots are child ids.
//! In memory the two shapes are kept apart by [`Links`], so the packing only
//! happens in [`Node::encode`] and [`Node::decode`].

use crate::storage::backend::RowStore;
use crate::types::{Error, Result, LEAF_FLAG, NO_KEY, NO_NEXT_LEAF, NO_PARENT};

/// Smallest order the tree operates at.
pub const MIN_ORDER: usize = 3;

/// Number of words in a row of the given order.
pub const fn row_len(order: usize) -> usize {
    2 * order + 1
}

/// Order implied by a row width, if the width is a valid node width.
pub fn order_for_row_len(len: usize) -> Option<usize> {
    if len % 2 == 1 && len >= row_len(MIN_ORDER) {
        Some((len - 1) / 2)
    } else {
        None
    }
}

/// Word offset of the parent slot.
pub const fn parent_slot(order: usize) -> usize {
    2 * order - 1
}

/// Leaf or internal payload of a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Links {
    /// One value per key, plus the successor leaf.
    Leaf {
        /// Values, parallel to the keys.
        values: Vec<u32>,
        /// Next leaf in key order, [`NO_NEXT_LEAF`] if last.
        next_leaf: u32,
    },
    /// One more child than keys.
    Internal {
        /// Child node ids.
        children: Vec<u32>,
    },
}

/// A decoded node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    order: usize,
    keys: Vec<u32>,
    links: Links,
    parent: u32,
}

impl Node {
    /// An empty leaf root; the starting point of every tree.
    pub fn empty_leaf(order: usize) -> Self {
        debug_assert!(order >= MIN_ORDER);
        Self {
            order,
            keys: Vec::with_capacity(order - 1),
            links: Links::Leaf {
                values: Vec::with_capacity(order - 1),
                next_leaf: NO_NEXT_LEAF,
            },
            parent: NO_PARENT,
        }
    }

    /// An internal root with a single child and no keys.
    pub fn single_child_root(order: usize, child: u32) -> Self {
        let mut children = Vec::with_capacity(order);
        children.push(child);
        Self {
            order,
            keys: Vec::with_capacity(order - 1),
            links: Links::Internal { children },
            parent: NO_PARENT,
        }
    }

    /// Builds a leaf from parts.
    pub fn leaf(order: usize, keys: Vec<u32>, values: Vec<u32>, next_leaf: u32, parent: u32) -> Self {
        debug_assert_eq!(keys.len(), values.len());
        debug_assert!(keys.len() < order);
        Self {
            order,
            keys,
            links: Links::Leaf { values, next_leaf },
            parent,
        }
    }

    /// Builds an internal node from parts.
    pub fn internal(order: usize, keys: Vec<u32>, children: Vec<u32>, parent: u32) -> Self {
        debug_assert_eq!(keys.len() + 1, children.len());
        debug_assert!(keys.len() < order);
        Self {
            order,
            keys,
            links: Links::Internal { children },
            parent,
        }
    }

    /// Maximum number of children of an internal node.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Returns `true` for leaves.
    pub fn is_leaf(&self) -> bool {
        matches!(self.links, Links::Leaf { .. })
    }

    /// Number of keys in use.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the node holds no key.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns `true` if one more key would overflow the node.
    pub fn is_full(&self) -> bool {
        self.keys.len() == self.order - 1
    }

    /// Keys in use, ascending.
    pub fn keys(&self) -> &[u32] {
        &self.keys
    }

    /// Key slot `i`; unused slots read as [`NO_KEY`].
    pub fn key(&self, i: usize) -> u32 {
        debug_assert!(i < self.order - 1, "key slot {i} out of range");
        self.keys.get(i).copied().unwrap_or(NO_KEY)
    }

    /// Value slot `i` as laid out in the row.
    ///
    /// For a leaf the last slot aliases the next-leaf id.
    pub fn value(&self, i: usize) -> u32 {
        debug_assert!(i < self.order, "value slot {i} out of range");
        match &self.links {
            Links::Leaf { next_leaf, .. } if i == self.order - 1 => *next_leaf,
            Links::Leaf { values, .. } => values.get(i).copied().unwrap_or(0),
            Links::Internal { children } => children.get(i).copied().unwrap_or(0),
        }
    }

    /// Leaf values, or internal children.
    pub fn values(&self) -> &[u32] {
        match &self.links {
            Links::Leaf { values, .. } => values,
            Links::Internal { children } => children,
        }
    }

    /// Child ids; empty for a leaf.
    pub fn children(&self) -> &[u32] {
        match &self.links {
            Links::Leaf { .. } => &[],
            Links::Internal { children } => children,
        }
    }

    /// The payload.
    pub fn links(&self) -> &Links {
        &self.links
    }

    /// Successor leaf; `None` for internal nodes and for the last leaf.
    pub fn next_leaf(&self) -> Option<u32> {
        match self.links {
            Links::Leaf { next_leaf, .. } if next_leaf != NO_NEXT_LEAF => Some(next_leaf),
            _ => None,
        }
    }

    /// Sets the successor leaf. Ignored on internal nodes.
    pub fn set_next_leaf(&mut self, id: u32) {
        debug_assert!(self.is_leaf(), "next_leaf on an internal node");
        if let Links::Leaf { next_leaf, .. } = &mut self.links {
            *next_leaf = id;
        }
    }

    /// Parent id, `None` for the root.
    pub fn parent(&self) -> Option<u32> {
        (self.parent != NO_PARENT).then_some(self.parent)
    }

    /// Raw parent word.
    pub fn parent_word(&self) -> u32 {
        self.parent
    }

    /// Sets the parent id; [`NO_PARENT`] makes the node a root.
    pub fn set_parent(&mut self, parent: u32) {
        self.parent = parent;
    }

    /// Returns `true` if the parent slot holds the root sentinel.
    pub fn is_root(&self) -> bool {
        self.parent == NO_PARENT
    }

    /// Position of `child` among this node's children.
    pub fn child_position(&self, child: u32) -> Option<usize> {
        self.children().iter().position(|&id| id == child)
    }

    /// Inserts `(key, value)` at key position `position` and pushes the last
    /// entry out, returning it. For an internal node `value` is the child
    /// placed right of `key`.
    ///
    /// Inserting past the last entry displaces the new entry itself.
    pub fn bubble(&mut self, position: usize, key: u32, value: u32) -> (u32, u32) {
        debug_assert!(position <= self.keys.len());
        if position >= self.keys.len() {
            return (key, value);
        }
        self.keys.insert(position, key);
        let out_key = self.keys.pop().unwrap_or(key);
        let out_value = match &mut self.links {
            Links::Leaf { values, .. } => {
                values.insert(position, value);
                values.pop().unwrap_or(value)
            }
            Links::Internal { children } => {
                children.insert(position + 1, value);
                children.pop().unwrap_or(value)
            }
        };
        (out_key, out_value)
    }

    /// Appends an entry to a node that has room for it.
    pub fn push(&mut self, key: u32, value: u32) {
        debug_assert!(!self.is_full());
        self.keys.push(key);
        match &mut self.links {
            Links::Leaf { values, .. } => values.push(value),
            Links::Internal { children } => children.push(value),
        }
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut Vec<u32>, &mut Links) {
        (&mut self.keys, &mut self.links)
    }

    /// Packs the node into a row.
    pub fn encode(&self) -> Vec<u32> {
        let mut row = vec![0; row_len(self.order)];
        self.encode_into(&mut row);
        row
    }

    /// Packs the node into `row`, which must be exactly one row wide.
    pub fn encode_into(&self, row: &mut [u32]) {
        let order = self.order;
        debug_assert_eq!(row.len(), row_len(order));
        let (keys, rest) = row.split_at_mut(order - 1);
        let (values, tail) = rest.split_at_mut(order);
        keys.fill(NO_KEY);
        keys[..self.keys.len()].copy_from_slice(&self.keys);
        values.fill(0);
        let flags = match &self.links {
            Links::Leaf { values: vals, next_leaf } => {
                values[..vals.len()].copy_from_slice(vals);
                values[order - 1] = *next_leaf;
                LEAF_FLAG
            }
            Links::Internal { children } => {
                values[..children.len()].copy_from_slice(children);
                0
            }
        };
        tail[0] = self.parent;
        tail[1] = flags;
    }

    /// Unpacks a row of the given order.
    pub fn decode(order: usize, row: &[u32]) -> Result<Self> {
        if order < MIN_ORDER {
            return Err(Error::Corruption("node order below minimum"));
        }
        if row.len() != row_len(order) {
            return Err(Error::Corruption("row width does not match node order"));
        }
        let key_slots = &row[..order - 1];
        let value_slots = &row[order - 1..2 * order - 1];
        let n = key_slots
            .iter()
            .position(|&k| k == NO_KEY)
            .unwrap_or(order - 1);
        let keys = key_slots[..n].to_vec();
        let parent = row[parent_slot(order)];
        let links = if row[2 * order] & LEAF_FLAG != 0 {
            Links::Leaf {
                values: value_slots[..n].to_vec(),
                next_leaf: value_slots[order - 1],
            }
        } else {
            Links::Internal {
                children: value_slots[..=n].to_vec(),
            }
        };
        Ok(Self {
            order,
            keys,
            links,
            parent,
        })
    }
}

/// Reads node `id`, assuming `order` but trusting the width storage reports.
///
/// If the stored row is wider or narrower than assumed, the row is read again
/// at its real width and decoded at the order that width implies.
pub fn fetch<S: RowStore + ?Sized>(store: &mut S, id: u32, order: usize) -> Result<Node> {
    let mut row = vec![0; row_len(order)];
    let len = store.fetch(id, 0, &mut row)?;
    if len == row.len() {
        return Node::decode(order, &row);
    }
    let actual = order_for_row_len(len).ok_or(Error::Corruption("invalid node row width"))?;
    tracing::debug!(
        target: "bplus_index::search",
        id,
        assumed = order,
        actual,
        "resizing node to its stored order"
    );
    row.resize(len, 0);
    if store.fetch(id, 0, &mut row)? != len {
        return Err(Error::Corruption("row width changed between reads"));
    }
    Node::decode(actual, &row)
}

/// Writes node `id` as a full row.
pub fn store<S: RowStore + ?Sized>(store: &mut S, id: u32, node: &Node) {
    store.store(id, 0, &node.encode());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::backend::MemStore;

    #[test]
    fn empty_leaf_row_layout() {
        let row = Node::empty_leaf(3).encode();
        assert_eq!(row, vec![NO_KEY, NO_KEY, 0, 0, 0, NO_PARENT, LEAF_FLAG]);
    }

    #[test]
    fn leaf_next_aliases_last_value_slot() -> Result<()> {
        let mut leaf = Node::leaf(4, vec![1, 2], vec![10, 20], NO_NEXT_LEAF, 9);
        leaf.set_next_leaf(42);
        assert_eq!(leaf.value(3), 42);
        assert_eq!(leaf.value(2), 0);
        assert_eq!(leaf.key(2), NO_KEY);
        let row = leaf.encode();
        assert_eq!(row[2 * 4 - 2], 42);
        let decoded = Node::decode(4, &row)?;
        assert_eq!(decoded, leaf);
        assert_eq!(decoded.next_leaf(), Some(42));
        assert_eq!(decoded.parent(), Some(9));
        Ok(())
    }

    #[test]
    fn internal_round_trip_keeps_extra_child() -> Result<()> {
        let node = Node::internal(5, vec![4, 8], vec![1, 2, 3], NO_PARENT);
        let decoded = Node::decode(5, &node.encode())?;
        assert_eq!(decoded, node);
        assert!(decoded.is_root());
        assert_eq!(decoded.next_leaf(), None);

        let root = Node::single_child_root(5, 7);
        assert_eq!(Node::decode(5, &root.encode())?.children(), &[7]);
        Ok(())
    }

    #[test]
    fn full_node_has_no_sentinel() -> Result<()> {
        let node = Node::leaf(3, vec![3, 4], vec![3, 4], NO_NEXT_LEAF, NO_PARENT);
        assert!(node.is_full());
        assert_eq!(Node::decode(3, &node.encode())?.keys(), &[3, 4]);
        Ok(())
    }

    #[test]
    fn decode_rejects_wrong_width() {
        assert!(Node::decode(3, &[0; 9]).is_err());
        assert!(Node::decode(2, &[0; 5]).is_err());
    }

    #[test]
    fn bubble_shifts_and_displaces_last_entry() {
        let mut leaf = Node::leaf(4, vec![2, 4, 6], vec![20, 40, 60], NO_NEXT_LEAF, NO_PARENT);
        assert_eq!(leaf.bubble(1, 3, 30), (6, 60));
        assert_eq!(leaf.keys(), &[2, 3, 4]);
        assert_eq!(leaf.values(), &[20, 30, 40]);
        assert_eq!(leaf.bubble(3, 9, 90), (9, 90));

        let mut inner = Node::internal(4, vec![10, 20], vec![1, 2, 3], NO_PARENT);
        assert_eq!(inner.bubble(0, 5, 9), (20, 3));
        assert_eq!(inner.keys(), &[5, 10]);
        assert_eq!(inner.children(), &[1, 9, 2]);
    }

    #[test]
    fn fetch_discovers_stored_order() -> Result<()> {
        let mut mem = MemStore::new();
        let id = mem.allocate();
        let wide = Node::leaf(6, vec![1, 2, 3], vec![1, 2, 3], NO_NEXT_LEAF, NO_PARENT);
        store(&mut mem, id, &wide);

        let node = fetch(&mut mem, id, 3)?;
        assert_eq!(node.order(), 6);
        assert_eq!(node, wide);
        Ok(())
    }

    #[test]
    fn fetch_rejects_unusable_width() {
        let mut mem = MemStore::new();
        let id = mem.allocate();
        mem.store(id, 0, &[0; 4]);
        assert!(matches!(fetch(&mut mem, id, 3), Err(Error::Corruption(_))));
    }
}

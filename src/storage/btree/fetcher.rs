use crate::storage::btree::node::{row_len, Node};
use crate::storage::btree::request::{Batch, FetchRequest};

/// Waits for one full row and decodes it.
#[derive(Debug, Clone)]
pub(crate) struct Fetcher {
    id: u32,
    order: usize,
    node: Option<Node>,
}

impl Fetcher {
    pub fn new(id: u32, order: usize) -> Self {
        Self {
            id,
            order,
            node: None,
        }
    }

    /// A fetcher whose row is already known.
    pub fn loaded(id: u32, node: Node) -> Self {
        Self {
            id,
            order: node.order(),
            node: Some(node),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn node(&self) -> Option<&Node> {
        self.node.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.node.is_some()
    }

    pub fn request(&self, fetches: &mut Batch<FetchRequest>) {
        if self.node.is_none() {
            fetches.push(FetchRequest {
                id: self.id,
                start: 0,
                length: row_len(self.order),
            });
        }
    }

    /// Accepts the row if it is the one awaited. Returns `true` if it was.
    pub fn data(&mut self, id: u32, start: usize, words: &[u32]) -> bool {
        if self.node.is_some() || id != self.id || start != 0 {
            return false;
        }
        match Node::decode(self.order, words) {
            Ok(node) => {
                self.node = Some(node);
                true
            }
            Err(err) => {
                tracing::debug!(
                    target: "bplus_index::search",
                    id,
                    error = %err,
                    "ignoring undecodable row"
                );
                false
            }
        }
    }
}

/// Loads the parent of a node and locates the node among its children.
#[derive(Debug, Clone)]
pub(crate) struct ParentFetcher {
    child: u32,
    fetcher: Fetcher,
}

impl ParentFetcher {
    pub fn new(child: u32, parent: u32, order: usize) -> Self {
        Self {
            child,
            fetcher: Fetcher::new(parent, order),
        }
    }

    pub fn loaded(child: u32, parent: u32, node: Node) -> Self {
        Self {
            child,
            fetcher: Fetcher::loaded(parent, node),
        }
    }

    pub fn parent_id(&self) -> u32 {
        self.fetcher.id()
    }

    pub fn node(&self) -> Option<&Node> {
        self.fetcher.node()
    }

    /// Index of the child among the parent's children, once loaded.
    pub fn position(&self) -> Option<usize> {
        let position = self.fetcher.node()?.child_position(self.child);
        debug_assert!(position.is_some(), "node {} missing from its parent", self.child);
        position
    }

    pub fn request(&self, fetches: &mut Batch<FetchRequest>) {
        self.fetcher.request(fetches);
    }

    pub fn data(&mut self, id: u32, start: usize, words: &[u32]) -> bool {
        self.fetcher.data(id, start, words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::btree::request::Window;
    use crate::types::NO_PARENT;

    #[test]
    fn fetcher_requests_until_its_row_arrives() {
        let mut fetcher = Fetcher::new(4, 3);
        let mut fetches = Batch::new(Window::ALL);
        fetcher.request(&mut fetches);
        assert_eq!(
            fetches.items(),
            &[FetchRequest {
                id: 4,
                start: 0,
                length: 7
            }]
        );

        let row = Node::empty_leaf(3).encode();
        assert!(!fetcher.data(5, 0, &row));
        assert!(fetcher.data(4, 0, &row));
        assert!(!fetcher.data(4, 0, &row));

        let mut again = Batch::new(Window::ALL);
        fetcher.request(&mut again);
        assert!(again.is_empty());
    }

    #[test]
    fn parent_fetcher_locates_child() {
        let parent = Node::internal(4, vec![10, 20], vec![3, 8, 5], NO_PARENT);
        let mut fetcher = ParentFetcher::new(8, 1, 4);
        assert_eq!(fetcher.position(), None);
        assert!(fetcher.data(1, 0, &parent.encode()));
        assert_eq!(fetcher.position(), Some(1));
        assert_eq!(fetcher.parent_id(), 1);
    }
}

//! Forward cursor over the leaf chain between two leaf positions.

use crate::storage::btree::fetcher::Fetcher;
use crate::storage::btree::finder::LeafSpan;
use crate::storage::btree::node::Node;
use crate::storage::btree::request::{Batch, FetchRequest};
use crate::types::{Error, Result};

/// A key/value pair read from a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Record {
    /// Key id.
    pub key: u32,
    /// Associated value.
    pub value: u32,
}

#[derive(Debug, Clone)]
struct Cursor {
    head_id: u32,
    head: Node,
    head_start: usize,
    tail_id: u32,
    tail: Node,
    tail_stop: usize,
    /// Successor of the head, when it is neither absent nor the tail.
    next: Option<Fetcher>,
}

impl Cursor {
    fn successor(head: &Node, tail_id: u32) -> Option<Fetcher> {
        head.next_leaf()
            .filter(|&next| next != tail_id)
            .map(|next| Fetcher::new(next, head.order()))
    }

    fn has_next(&self) -> bool {
        self.head_id != self.tail_id && self.head.next_leaf().is_some()
    }

    fn stop(&self) -> usize {
        if self.head_id == self.tail_id {
            self.tail_stop
        } else {
            self.head.len()
        }
    }
}

/// Cursor yielding the records between a [`LeafSpan`]'s two ends.
///
/// Each call to [`get`](Range::get) reads the current leaf only; moving on
/// is explicit through [`next`](Range::next), after the next leaf has been
/// supplied with [`data`](Range::data).
#[derive(Debug, Clone, Default)]
pub struct Range {
    cursor: Option<Cursor>,
}

impl Range {
    /// A range positioned nowhere.
    pub fn new() -> Self {
        Self::default()
    }

    /// Positions the range from `head_start` in leaf `head_id` up to, but
    /// excluding, `tail_stop` in leaf `tail_id`.
    pub fn setup(
        &mut self,
        head_id: u32,
        head: Node,
        head_start: usize,
        tail_id: u32,
        tail: Node,
        tail_stop: usize,
    ) -> Result<()> {
        if !head.is_leaf() || !tail.is_leaf() {
            return Err(Error::Invalid("range ends must be leaves"));
        }
        if head_start > head.len() || tail_stop > tail.len() {
            return Err(Error::Invalid("range end past the last key"));
        }
        let next = if head_id == tail_id {
            None
        } else {
            Cursor::successor(&head, tail_id)
        };
        self.cursor = Some(Cursor {
            head_id,
            head,
            head_start,
            tail_id,
            tail,
            tail_stop,
            next,
        });
        Ok(())
    }

    /// Builds a range over a finder's result.
    pub fn from_span(span: LeafSpan) -> Result<Self> {
        let mut range = Self::new();
        range.setup(
            span.first_id,
            span.first,
            span.first_index,
            span.last_id,
            span.last,
            span.last_index,
        )?;
        Ok(range)
    }

    /// Returns `true` once positioned.
    pub fn is_set_up(&self) -> bool {
        self.cursor.is_some()
    }

    /// Returns `true` if the range holds no record at all.
    pub fn is_empty(&self) -> bool {
        self.cursor
            .as_ref()
            .map_or(true, |c| c.head_id == c.tail_id && c.head_start >= c.tail_stop)
    }

    /// Lists the current leaf's records into `records` and the row needed to
    /// move on into `fetches`. Returns whether another leaf follows.
    pub fn get(&self, records: &mut Batch<Record>, fetches: &mut Batch<FetchRequest>) -> bool {
        let Some(cursor) = &self.cursor else {
            return false;
        };
        let keys = cursor.head.keys();
        let values = cursor.head.values();
        for i in cursor.head_start..cursor.stop() {
            records.push(Record {
                key: keys[i],
                value: values[i],
            });
        }
        let has_next = cursor.has_next();
        if has_next {
            if let Some(next) = &cursor.next {
                next.request(fetches);
            }
        }
        has_next
    }

    /// Supplies the row of the next leaf.
    pub fn data(&mut self, id: u32, start: usize, words: &[u32]) {
        if let Some(next) = self.cursor.as_mut().and_then(|c| c.next.as_mut()) {
            next.data(id, start, words);
        }
    }

    /// Moves to the next leaf. Fails, leaving the range in place, if there is
    /// none or its row has not been supplied.
    pub fn next(&mut self) -> Result<()> {
        let cursor = self
            .cursor
            .as_mut()
            .ok_or(Error::Invalid("range is not set up"))?;
        if !cursor.has_next() {
            return Err(Error::Invalid("range has no next leaf"));
        }
        let (id, node) = match &cursor.next {
            None => (cursor.tail_id, cursor.tail.clone()),
            Some(fetcher) => match fetcher.node() {
                Some(node) => (fetcher.id(), node.clone()),
                None => return Err(Error::Invalid("next leaf was not supplied")),
            },
        };
        cursor.next = Cursor::successor(&node, cursor.tail_id);
        cursor.head_id = id;
        cursor.head = node;
        cursor.head_start = 0;
        Ok(())
    }

    /// One end of the range: the head position, or with `back` the tail.
    pub fn extremity(&self, back: bool) -> Option<(u32, &Node, usize)> {
        let cursor = self.cursor.as_ref()?;
        Some(if back {
            (cursor.tail_id, &cursor.tail, cursor.tail_stop)
        } else {
            (cursor.head_id, &cursor.head, cursor.head_start)
        })
    }
}

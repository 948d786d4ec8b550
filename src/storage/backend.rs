//! Callback contracts between the index engine and its storage.
//!
//! The engine never performs I/O itself. Drivers service its requests through
//! a [`RowStore`] (rows of `u32` words addressed by node id) and a
//! [`KeyCompare`] (the total order over keys).

use std::cmp::Ordering;

use crate::storage::btree::Key;
use crate::types::{Error, Result};

/// Row-addressed storage for tree nodes.
///
/// Id `0` doubles as the "no next leaf" marker, so it may only ever be handed
/// out for the first root of a tree.
pub trait RowStore {
    /// Copies words `start..start + out.len()` of row `id` into `out`, clamped
    /// to the row, and returns the row's true length in words.
    fn fetch(&mut self, id: u32, start: usize, out: &mut [u32]) -> Result<usize>;

    /// Returns a fresh row id.
    fn allocate(&mut self) -> u32;

    /// Writes `words` into row `id` starting at word `start`.
    fn store(&mut self, id: u32, start: usize, words: &[u32]);
}

impl<T: RowStore + ?Sized> RowStore for &mut T {
    fn fetch(&mut self, id: u32, start: usize, out: &mut [u32]) -> Result<usize> {
        (**self).fetch(id, start, out)
    }

    fn allocate(&mut self) -> u32 {
        (**self).allocate()
    }

    fn store(&mut self, id: u32, start: usize, words: &[u32]) {
        (**self).store(id, start, words)
    }
}

impl<T: RowStore + ?Sized> RowStore for Box<T> {
    fn fetch(&mut self, id: u32, start: usize, out: &mut [u32]) -> Result<usize> {
        (**self).fetch(id, start, out)
    }

    fn allocate(&mut self) -> u32 {
        (**self).allocate()
    }

    fn store(&mut self, id: u32, start: usize, words: &[u32]) {
        (**self).store(id, start, words)
    }
}

/// Total order over keys, consistent for the lifetime of a tree.
pub trait KeyCompare<H> {
    /// Compares two keys; any combination of known and unknown must be handled.
    fn compare(&mut self, a: &Key<H>, b: &Key<H>) -> Result<Ordering>;
}

impl<H, F> KeyCompare<H> for F
where
    F: FnMut(&Key<H>, &Key<H>) -> Result<Ordering>,
{
    fn compare(&mut self, a: &Key<H>, b: &Key<H>) -> Result<Ordering> {
        self(a, b)
    }
}

/// Orders keys by their numeric value, treating a handle as a bare id.
#[derive(Debug, Default, Clone, Copy)]
pub struct NaturalOrder;

impl KeyCompare<u32> for NaturalOrder {
    fn compare(&mut self, a: &Key<u32>, b: &Key<u32>) -> Result<Ordering> {
        let value = |key: &Key<u32>| match key {
            Key::Known(id) => *id,
            Key::Unknown(handle) => *handle,
        };
        Ok(value(a).cmp(&value(b)))
    }
}

/// Comparator for trees that never compare, such as a driver that only inserts
/// at positions it already knows.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCompare;

impl<H> KeyCompare<H> for NoCompare {
    fn compare(&mut self, _a: &Key<H>, _b: &Key<H>) -> Result<Ordering> {
        Err(Error::Invalid("comparison requested without a comparator"))
    }
}

/// In-memory [`RowStore`]; ids are handed out sequentially from `0`.
#[derive(Debug, Default, Clone)]
pub struct MemStore {
    rows: Vec<Vec<u32>>,
    failing: Option<u32>,
    fetches: u64,
    stores: u64,
}

impl MemStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ids handed out so far.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if no id was allocated yet.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the raw row for `id`, if it was ever written.
    pub fn row(&self, id: u32) -> Option<&[u32]> {
        self.rows
            .get(id as usize)
            .filter(|row| !row.is_empty())
            .map(Vec::as_slice)
    }

    /// Makes every later fetch of `id` fail, simulating a backend error.
    pub fn fail_fetches_of(&mut self, id: u32) {
        self.failing = Some(id);
    }

    /// Number of fetch calls served.
    pub fn fetch_count(&self) -> u64 {
        self.fetches
    }

    /// Number of store calls applied.
    pub fn store_count(&self) -> u64 {
        self.stores
    }
}

impl RowStore for MemStore {
    fn fetch(&mut self, id: u32, start: usize, out: &mut [u32]) -> Result<usize> {
        if self.failing == Some(id) {
            return Err(Error::Backend(format!("fetch of row {id} failed")));
        }
        let row = self.row(id).ok_or(Error::NodeNotFound(id))?;
        let len = row.len();
        let begin = start.min(len);
        let end = start.saturating_add(out.len()).min(len);
        out[..end - begin].copy_from_slice(&row[begin..end]);
        self.fetches += 1;
        Ok(len)
    }

    fn allocate(&mut self) -> u32 {
        self.rows.push(Vec::new());
        (self.rows.len() - 1) as u32
    }

    fn store(&mut self, id: u32, start: usize, words: &[u32]) {
        let index = id as usize;
        if self.rows.len() <= index {
            self.rows.resize_with(index + 1, Vec::new);
        }
        let row = &mut self.rows[index];
        if row.len() < start + words.len() {
            row.resize(start + words.len(), 0);
        }
        row[start..start + words.len()].copy_from_slice(words);
        self.stores += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_store_clamps_partial_fetches() -> Result<()> {
        let mut store = MemStore::new();
        let id = store.allocate();
        store.store(id, 0, &[1, 2, 3, 4, 5]);
        store.store(id, 3, &[9]);

        let mut out = [0u32; 4];
        let len = store.fetch(id, 2, &mut out)?;
        assert_eq!(len, 5);
        assert_eq!(out, [3, 9, 5, 0]);
        Ok(())
    }

    #[test]
    fn mem_store_reports_missing_and_failing_rows() {
        let mut store = MemStore::new();
        let id = store.allocate();
        let mut out = [0u32; 1];
        assert!(matches!(
            store.fetch(id, 0, &mut out),
            Err(Error::NodeNotFound(0))
        ));
        store.store(id, 0, &[1]);
        store.fail_fetches_of(id);
        assert!(matches!(store.fetch(id, 0, &mut out), Err(Error::Backend(_))));
    }

    #[test]
    fn natural_order_mixes_known_and_unknown() -> Result<()> {
        let mut cmp = NaturalOrder;
        assert_eq!(cmp.compare(&Key::Known(3), &Key::Unknown(4))?, Ordering::Less);
        assert_eq!(cmp.compare(&Key::Unknown(4), &Key::Known(4))?, Ordering::Equal);
        let mut reversed = |a: &Key<u32>, b: &Key<u32>| NaturalOrder.compare(b, a);
        assert_eq!(reversed.compare(&Key::Known(3), &Key::Known(4))?, Ordering::Greater);
        Ok(())
    }
}

//! Search keys.
//!
//! Keys stored in the tree are plain `u32` ids. A search may also use a key
//! the tree has never seen, identified by a caller-owned handle that only the
//! comparator knows how to order.

use std::fmt;

/// A key passed to [`KeyCompare`](crate::storage::backend::KeyCompare).
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Key<H> {
    /// An id already stored in the tree.
    Known(u32),
    /// Unresolved caller data, for example a literal awaiting lookup.
    Unknown(H),
}

impl<H> Key<H> {
    /// Returns the id if the key is known.
    pub fn known(&self) -> Option<u32> {
        match self {
            Key::Known(id) => Some(*id),
            Key::Unknown(_) => None,
        }
    }

    /// Returns the handle if the key is unknown.
    pub fn handle(&self) -> Option<&H> {
        match self {
            Key::Known(_) => None,
            Key::Unknown(handle) => Some(handle),
        }
    }
}

impl<H: fmt::Debug> fmt::Debug for Key<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Known(id) => write!(f, "#{id}"),
            Key::Unknown(handle) => write!(f, "?{handle:?}"),
        }
    }
}

impl<H> From<u32> for Key<H> {
    fn from(id: u32) -> Self {
        Key::Known(id)
    }
}

#[cfg(test)]
mod tests {
    use super::Key;

    #[test]
    fn accessors_split_variants() {
        let known: Key<&str> = Key::Known(7);
        let unknown: Key<&str> = Key::Unknown("alpha");
        assert_eq!(known.known(), Some(7));
        assert_eq!(known.handle(), None);
        assert_eq!(unknown.known(), None);
        assert_eq!(unknown.handle(), Some(&"alpha"));
        assert_eq!(format!("{known:?} {unknown:?}"), "#7 ?\"alpha\"");
    }
}

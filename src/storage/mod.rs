//! Index storage: the row contracts, the tree engine and a thread-safe handle.

/// Callbacks the engine needs from its host.
pub mod backend;

/// B+ tree engine and its blocking driver.
///
/// Resumable components plus the [`Tree`](btree::Tree) that drives them.
pub mod btree;

/// Tree shared between threads.
pub mod shared;

pub use backend::{KeyCompare, MemStore, NaturalOrder, NoCompare, RowStore};
pub use btree::{Decision, Key, Range, Record, Tree, TreeOptions, TreeShape};
pub use shared::SharedTree;

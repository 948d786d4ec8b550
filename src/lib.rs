//! Resumable B+ tree index over `u32` rows.
//!
//! The engine never performs I/O. Nodes live in rows of `2 * order + 1` words
//! owned by the host, which services fetch, compare, allocate and store
//! requests on the engine's behalf. Keys are opaque ids ordered by a host
//! comparator, so the same tree serves as a dictionary (keys are interned
//! strings) or as a statement index (duplicate keys kept in insertion order).
//!
//! [`storage::btree`] holds the resumable components, [`Tree`] drives them to
//! completion against a [`RowStore`], and [`SharedTree`] shares one tree
//! between threads.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod storage;
pub mod types;

pub use storage::backend::{KeyCompare, MemStore, NaturalOrder, NoCompare, RowStore};
pub use storage::btree::{Decision, Key, Range, Record, Tree, TreeOptions, TreeShape};
pub use storage::shared::SharedTree;
pub use types::{Error, Result};

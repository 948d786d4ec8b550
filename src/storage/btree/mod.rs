#![forbid(unsafe_code)]

//! Resumable B+ tree over `u32` rows.
//!
//! Every component here is a state machine speaking the protocol in
//! [`request`]: it lists the rows it must read or write, the keys it must
//! compare and the ids it must allocate, and advances as the caller feeds the
//! answers back. [`Tree`] is the blocking driver that services those requests
//! against a [`RowStore`](crate::storage::backend::RowStore).

/// Row-level cache in front of a store.
pub mod cache;
/// Binary search of a pivot key within a node.
pub mod dichotomy;
/// Insertion into a single node, splitting it when full.
pub mod divider;
/// One level of search, for both bounds at once.
pub mod explorer;
pub(crate) mod fetcher;
/// Root to leaf search for the span of an equal range.
pub mod finder;
/// Adds a level above the root.
pub mod growth;
/// Full insertion, splits propagated up to the root.
pub mod insertion;
mod key;
/// Row layout and node codec.
pub mod node;
/// Cursor over a span of leaves.
pub mod range;
/// Parent slot repair after a split.
pub mod reparentor;
/// The request/feedback protocol.
pub mod request;
mod stats;
mod tree;

pub use divider::{Divider, Split};
pub use explorer::Explorer;
pub use finder::{Finder, LeafSpan};
pub use growth::Growth;
pub use insertion::{Insertion, InsertionReport};
pub use key::Key;
pub use node::Node;
pub use range::{Range, Record};
pub use reparentor::Reparentor;
pub use request::{
    Batch, CompareRequest, FetchRequest, Phase, Requests, StateMachine, StoreRequest, Window,
};
pub use stats::{TreeStats, TreeStatsSnapshot};
pub use tree::{prime_row, Decision, Tree, TreeOptions, TreeShape};

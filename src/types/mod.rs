//! Shared error type and row-word constants.

/// Word stored in unused key slots.
pub const NO_KEY: u32 = 0xFFFF_FFFF;

/// Parent slot value marking the root.
pub const NO_PARENT: u32 = 0xFFFF_FFFF;

/// Next-leaf value marking the last leaf of the chain.
pub const NO_NEXT_LEAF: u32 = 0;

/// High bit of the flags word; set for leaves.
pub const LEAF_FLAG: u32 = 1 << 31;

/// Errors surfaced by the index engine and its drivers.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An I/O failure reported by a backend.
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    /// A row violates the node layout.
    #[error("corruption: {0}")]
    Corruption(&'static str),
    /// A call was made with arguments the component cannot accept.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
    /// The backend has no row for this id.
    #[error("node {0} not found")]
    NodeNotFound(u32),
    /// A row was returned with a width that does not match the tree order.
    #[error("node {id} has order {actual}, expected {expected}")]
    OrderMismatch {
        /// Node id.
        id: u32,
        /// Order the tree is operating at.
        expected: usize,
        /// Order implied by the row width storage reported.
        actual: usize,
    },
    /// A failure signalled by a fetch or compare callback.
    #[error("backend: {0}")]
    Backend(String),
    /// Options could not be parsed or are out of range.
    #[error("config: {0}")]
    Config(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

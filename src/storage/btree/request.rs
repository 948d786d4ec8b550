//! The request/feedback protocol shared by every resumable component.
//!
//! A component never touches storage. Each call to
//! [`StateMachine::status`] lists what it is waiting for; the caller performs
//! those operations in any order and reports each one back through the
//! matching feedback call. Request lists are paginated: a [`Batch`] only keeps
//! the requests whose ordinal falls inside its [`Window`], but always counts
//! all of them.

use std::cmp::Ordering;

use smallvec::SmallVec;

use crate::storage::btree::Key;

/// Slice of a request list the caller wants to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Ordinal of the first request kept.
    pub start: usize,
    /// Maximum number of requests kept.
    pub max: usize,
}

impl Window {
    /// Keeps every request.
    pub const ALL: Window = Window {
        start: 0,
        max: usize::MAX,
    };

    /// Keeps requests `start..start + max`.
    pub const fn new(start: usize, max: usize) -> Self {
        Self { start, max }
    }

    fn admits(&self, ordinal: usize) -> bool {
        ordinal >= self.start && ordinal - self.start < self.max
    }
}

impl Default for Window {
    fn default() -> Self {
        Self::ALL
    }
}

/// One page of requests of a single kind.
#[derive(Debug, Clone)]
pub struct Batch<T> {
    window: Window,
    items: SmallVec<[T; 4]>,
    total: usize,
}

impl<T> Batch<T> {
    /// An empty batch keeping the requests inside `window`.
    pub fn new(window: Window) -> Self {
        Self {
            window,
            items: SmallVec::new(),
            total: 0,
        }
    }

    /// Counts a request, keeping it if it falls inside the window.
    pub fn push(&mut self, item: T) {
        if self.window.admits(self.total) {
            self.items.push(item);
        }
        self.total += 1;
    }

    /// Requests inside the window.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Iterates the requests inside the window.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Number of requests, including those outside the window.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Returns `true` if no request was pushed.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// The window this batch was created with.
    pub fn window(&self) -> Window {
        self.window
    }
}

impl<'b, T> IntoIterator for &'b Batch<T> {
    type Item = &'b T;
    type IntoIter = std::slice::Iter<'b, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Read words `start..start + length` of node `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    /// Node id.
    pub id: u32,
    /// First word.
    pub start: usize,
    /// Number of words.
    pub length: usize,
}

/// Compare `a` against `b`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareRequest<H> {
    /// Left operand.
    pub a: Key<H>,
    /// Right operand.
    pub b: Key<H>,
}

/// Write `words` into node `id` starting at word `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreRequest<'a> {
    /// Node id.
    pub id: u32,
    /// First word written.
    pub start: usize,
    /// Words to write; borrowed from the component.
    pub words: &'a [u32],
}

/// Everything a component is waiting for.
#[derive(Debug, Clone)]
pub struct Requests<'a, H = ()> {
    /// Rows to read.
    pub fetches: Batch<FetchRequest>,
    /// Key pairs to order.
    pub compares: Batch<CompareRequest<H>>,
    /// Number of fresh ids wanted.
    pub allocations: usize,
    /// Rows to write.
    pub stores: Batch<StoreRequest<'a>>,
}

impl<'a, H> Requests<'a, H> {
    /// Empty request lists, each paginated with `window`.
    pub fn new(window: Window) -> Self {
        Self {
            fetches: Batch::new(window),
            compares: Batch::new(window),
            allocations: 0,
            stores: Batch::new(window),
        }
    }

    /// Returns `true` if nothing is requested.
    pub fn is_empty(&self) -> bool {
        self.fetches.is_empty()
            && self.compares.is_empty()
            && self.allocations == 0
            && self.stores.is_empty()
    }

    /// The wait state these requests describe.
    pub fn phase(&self) -> Phase {
        if !self.fetches.is_empty() {
            Phase::WaitingForFetch
        } else if !self.compares.is_empty() {
            Phase::WaitingForCompare
        } else if self.allocations > 0 {
            Phase::WaitingForAllocate
        } else if !self.stores.is_empty() {
            Phase::WaitingForStore
        } else {
            Phase::Setup
        }
    }
}

/// Where a component stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// `setup` was never called.
    Uninitialized,
    /// Set up, with nothing outstanding yet.
    Setup,
    /// At least one row must be read.
    WaitingForFetch,
    /// At least one comparison must be made.
    WaitingForCompare,
    /// A fresh id is needed.
    WaitingForAllocate,
    /// At least one row write is unacknowledged.
    WaitingForStore,
    /// Finished; the result can be read.
    Done,
}

impl Phase {
    /// Returns `true` once the component has finished.
    pub fn is_done(self) -> bool {
        self == Phase::Done
    }
}

/// The uniform protocol of every resumable component.
///
/// Feedback for requests the component did not make, or already received, is
/// ignored.
pub trait StateMachine<H = ()> {
    /// Lists outstanding requests into `requests` and reports the phase.
    fn status<'a>(&'a self, requests: &mut Requests<'a, H>) -> Phase;

    /// Supplies words of node `id` starting at `start`.
    fn data(&mut self, id: u32, start: usize, words: &[u32]);

    /// Supplies the result of a requested comparison.
    fn compared(&mut self, _request: &CompareRequest<H>, _ordering: Ordering) {}

    /// Supplies a fresh id. Returns `false` if none was wanted.
    fn allocated(&mut self, _id: u32) -> bool {
        false
    }

    /// Acknowledges that the store of node `id` was applied.
    fn updated(&mut self, _id: u32) {}
}

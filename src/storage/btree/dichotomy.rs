//! Binary search over one node's keys, driven by external comparisons.
//!
//! A [`Dichotomy`] tracks how many keys are known to sort below and above the
//! pivot and which slots are known to equal it. From that it can answer, for
//! either [`Bound`], either "done at index i" or "compare slot j next". The
//! first and last searches share what they learn, so a single comparison of a
//! key that appears in several slots narrows both at once.

use std::cmp::Ordering;

use crate::storage::btree::request::CompareRequest;
use crate::storage::btree::Key;

/// Which end of the run of keys equal to the pivot is wanted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// Index of the first key not less than the pivot.
    First,
    /// Index of the first key greater than the pivot.
    Last,
}

/// Next step of a search for one [`Bound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The bound is known.
    Done {
        /// Whether any key equals the pivot.
        found: bool,
        /// Boundary index, possibly equal to the key count.
        index: usize,
    },
    /// The key in this slot must be compared with the pivot.
    Compare(usize),
}

/// Search state for one pivot over one sorted key list.
#[derive(Debug, Clone)]
pub struct Dichotomy<H> {
    pivot: Key<H>,
    keys: Vec<u32>,
    n_less: usize,
    n_greater: usize,
    /// Lowest slot confirmed equal; `keys.len()` while unknown.
    first_equal: usize,
    /// Highest slot confirmed equal; `0` while unknown.
    last_equal: usize,
}

impl<H: Clone + PartialEq> Dichotomy<H> {
    /// Starts a search for `pivot` among `keys`, which must be sorted.
    pub fn new(pivot: Key<H>, keys: &[u32]) -> Self {
        Self {
            pivot,
            keys: keys.to_vec(),
            n_less: 0,
            n_greater: 0,
            first_equal: keys.len(),
            last_equal: 0,
        }
    }

    /// The searched key.
    pub fn pivot(&self) -> &Key<H> {
        &self.pivot
    }

    /// Decides the next step for `bound`.
    pub fn step(&self, bound: Bound) -> Step {
        let n_keys = self.keys.len();
        if self.n_less + self.n_greater == n_keys {
            return Step::Done {
                found: false,
                index: self.n_less,
            };
        }
        if self.last_equal < self.first_equal {
            let n_possible = n_keys - self.n_less - self.n_greater;
            return Step::Compare(self.n_less + n_possible / 2);
        }
        match bound {
            Bound::First if self.first_equal == self.n_less => Step::Done {
                found: true,
                index: self.n_less,
            },
            Bound::First => {
                let n_possible = self.first_equal - self.n_less;
                Step::Compare(self.n_less + n_possible / 2)
            }
            Bound::Last if self.last_equal + 1 + self.n_greater == n_keys => Step::Done {
                found: true,
                index: self.last_equal + 1,
            },
            Bound::Last => {
                let first_possible = self.last_equal + 1;
                let n_possible = n_keys - self.n_greater - first_possible;
                Step::Compare(first_possible + n_possible / 2)
            }
        }
    }

    /// The comparison `bound` is waiting for, if any.
    pub fn request(&self, bound: Bound) -> Option<CompareRequest<H>> {
        match self.step(bound) {
            Step::Done { .. } => None,
            Step::Compare(slot) => Some(CompareRequest {
                a: Key::Known(self.keys[slot]),
                b: self.pivot.clone(),
            }),
        }
    }

    /// Returns the index for `bound` once it is known.
    pub fn index(&self, bound: Bound) -> Option<usize> {
        match self.step(bound) {
            Step::Done { index, .. } => Some(index),
            Step::Compare(_) => None,
        }
    }

    /// Learns from a comparison involving the pivot and a known key.
    pub fn compared(&mut self, request: &CompareRequest<H>, ordering: Ordering) {
        match (&request.a, &request.b) {
            (Key::Known(key), pivot) if *pivot == self.pivot => self.learn(*key, ordering),
            (pivot, Key::Known(key)) if *pivot == self.pivot => {
                self.learn(*key, ordering.reverse())
            }
            _ => {}
        }
    }

    /// `ordering` is how `key` compares to the pivot.
    fn learn(&mut self, key: u32, ordering: Ordering) {
        let lower = self.n_less;
        let upper = self.keys.len() - self.n_greater;
        for i in lower..upper {
            if self.keys[i] != key {
                continue;
            }
            match ordering {
                Ordering::Less => self.n_less = i + 1,
                Ordering::Greater => {
                    self.n_greater = self.keys.len() - i;
                    return;
                }
                Ordering::Equal if i < self.first_equal => {
                    self.first_equal = i;
                    if self.last_equal < self.first_equal {
                        self.last_equal = self.first_equal;
                    }
                    return;
                }
                Ordering::Equal if i > self.last_equal => self.last_equal = i,
                Ordering::Equal => {}
            }
        }
    }
}

// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The shared array of candidate cells.

use crate::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};

/// The shared candidate set of a sieve run.
///
/// Cell `i` represents the integer `i + 2`, covering exactly the candidates in
/// `[2, upper_bound)`. A cell holds its integer value while the candidate is
/// still possibly prime, and the zero sentinel once it has been crossed out.
/// Crossing out is monotone: once zero, a cell never returns to a nonzero
/// value.
pub struct SieveArray {
    /// One atomic cell per candidate.
    cells: Vec<AtomicUsize>,
    /// Exclusive upper bound of the candidate range.
    upper_bound: usize,
}

impl SieveArray {
    /// Allocates the candidate array for integers in `[2, upper_bound)`, each
    /// cell initialized to the integer it represents.
    ///
    /// The caller is responsible for rejecting `upper_bound < 2` beforehand;
    /// `upper_bound = 2` yields a valid empty array. Fails with
    /// [`Error::Allocation`] if the memory cannot be obtained, in which case
    /// nothing is left allocated.
    pub fn new(upper_bound: usize) -> Result<Self, Error> {
        debug_assert!(upper_bound >= 2);
        let len = upper_bound - 2;
        let mut cells = Vec::new();
        cells
            .try_reserve_exact(len)
            .map_err(|source| Error::Allocation {
                upper_bound,
                source,
            })?;
        cells.extend((0..len).map(|i| AtomicUsize::new(i + 2)));
        Ok(Self { cells, upper_bound })
    }

    /// Returns the number of candidate cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns whether the candidate range is empty.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Returns the exclusive upper bound of the candidate range.
    pub fn upper_bound(&self) -> usize {
        self.upper_bound
    }

    /// Crosses out the candidate at the given index.
    ///
    /// Safe under concurrent calls to the same index (re-marking a crossed-out
    /// cell is harmless) and fully parallel across distinct indices.
    pub fn mark_composite(&self, index: usize) {
        self.cells[index].store(0, Ordering::SeqCst);
    }

    /// Returns whether the candidate at the given index has been crossed out.
    pub fn is_marked(&self, index: usize) -> bool {
        self.cells[index].load(Ordering::SeqCst) == 0
    }

    /// Returns the current value of the cell at the given index: the candidate
    /// integer if still alive, zero if crossed out.
    pub fn value(&self, index: usize) -> usize {
        self.cells[index].load(Ordering::SeqCst)
    }

    /// Returns the candidates still alive, in increasing order.
    ///
    /// Meaningful once all writers have rendezvoused at the second barrier;
    /// after that point the survivors are exactly the primes in
    /// `[2, upper_bound)`.
    pub fn live_values(&self) -> Vec<usize> {
        self.cells
            .iter()
            .map(|cell| cell.load(Ordering::SeqCst))
            .filter(|&value| value != 0)
            .collect()
    }
}

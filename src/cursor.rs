// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The shared cursor that partitions the candidate array among workers.

use crate::array::SieveArray;
use crossbeam_utils::CachePadded;
use std::sync::Mutex;

/// A shared, monotonically advancing position into the candidate array.
///
/// Workers dynamically partition the remaining work by atomically claiming the
/// cursor's current position and advancing it past cells that are already
/// crossed out. Folding the skip into the claim guarantees that no two workers
/// treat the same cell as their starting multiple base.
pub struct WorkCursor {
    /// Next position to hand out, bounded by the array length.
    position: CachePadded<Mutex<usize>>,
}

impl WorkCursor {
    /// Creates a cursor at the start of the array.
    pub fn new() -> Self {
        Self {
            position: CachePadded::new(Mutex::new(0)),
        }
    }

    /// Claims the next starting position, or returns [`None`] if the array is
    /// exhausted.
    ///
    /// Under a single critical section, this captures the current position and
    /// advances the cursor: one increment, then further increments past every
    /// cell already marked composite, stopping at the first live cell or at
    /// the end of the array.
    ///
    /// The claimed position itself may have been marked composite by a racing
    /// worker between two claims. This is harmless: the caller derives the
    /// multiple base from the position (`p = index + 2`), not from the cell
    /// value, so the race only ever causes redundant re-marking of cells that
    /// are composite anyway, never a skipped prime.
    pub fn claim(&self, array: &SieveArray) -> Option<usize> {
        let mut position = self.position.lock().unwrap();
        let claimed = *position;
        if claimed >= array.len() {
            return None;
        }
        *position += 1;
        while *position < array.len() && array.is_marked(*position) {
            *position += 1;
        }
        Some(claimed)
    }
}

impl Default for WorkCursor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sequential_claims_cover_the_array_once() {
        let array = SieveArray::new(12).unwrap();
        let cursor = WorkCursor::new();

        let claims: Vec<usize> = std::iter::from_fn(|| cursor.claim(&array)).collect();
        assert_eq!(claims, (0..array.len()).collect::<Vec<_>>());

        // The terminal condition is stable.
        assert_eq!(cursor.claim(&array), None);
        assert_eq!(cursor.claim(&array), None);
    }

    #[test]
    fn test_claim_skips_marked_cells() {
        let array = SieveArray::new(12).unwrap();
        for index in [2, 3, 5, 8] {
            array.mark_composite(index);
        }
        let cursor = WorkCursor::new();

        let claims: Vec<usize> = std::iter::from_fn(|| cursor.claim(&array)).collect();
        assert_eq!(claims, vec![0, 1, 4, 6, 7, 9]);
    }

    #[test]
    fn test_first_position_claimed_even_when_marked() {
        // The skip only folds into the advance, so position 0 is handed out
        // as-is; the caller tolerates dead starting positions.
        let array = SieveArray::new(10).unwrap();
        array.mark_composite(0);
        array.mark_composite(1);
        let cursor = WorkCursor::new();

        assert_eq!(cursor.claim(&array), Some(0));
        assert_eq!(cursor.claim(&array), Some(2));
    }

    #[test]
    fn test_empty_array_is_immediately_terminal() {
        let array = SieveArray::new(2).unwrap();
        let cursor = WorkCursor::new();
        assert_eq!(cursor.claim(&array), None);
    }

    #[test]
    fn test_concurrent_claims_are_disjoint_and_exhaustive() {
        const NUM_THREADS: usize = 8;
        let array = SieveArray::new(10_002).unwrap();
        let cursor = WorkCursor::new();

        let mut seen = HashSet::new();
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..NUM_THREADS)
                .map(|_| s.spawn(|| std::iter::from_fn(|| cursor.claim(&array)).collect::<Vec<_>>()))
                .collect();
            for handle in handles {
                for claim in handle.join().unwrap() {
                    // No position is double-claimed as a starting point.
                    assert!(seen.insert(claim));
                }
            }
        });
        // No position is skipped.
        assert_eq!(seen.len(), array.len());
    }
}

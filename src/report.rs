// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Elapsed-time metrics and the final run report.

use crate::error::Error;
use std::fmt;
use std::time::{Duration, Instant};

/// Returns the time elapsed between two timestamps.
///
/// Fails with [`Error::TimeOrder`] if `earlier` is in fact later than `later`.
/// This should never occur given monotonic timestamping, but is guarded
/// explicitly rather than silently clamped.
pub fn interval(earlier: Instant, later: Instant) -> Result<Duration, Error> {
    later.checked_duration_since(earlier).ok_or(Error::TimeOrder)
}

/// Summary of a completed sieve run.
///
/// Produced once per run by [`SieveRun::report()`](crate::SieveRun::report),
/// after all workers have rendezvoused at the second barrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Number of worker threads that participated in the run.
    pub num_threads: usize,
    /// Exclusive upper bound of the candidate range.
    pub upper_bound: usize,
    /// Number of primes found in `[2, upper_bound)`.
    pub primes: usize,
    /// Number of composites found in `[2, upper_bound)`.
    pub composites: usize,
    /// Number of crossing-out operations applied to cells that were already
    /// crossed out by another worker's multiple.
    pub redundant_crossings: u64,
    /// Time from initialization to the first barrier release.
    pub setup: Duration,
    /// Time from the first to the second barrier release.
    pub compute: Duration,
    /// Time from initialization to the second barrier release.
    pub total: Duration,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "There are {} threads and the largest integer being processed is {}.",
            self.num_threads, self.upper_bound
        )?;
        writeln!(
            f,
            "There are {} primes and {} non-primes within [2, {}).",
            self.primes, self.composites, self.upper_bound
        )?;
        writeln!(
            f,
            "There are {} unnecessary crossing out.",
            self.redundant_crossings
        )?;
        writeln!(
            f,
            "Time spent on setting up the run: {} seconds.",
            FormatSeconds(self.setup)
        )?;
        writeln!(
            f,
            "Time spent on prime computation: {} seconds.",
            FormatSeconds(self.compute)
        )?;
        write!(f, "Total time spent: {} seconds.", FormatSeconds(self.total))
    }
}

/// Formats a duration as a seconds-and-nanoseconds pair.
struct FormatSeconds(Duration);

impl fmt::Display for FormatSeconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.0.as_secs(), self.0.subsec_nanos())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_interval_is_non_negative_with_bounded_subseconds() {
        let t1 = Instant::now();
        let t2 = t1 + Duration::new(3, 999_999_999);
        let elapsed = interval(t1, t2).unwrap();
        assert_eq!(elapsed.as_secs(), 3);
        assert!(elapsed.subsec_nanos() < 1_000_000_000);
    }

    #[test]
    fn test_interval_of_equal_timestamps_is_zero() {
        let t = Instant::now();
        assert_eq!(interval(t, t).unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_interval_borrows_across_the_second_boundary() {
        // 0.9s + 0.2s lands past a whole second: the sub-second component
        // must borrow rather than overflow.
        let t1 = Instant::now();
        let t2 = t1 + Duration::new(0, 900_000_000) + Duration::new(0, 200_000_000);
        assert_eq!(interval(t1, t2).unwrap(), Duration::new(1, 100_000_000));
    }

    #[test]
    fn test_interval_rejects_reversed_timestamps() {
        let t1 = Instant::now();
        let t2 = t1 + Duration::from_secs(1);
        assert!(matches!(interval(t2, t1), Err(Error::TimeOrder)));
    }

    #[test]
    fn test_report_display() {
        let report = RunReport {
            num_threads: 2,
            upper_bound: 10,
            primes: 4,
            composites: 4,
            redundant_crossings: 1,
            setup: Duration::new(0, 1_200),
            compute: Duration::new(1, 34_000_000),
            total: Duration::new(1, 34_001_200),
        };
        let rendered = report.to_string();
        assert_eq!(
            rendered,
            "There are 2 threads and the largest integer being processed is 10.\n\
             There are 4 primes and 4 non-primes within [2, 10).\n\
             There are 1 unnecessary crossing out.\n\
             Time spent on setting up the run: 0.000001200 seconds.\n\
             Time spent on prime computation: 1.034000000 seconds.\n\
             Total time spent: 1.034001200 seconds."
        );
    }
}

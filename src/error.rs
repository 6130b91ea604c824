// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error taxonomy of the sieve engine.

use crate::barrier::Phase;
use std::collections::TryReserveError;
use thiserror::Error;

/// Errors surfaced by the sieve engine.
///
/// Configuration and allocation errors are returned synchronously by
/// [`SieveBuilder::start()`](crate::SieveBuilder::start), before any worker
/// thread exists. Nothing is retried automatically: retrying is a decision for
/// the caller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The configured number of worker threads is zero. Checked before any
    /// allocation: the run never starts.
    #[error("num_threads must be greater than or equal to 1")]
    InvalidNumThreads,

    /// The configured sieve upper bound leaves no candidate range. Checked
    /// before any allocation: the run never starts.
    #[error("upper_bound must be greater than or equal to 2 (got {0})")]
    InvalidUpperBound(usize),

    /// The candidate array could not be allocated. No partial array is left
    /// behind: the run owns no resources after this error.
    #[error("failed to allocate the candidate array for upper_bound = {upper_bound}")]
    Allocation {
        /// The sieve upper bound whose candidate array was requested.
        upper_bound: usize,
        /// The underlying reservation failure.
        #[source]
        source: TryReserveError,
    },

    /// A worker thread failed to spawn. Workers with a smaller index have
    /// already started and are left to run to completion; there is no
    /// cancellation mechanism.
    #[error("worker thread {index} could not be spawned")]
    Spawn {
        /// Index of the worker that failed to spawn.
        index: usize,
        /// The underlying spawn failure.
        #[source]
        source: std::io::Error,
    },

    /// A thread arrived at a barrier phase whose rendezvous budget is already
    /// drained (e.g. a third rendezvous on a two-phase barrier). This is a
    /// programming-contract violation and never occurs in the engine's own
    /// control flow.
    #[error("barrier phase {0:?} arrived at after its rendezvous already completed")]
    PhaseExhausted(Phase),

    /// Timestamps passed to [`interval()`](crate::interval) are
    /// reversed. This cannot happen with monotonic timestamping but is guarded
    /// explicitly rather than silently clamped.
    #[error("timestamps are out of order")]
    TimeOrder,

    /// A report was requested while the computation is still running. The
    /// caller may retry once all workers have passed the second barrier.
    #[error("the prime computation has not finished yet")]
    NotFinished,
}

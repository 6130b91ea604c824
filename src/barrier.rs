// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A reusable rendezvous primitive with exactly two sequential phases.

use crate::error::Error;
use crate::macros::log_debug;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Instant;

/// One of the two mandatory rendezvous points of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The rendezvous separating setup from computation.
    First,
    /// The rendezvous separating computation from teardown.
    Second,
}

/// How a call to [`TwoPhaseBarrier::arrive_and_wait()`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// This caller's arrival completed the rendezvous, recorded the phase
    /// timestamp and released all waiters. Exactly one arrival per phase
    /// observes this.
    Releasing,
    /// This caller blocked until another arrival released the phase.
    Waited,
}

/// A barrier that synchronizes `N` participants at two sequential rendezvous
/// points, each fully draining before any participant proceeds past it.
///
/// Both phases consume arrivals from a single budget of `2 × N`: the first
/// phase releases when the budget drops to `N`, the second when it drops to
/// zero. The arrival that lands exactly on a phase's release threshold records
/// that phase's wall-clock timestamp.
///
/// Blocking uses a mutex-condvar pair rather than a spin loop; the ordering
/// contract is the same. The barrier supports exactly two phases per run: an
/// arrival on an already-drained phase fails with [`Error::PhaseExhausted`].
pub struct TwoPhaseBarrier {
    /// Number of participants per rendezvous.
    num_threads: usize,
    /// Arrival budget and phase timestamps.
    state: Status<BarrierState>,
}

/// Shared bookkeeping of a [`TwoPhaseBarrier`].
struct BarrierState {
    /// Arrivals not yet consumed, counting down from `2 × num_threads`.
    remaining: usize,
    /// When the first rendezvous fully drained.
    first_at: Option<Instant>,
    /// When the second rendezvous fully drained.
    second_at: Option<Instant>,
}

impl TwoPhaseBarrier {
    /// Creates a barrier for the given number of participants.
    pub fn new(num_threads: usize) -> Self {
        debug_assert!(num_threads > 0);
        Self {
            num_threads,
            state: Status::new(BarrierState {
                remaining: 2 * num_threads,
                first_at: None,
                second_at: None,
            }),
        }
    }

    /// Arrives at the given phase and blocks until all participants have
    /// arrived at it.
    ///
    /// No caller proceeds past the first phase until all `N` participants have
    /// arrived at it, and likewise for the second phase. The releasing arrival
    /// returns without blocking.
    pub fn arrive_and_wait(&self, phase: Phase) -> Result<Arrival, Error> {
        let threshold = match phase {
            Phase::First => self.num_threads,
            Phase::Second => 0,
        };

        let mut guard = self.state.lock();
        if guard.remaining <= threshold {
            return Err(Error::PhaseExhausted(phase));
        }
        guard.remaining -= 1;
        if guard.remaining == threshold {
            // Last arrival: timestamp the phase and release everyone.
            let now = Instant::now();
            match phase {
                Phase::First => guard.first_at = Some(now),
                Phase::Second => guard.second_at = Some(now),
            }
            drop(guard);
            self.state.notify_all();
            log_debug!("[barrier] Phase {phase:?} fully reached, releasing all waiters.");
            return Ok(Arrival::Releasing);
        }
        drop(guard);

        let _guard = self.state.wait_while(|state| state.remaining > threshold);
        Ok(Arrival::Waited)
    }

    /// Returns the timestamps recorded when each phase fully drained.
    ///
    /// A timestamp is [`None`] while its phase has not been released yet.
    pub fn phase_timestamps(&self) -> (Option<Instant>, Option<Instant>) {
        let guard = self.state.lock();
        (guard.first_at, guard.second_at)
    }
}

/// An ergonomic wrapper around a [`Mutex`]-[`Condvar`] pair.
struct Status<T> {
    mutex: Mutex<T>,
    condvar: Condvar,
}

impl<T> Status<T> {
    /// Creates a new status initialized with the given value.
    fn new(t: T) -> Self {
        Self {
            mutex: Mutex::new(t),
            condvar: Condvar::new(),
        }
    }

    /// Locks the status for inspection or modification.
    fn lock(&self) -> MutexGuard<T> {
        self.mutex.lock().unwrap()
    }

    /// Notifies all waiting threads.
    fn notify_all(&self) {
        self.condvar.notify_all();
    }

    /// Waits until the predicate is true on this status.
    ///
    /// This returns a [`MutexGuard`], allowing to further inspect or modify
    /// the status.
    fn wait_while(&self, predicate: impl FnMut(&mut T) -> bool) -> MutexGuard<T> {
        self.condvar
            .wait_while(self.mutex.lock().unwrap(), predicate)
            .unwrap()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_single_participant_releases_both_phases() {
        let barrier = TwoPhaseBarrier::new(1);
        assert_eq!(
            barrier.arrive_and_wait(Phase::First).unwrap(),
            Arrival::Releasing
        );
        assert_eq!(
            barrier.arrive_and_wait(Phase::Second).unwrap(),
            Arrival::Releasing
        );

        let (first_at, second_at) = barrier.phase_timestamps();
        assert!(first_at.unwrap() <= second_at.unwrap());
    }

    #[test]
    fn test_third_rendezvous_is_rejected() {
        let barrier = TwoPhaseBarrier::new(1);
        barrier.arrive_and_wait(Phase::First).unwrap();
        barrier.arrive_and_wait(Phase::Second).unwrap();

        assert!(matches!(
            barrier.arrive_and_wait(Phase::Second),
            Err(Error::PhaseExhausted(Phase::Second))
        ));
        assert!(matches!(
            barrier.arrive_and_wait(Phase::First),
            Err(Error::PhaseExhausted(Phase::First))
        ));
    }

    #[test]
    fn test_extra_first_phase_arrival_is_rejected() {
        let barrier = TwoPhaseBarrier::new(1);
        barrier.arrive_and_wait(Phase::First).unwrap();
        assert!(matches!(
            barrier.arrive_and_wait(Phase::First),
            Err(Error::PhaseExhausted(Phase::First))
        ));
    }

    #[test]
    fn test_exactly_one_releasing_arrival_per_phase() {
        const NUM_THREADS: usize = 8;
        let barrier = TwoPhaseBarrier::new(NUM_THREADS);
        let first_releases = AtomicUsize::new(0);
        let second_releases = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..NUM_THREADS {
                s.spawn(|| {
                    if barrier.arrive_and_wait(Phase::First).unwrap() == Arrival::Releasing {
                        first_releases.fetch_add(1, Ordering::SeqCst);
                    }
                    if barrier.arrive_and_wait(Phase::Second).unwrap() == Arrival::Releasing {
                        second_releases.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(first_releases.load(Ordering::SeqCst), 1);
        assert_eq!(second_releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_thread_passes_a_phase_before_all_arrive() {
        const NUM_THREADS: usize = 8;
        let barrier = TwoPhaseBarrier::new(NUM_THREADS);
        let arrived_first = AtomicUsize::new(0);
        let arrived_second = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..NUM_THREADS {
                s.spawn(|| {
                    arrived_first.fetch_add(1, Ordering::SeqCst);
                    barrier.arrive_and_wait(Phase::First).unwrap();
                    // Past the first phase, every participant must have
                    // registered its arrival.
                    assert_eq!(arrived_first.load(Ordering::SeqCst), NUM_THREADS);

                    arrived_second.fetch_add(1, Ordering::SeqCst);
                    barrier.arrive_and_wait(Phase::Second).unwrap();
                    assert_eq!(arrived_second.load(Ordering::SeqCst), NUM_THREADS);
                });
            }
        });
    }

    #[test]
    fn test_phase_timestamps_unset_before_release() {
        let barrier = TwoPhaseBarrier::new(2);
        let (first_at, second_at) = barrier.phase_timestamps();
        assert!(first_at.is_none());
        assert!(second_at.is_none());
    }
}

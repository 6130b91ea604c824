// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The coordinator that owns a sieve run's lifecycle.

use crate::array::SieveArray;
use crate::barrier::{Arrival, Phase, TwoPhaseBarrier};
use crate::cursor::WorkCursor;
use crate::error::Error;
use crate::macros::{log_debug, log_error, log_warn};
use crate::report::{interval, RunReport};
use crossbeam_utils::CachePadded;
// Platforms that support `libc::sched_setaffinity()`.
#[cfg(all(
    not(miri),
    any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    )
))]
use nix::{
    sched::{sched_setaffinity, CpuSet},
    unistd::Pid,
};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

/// Policy to pin worker threads to CPUs.
#[derive(Clone, Copy, Debug, Default)]
pub enum CpuPinningPolicy {
    /// Don't pin worker threads to CPUs.
    #[default]
    No,
    /// Pin each worker thread to a CPU, if CPU pinning is supported and
    /// implemented on this platform.
    IfSupported,
    /// Pin each worker thread to a CPU. If CPU pinning isn't supported on this
    /// platform (or not implemented), starting a run will panic.
    Always,
}

/// Configuration of a sieve run.
///
/// ```
/// # use parasieve::SieveBuilder;
/// let mut run = SieveBuilder {
///     num_threads: 4,
///     upper_bound: 30,
///     ..SieveBuilder::default()
/// }
/// .start()?;
///
/// run.wait();
/// let report = run.report()?;
/// assert_eq!(report.primes, 10);
/// # Ok::<(), parasieve::Error>(())
/// ```
pub struct SieveBuilder {
    /// Number of worker threads to spawn, at least 1.
    pub num_threads: usize,
    /// Exclusive upper bound of the candidate range, at least 2. Candidates
    /// are the integers in `[2, upper_bound)`.
    pub upper_bound: usize,
    /// Policy to pin worker threads to CPUs.
    pub cpu_pinning: CpuPinningPolicy,
}

impl Default for SieveBuilder {
    /// One worker thread sieving `[2, 10)`, without CPU pinning.
    fn default() -> Self {
        Self {
            num_threads: 1,
            upper_bound: 10,
            cpu_pinning: CpuPinningPolicy::No,
        }
    }
}

impl SieveBuilder {
    /// Validates the configuration, allocates the shared run state and spawns
    /// the worker threads, returning a handle to the running computation.
    ///
    /// Both parameters are checked before anything is allocated: an invalid
    /// configuration fails with [`Error::InvalidNumThreads`] or
    /// [`Error::InvalidUpperBound`] and the run never starts. A worker that
    /// fails to spawn surfaces as [`Error::Spawn`] with its index;
    /// already-started workers are left to run, as there is no cancellation
    /// mechanism.
    pub fn start(&self) -> Result<SieveRun, Error> {
        if self.num_threads < 1 {
            return Err(Error::InvalidNumThreads);
        }
        if self.upper_bound < 2 {
            return Err(Error::InvalidUpperBound(self.upper_bound));
        }

        // Initialization is timestamped before any allocation begins.
        let init_at = Instant::now();

        let context = Arc::new(RunContext {
            array: SieveArray::new(self.upper_bound)?,
            cursor: WorkCursor::new(),
            barrier: TwoPhaseBarrier::new(self.num_threads),
            counters: (0..self.num_threads)
                .map(|_| CachePadded::new(AtomicU64::new(0)))
                .collect(),
            state: LifecycleFlag::new(),
        });

        #[cfg(any(
            miri,
            not(any(
                target_os = "android",
                target_os = "dragonfly",
                target_os = "freebsd",
                target_os = "linux"
            ))
        ))]
        match self.cpu_pinning {
            CpuPinningPolicy::No => (),
            CpuPinningPolicy::IfSupported => {
                log_warn!("Pinning threads to CPUs is not implemented on this platform.")
            }
            CpuPinningPolicy::Always => {
                panic!("Pinning threads to CPUs is not implemented on this platform.")
            }
        }

        context.state.set(RunState::Running);

        let cpu_pinning = self.cpu_pinning;
        let mut threads = Vec::with_capacity(self.num_threads);
        for id in 0..self.num_threads {
            let worker = WorkerContext {
                id,
                context: context.clone(),
            };
            let handle = std::thread::Builder::new()
                .name(format!("sieve-worker-{id}"))
                .spawn(move || {
                    pin_to_cpu(worker.id, cpu_pinning);
                    if let Err(_e) = worker.run() {
                        log_error!("[thread {}] Barrier contract violated: {_e}", worker.id);
                    }
                })
                .map_err(|source| Error::Spawn { index: id, source })?;
            threads.push(WorkerThreadHandle { handle });
        }
        log_debug!("[main thread] Spawned {} worker threads", self.num_threads);

        Ok(SieveRun {
            num_threads: self.num_threads,
            init_at,
            context,
            threads,
        })
    }
}

/// Pins the current thread to the CPU matching the given worker index.
#[cfg(all(
    not(miri),
    any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    )
))]
fn pin_to_cpu(id: usize, cpu_pinning: CpuPinningPolicy) {
    match cpu_pinning {
        CpuPinningPolicy::No => (),
        CpuPinningPolicy::IfSupported => {
            let mut cpu_set = CpuSet::new();
            if let Err(_e) = cpu_set.set(id) {
                log_warn!("Failed to set CPU affinity for thread #{id}: {_e}");
            } else if let Err(_e) = sched_setaffinity(Pid::from_raw(0), &cpu_set) {
                log_warn!("Failed to set CPU affinity for thread #{id}: {_e}");
            } else {
                log_debug!("Pinned thread #{id} to CPU #{id}");
            }
        }
        CpuPinningPolicy::Always => {
            let mut cpu_set = CpuSet::new();
            if let Err(e) = cpu_set.set(id) {
                panic!("Failed to set CPU affinity for thread #{id}: {e}");
            } else if let Err(e) = sched_setaffinity(Pid::from_raw(0), &cpu_set) {
                panic!("Failed to set CPU affinity for thread #{id}: {e}");
            } else {
                log_debug!("Pinned thread #{id} to CPU #{id}");
            }
        }
    }
}

#[cfg(any(
    miri,
    not(any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    ))
))]
fn pin_to_cpu(_id: usize, _cpu_pinning: CpuPinningPolicy) {}

/// Run lifecycle, owned by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    /// The shared state is allocated but no worker has been spawned yet.
    NotStarted = 0,
    /// Workers are sieving; the shared array is being mutated.
    Running = 1,
    /// All workers have rendezvoused at the second barrier.
    Finished = 2,
}

/// Atomic cell holding a [`RunState`].
struct LifecycleFlag(AtomicU8);

impl LifecycleFlag {
    fn new() -> Self {
        Self(AtomicU8::new(RunState::NotStarted as u8))
    }

    fn set(&self, state: RunState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    fn get(&self) -> RunState {
        match self.0.load(Ordering::SeqCst) {
            0 => RunState::NotStarted,
            1 => RunState::Running,
            _ => RunState::Finished,
        }
    }
}

/// State shared between the coordinator and all workers of one run.
struct RunContext {
    /// The shared candidate set.
    array: SieveArray,
    /// The shared work partitioning cursor.
    cursor: WorkCursor,
    /// The two rendezvous points of the run.
    barrier: TwoPhaseBarrier,
    /// One crossing-out counter per worker, indexed by worker id. Used only
    /// for redundancy reporting, not for correctness.
    counters: Box<[CachePadded<AtomicU64>]>,
    /// Run lifecycle flag.
    state: LifecycleFlag,
}

/// Context object owned by a worker thread.
struct WorkerContext {
    /// Worker index, also indexing this worker's crossing-out counter.
    id: usize,
    /// State shared with the coordinator and the other workers.
    context: Arc<RunContext>,
}

impl WorkerContext {
    /// Main function run by this thread: first rendezvous, partition loop,
    /// second rendezvous, and for the releasing arrival the transition of the
    /// run to finished.
    fn run(&self) -> Result<(), Error> {
        let barrier = &self.context.barrier;

        log_debug!("[thread {}] Waiting at the first barrier", self.id);
        barrier.arrive_and_wait(Phase::First)?;

        self.sieve();

        log_debug!("[thread {}] Waiting at the second barrier", self.id);
        if barrier.arrive_and_wait(Phase::Second)? == Arrival::Releasing {
            // Last worker through: all marks are visible from here on.
            self.context.state.set(RunState::Finished);
            log_debug!("[thread {}] Last arrival, run marked finished", self.id);
        }
        Ok(())
    }

    /// Repeatedly claims a starting position and crosses out the proper
    /// multiples of the integer it represents, until the array is exhausted.
    fn sieve(&self) {
        let array = &self.context.array;
        let counter = &self.context.counters[self.id];

        while let Some(start) = self.context.cursor.claim(array) {
            // The multiple base comes from the position, not the cell value:
            // the claimed cell may have just been crossed out by a racing
            // worker, in which case these marks are redundant but correct.
            let p = start + 2;
            let mut index = start + p;
            while index < array.len() {
                array.mark_composite(index);
                counter.fetch_add(1, Ordering::Relaxed);
                index += p;
            }
        }
        log_debug!(
            "[thread {}] Array exhausted after {} crossing out operations",
            self.id,
            counter.load(Ordering::Relaxed)
        );
    }
}

/// Handle to a worker thread of a run.
struct WorkerThreadHandle {
    /// Thread handle object.
    handle: JoinHandle<()>,
}

/// A started sieve run.
///
/// The coordinator is the sole owner of the worker thread handles; dropping
/// the run joins any workers not yet joined by [`wait()`](Self::wait) and
/// releases the shared array, counters and barrier.
pub struct SieveRun {
    /// Number of worker threads spawned for this run.
    num_threads: usize,
    /// Timestamp taken before the shared state was allocated.
    init_at: Instant,
    /// State shared with the workers.
    context: Arc<RunContext>,
    /// Handles to all the worker threads of the run.
    threads: Vec<WorkerThreadHandle>,
}

impl SieveRun {
    /// Returns the number of worker threads participating in this run.
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Returns the exclusive upper bound of the candidate range.
    pub fn upper_bound(&self) -> usize {
        self.context.array.upper_bound()
    }

    /// Returns whether all workers have rendezvoused at the second barrier.
    pub fn is_finished(&self) -> bool {
        self.context.state.get() == RunState::Finished
    }

    /// Blocks until all worker threads have completed and joins them.
    pub fn wait(&mut self) {
        log_debug!("[main thread] Joining worker threads...");
        for (_i, t) in self.threads.drain(..).enumerate() {
            let result = t.handle.join();
            match result {
                Ok(_) => log_debug!("[main thread] Thread {_i} joined with result: {result:?}"),
                Err(_) => log_error!("[main thread] Thread {_i} joined with result: {result:?}"),
            }
        }
        log_debug!("[main thread] Joined worker threads.");
    }

    /// Produces the summary of the completed run.
    ///
    /// Fails with [`Error::NotFinished`], without blocking, if the workers
    /// have not all rendezvoused at the second barrier yet; the caller may
    /// retry later or [`wait()`](Self::wait) first.
    pub fn report(&self) -> Result<RunReport, Error> {
        if self.context.state.get() != RunState::Finished {
            return Err(Error::NotFinished);
        }

        let array = &self.context.array;
        let primes = array.live_values().len();
        let composites = array.len() - primes;
        let total_marks: u64 = self
            .context
            .counters
            .iter()
            .map(|counter| counter.load(Ordering::Relaxed))
            .sum();
        debug_assert!(total_marks >= composites as u64);

        let (first_at, second_at) = self.context.barrier.phase_timestamps();
        let first_at = first_at.ok_or(Error::NotFinished)?;
        let second_at = second_at.ok_or(Error::NotFinished)?;

        Ok(RunReport {
            num_threads: self.num_threads,
            upper_bound: array.upper_bound(),
            primes,
            composites,
            redundant_crossings: total_marks - composites as u64,
            setup: interval(self.init_at, first_at)?,
            compute: interval(first_at, second_at)?,
            total: interval(self.init_at, second_at)?,
        })
    }

    /// Returns the primes found in `[2, upper_bound)`, in increasing order.
    ///
    /// Fails with [`Error::NotFinished`] while the computation is ongoing.
    pub fn primes(&self) -> Result<Vec<usize>, Error> {
        if self.context.state.get() != RunState::Finished {
            return Err(Error::NotFinished);
        }
        Ok(self.context.array.live_values())
    }
}

impl Drop for SieveRun {
    /// Joins any worker threads not yet joined.
    fn drop(&mut self) {
        self.wait();
    }
}

//! Fixed-size worker pool driving the two-phase flock update.
//!
//! The workers are created once, as a dedicated Rayon thread pool, and live
//! as long as the scheduler. Each call to [`UpdateScheduler::dispatch`] hands
//! every worker one item (usually a contiguous slice of the population) and
//! runs them inside a single `ThreadPool::scope`. The scope only returns once
//! every task has finished, which makes each dispatch a phase barrier: a
//! caller that dispatches the force phase and then the integration phase can
//! never have the two overlap.
//!
//! Tasks run under `catch_unwind`. A panicking worker does not stall the
//! barrier; its panic is reported over a fault channel and surfaced to the
//! caller as [`FlockError::WorkerFault`].
use std::any::Any;
use std::fmt;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{mpsc, Arc};

use log::{debug, error, info};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::utils::FlockError;

/// The two halves of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Neighbour queries and steering; no agent state is written.
    Forces,
    /// Motion integration and grid re-bucketing.
    Integrate,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Phase::Forces => write!(f, "force"),
            Phase::Integrate => write!(f, "integration"),
        }
    }
}

/// `Idle -> Dispatched -> Running -> Idle`, once per phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Dispatched(Phase),
    Running(Phase),
}

impl WorkerState {
    fn encode(self) -> u8 {
        match self {
            WorkerState::Idle => 0,
            WorkerState::Dispatched(Phase::Forces) => 1,
            WorkerState::Dispatched(Phase::Integrate) => 2,
            WorkerState::Running(Phase::Forces) => 3,
            WorkerState::Running(Phase::Integrate) => 4,
        }
    }

    fn decode(raw: u8) -> Self {
        match raw {
            1 => WorkerState::Dispatched(Phase::Forces),
            2 => WorkerState::Dispatched(Phase::Integrate),
            3 => WorkerState::Running(Phase::Forces),
            4 => WorkerState::Running(Phase::Integrate),
            _ => WorkerState::Idle,
        }
    }
}

/// Hook for instrumenting phase execution, called on the worker thread.
pub trait PhaseObserver: Send + Sync {
    fn phase_started(&self, worker: usize, phase: Phase);
    fn phase_finished(&self, worker: usize, phase: Phase);
}

/// Splits `0..len` into `workers` contiguous ranges of `len / workers`
/// elements each; the last range also takes the remainder.
///
/// # Example
/// ```
/// use flock_sim::scheduler::partition;
/// assert_eq!(partition(10, 3), vec![0..3, 3..6, 6..10]);
/// assert_eq!(partition(2, 3), vec![0..0, 0..0, 0..2]);
/// ```
pub fn partition(len: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.max(1);
    let batch = len / workers;
    (0..workers)
        .map(|worker| {
            let start = worker * batch;
            let end = if worker + 1 == workers { len } else { start + batch };
            start..end
        })
        .collect()
}

/// Cuts `slice` into the disjoint mutable pieces described by `ranges`,
/// paired with each piece's starting index.
///
/// `ranges` must be ascending, contiguous and start at zero, as produced by
/// [`partition`]. Elements past the last range are not handed out.
pub fn split_ranges_mut<'a, T>(slice: &'a mut [T], ranges: &[Range<usize>]) -> Vec<(usize, &'a mut [T])> {
    let mut rest = slice;
    let mut pieces = Vec::with_capacity(ranges.len());
    for range in ranges {
        let take = range.len().min(rest.len());
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(take);
        pieces.push((range.start, head));
        rest = tail;
    }
    pieces
}

pub struct UpdateScheduler {
    pool: ThreadPool,
    states: Vec<AtomicU8>,
    observer: Option<Arc<dyn PhaseObserver>>,
}

impl UpdateScheduler {
    /// Starts `worker_count` long-lived workers (at least one).
    ///
    /// # Errors
    ///
    /// Returns [`FlockError::ResourceExhaustion`] if the threads cannot be spawned.
    pub fn new(worker_count: usize) -> Result<Self, FlockError> {
        let worker_count = worker_count.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .thread_name(|index| format!("flock-worker-{}", index))
            .build()
            .map_err(|err| {
                FlockError::ResourceExhaustion(format!(
                    "failed to start {} update workers: {}",
                    worker_count, err
                ))
            })?;

        info!("started {} update workers", worker_count);

        Ok(UpdateScheduler {
            pool,
            states: (0..worker_count).map(|_| AtomicU8::new(0)).collect(),
            observer: None,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.states.len()
    }

    pub fn set_observer(&mut self, observer: Option<Arc<dyn PhaseObserver>>) {
        self.observer = observer;
    }

    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.states
            .iter()
            .map(|state| WorkerState::decode(state.load(Ordering::Acquire)))
            .collect()
    }

    /// [`partition`] over this scheduler's worker count.
    pub fn partition(&self, len: usize) -> Vec<Range<usize>> {
        partition(len, self.worker_count())
    }

    /// Runs `task(worker, item)` for every item, item `k` on worker `k`, and
    /// blocks until all of them have finished.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by any task. A task that panics is
    /// reported as [`FlockError::WorkerFault`]. Either way every other task
    /// still runs to completion before this returns.
    ///
    /// # Example
    ///
    /// ```
    /// use flock_sim::scheduler::{Phase, UpdateScheduler};
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    ///
    /// let scheduler = UpdateScheduler::new(4).expect("Failed to start workers");
    /// let total = AtomicUsize::new(0);
    /// scheduler
    ///     .dispatch(Phase::Forces, vec![1, 2, 3, 4], |_, n| {
    ///         total.fetch_add(n, Ordering::Relaxed);
    ///         Ok(())
    ///     })
    ///     .expect("Dispatch failed");
    /// assert_eq!(total.load(Ordering::Relaxed), 10);
    /// ```
    pub fn dispatch<W, F>(&self, phase: Phase, items: Vec<W>, task: F) -> Result<(), FlockError>
    where
        W: Send,
        F: Fn(usize, W) -> Result<(), FlockError> + Sync,
    {
        debug_assert!(
            items.len() <= self.states.len(),
            "{} work items for {} workers",
            items.len(),
            self.states.len()
        );

        for worker in 0..items.len() {
            store_state(&self.states, worker, WorkerState::Dispatched(phase));
        }
        debug!("dispatching {} phase to {} workers", phase, items.len());

        let (fault_tx, fault_rx) = mpsc::channel::<FlockError>();
        let task = &task;
        let states = &self.states;
        let observer = self.observer.as_deref();

        self.pool.scope(|scope| {
            for (worker, item) in items.into_iter().enumerate() {
                let fault_tx = fault_tx.clone();
                scope.spawn(move |_| {
                    store_state(states, worker, WorkerState::Running(phase));
                    if let Some(observer) = observer {
                        observer.phase_started(worker, phase);
                    }

                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(worker, item)));

                    if let Some(observer) = observer {
                        observer.phase_finished(worker, phase);
                    }
                    store_state(states, worker, WorkerState::Idle);

                    let fault = match outcome {
                        Ok(Ok(())) => None,
                        Ok(Err(err)) => Some(err),
                        Err(payload) => Some(FlockError::WorkerFault {
                            worker,
                            phase,
                            message: panic_message(payload.as_ref()),
                        }),
                    };
                    if let Some(fault) = fault {
                        // The receiver outlives the scope, so this cannot fail.
                        let _ = fault_tx.send(fault);
                    }
                });
            }
        });
        drop(fault_tx);

        match fault_rx.try_iter().next() {
            Some(fault) => {
                error!("{} phase aborted: {}", phase, fault);
                Err(fault)
            }
            None => Ok(()),
        }
    }

    /// Stops every worker. Any dispatch has already returned by the time this
    /// can be called, so no worker is left blocked.
    pub fn shutdown(self) {
        info!("shutting down {} update workers", self.states.len());
        drop(self.pool);
    }
}

fn store_state(states: &[AtomicU8], worker: usize, state: WorkerState) {
    if let Some(slot) = states.get(worker) {
        slot.store(state.encode(), Ordering::Release);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

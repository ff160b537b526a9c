//! Contention benchmarks.
//!
//! One worker task is pinned to each configured core. The orchestrator (the
//! calling task) drives a fixed number of rounds. In every round, each worker
//! performs a timed burst of operations, and the orchestrator waits for all of
//! them before starting the next round:
//!
//! ```text
//!   orchestrator (core 0)        worker 1 (core 1)        worker 0 (core 0)
//!        │ │                          ┊                        ┊
//!        │ │  notify                  ┊                        ┊
//!        │ │ ───────────────────────► ┌┐ t0                    ┊
//!        │ │  notify                  ││                       ┊
//!        └┬┘ ──────────────────────── ││ ───────────────────► ┌┐ t0
//!         │                           ││ burst                 ││ burst
//!         │                           └┘ t1, reset, signal     ││
//!         │                                                    └┘ t1, reset, signal
//!        ┌┴┐ ◀─── semaphore wait × num_cores ────────────────────┘
//!        │ │  (next round)
//! ```
//!
//! The worker on the orchestrator's own core is started last so that the
//! orchestrator's signaling doesn't preempt a worker that is already timing.
//!
//! All objects are created by [`ContentionBench::setup`] and released by
//! [`ContentionBench::teardown`] (or when the value is dropped).
use alloc::{boxed::Box, sync::Arc};
use arrayvec::ArrayVec;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use spin::Mutex as SpinMutex;

use crate::{
    aggregate::{aggregate, ContentionReport},
    config::{ContentionConfig, Workload, MAX_CORES},
    error::{BenchError, ResultCode},
    kernel::{CoreId, Kernel, Placement, TaskState},
    sample::PerCoreAccumulator,
};

mod orchestrator;
mod worker;

pub use self::orchestrator::start_order;

/// The state of a worker as seen by the benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WorkerPhase {
    /// Waiting for the start notification of the next round
    AwaitingStart = 0,
    /// Performing the timed burst
    TimedBurst = 1,
    /// Resetting the private queue and signaling completion
    Reporting = 2,
    /// Done with all rounds (or aborted) and suspended, waiting to be deleted
    AwaitingDeletion = 3,
}

impl WorkerPhase {
    fn from_u8(x: u8) -> Self {
        match x {
            0 => Self::AwaitingStart,
            1 => Self::TimedBurst,
            2 => Self::Reporting,
            _ => Self::AwaitingDeletion,
        }
    }
}

/// The state shared by the orchestrator and the workers.
struct Shared<K: Kernel> {
    kernel: K,
    config: ContentionConfig,
    /// The private queue of each core. Empty unless the workload is
    /// [`Workload::QueueFill`].
    queues: ArrayVec<K::Queue, MAX_CORES>,
    /// Signaled once by each worker at the end of each round.
    done_sem: K::Semaphore,
    acc: PerCoreAccumulator,
    phases: ArrayVec<AtomicU8, MAX_CORES>,
    /// Set by the orchestrator before waking up workers that should stop
    /// instead of starting another round.
    abort: AtomicBool,
    /// The first failure observed by a worker.
    failure: SpinMutex<Option<BenchError>>,
}

impl<K: Kernel> Shared<K> {
    fn phase(&self, core: CoreId) -> WorkerPhase {
        WorkerPhase::from_u8(self.phases[core].load(Ordering::Acquire))
    }

    fn set_phase(&self, core: CoreId, phase: WorkerPhase) {
        log::trace!("worker {core}: {phase:?}");
        self.phases[core].store(phase as u8, Ordering::Release);
    }

    /// Record a worker failure. Only the first one is kept.
    fn fail(&self, error: BenchError) {
        log::debug!("worker failure: {error}");
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some(error);
        }
    }

    fn take_failure(&self) -> Option<BenchError> {
        self.failure.lock().take()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Ready,
    Ran,
    Released,
}

/// A contention benchmark with all of its objects created.
pub struct ContentionBench<K: Kernel> {
    shared: Arc<Shared<K>>,
    workers: ArrayVec<K::Task, MAX_CORES>,
    stage: Stage,
}

impl<K: Kernel> ContentionBench<K> {
    /// Create the completion semaphore, the private queues, and the workers.
    ///
    /// Must be called from a kernel task. The workers get a priority one
    /// level above the caller's. If anything fails, the objects created so far
    /// are released before returning the error.
    pub fn setup(kernel: &K, config: ContentionConfig) -> Result<Self, BenchError> {
        config.validate(kernel.num_cores())?;
        let num_cores = config.num_cores;

        let priority = kernel
            .current_priority()
            .map_err(|e| BenchError::setup("get the caller's priority", e))?
            .raised(1);

        let done_sem = kernel
            .semaphore_create(num_cores as u32, 0)
            .map_err(|e| BenchError::setup("create completion semaphore", e))?;

        let mut queues = ArrayVec::new();
        if config.workload == Workload::QueueFill {
            for _ in 0..num_cores {
                match kernel.queue_create(config.queue_capacity) {
                    Ok(queue) => queues.push(queue),
                    Err(e) => {
                        for &queue in queues.iter() {
                            let _ = kernel.queue_delete(queue);
                        }
                        let _ = kernel.semaphore_delete(done_sem);
                        return Err(BenchError::setup("create private queue", e));
                    }
                }
            }
        }

        let shared = Arc::new(Shared {
            kernel: kernel.clone(),
            config,
            queues,
            done_sem,
            acc: PerCoreAccumulator::new(num_cores),
            phases: (0..num_cores)
                .map(|_| AtomicU8::new(WorkerPhase::AwaitingStart as u8))
                .collect(),
            abort: AtomicBool::new(false),
            failure: SpinMutex::new(None),
        });

        let mut this = Self {
            shared,
            workers: ArrayVec::new(),
            stage: Stage::Ready,
        };

        for core in 0..num_cores {
            let shared = Arc::clone(&this.shared);
            let spawned = kernel.spawn(
                "worker",
                Placement::new(core, priority),
                config.stack_size,
                Box::new(move || worker::worker_main(shared, core)),
            );
            match spawned {
                Ok(task) => {
                    log::debug!("spawned worker {task:?} on core {core} (priority {priority})");
                    this.workers.push(task);
                }
                Err(e) => {
                    if let Err(e) = this.release() {
                        log::warn!("releasing a partial setup failed: {e}");
                    }
                    return Err(BenchError::setup("spawn worker", e));
                }
            }
        }

        Ok(this)
    }

    /// Run all rounds and aggregate the results.
    ///
    /// Must be called from the task that called [`Self::setup`]. Can only be
    /// called once.
    pub fn run(&mut self) -> Result<ContentionReport, BenchError> {
        if self.stage != Stage::Ready {
            return Err(BenchError::setup(
                "run a benchmark more than once",
                ResultCode::BadObjectState,
            ));
        }
        self.stage = Stage::Ran;

        orchestrator::run_rounds(&self.shared, &self.workers)?;

        Ok(aggregate(
            &self.shared.config,
            K::UNIT,
            &self.shared.acc,
        ))
    }

    pub fn config(&self) -> &ContentionConfig {
        &self.shared.config
    }

    /// Get the worker tasks, in core-index order.
    pub fn workers(&self) -> &[K::Task] {
        &self.workers
    }

    pub fn worker_phase(&self, core: CoreId) -> WorkerPhase {
        self.shared.phase(core)
    }

    /// Get the private queue of a core. Returns `None` if the workload doesn't
    /// use queues.
    pub fn queue(&self, core: CoreId) -> Option<K::Queue> {
        self.shared.queues.get(core).copied()
    }

    /// Stop the workers, wait until every one of them has suspended itself,
    /// and delete the workers, the queues, and the semaphore.
    pub fn teardown(mut self) -> Result<(), BenchError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), BenchError> {
        if self.stage == Stage::Released {
            return Ok(());
        }
        self.stage = Stage::Released;

        let kernel = &self.shared.kernel;
        let mut first_error = None;
        let mut check = |result: Result<(), BenchError>| {
            if let Err(e) = result {
                log::warn!("{e}");
                first_error.get_or_insert(e);
            }
        };

        // Wake up any worker still waiting for a round. It will see `abort`
        // and suspend itself. A surplus notification to a worker that already
        // left its loop has no effect.
        self.shared.abort.store(true, Ordering::Release);
        for (core, &task) in self.workers.iter().enumerate() {
            if self.shared.phase(core) != WorkerPhase::AwaitingDeletion {
                check(
                    kernel
                        .notify_give(task)
                        .map_err(|e| BenchError::teardown("wake up worker", e)),
                );
            }
        }

        for &task in self.workers.iter() {
            check(wait_suspended(kernel, task));
            check(
                kernel
                    .delete_task(task)
                    .map_err(|e| BenchError::teardown("delete worker", e)),
            );
        }
        self.workers.clear();

        for &queue in self.shared.queues.iter() {
            check(
                kernel
                    .queue_delete(queue)
                    .map_err(|e| BenchError::teardown("delete private queue", e)),
            );
        }

        check(
            kernel
                .semaphore_delete(self.shared.done_sem)
                .map_err(|e| BenchError::teardown("delete completion semaphore", e)),
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<K: Kernel> Drop for ContentionBench<K> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::error!("contention benchmark teardown failed: {e}");
        }
    }
}

/// Wait until a worker has suspended itself. A worker that never gets there
/// makes this wait forever.
fn wait_suspended<K: Kernel>(kernel: &K, task: K::Task) -> Result<(), BenchError> {
    loop {
        match kernel.task_state(task) {
            Ok(TaskState::Suspended) => return Ok(()),
            Ok(_) => kernel.yield_cpu(),
            Err(e) => return Err(BenchError::teardown("query worker state", e)),
        }
    }
}

/// Set up a contention benchmark, run it, and tear it down. The teardown
/// happens even if the run fails.
pub fn run_contention<K: Kernel>(
    kernel: &K,
    config: ContentionConfig,
) -> Result<ContentionReport, BenchError> {
    let mut bench = ContentionBench::setup(kernel, config)?;
    let result = bench.run();
    let released = bench.teardown();
    let report = result?;
    released?;
    Ok(report)
}

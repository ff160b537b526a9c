//! A hosted implementation of [`syncbench::Kernel`].
//!
//! Every task is a host thread. A task placed on core `i` is pinned to host CPU
//! `i` where the platform allows it. Failing that, the task runs unpinned
//! and a warning is logged. Priorities are recorded but not enforced; the host
//! scheduler decides who runs.
//!
//! The kernel objects are built on [`crossbeam::channel`]:
//!
//!  - A task notification is a token in an unbounded channel.
//!  - A queue is a bounded channel of items.
//!  - A counting semaphore is a bounded channel of permits.
//!
//! The critical section is a single spinlock per kernel, shared by all cores.
//!
//! Kernel services that identify the calling task (e.g.,
//! [`Kernel::current_core`]) only work on tasks. Use [`StdKernel::run`] to start
//! the first one.
#![deny(unsafe_op_in_unsafe_fn)]
use once_cell::sync::Lazy;
use slab::Slab;
use spin::Mutex as SpinMutex;
use std::{
    any::Any,
    num::NonZeroUsize,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread,
    time::Instant,
};
use syncbench::{
    error::{
        CreateObjectError, CurrentTaskError, DeleteTaskError, NotifyGiveError, NotifyTakeError,
        ObjectError, QueuePollError, QueueReceiveError, QueueSendError, SignalSemaphoreError,
        SpawnTaskError, SuspendTaskError, TaskStateError, WaitSemaphoreError,
    },
    kernel::{CoreId, Kernel, Placement, Priority, QueueItem, TaskEntry, TaskState},
    time::{CycleCounter, Cycles},
};

#[cfg(target_os = "linux")]
#[path = "threading_linux.rs"]
mod threading;
#[cfg(not(target_os = "linux"))]
#[path = "threading_unsupported.rs"]
mod threading;

#[cfg(test)]
mod kernel_test;

mod queue;
mod semaphore;
mod task;

use self::{queue::QueueCb, semaphore::SemaphoreCb, task::TaskCb};

/// Used by the benchmark runners
#[doc(hidden)]
pub extern crate env_logger;

/// The minimum stack size of a task thread. Smaller requests are rounded up
/// because host code (e.g., logging) needs more stack than an RTOS task.
pub const MIN_THREAD_STACK_SIZE: usize = 256 * 1024;

/// The priority of the task started by [`StdKernel::run`].
pub const MAIN_TASK_PRIORITY: Priority = Priority(4);

/// The time origin of [`CycleCounter::now`]. Shared by every kernel instance.
static ORIGIN: Lazy<Instant> = Lazy::new(Instant::now);

/// A handle to a task of [`StdKernel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(NonZeroUsize);

/// A handle to a queue of [`StdKernel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueId(NonZeroUsize);

/// A handle to a semaphore of [`StdKernel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SemaphoreId(NonZeroUsize);

fn key_to_id(key: usize) -> NonZeroUsize {
    NonZeroUsize::new(key.wrapping_add(1)).unwrap_or(NonZeroUsize::MAX)
}

fn id_to_key(id: NonZeroUsize) -> usize {
    id.get() - 1
}

/// A hosted kernel instance. Cloning produces another handle to the same
/// instance.
#[derive(Clone)]
pub struct StdKernel {
    inner: Arc<Inner>,
}

struct Inner {
    num_cores: usize,
    tasks: SpinMutex<Slab<Arc<TaskCb>>>,
    queues: SpinMutex<Slab<Arc<QueueCb>>>,
    semaphores: SpinMutex<Slab<Arc<SemaphoreCb>>>,
    /// Held while any task is in the critical section
    cpu_lock: SpinMutex<()>,
    /// The payload of the first panic in a spawned task
    task_panic: SpinMutex<Option<Box<dyn Any + Send>>>,
}

impl std::fmt::Debug for StdKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("StdKernel")
            .field("num_cores", &self.inner.num_cores)
            .field("num_tasks", &self.inner.tasks.lock().len())
            .field("num_queues", &self.inner.queues.lock().len())
            .field("num_semaphores", &self.inner.semaphores.lock().len())
            .finish()
    }
}

impl StdKernel {
    /// Construct a kernel instance with `num_cores` cores.
    pub fn new(num_cores: usize) -> Self {
        Lazy::force(&ORIGIN);
        Self {
            inner: Arc::new(Inner {
                num_cores,
                tasks: SpinMutex::new(Slab::new()),
                queues: SpinMutex::new(Slab::new()),
                semaphores: SpinMutex::new(Slab::new()),
                cpu_lock: SpinMutex::new(()),
                task_panic: SpinMutex::new(None),
            }),
        }
    }

    /// Run `f` in a new task on core 0 with [`MAIN_TASK_PRIORITY`] and wait
    /// for its completion.
    ///
    /// A panic in `f`, or in any task spawned while `f` was running, is
    /// propagated to the caller.
    pub fn run<R: Send>(&self, f: impl FnOnce(&Self) -> R + Send) -> Result<R, SpawnTaskError> {
        let placement = Placement::new(0, MAIN_TASK_PRIORITY);
        let cb = Arc::new(TaskCb::new("main", placement));

        let output = thread::scope(|s| {
            let handle = thread::Builder::new()
                .name("main@0".to_owned())
                .stack_size(MIN_THREAD_STACK_SIZE)
                .spawn_scoped(s, || {
                    enter_task(cb);
                    f(self)
                })
                .map_err(|e| {
                    log::error!("failed to spawn the main task: {e}");
                    SpawnTaskError::NoResource
                })?;

            Ok::<_, SpawnTaskError>(handle.join())
        })?;

        let output = match output {
            Ok(x) => x,
            Err(payload) => panic::resume_unwind(payload),
        };

        if let Some(payload) = self.inner.task_panic.lock().take() {
            panic::resume_unwind(payload);
        }

        Ok(output)
    }

    /// Get the number of live tasks, queues, and semaphores. The task started
    /// by [`Self::run`] is not included.
    pub fn object_counts(&self) -> (usize, usize, usize) {
        (
            self.inner.tasks.lock().len(),
            self.inner.queues.lock().len(),
            self.inner.semaphores.lock().len(),
        )
    }

    fn task_cb(&self, task: TaskId) -> Option<Arc<TaskCb>> {
        self.inner.tasks.lock().get(id_to_key(task.0)).cloned()
    }

    fn queue_cb(&self, queue: QueueId) -> Result<Arc<QueueCb>, ObjectError> {
        self.inner
            .queues
            .lock()
            .get(id_to_key(queue.0))
            .cloned()
            .ok_or(ObjectError::BadId)
    }

    fn semaphore_cb(&self, sem: SemaphoreId) -> Result<Arc<SemaphoreCb>, ObjectError> {
        self.inner
            .semaphores
            .lock()
            .get(id_to_key(sem.0))
            .cloned()
            .ok_or(ObjectError::BadId)
    }
}

/// Set up the calling thread as the task `cb`.
fn enter_task(cb: Arc<TaskCb>) {
    let cpu = cb.placement.core;
    if let Err(e) = threading::pin_current_thread(cpu) {
        log::warn!("could not pin task '{}' to CPU {cpu}: {e}", cb.name);
    }
    task::set_current(Some(cb));
}

impl CycleCounter for StdKernel {
    const UNIT: &'static str = "ns";

    /// Get the nanoseconds elapsed since [`ORIGIN`], truncated to 32 bits.
    #[inline]
    fn now(&self) -> Cycles {
        ORIGIN.elapsed().as_nanos() as Cycles
    }
}

impl Kernel for StdKernel {
    type Task = TaskId;
    type Queue = QueueId;
    type Semaphore = SemaphoreId;

    fn num_cores(&self) -> usize {
        self.inner.num_cores
    }

    fn current_core(&self) -> Result<CoreId, CurrentTaskError> {
        Ok(task::current()?.placement.core)
    }

    fn current_priority(&self) -> Result<Priority, CurrentTaskError> {
        Ok(task::current()?.placement.priority)
    }

    fn spawn(
        &self,
        name: &'static str,
        placement: Placement,
        stack_size: usize,
        entry: TaskEntry,
    ) -> Result<TaskId, SpawnTaskError> {
        if placement.core >= self.inner.num_cores {
            return Err(SpawnTaskError::BadParam);
        }

        let cb = Arc::new(TaskCb::new(name, placement));
        let key = self.inner.tasks.lock().insert(Arc::clone(&cb));

        let kernel = self.clone();
        let cb2 = Arc::clone(&cb);
        let spawned = thread::Builder::new()
            .name(format!("{name}@{}", placement.core))
            .stack_size(stack_size.max(MIN_THREAD_STACK_SIZE))
            .spawn(move || {
                let name = cb2.name;
                enter_task(Arc::clone(&cb2));

                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(entry)) {
                    log::error!("task '{name}' panicked");
                    kernel.inner.task_panic.lock().get_or_insert(payload);
                }

                // A task that returns without being deleted is dormant from
                // now on, which is indistinguishable from being suspended
                task::set_current(None);
                cb2.set_state(TaskState::Suspended);
            });

        match spawned {
            Ok(join_handle) => {
                *cb.join_handle.lock() = Some(join_handle);
                log::trace!("spawned task '{name}' as #{key} ({placement:?})");
                Ok(TaskId(key_to_id(key)))
            }
            Err(e) => {
                log::warn!("failed to spawn task '{name}': {e}");
                self.inner.tasks.lock().remove(key);
                Err(SpawnTaskError::NoResource)
            }
        }
    }

    fn task_state(&self, task: TaskId) -> Result<TaskState, TaskStateError> {
        self.task_cb(task)
            .map(|cb| cb.state())
            .ok_or(TaskStateError::BadId)
    }

    fn suspend_current(&self) -> Result<(), SuspendTaskError> {
        task::suspend_current()
    }

    fn delete_task(&self, task: TaskId) -> Result<(), DeleteTaskError> {
        let cb = {
            let mut tasks = self.inner.tasks.lock();
            let key = id_to_key(task.0);
            let cb = tasks.get(key).ok_or(DeleteTaskError::BadId)?;
            if let Ok(current) = task::current() {
                if Arc::ptr_eq(cb, &current) {
                    return Err(DeleteTaskError::BadContext);
                }
            }
            if cb.state() != TaskState::Suspended {
                return Err(DeleteTaskError::BadObjectState);
            }
            tasks.remove(key)
        };

        cb.release_deleted();

        let join_handle = cb.join_handle.lock().take();
        if let Some(join_handle) = join_handle {
            // A panic was already recorded by the thread itself
            let _ = join_handle.join();
        }

        log::trace!("deleted task '{}'", cb.name);
        Ok(())
    }

    fn yield_cpu(&self) {
        thread::yield_now();
    }

    fn notify_give(&self, task: TaskId) -> Result<(), NotifyGiveError> {
        self.task_cb(task)
            .ok_or(NotifyGiveError::BadId)?
            .notify();
        Ok(())
    }

    fn notify_take(&self) -> Result<u32, NotifyTakeError> {
        task::notify_take()
    }

    fn queue_create(&self, capacity: usize) -> Result<QueueId, CreateObjectError> {
        let cb = Arc::new(QueueCb::new(capacity)?);
        let key = self.inner.queues.lock().insert(Arc::clone(&cb));
        log::trace!("created queue #{key} (capacity = {})", cb.capacity());
        Ok(QueueId(key_to_id(key)))
    }

    fn queue_try_send(&self, queue: QueueId, item: QueueItem) -> Result<(), QueueSendError> {
        self.queue_cb(queue)
            .map_err(|_| QueueSendError::BadId)?
            .try_send(item)
    }

    fn queue_try_receive(&self, queue: QueueId) -> Result<QueueItem, QueuePollError> {
        self.queue_cb(queue)
            .map_err(|_| QueuePollError::BadId)?
            .try_receive()
    }

    fn queue_receive(&self, queue: QueueId) -> Result<QueueItem, QueueReceiveError> {
        self.queue_cb(queue)
            .map_err(|_| QueueReceiveError::BadId)?
            .receive()
    }

    fn queue_reset(&self, queue: QueueId) -> Result<(), ObjectError> {
        self.queue_cb(queue)?.reset();
        Ok(())
    }

    fn queue_len(&self, queue: QueueId) -> Result<usize, ObjectError> {
        Ok(self.queue_cb(queue)?.len())
    }

    fn queue_delete(&self, queue: QueueId) -> Result<(), ObjectError> {
        self.inner
            .queues
            .lock()
            .try_remove(id_to_key(queue.0))
            .map(drop)
            .ok_or(ObjectError::BadId)
    }

    fn semaphore_create(&self, maximum: u32, initial: u32) -> Result<SemaphoreId, CreateObjectError> {
        let cb = Arc::new(SemaphoreCb::new(maximum, initial)?);
        let key = self.inner.semaphores.lock().insert(Arc::clone(&cb));
        log::trace!(
            "created semaphore #{key} ({}/{})",
            cb.get(),
            cb.maximum()
        );
        Ok(SemaphoreId(key_to_id(key)))
    }

    fn semaphore_signal_one(&self, sem: SemaphoreId) -> Result<(), SignalSemaphoreError> {
        self.semaphore_cb(sem)
            .map_err(|_| SignalSemaphoreError::BadId)?
            .signal_one()
    }

    fn semaphore_wait_one(&self, sem: SemaphoreId) -> Result<(), WaitSemaphoreError> {
        self.semaphore_cb(sem)
            .map_err(|_| WaitSemaphoreError::BadId)?
            .wait_one()
    }

    fn semaphore_get(&self, sem: SemaphoreId) -> Result<u32, ObjectError> {
        Ok(self.semaphore_cb(sem)?.get())
    }

    fn semaphore_delete(&self, sem: SemaphoreId) -> Result<(), ObjectError> {
        self.inner
            .semaphores
            .lock()
            .try_remove(id_to_key(sem.0))
            .map(drop)
            .ok_or(ObjectError::BadId)
    }

    fn enter_critical(&self) {
        // The guard is released by `exit_critical`
        std::mem::forget(self.inner.cpu_lock.lock());
    }

    unsafe fn exit_critical(&self) {
        // Safety: The caller holds the lock acquired by `enter_critical`
        unsafe { self.inner.cpu_lock.force_unlock() };
    }
}

//! The kernel services the benchmarks consume.
//!
//! The benchmarks don't implement any scheduling or synchronization by
//! themselves. Everything they measure or coordinate with goes through
//! [`Kernel`], which a port provides for a concrete RTOS (or, in the case of
//! `syncbench_port_std`, for a hosted simulation).
use alloc::boxed::Box;
use core::fmt;

use crate::{
    error::{
        CreateObjectError, CurrentTaskError, DeleteTaskError, NotifyGiveError, NotifyTakeError,
        ObjectError, QueuePollError, QueueReceiveError, QueueSendError, SignalSemaphoreError,
        SpawnTaskError, SuspendTaskError, TaskStateError, WaitSemaphoreError,
    },
    time::CycleCounter,
};

/// Identifies an execution unit (a processor core).
pub type CoreId = usize;

/// The item type carried by a queue created by [`Kernel::queue_create`].
pub type QueueItem = u32;

/// A task priority. Larger values are more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Priority(pub u8);

impl Priority {
    /// Get a priority `levels` steps more urgent than `self`, saturating at
    /// the most urgent level.
    #[inline]
    pub const fn raised(self, levels: u8) -> Self {
        Self(self.0.saturating_add(levels))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The placement descriptor of a task: the core the task is pinned to and the
/// priority it runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placement {
    pub core: CoreId,
    pub priority: Priority,
}

impl Placement {
    #[inline]
    pub const fn new(core: CoreId, priority: Priority) -> Self {
        Self { core, priority }
    }
}

/// The externally visible state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// The task is running or ready to run.
    Ready,
    /// The task is blocked on a notification, a queue, or a semaphore.
    Blocked,
    /// The task has suspended itself and is awaiting deletion.
    Suspended,
}

/// The entry point of a task.
pub type TaskEntry = Box<dyn FnOnce() + Send + 'static>;

/// The capability interface of a multi-core preemptive kernel.
///
/// A value of this type is a handle to a running kernel instance. Cloning it
/// must be cheap; task entry points capture clones to reach the kernel.
///
/// Methods documented as *blocking* wait without a timeout. If the awaited
/// event never happens, the calling task never returns.
pub trait Kernel: CycleCounter + Clone + Send + Sync + 'static {
    /// Identifies a task.
    type Task: Copy + Eq + fmt::Debug + Send + Sync + 'static;
    /// Identifies a bounded FIFO queue of [`QueueItem`]s.
    type Queue: Copy + Eq + fmt::Debug + Send + Sync + 'static;
    /// Identifies a counting semaphore.
    type Semaphore: Copy + Eq + fmt::Debug + Send + Sync + 'static;

    /// Get the number of cores. Valid core indices are `0..num_cores()`.
    fn num_cores(&self) -> usize;

    /// Get the core the calling task is pinned to.
    fn current_core(&self) -> Result<CoreId, CurrentTaskError>;

    /// Get the priority of the calling task.
    fn current_priority(&self) -> Result<Priority, CurrentTaskError>;

    /// Create a task pinned to `placement.core` and make it ready.
    fn spawn(
        &self,
        name: &'static str,
        placement: Placement,
        stack_size: usize,
        entry: TaskEntry,
    ) -> Result<Self::Task, SpawnTaskError>;

    /// Get the state of a task.
    fn task_state(&self, task: Self::Task) -> Result<TaskState, TaskStateError>;

    /// Suspend the calling task until it's deleted by [`Self::delete_task`].
    ///
    /// Returns after the deletion. The task's entry point must return
    /// immediately after that without using the kernel again.
    fn suspend_current(&self) -> Result<(), SuspendTaskError>;

    /// Delete a task that has suspended itself by [`Self::suspend_current`].
    ///
    /// Fails with [`DeleteTaskError::BadObjectState`] if the task is in any
    /// other state.
    fn delete_task(&self, task: Self::Task) -> Result<(), DeleteTaskError>;

    /// Yield the processor to other ready tasks of the same priority.
    fn yield_cpu(&self);

    /// Increment the notification count of a task.
    fn notify_give(&self, task: Self::Task) -> Result<(), NotifyGiveError>;

    /// Wait (blocking) until the calling task's notification count is
    /// non-zero, then clear it and return the count before clearing.
    fn notify_take(&self) -> Result<u32, NotifyTakeError>;

    /// Create an empty queue that can hold `capacity` items.
    fn queue_create(&self, capacity: usize) -> Result<Self::Queue, CreateObjectError>;

    /// Append an item without blocking.
    fn queue_try_send(&self, queue: Self::Queue, item: QueueItem) -> Result<(), QueueSendError>;

    /// Remove the oldest item without blocking.
    fn queue_try_receive(&self, queue: Self::Queue) -> Result<QueueItem, QueuePollError>;

    /// Remove the oldest item, waiting (blocking) until there is one.
    fn queue_receive(&self, queue: Self::Queue) -> Result<QueueItem, QueueReceiveError>;

    /// Discard all items in the queue without deleting it.
    fn queue_reset(&self, queue: Self::Queue) -> Result<(), ObjectError>;

    /// Get the number of items currently in the queue.
    fn queue_len(&self, queue: Self::Queue) -> Result<usize, ObjectError>;

    /// Delete a queue.
    fn queue_delete(&self, queue: Self::Queue) -> Result<(), ObjectError>;

    /// Create a counting semaphore.
    fn semaphore_create(
        &self,
        maximum: u32,
        initial: u32,
    ) -> Result<Self::Semaphore, CreateObjectError>;

    /// Increment the semaphore's count.
    fn semaphore_signal_one(&self, sem: Self::Semaphore) -> Result<(), SignalSemaphoreError>;

    /// Wait (blocking) until the semaphore's count is non-zero, then decrement
    /// it.
    fn semaphore_wait_one(&self, sem: Self::Semaphore) -> Result<(), WaitSemaphoreError>;

    /// Get the semaphore's count.
    fn semaphore_get(&self, sem: Self::Semaphore) -> Result<u32, ObjectError>;

    /// Delete a semaphore.
    fn semaphore_delete(&self, sem: Self::Semaphore) -> Result<(), ObjectError>;

    /// Enter the kernel's critical section, spinning while another core holds
    /// it. The critical section doesn't nest.
    fn enter_critical(&self);

    /// Leave the critical section.
    ///
    /// # Safety
    ///
    /// The calling task must be the one that entered the critical section by
    /// the last call to [`Self::enter_critical`].
    unsafe fn exit_critical(&self);
}

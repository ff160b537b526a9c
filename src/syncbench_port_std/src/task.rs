//! Tasks, backed by one host thread each.
use crossbeam::channel;
use spin::Mutex as SpinMutex;
use std::{cell::RefCell, sync::Arc, thread};
use syncbench::{
    error::{CurrentTaskError, NotifyTakeError, SuspendTaskError},
    kernel::{Placement, TaskState},
};

/// Task control block.
#[derive(Debug)]
pub(crate) struct TaskCb {
    pub(crate) name: &'static str,
    pub(crate) placement: Placement,
    state: SpinMutex<TaskState>,
    notify_send: channel::Sender<()>,
    notify_recv: channel::Receiver<()>,
    /// Receives a token when the task is deleted.
    delete_send: channel::Sender<()>,
    delete_recv: channel::Receiver<()>,
    pub(crate) join_handle: SpinMutex<Option<thread::JoinHandle<()>>>,
}

thread_local! {
    static CURRENT: RefCell<Option<Arc<TaskCb>>> = RefCell::new(None);
}

impl TaskCb {
    pub(crate) fn new(name: &'static str, placement: Placement) -> Self {
        let (notify_send, notify_recv) = channel::unbounded();
        let (delete_send, delete_recv) = channel::bounded(1);
        Self {
            name,
            placement,
            state: SpinMutex::new(TaskState::Ready),
            notify_send,
            notify_recv,
            delete_send,
            delete_recv,
            join_handle: SpinMutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> TaskState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: TaskState) {
        *self.state.lock() = state;
    }

    /// Increment the notification count.
    pub(crate) fn notify(&self) {
        // Can't be disconnected because `self` holds the receiver
        let _ = self.notify_send.send(());
    }

    /// Release a task blocked in [`suspend_current`].
    pub(crate) fn release_deleted(&self) {
        let _ = self.delete_send.try_send(());
    }
}

/// Make `task` the current task of the calling thread.
pub(crate) fn set_current(task: Option<Arc<TaskCb>>) {
    CURRENT.with(|c| *c.borrow_mut() = task);
}

/// Get the current task of the calling thread.
pub(crate) fn current() -> Result<Arc<TaskCb>, CurrentTaskError> {
    CURRENT
        .with(|c| c.borrow().clone())
        .ok_or(CurrentTaskError::BadContext)
}

/// Mark the current task (if any) as blocked while `f` runs.
pub(crate) fn blocking<R>(f: impl FnOnce() -> R) -> R {
    let task = CURRENT.with(|c| c.borrow().clone());
    if let Some(task) = &task {
        task.set_state(TaskState::Blocked);
    }
    let output = f();
    if let Some(task) = &task {
        task.set_state(TaskState::Ready);
    }
    output
}

pub(crate) fn notify_take() -> Result<u32, NotifyTakeError> {
    let task = current().map_err(|_| NotifyTakeError::BadContext)?;

    // Can't be disconnected because `task` holds the sender
    let _ = blocking(|| task.notify_recv.recv());

    let mut count = 1u32;
    while task.notify_recv.try_recv().is_ok() {
        count = count.saturating_add(1);
    }
    log::trace!("{}: took {count} notification(s)", task.name);
    Ok(count)
}

pub(crate) fn suspend_current() -> Result<(), SuspendTaskError> {
    let task = current().map_err(|_| SuspendTaskError::BadContext)?;
    log::trace!("{}: suspended", task.name);

    task.set_state(TaskState::Suspended);
    let _ = task.delete_recv.recv();

    set_current(None);
    Ok(())
}

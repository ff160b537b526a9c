use alloc::sync::Arc;
use core::sync::atomic::Ordering;

use super::{Shared, WorkerPhase};
use crate::{
    config::Workload,
    error::{BenchError, Site},
    kernel::{CoreId, Kernel, QueueItem},
    sample::{OpKind, Sample},
    time::elapsed,
};

/// The entry point of the worker pinned to `core`.
pub(super) fn worker_main<K: Kernel>(shared: Arc<Shared<K>>, core: CoreId) {
    let kernel = &shared.kernel;

    for round in 0..shared.config.rounds {
        let site = Site::none().core(core).round(round);

        if let Err(e) = kernel.notify_take() {
            shared.fail(BenchError::operational("take start notification", site, e));
            // The orchestrator is waiting for this round's signal
            let _ = kernel.semaphore_signal_one(shared.done_sem);
            break;
        }

        if shared.abort.load(Ordering::Acquire) {
            break;
        }

        shared.set_phase(core, WorkerPhase::TimedBurst);
        let result = match shared.config.workload {
            Workload::QueueFill => fill_queue(&shared, core, site),
            Workload::CriticalSection => cycle_critical_section(&shared, core),
        };

        shared.set_phase(core, WorkerPhase::Reporting);
        let reset = reset_queue(&shared, core, site);
        let result = result.and(reset);
        let failed = result.is_err();
        if let Err(e) = result {
            shared.fail(e);
        }

        if let Err(e) = kernel.semaphore_signal_one(shared.done_sem) {
            shared.fail(BenchError::operational("signal completion", site, e));
            break;
        }

        if failed {
            break;
        }
        shared.set_phase(core, WorkerPhase::AwaitingStart);
    }

    shared.set_phase(core, WorkerPhase::AwaitingDeletion);

    // Returns when the orchestrator deletes this task
    if let Err(e) = kernel.suspend_current() {
        log::error!("worker {core} failed to suspend itself: {e}");
    }
}

/// Send `items_per_round` items into the core's private queue. A send that
/// fails ends the burst; the operations completed before it are still
/// counted.
fn fill_queue<K: Kernel>(shared: &Shared<K>, core: CoreId, site: Site) -> Result<(), BenchError> {
    let kernel = &shared.kernel;
    let queue = shared.queues[core];
    let items = shared.config.items_per_round;

    let t0 = kernel.now();
    for item in 0..items {
        if let Err(e) = kernel.queue_try_send(queue, item as QueueItem) {
            shared.acc.add_operations(core, item as u64);
            return Err(BenchError::operational("queue send", site.item(item), e));
        }
    }
    let t1 = kernel.now();

    shared.acc.record(Sample {
        core,
        kind: OpKind::Burst,
        cycles: elapsed(t0, t1),
    });
    shared.acc.add_operations(core, items as u64);
    Ok(())
}

/// Enter and leave the critical section `items_per_round` times.
fn cycle_critical_section<K: Kernel>(shared: &Shared<K>, core: CoreId) -> Result<(), BenchError> {
    let kernel = &shared.kernel;
    let items = shared.config.items_per_round;

    let t0 = kernel.now();
    for _ in 0..items {
        kernel.enter_critical();
        // Safety: We entered it just above
        unsafe { kernel.exit_critical() };
    }
    let t1 = kernel.now();

    shared.acc.record(Sample {
        core,
        kind: OpKind::Burst,
        cycles: elapsed(t0, t1),
    });
    shared.acc.add_operations(core, items as u64);
    Ok(())
}

/// Empty the core's private queue so that the next round starts from zero
/// occupancy. Does nothing if the workload uses no queue.
fn reset_queue<K: Kernel>(shared: &Shared<K>, core: CoreId, site: Site) -> Result<(), BenchError> {
    match shared.queues.get(core) {
        Some(&queue) => shared
            .kernel
            .queue_reset(queue)
            .map_err(|e| BenchError::operational("queue reset", site, e)),
        None => Ok(()),
    }
}

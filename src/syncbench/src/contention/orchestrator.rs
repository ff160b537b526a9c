use crate::{
    error::{BenchError, ResultCode, Site},
    kernel::{CoreId, Kernel},
};

use super::Shared;

/// Get the order in which the workers are started in each round: every core
/// other than `own_core` in increasing index order, followed by `own_core`.
///
/// If `own_core` is not one of the benchmarked cores, it's plain index order.
pub fn start_order(num_cores: usize, own_core: CoreId) -> impl Iterator<Item = CoreId> + Clone {
    (0..num_cores)
        .filter(move |&core| core != own_core)
        .chain((own_core < num_cores).then(|| own_core))
}

/// Drive all rounds from the calling task.
pub(super) fn run_rounds<K: Kernel>(
    shared: &Shared<K>,
    workers: &[K::Task],
) -> Result<(), BenchError> {
    let kernel = &shared.kernel;
    let config = &shared.config;
    let num_cores = config.num_cores;

    let own_core = kernel
        .current_core()
        .map_err(|e| BenchError::operational("get the orchestrator's core", Site::none(), e))?;

    log::debug!(
        "running {} rounds of {} items on {num_cores} cores from core {own_core}",
        config.rounds,
        config.items_per_round,
    );

    for round in 0..config.rounds {
        let site = Site::none().round(round);

        // Every queue must be empty at the start of a round
        for (core, &queue) in shared.queues.iter().enumerate() {
            let len = kernel
                .queue_len(queue)
                .map_err(|e| BenchError::operational("queue length", site.core(core), e))?;
            if len != 0 {
                return Err(BenchError::operational(
                    "queue not empty at round start",
                    site.core(core),
                    ResultCode::BadObjectState,
                ));
            }
        }

        for core in start_order(num_cores, own_core) {
            kernel
                .notify_give(workers[core])
                .map_err(|e| BenchError::operational("start worker", site.core(core), e))?;
        }

        for _ in 0..num_cores {
            kernel
                .semaphore_wait_one(shared.done_sem)
                .map_err(|e| BenchError::operational("wait for completion", site, e))?;
        }

        // No worker can signal for the next round before it's started, so any
        // leftover permit is a surplus signal from this round
        let surplus = kernel
            .semaphore_get(shared.done_sem)
            .map_err(|e| BenchError::operational("completion count", site, e))?;
        if surplus != 0 {
            return Err(BenchError::operational(
                "surplus completion signal",
                site,
                ResultCode::BadObjectState,
            ));
        }

        if let Some(e) = shared.take_failure() {
            return Err(e);
        }

        log::trace!("round {round} complete");
    }

    Ok(())
}

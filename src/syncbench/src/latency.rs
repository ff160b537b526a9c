//! Single-unit latency benchmarks.
//!
//! Each benchmark times one primitive operation at a time on the calling
//! task, with nothing else contending for it:
//!
//! ```text
//!      t0 = now()
//!      <one primitive operation>        ┐ sample
//!      t1 = now()                       ┘
//! ```
//!
//! A primitive that fails is a fatal benchmark failure. The objects are sized
//! so that none of the operations can legitimately fail.
use crate::{
    config::LatencyConfig,
    error::{BenchError, Site},
    kernel::{Kernel, QueueItem},
    report::LatencyReport,
    sample::{OpAccumulator, OpKind},
    time::measure,
};

/// Measure entering and leaving the kernel's critical section.
pub fn critical_section_speed<K: Kernel>(
    kernel: &K,
    config: &LatencyConfig,
) -> Result<LatencyReport, BenchError> {
    config.validate()?;

    let mut enter = OpAccumulator::new(OpKind::Enter);
    let mut exit = OpAccumulator::new(OpKind::Exit);

    for _ in 0..config.samples {
        let ((), dt) = measure(kernel, || kernel.enter_critical());
        enter.record(dt);

        // Safety: We entered it just above
        let ((), dt) = measure(kernel, || unsafe { kernel.exit_critical() });
        exit.record(dt);
    }

    Ok(LatencyReport::from_accumulators(K::UNIT, &[enter, exit]))
}

/// Measure non-blocking sends into a queue, followed by non-blocking receives
/// from it.
///
/// The queue must be able to hold every sample, or a send fails.
pub fn queue_speed<K: Kernel>(
    kernel: &K,
    config: &LatencyConfig,
) -> Result<LatencyReport, BenchError> {
    config.validate()?;

    let queue = kernel
        .queue_create(config.queue_capacity)
        .map_err(|e| BenchError::setup("create queue", e))?;
    log::debug!("created queue {queue:?} (capacity = {})", config.queue_capacity);

    let result = queue_speed_inner(kernel, config, queue);

    let deleted = kernel
        .queue_delete(queue)
        .map_err(|e| BenchError::teardown("delete queue", e));

    let report = result?;
    deleted?;
    Ok(report)
}

fn queue_speed_inner<K: Kernel>(
    kernel: &K,
    config: &LatencyConfig,
    queue: K::Queue,
) -> Result<LatencyReport, BenchError> {
    let mut send = OpAccumulator::new(OpKind::Send);
    let mut receive = OpAccumulator::new(OpKind::Receive);

    for i in 0..config.samples {
        let (result, dt) = measure(kernel, || kernel.queue_try_send(queue, i as QueueItem));
        result.map_err(|e| BenchError::operational("queue send", Site::none().item(i), e))?;
        send.record(dt);
    }

    for i in 0..config.samples {
        let (result, dt) = measure(kernel, || kernel.queue_try_receive(queue));
        result.map_err(|e| BenchError::operational("queue receive", Site::none().item(i), e))?;
        receive.record(dt);
    }

    Ok(LatencyReport::from_accumulators(K::UNIT, &[send, receive]))
}

/// Measure signaling a semaphore and waiting on it when it has a permit, so
/// that neither operation blocks.
pub fn semaphore_speed<K: Kernel>(
    kernel: &K,
    config: &LatencyConfig,
) -> Result<LatencyReport, BenchError> {
    config.validate()?;

    let sem = kernel
        .semaphore_create(1, 0)
        .map_err(|e| BenchError::setup("create semaphore", e))?;
    log::debug!("created semaphore {sem:?}");

    let result = semaphore_speed_inner(kernel, config, sem);

    let deleted = kernel
        .semaphore_delete(sem)
        .map_err(|e| BenchError::teardown("delete semaphore", e));

    let report = result?;
    deleted?;
    Ok(report)
}

fn semaphore_speed_inner<K: Kernel>(
    kernel: &K,
    config: &LatencyConfig,
    sem: K::Semaphore,
) -> Result<LatencyReport, BenchError> {
    let mut signal = OpAccumulator::new(OpKind::Signal);
    let mut wait = OpAccumulator::new(OpKind::Wait);

    for i in 0..config.samples {
        let (result, dt) = measure(kernel, || kernel.semaphore_signal_one(sem));
        result.map_err(|e| BenchError::operational("semaphore signal", Site::none().item(i), e))?;
        signal.record(dt);

        let (result, dt) = measure(kernel, || kernel.semaphore_wait_one(sem));
        result.map_err(|e| BenchError::operational("semaphore wait", Site::none().item(i), e))?;
        wait.record(dt);
    }

    Ok(LatencyReport::from_accumulators(K::UNIT, &[signal, wait]))
}

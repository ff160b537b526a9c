//! Test cases for `StdKernel`'s task services
use assert_matches::assert_matches;
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    thread::sleep,
    time::Duration,
};
use syncbench::{
    error::{CurrentTaskError, DeleteTaskError, NotifyTakeError, SpawnTaskError},
    kernel::{Kernel, Placement, Priority, TaskState},
};

use super::StdKernel;

fn init_logger() {
    let _ = env_logger::try_init();
}

fn wait_until_suspended(kernel: &StdKernel, task: super::TaskId) {
    while kernel.task_state(task).unwrap() != TaskState::Suspended {
        kernel.yield_cpu();
    }
}

#[test]
fn services_need_a_task() {
    init_logger();
    let kernel = StdKernel::new(2);
    assert_matches!(kernel.current_core(), Err(CurrentTaskError::BadContext));
    assert_matches!(kernel.notify_take(), Err(NotifyTakeError::BadContext));
}

#[test]
fn main_task_placement() {
    init_logger();
    let kernel = StdKernel::new(2);
    let (core, priority) = kernel
        .run(|k| (k.current_core().unwrap(), k.current_priority().unwrap()))
        .unwrap();
    assert_eq!(core, 0);
    assert_eq!(priority, super::MAIN_TASK_PRIORITY);
}

#[test]
fn spawn_rejects_bad_core() {
    init_logger();
    let kernel = StdKernel::new(2);
    assert_matches!(
        kernel.spawn(
            "bad",
            Placement::new(2, Priority(1)),
            4096,
            Box::new(|| {})
        ),
        Err(SpawnTaskError::BadParam)
    );
    assert_eq!(kernel.object_counts(), (0, 0, 0));
}

#[test]
fn spawned_task_sees_its_placement() {
    init_logger();
    let kernel = StdKernel::new(2);
    let seen: &_ = Box::leak(Box::new(AtomicU32::new(u32::MAX)));

    kernel
        .run(|k| {
            let k2 = k.clone();
            let task = k
                .spawn(
                    "child",
                    Placement::new(1, Priority(5)),
                    4096,
                    Box::new(move || {
                        let core = k2.current_core().unwrap();
                        let prio = k2.current_priority().unwrap();
                        seen.store(core as u32 * 100 + prio.0 as u32, Ordering::Relaxed);
                        k2.suspend_current().unwrap();
                    }),
                )
                .unwrap();

            wait_until_suspended(k, task);
            k.delete_task(task).unwrap();
        })
        .unwrap();

    assert_eq!(seen.load(Ordering::Relaxed), 105);
    assert_eq!(kernel.object_counts(), (0, 0, 0));
}

#[test]
fn notifications_accumulate() {
    init_logger();
    let kernel = StdKernel::new(1);
    let taken: &_ = Box::leak(Box::new(AtomicU32::new(0)));
    let go: &_ = Box::leak(Box::new(AtomicBool::new(false)));

    kernel
        .run(|k| {
            let k2 = k.clone();
            let task = k
                .spawn(
                    "taker",
                    Placement::new(0, Priority(5)),
                    4096,
                    Box::new(move || {
                        while !go.load(Ordering::Acquire) {
                            k2.yield_cpu();
                        }
                        taken.store(k2.notify_take().unwrap(), Ordering::Relaxed);
                        k2.suspend_current().unwrap();
                    }),
                )
                .unwrap();

            for _ in 0..3 {
                k.notify_give(task).unwrap();
            }
            go.store(true, Ordering::Release);

            wait_until_suspended(k, task);
            k.delete_task(task).unwrap();
        })
        .unwrap();

    assert_eq!(taken.load(Ordering::Relaxed), 3);
}

#[test]
fn delete_requires_suspension() {
    init_logger();
    let kernel = StdKernel::new(1);

    kernel
        .run(|k| {
            let k2 = k.clone();
            let task = k
                .spawn(
                    "sleeper",
                    Placement::new(0, Priority(5)),
                    4096,
                    Box::new(move || {
                        k2.notify_take().unwrap();
                        k2.suspend_current().unwrap();
                    }),
                )
                .unwrap();

            // Blocked in `notify_take` (or about to be)
            sleep(Duration::from_millis(50));
            assert_matches!(k.delete_task(task), Err(DeleteTaskError::BadObjectState));

            k.notify_give(task).unwrap();
            wait_until_suspended(k, task);
            k.delete_task(task).unwrap();
            assert_matches!(k.delete_task(task), Err(DeleteTaskError::BadId));
        })
        .unwrap();
}

#[test]
fn blocking_state_is_visible() {
    init_logger();
    let kernel = StdKernel::new(1);

    kernel
        .run(|k| {
            let sem = k.semaphore_create(1, 0).unwrap();
            let k2 = k.clone();
            let task = k
                .spawn(
                    "waiter",
                    Placement::new(0, Priority(5)),
                    4096,
                    Box::new(move || {
                        k2.semaphore_wait_one(sem).unwrap();
                        k2.suspend_current().unwrap();
                    }),
                )
                .unwrap();

            while k.task_state(task).unwrap() != TaskState::Blocked {
                k.yield_cpu();
            }
            k.semaphore_signal_one(sem).unwrap();

            wait_until_suspended(k, task);
            k.delete_task(task).unwrap();
            k.semaphore_delete(sem).unwrap();
        })
        .unwrap();

    assert_eq!(kernel.object_counts(), (0, 0, 0));
}

#[test]
fn critical_section_excludes_other_cores() {
    init_logger();
    let kernel = StdKernel::new(2);
    let counter = Arc::new(AtomicU32::new(0));

    kernel
        .run(|k| {
            let mut tasks = Vec::new();
            for core in 0..2 {
                let k2 = k.clone();
                let counter = Arc::clone(&counter);
                tasks.push(
                    k.spawn(
                        "incr",
                        Placement::new(core, Priority(5)),
                        4096,
                        Box::new(move || {
                            for _ in 0..10_000 {
                                k2.enter_critical();
                                // Non-atomic read-modify-write
                                let x = counter.load(Ordering::Relaxed);
                                counter.store(x + 1, Ordering::Relaxed);
                                unsafe { k2.exit_critical() };
                            }
                            k2.suspend_current().unwrap();
                        }),
                    )
                    .unwrap(),
                );
            }

            for task in tasks {
                wait_until_suspended(k, task);
                k.delete_task(task).unwrap();
            }
        })
        .unwrap();

    assert_eq!(counter.load(Ordering::Relaxed), 20_000);
}

#[test]
#[should_panic(expected = "boom")]
fn task_panic_is_propagated() {
    init_logger();
    let kernel = StdKernel::new(1);

    kernel
        .run(|k| {
            let task = k
                .spawn(
                    "panicker",
                    Placement::new(0, Priority(5)),
                    4096,
                    Box::new(|| panic!("boom")),
                )
                .unwrap();
            wait_until_suspended(k, task);
            k.delete_task(task).unwrap();
        })
        .unwrap();
}

#[test]
fn counter_advances() {
    use syncbench::time::{elapsed, CycleCounter};
    let kernel = StdKernel::new(1);
    let t0 = kernel.now();
    sleep(Duration::from_millis(2));
    let dt = elapsed(t0, kernel.now());
    assert!(dt >= 1_000_000, "{dt}");
}

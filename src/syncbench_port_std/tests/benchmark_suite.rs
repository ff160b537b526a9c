//! Runs the benchmarks defined in `syncbench` on the hosted kernel.
use assert_matches::assert_matches;
use syncbench::{
    cases::{benchmark_cases, find_case, run_case},
    config::{ContentionConfig, LatencyConfig, Workload, NUM_ITEMS, NUM_SAMPLES},
    contention::{run_contention, ContentionBench, WorkerPhase},
    error::{BenchError, DeleteTaskError, ResultCode},
    kernel::{Kernel, TaskState},
    latency::{critical_section_speed, queue_speed, semaphore_speed},
    sample::OpKind,
};
use syncbench_port_std::StdKernel;

struct BenchTestUtil {
    num_cores: usize,
}

impl BenchTestUtil {
    const fn new(num_cores: usize) -> Self {
        Self { num_cores }
    }

    /// Run `func` on a fresh kernel's main task and check that it hasn't
    /// leaked any kernel objects.
    fn run<R: Send>(&self, func: impl FnOnce(&StdKernel) -> R + Send) -> R {
        let _ = env_logger::try_init();

        let kernel = StdKernel::new(self.num_cores);
        let output = kernel.run(func).unwrap();
        assert_eq!(kernel.object_counts(), (0, 0, 0), "leaked kernel objects");
        output
    }
}

static DUAL_CORE: BenchTestUtil = BenchTestUtil::new(2);

#[test]
fn queue_contention_full_size() {
    let report = DUAL_CORE.run(|k| run_contention(k, ContentionConfig::new()).unwrap());

    assert_eq!(report.rounds(), NUM_SAMPLES);
    assert_eq!(report.items_per_round(), NUM_ITEMS);
    assert_eq!(report.cores().len(), 2);
    for (i, core) in report.cores().iter().enumerate() {
        assert_eq!(core.core, i);
        assert_eq!(core.samples, 128);
        assert_eq!(core.operations, 128 * 256);
        assert_eq!(core.average, core.total / 128);
    }

    let text = report.to_string();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 2, "{text}");
    assert!(lines[0].starts_with("Core 0: "), "{text}");
    assert!(lines[1].starts_with("Core 1: "), "{text}");
    assert!(lines.iter().all(|l| l.ends_with(" ns")), "{text}");
    assert_eq!(
        report.header().to_string(),
        "Time taken to fill 256 items, averaged over 128 samples"
    );
}

#[test]
fn every_worker_sends_rounds_times_items() {
    for &(rounds, items) in &[(1, 1), (3, 17), (10, 64)] {
        let config = ContentionConfig::new().rounds(rounds).items_per_round(items);
        let report = DUAL_CORE.run(|k| run_contention(k, config).unwrap());
        for core in report.cores() {
            assert_eq!(core.samples, rounds as u64);
            assert_eq!(core.operations, (rounds * items) as u64);
        }
    }
}

#[test]
fn single_and_quad_core() {
    for num_cores in [1, 4] {
        let config = ContentionConfig::new().cores(num_cores).rounds(8).items_per_round(32);
        let report =
            BenchTestUtil::new(num_cores).run(|k| run_contention(k, config).unwrap());
        assert_eq!(report.cores().len(), num_cores);
        assert!(report.cores().iter().all(|c| c.operations == 8 * 32));
    }
}

#[test]
fn undersized_queue_fails_the_burst() {
    let config = ContentionConfig::new()
        .rounds(4)
        .items_per_round(16)
        .queue_capacity(10);
    let result = DUAL_CORE.run(|k| run_contention(k, config));

    let e = result.unwrap_err();
    assert_matches!(
        e,
        BenchError::Operational {
            what: "queue send",
            code: ResultCode::QueueOverflow,
            ..
        }
    );
    if let BenchError::Operational { site, .. } = e {
        assert_eq!(site.round, Some(0));
        assert_eq!(site.item, Some(10));
        assert!(site.core.is_some());
    }
    assert!(e.to_string().contains("round 0, item 10: queue send failed"), "{e}");
}

#[test]
fn too_many_cores_is_a_setup_failure() {
    let config = ContentionConfig::new().cores(3);
    let result = DUAL_CORE.run(|k| run_contention(k, config).map(drop));
    assert_matches!(
        result,
        Err(BenchError::Setup {
            code: ResultCode::BadParam,
            ..
        })
    );
}

#[test]
fn setup_needs_a_task() {
    let kernel = StdKernel::new(2);
    let result = ContentionBench::setup(&kernel, ContentionConfig::new()).map(drop);
    assert_matches!(
        result,
        Err(BenchError::Setup {
            code: ResultCode::BadContext,
            ..
        })
    );
    assert_eq!(kernel.object_counts(), (0, 0, 0));
}

#[test]
fn workers_await_deletion_after_the_last_round() {
    DUAL_CORE.run(|k| {
        let config = ContentionConfig::new().rounds(5).items_per_round(8);
        let mut bench = ContentionBench::setup(k, config).unwrap();
        assert_eq!(bench.workers().len(), 2);

        // Workers can't be deleted while they're still awaiting rounds
        assert_matches!(
            k.delete_task(bench.workers()[0]),
            Err(DeleteTaskError::BadObjectState)
        );

        bench.run().unwrap();

        for (core, &task) in bench.workers().iter().enumerate() {
            while k.task_state(task).unwrap() != TaskState::Suspended {
                k.yield_cpu();
            }
            assert_eq!(bench.worker_phase(core), WorkerPhase::AwaitingDeletion);
            assert_eq!(k.queue_len(bench.queue(core).unwrap()).unwrap(), 0);
        }

        // Running again is refused
        assert_matches!(bench.run(), Err(BenchError::Setup { .. }));

        bench.teardown().unwrap();
    });
}

#[test]
fn teardown_before_run_stops_the_workers() {
    DUAL_CORE.run(|k| {
        let bench = ContentionBench::setup(k, ContentionConfig::new().rounds(3)).unwrap();
        bench.teardown().unwrap();
    });
}

#[test]
fn dropping_the_bench_releases_it() {
    DUAL_CORE.run(|k| {
        let mut bench = ContentionBench::setup(k, ContentionConfig::new().rounds(2)).unwrap();
        bench.run().unwrap();
        drop(bench);
    });
}

#[test]
fn critical_section_contention() {
    let config = ContentionConfig::new()
        .workload(Workload::CriticalSection)
        .rounds(16)
        .items_per_round(100);
    let report = DUAL_CORE.run(|k| {
        let mut bench = ContentionBench::setup(k, config).unwrap();
        assert_eq!(bench.queue(0), None);
        let report = bench.run().unwrap();
        bench.teardown().unwrap();
        report
    });

    assert_eq!(report.cores().len(), 2);
    assert!(report.cores().iter().all(|c| c.operations == 1600));
    assert_eq!(
        report.header().to_string(),
        "Time taken to enter and exit the critical section for 100 items, averaged over 16 samples"
    );
}

#[test]
fn critical_section_speed_samples() {
    let report = DUAL_CORE.run(|k| critical_section_speed(k, &LatencyConfig::new()).unwrap());
    assert_eq!(report.lines().len(), 2);
    assert_eq!(report.get(OpKind::Enter).unwrap().samples, 128);
    assert_eq!(report.get(OpKind::Exit).unwrap().samples, 128);
}

#[test]
fn queue_speed_samples() {
    let report = DUAL_CORE.run(|k| queue_speed(k, &LatencyConfig::new()).unwrap());
    assert_eq!(report.lines().len(), 2);
    assert_eq!(report.get(OpKind::Send).unwrap().samples, 128);
    assert_eq!(report.get(OpKind::Receive).unwrap().samples, 128);

    let text = report.to_string();
    assert!(text.starts_with("queue send average elapsed time: "), "{text}");
}

#[test]
fn queue_speed_with_small_queue_fails() {
    let config = LatencyConfig::new().samples(20).queue_capacity(5);
    let result = DUAL_CORE.run(|k| queue_speed(k, &config));
    assert_matches!(
        result,
        Err(BenchError::Operational {
            what: "queue send",
            code: ResultCode::QueueOverflow,
            ..
        })
    );
}

#[test]
fn semaphore_speed_samples() {
    let config = LatencyConfig::new().samples(64);
    let report = DUAL_CORE.run(|k| semaphore_speed(k, &config).unwrap());
    assert_eq!(report.get(OpKind::Signal).unwrap().samples, 64);
    assert_eq!(report.get(OpKind::Wait).unwrap().samples, 64);
}

#[test]
fn registered_cases() {
    let names: Vec<_> = benchmark_cases::<StdKernel>()
        .iter()
        .map(|case| case.name)
        .collect();
    assert!(names.contains(&"Test Performance: Queue Contention"));
    assert!(names.iter().all(|n| n.starts_with("Test Performance: ")));
    assert!(benchmark_cases::<StdKernel>()
        .iter()
        .all(|case| case.tags == "[freertos]"));
    assert!(find_case::<StdKernel>("nonexistent").is_none());
}

#[test]
fn queue_contention_case_output() {
    let case = find_case::<StdKernel>("Test Performance: Queue Contention").unwrap();
    let text = DUAL_CORE.run(|k| {
        let mut out = String::new();
        run_case(k, &case, &mut out).unwrap();
        out
    });
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 2, "{text}");
    assert!(lines[0].starts_with("Core 0: "));
    assert!(lines[1].starts_with("Core 1: "));
}

#[test]
fn latency_case_output() {
    let case = find_case::<StdKernel>("Test Performance: Critical Section Speed").unwrap();
    let text = DUAL_CORE.run(|k| {
        let mut out = String::new();
        run_case(k, &case, &mut out).unwrap();
        out
    });
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 2, "{text}");
    assert!(lines[0].starts_with("enter critical section average elapsed time: "));
    assert!(lines[1].starts_with("exit critical section average elapsed time: "));
}

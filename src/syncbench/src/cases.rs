//! Named, tagged benchmark cases.
//!
//! Each case performs its setup, runs the timed procedure, releases everything
//! it created (even on failure), and writes its average-latency lines to a
//! text sink.
use core::fmt;

use crate::{
    aggregate::ContentionReport,
    config::{ContentionConfig, LatencyConfig, Workload},
    contention::run_contention,
    error::BenchError,
    kernel::Kernel,
    latency::{critical_section_speed, queue_speed, semaphore_speed},
    report::LatencyReport,
};

/// The tags attached to every registered case.
pub const TAGS: &str = "[freertos]";

/// A registered benchmark case.
pub struct BenchmarkCase<K> {
    pub name: &'static str,
    pub tags: &'static str,
    run: fn(&K, &mut dyn fmt::Write) -> Result<(), BenchError>,
}

impl<K> Clone for BenchmarkCase<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for BenchmarkCase<K> {}

impl<K> fmt::Debug for BenchmarkCase<K> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BenchmarkCase")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .finish()
    }
}

impl<K: Kernel> BenchmarkCase<K> {
    /// Run the case and write its report to `out`.
    pub fn run(&self, kernel: &K, out: &mut dyn fmt::Write) -> Result<(), BenchError> {
        (self.run)(kernel, out)
    }
}

/// Get every registered case.
pub fn benchmark_cases<K: Kernel>() -> [BenchmarkCase<K>; 5] {
    [
        BenchmarkCase {
            name: "Test Performance: Critical Section Speed",
            tags: TAGS,
            run: critical_section_speed_case::<K>,
        },
        BenchmarkCase {
            name: "Test Performance: Queue Speed",
            tags: TAGS,
            run: queue_speed_case::<K>,
        },
        BenchmarkCase {
            name: "Test Performance: Semaphore Speed",
            tags: TAGS,
            run: semaphore_speed_case::<K>,
        },
        BenchmarkCase {
            name: "Test Performance: Queue Contention",
            tags: TAGS,
            run: queue_contention_case::<K>,
        },
        BenchmarkCase {
            name: "Test Performance: Critical Section Contention",
            tags: TAGS,
            run: critical_section_contention_case::<K>,
        },
    ]
}

/// Find a registered case by name.
pub fn find_case<K: Kernel>(name: &str) -> Option<BenchmarkCase<K>> {
    benchmark_cases::<K>().into_iter().find(|case| case.name == name)
}

/// Run one case, logging its name before and the outcome after.
pub fn run_case<K: Kernel>(
    kernel: &K,
    case: &BenchmarkCase<K>,
    out: &mut dyn fmt::Write,
) -> Result<(), BenchError> {
    log::info!("{} {}", case.name, case.tags);
    let result = case.run(kernel, out);
    match &result {
        Ok(()) => log::debug!("{}: done", case.name),
        Err(e) => log::error!("{}: {e}", case.name),
    }
    result
}

fn critical_section_speed_case<K: Kernel>(
    kernel: &K,
    out: &mut dyn fmt::Write,
) -> Result<(), BenchError> {
    let report = critical_section_speed(kernel, &LatencyConfig::new())?;
    write_latency(out, &report)
}

fn queue_speed_case<K: Kernel>(kernel: &K, out: &mut dyn fmt::Write) -> Result<(), BenchError> {
    let report = queue_speed(kernel, &LatencyConfig::new())?;
    write_latency(out, &report)
}

fn semaphore_speed_case<K: Kernel>(
    kernel: &K,
    out: &mut dyn fmt::Write,
) -> Result<(), BenchError> {
    let report = semaphore_speed(kernel, &LatencyConfig::new())?;
    write_latency(out, &report)
}

fn queue_contention_case<K: Kernel>(
    kernel: &K,
    out: &mut dyn fmt::Write,
) -> Result<(), BenchError> {
    let report = run_contention(kernel, ContentionConfig::new())?;
    write_contention(out, &report)
}

fn critical_section_contention_case<K: Kernel>(
    kernel: &K,
    out: &mut dyn fmt::Write,
) -> Result<(), BenchError> {
    let config = ContentionConfig::new().workload(Workload::CriticalSection);
    let report = run_contention(kernel, config)?;
    write_contention(out, &report)
}

fn write_latency(out: &mut dyn fmt::Write, report: &LatencyReport) -> Result<(), BenchError> {
    write!(out, "{report}")?;
    Ok(())
}

fn write_contention(out: &mut dyn fmt::Write, report: &ContentionReport) -> Result<(), BenchError> {
    log::info!("{}", report.header());
    write!(out, "{report}")?;
    Ok(())
}

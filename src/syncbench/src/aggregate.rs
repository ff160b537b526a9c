//! Reduces the per-core accumulators of a contention benchmark to averages.
use arrayvec::ArrayVec;
use core::fmt;

use crate::{
    config::{ContentionConfig, Workload, MAX_CORES},
    kernel::CoreId,
    sample::PerCoreAccumulator,
};

/// The result of a contention benchmark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentionReport {
    unit: &'static str,
    workload: Workload,
    rounds: usize,
    items_per_round: usize,
    cores: ArrayVec<CoreResult, MAX_CORES>,
}

/// The figures of one core in a [`ContentionReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreResult {
    pub core: CoreId,
    /// The number of burst samples recorded.
    pub samples: u64,
    /// The number of successful burst operations over all rounds.
    pub operations: u64,
    /// The sum of all burst samples.
    pub total: u64,
    /// `total` divided by the round count.
    pub average: u64,
}

/// Reduce the final accumulator state to per-core averages, in core-index
/// order.
pub fn aggregate(
    config: &ContentionConfig,
    unit: &'static str,
    acc: &PerCoreAccumulator,
) -> ContentionReport {
    let rounds = config.rounds.max(1) as u64;
    let cores = (0..acc.num_cores())
        .map(|core| {
            let total = acc.sum(core);
            CoreResult {
                core,
                samples: acc.count(core),
                operations: acc.operations(core),
                total,
                average: total / rounds,
            }
        })
        .collect();

    ContentionReport {
        unit,
        workload: config.workload,
        rounds: config.rounds,
        items_per_round: config.items_per_round,
        cores,
    }
}

impl ContentionReport {
    pub fn unit(&self) -> &'static str {
        self.unit
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn items_per_round(&self) -> usize {
        self.items_per_round
    }

    pub fn cores(&self) -> &[CoreResult] {
        &self.cores
    }

    /// Get a core's average per round.
    pub fn average(&self, core: CoreId) -> Option<u64> {
        self.cores.get(core).map(|c| c.average)
    }

    /// Get a core's average per burst item.
    pub fn per_item_average(&self, core: CoreId) -> Option<u64> {
        let items = self.items_per_round.max(1) as u64;
        self.average(core).map(|avg| avg / items)
    }

    /// Get a description of what the averages measure.
    pub fn header(&self) -> impl fmt::Display + '_ {
        Header(self)
    }
}

struct Header<'a>(&'a ContentionReport);

impl fmt::Display for Header<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Time taken to {} {} items, averaged over {} samples",
            self.0.workload.description(),
            self.0.items_per_round,
            self.0.rounds,
        )
    }
}

/// One line per core.
impl fmt::Display for ContentionReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for c in self.cores.iter() {
            writeln!(f, "Core {}: {} {}", c.core, c.average, self.unit)?;
        }
        Ok(())
    }
}

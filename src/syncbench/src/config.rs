//! Benchmark parameters.
//!
//! The constants are the parameters the registered cases run with. The
//! configuration types default to them and can be narrowed with their builder
//! methods, which is how the tests shrink a workload.
use crate::error::{BenchError, ResultCode};

/// The number of cores the contention benchmarks run on.
pub const NUM_CORES: usize = 2;

/// The number of samples taken by a single-unit benchmark, and the number of
/// rounds run by a contention benchmark.
pub const NUM_SAMPLES: usize = 128;

/// The number of operations performed by each worker per round.
pub const NUM_ITEMS: usize = 256;

/// The maximum number of cores a contention benchmark can be configured with.
pub const MAX_CORES: usize = 4;

/// The stack size of a worker task, in bytes.
pub const WORKER_STACK_SIZE: usize = 16 * 1024;

/// What each worker does during its timed burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Workload {
    /// Fill the worker's private queue with non-blocking sends.
    QueueFill,
    /// Enter and leave the kernel's critical section, which is shared by all
    /// cores.
    CriticalSection,
}

impl Workload {
    /// Get a phrase describing one burst item, for report headers.
    pub const fn description(self) -> &'static str {
        match self {
            Self::QueueFill => "fill",
            Self::CriticalSection => "enter and exit the critical section for",
        }
    }
}

/// The parameters of a contention benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentionConfig {
    pub num_cores: usize,
    pub rounds: usize,
    pub items_per_round: usize,
    /// The capacity of each private queue. Equal to `items_per_round` unless
    /// overridden.
    pub queue_capacity: usize,
    pub workload: Workload,
    pub stack_size: usize,
}

impl ContentionConfig {
    pub const fn new() -> Self {
        Self {
            num_cores: NUM_CORES,
            rounds: NUM_SAMPLES,
            items_per_round: NUM_ITEMS,
            queue_capacity: NUM_ITEMS,
            workload: Workload::QueueFill,
            stack_size: WORKER_STACK_SIZE,
        }
    }

    pub const fn cores(self, num_cores: usize) -> Self {
        Self { num_cores, ..self }
    }

    pub const fn rounds(self, rounds: usize) -> Self {
        Self { rounds, ..self }
    }

    /// Set the burst length. This also resizes the private queues to match.
    pub const fn items_per_round(self, items_per_round: usize) -> Self {
        Self {
            items_per_round,
            queue_capacity: items_per_round,
            ..self
        }
    }

    pub const fn queue_capacity(self, queue_capacity: usize) -> Self {
        Self {
            queue_capacity,
            ..self
        }
    }

    pub const fn workload(self, workload: Workload) -> Self {
        Self { workload, ..self }
    }

    pub const fn stack_size(self, stack_size: usize) -> Self {
        Self { stack_size, ..self }
    }

    /// Check the configuration against the kernel's core count.
    ///
    /// A queue capacity smaller than the burst is accepted here. The burst
    /// then fails when the queue fills up.
    pub fn validate(&self, available_cores: usize) -> Result<(), BenchError> {
        let bad = |what| Err(BenchError::setup(what, ResultCode::BadParam));
        if self.num_cores == 0 {
            bad("no cores configured")
        } else if self.num_cores > MAX_CORES {
            bad("more cores than `MAX_CORES`")
        } else if self.num_cores > available_cores {
            bad("more cores than the kernel provides")
        } else if self.rounds == 0 {
            bad("no rounds configured")
        } else if self.items_per_round == 0 {
            bad("no items per round configured")
        } else if self.workload == Workload::QueueFill && self.queue_capacity == 0 {
            bad("zero queue capacity")
        } else {
            Ok(())
        }
    }
}

impl Default for ContentionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The parameters of a single-unit benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyConfig {
    pub samples: usize,
    /// The capacity of the queue used by the queue benchmark.
    pub queue_capacity: usize,
}

impl LatencyConfig {
    pub const fn new() -> Self {
        Self {
            samples: NUM_SAMPLES,
            queue_capacity: NUM_SAMPLES,
        }
    }

    /// Set the sample count. This also resizes the queue to match.
    pub const fn samples(self, samples: usize) -> Self {
        Self {
            samples,
            queue_capacity: samples,
        }
    }

    pub const fn queue_capacity(self, queue_capacity: usize) -> Self {
        Self {
            queue_capacity,
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), BenchError> {
        if self.samples == 0 {
            Err(BenchError::setup("no samples configured", ResultCode::BadParam))
        } else if self.queue_capacity == 0 {
            Err(BenchError::setup("zero queue capacity", ResultCode::BadParam))
        } else {
            Ok(())
        }
    }
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn defaults_follow_constants() {
        let c = ContentionConfig::new();
        assert_eq!(c.num_cores, NUM_CORES);
        assert_eq!(c.rounds, NUM_SAMPLES);
        assert_eq!(c.items_per_round, NUM_ITEMS);
        assert_eq!(c.queue_capacity, c.items_per_round);
        assert_eq!(c.validate(NUM_CORES), Ok(()));

        let l = LatencyConfig::default();
        assert_eq!(l.samples, NUM_SAMPLES);
        assert_eq!(l.queue_capacity, NUM_SAMPLES);
    }

    #[test]
    fn items_per_round_resizes_queue() {
        let c = ContentionConfig::new().items_per_round(16);
        assert_eq!(c.queue_capacity, 16);
        let c = c.queue_capacity(8);
        assert_eq!((c.items_per_round, c.queue_capacity), (16, 8));
        // An undersized queue is a runtime failure, not a setup failure
        assert_eq!(c.validate(NUM_CORES), Ok(()));
    }

    #[test]
    fn rejects_bad_contention_config() {
        let c = ContentionConfig::new();
        for bad in [
            c.cores(0),
            c.cores(MAX_CORES + 1),
            c.rounds(0),
            c.items_per_round(0),
            c.queue_capacity(0),
        ] {
            assert_matches!(
                bad.validate(MAX_CORES),
                Err(BenchError::Setup {
                    code: ResultCode::BadParam,
                    ..
                })
            );
        }
        assert_matches!(c.cores(3).validate(2), Err(BenchError::Setup { .. }));
    }

    #[test]
    fn critical_section_workload_needs_no_queue() {
        let c = ContentionConfig::new()
            .workload(Workload::CriticalSection)
            .queue_capacity(0);
        assert_eq!(c.validate(NUM_CORES), Ok(()));
    }

    #[test]
    fn rejects_bad_latency_config() {
        assert_matches!(
            LatencyConfig::new().samples(0).validate(),
            Err(BenchError::Setup { .. })
        );
        assert_matches!(
            LatencyConfig::new().queue_capacity(0).validate(),
            Err(BenchError::Setup { .. })
        );
    }
}

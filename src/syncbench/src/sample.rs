//! Timing samples and the accumulators that sum them.
use arrayvec::ArrayVec;
use core::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::{config::MAX_CORES, kernel::CoreId, time::Cycles};

/// The kind of operation a sample measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Entering a critical section
    Enter,
    /// Leaving a critical section
    Exit,
    /// A non-blocking queue send
    Send,
    /// A non-blocking queue receive
    Receive,
    /// Signaling a semaphore
    Signal,
    /// Waiting on a semaphore whose count is non-zero
    Wait,
    /// One worker's timed burst in a contention round
    Burst,
}

impl OpKind {
    /// Get the label used in reports.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Enter => "enter critical section",
            Self::Exit => "exit critical section",
            Self::Send => "queue send",
            Self::Receive => "queue receive",
            Self::Signal => "semaphore signal",
            Self::Wait => "semaphore wait",
            Self::Burst => "burst",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An elapsed count attributed to one core and one operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub core: CoreId,
    pub kind: OpKind,
    pub cycles: Cycles,
}

/// The running sum of the samples of one operation kind, taken by a single
/// task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpAccumulator {
    kind: OpKind,
    sum: u64,
    count: u32,
}

impl OpAccumulator {
    pub const fn new(kind: OpKind) -> Self {
        Self {
            kind,
            sum: 0,
            count: 0,
        }
    }

    #[inline]
    pub fn record(&mut self, cycles: Cycles) {
        self.sum += u64::from(cycles);
        self.count += 1;
    }

    pub fn kind(&self) -> OpKind {
        self.kind
    }

    pub fn sum(&self) -> u64 {
        self.sum
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Get the mean of the recorded samples, or `None` if there are none.
    pub fn average(&self) -> Option<u64> {
        (self.count != 0).then(|| self.sum / u64::from(self.count))
    }
}

/// Per-core sums of burst samples.
///
/// Exactly one entry exists per configured core. Each entry is written only
/// by the worker pinned to that core, so the entries are plain atomics with
/// relaxed ordering. The completion semaphore orders the last write before
/// the orchestrator's read.
pub struct PerCoreAccumulator {
    entries: ArrayVec<CoreEntry, MAX_CORES>,
}

struct CoreEntry {
    sum: AtomicU64,
    count: AtomicU64,
    operations: AtomicU64,
}

impl PerCoreAccumulator {
    /// Construct an accumulator with `num_cores` zeroed entries.
    ///
    /// # Panics
    ///
    /// Panics if `num_cores > MAX_CORES`.
    pub fn new(num_cores: usize) -> Self {
        assert!(num_cores <= MAX_CORES, "too many cores");
        Self {
            entries: (0..num_cores)
                .map(|_| CoreEntry {
                    sum: AtomicU64::new(0),
                    count: AtomicU64::new(0),
                    operations: AtomicU64::new(0),
                })
                .collect(),
        }
    }

    pub fn num_cores(&self) -> usize {
        self.entries.len()
    }

    /// Add a sample to its core's entry. Must only be called by the task
    /// that owns `sample.core`.
    #[inline]
    pub fn record(&self, sample: Sample) {
        let entry = &self.entries[sample.core];
        // Single writer per entry, so load-then-store is enough
        let sum = entry.sum.load(Ordering::Relaxed);
        entry
            .sum
            .store(sum.wrapping_add(u64::from(sample.cycles)), Ordering::Relaxed);
        let count = entry.count.load(Ordering::Relaxed);
        entry.count.store(count + 1, Ordering::Relaxed);
    }

    /// Count `n` successfully completed operations for a core. Must only be
    /// called by the task that owns `core`.
    #[inline]
    pub fn add_operations(&self, core: CoreId, n: u64) {
        let entry = &self.entries[core];
        let ops = entry.operations.load(Ordering::Relaxed);
        entry.operations.store(ops + n, Ordering::Relaxed);
    }

    /// Get the sum recorded for a core.
    pub fn sum(&self, core: CoreId) -> u64 {
        self.entries[core].sum.load(Ordering::Relaxed)
    }

    /// Get the number of samples recorded for a core.
    pub fn count(&self, core: CoreId) -> u64 {
        self.entries[core].count.load(Ordering::Relaxed)
    }

    /// Get the number of operations counted for a core.
    pub fn operations(&self, core: CoreId) -> u64 {
        self.entries[core].operations.load(Ordering::Relaxed)
    }

    /// Zero every entry.
    pub fn reset(&self) {
        for entry in self.entries.iter() {
            entry.sum.store(0, Ordering::Relaxed);
            entry.count.store(0, Ordering::Relaxed);
            entry.operations.store(0, Ordering::Relaxed);
        }
    }
}

impl fmt::Debug for PerCoreAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list()
            .entries((0..self.num_cores()).map(|core| (self.sum(core), self.count(core))))
            .finish()
    }
}

//! The monotonic time source.

/// A raw reading of the free-running counter.
pub type Cycles = u32;

/// A free-running counter that timing code reads around measured operations.
///
/// The counter must be monotonically non-decreasing while a benchmark runs
/// and should have sub-microsecond resolution. Reading it has no side
/// effects.
pub trait CycleCounter {
    /// The unit a reading is expressed in, for display (e.g., `"cycles"`).
    const UNIT: &'static str;

    /// Read the current counter value.
    fn now(&self) -> Cycles;
}

/// Calculate the elapsed count from `start` to `end`.
///
/// The subtraction is modular, so an interval during which the counter
/// wrapped around exactly once is still measured correctly. An interval
/// spanning a full counter period or more is indistinguishable from a shorter
/// one and is not detected.
#[inline]
pub const fn elapsed(start: Cycles, end: Cycles) -> Cycles {
    end.wrapping_sub(start)
}

/// Read the counter, run `f`, read it again, and return `f`'s output along
/// with the elapsed count.
#[inline(always)]
pub fn measure<C: CycleCounter + ?Sized, R>(clock: &C, f: impl FnOnce() -> R) -> (R, Cycles) {
    let t0 = clock.now();
    let output = f();
    let t1 = clock.now();
    (output, elapsed(t0, t1))
}

//! Human-readable results of the single-unit benchmarks.
use arrayvec::ArrayVec;
use core::fmt;

use crate::sample::{OpAccumulator, OpKind};

/// The result of a single-unit benchmark: one average per measured
/// operation kind, in measurement order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatencyReport {
    unit: &'static str,
    lines: ArrayVec<LatencyLine, 4>,
}

/// One measured operation kind in a [`LatencyReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyLine {
    pub kind: OpKind,
    pub samples: u32,
    pub average: u64,
}

impl LatencyReport {
    /// Reduce the accumulators to averages. Accumulators with no samples are
    /// skipped.
    pub fn from_accumulators(unit: &'static str, accumulators: &[OpAccumulator]) -> Self {
        let lines = accumulators
            .iter()
            .filter_map(|acc| {
                Some(LatencyLine {
                    kind: acc.kind(),
                    samples: acc.count(),
                    average: acc.average()?,
                })
            })
            .collect();
        Self { unit, lines }
    }

    pub fn unit(&self) -> &'static str {
        self.unit
    }

    pub fn lines(&self) -> &[LatencyLine] {
        &self.lines
    }

    /// Find the line for an operation kind.
    pub fn get(&self, kind: OpKind) -> Option<&LatencyLine> {
        self.lines.iter().find(|line| line.kind == kind)
    }
}

/// One line per measured operation kind.
impl fmt::Display for LatencyReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for line in self.lines.iter() {
            writeln!(
                f,
                "{} average elapsed time: {} {}",
                line.kind, line.average, self.unit
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn one_line_per_kind() {
        let mut enter = OpAccumulator::new(OpKind::Enter);
        let mut exit = OpAccumulator::new(OpKind::Exit);
        let unused = OpAccumulator::new(OpKind::Send);
        for i in 0..4 {
            enter.record(10 + i);
            exit.record(20);
        }

        let report = LatencyReport::from_accumulators("cycles", &[enter, exit, unused]);
        assert_eq!(report.lines().len(), 2);
        assert_eq!(report.get(OpKind::Enter).unwrap().average, 11);
        assert_eq!(report.get(OpKind::Exit).unwrap().samples, 4);
        assert!(report.get(OpKind::Send).is_none());
        assert_eq!(
            report.to_string(),
            "enter critical section average elapsed time: 11 cycles\n\
             exit critical section average elapsed time: 20 cycles\n"
        );
    }
}

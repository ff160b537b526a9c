//! Micro-benchmarks for the synchronization primitives of a multi-core
//! real-time kernel.
//!
//! The kernel is consumed through [`kernel::Kernel`]. Two families of
//! benchmarks are provided:
//!
//!  - [`latency`] times one primitive operation at a time with nothing
//!    contending for it.
//!  - [`contention`] runs one worker per core in synchronized rounds and
//!    reports per-core averages.
//!
//! [`cases`] packages both as named, tagged cases that write human-readable
//! reports.
#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod aggregate;
pub mod cases;
pub mod config;
pub mod contention;
pub mod error;
pub mod kernel;
pub mod latency;
pub mod report;
pub mod sample;
pub mod time;

pub use self::{
    aggregate::{ContentionReport, CoreResult},
    cases::{benchmark_cases, run_case, BenchmarkCase},
    config::{ContentionConfig, LatencyConfig, Workload},
    contention::{run_contention, ContentionBench, WorkerPhase},
    error::{BenchError, ResultCode, Site},
    kernel::{CoreId, Kernel, Placement, Priority, QueueItem, TaskState},
    report::LatencyReport,
    sample::OpKind,
    time::{CycleCounter, Cycles},
};

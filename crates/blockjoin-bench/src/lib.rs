//! Blockjoin Benchmark Suite
//!
//! Loads synthetic student and major tables and measures each join strategy
//! on them.
//!
//! # Reports
//!
//! - **Runs**: one forced strategy per input size, with runtime, estimated
//!   blocks and observed buffer hits and misses
//! - **Correctness**: every applicable strategy must return the same rows
//! - **Selection**: the candidate costs the automatic planner compared

pub mod fixtures;
pub mod harness;

pub use fixtures::{generate_students, populate, StudentData, MAJORS};
pub use harness::{
    correctness_check, run_strategy, selection_report, student_major_query, BenchContext,
    CorrectnessReport, JoinKind, RunResult, SelectionCase, CSV_HEADER,
};

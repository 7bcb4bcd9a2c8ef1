//! Shared types and utilities for Firedrill.
//!
//! This crate holds the data model every other Firedrill component speaks:
//! configurations under test, workload items, telemetry, classified failure
//! events, statistics, and the report shape, along with the error catalog
//! and serde-able run options.

pub mod errors;
pub mod options;
pub mod types;

pub use errors::{DrillError, ProbeCallError, RetryableError};
pub use options::{
    ExecutionMode, RetryPolicy, RunOptions, ThresholdMode, ToleranceMultipliers,
};
pub use types::{
    AnalysisReport, BreakPoint, ComparisonResult, ConfigId, DistributionEntry, Distributions,
    FailureEvent, FailureMode, Interval, ItemId, ProbeConfig, ProbeResult, Provider, RunSummary,
    Severity, Stats, Telemetry, Timeline, WorkloadItem,
};

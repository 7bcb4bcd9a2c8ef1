//! Firedrill core: probe execution, failure classification, and
//! statistical estimation for AI-service configuration stress drills.
//!
//! The pipeline runs every (configuration x workload item) pair against a
//! telemetry source — a deterministic seeded simulator or a rate-limited
//! provider adapter — classifies the telemetry into typed failure events,
//! and turns failure counts into calibrated uncertainty intervals,
//! pairwise safety comparisons, categorical distributions, and a
//! break-first timeline.
//!
//! Entry points: [`pipeline::run_analysis`] for simulate mode and
//! [`pipeline::run_analysis_with_adapter`] for real mode.

pub mod aggregate;
pub mod engine;
pub mod pipeline;
pub mod provider;
pub mod rng;
pub mod rules;
pub mod simulate;
pub mod stats;
pub mod timeline;

pub use engine::{AbortSignal, ProbeEngine, ProgressCallback, RunOutcome};
pub use pipeline::{RunHooks, run_analysis, run_analysis_with_adapter, validate_suite};
pub use provider::{MockProviderAdapter, ProviderAdapter, resolve_providers};
pub use rules::{RuleSpec, Thresholds, classify};
pub use timeline::build_timeline;

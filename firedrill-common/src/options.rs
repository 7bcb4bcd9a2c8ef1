//! Run options for the probe pipeline.
//!
//! Everything here is plain serde-able data; callbacks and abort handles
//! travel separately (see `firedrill-core`) so a suite file can carry a
//! complete option block.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default maximum simultaneous provider calls in real mode.
const DEFAULT_MAX_CONCURRENT_CALLS: usize = 4;

/// Default minimum spacing between real-mode dispatches.
const DEFAULT_DISPATCH_INTERVAL_MS: u64 = 250;

/// Default simulate-mode batch size when a progress callback is attached.
const DEFAULT_PROGRESS_BATCH: usize = 10;

/// Default cooperative pause between progress batches.
const DEFAULT_PROGRESS_PAUSE_MS: u64 = 25;

/// How telemetry is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Deterministic seeded simulation; no external I/O.
    Simulate,
    /// Rate-limited calls through a provider adapter.
    Real,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Simulate
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simulate => write!(f, "simulate"),
            Self::Real => write!(f, "real"),
        }
    }
}

/// Which threshold regime the classifier uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    /// Hand-tuned constants.
    Fixed,
    /// Batch-relative 95th-percentile thresholds.
    Adaptive,
}

impl Default for ThresholdMode {
    fn default() -> Self {
        Self::Fixed
    }
}

/// Caller-supplied multipliers that loosen (>1) or tighten (<1) adaptive
/// thresholds, e.g. "2x cost tolerance".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToleranceMultipliers {
    #[serde(default = "default_multiplier")]
    pub latency: f64,
    #[serde(default = "default_multiplier")]
    pub cost: f64,
    #[serde(default = "default_multiplier")]
    pub utilization: f64,
}

fn default_multiplier() -> f64 {
    1.0
}

impl Default for ToleranceMultipliers {
    fn default() -> Self {
        Self {
            latency: 1.0,
            cost: 1.0,
            utilization: 1.0,
        }
    }
}

/// Retry policy for real-mode provider calls.
///
/// Backoff is exponential with a cap; jitter is supplied by the caller as a
/// unit sample in [-1, 1] so the computation itself stays pure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts including the first try (minimum 1).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay before the first retry, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Delay ceiling in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Jitter factor (0.0-1.0) applied to each delay.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    8_000
}

fn default_jitter() -> f64 {
    0.2
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay for a 1-based attempt number.
    ///
    /// `jitter_unit` must lie in [-1, 1]; pass 0.0 for a deterministic
    /// delay. The engine feeds a fresh random sample per retry.
    pub fn backoff_delay(&self, attempt: u32, jitter_unit: f64) -> Duration {
        let attempt = attempt.max(1);
        let base_ms = self.base_delay_ms as f64;
        let max_ms = self.max_delay_ms as f64;

        let multiplier = 2_u32.saturating_pow(attempt.saturating_sub(1)) as f64;
        let mut delay = (base_ms * multiplier).min(max_ms);

        if self.jitter > 0.0 && delay > 0.0 {
            let jitter = jitter_unit.clamp(-1.0, 1.0) * self.jitter;
            delay = (delay * (1.0 + jitter)).max(0.0);
        }

        Duration::from_millis(delay as u64)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Full option block for one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Execution mode (simulate or real).
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Reproducibility seed driving every random choice in simulate mode
    /// and the resampling estimators.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Maximum simultaneous provider calls (real mode).
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_calls: usize,
    /// Minimum spacing between dispatches in milliseconds (real mode).
    #[serde(default = "default_dispatch_interval")]
    pub min_dispatch_interval_ms: u64,
    /// Retry policy for provider calls (real mode).
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Batch size for progress-callback pacing in simulate mode.
    #[serde(default = "default_progress_batch")]
    pub progress_batch_size: usize,
    /// Cooperative pause between progress batches in milliseconds.
    #[serde(default = "default_progress_pause")]
    pub progress_pause_ms: u64,
    /// Threshold regime for the failure classifier.
    #[serde(default)]
    pub threshold_mode: ThresholdMode,
    /// Tolerance multipliers for adaptive thresholds.
    #[serde(default)]
    pub tolerances: ToleranceMultipliers,
}

fn default_seed() -> u64 {
    42
}

fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT_CALLS
}

fn default_dispatch_interval() -> u64 {
    DEFAULT_DISPATCH_INTERVAL_MS
}

fn default_progress_batch() -> usize {
    DEFAULT_PROGRESS_BATCH
}

fn default_progress_pause() -> u64 {
    DEFAULT_PROGRESS_PAUSE_MS
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Simulate,
            seed: default_seed(),
            max_concurrent_calls: DEFAULT_MAX_CONCURRENT_CALLS,
            min_dispatch_interval_ms: DEFAULT_DISPATCH_INTERVAL_MS,
            retry: RetryPolicy::default(),
            progress_batch_size: DEFAULT_PROGRESS_BATCH,
            progress_pause_ms: DEFAULT_PROGRESS_PAUSE_MS,
            threshold_mode: ThresholdMode::Fixed,
            tolerances: ToleranceMultipliers::default(),
        }
    }
}

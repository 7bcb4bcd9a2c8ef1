//! Probe execution engine.
//!
//! Runs every (configuration x workload item) pair against a telemetry
//! source and derives per-probe utilization, token totals, and cost. Two
//! scheduling regimes produce structurally identical output:
//!
//! - **Simulate**: no external I/O. Each pair is a pure function of
//!   (configuration, item, seed), so execution fans out across a `JoinSet`
//!   with per-pair RNG streams pre-assigned up front. When a progress
//!   callback is attached, execution degrades to batched sequential order
//!   so callback ordering matches result ordering and pacing is visible.
//! - **Real**: bounded concurrency behind a semaphore plus a minimum
//!   inter-dispatch delay, with per-call exponential-backoff retries. A
//!   call that exhausts its retries becomes an error-telemetry record;
//!   a single provider failure never aborts the batch.
//!
//! Results are always returned in plan order (configuration-major, then
//! item), regardless of completion order.

use crate::provider::ProviderAdapter;
use crate::simulate::simulate_probe;
use firedrill_common::{
    ConfigId, ProbeCallError, ProbeConfig, ProbeResult, Provider, RetryPolicy, RetryableError,
    RunOptions, Telemetry, WorkloadItem,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Streamed after each completed probe: (completed, total, latest result).
/// The only interleaving point the engine exposes to callers.
pub type ProgressCallback = Arc<dyn Fn(usize, usize, &ProbeResult) + Send + Sync>;

/// Cooperative cancellation handle.
///
/// On abort, in-flight probes finish but nothing new is dispatched; the
/// caller receives a partial result instead of a hang.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Engine output: completed probes in plan order plus run accounting.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub results: Vec<ProbeResult>,
    pub probes_planned: usize,
    pub aborted: bool,
}

/// One planned probe: indices into the config/item slices plus the global
/// dispatch position.
#[derive(Debug, Clone, Copy)]
struct PlannedProbe {
    config_idx: usize,
    item_idx: usize,
    dispatch_idx: usize,
}

fn build_plan(configs: &[ProbeConfig], items: &[WorkloadItem]) -> Vec<PlannedProbe> {
    let mut plan = Vec::with_capacity(configs.len() * items.len());
    for config_idx in 0..configs.len() {
        for item_idx in 0..items.len() {
            plan.push(PlannedProbe {
                config_idx,
                item_idx,
                dispatch_idx: plan.len(),
            });
        }
    }
    plan
}

/// Probe execution engine. Cheap to construct; owns only its options.
pub struct ProbeEngine {
    options: RunOptions,
}

impl ProbeEngine {
    pub fn new(options: RunOptions) -> Self {
        Self { options }
    }

    /// Run every pair through the deterministic simulator.
    ///
    /// Without a progress callback the plan fans out fully parallel; with
    /// one, it runs in deterministic batches with a cooperative pause so
    /// consumers can render incremental progress. Both paths yield
    /// identical results.
    pub async fn run_simulated(
        &self,
        configs: &[ProbeConfig],
        providers: &BTreeMap<ConfigId, Provider>,
        items: &[WorkloadItem],
        progress: Option<ProgressCallback>,
        abort: &AbortSignal,
    ) -> RunOutcome {
        let plan = build_plan(configs, items);
        let total = plan.len();
        debug!(total, "simulate run starting");

        match progress {
            Some(callback) => {
                self.run_simulated_batched(configs, providers, items, &plan, callback, abort)
                    .await
            }
            None => {
                self.run_simulated_parallel(configs, providers, items, &plan, abort)
                    .await
            }
        }
    }

    async fn run_simulated_parallel(
        &self,
        configs: &[ProbeConfig],
        providers: &BTreeMap<ConfigId, Provider>,
        items: &[WorkloadItem],
        plan: &[PlannedProbe],
        abort: &AbortSignal,
    ) -> RunOutcome {
        let seed = self.options.seed;
        let mut set: JoinSet<(usize, ProbeResult)> = JoinSet::new();
        let mut spawned = 0usize;

        for probe in plan {
            if abort.is_aborted() {
                break;
            }
            let config = configs[probe.config_idx].clone();
            let provider = providers[&config.id];
            let item = items[probe.item_idx].clone();
            let dispatch_idx = probe.dispatch_idx;

            set.spawn(async move {
                let telemetry = simulate_probe(&config, provider, &item, seed, dispatch_idx);
                let result = ProbeResult::from_telemetry(&config, item.id.clone(), telemetry);
                (dispatch_idx, result)
            });
            spawned += 1;
        }

        let mut slots: Vec<Option<ProbeResult>> = vec![None; plan.len()];
        while let Some(joined) = set.join_next().await {
            // A panicking probe task would poison the whole batch; surface
            // it instead of silently dropping the slot.
            let (idx, result) = joined.expect("probe task panicked");
            slots[idx] = Some(result);
        }

        let results: Vec<ProbeResult> = slots.into_iter().flatten().collect();
        RunOutcome {
            aborted: spawned < plan.len(),
            probes_planned: plan.len(),
            results,
        }
    }

    async fn run_simulated_batched(
        &self,
        configs: &[ProbeConfig],
        providers: &BTreeMap<ConfigId, Provider>,
        items: &[WorkloadItem],
        plan: &[PlannedProbe],
        progress: ProgressCallback,
        abort: &AbortSignal,
    ) -> RunOutcome {
        let seed = self.options.seed;
        let batch_size = self.options.progress_batch_size.max(1);
        let total = plan.len();
        let mut results = Vec::with_capacity(total);
        let mut aborted = false;

        for batch in plan.chunks(batch_size) {
            for probe in batch {
                if abort.is_aborted() {
                    aborted = true;
                    break;
                }
                let config = &configs[probe.config_idx];
                let item = &items[probe.item_idx];
                let telemetry =
                    simulate_probe(config, providers[&config.id], item, seed, probe.dispatch_idx);
                let result = ProbeResult::from_telemetry(config, item.id.clone(), telemetry);
                results.push(result);
                progress(results.len(), total, results.last().expect("just pushed"));
            }
            if aborted {
                break;
            }
            if self.options.progress_pause_ms > 0 {
                sleep(Duration::from_millis(self.options.progress_pause_ms)).await;
            }
        }

        RunOutcome {
            aborted,
            probes_planned: total,
            results,
        }
    }

    /// Run every pair through a real provider adapter with bounded
    /// concurrency, dispatch pacing, and per-call retries.
    pub async fn run_real<A: ProviderAdapter>(
        &self,
        adapter: Arc<A>,
        configs: &[ProbeConfig],
        items: &[WorkloadItem],
        progress: Option<ProgressCallback>,
        abort: &AbortSignal,
    ) -> RunOutcome {
        let plan = build_plan(configs, items);
        let total = plan.len();
        let limiter = Arc::new(Semaphore::new(self.options.max_concurrent_calls.max(1)));
        let pacing = Duration::from_millis(self.options.min_dispatch_interval_ms);
        let retry = self.options.retry.clone();

        let mut set: JoinSet<(usize, ProbeResult)> = JoinSet::new();
        let mut spawned = 0usize;

        for probe in &plan {
            if abort.is_aborted() {
                break;
            }
            if spawned > 0 && !pacing.is_zero() {
                sleep(pacing).await;
            }

            let config = configs[probe.config_idx].clone();
            let item = items[probe.item_idx].clone();
            let adapter = Arc::clone(&adapter);
            let limiter = Arc::clone(&limiter);
            let retry = retry.clone();
            let dispatch_idx = probe.dispatch_idx;

            set.spawn(async move {
                let _permit = limiter
                    .acquire_owned()
                    .await
                    .expect("probe semaphore closed");
                let started = Instant::now();
                let telemetry =
                    match call_with_retry(adapter.as_ref(), &config, &item, &retry).await {
                        Ok(telemetry) => telemetry,
                        Err(err) => {
                            warn!(
                                config = %config.id,
                                item = %item.id,
                                error = %err,
                                "probe failed after retries; recording error telemetry"
                            );
                            error_telemetry(&err, started.elapsed().as_secs_f64() * 1000.0)
                        }
                    };
                let result = ProbeResult::from_telemetry(&config, item.id.clone(), telemetry);
                (dispatch_idx, result)
            });
            spawned += 1;
        }

        let mut slots: Vec<Option<ProbeResult>> = vec![None; total];
        let mut completed = 0usize;
        while let Some(joined) = set.join_next().await {
            let (idx, result) = joined.expect("probe task panicked");
            completed += 1;
            if let Some(ref callback) = progress {
                callback(completed, total, &result);
            }
            slots[idx] = Some(result);
        }

        RunOutcome {
            aborted: spawned < total,
            probes_planned: total,
            results: slots.into_iter().flatten().collect(),
        }
    }
}

/// Call the adapter with exponential-backoff retries on retryable errors.
async fn call_with_retry<A: ProviderAdapter>(
    adapter: &A,
    config: &ProbeConfig,
    item: &WorkloadItem,
    policy: &RetryPolicy,
) -> Result<Telemetry, ProbeCallError> {
    let max_attempts = policy.max_attempts();
    let mut attempt = 1;

    loop {
        match adapter.probe(config, item).await {
            Ok(telemetry) => return Ok(telemetry),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = policy.backoff_delay(attempt, fastrand::f64() * 2.0 - 1.0);
                debug!(
                    config = %config.id,
                    item = %item.id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying provider call after backoff"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Error telemetry for a probe whose provider call failed for good: the
/// error string is preserved and the failure is counted as one timeout so
/// the classifier picks it up as a risk signal.
fn error_telemetry(err: &ProbeCallError, elapsed_ms: f64) -> Telemetry {
    Telemetry {
        input_tokens: 0,
        retrieved_tokens: 0,
        output_tokens: 0,
        latency_ms: elapsed_ms,
        tool_calls: 0,
        tool_timeouts: 1,
        timestamp_ms: chrono::Utc::now().timestamp_millis(),
        error: Some(err.to_string()),
    }
}

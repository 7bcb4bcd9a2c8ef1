//! Rule-based failure classifier.
//!
//! Rules are data: a [`RuleSpec`] is a tagged variant carrying its
//! parameters, evaluated by a single dispatch function against a
//! (result, configuration) pair. No closures, no hidden capture — a rule
//! set can be serialized, logged, and shuffled without changing the
//! classification (evaluation is pure and order-independent; multiple
//! rules may fire on the same result).
//!
//! Severity is uniformly a function of the result under test: rules with a
//! constant severity simply ignore their input.

use firedrill_common::{
    ConfigId, FailureEvent, FailureMode, ProbeConfig, ProbeResult, Severity,
    ToleranceMultipliers,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

// ── Fixed thresholds ───────────────────────────────────────────────────────

/// Context utilization above which silent truncation becomes likely.
/// Also the safety floor the adaptive regime can never loosen past.
const FIXED_UTILIZATION_HIGH_WATER: f64 = 0.85;

/// Service-level latency objective per probe.
const FIXED_LATENCY_SLO_MS: f64 = 8_000.0;

/// Budget ceiling per probe in USD.
const FIXED_COST_BUDGET_USD: f64 = 0.25;

/// Retrieval breadth beyond which added chunks are mostly noise.
const FIXED_TOP_K_NOISE_LIMIT: u32 = 12;

/// Retrieved-token volume considered excessive regardless of breadth.
const FIXED_RETRIEVED_TOKEN_LIMIT: u32 = 6_000;

/// Latency multiple of the SLO at which severity escalates to HIGH.
const LATENCY_ESCALATION_FACTOR: f64 = 2.0;

/// Percentile used by the adaptive regime.
const ADAPTIVE_PERCENTILE: f64 = 0.95;

// ── Thresholds ─────────────────────────────────────────────────────────────

/// Classifier thresholds, either hand-tuned constants or derived from the
/// empirical distribution of the current batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub utilization_high_water: f64,
    pub latency_slo_ms: f64,
    pub cost_budget_usd: f64,
    pub top_k_noise_limit: u32,
    pub retrieved_token_limit: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::fixed()
    }
}

impl Thresholds {
    /// Hand-tuned constants.
    pub fn fixed() -> Self {
        Self {
            utilization_high_water: FIXED_UTILIZATION_HIGH_WATER,
            latency_slo_ms: FIXED_LATENCY_SLO_MS,
            cost_budget_usd: FIXED_COST_BUDGET_USD,
            top_k_noise_limit: FIXED_TOP_K_NOISE_LIMIT,
            retrieved_token_limit: FIXED_RETRIEVED_TOKEN_LIMIT,
        }
    }

    /// Batch-relative thresholds: the empirical 95th percentile of latency,
    /// cost, and utilization across `results`, scaled by the caller's
    /// tolerance multipliers. A single global constant either overfires on
    /// small, already-quirky batches or underfires on pathological ones;
    /// percentile-relative thresholds keep the top 5% worst flagged at any
    /// scale.
    ///
    /// The utilization threshold is clamped so it can never rise above the
    /// fixed safety floor: utilization at or beyond 0.85 always flags, no
    /// matter how skewed the batch is.
    pub fn adaptive(results: &[ProbeResult], tolerances: &ToleranceMultipliers) -> Self {
        if results.is_empty() {
            return Self::fixed();
        }

        let mut latencies: Vec<f64> = results.iter().map(|r| r.telemetry.latency_ms).collect();
        let mut costs: Vec<f64> = results.iter().map(|r| r.estimated_cost).collect();
        let mut utilizations: Vec<f64> =
            results.iter().map(|r| r.context_utilization).collect();
        latencies.sort_by(f64::total_cmp);
        costs.sort_by(f64::total_cmp);
        utilizations.sort_by(f64::total_cmp);

        Self {
            latency_slo_ms: percentile(&latencies, ADAPTIVE_PERCENTILE) * tolerances.latency,
            cost_budget_usd: percentile(&costs, ADAPTIVE_PERCENTILE) * tolerances.cost,
            utilization_high_water: (percentile(&utilizations, ADAPTIVE_PERCENTILE)
                * tolerances.utilization)
                .min(FIXED_UTILIZATION_HIGH_WATER),
            top_k_noise_limit: FIXED_TOP_K_NOISE_LIMIT,
            retrieved_token_limit: FIXED_RETRIEVED_TOKEN_LIMIT,
        }
    }
}

/// Nearest-rank percentile over an ascending-sorted slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f64 * q).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

// ── Rules ──────────────────────────────────────────────────────────────────

/// One failure-mode rule with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSpec {
    /// Prompt + retrieved tokens exceed the configuration's context window.
    ContextOverflow,
    /// Utilization past the high-water mark without yet overflowing.
    SilentTruncation { high_water: f64 },
    /// Latency past the SLO; HIGH beyond the escalation factor.
    LatencyBreach { slo_ms: f64 },
    /// Estimated cost past the per-probe budget.
    CostRunaway { budget_usd: f64 },
    /// Tool calls occurred and at least one timed out; provider-error
    /// telemetry (which carries a synthetic timeout) counts too.
    ToolTimeout,
    /// Retrieval breadth past the noise limit while retrieval was actually
    /// used, or excessive retrieved volume regardless of breadth.
    RetrievalNoise {
        top_k_limit: u32,
        retrieved_token_limit: u32,
    },
}

impl RuleSpec {
    /// The standard six-rule set for a threshold regime.
    pub fn default_set(thresholds: &Thresholds) -> Vec<RuleSpec> {
        vec![
            RuleSpec::ContextOverflow,
            RuleSpec::SilentTruncation {
                high_water: thresholds.utilization_high_water,
            },
            RuleSpec::LatencyBreach {
                slo_ms: thresholds.latency_slo_ms,
            },
            RuleSpec::CostRunaway {
                budget_usd: thresholds.cost_budget_usd,
            },
            RuleSpec::ToolTimeout,
            RuleSpec::RetrievalNoise {
                top_k_limit: thresholds.top_k_noise_limit,
                retrieved_token_limit: thresholds.retrieved_token_limit,
            },
        ]
    }

    pub fn mode(&self) -> FailureMode {
        match self {
            Self::ContextOverflow => FailureMode::ContextOverflow,
            Self::SilentTruncation { .. } => FailureMode::SilentTruncationRisk,
            Self::LatencyBreach { .. } => FailureMode::LatencyBreach,
            Self::CostRunaway { .. } => FailureMode::CostRunaway,
            Self::ToolTimeout => FailureMode::ToolTimeoutRisk,
            Self::RetrievalNoise { .. } => FailureMode::RetrievalNoiseRisk,
        }
    }

    /// Evaluate against one result. Returns the severity, trigger text, and
    /// signal snapshot when the rule fires.
    fn evaluate(
        &self,
        result: &ProbeResult,
        config: &ProbeConfig,
    ) -> Option<(Severity, String, f64)> {
        let telemetry = &result.telemetry;
        let prompt_tokens = telemetry.input_tokens + telemetry.retrieved_tokens;

        match self {
            Self::ContextOverflow => {
                if prompt_tokens > config.context_window {
                    Some((
                        Severity::High,
                        format!(
                            "prompt {} tokens exceeds {}-token context window",
                            prompt_tokens, config.context_window
                        ),
                        f64::from(prompt_tokens),
                    ))
                } else {
                    None
                }
            }
            Self::SilentTruncation { high_water } => {
                let overflowed = prompt_tokens > config.context_window;
                if !overflowed && result.context_utilization > *high_water {
                    Some((
                        Severity::Med,
                        format!(
                            "context {:.0}% full, past the {:.0}% high-water mark",
                            result.context_utilization * 100.0,
                            high_water * 100.0
                        ),
                        result.context_utilization,
                    ))
                } else {
                    None
                }
            }
            Self::LatencyBreach { slo_ms } => {
                if telemetry.latency_ms > *slo_ms {
                    let severity = if telemetry.latency_ms > LATENCY_ESCALATION_FACTOR * slo_ms {
                        Severity::High
                    } else {
                        Severity::Med
                    };
                    Some((
                        severity,
                        format!(
                            "latency {:.0}ms over the {:.0}ms objective",
                            telemetry.latency_ms, slo_ms
                        ),
                        telemetry.latency_ms,
                    ))
                } else {
                    None
                }
            }
            Self::CostRunaway { budget_usd } => {
                if result.estimated_cost > *budget_usd {
                    Some((
                        Severity::High,
                        format!(
                            "estimated cost ${:.4} over the ${:.4} budget",
                            result.estimated_cost, budget_usd
                        ),
                        result.estimated_cost,
                    ))
                } else {
                    None
                }
            }
            Self::ToolTimeout => {
                let errored = telemetry.error.is_some();
                if telemetry.tool_timeouts > 0 && (telemetry.tool_calls > 0 || errored) {
                    let trigger = if errored {
                        format!(
                            "provider call failed: {}",
                            telemetry.error.as_deref().unwrap_or("unknown error")
                        )
                    } else {
                        format!(
                            "{} of {} tool calls timed out",
                            telemetry.tool_timeouts, telemetry.tool_calls
                        )
                    };
                    Some((Severity::High, trigger, f64::from(telemetry.tool_timeouts)))
                } else {
                    None
                }
            }
            Self::RetrievalNoise {
                top_k_limit,
                retrieved_token_limit,
            } => {
                if config.top_k > *top_k_limit && telemetry.retrieved_tokens > 0 {
                    Some((
                        Severity::Med,
                        format!(
                            "retrieval breadth {} over the noise limit of {}",
                            config.top_k, top_k_limit
                        ),
                        f64::from(config.top_k),
                    ))
                } else if telemetry.retrieved_tokens > *retrieved_token_limit {
                    Some((
                        Severity::Low,
                        format!(
                            "{} retrieved tokens over the {}-token volume limit",
                            telemetry.retrieved_tokens, retrieved_token_limit
                        ),
                        f64::from(telemetry.retrieved_tokens),
                    ))
                } else {
                    None
                }
            }
        }
    }
}

/// Test every rule against every result.
///
/// Pure and order-independent: shuffling either input changes only the
/// ordering of the returned events, never their multiset.
pub fn classify(
    results: &[ProbeResult],
    rules: &[RuleSpec],
    configs: &BTreeMap<ConfigId, ProbeConfig>,
) -> Vec<FailureEvent> {
    let mut events = Vec::new();
    for result in results {
        let Some(config) = configs.get(&result.config_id) else {
            warn!(config = %result.config_id, "result references unknown configuration; skipping");
            continue;
        };
        for rule in rules {
            if let Some((severity, trigger, signal)) = rule.evaluate(result, config) {
                events.push(FailureEvent {
                    item_id: result.item_id.clone(),
                    config_id: result.config_id.clone(),
                    mode: rule.mode(),
                    severity,
                    trigger,
                    signal,
                    timestamp_ms: result.telemetry.timestamp_ms,
                });
            }
        }
    }
    events
}

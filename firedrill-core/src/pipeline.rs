//! End-to-end analysis pipeline.
//!
//! Validation → probe engine → classifier → {estimator, aggregator,
//! timeline}, with the last three consuming the same event list
//! independently. Validation failures are batch-fatal and surface before
//! any probe runs; everything after that point degrades to partial results
//! rather than erroring.
//!
//! Per-configuration trial counts are derived from the engine's actual
//! output rather than accepted from the caller, so the point estimates can
//! never drift out of sync with the probes that actually ran.

use crate::aggregate::{assemble_stats, build_comparisons, build_distributions};
use crate::engine::{AbortSignal, ProbeEngine, ProgressCallback, RunOutcome};
use crate::provider::{ProviderAdapter, resolve_providers};
use crate::rules::{RuleSpec, Thresholds, classify};
use crate::timeline::build_timeline;
use firedrill_common::{
    AnalysisReport, ConfigId, DrillError, ExecutionMode, ProbeConfig, Provider, RunOptions,
    RunSummary, ThresholdMode, WorkloadItem,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::info;

/// Non-serializable run inputs: the streaming callback and the abort
/// handle. Everything else travels in [`RunOptions`].
#[derive(Default)]
pub struct RunHooks {
    pub progress: Option<ProgressCallback>,
    pub abort: AbortSignal,
}

/// Validate a drill suite and resolve every configuration's provider.
///
/// All failures here are batch-fatal: an invalid suite cannot produce a
/// meaningful comparison, so nothing runs.
pub fn validate_suite(
    configs: &[ProbeConfig],
    items: &[WorkloadItem],
) -> Result<BTreeMap<ConfigId, Provider>, DrillError> {
    if configs.is_empty() {
        return Err(DrillError::NoConfigurations);
    }
    if items.is_empty() {
        return Err(DrillError::NoWorkloadItems);
    }

    let mut seen_configs = BTreeSet::new();
    for config in configs {
        if !seen_configs.insert(&config.id) {
            return Err(DrillError::DuplicateConfigId(config.id.to_string()));
        }
        if config.context_window == 0 {
            return Err(DrillError::InvalidConfig {
                id: config.id.to_string(),
                reason: "context window must be positive".into(),
            });
        }
        if !config.temperature.is_finite() || config.temperature < 0.0 {
            return Err(DrillError::InvalidConfig {
                id: config.id.to_string(),
                reason: format!("temperature {} is not a non-negative number", config.temperature),
            });
        }
        if !config.cost_per_1k_tokens.is_finite() || config.cost_per_1k_tokens < 0.0 {
            return Err(DrillError::InvalidConfig {
                id: config.id.to_string(),
                reason: format!(
                    "cost per 1k tokens {} is not a non-negative number",
                    config.cost_per_1k_tokens
                ),
            });
        }
    }

    let mut seen_items = BTreeSet::new();
    for item in items {
        if !seen_items.insert(&item.id) {
            return Err(DrillError::DuplicateItemId(item.id.to_string()));
        }
    }

    resolve_providers(configs)
}

/// Run the full analysis in simulate mode.
///
/// Requesting real mode through this entry point is an error; real mode
/// needs a provider adapter, see [`run_analysis_with_adapter`].
pub async fn run_analysis(
    configs: &[ProbeConfig],
    items: &[WorkloadItem],
    options: &RunOptions,
    hooks: RunHooks,
) -> Result<AnalysisReport, DrillError> {
    let providers = validate_suite(configs, items)?;
    if options.mode == ExecutionMode::Real {
        return Err(DrillError::MissingAdapter);
    }

    info!(
        configs = configs.len(),
        items = items.len(),
        seed = options.seed,
        "starting simulated drill"
    );
    let engine = ProbeEngine::new(options.clone());
    let outcome = engine
        .run_simulated(configs, &providers, items, hooks.progress, &hooks.abort)
        .await;

    Ok(finish(configs, items, options, outcome))
}

/// Run the full analysis in real mode through the supplied provider
/// adapter. Simulate-mode options route to the simulator and ignore the
/// adapter.
pub async fn run_analysis_with_adapter<A: ProviderAdapter>(
    configs: &[ProbeConfig],
    items: &[WorkloadItem],
    options: &RunOptions,
    adapter: Arc<A>,
    hooks: RunHooks,
) -> Result<AnalysisReport, DrillError> {
    let providers = validate_suite(configs, items)?;

    let engine = ProbeEngine::new(options.clone());
    let outcome = match options.mode {
        ExecutionMode::Simulate => {
            engine
                .run_simulated(configs, &providers, items, hooks.progress, &hooks.abort)
                .await
        }
        ExecutionMode::Real => {
            info!(
                configs = configs.len(),
                items = items.len(),
                max_concurrent = options.max_concurrent_calls,
                "starting real-mode drill"
            );
            engine
                .run_real(adapter, configs, items, hooks.progress, &hooks.abort)
                .await
        }
    };

    Ok(finish(configs, items, options, outcome))
}

/// Classify, estimate, aggregate, and assemble the report from completed
/// probes. Partial outcomes flow through unchanged; errored probes are
/// already represented as error telemetry.
fn finish(
    configs: &[ProbeConfig],
    items: &[WorkloadItem],
    options: &RunOptions,
    outcome: RunOutcome,
) -> AnalysisReport {
    let thresholds = match options.threshold_mode {
        ThresholdMode::Fixed => Thresholds::fixed(),
        ThresholdMode::Adaptive => Thresholds::adaptive(&outcome.results, &options.tolerances),
    };
    let rules = RuleSpec::default_set(&thresholds);

    let lookup: BTreeMap<ConfigId, ProbeConfig> = configs
        .iter()
        .map(|config| (config.id.clone(), config.clone()))
        .collect();
    let events = classify(&outcome.results, &rules, &lookup);
    info!(
        probes = outcome.results.len(),
        events = events.len(),
        "classification complete"
    );

    // n per configuration comes from what actually ran, not from a
    // caller-supplied count that may describe a different batch.
    let mut trials: BTreeMap<ConfigId, usize> = BTreeMap::new();
    for result in &outcome.results {
        *trials.entry(result.config_id.clone()).or_default() += 1;
    }

    let config_ids: Vec<ConfigId> = configs.iter().map(|c| c.id.clone()).collect();
    let stats = assemble_stats(&config_ids, &events, &trials, options.seed);
    let comparisons = build_comparisons(&stats, options.seed);
    let distributions = build_distributions(&events, items);
    let timeline = build_timeline(&events);

    AnalysisReport {
        run: RunSummary {
            mode: options.mode.to_string(),
            seed: options.seed,
            probes_planned: outcome.probes_planned,
            probes_completed: outcome.results.len(),
            aborted: outcome.aborted,
        },
        configs: stats,
        comparisons,
        distributions,
        timeline,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use firedrill_common::ItemId;

    fn config(id: &str, model: &str) -> ProbeConfig {
        ProbeConfig {
            id: ConfigId::new(id),
            model: model.into(),
            context_window: 8192,
            top_k: 4,
            chunk_size: 512,
            max_output_tokens: 1024,
            tools_enabled: false,
            temperature: 0.7,
            cost_per_1k_tokens: 0.01,
        }
    }

    fn item(id: &str) -> WorkloadItem {
        WorkloadItem {
            id: ItemId::new(id),
            category: "short".into(),
            content: "What is the refund policy for enterprise contracts?".into(),
            expects_tools: false,
            expects_grounding: true,
        }
    }

    #[test]
    fn test_validate_empty_configs() {
        let err = validate_suite(&[], &[item("w1")]).unwrap_err();
        assert!(matches!(err, DrillError::NoConfigurations));
    }

    #[test]
    fn test_validate_empty_items() {
        let err = validate_suite(&[config("a", "gpt-4o")], &[]).unwrap_err();
        assert!(matches!(err, DrillError::NoWorkloadItems));
    }

    #[test]
    fn test_validate_duplicate_config_id() {
        let configs = vec![config("a", "gpt-4o"), config("a", "claude-sonnet-4")];
        let err = validate_suite(&configs, &[item("w1")]).unwrap_err();
        assert!(matches!(err, DrillError::DuplicateConfigId(id) if id == "a"));
    }

    #[test]
    fn test_validate_duplicate_item_id() {
        let err =
            validate_suite(&[config("a", "gpt-4o")], &[item("w1"), item("w1")]).unwrap_err();
        assert!(matches!(err, DrillError::DuplicateItemId(id) if id == "w1"));
    }

    #[test]
    fn test_validate_zero_context_window() {
        let mut bad = config("a", "gpt-4o");
        bad.context_window = 0;
        let err = validate_suite(&[bad], &[item("w1")]).unwrap_err();
        assert!(matches!(err, DrillError::InvalidConfig { .. }));
    }

    #[test]
    fn test_validate_non_finite_temperature() {
        let mut bad = config("a", "gpt-4o");
        bad.temperature = f64::NAN;
        let err = validate_suite(&[bad], &[item("w1")]).unwrap_err();
        assert!(matches!(err, DrillError::InvalidConfig { .. }));
    }

    #[test]
    fn test_validate_negative_cost() {
        let mut bad = config("a", "gpt-4o");
        bad.cost_per_1k_tokens = -0.01;
        let err = validate_suite(&[bad], &[item("w1")]).unwrap_err();
        assert!(matches!(err, DrillError::InvalidConfig { .. }));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let err = validate_suite(&[config("a", "palm-2")], &[item("w1")]).unwrap_err();
        assert!(matches!(err, DrillError::UnknownProvider { .. }));
    }

    #[tokio::test]
    async fn test_run_analysis_rejects_real_mode_without_adapter() {
        let options = RunOptions {
            mode: ExecutionMode::Real,
            ..RunOptions::default()
        };
        let err = run_analysis(
            &[config("a", "gpt-4o")],
            &[item("w1")],
            &options,
            RunHooks::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DrillError::MissingAdapter));
    }

    #[tokio::test]
    async fn test_run_analysis_basic_shape() {
        let configs = vec![config("a", "gpt-4o"), config("b", "claude-sonnet-4")];
        let items: Vec<WorkloadItem> = (0..5).map(|i| item(&format!("w{i}"))).collect();
        let options = RunOptions {
            progress_pause_ms: 0,
            ..RunOptions::default()
        };

        let report = run_analysis(&configs, &items, &options, RunHooks::default())
            .await
            .unwrap();

        assert_eq!(report.run.probes_planned, 10);
        assert_eq!(report.run.probes_completed, 10);
        assert!(!report.run.aborted);
        assert_eq!(report.run.mode, "simulate");
        assert_eq!(report.configs.len(), 2);
        assert_eq!(report.comparisons.len(), 1);
        for stats in report.configs.values() {
            assert_eq!(stats.trials, 5);
        }
    }

    #[tokio::test]
    async fn test_run_analysis_validation_precedes_execution() {
        // Real mode + invalid suite: the suite error wins because nothing
        // may run before validation.
        let options = RunOptions {
            mode: ExecutionMode::Real,
            ..RunOptions::default()
        };
        let err = run_analysis(&[], &[item("w1")], &options, RunHooks::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DrillError::NoConfigurations));
    }
}

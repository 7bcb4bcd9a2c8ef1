//! Aggregation of per-configuration statistics, event distributions, and
//! pairwise comparisons into the keyed result set.
//!
//! The caller supplies the explicit configuration-id set: inferring
//! participants from the events present would silently drop configurations
//! that never failed, which are exactly the interesting ones.

use crate::rng::DrillRng;
use crate::stats;
use firedrill_common::{
    ComparisonResult, ConfigId, DistributionEntry, Distributions, FailureEvent, ItemId, Stats,
    WorkloadItem,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Build Stats for every configuration in the explicit id set.
///
/// `trials` maps each configuration to the number of probes actually run
/// for it; configurations missing from the map are treated as untested
/// (n = 0) rather than dropped.
pub fn assemble_stats(
    config_ids: &[ConfigId],
    events: &[FailureEvent],
    trials: &BTreeMap<ConfigId, usize>,
    seed: u64,
) -> BTreeMap<ConfigId, Stats> {
    let mut out = BTreeMap::new();
    for config_id in config_ids {
        let total = trials.get(config_id).copied().unwrap_or(0);
        let stats = stats::estimate(events, config_id, total, seed);
        debug!(
            config = %config_id,
            failures = stats.failures,
            trials = stats.trials,
            p_hat = stats.p_hat,
            "assembled configuration stats"
        );
        out.insert(config_id.clone(), stats);
    }
    out
}

/// Categorical breakdowns of the full event list: by failure mode, and by
/// workload category joined through the item's label.
pub fn build_distributions(events: &[FailureEvent], items: &[WorkloadItem]) -> Distributions {
    let categories: BTreeMap<&ItemId, &str> = items
        .iter()
        .map(|item| (&item.id, item.category.as_str()))
        .collect();

    let total = events.len();
    let mut by_mode: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_category: BTreeMap<String, usize> = BTreeMap::new();

    for event in events {
        *by_mode.entry(event.mode.as_str().to_string()).or_default() += 1;
        let category = categories
            .get(&event.item_id)
            .copied()
            .unwrap_or("uncategorized");
        *by_category.entry(category.to_string()).or_default() += 1;
    }

    let share = |count: usize| -> f64 {
        if total > 0 {
            count as f64 / total as f64
        } else {
            0.0
        }
    };
    let entries = |counts: BTreeMap<String, usize>| -> BTreeMap<String, DistributionEntry> {
        counts
            .into_iter()
            .map(|(key, count)| {
                (
                    key,
                    DistributionEntry {
                        count,
                        share: share(count),
                    },
                )
            })
            .collect()
    };

    Distributions {
        by_failure_mode: entries(by_mode),
        by_category: entries(by_category),
    }
}

/// All C-choose-2 pairwise comparisons over the configuration set, in
/// sorted id order so output is stable.
pub fn build_comparisons(
    stats: &BTreeMap<ConfigId, Stats>,
    seed: u64,
) -> Vec<ComparisonResult> {
    let ids: Vec<&ConfigId> = stats.keys().collect();
    let mut comparisons = Vec::new();

    for (i, a) in ids.iter().enumerate() {
        for b in ids.iter().skip(i + 1) {
            let mut rng = DrillRng::stream(seed, &["compare", a.as_str(), b.as_str()]);
            let p_a_safer = stats::compare(&stats[*a], &stats[*b], &mut rng);
            comparisons.push(ComparisonResult {
                config_a: (*a).clone(),
                config_b: (*b).clone(),
                p_a_safer,
            });
        }
    }
    comparisons
}

//! Statistical estimation of per-configuration failure rates.
//!
//! Turns failure counts into calibrated uncertainty via three independent
//! interval methods — no single method is deterministic, narrow, and
//! correct under all n, so the core computes and reports all three:
//!
//! - **Wilson score**: closed form, always defined for n > 0, width
//!   shrinks predictably with n.
//! - **Bootstrap**: Bernoulli resampling with empirical percentiles;
//!   deterministic because the RNG stream is derived from the run seed.
//! - **Bayesian credible**: Beta(1+k, 1+n-k) posterior under a uniform
//!   prior, sampled as X/(X+Y) with X and Y sums of unit exponentials
//!   (integer shape parameters make the Gamma-via-exponentials trick exact,
//!   so no general Gamma sampler is needed).
//!
//! Edge cases never panic: n = 0 yields p̂ = 0 with maximally uncertain
//! intervals, and comparisons against an untested configuration return the
//! 0.5 sentinel.

use crate::rng::DrillRng;
use firedrill_common::{ConfigId, FailureEvent, Interval, ItemId, Stats};
use std::collections::BTreeSet;

/// Two-sided significance level for all three intervals (95%).
const ALPHA: f64 = 0.05;

/// z-score for the 97.5th normal percentile.
const WILSON_Z: f64 = 1.959_963_984_540_054;

/// Bernoulli resampling iterations for the bootstrap interval.
const BOOTSTRAP_ITERATIONS: usize = 1_000;

/// Posterior draws for the Bayesian interval and pairwise comparison.
const POSTERIOR_SAMPLES: usize = 5_000;

/// Estimate failure statistics for one configuration.
///
/// `k` counts distinct workload items with at least one event — a trial
/// either failed or it didn't, however many rules fired on it.
/// `total_trials` must be the true number of probes run for the
/// configuration; `n = max(total_trials, k)` guards against inconsistent
/// inputs and `k` is then clamped so p̂ never exceeds 1.
pub fn estimate(
    events: &[FailureEvent],
    config_id: &ConfigId,
    total_trials: usize,
    seed: u64,
) -> Stats {
    let failed_items: BTreeSet<&ItemId> = events
        .iter()
        .filter(|e| &e.config_id == config_id)
        .map(|e| &e.item_id)
        .collect();

    let k = failed_items.len();
    let n = total_trials.max(k);
    let k = k.min(n);

    let p_hat = if n > 0 { k as f64 / n as f64 } else { 0.0 };

    let mut bootstrap_rng = DrillRng::stream(seed, &["bootstrap", config_id.as_str()]);
    let mut bayes_rng = DrillRng::stream(seed, &["bayes", config_id.as_str()]);

    Stats {
        failures: k,
        trials: n,
        p_hat,
        wilson: wilson_interval(k, n),
        bootstrap: bootstrap_interval(k, n, &mut bootstrap_rng),
        bayes: bayes_interval(k, n, &mut bayes_rng),
    }
}

/// Wilson score interval for k failures in n trials.
pub fn wilson_interval(k: usize, n: usize) -> Interval {
    if n == 0 {
        return Interval::vacuous();
    }
    let n_f = n as f64;
    let p = k as f64 / n_f;
    let z2 = WILSON_Z * WILSON_Z;

    let denom = 1.0 + z2 / n_f;
    let center = (p + z2 / (2.0 * n_f)) / denom;
    let half = WILSON_Z * (p * (1.0 - p) / n_f + z2 / (4.0 * n_f * n_f)).sqrt() / denom;

    Interval::new(center - half, center + half)
}

/// Bootstrap percentile interval: resample n Bernoulli(p̂) trials per
/// iteration and take the empirical (α/2, 1-α/2) percentiles of the
/// resampled proportions.
pub fn bootstrap_interval(k: usize, n: usize, rng: &mut DrillRng) -> Interval {
    if n == 0 {
        return Interval::vacuous();
    }
    let p = k as f64 / n as f64;

    let mut proportions = Vec::with_capacity(BOOTSTRAP_ITERATIONS);
    for _ in 0..BOOTSTRAP_ITERATIONS {
        let successes = (0..n).filter(|_| rng.next_bool(p)).count();
        proportions.push(successes as f64 / n as f64);
    }
    proportions.sort_by(f64::total_cmp);

    percentile_interval(&proportions)
}

/// Bayesian credible interval from the Beta(1+k, 1+n-k) posterior.
pub fn bayes_interval(k: usize, n: usize, rng: &mut DrillRng) -> Interval {
    if n == 0 {
        return Interval::vacuous();
    }

    let mut samples = Vec::with_capacity(POSTERIOR_SAMPLES);
    for _ in 0..POSTERIOR_SAMPLES {
        samples.push(beta_sample(rng, k + 1, n - k + 1));
    }
    samples.sort_by(f64::total_cmp);

    percentile_interval(&samples)
}

/// P(A is safer than B): the fraction of matched posterior draws where A's
/// sampled failure rate is strictly below B's. Returns exactly 0.5 when
/// either side has zero trials.
pub fn compare(a: &Stats, b: &Stats, rng: &mut DrillRng) -> f64 {
    if a.trials == 0 || b.trials == 0 {
        return 0.5;
    }

    let mut a_safer = 0usize;
    for _ in 0..POSTERIOR_SAMPLES {
        let sample_a = beta_sample(rng, a.failures + 1, a.trials - a.failures + 1);
        let sample_b = beta_sample(rng, b.failures + 1, b.trials - b.failures + 1);
        if sample_a < sample_b {
            a_safer += 1;
        }
    }
    a_safer as f64 / POSTERIOR_SAMPLES as f64
}

/// Draw from Beta(a, b) for integer shapes a, b >= 1: X/(X+Y) with X the
/// sum of a unit exponentials and Y the sum of b.
fn beta_sample(rng: &mut DrillRng, a: usize, b: usize) -> f64 {
    let x: f64 = (0..a).map(|_| rng.next_exponential()).sum();
    let y: f64 = (0..b).map(|_| rng.next_exponential()).sum();
    x / (x + y)
}

/// (α/2, 1-α/2) nearest-rank percentiles of an ascending-sorted sample.
fn percentile_interval(sorted: &[f64]) -> Interval {
    let rank = |q: f64| -> f64 {
        let idx = ((sorted.len() - 1) as f64 * q).round() as usize;
        sorted[idx.min(sorted.len() - 1)]
    };
    Interval::new(rank(ALPHA / 2.0), rank(1.0 - ALPHA / 2.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use firedrill_common::{FailureMode, Severity};
    use proptest::prelude::*;

    fn event(config: &str, item: &str) -> FailureEvent {
        FailureEvent {
            item_id: ItemId::new(item),
            config_id: ConfigId::new(config),
            mode: FailureMode::LatencyBreach,
            severity: Severity::Med,
            trigger: "latency over objective".into(),
            signal: 9_000.0,
            timestamp_ms: 1_000,
        }
    }

    fn stats(k: usize, n: usize) -> Stats {
        Stats {
            failures: k,
            trials: n,
            p_hat: if n > 0 { k as f64 / n as f64 } else { 0.0 },
            wilson: wilson_interval(k, n),
            bootstrap: Interval::vacuous(),
            bayes: Interval::vacuous(),
        }
    }

    #[test]
    fn test_estimate_counts_distinct_items_once() {
        // Two rules firing on the same item are one failed trial.
        let events = vec![
            event("a", "w1"),
            event("a", "w1"),
            event("a", "w2"),
            event("b", "w3"),
        ];
        let stats = estimate(&events, &ConfigId::new("a"), 10, 42);
        assert_eq!(stats.failures, 2);
        assert_eq!(stats.trials, 10);
        assert!((stats.p_hat - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_estimate_guards_inconsistent_trials() {
        // More failed items than claimed trials: n grows to k.
        let events = vec![event("a", "w1"), event("a", "w2"), event("a", "w3")];
        let stats = estimate(&events, &ConfigId::new("a"), 1, 42);
        assert_eq!(stats.trials, 3);
        assert_eq!(stats.failures, 3);
        assert!((stats.p_hat - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_estimate_zero_trials_is_degenerate_not_fatal() {
        let stats = estimate(&[], &ConfigId::new("a"), 0, 42);
        assert_eq!(stats.trials, 0);
        assert_eq!(stats.p_hat, 0.0);
        assert_eq!(stats.wilson, Interval::vacuous());
        assert_eq!(stats.bootstrap, Interval::vacuous());
        assert_eq!(stats.bayes, Interval::vacuous());
    }

    #[test]
    fn test_estimate_zero_failures_has_zero_lower_bounds() {
        let stats = estimate(&[], &ConfigId::new("a"), 40, 42);
        assert_eq!(stats.failures, 0);
        assert!(stats.wilson.lower.abs() < 1e-12);
        assert!(stats.bootstrap.lower.abs() < 1e-12);
        assert!(stats.wilson.upper > 0.0);
    }

    #[test]
    fn test_estimate_is_deterministic_under_seed() {
        let events = vec![event("a", "w1"), event("a", "w2")];
        let first = estimate(&events, &ConfigId::new("a"), 20, 42);
        let second = estimate(&events, &ConfigId::new("a"), 20, 42);
        assert_eq!(first, second);

        let reseeded = estimate(&events, &ConfigId::new("a"), 20, 43);
        // Closed form is seed-free; the sampled intervals move.
        assert_eq!(first.wilson, reseeded.wilson);
        assert!(first.bootstrap != reseeded.bootstrap || first.bayes != reseeded.bayes);
    }

    #[test]
    fn test_wilson_known_value() {
        // k=2, n=10: Wilson 95% interval is approximately (0.057, 0.510).
        let interval = wilson_interval(2, 10);
        assert!((interval.lower - 0.057).abs() < 0.005);
        assert!((interval.upper - 0.510).abs() < 0.005);
    }

    #[test]
    fn test_bayes_interval_brackets_point_estimate() {
        let mut rng = DrillRng::stream(42, &["bayes", "t"]);
        let interval = bayes_interval(2, 10, &mut rng);
        assert!(interval.lower < 0.2);
        assert!(interval.upper > 0.2);
        assert!(interval.upper - interval.lower < 0.6);
    }

    #[test]
    fn test_bootstrap_interval_shrinks_with_n() {
        let mut rng = DrillRng::stream(42, &["bootstrap", "small"]);
        let small = bootstrap_interval(2, 10, &mut rng);
        let mut rng = DrillRng::stream(42, &["bootstrap", "large"]);
        let large = bootstrap_interval(80, 400, &mut rng);
        assert!(
            large.upper - large.lower < small.upper - small.lower,
            "interval should narrow as n grows"
        );
    }

    #[test]
    fn test_compare_self_is_near_half() {
        let s = stats(3, 20);
        let mut rng = DrillRng::stream(42, &["compare", "self"]);
        let p = compare(&s, &s, &mut rng);
        assert!((p - 0.5).abs() < 0.03, "self comparison {p} too far from 0.5");
    }

    #[test]
    fn test_compare_clean_config_beats_failing_one() {
        let clean = stats(0, 10);
        let failing = stats(8, 10);
        let mut rng = DrillRng::stream(42, &["compare", "clean-vs-failing"]);
        let p = compare(&clean, &failing, &mut rng);
        assert!(p > 0.5, "clean configuration must be strictly safer, got {p}");
        assert!(p > 0.95, "posterior separation should be strong, got {p}");
    }

    #[test]
    fn test_compare_zero_trials_sentinel() {
        let untested = stats(0, 0);
        let tested = stats(2, 10);
        let mut rng = DrillRng::stream(42, &["compare", "sentinel"]);
        assert_eq!(compare(&untested, &tested, &mut rng), 0.5);
        assert_eq!(compare(&tested, &untested, &mut rng), 0.5);
        assert_eq!(compare(&untested, &untested, &mut rng), 0.5);
    }

    #[test]
    fn test_beta_sample_in_unit_interval() {
        let mut rng = DrillRng::new(7);
        for _ in 0..1_000 {
            let v = beta_sample(&mut rng, 3, 9);
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_beta_sample_mean_tracks_shape() {
        // Beta(3, 9) has mean 0.25.
        let mut rng = DrillRng::new(11);
        let n = 20_000;
        let sum: f64 = (0..n).map(|_| beta_sample(&mut rng, 3, 9)).sum();
        let mean = sum / f64::from(n);
        assert!((mean - 0.25).abs() < 0.01, "mean {mean} too far from 0.25");
    }

    proptest! {
        // The sampled methods are expensive; a few dozen cases over the
        // (k, n) grid is plenty to catch an ordering or clamping bug.
        #![proptest_config(ProptestConfig::with_cases(48))]

        /// Interval sanity for every method across the whole (k, n) grid.
        #[test]
        fn prop_intervals_are_ordered_and_bounded(n in 1usize..200, k_frac in 0.0f64..=1.0) {
            let k = ((n as f64) * k_frac).floor() as usize;
            let k = k.min(n);

            let wilson = wilson_interval(k, n);
            let mut rng = DrillRng::stream(42, &["bootstrap", "prop"]);
            let bootstrap = bootstrap_interval(k, n, &mut rng);
            let mut rng = DrillRng::stream(42, &["bayes", "prop"]);
            let bayes = bayes_interval(k, n, &mut rng);

            for interval in [wilson, bootstrap, bayes] {
                prop_assert!(interval.lower >= 0.0);
                prop_assert!(interval.upper <= 1.0);
                prop_assert!(interval.lower <= interval.upper);
            }
        }

        /// The Wilson interval always contains the point estimate.
        #[test]
        fn prop_wilson_contains_p_hat(n in 1usize..400, k_frac in 0.0f64..=1.0) {
            let k = (((n as f64) * k_frac).floor() as usize).min(n);
            let p = k as f64 / n as f64;
            let interval = wilson_interval(k, n);
            prop_assert!(interval.lower <= p + 1e-12);
            prop_assert!(interval.upper >= p - 1e-12);
        }
    }
}

//! Deterministic telemetry simulator.
//!
//! Stands in for real provider calls the way a mock transport stands in for
//! SSH in CI: fast, offline, and seeded. Shaping reflects configuration
//! semantics so failure rates are configuration-sensitive rather than
//! constant — retrieval breadth and chunk size drive retrieved-token
//! volume, tool telemetry only appears when both the configuration and the
//! workload item call for it, workload category scales output length, and
//! each provider has its own latency/verbosity profile.
//!
//! Every draw comes from a per-(configuration, item) stream derived from
//! the run seed, so probes can execute in any order, on any number of
//! tasks, and still reproduce bit-for-bit.

use crate::rng::DrillRng;
use firedrill_common::{ProbeConfig, Provider, Telemetry, WorkloadItem};

/// Fixed virtual epoch for simulated timestamps (2025-06-15T13:06:40Z).
/// Wall clock never leaks into simulate mode; reruns must be byte-identical.
pub const SIM_EPOCH_MS: i64 = 1_750_000_000_000;

/// Virtual spacing between consecutive probe dispatches.
pub const SIM_DISPATCH_SPACING_MS: i64 = 125;

/// Per-provider latency and verbosity characteristics.
#[derive(Debug, Clone, Copy)]
pub struct ProviderProfile {
    /// Fixed round-trip overhead in milliseconds.
    pub base_latency_ms: f64,
    /// Generation cost per output token in milliseconds.
    pub per_output_token_ms: f64,
    /// Uniform latency noise amplitude in milliseconds.
    pub jitter_ms: f64,
    /// Output-length multiplier relative to the category baseline.
    pub verbosity: f64,
    /// Probability that any given tool call completes in time.
    pub tool_reliability: f64,
}

impl ProviderProfile {
    pub fn for_provider(provider: Provider) -> Self {
        match provider {
            Provider::OpenAi => Self {
                base_latency_ms: 380.0,
                per_output_token_ms: 14.0,
                jitter_ms: 260.0,
                verbosity: 1.0,
                tool_reliability: 0.97,
            },
            Provider::Anthropic => Self {
                base_latency_ms: 460.0,
                per_output_token_ms: 16.0,
                jitter_ms: 220.0,
                verbosity: 1.15,
                tool_reliability: 0.98,
            },
            Provider::Google => Self {
                base_latency_ms: 340.0,
                per_output_token_ms: 12.0,
                jitter_ms: 300.0,
                verbosity: 0.9,
                tool_reliability: 0.95,
            },
            Provider::Mistral => Self {
                base_latency_ms: 280.0,
                per_output_token_ms: 10.0,
                jitter_ms: 180.0,
                verbosity: 0.8,
                tool_reliability: 0.93,
            },
            Provider::Meta => Self {
                base_latency_ms: 520.0,
                per_output_token_ms: 20.0,
                jitter_ms: 340.0,
                verbosity: 1.05,
                tool_reliability: 0.9,
            },
        }
    }
}

/// Output-token baseline per workload category.
fn category_output_baseline(category: &str) -> f64 {
    match category {
        "short" => 90.0,
        "long-context" => 420.0,
        "tool-heavy" => 260.0,
        _ => 160.0,
    }
}

/// Roughly four characters per token, never less than one token.
fn estimate_input_tokens(content: &str) -> f64 {
    (content.len() as f64 / 4.0).max(1.0)
}

/// Produce one deterministic telemetry record.
///
/// `dispatch_index` is the probe's position in the (configuration x item)
/// cross product and drives the virtual clock; the draw stream itself is
/// keyed purely by ids so reordering the plan cannot change telemetry
/// values.
pub fn simulate_probe(
    config: &ProbeConfig,
    provider: Provider,
    item: &WorkloadItem,
    seed: u64,
    dispatch_index: usize,
) -> Telemetry {
    let mut rng = DrillRng::stream(seed, &[config.id.as_str(), item.id.as_str()]);
    let profile = ProviderProfile::for_provider(provider);

    // Prompt side: content estimate with mild variance.
    let input_tokens = (estimate_input_tokens(&item.content) * rng.next_range(0.9, 1.1))
        .round()
        .max(1.0) as u32;

    // Retrieval side: breadth x chunk size, partially filled chunks.
    let retrieved_tokens = if item.expects_grounding && config.top_k > 0 {
        let capacity = f64::from(config.top_k) * f64::from(config.chunk_size);
        (capacity * rng.next_range(0.55, 0.95)).round() as u32
    } else {
        0
    };

    // Output side: category baseline x provider verbosity, with temperature
    // widening the spread, clamped to the configured ceiling.
    let spread = 1.0 + config.temperature * rng.next_range(-0.25, 0.55);
    let mut output_tokens =
        (category_output_baseline(&item.category) * profile.verbosity * spread)
            .round()
            .max(1.0) as u32;
    if config.max_output_tokens > 0 {
        output_tokens = output_tokens.min(config.max_output_tokens);
    }

    // Tool side: only when the configuration enables tools AND the item
    // expects them.
    let (tool_calls, tool_timeouts) = if config.tools_enabled && item.expects_tools {
        let calls = 1 + rng.next_below(3);
        let timeout_p =
            ((1.0 - profile.tool_reliability) * (1.0 + 0.5 * config.temperature)).clamp(0.0, 1.0);
        let timeouts = (0..calls).filter(|_| rng.next_bool(timeout_p)).count() as u32;
        (calls, timeouts)
    } else {
        (0, 0)
    };

    let prompt_tokens = f64::from(input_tokens) + f64::from(retrieved_tokens);
    let latency_ms = profile.base_latency_ms
        + prompt_tokens * 0.02
        + f64::from(output_tokens) * profile.per_output_token_ms
        + f64::from(tool_calls) * 850.0
        + f64::from(tool_timeouts) * 2_400.0
        + profile.jitter_ms * rng.next_f64();

    Telemetry {
        input_tokens,
        retrieved_tokens,
        output_tokens,
        latency_ms,
        tool_calls,
        tool_timeouts,
        timestamp_ms: SIM_EPOCH_MS
            + dispatch_index as i64 * SIM_DISPATCH_SPACING_MS
            + latency_ms as i64,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use firedrill_common::{ConfigId, ItemId};

    fn config(id: &str) -> ProbeConfig {
        ProbeConfig {
            id: ConfigId::new(id),
            model: "gpt-4o".into(),
            context_window: 8192,
            top_k: 4,
            chunk_size: 512,
            max_output_tokens: 2048,
            tools_enabled: false,
            temperature: 0.7,
            cost_per_1k_tokens: 0.01,
        }
    }

    fn item(id: &str, category: &str) -> WorkloadItem {
        WorkloadItem {
            id: ItemId::new(id),
            category: category.into(),
            content: "Summarize the attached quarterly report in three bullet points.".into(),
            expects_tools: false,
            expects_grounding: true,
        }
    }

    #[test]
    fn test_same_seed_reproduces_telemetry() {
        let cfg = config("a");
        let it = item("w1", "short");
        let t1 = simulate_probe(&cfg, Provider::OpenAi, &it, 42, 0);
        let t2 = simulate_probe(&cfg, Provider::OpenAi, &it, 42, 0);
        assert_eq!(t1, t2);
    }

    #[test]
    fn test_dispatch_index_only_moves_the_clock() {
        let cfg = config("a");
        let it = item("w1", "short");
        let t0 = simulate_probe(&cfg, Provider::OpenAi, &it, 42, 0);
        let t9 = simulate_probe(&cfg, Provider::OpenAi, &it, 42, 9);
        assert_eq!(t0.input_tokens, t9.input_tokens);
        assert_eq!(t0.latency_ms, t9.latency_ms);
        assert_eq!(
            t9.timestamp_ms - t0.timestamp_ms,
            9 * SIM_DISPATCH_SPACING_MS
        );
    }

    #[test]
    fn test_seed_changes_telemetry() {
        let cfg = config("a");
        let it = item("w1", "short");
        let t1 = simulate_probe(&cfg, Provider::OpenAi, &it, 1, 0);
        let t2 = simulate_probe(&cfg, Provider::OpenAi, &it, 2, 0);
        assert_ne!(t1, t2);
    }

    #[test]
    fn test_retrieval_scales_with_breadth() {
        let mut narrow = config("narrow");
        narrow.top_k = 2;
        let mut wide = config("wide");
        wide.top_k = 16;

        // Averaged over items to wash out per-stream fill variance.
        let total = |cfg: &ProbeConfig| -> u64 {
            (0..20)
                .map(|i| {
                    let it = item(&format!("w{i}"), "long-context");
                    u64::from(simulate_probe(cfg, Provider::OpenAi, &it, 42, 0).retrieved_tokens)
                })
                .sum()
        };
        assert!(total(&wide) > total(&narrow) * 4);
    }

    #[test]
    fn test_no_grounding_no_retrieved_tokens() {
        let cfg = config("a");
        let mut it = item("w1", "short");
        it.expects_grounding = false;
        let t = simulate_probe(&cfg, Provider::OpenAi, &it, 42, 0);
        assert_eq!(t.retrieved_tokens, 0);
    }

    #[test]
    fn test_tool_telemetry_requires_both_flags() {
        let mut cfg = config("a");
        let mut it = item("w1", "tool-heavy");

        // Config enables tools, item does not expect them.
        cfg.tools_enabled = true;
        it.expects_tools = false;
        let t = simulate_probe(&cfg, Provider::OpenAi, &it, 42, 0);
        assert_eq!(t.tool_calls, 0);

        // Item expects tools, config has them disabled.
        cfg.tools_enabled = false;
        it.expects_tools = true;
        let t = simulate_probe(&cfg, Provider::OpenAi, &it, 42, 0);
        assert_eq!(t.tool_calls, 0);

        // Both: calls appear.
        cfg.tools_enabled = true;
        let t = simulate_probe(&cfg, Provider::OpenAi, &it, 42, 0);
        assert!(t.tool_calls >= 1);
        assert!(t.tool_timeouts <= t.tool_calls);
    }

    #[test]
    fn test_category_scales_output() {
        let cfg = config("a");
        let avg_output = |category: &str| -> f64 {
            let total: u64 = (0..30)
                .map(|i| {
                    let it = item(&format!("w{i}"), category);
                    u64::from(simulate_probe(&cfg, Provider::OpenAi, &it, 42, 0).output_tokens)
                })
                .sum();
            total as f64 / 30.0
        };
        assert!(avg_output("long-context") > 2.0 * avg_output("short"));
    }

    #[test]
    fn test_max_output_tokens_clamps() {
        let mut cfg = config("a");
        cfg.max_output_tokens = 50;
        let it = item("w1", "long-context");
        let t = simulate_probe(&cfg, Provider::OpenAi, &it, 42, 0);
        assert!(t.output_tokens <= 50);
    }

    #[test]
    fn test_provider_profiles_differ() {
        let cfg = config("a");
        let it = item("w1", "short");
        let fast = simulate_probe(&cfg, Provider::Mistral, &it, 42, 0);
        let slow = simulate_probe(&cfg, Provider::Meta, &it, 42, 0);
        // Same stream, different profiles: Meta's floor alone exceeds
        // Mistral's floor plus its entire jitter band.
        assert!(slow.latency_ms > fast.latency_ms);
    }

    #[test]
    fn test_simulated_error_is_absent() {
        let cfg = config("a");
        let it = item("w1", "short");
        let t = simulate_probe(&cfg, Provider::OpenAi, &it, 42, 0);
        assert!(t.error.is_none());
    }
}

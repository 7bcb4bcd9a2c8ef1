//! Common types used across Firedrill components.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique identifier for a deployment configuration under test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConfigId(pub String);

impl ConfigId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConfigId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a workload item (one test case).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Known AI service providers, resolved once from the model-name prefix
/// during suite validation. Unknown prefixes are a validation error, never
/// a silent default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Google,
    Mistral,
    Meta,
}

impl Provider {
    /// Resolve a provider from a model name such as `gpt-4o` or
    /// `claude-sonnet-4`. Returns `None` for unrecognized prefixes so the
    /// caller can surface a loud configuration error.
    pub fn from_model(model: &str) -> Option<Self> {
        let lower = model.to_ascii_lowercase();
        if lower.starts_with("gpt-") || lower.starts_with("o1-") || lower.starts_with("o3-") {
            Some(Self::OpenAi)
        } else if lower.starts_with("claude-") {
            Some(Self::Anthropic)
        } else if lower.starts_with("gemini-") {
            Some(Self::Google)
        } else if lower.starts_with("mistral-") || lower.starts_with("mixtral-") {
            Some(Self::Mistral)
        } else if lower.starts_with("llama-") {
            Some(Self::Meta)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Anthropic => write!(f, "anthropic"),
            Self::Google => write!(f, "google"),
            Self::Mistral => write!(f, "mistral"),
            Self::Meta => write!(f, "meta"),
        }
    }
}

/// One deployment variant of the AI service under test.
///
/// Immutable once loaded; numeric fields must be finite and non-negative,
/// and ids must be unique within a comparison. Both are enforced by suite
/// validation before any probe runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Unique identifier within the comparison.
    pub id: ConfigId,
    /// Model name; its prefix selects the provider.
    pub model: String,
    /// Context window size in tokens.
    pub context_window: u32,
    /// Retrieval breadth (top-k chunks fetched per query).
    #[serde(default)]
    pub top_k: u32,
    /// Retrieval chunk size in tokens.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
    /// Maximum output tokens the service may generate (0 = provider default).
    #[serde(default)]
    pub max_output_tokens: u32,
    /// Whether tool use is enabled for this configuration.
    #[serde(default)]
    pub tools_enabled: bool,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Cost in USD per 1,000 tokens (blended input/output rate).
    #[serde(default = "default_cost_per_1k")]
    pub cost_per_1k_tokens: f64,
}

fn default_chunk_size() -> u32 {
    512
}

fn default_temperature() -> f64 {
    0.7
}

fn default_cost_per_1k() -> f64 {
    0.01
}

/// One test case from the workload suite. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadItem {
    /// Unique identifier within the suite.
    pub id: ItemId,
    /// Category label used for distribution breakdowns
    /// (e.g. "short", "long-context", "tool-heavy").
    pub category: String,
    /// Raw prompt content.
    pub content: String,
    /// Whether this item is expected to exercise tool use.
    #[serde(default)]
    pub expects_tools: bool,
    /// Whether this item is expected to exercise retrieval grounding.
    #[serde(default)]
    pub expects_grounding: bool,
}

/// Raw measurement for one (configuration, workload item) probe.
///
/// Produced exactly once per probe and never mutated. In simulate mode the
/// timestamp comes from a deterministic virtual clock; in real mode it is
/// wall-clock epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Prompt tokens sent to the provider.
    pub input_tokens: u32,
    /// Tokens of retrieved context attached to the prompt.
    pub retrieved_tokens: u32,
    /// Tokens generated by the provider.
    pub output_tokens: u32,
    /// End-to-end probe latency in milliseconds.
    pub latency_ms: f64,
    /// Number of tool calls issued during the probe.
    pub tool_calls: u32,
    /// Number of those tool calls that timed out.
    pub tool_timeouts: u32,
    /// Probe timestamp in epoch milliseconds.
    pub timestamp_ms: i64,
    /// Provider error captured instead of a response, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Telemetry plus the values derived from the configuration under test.
/// Owned by the probe engine; read-only downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub config_id: ConfigId,
    pub item_id: ItemId,
    pub telemetry: Telemetry,
    /// (input + retrieved tokens) / context window.
    pub context_utilization: f64,
    /// input + retrieved + output tokens.
    pub total_tokens: u32,
    /// total tokens / 1000 x cost per 1k.
    pub estimated_cost: f64,
}

impl ProbeResult {
    /// Derive utilization, token total, and cost from raw telemetry.
    pub fn from_telemetry(config: &ProbeConfig, item_id: ItemId, telemetry: Telemetry) -> Self {
        let prompt_tokens = telemetry.input_tokens + telemetry.retrieved_tokens;
        let context_utilization = if config.context_window > 0 {
            f64::from(prompt_tokens) / f64::from(config.context_window)
        } else {
            0.0
        };
        let total_tokens = prompt_tokens + telemetry.output_tokens;
        let estimated_cost = f64::from(total_tokens) / 1000.0 * config.cost_per_1k_tokens;
        Self {
            config_id: config.id.clone(),
            item_id,
            telemetry,
            context_utilization,
            total_tokens,
            estimated_cost,
        }
    }
}

/// The closed set of failure classification tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    ContextOverflow,
    SilentTruncationRisk,
    LatencyBreach,
    CostRunaway,
    ToolTimeoutRisk,
    RetrievalNoiseRisk,
}

impl FailureMode {
    pub const ALL: [FailureMode; 6] = [
        FailureMode::ContextOverflow,
        FailureMode::SilentTruncationRisk,
        FailureMode::LatencyBreach,
        FailureMode::CostRunaway,
        FailureMode::ToolTimeoutRisk,
        FailureMode::RetrievalNoiseRisk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContextOverflow => "context_overflow",
            Self::SilentTruncationRisk => "silent_truncation_risk",
            Self::LatencyBreach => "latency_breach",
            Self::CostRunaway => "cost_runaway",
            Self::ToolTimeoutRisk => "tool_timeout_risk",
            Self::RetrievalNoiseRisk => "retrieval_noise_risk",
        }
    }
}

impl std::fmt::Display for FailureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordinal risk level attached to a failure event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Med,
    High,
}

impl Severity {
    /// Sort rank with High first (0), then Med, then Low.
    pub fn rank(&self) -> u8 {
        match self {
            Self::High => 0,
            Self::Med => 1,
            Self::Low => 2,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Med => write!(f, "med"),
            Self::High => write!(f, "high"),
        }
    }
}

/// One classified failure. A single probe may yield zero or several events
/// since rules fire independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEvent {
    pub item_id: ItemId,
    pub config_id: ConfigId,
    pub mode: FailureMode,
    pub severity: Severity,
    /// Human-readable description of what tripped the rule.
    pub trigger: String,
    /// Snapshot of the numeric signal that tripped the rule.
    pub signal: f64,
    pub timestamp_ms: i64,
}

/// A (lower, upper) uncertainty interval; bounds always lie in [0, 1]
/// with lower <= upper.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    pub fn new(lower: f64, upper: f64) -> Self {
        let lower = lower.clamp(0.0, 1.0);
        let upper = upper.clamp(0.0, 1.0);
        if lower <= upper {
            Self { lower, upper }
        } else {
            Self { lower: upper, upper: lower }
        }
    }

    /// Maximally uncertain interval, used when no trials were observed.
    pub fn vacuous() -> Self {
        Self { lower: 0.0, upper: 1.0 }
    }
}

/// Per-configuration failure statistics with three independent interval
/// estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    /// Distinct workload items that produced at least one failure event.
    pub failures: usize,
    /// Number of probes actually run for this configuration.
    pub trials: usize,
    /// Point estimate failures / trials (0 when trials = 0).
    pub p_hat: f64,
    /// Wilson score interval (closed form).
    pub wilson: Interval,
    /// Bootstrap percentile interval (seeded resampling).
    pub bootstrap: Interval,
    /// Bayesian credible interval from the Beta(1+k, 1+n-k) posterior.
    pub bayes: Interval,
}

/// Posterior comparison between two configurations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub config_a: ConfigId,
    pub config_b: ConfigId,
    /// P(failure rate of A < failure rate of B). Exactly 0.5 when either
    /// side has zero trials (the indeterminate sentinel).
    pub p_a_safer: f64,
}

/// The first HIGH-severity failure for a configuration, in time order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakPoint {
    pub config_id: ConfigId,
    pub item_id: ItemId,
    pub mode: FailureMode,
    pub severity: Severity,
    pub timestamp_ms: i64,
    pub trigger: String,
}

/// One entry of a categorical distribution over failure events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionEntry {
    /// Raw event count.
    pub count: usize,
    /// Proportion of the total event list.
    pub share: f64,
}

/// Categorical breakdowns of the full failure-event list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Distributions {
    pub by_failure_mode: BTreeMap<String, DistributionEntry>,
    pub by_category: BTreeMap<String, DistributionEntry>,
}

/// Per-configuration event groups plus the cross-configuration break-first
/// ordering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    /// All events per configuration, ordered by severity rank then time.
    pub configs: BTreeMap<ConfigId, Vec<FailureEvent>>,
    /// One break point per configuration that had a HIGH event, ordered by
    /// timestamp across configurations ("who broke first").
    pub break_points: Vec<BreakPoint>,
}

/// Execution summary attached to every report so partial/aborted runs are
/// distinguishable from complete ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub mode: String,
    pub seed: u64,
    pub probes_planned: usize,
    pub probes_completed: usize,
    pub aborted: bool,
}

/// Full pipeline output: the core's only wire-relevant surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub run: RunSummary,
    pub configs: BTreeMap<ConfigId, Stats>,
    pub comparisons: Vec<ComparisonResult>,
    pub distributions: Distributions,
    pub timeline: Timeline,
}

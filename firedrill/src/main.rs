//! Firedrill - Configuration stress drills for AI services.
//!
//! Loads a drill suite (configurations + workload items), runs the
//! simulate-mode pipeline, and prints the analysis report as JSON. The
//! dashboard, HTTP surface, and real provider adapters live elsewhere;
//! this binary is the thin runnable shell around `firedrill-core`.

#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use clap::Parser;
use firedrill_common::{
    ConfigId, ExecutionMode, ItemId, ProbeConfig, RunOptions, ThresholdMode, WorkloadItem,
};
use firedrill_core::{ProgressCallback, RunHooks, run_analysis};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "firedrill")]
#[command(author, version, about = "Stress-drill AI service configurations and estimate failure rates")]
struct Cli {
    /// Path to a drill suite JSON file (defaults to the built-in demo suite)
    suite: Option<PathBuf>,

    /// Override the suite's reproducibility seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Use batch-relative adaptive thresholds instead of fixed constants
    #[arg(long)]
    adaptive: bool,

    /// Pretty-print the JSON report
    #[arg(short, long)]
    pretty: bool,

    /// Stream per-probe progress to stderr
    #[arg(long)]
    progress: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// On-disk drill suite: the one file-loading collaborator the CLI owns.
#[derive(Debug, Serialize, Deserialize)]
struct DrillSuite {
    configs: Vec<ProbeConfig>,
    items: Vec<WorkloadItem>,
    #[serde(default)]
    options: RunOptions,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut suite = match cli.suite {
        Some(ref path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read suite file {}", path.display()))?;
            serde_json::from_str::<DrillSuite>(&raw)
                .with_context(|| format!("failed to parse suite file {}", path.display()))?
        }
        None => {
            info!("no suite file given; using the built-in demo suite");
            demo_suite()
        }
    };

    if let Some(seed) = cli.seed {
        suite.options.seed = seed;
    }
    if cli.adaptive {
        suite.options.threshold_mode = ThresholdMode::Adaptive;
    }
    if suite.options.mode == ExecutionMode::Real {
        bail!("real mode needs a provider adapter; the CLI runs simulate drills only");
    }

    info!(
        configs = suite.configs.len(),
        items = suite.items.len(),
        seed = suite.options.seed,
        "starting drill"
    );

    let hooks = RunHooks {
        progress: cli.progress.then(progress_printer),
        abort: Default::default(),
    };
    let report = run_analysis(&suite.configs, &suite.items, &suite.options, hooks)
        .await
        .context("drill failed")?;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");

    Ok(())
}

fn progress_printer() -> ProgressCallback {
    Arc::new(|done, total, result| {
        eprintln!(
            "probe {done}/{total}: {} x {} ({:.0}ms)",
            result.config_id, result.item_id, result.telemetry.latency_ms
        );
    })
}

/// Built-in demo suite: three variants of a support-assistant deployment
/// against a small mixed workload.
fn demo_suite() -> DrillSuite {
    let configs = vec![
        ProbeConfig {
            id: ConfigId::new("budget-8k"),
            model: "gpt-4o".into(),
            context_window: 8_192,
            top_k: 12,
            chunk_size: 512,
            max_output_tokens: 1_024,
            tools_enabled: true,
            temperature: 0.9,
            cost_per_1k_tokens: 0.005,
        },
        ProbeConfig {
            id: ConfigId::new("standard-32k"),
            model: "claude-sonnet-4".into(),
            context_window: 32_768,
            top_k: 8,
            chunk_size: 512,
            max_output_tokens: 2_048,
            tools_enabled: true,
            temperature: 0.5,
            cost_per_1k_tokens: 0.015,
        },
        ProbeConfig {
            id: ConfigId::new("premium-200k"),
            model: "claude-opus-4".into(),
            context_window: 200_000,
            top_k: 4,
            chunk_size: 1_024,
            max_output_tokens: 4_096,
            tools_enabled: false,
            temperature: 0.2,
            cost_per_1k_tokens: 0.075,
        },
    ];

    let items = (0..24)
        .map(|i| {
            let (category, content, tools, grounding) = match i % 4 {
                0 => (
                    "short",
                    "What is the SLA for priority-1 incidents?".to_string(),
                    false,
                    false,
                ),
                1 => (
                    "long-context",
                    format!(
                        "Review the following contract excerpt and flag unusual clauses. {}",
                        "Clause text continues with standard terms and carve-outs. ".repeat(20)
                    ),
                    false,
                    true,
                ),
                2 => (
                    "tool-heavy",
                    "Look up order 58112, check the shipment status, and draft a reply."
                        .to_string(),
                    true,
                    true,
                ),
                _ => (
                    "short",
                    "Summarize yesterday's on-call handoff in two sentences.".to_string(),
                    false,
                    true,
                ),
            };
            WorkloadItem {
                id: ItemId::new(format!("demo-{i:02}")),
                category: category.to_string(),
                content,
                expects_tools: tools,
                expects_grounding: grounding,
            }
        })
        .collect();

    DrillSuite {
        configs,
        items,
        options: RunOptions::default(),
    }
}

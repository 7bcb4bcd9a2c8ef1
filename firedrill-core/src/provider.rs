//! Provider adapter boundary.
//!
//! The wire clients for external AI services live outside the core; their
//! whole contract is "given a configuration and a workload item, return a
//! telemetry record or fail". The engine treats any failure as retryable
//! data, never as a batch-fatal condition.
//!
//! Provider identity is resolved exactly once, at suite-validation time,
//! from the model-name prefix into the closed [`Provider`] union; unknown
//! prefixes fail loudly instead of defaulting.

use firedrill_common::{
    ConfigId, DrillError, ProbeCallError, ProbeConfig, Provider, Telemetry, WorkloadItem,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// External collaborator that performs one real provider call.
///
/// Implementations are expected to enforce their own per-call timeout; the
/// engine layers rate limiting and retries on top.
pub trait ProviderAdapter: Send + Sync + 'static {
    fn probe(
        &self,
        config: &ProbeConfig,
        item: &WorkloadItem,
    ) -> impl Future<Output = Result<Telemetry, ProbeCallError>> + Send;
}

/// Resolve every configuration's provider up front.
///
/// Returns a batch-fatal error on the first unknown model prefix.
pub fn resolve_providers(
    configs: &[ProbeConfig],
) -> Result<BTreeMap<ConfigId, Provider>, DrillError> {
    let mut providers = BTreeMap::new();
    for config in configs {
        let Some(provider) = Provider::from_model(&config.model) else {
            return Err(DrillError::UnknownProvider {
                id: config.id.to_string(),
                model: config.model.clone(),
            });
        };
        providers.insert(config.id.clone(), provider);
    }
    Ok(providers)
}

/// Scripted in-process adapter for tests and dry runs.
///
/// Fails the first `fail_first` calls with the configured error, then
/// returns fixed telemetry. No sockets, no credentials.
#[derive(Debug, Clone)]
pub struct MockProviderAdapter {
    fail_first: u32,
    error: ProbeCallError,
    latency_ms: f64,
    calls: Arc<AtomicU32>,
}

impl MockProviderAdapter {
    pub fn healthy() -> Self {
        Self {
            fail_first: 0,
            error: ProbeCallError::Transport("unused".into()),
            latency_ms: 120.0,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Fail the first `n` calls with `error`, succeed afterwards.
    pub fn flaky(n: u32, error: ProbeCallError) -> Self {
        Self {
            fail_first: n,
            error,
            latency_ms: 120.0,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Fail every call with `error`.
    pub fn broken(error: ProbeCallError) -> Self {
        Self::flaky(u32::MAX, error)
    }

    /// Total calls observed, across retries.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProviderAdapter for MockProviderAdapter {
    async fn probe(
        &self,
        _config: &ProbeConfig,
        item: &WorkloadItem,
    ) -> Result<Telemetry, ProbeCallError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            return Err(self.error.clone());
        }
        Ok(Telemetry {
            input_tokens: (item.content.len() as u32 / 4).max(1),
            retrieved_tokens: 0,
            output_tokens: 64,
            latency_ms: self.latency_ms,
            tool_calls: 0,
            tool_timeouts: 0,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            error: None,
        })
    }
}

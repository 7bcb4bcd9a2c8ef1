//! Error catalog for Firedrill.
//!
//! Errors split into three tiers:
//!
//! 1. Recoverable per-probe failures (provider timeouts, malformed
//!    responses) are *data*, captured into [`crate::Telemetry::error`] and
//!    never raised past the engine.
//! 2. Batch-fatal conditions ([`DrillError`]) are surfaced before any
//!    computation proceeds, since any result would be meaningless.
//! 3. Statistical edge cases never error at all; the estimator clamps them
//!    to degenerate, well-typed values.

use thiserror::Error;

/// Batch-fatal validation and orchestration errors.
#[derive(Debug, Error)]
pub enum DrillError {
    #[error("no configurations supplied")]
    NoConfigurations,

    #[error("no workload items supplied")]
    NoWorkloadItems,

    #[error("duplicate configuration id '{0}'")]
    DuplicateConfigId(String),

    #[error("duplicate workload item id '{0}'")]
    DuplicateItemId(String),

    #[error("configuration '{id}': {reason}")]
    InvalidConfig { id: String, reason: String },

    #[error("configuration '{id}': unknown provider for model '{model}'")]
    UnknownProvider { id: String, model: String },

    #[error("real mode requested but no provider adapter supplied")]
    MissingAdapter,
}

/// A single provider call failure at the adapter boundary.
///
/// These are tier-1 recoverable: the engine retries the retryable variants
/// and converts whatever survives into error telemetry.
#[derive(Debug, Clone, Error)]
pub enum ProbeCallError {
    #[error("provider call timed out after {0} ms")]
    Timeout(u64),

    #[error("provider rate limit hit")]
    RateLimited,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

/// Errors that can be retried with backoff.
pub trait RetryableError {
    /// Whether another attempt is worth making.
    fn is_retryable(&self) -> bool;
}

impl RetryableError for ProbeCallError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::RateLimited | Self::Transport(_) => true,
            // A parseable-but-wrong payload will not improve on retry.
            Self::MalformedResponse(_) => false,
        }
    }
}

//! Structured logging setup and per-submission log context

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::bundle::RejectionReason;

/// Install a global subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter`. Fails if a subscriber is already installed.
pub fn init_tracing(default_filter: &str, json: bool) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
    }
    Ok(())
}

/// Logger for one bundle submission; every event carries the same
/// correlation id.
#[derive(Debug, Clone)]
pub struct BundleLogger {
    context_id: String,
}

impl BundleLogger {
    pub fn new() -> Self {
        Self::with_context_id(Uuid::new_v4().to_string())
    }

    pub fn with_context_id(context_id: String) -> Self {
        Self { context_id }
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn log_submitted(&self, bundle_id: &str, tx_count: usize) {
        tracing::info!(
            context_id = %self.context_id,
            bundle_id = %bundle_id,
            tx_count = %tx_count,
            "Bundle submitted"
        );
    }

    pub fn log_accepted(&self, bundle_id: &str, attempt: u32) {
        tracing::debug!(
            context_id = %self.context_id,
            bundle_id = %bundle_id,
            attempt = %attempt,
            "Bundle accepted by relay"
        );
    }

    pub fn log_rejected(&self, bundle_id: &str, attempt: u32, reason: &RejectionReason) {
        tracing::warn!(
            context_id = %self.context_id,
            bundle_id = %bundle_id,
            attempt = %attempt,
            reason = %reason.kind(),
            message = %reason,
            "Bundle rejected"
        );
    }

    pub fn log_stream_error(&self, attempt: u32, error: &str) {
        tracing::warn!(
            context_id = %self.context_id,
            attempt = %attempt,
            error = %error,
            "Error while receiving bundle result"
        );
    }

    pub fn log_pending(&self, attempt: u32, reason: &str) {
        tracing::debug!(
            context_id = %self.context_id,
            attempt = %attempt,
            reason = %reason,
            "Bundle not confirmed yet"
        );
    }

    pub fn log_confirmed(&self, bundle_id: &str, attempt: u32, latency_ms: u64) {
        tracing::info!(
            context_id = %self.context_id,
            bundle_id = %bundle_id,
            attempt = %attempt,
            latency_ms = %latency_ms,
            "Bundle confirmed"
        );
    }

    pub fn log_exhausted(&self, bundle_id: &str, retries: u32) {
        tracing::warn!(
            context_id = %self.context_id,
            bundle_id = %bundle_id,
            retries = %retries,
            "Bundle confirmation retries exhausted"
        );
    }
}

impl Default for BundleLogger {
    fn default() -> Self {
        Self::new()
    }
}

//! Metrics collection and export module

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::time::Instant;

/// Client-side metrics, one registry per client instance
pub struct ClientMetrics {
    registry: Registry,

    // Connection
    pub reconnect_attempts: IntCounter,
    pub channel_replacements: IntCounter,
    pub connection_errors: IntCounter,

    // Authentication
    pub token_refreshes: IntCounter,
    pub token_refresh_failures: IntCounter,
    pub authenticated: IntGauge,

    // Bundles
    pub bundles_submitted: IntCounter,
    pub bundles_confirmed: IntCounter,
    pub bundles_rejected: IntCounter,
    pub bundles_exhausted: IntCounter,

    // Histograms
    pub confirmation_latency: Histogram,
}

impl ClientMetrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let reconnect_attempts = IntCounter::with_opts(Opts::new(
            "block_engine_reconnect_attempts_total",
            "Reconnect requests issued by the channel health loop",
        ))?;

        let channel_replacements = IntCounter::with_opts(Opts::new(
            "block_engine_channel_replacements_total",
            "Channels force-closed and re-opened",
        ))?;

        let connection_errors = IntCounter::with_opts(Opts::new(
            "block_engine_connection_errors_total",
            "Close or re-open failures reported by the health loop",
        ))?;

        let token_refreshes = IntCounter::with_opts(Opts::new(
            "block_engine_token_refreshes_total",
            "Access tokens refreshed successfully",
        ))?;

        let token_refresh_failures = IntCounter::with_opts(Opts::new(
            "block_engine_token_refresh_failures_total",
            "Access token refresh calls that failed",
        ))?;

        let authenticated = IntGauge::with_opts(Opts::new(
            "block_engine_authenticated",
            "1 while a bearer credential is installed",
        ))?;

        let bundles_submitted = IntCounter::with_opts(Opts::new(
            "block_engine_bundles_submitted_total",
            "Bundles accepted by the submission endpoint",
        ))?;

        let bundles_confirmed = IntCounter::with_opts(Opts::new(
            "block_engine_bundles_confirmed_total",
            "Bundles whose signatures reached processed/confirmed",
        ))?;

        let bundles_rejected = IntCounter::with_opts(Opts::new(
            "block_engine_bundles_rejected_total",
            "Bundles rejected on the results stream",
        ))?;

        let bundles_exhausted = IntCounter::with_opts(Opts::new(
            "block_engine_bundles_exhausted_total",
            "Bundles neither confirmed nor rejected within the retry budget",
        ))?;

        let confirmation_latency = Histogram::with_opts(
            HistogramOpts::new(
                "block_engine_confirmation_latency_seconds",
                "Time from submission to confirmation",
            )
            .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 40.0, 80.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(reconnect_attempts.clone()))?;
        registry.register(Box::new(channel_replacements.clone()))?;
        registry.register(Box::new(connection_errors.clone()))?;
        registry.register(Box::new(token_refreshes.clone()))?;
        registry.register(Box::new(token_refresh_failures.clone()))?;
        registry.register(Box::new(authenticated.clone()))?;
        registry.register(Box::new(bundles_submitted.clone()))?;
        registry.register(Box::new(bundles_confirmed.clone()))?;
        registry.register(Box::new(bundles_rejected.clone()))?;
        registry.register(Box::new(bundles_exhausted.clone()))?;
        registry.register(Box::new(confirmation_latency.clone()))?;

        Ok(Self {
            registry,
            reconnect_attempts,
            channel_replacements,
            connection_errors,
            token_refreshes,
            token_refresh_failures,
            authenticated,
            bundles_submitted,
            bundles_confirmed,
            bundles_rejected,
            bundles_exhausted,
            confirmation_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render every registered metric in the Prometheus text format
    pub fn gather_text(&self) -> anyhow::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

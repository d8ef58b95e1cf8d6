//! Prometheus metrics.
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `warden_decisions_total` | Counter | `decision`, `mode` | Authorization decisions |
//! | `warden_directory_failures_total` | Counter | `kind` | Group resolutions that gave up |
//! | `warden_group_resolution_seconds` | Histogram | `outcome` | Group resolution latency |
//! | `warden_catalog_reloads_total` | Counter | `outcome` | Role catalog reloads |
//!
//! Recording functions are always safe to call; without an installed
//! recorder they do nothing.

use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::warn;

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Global metrics handle for rendering.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone, Default)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Address to serve `/metrics` on (e.g., "0.0.0.0:9090"). Without one
    /// the recorder is installed but only [`render_metrics`] exposes it.
    pub addr: Option<String>,
}

impl MetricsConfig {
    /// Enabled, serving on `addr`.
    pub fn serving(addr: impl Into<String>) -> Self {
        Self {
            enabled: true,
            addr: Some(addr.into()),
        }
    }
}

/// Installs the Prometheus recorder.
///
/// When an address is configured the HTTP exporter is spawned on the
/// current Tokio runtime, so this must be called from within one.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidAddress` for an unparsable address and
/// `TelemetryError::MetricsInit` if a recorder is already installed or the
/// listener cannot be bound.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let builder = PrometheusBuilder::new();
    let handle = match config.addr.as_deref() {
        Some(addr) => {
            let addr: SocketAddr = addr
                .parse()
                .map_err(|e| TelemetryError::InvalidAddress(format!("{addr}: {e}")))?;
            let (recorder, exporter) = builder
                .with_http_listener(addr)
                .build()
                .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
            let handle = recorder.handle();
            metrics::set_global_recorder(recorder)
                .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
            tokio::spawn(async move {
                if let Err(e) = exporter.await {
                    warn!(error = ?e, "metrics exporter stopped");
                }
            });
            handle
        }
        None => builder
            .install_recorder()
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?,
    };

    let _ = METRICS_HANDLE.set(handle);
    register_metric_descriptions();
    Ok(())
}

/// Renders metrics in Prometheus format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(
        "warden_decisions_total",
        "Authorization decisions by outcome and enforcement mode"
    );
    describe_counter!(
        "warden_directory_failures_total",
        "Group resolutions that failed after exhausting retries"
    );
    describe_histogram!(
        "warden_group_resolution_seconds",
        "Time spent resolving a principal's groups"
    );
    describe_counter!("warden_catalog_reloads_total", "Role catalog reload attempts");
}

/// Records an authorization decision.
///
/// * `decision` - "allow" or "deny"
/// * `mode` - "enforced", "logging_only" or "full_access"
pub fn record_decision(decision: &'static str, mode: &'static str) {
    counter!("warden_decisions_total", "decision" => decision, "mode" => mode).increment(1);
}

/// Records a group resolution that gave up.
pub fn record_directory_failure(kind: &'static str) {
    counter!("warden_directory_failures_total", "kind" => kind).increment(1);
}

/// Records how long a group resolution took.
pub fn record_resolution(duration: Duration, success: bool) {
    let outcome = if success { "ok" } else { "error" };
    histogram!("warden_group_resolution_seconds", "outcome" => outcome).record(duration.as_secs_f64());
}

/// Records a role catalog reload.
pub fn record_catalog_reload(success: bool) {
    let outcome = if success { "ok" } else { "error" };
    counter!("warden_catalog_reloads_total", "outcome" => outcome).increment(1);
}

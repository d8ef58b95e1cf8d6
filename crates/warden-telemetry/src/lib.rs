//! Observability for Warden.
//!
//! - **Logging**: structured JSON or pretty output via `tracing-subscriber`
//! - **Metrics**: Prometheus metrics via the `metrics` crate
//!
//! # Example
//!
//! ```rust,no_run
//! use warden_telemetry::{init_telemetry, LogConfig, MetricsConfig, TelemetryConfig};
//!
//! # async fn example() -> warden_telemetry::TelemetryResult<()> {
//! let config = TelemetryConfig {
//!     logging: LogConfig::production(),
//!     metrics: MetricsConfig::serving("0.0.0.0:9090"),
//! };
//! init_telemetry(&config)?;
//!
//! tracing::info!("authorizer ready");
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/warden-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use metrics::{init_metrics, render_metrics, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Combined telemetry configuration.
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Logging settings.
    pub logging: LogConfig,
    /// Metrics settings.
    pub metrics: MetricsConfig,
}

/// Initializes logging, then metrics.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    Ok(())
}

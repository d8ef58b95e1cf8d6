//! Startup errors.

use thiserror::Error;
use warden_authz::AuthzError;
use warden_config::ConfigError;
use warden_telemetry::TelemetryError;

/// Errors that prevent Warden from starting.
///
/// Directory outages are not among them: an unreachable directory at startup
/// is logged and every check fails closed until it comes back.
#[derive(Debug, Error)]
pub enum WardenError {
    /// Configuration or role mapping could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Logging or metrics could not be installed.
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    /// The authorizer rejected its inputs.
    #[error("authorization error: {0}")]
    Authz(#[from] AuthzError),
}

/// Result type for startup operations.
pub type WardenResult<T> = Result<T, WardenError>;

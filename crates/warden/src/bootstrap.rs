//! Wiring configuration into a running authorizer.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use warden_authz::{Authorizer, RoleGroupCatalog, SharedCatalog};
use warden_config::{load_role_catalog, ConfigLoader, WardenConfig, DEFAULT_DEBOUNCE, ENV_PREFIX};
use warden_directory::{GroupResolver, GroupSource};
use warden_telemetry::init_telemetry;

use crate::error::WardenResult;
use crate::reload::ReloadHandle;

/// Builder for [`Warden`].
///
/// # Example
///
/// ```no_run
/// use warden::Warden;
///
/// # async fn example() -> warden::WardenResult<()> {
/// let warden = Warden::builder()
///     .with_properties_file("/etc/warden/ldap.properties")?
///     .with_telemetry(true)
///     .start()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct WardenBuilder {
    config: Option<WardenConfig>,
    groups: Option<Arc<dyn GroupSource>>,
    telemetry: bool,
    probe: bool,
    debounce: Option<Duration>,
}

impl std::fmt::Debug for WardenBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WardenBuilder")
            .field("config", &self.config)
            .field("custom_groups", &self.groups.is_some())
            .field("telemetry", &self.telemetry)
            .field("probe", &self.probe)
            .finish_non_exhaustive()
    }
}

impl Default for WardenBuilder {
    fn default() -> Self {
        Self {
            config: None,
            groups: None,
            telemetry: false,
            probe: true,
            debounce: None,
        }
    }
}

impl WardenBuilder {
    /// Create a builder. The startup connectivity probe is on by default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an already loaded configuration.
    pub fn with_config(mut self, config: WardenConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load the configuration from a property file, with `WARDEN__*`
    /// environment overrides.
    pub fn with_properties_file(self, path: impl AsRef<Path>) -> WardenResult<Self> {
        let config = ConfigLoader::new()
            .with_file(path)?
            .with_env_prefix(ENV_PREFIX)
            .load()?;
        Ok(self.with_config(config))
    }

    /// Resolve groups from this source instead of the configured directory.
    pub fn with_group_source(mut self, groups: Arc<dyn GroupSource>) -> Self {
        self.groups = Some(groups);
        self
    }

    /// Install the configured logging and metrics on start.
    pub fn with_telemetry(mut self, enabled: bool) -> Self {
        self.telemetry = enabled;
        self
    }

    /// Check directory connectivity on start. A failed check is logged and
    /// does not prevent startup.
    pub fn with_startup_probe(mut self, enabled: bool) -> Self {
        self.probe = enabled;
        self
    }

    /// Debounce window for role mapping changes.
    pub fn with_reload_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = Some(debounce);
        self
    }

    /// Build the authorizer, load the role mapping and start watching it.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `WardenError` if the configuration or role mapping cannot be
    /// loaded, or telemetry cannot be installed. Without
    /// [`with_config`](Self::with_config) the configuration is read from
    /// `WARDEN__*` environment variables alone.
    pub async fn start(self) -> WardenResult<Warden> {
        let config = match self.config {
            Some(config) => config,
            None => ConfigLoader::new().with_env_prefix(ENV_PREFIX).load()?,
        };

        if self.telemetry {
            init_telemetry(&config.telemetry)?;
        }

        let catalog = match &config.role_yaml_path {
            Some(path) => {
                let catalog = load_role_catalog(path)?;
                info!(
                    path = %path.display(),
                    roles = catalog.role_count(),
                    groups = catalog.group_count(),
                    "role mapping loaded"
                );
                catalog
            }
            None => {
                warn!("no role mapping configured, every check will be denied");
                RoleGroupCatalog::empty()
            }
        };

        let groups: Arc<dyn GroupSource> = match self.groups {
            Some(groups) => groups,
            None => {
                let resolver = GroupResolver::from_config(config.search.clone());
                if config.search.pool().init_size > 0 {
                    match resolver.warm_up().await {
                        Ok(opened) => info!(opened, "connection pool warmed up"),
                        Err(e) => warn!(error = %e, "connection pool warm-up failed"),
                    }
                }
                Arc::new(resolver)
            }
        };

        let authorizer = Authorizer::new(
            groups,
            SharedCatalog::new(catalog),
            config.authorizer.clone(),
        )
        .with_full_access_policy(config.full_access_users.clone());
        let authorizer = Arc::new(authorizer);

        if self.probe {
            if let Err(e) = authorizer.test_connection().await {
                warn!(
                    url = %config.search.url(),
                    error = %e,
                    "directory unreachable at startup, checks will fail closed until it recovers"
                );
            }
        }

        let reloader = match (&config.role_yaml_path, config.watch_role_yaml) {
            (Some(path), true) => Some(ReloadHandle::spawn(
                Arc::clone(&authorizer),
                path.clone(),
                self.debounce.unwrap_or(DEFAULT_DEBOUNCE),
            )?),
            _ => None,
        };

        info!(
            logging_only = config.authorizer.logging_only,
            propagation = !config.authorizer.disable_permissions_propagation,
            watching = reloader.is_some(),
            "authorizer started"
        );

        Ok(Warden {
            authorizer,
            reloader,
            config,
        })
    }
}

/// A configured authorizer plus its background reload task.
#[derive(Debug)]
pub struct Warden {
    authorizer: Arc<Authorizer>,
    reloader: Option<ReloadHandle>,
    config: WardenConfig,
}

impl Warden {
    /// Create a builder.
    pub fn builder() -> WardenBuilder {
        WardenBuilder::new()
    }

    /// Start from a property file with default options.
    ///
    /// # Errors
    ///
    /// See [`WardenBuilder::start`].
    pub async fn from_properties_file(path: impl AsRef<Path>) -> WardenResult<Self> {
        Self::builder().with_properties_file(path)?.start().await
    }

    /// The authorizer. Clone the `Arc` to share it.
    pub fn authorizer(&self) -> &Arc<Authorizer> {
        &self.authorizer
    }

    /// The configuration it was started with.
    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    /// Whether the role mapping is being watched.
    pub fn is_watching(&self) -> bool {
        self.reloader.is_some()
    }

    /// Reload the role mapping now, regardless of watching.
    ///
    /// Returns the new catalog generation, or `None` if no role mapping is
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns `WardenError` if the file cannot be loaded. The current
    /// catalog stays in place.
    pub fn reload_roles(&self) -> WardenResult<Option<u64>> {
        match &self.config.role_yaml_path {
            Some(path) => Ok(Some(crate::reload::reload_from_file(&self.authorizer, path)?)),
            None => Ok(None),
        }
    }

    /// Stop the reload task.
    pub async fn shutdown(self) {
        if let Some(reloader) = self.reloader {
            reloader.stop().await;
        }
        info!("authorizer stopped");
    }
}

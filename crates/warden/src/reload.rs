//! Role mapping hot reload.
//!
//! A background task waits for changes to the role mapping file and swaps
//! the authorizer's catalog. A file that fails to load leaves the previous
//! catalog in place.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use warden_authz::Authorizer;
use warden_config::{load_role_catalog, ConfigError, FileChangeKind, FileWatcher};
use warden_telemetry::metrics::record_catalog_reload;

/// Load the role mapping at `path` and install it.
///
/// Returns the new catalog generation. On failure the current catalog is
/// kept and the failure is counted.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed or validated.
pub fn reload_from_file(authorizer: &Authorizer, path: &Path) -> Result<u64, ConfigError> {
    match load_role_catalog(path) {
        Ok(catalog) => {
            let roles = catalog.role_count();
            let groups = catalog.group_count();
            let generation = authorizer.reload_catalog(catalog);
            info!(
                path = %path.display(),
                roles,
                groups,
                generation,
                "role mapping reloaded"
            );
            Ok(generation)
        }
        Err(e) => {
            record_catalog_reload(false);
            warn!(
                path = %path.display(),
                error = %e,
                "role mapping reload failed, keeping current catalog"
            );
            Err(e)
        }
    }
}

/// Handle to a running reload task.
#[derive(Debug)]
pub struct ReloadHandle {
    path: PathBuf,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ReloadHandle {
    /// Watch `path` and reload the authorizer's catalog whenever it changes.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file does not exist or cannot be watched.
    pub fn spawn(
        authorizer: Arc<Authorizer>,
        path: impl Into<PathBuf>,
        debounce: Duration,
    ) -> Result<Self, ConfigError> {
        let path = path.into();
        let watcher = FileWatcher::builder()
            .with_debounce(debounce)
            .watch_file(&path)?
            .build()?;
        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(run(authorizer, watcher, rx));
        info!(path = %path.display(), "watching role mapping for changes");
        Ok(Self {
            path,
            shutdown: Some(tx),
            task,
        })
    }

    /// The watched file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop watching and wait for the task to exit.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "role mapping watcher task failed");
        }
    }
}

impl Drop for ReloadHandle {
    fn drop(&mut self) {
        if self.shutdown.is_some() {
            self.task.abort();
        }
    }
}

async fn run(
    authorizer: Arc<Authorizer>,
    mut watcher: FileWatcher,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            change = watcher.next() => {
                let Some(change) = change else {
                    warn!("file watcher closed, role mapping will no longer reload");
                    break;
                };
                if change.kind == FileChangeKind::Deleted {
                    warn!(
                        path = %change.path.display(),
                        "role mapping removed, keeping current catalog"
                    );
                    continue;
                }
                // A failure is already logged and counted; wait for the next change.
                let Ok(generation) = reload_from_file(&authorizer, &change.path) else {
                    continue;
                };
                debug!(generation, kind = ?change.kind, "watched change applied");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use warden_authz::{AuthorizerSettings, RoleGroupCatalog, SharedCatalog};
    use warden_directory::StaticGroupSource;

    fn authorizer() -> Authorizer {
        Authorizer::new(
            Arc::new(StaticGroupSource::new()),
            SharedCatalog::new(RoleGroupCatalog::empty()),
            AuthorizerSettings::default(),
        )
    }

    #[test]
    fn test_reload_installs_new_generation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roles.yaml");
        fs::write(&path, "roles:\n  - name: viewer\n    permissions: []\n").unwrap();

        let authorizer = authorizer();
        let before = authorizer.catalog().generation();
        let generation = reload_from_file(&authorizer, &path).unwrap();
        assert!(generation > before);
        assert!(authorizer.catalog().snapshot().catalog.role("viewer").is_some());
    }

    #[test]
    fn test_failed_reload_keeps_catalog() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roles.yaml");
        fs::write(&path, "roles:\n  - name: viewer\n    permissions: []\n").unwrap();

        let authorizer = authorizer();
        let good = reload_from_file(&authorizer, &path).unwrap();

        fs::write(&path, "mappings:\n  - group: admins\n    roles: [missing]\n").unwrap();
        assert!(reload_from_file(&authorizer, &path).is_err());
        assert_eq!(authorizer.catalog().generation(), good);
        assert!(authorizer.catalog().snapshot().catalog.role("viewer").is_some());
    }

    #[tokio::test]
    async fn test_spawn_requires_existing_file() {
        let err = ReloadHandle::spawn(
            Arc::new(authorizer()),
            "/nonexistent/roles.yaml",
            Duration::from_millis(10),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn test_stop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roles.yaml");
        fs::write(&path, "roles: []\n").unwrap();

        let handle =
            ReloadHandle::spawn(Arc::new(authorizer()), &path, Duration::from_millis(10)).unwrap();
        assert_eq!(handle.path(), path.as_path());
        assert!(!handle.is_finished());
        handle.stop().await;
    }
}

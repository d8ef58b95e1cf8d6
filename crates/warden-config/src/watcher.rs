//! File watching for role mapping hot-reload.
//!
//! [`FileWatcher`] reports changes to a set of files. Each file's parent
//! directory is watched rather than the file itself, so editors and
//! deployment tools that replace a file by renaming a new one over it are
//! still noticed. Bursts of events for the same file inside the debounce
//! window are coalesced into one.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use warden_config::FileWatcher;
//!
//! # async fn example() -> Result<(), warden_config::ConfigError> {
//! let mut watcher = FileWatcher::builder()
//!     .with_debounce(Duration::from_millis(500))
//!     .watch_file("/etc/warden/roles.yaml")?
//!     .build()?;
//!
//! while let Some(change) = watcher.next().await {
//!     println!("{} was {:?}", change.path.display(), change.kind);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::ConfigError;

/// Default debounce window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// A change to a watched file.
#[derive(Debug, Clone)]
pub struct FileChangeEvent {
    /// The watched path that changed, as it was registered.
    pub path: PathBuf,
    /// Kind of change.
    pub kind: FileChangeKind,
    /// When the change was seen.
    pub timestamp: Instant,
}

/// Kind of file change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeKind {
    /// File was created, including by a rename onto it.
    Created,
    /// File content or metadata changed.
    Modified,
    /// File was deleted or renamed away.
    Deleted,
}

impl FileChangeKind {
    fn from_event(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(Self::Created),
            EventKind::Modify(_) => Some(Self::Modified),
            EventKind::Remove(_) => Some(Self::Deleted),
            EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
        }
    }
}

/// Builder for [`FileWatcher`].
#[derive(Debug, Default)]
pub struct FileWatcherBuilder {
    files: Vec<PathBuf>,
    debounce: Option<Duration>,
}

impl FileWatcherBuilder {
    /// Create a builder with no files.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debounce window. Default is 500ms.
    #[must_use]
    pub fn with_debounce(mut self, duration: Duration) -> Self {
        self.debounce = Some(duration);
        self
    }

    /// Add a file to watch.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist.
    pub fn watch_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::file_not_found(path));
        }
        self.files.push(path.to_path_buf());
        Ok(self)
    }

    /// Start watching.
    ///
    /// # Errors
    ///
    /// Returns an error if no files were added or the OS watcher cannot be
    /// set up.
    pub fn build(self) -> Result<FileWatcher, ConfigError> {
        if self.files.is_empty() {
            return Err(ConfigError::invalid_config("no files configured for file watcher"));
        }

        // Events are matched on canonical paths; the registered path is what
        // callers get back.
        let mut targets = HashMap::new();
        let mut directories = HashSet::new();
        for file in &self.files {
            let canonical = file.canonicalize()?;
            let directory = canonical
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| ConfigError::invalid_config(format!("{} has no parent directory", file.display())))?;
            directories.insert(directory);
            targets.insert(canonical, file.clone());
        }

        let (tx, rx) = mpsc::channel(64);
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                // A full channel means a reload is already pending.
                let _ = tx.try_send(event);
            }
        })
        .map_err(|e| ConfigError::invalid_config(format!("failed to create file watcher: {e}")))?;

        for directory in &directories {
            watcher
                .watch(directory, RecursiveMode::NonRecursive)
                .map_err(|e| {
                    ConfigError::invalid_config(format!("failed to watch {}: {e}", directory.display()))
                })?;
        }

        Ok(FileWatcher {
            _watcher: watcher,
            rx,
            targets,
            debounce: self.debounce.unwrap_or(DEFAULT_DEBOUNCE),
            last_seen: HashMap::new(),
        })
    }
}

/// Watches files for changes.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<Event>,
    targets: HashMap<PathBuf, PathBuf>,
    debounce: Duration,
    last_seen: HashMap<PathBuf, Instant>,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("files", &self.targets.values().collect::<Vec<_>>())
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

impl FileWatcher {
    /// Create a builder.
    #[must_use]
    pub fn builder() -> FileWatcherBuilder {
        FileWatcherBuilder::new()
    }

    /// The debounce window.
    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Wait for the next change to a watched file.
    ///
    /// Returns `None` once the underlying watcher has shut down.
    pub async fn next(&mut self) -> Option<FileChangeEvent> {
        while let Some(event) = self.rx.recv().await {
            if let Some(change) = self.process_event(&event) {
                return Some(change);
            }
        }
        None
    }

    /// A pending change, without waiting.
    pub fn poll(&mut self) -> Option<FileChangeEvent> {
        while let Ok(event) = self.rx.try_recv() {
            if let Some(change) = self.process_event(&event) {
                return Some(change);
            }
        }
        None
    }

    fn process_event(&mut self, event: &Event) -> Option<FileChangeEvent> {
        let kind = FileChangeKind::from_event(&event.kind)?;
        let path = event.paths.iter().find_map(|p| self.match_target(p))?;

        let now = Instant::now();
        if let Some(last) = self.last_seen.get(&path) {
            if now.duration_since(*last) < self.debounce {
                return None;
            }
        }
        self.last_seen.insert(path.clone(), now);

        Some(FileChangeEvent {
            path,
            kind,
            timestamp: now,
        })
    }

    fn match_target(&self, path: &Path) -> Option<PathBuf> {
        if let Some(registered) = self.targets.get(path) {
            return Some(registered.clone());
        }
        // A deleted file cannot be canonicalized, so compare through its
        // canonical parent.
        let parent = path.parent()?.canonicalize().ok()?;
        let canonical = parent.join(path.file_name()?);
        self.targets.get(&canonical).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use tokio::time::{sleep, timeout};

    fn modify_event(path: &Path) -> Event {
        Event::new(EventKind::Modify(notify::event::ModifyKind::Data(
            notify::event::DataChange::Any,
        )))
        .add_path(path.to_path_buf())
    }

    #[test]
    fn test_change_kind_mapping() {
        assert_eq!(
            FileChangeKind::from_event(&EventKind::Create(notify::event::CreateKind::File)),
            Some(FileChangeKind::Created)
        );
        assert_eq!(
            FileChangeKind::from_event(&EventKind::Remove(notify::event::RemoveKind::File)),
            Some(FileChangeKind::Deleted)
        );
        assert_eq!(
            FileChangeKind::from_event(&EventKind::Access(notify::event::AccessKind::Any)),
            None
        );
    }

    #[test]
    fn test_watch_missing_file() {
        let err = FileWatcherBuilder::new()
            .watch_file("/nonexistent/roles.yaml")
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_build_without_files() {
        let err = FileWatcherBuilder::new().build().unwrap_err();
        assert!(err.to_string().contains("no files configured"));
    }

    #[test]
    fn test_events_are_filtered_and_debounced() {
        let dir = TempDir::new().unwrap();
        let roles = dir.path().join("roles.yaml");
        let other = dir.path().join("other.yaml");
        fs::write(&roles, "roles: []\n").unwrap();
        fs::write(&other, "x").unwrap();

        let mut watcher = FileWatcher::builder()
            .with_debounce(Duration::from_secs(60))
            .watch_file(&roles)
            .unwrap()
            .build()
            .unwrap();

        let canonical = roles.canonicalize().unwrap();
        let other = other.canonicalize().unwrap();

        assert!(watcher.process_event(&modify_event(&other)).is_none());

        let change = watcher.process_event(&modify_event(&canonical)).unwrap();
        assert_eq!(change.path, roles);
        assert_eq!(change.kind, FileChangeKind::Modified);

        // Inside the debounce window.
        assert!(watcher.process_event(&modify_event(&canonical)).is_none());
    }

    #[test]
    fn test_deleted_file_still_matches() {
        let dir = TempDir::new().unwrap();
        let roles = dir.path().join("roles.yaml");
        fs::write(&roles, "roles: []\n").unwrap();

        let mut watcher = FileWatcher::builder()
            .with_debounce(Duration::ZERO)
            .watch_file(&roles)
            .unwrap()
            .build()
            .unwrap();

        let canonical = roles.canonicalize().unwrap();
        fs::remove_file(&roles).unwrap();
        let event = Event::new(EventKind::Remove(notify::event::RemoveKind::File))
            .add_path(canonical);
        let change = watcher.process_event(&event).unwrap();
        assert_eq!(change.kind, FileChangeKind::Deleted);
    }

    #[tokio::test]
    async fn test_file_change_detection() {
        let dir = TempDir::new().unwrap();
        let roles = dir.path().join("roles.yaml");
        fs::write(&roles, "roles: []\n").unwrap();

        let mut watcher = FileWatcher::builder()
            .with_debounce(Duration::from_millis(50))
            .watch_file(&roles)
            .unwrap()
            .build()
            .unwrap();

        sleep(Duration::from_millis(100)).await;
        fs::write(&roles, "roles: []\nmappings: []\n").unwrap();

        // File system events can be slow or missing in CI; only check what
        // arrives.
        if let Ok(Some(change)) = timeout(Duration::from_secs(2), watcher.next()).await {
            assert_eq!(change.path, roles);
        }
    }
}

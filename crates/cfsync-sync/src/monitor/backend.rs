//! Kernel watch backend
//!
//! [`WatchBackend`] is the seam between the watch table and the OS. The
//! production implementation, [`NotifyBackend`], owns the single notify
//! watcher (inotify on Linux) and forwards raw events into an unbounded
//! channel read by the monitor task. Each directory gets its own
//! non-recursive watch so the watch table stays the source of truth.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

/// Raw events as produced by the notify callback
pub type RawEventReceiver = mpsc::UnboundedReceiver<notify::Result<notify::Event>>;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Failed to initialise the file watcher: {0}")]
    Init(String),

    #[error("Failed to watch {path}: {reason}")]
    Add { path: PathBuf, reason: String },

    #[error("Failed to unwatch {path}: {reason}")]
    Remove { path: PathBuf, reason: String },
}

/// Adds and removes single-directory watches
pub trait WatchBackend: Send + Sync {
    fn watch(&self, dir: &Path) -> Result<(), WatchError>;
    fn unwatch(&self, dir: &Path) -> Result<(), WatchError>;
}

/// notify-backed watch backend
pub struct NotifyBackend {
    watcher: Mutex<RecommendedWatcher>,
}

impl NotifyBackend {
    /// Creates the kernel watcher and the channel its events arrive on
    ///
    /// # Errors
    /// Returns [`WatchError::Init`] if the OS watcher cannot be created
    pub fn new() -> Result<(Self, RawEventReceiver), WatchError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| {
                // The receiver is gone only during teardown
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )
        .map_err(|e| WatchError::Init(e.to_string()))?;

        info!("Initialized file watcher");
        Ok((
            Self {
                watcher: Mutex::new(watcher),
            },
            rx,
        ))
    }

    fn with_watcher<T>(&self, f: impl FnOnce(&mut RecommendedWatcher) -> T) -> T {
        match self.watcher.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(&self, dir: &Path) -> Result<(), WatchError> {
        self.with_watcher(|w| w.watch(dir, RecursiveMode::NonRecursive))
            .map_err(|e| WatchError::Add {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })
    }

    fn unwatch(&self, dir: &Path) -> Result<(), WatchError> {
        self.with_watcher(|w| w.unwatch(dir))
            .map_err(|e| WatchError::Remove {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })
    }
}

//! Watch table
//!
//! Tracks which directories are watched. Adding an already-watched path is a
//! no-op; removing a subtree drops every watch at or below a directory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use super::backend::{WatchBackend, WatchError};

pub struct WatchTable {
    backend: Arc<dyn WatchBackend>,
    watched: Mutex<BTreeSet<PathBuf>>,
}

impl WatchTable {
    pub fn new(backend: Arc<dyn WatchBackend>) -> Self {
        Self {
            backend,
            watched: Mutex::new(BTreeSet::new()),
        }
    }

    fn watched(&self) -> MutexGuard<'_, BTreeSet<PathBuf>> {
        match self.watched.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Watches `dir`
    ///
    /// # Errors
    /// Returns the backend error if the kernel refused the watch
    pub fn add(&self, dir: &Path) -> Result<(), WatchError> {
        let mut watched = self.watched();
        if watched.contains(dir) {
            return Ok(());
        }
        self.backend.watch(dir)?;
        watched.insert(dir.to_path_buf());
        debug!(dir = %dir.display(), "Watching");
        Ok(())
    }

    /// Watches every directory in `dirs`, logging failures
    ///
    /// # Returns
    /// The number of directories now watched among `dirs`
    pub fn add_all(&self, dirs: &[PathBuf]) -> usize {
        dirs.iter()
            .filter(|dir| match self.add(dir) {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Directory will not be monitored");
                    false
                }
            })
            .count()
    }

    /// Stops watching `dir` only
    pub fn remove(&self, dir: &Path) -> bool {
        let mut watched = self.watched();
        if !watched.remove(dir) {
            return false;
        }
        self.unwatch(dir);
        true
    }

    /// Stops watching `dir` and every watched directory below it
    ///
    /// # Returns
    /// The number of watches removed
    pub fn remove_tree(&self, dir: &Path) -> usize {
        let mut watched = self.watched();
        let doomed: Vec<PathBuf> = watched
            .range(dir.to_path_buf()..)
            .take_while(|p| p.starts_with(dir))
            .cloned()
            .collect();
        for path in &doomed {
            watched.remove(path);
            self.unwatch(path);
        }
        doomed.len()
    }

    fn unwatch(&self, dir: &Path) {
        // The kernel drops watches of deleted or moved-away directories itself
        if let Err(e) = self.backend.unwatch(dir) {
            debug!(error = %e, "Unwatch failed");
        }
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.watched().contains(dir)
    }

    pub fn len(&self) -> usize {
        self.watched().len()
    }

    pub fn is_empty(&self) -> bool {
        self.watched().is_empty()
    }

    /// Watched directories in path order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.watched().iter().cloned().collect()
    }
}

//! Pending move index
//!
//! A move arrives as two events sharing a cookie. The source half is recorded
//! here until the destination half takes it. Sources whose destination never
//! arrives (moved out of the tree, or lost to an interrupted rename) are
//! purged once older than the configured expiry.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use cfsync_core::domain::newtypes::RelativeName;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMove {
    pub name: RelativeName,
    pub path: PathBuf,
    pub recorded_at: Instant,
}

#[derive(Debug, Default)]
pub struct PendingMoves {
    entries: Mutex<HashMap<usize, PendingMove>>,
    expiry: Option<Duration>,
}

impl PendingMoves {
    pub fn new(expiry: Option<Duration>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            expiry,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<usize, PendingMove>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Records the source half of move `cookie`
    ///
    /// Expired entries are purged first. A previous entry under the same
    /// cookie is replaced.
    ///
    /// # Returns
    /// The entries that expired
    pub fn record(&self, cookie: usize, name: RelativeName, path: PathBuf) -> Vec<PendingMove> {
        let mut entries = self.entries();
        let expired = self.purge_locked(&mut entries, Instant::now());
        if let Some(old) = entries.insert(
            cookie,
            PendingMove {
                name,
                path,
                recorded_at: Instant::now(),
            },
        ) {
            warn!(cookie, replaced = %old.name, "Move cookie reused before completion");
        }
        expired
    }

    /// Removes and returns the source half of move `cookie`
    pub fn take(&self, cookie: usize) -> Option<PendingMove> {
        self.entries().remove(&cookie)
    }

    /// Drops entries older than the expiry, as of `now`
    ///
    /// # Returns
    /// The entries dropped
    pub fn purge_expired(&self, now: Instant) -> Vec<PendingMove> {
        let mut entries = self.entries();
        self.purge_locked(&mut entries, now)
    }

    fn purge_locked(
        &self,
        entries: &mut HashMap<usize, PendingMove>,
        now: Instant,
    ) -> Vec<PendingMove> {
        let Some(expiry) = self.expiry else {
            return Vec::new();
        };
        let stale: Vec<usize> = entries
            .iter()
            .filter(|(_, pending)| now.saturating_duration_since(pending.recorded_at) >= expiry)
            .map(|(cookie, _)| *cookie)
            .collect();
        stale
            .into_iter()
            .filter_map(|cookie| {
                let pending = entries.remove(&cookie)?;
                warn!(cookie, name = %pending.name, "Move source never matched, dropping");
                Some(pending)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

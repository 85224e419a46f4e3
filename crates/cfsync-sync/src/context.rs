//! Shared engine context
//!
//! [`SyncContext`] is the single value shared (behind an `Arc`) by the
//! startup reconciler, the event monitor, its helper tasks and every worker.
//! It owns the queues, the in-flight registry, the auth session and the
//! shutdown token.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cfsync_core::config::{Config, WorkersConfig};
use cfsync_core::domain::{
    entries::{LocalEntry, RemoteEntry},
    newtypes::RelativeName,
    work::{CopyJob, DeleteJob, UploadJob},
};
use cfsync_core::ports::ObjectStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::exclusion::ExclusionFilter;
use crate::inflight::InFlightRegistry;
use crate::queue::WorkQueues;
use crate::retry::RetryPolicy;
use crate::session::AuthSession;

/// Tunables derived from [`Config`]
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub retry: RetryPolicy,
    pub page_size: usize,
    pub workers: WorkersConfig,
    /// Wait before scanning a newly created directory
    pub settle_delay: Duration,
    /// Age after which an unmatched move-from is dropped; `None` keeps them forever
    pub move_expiry: Option<Duration>,
}

impl EngineOptions {
    pub fn from_config(config: &Config) -> Self {
        let move_expiry = config.sync.move_expiry();
        Self {
            retry: RetryPolicy::from(&config.retry),
            page_size: config.storage.page_size,
            workers: config.workers.clone(),
            settle_delay: config.sync.settle_delay(),
            move_expiry: (!move_expiry.is_zero()).then_some(move_expiry),
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Counts of jobs discarded by [`SyncContext::drain_queues`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainCounts {
    pub uploads: usize,
    pub deletes: usize,
    pub copies: usize,
}

impl DrainCounts {
    pub fn total(&self) -> usize {
        self.uploads + self.deletes + self.copies
    }
}

pub struct SyncContext {
    pub root: PathBuf,
    pub filter: ExclusionFilter,
    pub store: Arc<dyn ObjectStore>,
    pub session: AuthSession,
    pub queues: WorkQueues,
    pub in_flight: InFlightRegistry,
    pub options: EngineOptions,
    shutdown: CancellationToken,
    failed: AtomicBool,
}

impl SyncContext {
    pub fn new(
        root: PathBuf,
        filter: ExclusionFilter,
        store: Arc<dyn ObjectStore>,
        session: AuthSession,
        options: EngineOptions,
    ) -> Self {
        Self {
            root,
            filter,
            store,
            session,
            queues: WorkQueues::new(),
            in_flight: InFlightRegistry::new(),
            options,
            shutdown: CancellationToken::new(),
            failed: AtomicBool::new(false),
        }
    }

    pub fn retry(&self) -> RetryPolicy {
        self.options.retry
    }

    /// Queues an upload unless one for the same name is already in flight
    ///
    /// # Returns
    /// True if a job was queued
    pub fn submit_upload(&self, entry: LocalEntry) -> bool {
        if self.is_shutting_down() {
            debug!(name = %entry.name, "Shutting down, upload not queued");
            return false;
        }
        if !self.in_flight.try_register(&entry.name) {
            debug!(name = %entry.name, "Upload already in flight");
            return false;
        }
        debug!(name = %entry.name, size = entry.size, "Queued upload");
        self.queues.upload.push(UploadJob { entry });
        true
    }

    /// Queues a delete of `entry`
    pub fn submit_delete(&self, entry: RemoteEntry) -> bool {
        if self.is_shutting_down() {
            debug!(name = %entry.name, "Shutting down, delete not queued");
            return false;
        }
        debug!(name = %entry.name, "Queued delete");
        self.queues.delete.push(DeleteJob { entry });
        true
    }

    /// Queues a server-side copy `from` → `to`
    pub fn submit_copy(&self, from: RelativeName, to: RelativeName) -> bool {
        if self.is_shutting_down() {
            debug!(from = %from, to = %to, "Shutting down, copy not queued");
            return false;
        }
        debug!(from = %from, to = %to, "Queued copy");
        let source = RemoteEntry::stub(from.clone(), &self.root);
        self.queues.copy.push(CopyJob { from, to, source });
        true
    }

    /// Discards every queued job and releases the in-flight names of discarded uploads
    pub fn drain_queues(&self) -> DrainCounts {
        let uploads = self.queues.upload.drain();
        for job in &uploads {
            self.in_flight.release(job.name());
        }
        DrainCounts {
            uploads: uploads.len(),
            deletes: self.queues.delete.drain().len(),
            copies: self.queues.copy.drain().len(),
        }
    }

    /// A token cancelled once shutdown has been requested
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Marks the run as failed and requests shutdown
    pub fn abort(&self, reason: &str) {
        error!(reason, "Fatal error, shutting down");
        self.failed.store(true, Ordering::SeqCst);
        self.shutdown.cancel();
    }

    /// True once [`abort`](Self::abort) has been called
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("root", &self.root)
            .field("patterns", &self.filter.len())
            .field("in_flight", &self.in_flight.len())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}

//! Mirroring engine
//!
//! The [`SyncEngine`] performs the startup reconciliation and then hands the
//! tree over to the event monitor and the worker pools.
//!
//! ## Startup
//!
//! 1. **Remote**: list the whole container (fatal on failure)
//! 2. **Local**: scan the root, hashing every file
//! 3. **Watches**: watch every directory (fatal if the root is refused)
//! 4. **Workers**: spawn the three pools, start consuming events
//! 5. **Seed**: upload diff, release matches, delete diff, submit jobs
//!
//! The monitor starts before the queues are seeded so that changes made
//! while the seed jobs run are not missed; the in-flight registry keeps
//! duplicate uploads out.

use std::sync::Arc;

use tracing::{error, info};

use crate::context::SyncContext;
use crate::lister::list_remote;
use crate::monitor::backend::{RawEventReceiver, WatchBackend};
use crate::monitor::{EventMonitor, MonitorHandle};
use crate::reconciler::{diff_for_delete, diff_for_upload, release};
use crate::scanner::scan_tree;
use crate::shutdown::{ShutdownCoordinator, ShutdownReport};
use crate::workers::WorkerPools;
use crate::SyncError;

// ============================================================================
// StartupSummary
// ============================================================================

/// Outcome of the startup reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartupSummary {
    /// Objects found in the container
    pub remote_objects: usize,
    /// Files found below the root
    pub local_files: usize,
    /// Files already up to date
    pub in_sync: usize,
    pub uploads_queued: usize,
    pub deletes_queued: usize,
    /// Directories under watch
    pub watches: usize,
}

// ============================================================================
// SyncEngine
// ============================================================================

pub struct SyncEngine {
    ctx: Arc<SyncContext>,
}

impl SyncEngine {
    pub fn new(ctx: Arc<SyncContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<SyncContext> {
        &self.ctx
    }

    /// Reconciles the root against the container and starts mirroring
    ///
    /// # Arguments
    /// * `backend` - Kernel watch backend the monitor registers directories with
    /// * `events` - Raw event stream produced by that backend
    ///
    /// # Errors
    /// - [`SyncError::ListingFailed`] / [`SyncError::Auth`] if the initial listing fails
    /// - [`SyncError::Task`] if the local scan task dies
    /// - [`SyncError::Watch`] if the root directory cannot be watched
    pub async fn start(
        self,
        backend: Arc<dyn WatchBackend>,
        events: RawEventReceiver,
    ) -> Result<RunningEngine, SyncError> {
        let ctx = self.ctx;
        info!(root = %ctx.root.display(), "Starting synchronization");

        let mut remote = list_remote(&ctx, None).await.map_err(|e| {
            error!(error = %e, "Initial listing failed");
            e
        })?;
        let remote_objects = remote.len();

        let scan_ctx = Arc::clone(&ctx);
        let mut local =
            tokio::task::spawn_blocking(move || scan_tree(&scan_ctx.root, &scan_ctx.root, &scan_ctx.filter))
                .await
                .map_err(|e| SyncError::Task(format!("local scan: {e}")))?;
        let local_files = local.len();
        info!(remote_objects, local_files, "Inventories ready");

        let monitor = EventMonitor::new(Arc::clone(&ctx), backend);
        let watches = monitor.watch_root().await.map_err(|e| {
            error!(error = %e, "Cannot watch the local root");
            e
        })?;

        let pools = WorkerPools::spawn(&ctx, &ctx.options.workers);
        let monitor = MonitorHandle::spawn(monitor, events);

        let uploads = diff_for_upload(&local, &remote);
        release(&mut local, &mut remote, &uploads.releasable);
        let deletes = diff_for_delete(remote, &local);

        let uploads_queued = uploads
            .jobs
            .into_iter()
            .filter(|job| ctx.submit_upload(job.entry.clone()))
            .count();
        let deletes_queued = deletes
            .jobs
            .into_iter()
            .filter(|job| ctx.submit_delete(job.entry.clone()))
            .count();

        let summary = StartupSummary {
            remote_objects,
            local_files,
            in_sync: uploads.releasable.len(),
            uploads_queued,
            deletes_queued,
            watches,
        };
        info!(
            in_sync = summary.in_sync,
            uploads = uploads_queued,
            deletes = deletes_queued,
            watches,
            "Startup reconciliation complete"
        );

        Ok(RunningEngine {
            ctx,
            pools,
            monitor,
            coordinator: ShutdownCoordinator::new(),
            summary,
        })
    }
}

// ============================================================================
// RunningEngine
// ============================================================================

/// A started engine: worker pools and event monitor running
pub struct RunningEngine {
    ctx: Arc<SyncContext>,
    pools: WorkerPools,
    monitor: MonitorHandle,
    coordinator: ShutdownCoordinator,
    summary: StartupSummary,
}

impl RunningEngine {
    pub fn summary(&self) -> StartupSummary {
        self.summary
    }

    pub fn context(&self) -> &Arc<SyncContext> {
        &self.ctx
    }

    /// Runs until shutdown is requested (signal or fatal error), then tears down
    ///
    /// # Errors
    /// Returns [`SyncError::Aborted`] when a fatal runtime condition stopped the engine
    pub async fn run_until_shutdown(self) -> Result<ShutdownReport, SyncError> {
        self.ctx.shutdown_token().cancelled().await;
        self.teardown().await
    }

    /// Requests shutdown and tears down immediately
    ///
    /// # Errors
    /// Returns [`SyncError::Aborted`] if a fatal runtime condition had already stopped the engine
    pub async fn shutdown(self) -> Result<ShutdownReport, SyncError> {
        self.ctx.request_shutdown();
        self.teardown().await
    }

    async fn teardown(self) -> Result<ShutdownReport, SyncError> {
        let report = self
            .coordinator
            .run(&self.ctx, self.pools, self.monitor)
            .await
            .ok_or_else(|| SyncError::Task("shutdown already claimed".to_string()))?;

        if self.ctx.has_failed() {
            return Err(SyncError::Aborted(
                "a fatal error stopped synchronization".to_string(),
            ));
        }
        Ok(report)
    }
}

//! Shutdown coordinator
//!
//! Teardown runs once, in a fixed order:
//!
//! ```text
//! request shutdown ─→ drain queues ─→ inject markers ─→ join workers ─→ stop monitor
//! ```
//!
//! Requesting shutdown first closes the submit path, so nothing queued after
//! the drain can outlive the markers. Workers finish the job they hold before
//! they see their marker. The monitor goes last: it owns the kernel watcher,
//! and dropping it is what releases the watches.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::context::{DrainCounts, SyncContext};
use crate::monitor::MonitorHandle;
use crate::workers::{PoolReport, WorkerPools};

/// What teardown discarded and what the workers reported
#[derive(Debug, Default, Clone)]
pub struct ShutdownReport {
    pub discarded: DrainCounts,
    /// Markers pushed per pool: (upload, delete, copy)
    pub markers: (usize, usize, usize),
    pub workers: PoolReport,
}

#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    started: AtomicBool,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the teardown; true for the first caller only
    pub fn begin(&self) -> bool {
        self.started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Tears the engine down
    ///
    /// # Returns
    /// `None` if teardown was already claimed by an earlier call
    pub async fn run(
        &self,
        ctx: &SyncContext,
        pools: WorkerPools,
        monitor: MonitorHandle,
    ) -> Option<ShutdownReport> {
        if !self.begin() {
            warn!("Shutdown already in progress");
            return None;
        }

        info!("Shutting down");
        ctx.request_shutdown();

        let discarded = ctx.drain_queues();
        if discarded.total() > 0 {
            info!(
                uploads = discarded.uploads,
                deletes = discarded.deletes,
                copies = discarded.copies,
                "Discarded queued work"
            );
        }

        let markers = pools.sizes();
        pools.inject_markers(ctx);
        let workers = pools.join().await;
        info!(
            uploaded = workers.uploads.succeeded,
            deleted = workers.deletes.succeeded,
            copied = workers.copies.succeeded,
            failed = workers.uploads.failed + workers.deletes.failed + workers.copies.failed,
            "Worker pools stopped"
        );

        monitor.stop().await;
        info!("Shutdown complete");

        Some(ShutdownReport {
            discarded,
            markers,
            workers,
        })
    }
}

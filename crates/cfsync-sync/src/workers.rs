//! Worker pools
//!
//! Three pools (upload, delete, copy), each a set of tokio tasks popping from
//! its own queue. A worker runs the job's remote call under the retry
//! contract, logs the terminal outcome, and moves on. It stops when it pops a
//! shutdown marker, returning its counters.
//!
//! Job-specific rules:
//! - upload: the in-flight name is released once, whatever the outcome
//! - copy: a successful copy queues the delete of the source object

use std::sync::Arc;

use cfsync_core::config::WorkersConfig;
use cfsync_core::domain::work::{CopyJob, DeleteJob, UploadJob, WorkItem};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::context::SyncContext;
use crate::queue::WorkQueue;
use crate::retry::{run_with_reauth, RetryOutcome};

/// Terminal outcomes counted by one worker
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub succeeded: usize,
    pub failed: usize,
}

impl std::ops::AddAssign for WorkerStats {
    fn add_assign(&mut self, other: Self) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
    }
}

/// Aggregated counters of every pool after join
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolReport {
    pub uploads: WorkerStats,
    pub deletes: WorkerStats,
    pub copies: WorkerStats,
    /// Workers that panicked or were cancelled instead of returning
    pub lost_workers: usize,
}

/// Handles of every running worker
pub struct WorkerPools {
    upload: Vec<JoinHandle<WorkerStats>>,
    delete: Vec<JoinHandle<WorkerStats>>,
    copy: Vec<JoinHandle<WorkerStats>>,
}

impl WorkerPools {
    /// Spawns `sizes.upload + sizes.delete + sizes.copy` workers
    pub fn spawn(ctx: &Arc<SyncContext>, sizes: &WorkersConfig) -> Self {
        let upload = (0..sizes.upload)
            .map(|id| tokio::spawn(upload_worker(id, Arc::clone(ctx))))
            .collect();
        let delete = (0..sizes.delete)
            .map(|id| tokio::spawn(delete_worker(id, Arc::clone(ctx))))
            .collect();
        let copy = (0..sizes.copy)
            .map(|id| tokio::spawn(copy_worker(id, Arc::clone(ctx))))
            .collect();

        info!(
            upload = sizes.upload,
            delete = sizes.delete,
            copy = sizes.copy,
            "Started worker pools"
        );
        Self {
            upload,
            delete,
            copy,
        }
    }

    /// Number of workers per pool: (upload, delete, copy)
    pub fn sizes(&self) -> (usize, usize, usize) {
        (self.upload.len(), self.delete.len(), self.copy.len())
    }

    /// Pushes exactly one shutdown marker per worker into each pool's queue
    pub fn inject_markers(&self, ctx: &SyncContext) {
        ctx.queues.upload.push_shutdown(self.upload.len());
        ctx.queues.delete.push_shutdown(self.delete.len());
        ctx.queues.copy.push_shutdown(self.copy.len());
        debug!(
            upload = self.upload.len(),
            delete = self.delete.len(),
            copy = self.copy.len(),
            "Injected shutdown markers"
        );
    }

    /// Waits for every worker to exit
    pub async fn join(self) -> PoolReport {
        let mut report = PoolReport::default();
        let (uploads, lost) = join_pool("upload", self.upload).await;
        report.uploads = uploads;
        report.lost_workers += lost;
        let (deletes, lost) = join_pool("delete", self.delete).await;
        report.deletes = deletes;
        report.lost_workers += lost;
        let (copies, lost) = join_pool("copy", self.copy).await;
        report.copies = copies;
        report.lost_workers += lost;
        report
    }
}

async fn join_pool(pool: &str, handles: Vec<JoinHandle<WorkerStats>>) -> (WorkerStats, usize) {
    let mut total = WorkerStats::default();
    let mut lost = 0;
    for handle in handles {
        match handle.await {
            Ok(stats) => total += stats,
            Err(e) => {
                error!(pool, error = %e, "Worker did not exit cleanly");
                lost += 1;
            }
        }
    }
    (total, lost)
}

// ============================================================================
// Worker loops
// ============================================================================

async fn run_worker<J, F, Fut>(
    pool: &'static str,
    id: usize,
    queue: WorkQueue<J>,
    mut process: F,
) -> WorkerStats
where
    F: FnMut(J) -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    debug!(pool, worker = id, "Worker started");
    let mut stats = WorkerStats::default();
    loop {
        match queue.pop().await {
            WorkItem::Job(job) => {
                if process(job).await {
                    stats.succeeded += 1;
                } else {
                    stats.failed += 1;
                }
            }
            WorkItem::Shutdown => break,
        }
    }
    debug!(
        pool,
        worker = id,
        succeeded = stats.succeeded,
        failed = stats.failed,
        "Worker stopped"
    );
    stats
}

pub async fn upload_worker(id: usize, ctx: Arc<SyncContext>) -> WorkerStats {
    let queue = ctx.queues.upload.clone();
    run_worker("upload", id, queue, |job| {
        let ctx = Arc::clone(&ctx);
        async move { process_upload(&ctx, &job).await }
    })
    .await
}

pub async fn delete_worker(id: usize, ctx: Arc<SyncContext>) -> WorkerStats {
    let queue = ctx.queues.delete.clone();
    run_worker("delete", id, queue, |job| {
        let ctx = Arc::clone(&ctx);
        async move { process_delete(&ctx, &job).await }
    })
    .await
}

pub async fn copy_worker(id: usize, ctx: Arc<SyncContext>) -> WorkerStats {
    let queue = ctx.queues.copy.clone();
    run_worker("copy", id, queue, |job| {
        let ctx = Arc::clone(&ctx);
        async move { process_copy(&ctx, &job).await }
    })
    .await
}

// ============================================================================
// Job processing
// ============================================================================

/// Uploads one file; returns true on success
pub async fn process_upload(ctx: &SyncContext, job: &UploadJob) -> bool {
    let name = job.name().as_str();
    let store = &ctx.store;
    let entry = &job.entry;
    let outcome = run_with_reauth(&ctx.session, ctx.retry(), "upload", name, |creds| async move {
        store.upload_object(&creds, entry).await
    })
    .await;

    ctx.in_flight.release(job.name());
    settle(ctx, "upload", name, outcome)
}

/// Deletes one object; returns true on success
pub async fn process_delete(ctx: &SyncContext, job: &DeleteJob) -> bool {
    let name = job.name().as_str();
    let store = &ctx.store;
    let target = job.name();
    let outcome = run_with_reauth(&ctx.session, ctx.retry(), "delete", name, |creds| async move {
        store.delete_object(&creds, target).await
    })
    .await;

    settle(ctx, "delete", name, outcome)
}

/// Copies one object and, on success, queues the delete of its source
pub async fn process_copy(ctx: &SyncContext, job: &CopyJob) -> bool {
    let label = format!("{} -> {}", job.from, job.to);
    let store = &ctx.store;
    let (from, to) = (&job.from, &job.to);
    let outcome = run_with_reauth(&ctx.session, ctx.retry(), "copy", &label, |creds| async move {
        store.copy_object(&creds, from, to).await
    })
    .await;

    let copied = settle(ctx, "copy", &label, outcome);
    if copied {
        ctx.submit_delete(job.source.clone());
    } else {
        warn!(from = %job.from, "Copy failed, source object left in place");
    }
    copied
}

fn settle(ctx: &SyncContext, action: &str, subject: &str, outcome: RetryOutcome<()>) -> bool {
    match outcome {
        RetryOutcome::Done(()) => {
            info!(action, subject, "Done");
            true
        }
        RetryOutcome::Exhausted { attempts, last } => {
            error!(action, subject, attempts, error = %last, "Permanent failure, giving up");
            false
        }
        RetryOutcome::AuthFailed(e) => {
            error!(action, subject, error = %e, "Abandoned, reauthentication failed");
            ctx.abort("reauthentication failed");
            false
        }
    }
}

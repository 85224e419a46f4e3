//! Filesystem event monitor
//!
//! A single task reads kernel events, maps each one to a relative name,
//! drops excluded paths, and dispatches on (event kind × directory):
//!
//! | Event       | Directory                                   | File                         |
//! |-------------|---------------------------------------------|------------------------------|
//! | create      | helper: settle, watch, scan, diff, upload   | stat + hash, submit upload   |
//! | delete      | drop the watch                              | submit delete                |
//! | close-write | -                                           | submit upload unless in flight |
//! | moved-from  | record cookie                               | record cookie                |
//! | moved-to    | helper: remap watches, copy every object    | submit one copy              |
//!
//! Helpers run on a [`TaskTracker`] and stop as soon as shutdown starts.
//! A moved-to without a recorded source came from outside the tree and is
//! handled as a create.

pub mod backend;
pub mod events;
pub mod pending;
pub mod watch_table;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cfsync_core::domain::{entries::RemoteEntry, newtypes::RelativeName};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::context::SyncContext;
use crate::lister::list_remote;
use crate::reconciler::diff_for_upload;
use crate::scanner::{list_directories, scan_tree, stat_local_file};
use backend::{RawEventReceiver, WatchBackend, WatchError};
use events::{map_notify_event, FsEvent, FsEventKind};
use pending::{PendingMove, PendingMoves};
use watch_table::WatchTable;

pub struct EventMonitor {
    ctx: Arc<SyncContext>,
    watches: Arc<WatchTable>,
    pending: PendingMoves,
    helpers: TaskTracker,
}

impl EventMonitor {
    pub fn new(ctx: Arc<SyncContext>, backend: Arc<dyn WatchBackend>) -> Self {
        let pending = PendingMoves::new(ctx.options.move_expiry);
        Self {
            ctx,
            watches: Arc::new(WatchTable::new(backend)),
            pending,
            helpers: TaskTracker::new(),
        }
    }

    pub fn watches(&self) -> &WatchTable {
        &self.watches
    }

    pub fn pending(&self) -> &PendingMoves {
        &self.pending
    }

    pub fn helpers(&self) -> TaskTracker {
        self.helpers.clone()
    }

    /// Watches the root and every non-excluded directory below it
    ///
    /// Subdirectories the kernel refuses are logged and skipped.
    ///
    /// # Returns
    /// The number of directories watched
    ///
    /// # Errors
    /// Returns the backend error if the root itself cannot be watched
    pub async fn watch_root(&self) -> Result<usize, WatchError> {
        self.watches.add(&self.ctx.root)?;

        let ctx = Arc::clone(&self.ctx);
        let dirs = match tokio::task::spawn_blocking(move || {
            list_directories(&ctx.root, &ctx.root, &ctx.filter)
        })
        .await
        {
            Ok(dirs) => dirs,
            Err(e) => {
                warn!(error = %e, "Directory listing task failed");
                vec![self.ctx.root.clone()]
            }
        };
        let watched = self.watches.add_all(&dirs);
        info!(directories = watched, "Watching local tree");
        Ok(watched)
    }

    /// Waits until every helper spawned so far has finished
    pub async fn wait_for_helpers(&self) {
        self.helpers.close();
        self.helpers.wait().await;
        self.helpers.reopen();
    }

    /// Reads events until `stop` is cancelled or the event stream ends
    pub async fn run(self, mut events: RawEventReceiver, stop: CancellationToken) {
        info!(root = %self.ctx.root.display(), "Event monitor started");
        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                received = events.recv() => match received {
                    Some(Ok(raw)) => {
                        if let Some(event) = map_notify_event(&raw) {
                            self.handle_event(event).await;
                        }
                    }
                    Some(Err(e)) => warn!(error = %e, "File watcher error"),
                    None => {
                        warn!("File watcher event stream closed");
                        break;
                    }
                },
            }
        }
        info!("Event monitor stopped");
    }

    /// Dispatches one event
    pub async fn handle_event(&self, event: FsEvent) {
        let name = match RelativeName::from_path(&self.ctx.root, &event.path) {
            Ok(name) => name,
            Err(e) => {
                debug!(path = %event.path.display(), error = %e, "Ignoring event");
                return;
            }
        };
        if self.ctx.filter.excludes(&event.path, name.as_str()) {
            debug!(name = %name, "Ignoring event on excluded path");
            return;
        }

        debug!(kind = ?event.kind, dir = event.is_dir, name = %name, "Event");

        match (event.kind, event.is_dir) {
            (FsEventKind::Create, true) => self.spawn_adopt(event.path, name),
            (FsEventKind::Create, false) => self.upload_file(&event.path, name).await,
            (FsEventKind::CloseWrite, true) => {}
            (FsEventKind::CloseWrite, false) => {
                if self.ctx.in_flight.contains(&name) {
                    debug!(name = %name, "Upload already in flight, dropping notification");
                    return;
                }
                self.upload_file(&event.path, name).await;
            }
            (FsEventKind::Delete, true) => {
                self.watches.remove(&event.path);
            }
            (FsEventKind::Delete, false) => {
                self.ctx
                    .submit_delete(RemoteEntry::stub(name, &self.ctx.root));
            }
            (FsEventKind::MovedFrom, _) => match event.cookie {
                Some(cookie) => {
                    for expired in self.pending.record(cookie, name, event.path) {
                        self.forget_moved_away(&expired);
                    }
                }
                None => debug!(name = %name, "Move source without cookie"),
            },
            (FsEventKind::MovedTo, is_dir) => {
                let source = event.cookie.and_then(|cookie| self.pending.take(cookie));
                match (source, is_dir) {
                    (Some(from), true) => self.spawn_relocate(from, event.path, name),
                    (Some(from), false) => {
                        self.ctx.submit_copy(from.name, name);
                    }
                    (None, true) => {
                        debug!(name = %name, "Directory moved in from outside");
                        self.spawn_adopt(event.path, name);
                    }
                    (None, false) => {
                        debug!(name = %name, "File moved in from outside");
                        self.upload_file(&event.path, name).await;
                    }
                }
            }
        }
    }

    /// Drops the watches of a directory that left the tree
    fn forget_moved_away(&self, expired: &PendingMove) {
        if self.watches.contains(&expired.path) {
            let removed = self.watches.remove_tree(&expired.path);
            debug!(name = %expired.name, watches = removed, "Dropped watches of moved-away directory");
        }
    }

    async fn upload_file(&self, path: &Path, name: RelativeName) {
        let ctx = Arc::clone(&self.ctx);
        let file = path.to_path_buf();
        match tokio::task::spawn_blocking(move || stat_local_file(&ctx.root, &file)).await {
            Ok(Ok(entry)) => {
                self.ctx.submit_upload(entry);
            }
            Ok(Err(e)) => warn!(name = %name, error = %e, "Skipping file"),
            Err(e) => warn!(name = %name, error = %e, "Hashing task failed"),
        }
    }

    fn spawn_adopt(&self, path: PathBuf, name: RelativeName) {
        let ctx = Arc::clone(&self.ctx);
        let watches = Arc::clone(&self.watches);
        let cancel = ctx.shutdown_token();
        self.helpers.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => debug!("Directory helper cancelled"),
                _ = adopt_directory(&ctx, &watches, path, name) => {}
            }
        });
    }

    fn spawn_relocate(&self, from: PendingMove, to_path: PathBuf, to_name: RelativeName) {
        let ctx = Arc::clone(&self.ctx);
        let watches = Arc::clone(&self.watches);
        let cancel = ctx.shutdown_token();
        self.helpers.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => debug!("Move helper cancelled"),
                _ = relocate_directory(&ctx, &watches, from, to_path, to_name) => {}
            }
        });
    }
}

/// Brings a directory that just appeared under watch and uploads its content
async fn adopt_directory(
    ctx: &Arc<SyncContext>,
    watches: &WatchTable,
    path: PathBuf,
    name: RelativeName,
) {
    tokio::time::sleep(ctx.options.settle_delay).await;

    let scan_ctx = Arc::clone(ctx);
    let scanned = tokio::task::spawn_blocking(move || {
        let dirs = list_directories(&scan_ctx.root, &path, &scan_ctx.filter);
        let files = scan_tree(&scan_ctx.root, &path, &scan_ctx.filter);
        (dirs, files)
    })
    .await;
    let (dirs, local) = match scanned {
        Ok(result) => result,
        Err(e) => {
            warn!(name = %name, error = %e, "Directory scan task failed");
            return;
        }
    };

    watches.add_all(&dirs);
    if local.is_empty() {
        debug!(name = %name, "New directory holds no files");
        return;
    }

    let remote = match list_remote(ctx, Some(&name)).await {
        Ok(remote) => remote,
        Err(e) => {
            ctx.abort(&format!("listing below {name} failed: {e}"));
            return;
        }
    };

    let diff = diff_for_upload(&local, &remote);
    let queued = diff
        .jobs
        .into_iter()
        .filter(|job| ctx.submit_upload(job.entry.clone()))
        .count();
    info!(name = %name, files = local.len(), queued, "Adopted new directory");
}

/// Follows a directory rename: remaps watches and copies every object below the old name
async fn relocate_directory(
    ctx: &Arc<SyncContext>,
    watches: &WatchTable,
    from: PendingMove,
    to_path: PathBuf,
    to_name: RelativeName,
) {
    watches.remove_tree(&from.path);

    let scan_ctx = Arc::clone(ctx);
    let new_root = to_path.clone();
    match tokio::task::spawn_blocking(move || {
        list_directories(&scan_ctx.root, &new_root, &scan_ctx.filter)
    })
    .await
    {
        Ok(dirs) => {
            watches.add_all(&dirs);
        }
        Err(e) => warn!(path = %to_path.display(), error = %e, "Directory listing task failed"),
    }

    let remote = match list_remote(ctx, Some(&from.name)).await {
        Ok(remote) => remote,
        Err(e) => {
            ctx.abort(&format!("listing below {} failed: {e}", from.name));
            return;
        }
    };

    let mut names: Vec<RelativeName> = remote.into_keys().collect();
    names.sort();
    let mut queued = 0;
    for old in names {
        if let Some(new) = old.rebase(&from.name, &to_name) {
            if ctx.submit_copy(old, new) {
                queued += 1;
            }
        }
    }
    info!(from = %from.name, to = %to_name, queued, "Directory moved");
}

/// The running monitor task and the helpers it spawned
pub struct MonitorHandle {
    task: JoinHandle<()>,
    stop: CancellationToken,
    helpers: TaskTracker,
}

impl MonitorHandle {
    /// Spawns `monitor` reading from `events`
    pub fn spawn(monitor: EventMonitor, events: RawEventReceiver) -> Self {
        let stop = CancellationToken::new();
        let helpers = monitor.helpers();
        let task = tokio::spawn(monitor.run(events, stop.clone()));
        Self {
            task,
            stop,
            helpers,
        }
    }

    /// Stops the monitor task, releasing the kernel watcher, and waits for helpers
    pub async fn stop(self) {
        self.stop.cancel();
        self.task.abort();
        match self.task.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!(error = %e, "Event monitor task failed"),
        }
        self.helpers.close();
        self.helpers.wait().await;
        debug!("Event monitor and helpers stopped");
    }
}

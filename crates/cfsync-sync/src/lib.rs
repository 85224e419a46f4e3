//! cfsync Sync - Local-to-container mirroring engine
//!
//! Provides:
//! - Startup reconciliation of the local tree against the remote container
//! - Continuous mirroring of filesystem events (create, modify, delete, move)
//! - Upload, delete and copy worker pools with token-aware retry
//! - Coordinated shutdown
//!
//! ## Architecture
//!
//! ```text
//!  RemoteLister ─┐
//!                ├─→ reconciler ─┐
//!  scanner ──────┘               │
//!                                ▼
//!  inotify ─→ EventMonitor ─→ WorkQueues (upload / delete / copy) ─→ WorkerPools ─→ ObjectStore
//!                                                                         │
//!                                                              AuthSession (reauth)
//! ```
//!
//! ## Modules
//!
//! - [`exclusion`] - Regular-expression exclusion filter
//! - [`scanner`] - Iterative directory walk with MD5 hashing
//! - [`lister`] - Paginated remote inventory
//! - [`reconciler`] - Upload/delete diffs between two inventories
//! - [`session`] - Credentials snapshot and single-writer reauthentication
//! - [`retry`] - The bounded retry loop shared by every remote call
//! - [`queue`] / [`inflight`] - Work queues and upload de-duplication
//! - [`workers`] - Worker pools
//! - [`monitor`] - Filesystem event monitor and move correlation
//! - [`shutdown`] - Shutdown coordinator
//! - [`engine`] - Startup orchestration

pub mod context;
pub mod engine;
pub mod exclusion;
pub mod inflight;
pub mod lister;
pub mod monitor;
pub mod queue;
pub mod reconciler;
pub mod retry;
pub mod scanner;
pub mod session;
pub mod shutdown;
pub mod workers;

#[cfg(test)]
pub(crate) mod test_support;

use cfsync_core::domain::errors::DomainError;
use cfsync_core::ports::{IdentityError, StoreError};
use thiserror::Error;

pub use context::{EngineOptions, SyncContext};
pub use engine::{RunningEngine, StartupSummary, SyncEngine};
pub use exclusion::ExclusionFilter;
pub use monitor::backend::{NotifyBackend, WatchBackend, WatchError};
pub use session::AuthSession;

/// Errors that can occur during synchronization
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error occurred during file operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A domain-level error propagated from cfsync-core
    #[error("Domain error: {0}")]
    DomainError(#[from] DomainError),

    /// The exclusion file could not be loaded
    #[error("Exclusion file error: {0}")]
    Exclusion(#[from] exclusion::ExclusionError),

    /// The identity exchange failed
    #[error("Authentication failed: {0}")]
    Auth(#[from] IdentityError),

    /// A listing page kept failing until the retry budget ran out
    #[error("Listing failed after {attempts} attempts: {last}")]
    ListingFailed {
        /// Attempts made for the failing page
        attempts: u32,
        /// Failure of the final attempt
        last: StoreError,
    },

    /// The kernel watcher could not be set up
    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),

    /// A background task died unexpectedly
    #[error("Task failed: {0}")]
    Task(String),

    /// The engine stopped because of a fatal runtime condition
    #[error("Engine aborted: {0}")]
    Aborted(String),
}

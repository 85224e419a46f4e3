//! Work items carried by the upload, delete and copy queues
//!
//! Each queue carries [`WorkItem`]s of one job type. The `Shutdown` variant is
//! the termination marker injected once per worker when the daemon stops.

use serde::{Deserialize, Serialize};

use super::entries::{LocalEntry, RemoteEntry};
use super::newtypes::RelativeName;

/// An item popped by a worker: either a job or the marker telling it to stop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem<J> {
    /// A job to execute
    Job(J),
    /// Stop after this item; exactly one is queued per worker
    Shutdown,
}

impl<J> WorkItem<J> {
    /// Returns the job, or `None` for the shutdown marker
    pub fn into_job(self) -> Option<J> {
        match self {
            WorkItem::Job(job) => Some(job),
            WorkItem::Shutdown => None,
        }
    }
}

/// Upload a local file to the object of the same name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadJob {
    pub entry: LocalEntry,
}

impl UploadJob {
    pub fn name(&self) -> &RelativeName {
        &self.entry.name
    }
}

/// Delete a remote object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteJob {
    pub entry: RemoteEntry,
}

impl DeleteJob {
    pub fn name(&self) -> &RelativeName {
        &self.entry.name
    }
}

/// Server-side copy `from` → `to`; a successful copy is followed by a delete of `from`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyJob {
    pub from: RelativeName,
    pub to: RelativeName,
    /// Metadata of the source object, used for the follow-up delete
    pub source: RemoteEntry,
}

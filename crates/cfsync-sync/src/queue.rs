//! Unbounded multi-consumer work queues
//!
//! Each pool has one [`WorkQueue`] of [`WorkItem`]s. Producers never block;
//! consumers await until an item is available. Shutdown markers travel
//! through the same queue as jobs, so a worker sees its marker only after
//! every job queued before it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use cfsync_core::domain::work::{CopyJob, DeleteJob, UploadJob, WorkItem};
use tokio::sync::Notify;

struct QueueInner<J> {
    name: &'static str,
    items: Mutex<VecDeque<WorkItem<J>>>,
    notify: Notify,
}

/// A cloneable handle to one FIFO queue
pub struct WorkQueue<J> {
    inner: Arc<QueueInner<J>>,
}

impl<J> Clone for WorkQueue<J> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<J> WorkQueue<J> {
    pub fn new(name: &'static str) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                name,
                items: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<WorkItem<J>>> {
        match self.inner.items.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Appends a job
    pub fn push(&self, job: J) {
        self.items().push_back(WorkItem::Job(job));
        self.inner.notify.notify_one();
    }

    /// Appends `count` shutdown markers
    pub fn push_shutdown(&self, count: usize) {
        let mut items = self.items();
        for _ in 0..count {
            items.push_back(WorkItem::Shutdown);
        }
        drop(items);
        for _ in 0..count {
            self.inner.notify.notify_one();
        }
    }

    /// Removes the next item without waiting
    pub fn try_pop(&self) -> Option<WorkItem<J>> {
        self.items().pop_front()
    }

    /// Waits for and removes the next item
    pub async fn pop(&self) -> WorkItem<J> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a push in between is not missed
            notified.as_mut().enable();

            if let Some(item) = self.try_pop() {
                return item;
            }
            notified.await;
        }
    }

    /// Removes every queued item and returns the jobs among them
    pub fn drain(&self) -> Vec<J> {
        self.items()
            .drain(..)
            .filter_map(WorkItem::into_job)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }
}

/// The three queues shared by the monitor, the reconciler and the workers
#[derive(Clone)]
pub struct WorkQueues {
    pub upload: WorkQueue<UploadJob>,
    pub delete: WorkQueue<DeleteJob>,
    pub copy: WorkQueue<CopyJob>,
}

impl WorkQueues {
    pub fn new() -> Self {
        Self {
            upload: WorkQueue::new("upload"),
            delete: WorkQueue::new("delete"),
            copy: WorkQueue::new("copy"),
        }
    }
}

impl Default for WorkQueues {
    fn default() -> Self {
        Self::new()
    }
}

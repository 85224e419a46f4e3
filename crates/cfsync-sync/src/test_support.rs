//! In-memory fakes shared by the engine's unit tests

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cfsync_core::domain::{
    entries::LocalEntry,
    newtypes::{ContentHash, RelativeName},
};
use cfsync_core::ports::{
    Credentials, IdentityError, IdentityProvider, ListQuery, ObjectRecord, ObjectStore, StoreError,
};
use tempfile::TempDir;

use crate::context::{EngineOptions, SyncContext};
use crate::exclusion::ExclusionFilter;
use crate::monitor::backend::{WatchBackend, WatchError};
use crate::retry::RetryPolicy;
use crate::session::AuthSession;

pub const ENDPOINT: &str = "https://storage.test/v1/acct";

pub fn name(s: &str) -> RelativeName {
    RelativeName::new(s.to_string()).unwrap()
}

pub fn hash_of(content: &[u8]) -> ContentHash {
    ContentHash::from_digest(md5::compute(content).0)
}

/// Entry for `rel` below `root`, hashed from the name itself; no file is written
pub fn local_entry(root: &Path, rel: &str) -> LocalEntry {
    LocalEntry {
        path: root.join(rel),
        name: name(rel),
        hash: hash_of(rel.as_bytes()),
        size: rel.len() as u64,
        modified: None,
    }
}

/// Writes `content` to `root/rel`, creating parent directories
pub fn write_file(root: &Path, rel: &str, content: &[u8]) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

// ============================================================================
// FakeIdentity
// ============================================================================

/// Issues `token-1`, `token-2`, ... until told to fail
pub struct FakeIdentity {
    calls: AtomicU32,
    failure: Mutex<Option<IdentityError>>,
    delay: Duration,
}

impl FakeIdentity {
    pub fn new() -> Self {
        Self {
            calls: AtomicU32::new(0),
            failure: Mutex::new(None),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fail_with(&self, err: IdentityError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn authenticate(&self) -> Result<Credentials, IdentityError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(Credentials::new(format!("token-{n}"), ENDPOINT))
    }
}

// ============================================================================
// FakeStore
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    List,
    Upload,
    Delete,
    Copy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List {
        prefix: Option<String>,
        marker: Option<String>,
        token: String,
    },
    Upload {
        name: String,
        token: String,
    },
    Delete {
        name: String,
        token: String,
    },
    Copy {
        from: String,
        to: String,
        token: String,
    },
}

impl Call {
    pub fn op(&self) -> Op {
        match self {
            Call::List { .. } => Op::List,
            Call::Upload { .. } => Op::Upload,
            Call::Delete { .. } => Op::Delete,
            Call::Copy { .. } => Op::Copy,
        }
    }
}

/// A container held in memory
///
/// Listing honours prefix, marker and limit like Swift. Deleting a missing
/// object fails with 404. Failures can be scripted per operation, and the
/// store can be told to accept a single token only.
#[derive(Default)]
pub struct FakeStore {
    objects: Mutex<BTreeMap<String, ObjectRecord>>,
    failures: Mutex<HashMap<Op, VecDeque<StoreError>>>,
    accepted_token: Mutex<Option<String>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: &str, hash: &ContentHash) {
        self.objects.lock().unwrap().insert(
            name.to_string(),
            ObjectRecord {
                name: name.to_string(),
                bytes: 1,
                content_type: "application/octet-stream".to_string(),
                last_modified: "2024-03-01T12:30:45.123450".to_string(),
                hash: hash.as_str().to_string(),
            },
        );
    }

    pub fn insert_raw(&self, record: ObjectRecord) {
        self.objects
            .lock()
            .unwrap()
            .insert(record.name.clone(), record);
    }

    /// The next calls of `op` fail with `errors`, in order
    pub fn fail_next(&self, op: Op, errors: impl IntoIterator<Item = StoreError>) {
        self.failures
            .lock()
            .unwrap()
            .entry(op)
            .or_default()
            .extend(errors);
    }

    /// Reject every token other than `token` with 401
    pub fn accept_only(&self, token: &str) {
        *self.accepted_token.lock().unwrap() = Some(token.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls().iter().filter(|c| c.op() == op).count()
    }

    pub fn names(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn hash_of(&self, name: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(name)
            .map(|r| r.hash.clone())
    }

    fn begin(&self, call: Call, creds: &Credentials) -> Result<(), StoreError> {
        let op = call.op();
        self.calls.lock().unwrap().push(call);
        if let Some(accepted) = self.accepted_token.lock().unwrap().as_deref() {
            if creds.token() != accepted {
                return Err(StoreError::Unauthorized);
            }
        }
        match self
            .failures
            .lock()
            .unwrap()
            .get_mut(&op)
            .and_then(VecDeque::pop_front)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn list_objects(
        &self,
        creds: &Credentials,
        query: &ListQuery,
    ) -> Result<Vec<ObjectRecord>, StoreError> {
        self.begin(
            Call::List {
                prefix: query.prefix.clone(),
                marker: query.marker.clone(),
                token: creds.token().to_string(),
            },
            creds,
        )?;
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .values()
            .filter(|r| {
                query
                    .prefix
                    .as_deref()
                    .map_or(true, |p| r.name.starts_with(p))
            })
            .filter(|r| {
                query
                    .marker
                    .as_deref()
                    .map_or(true, |m| r.name.as_str() > m)
            })
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn upload_object(
        &self,
        creds: &Credentials,
        entry: &LocalEntry,
    ) -> Result<(), StoreError> {
        self.begin(
            Call::Upload {
                name: entry.name.to_string(),
                token: creds.token().to_string(),
            },
            creds,
        )?;
        self.insert(entry.name.as_str(), &entry.hash);
        Ok(())
    }

    async fn delete_object(
        &self,
        creds: &Credentials,
        name: &RelativeName,
    ) -> Result<(), StoreError> {
        self.begin(
            Call::Delete {
                name: name.to_string(),
                token: creds.token().to_string(),
            },
            creds,
        )?;
        match self.objects.lock().unwrap().remove(name.as_str()) {
            Some(_) => Ok(()),
            None => Err(StoreError::Status(404)),
        }
    }

    async fn copy_object(
        &self,
        creds: &Credentials,
        from: &RelativeName,
        to: &RelativeName,
    ) -> Result<(), StoreError> {
        self.begin(
            Call::Copy {
                from: from.to_string(),
                to: to.to_string(),
                token: creds.token().to_string(),
            },
            creds,
        )?;
        let mut objects = self.objects.lock().unwrap();
        let mut record = objects
            .get(from.as_str())
            .cloned()
            .ok_or(StoreError::Status(404))?;
        record.name = to.to_string();
        objects.insert(to.to_string(), record);
        Ok(())
    }
}

// ============================================================================
// FakeWatchBackend
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCall {
    Watch(PathBuf),
    Unwatch(PathBuf),
}

#[derive(Default)]
pub struct FakeWatchBackend {
    calls: Mutex<Vec<WatchCall>>,
    refused: Mutex<Vec<PathBuf>>,
}

impl FakeWatchBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<WatchCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Makes every later watch of `dir` fail the way a full inotify table does
    pub fn refuse(&self, dir: &Path) {
        self.refused.lock().unwrap().push(dir.to_path_buf());
    }
}

impl WatchBackend for FakeWatchBackend {
    fn watch(&self, dir: &Path) -> Result<(), WatchError> {
        if self.refused.lock().unwrap().iter().any(|p| p == dir) {
            return Err(WatchError::Add {
                path: dir.to_path_buf(),
                reason: "No space left on device (os error 28)".to_string(),
            });
        }
        self.calls
            .lock()
            .unwrap()
            .push(WatchCall::Watch(dir.to_path_buf()));
        Ok(())
    }

    fn unwatch(&self, dir: &Path) -> Result<(), WatchError> {
        self.calls
            .lock()
            .unwrap()
            .push(WatchCall::Unwatch(dir.to_path_buf()));
        Ok(())
    }
}

// ============================================================================
// TestHarness
// ============================================================================

/// A context over a temporary root, a [`FakeStore`] and a [`FakeIdentity`]
pub struct TestHarness {
    pub dir: TempDir,
    pub ctx: Arc<SyncContext>,
    pub store: Arc<FakeStore>,
    pub identity: Arc<FakeIdentity>,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_options(|_| {}).await
    }

    pub async fn with_options(tweak: impl FnOnce(&mut EngineOptions)) -> Self {
        Self::build(ExclusionFilter::empty(), tweak).await
    }

    pub async fn with_filter(filter: ExclusionFilter) -> Self {
        Self::build(filter, |_| {}).await
    }

    async fn build(filter: ExclusionFilter, tweak: impl FnOnce(&mut EngineOptions)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::new());
        let identity = Arc::new(FakeIdentity::new());

        let mut options = EngineOptions {
            retry: RetryPolicy {
                max_attempts: 5,
                backoff: Duration::from_millis(1),
            },
            page_size: 100,
            settle_delay: Duration::from_millis(1),
            move_expiry: Some(Duration::from_secs(300)),
            ..EngineOptions::default()
        };
        options.workers.upload = 2;
        options.workers.delete = 2;
        options.workers.copy = 2;
        tweak(&mut options);

        let session = AuthSession::establish(identity.clone(), options.retry)
            .await
            .unwrap();
        let ctx = Arc::new(SyncContext::new(
            dir.path().to_path_buf(),
            filter,
            store.clone(),
            session,
            options,
        ));

        Self {
            dir,
            ctx,
            store,
            identity,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

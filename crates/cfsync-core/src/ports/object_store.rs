//! Object store port (driven/secondary port)
//!
//! This module defines the interface for the remote container the watched
//! root is mirrored into. The primary implementation speaks the OpenStack
//! Swift / Cloud Files REST dialect over HTTP.
//!
//! ## Design Notes
//!
//! - Every call takes the [`Credentials`] snapshot to use, so callers decide
//!   when a refreshed token takes effect.
//! - Failures are classified into [`StoreError`]: the engine only needs to
//!   tell an expired token apart from everything else.
//! - [`ObjectRecord`] is a port-level DTO holding the raw listing fields;
//!   the engine maps it to a `RemoteEntry`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::identity::Credentials;
use crate::domain::entries::LocalEntry;
use crate::domain::newtypes::RelativeName;

// ============================================================================
// StoreError
// ============================================================================

/// Classified failure of a single object-store request
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The token was rejected (HTTP 401); reauthenticate and retry
    #[error("Unauthorized")]
    Unauthorized,

    /// The store answered with a status other than the expected one
    #[error("Unexpected status {0}")]
    Status(u16),

    /// The request never produced a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response body could not be parsed
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The local source file could not be opened
    #[error("Local I/O error: {0}")]
    LocalIo(String),
}

impl StoreError {
    /// Returns true for the failure that triggers reauthentication
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, StoreError::Unauthorized)
    }
}

// ============================================================================
// Listing DTOs
// ============================================================================

/// Parameters of one listing page request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Only objects whose names start with this prefix
    pub prefix: Option<String>,
    /// Only objects whose names sort after this marker
    pub marker: Option<String>,
    /// Maximum number of records in the page
    pub limit: usize,
}

/// One object as reported by a container listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub name: String,
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub last_modified: String,
    #[serde(default)]
    pub hash: String,
}

// ============================================================================
// ObjectStore trait
// ============================================================================

/// Port trait for remote container operations
///
/// Implementations perform exactly one request per call and never retry;
/// the engine owns the retry and reauthentication policy.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetches one page of the container listing
    ///
    /// # Arguments
    /// * `creds` - Token and endpoint to use
    /// * `query` - Prefix, marker and page size
    ///
    /// # Returns
    /// The raw records of the page, in store order
    async fn list_objects(
        &self,
        creds: &Credentials,
        query: &ListQuery,
    ) -> Result<Vec<ObjectRecord>, StoreError>;

    /// Uploads the file described by `entry` to the object `entry.name`
    ///
    /// Succeeds only on HTTP 201.
    async fn upload_object(&self, creds: &Credentials, entry: &LocalEntry)
        -> Result<(), StoreError>;

    /// Deletes the object `name`
    ///
    /// Succeeds only on HTTP 204.
    async fn delete_object(&self, creds: &Credentials, name: &RelativeName)
        -> Result<(), StoreError>;

    /// Copies the object `from` to `to` on the server side
    ///
    /// Succeeds only on HTTP 201.
    async fn copy_object(
        &self,
        creds: &Credentials,
        from: &RelativeName,
        to: &RelativeName,
    ) -> Result<(), StoreError>;
}

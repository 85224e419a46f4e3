//! Inventory entries
//!
//! [`LocalEntry`] describes a regular file found below the watched root;
//! [`RemoteEntry`] describes an object in the remote container. Both are keyed
//! by [`RelativeName`] and compared by [`ContentHash`].

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{ContentHash, RelativeName};

/// A regular file below the watched root, hashed and stat-ed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalEntry {
    /// Absolute path on disk
    pub path: PathBuf,
    /// Name relative to the watched root (also the remote object name)
    pub name: RelativeName,
    /// MD5 of the file content
    pub hash: ContentHash,
    /// Size in bytes at stat time
    pub size: u64,
    /// Modification time at stat time
    pub modified: Option<DateTime<Utc>>,
}

/// An object in the remote container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Object name
    pub name: RelativeName,
    /// Object size in bytes
    pub bytes: u64,
    /// Content type reported by the store
    pub content_type: String,
    /// Object ETag, `None` when the store reported something that is not an MD5
    pub hash: Option<ContentHash>,
    /// Last modification time reported by the store
    pub last_modified: Option<DateTime<Utc>>,
    /// Where this object lives (or lived) below the watched root
    pub local_path: PathBuf,
}

impl RemoteEntry {
    /// Build a metadata-less entry for an object known only by name
    ///
    /// Used for deletes and copies triggered by filesystem events, where the
    /// remote metadata is never consulted.
    #[must_use]
    pub fn stub(name: RelativeName, root: &Path) -> Self {
        let local_path = name.to_local_path(root);
        Self {
            name,
            bytes: 0,
            content_type: String::new(),
            hash: None,
            last_modified: None,
            local_path,
        }
    }

    /// Returns true if the remote content is known to equal `hash`
    #[must_use]
    pub fn matches(&self, hash: &ContentHash) -> bool {
        self.hash.as_ref() == Some(hash)
    }
}

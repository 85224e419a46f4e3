//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for the two values every
//! inventory is keyed or compared by: the object name relative to the watched
//! root, and the MD5 content hash. Each newtype ensures validity at
//! construction time.

use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// RelativeName
// ============================================================================

/// A `/`-separated object name relative to the watched root
///
/// The same value names a file below the local root and an object in the
/// remote container, e.g. `"docs/report.pdf"`. It is never empty, never
/// starts or ends with `/`, and contains no empty, `.` or `..` segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativeName(String);

impl RelativeName {
    /// Create a new RelativeName
    ///
    /// # Errors
    /// Returns error if the name is empty, absolute, or contains invalid segments
    pub fn new(name: String) -> Result<Self, DomainError> {
        if name.is_empty() {
            return Err(DomainError::InvalidName(
                "Relative name cannot be empty".to_string(),
            ));
        }

        if name.starts_with('/') {
            return Err(DomainError::InvalidName(format!(
                "Relative name must not start with '/': {name}"
            )));
        }

        if name
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(DomainError::InvalidName(format!(
                "Relative name contains an empty or traversal segment: {name}"
            )));
        }

        Ok(Self(name))
    }

    /// Derive the relative name of `path` below `root`
    ///
    /// # Errors
    /// Returns error if `path` is not strictly inside `root`, or is not UTF-8
    pub fn from_path(root: &Path, path: &Path) -> Result<Self, DomainError> {
        let rel = path
            .strip_prefix(root)
            .map_err(|_| DomainError::PathNotInSyncRoot(path.display().to_string()))?;

        let mut segments = Vec::new();
        for component in rel.components() {
            match component {
                Component::Normal(part) => {
                    let part = part
                        .to_str()
                        .ok_or_else(|| DomainError::NonUtf8Path(path.display().to_string()))?;
                    segments.push(part);
                }
                Component::CurDir => {}
                _ => {
                    return Err(DomainError::InvalidName(format!(
                        "Unexpected path component in {}",
                        path.display()
                    )))
                }
            }
        }

        Self::new(segments.join("/"))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Absolute local path of this name below `root`
    #[must_use]
    pub fn to_local_path(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |acc, seg| acc.join(seg))
    }

    /// Append a relative suffix (itself `/`-separated)
    ///
    /// # Errors
    /// Returns error if the combined name is invalid
    pub fn join(&self, suffix: &str) -> Result<Self, DomainError> {
        Self::new(format!("{}/{suffix}", self.0))
    }

    /// The listing prefix selecting every object below this directory name
    #[must_use]
    pub fn dir_prefix(&self) -> String {
        format!("{}/", self.0)
    }

    /// Returns true if this name lies strictly below `dir`
    #[must_use]
    pub fn is_under(&self, dir: &RelativeName) -> bool {
        self.0.len() > dir.0.len() + 1
            && self.0.starts_with(dir.as_str())
            && self.0.as_bytes()[dir.0.len()] == b'/'
    }

    /// Re-root this name from directory `from` to directory `to`
    ///
    /// `docs/a/b.txt` rebased from `docs` to `papers` yields `papers/a/b.txt`.
    /// Returns `None` when this name is not below `from`.
    #[must_use]
    pub fn rebase(&self, from: &RelativeName, to: &RelativeName) -> Option<Self> {
        if !self.is_under(from) {
            return None;
        }
        let suffix = &self.0[from.0.len() + 1..];
        Some(Self(format!("{}/{suffix}", to.0)))
    }

    /// Final segment of the name
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl Display for RelativeName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RelativeName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for RelativeName {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RelativeName> for String {
    fn from(name: RelativeName) -> Self {
        name.0
    }
}

// ============================================================================
// ContentHash
// ============================================================================

/// Hex-encoded MD5 digest of an object's content
///
/// Object stores report the MD5 of an object as its ETag. The value is kept
/// lowercase so comparisons are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Length of a hex-encoded MD5 digest
    const HEX_LEN: usize = 32;

    /// Create a new ContentHash
    ///
    /// # Errors
    /// Returns error if the value is not 32 hexadecimal characters
    pub fn new(hash: String) -> Result<Self, DomainError> {
        if hash.len() != Self::HEX_LEN {
            return Err(DomainError::InvalidHash(format!(
                "Hash must be {} hex characters, got {}: {hash}",
                Self::HEX_LEN,
                hash.len()
            )));
        }

        if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DomainError::InvalidHash(format!(
                "Hash is not hexadecimal: {hash}"
            )));
        }

        Ok(Self(hash.to_ascii_lowercase()))
    }

    /// Build a hash from a raw 16-byte digest
    #[must_use]
    pub fn from_digest(digest: [u8; 16]) -> Self {
        Self(digest.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentHash {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for ContentHash {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

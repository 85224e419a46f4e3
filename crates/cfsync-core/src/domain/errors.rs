//! Domain error types
//!
//! This module defines error types raised while constructing validated
//! domain values such as relative object names and content hashes.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid relative name (empty, absolute, or containing `.`/`..`)
    #[error("Invalid relative name: {0}")]
    InvalidName(String),

    /// Invalid hash format (expected 32 hex characters)
    #[error("Invalid hash format: {0}")]
    InvalidHash(String),

    /// Path is not within the watched root
    #[error("Path not within sync root: {0}")]
    PathNotInSyncRoot(String),

    /// Path contains bytes that are not valid UTF-8
    #[error("Path is not valid UTF-8: {0}")]
    NonUtf8Path(String),
}

//! Domain entities
//!
//! This module contains the core domain types for cfsync:
//! - Newtypes for validated names and content hashes
//! - Local and remote inventory entries
//! - Work items carried by the upload, delete and copy queues
//! - Domain-specific error types

pub mod entries;
pub mod errors;
pub mod newtypes;
pub mod work;

// Re-export commonly used types
pub use entries::{LocalEntry, RemoteEntry};
pub use errors::DomainError;
pub use newtypes::{ContentHash, RelativeName};
pub use work::{CopyJob, DeleteJob, UploadJob, WorkItem};

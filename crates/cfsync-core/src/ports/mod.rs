//! Port definitions
//!
//! This module defines the port traits the synchronization engine depends on.
//! Implementations live in adapter crates (`cfsync-swift`) and in test fakes.
//!
//! ## Ports Overview
//!
//! - [`IdentityProvider`] - Exchanges account credentials for a token and endpoint
//! - [`ObjectStore`] - Listing, upload, delete and server-side copy of objects

pub mod identity;
pub mod object_store;

pub use identity::{Credentials, IdentityError, IdentityProvider, AUTH_TOKEN_HEADER};
pub use object_store::{ListQuery, ObjectRecord, ObjectStore, StoreError};

//! cfsync Swift - OpenStack Swift / Cloud Files adapters
//!
//! Provides async HTTP implementations of the core ports:
//! - API-key identity exchange against a Keystone v2 token endpoint
//! - Container listing, object upload, delete and server-side copy
//!
//! ## Modules
//!
//! - [`identity`] - [`identity::KeystoneIdentity`], an `IdentityProvider`
//! - [`client`] - [`client::SwiftClient`], an `ObjectStore`

pub mod client;
pub mod identity;

use thiserror::Error;

/// Errors raised while constructing the adapters
#[derive(Debug, Error)]
pub enum SwiftError {
    /// The underlying HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// A configured or catalog URL could not be parsed
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL
        url: String,
        /// Parser message
        reason: String,
    },

    /// The container name is empty or contains a `/`
    #[error("Invalid container name: {0}")]
    InvalidContainer(String),
}

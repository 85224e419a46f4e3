//! Identity provider port
//!
//! Exchanges the configured account credentials for an auth token and the
//! storage endpoint the token is valid for.

use std::fmt;

use thiserror::Error;

/// Header carrying the auth token on every object-store request
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Errors from the identity exchange
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The identity service refused the credentials
    #[error("Identity service rejected the request with status {0}")]
    Rejected(u16),

    /// The request never produced a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response body could not be parsed
    #[error("Malformed identity response: {0}")]
    Malformed(String),

    /// The service catalog had no usable storage endpoint
    #[error("No storage endpoint in service catalog: {0}")]
    MissingEndpoint(String),
}

/// A token together with the storage endpoint it authorizes
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    token: String,
    endpoint: String,
}

impl Credentials {
    pub fn new(token: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    /// Value for the [`AUTH_TOKEN_HEADER`] header
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Storage endpoint URL without a trailing slash
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Port trait for the identity exchange
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Performs one identity exchange
    ///
    /// # Returns
    /// Fresh credentials on HTTP 200 with a well-formed catalog
    async fn authenticate(&self) -> Result<Credentials, IdentityError>;
}

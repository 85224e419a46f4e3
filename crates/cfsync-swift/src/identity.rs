//! Keystone v2 API-key identity exchange
//!
//! Posts the account's username and API key to the token endpoint and picks
//! the object-storage URL out of the returned service catalog.
//!
//! ```text
//! POST {auth_url}
//! {"auth":{"RAX-KSKEY:apiKeyCredentials":{"username":"…","apiKey":"…"}}}
//!
//! 200 {"access":{"token":{"id":"…"},
//!                "serviceCatalog":[{"name":"cloudFiles",
//!                                   "endpoints":[{"region":"ORD","publicURL":"…","internalURL":"…"}]}]}}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use cfsync_core::ports::identity::{Credentials, IdentityError, IdentityProvider};
use reqwest::{header::ACCEPT, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::SwiftError;

/// Catalog entry name of the object-storage service
pub const STORAGE_SERVICE_NAME: &str = "cloudFiles";

/// Connect timeout for the identity service
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct AuthRequest<'a> {
    auth: AuthBody<'a>,
}

#[derive(Debug, Serialize)]
struct AuthBody<'a> {
    #[serde(rename = "RAX-KSKEY:apiKeyCredentials")]
    api_key_credentials: ApiKeyCredentials<'a>,
}

#[derive(Debug, Serialize)]
struct ApiKeyCredentials<'a> {
    username: &'a str,
    #[serde(rename = "apiKey")]
    api_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access: Access,
}

#[derive(Debug, Deserialize)]
struct Access {
    token: Token,
    #[serde(rename = "serviceCatalog")]
    service_catalog: Vec<CatalogService>,
}

#[derive(Debug, Deserialize)]
struct Token {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CatalogService {
    name: String,
    #[serde(default)]
    endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Deserialize)]
struct CatalogEndpoint {
    #[serde(default)]
    region: Option<String>,
    #[serde(rename = "publicURL", default)]
    public_url: Option<String>,
    #[serde(rename = "internalURL", default)]
    internal_url: Option<String>,
}

// ============================================================================
// KeystoneIdentity
// ============================================================================

/// Which catalog URL to use for storage requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// Provider-internal network (no bandwidth charges inside the data center)
    Internal,
    /// Public internet
    Public,
}

/// [`IdentityProvider`] backed by a Keystone v2 token endpoint
pub struct KeystoneIdentity {
    client: Client,
    auth_url: String,
    username: String,
    api_key: String,
    region: Option<String>,
    endpoint_kind: EndpointKind,
}

impl KeystoneIdentity {
    /// Creates a new identity client
    ///
    /// # Arguments
    /// * `auth_url` - Full URL of the token endpoint
    /// * `username` - Account user name
    /// * `api_key` - Account API key
    ///
    /// # Errors
    /// Returns an error if `auth_url` is not a valid URL or the HTTP client
    /// cannot be built
    pub fn new(
        auth_url: impl Into<String>,
        username: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, SwiftError> {
        let auth_url = auth_url.into();
        url::Url::parse(&auth_url).map_err(|e| SwiftError::InvalidUrl {
            url: auth_url.clone(),
            reason: e.to_string(),
        })?;

        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;

        Ok(Self {
            client,
            auth_url,
            username: username.into(),
            api_key: api_key.into(),
            region: None,
            endpoint_kind: EndpointKind::Internal,
        })
    }

    /// Prefer catalog endpoints in `region`
    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }

    /// Choose between the internal and the public storage URL
    pub fn with_endpoint_kind(mut self, kind: EndpointKind) -> Self {
        self.endpoint_kind = kind;
        self
    }
}

#[async_trait]
impl IdentityProvider for KeystoneIdentity {
    async fn authenticate(&self) -> Result<Credentials, IdentityError> {
        debug!(auth_url = %self.auth_url, username = %self.username, "Requesting auth token");

        let body = AuthRequest {
            auth: AuthBody {
                api_key_credentials: ApiKeyCredentials {
                    username: &self.username,
                    api_key: &self.api_key,
                },
            },
        };

        let response = self
            .client
            .post(&self.auth_url)
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(status = status.as_u16(), "Identity service rejected credentials");
            return Err(IdentityError::Rejected(status.as_u16()));
        }

        let text = response
            .text()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;
        let parsed: AuthResponse =
            serde_json::from_str(&text).map_err(|e| IdentityError::Malformed(e.to_string()))?;

        let endpoint = select_endpoint(
            &parsed.access.service_catalog,
            self.region.as_deref(),
            self.endpoint_kind,
        )?;

        info!(endpoint = %endpoint, "Authenticated against identity service");
        Ok(Credentials::new(parsed.access.token.id, endpoint))
    }
}

/// Picks the storage URL from a service catalog
///
/// Within the `cloudFiles` service, the endpoint whose region matches
/// `region` (case-insensitively) wins; otherwise the first endpoint is used.
/// When the requested URL kind is missing the other kind is used instead.
fn select_endpoint(
    catalog: &[CatalogService],
    region: Option<&str>,
    kind: EndpointKind,
) -> Result<String, IdentityError> {
    let service = catalog
        .iter()
        .find(|s| s.name == STORAGE_SERVICE_NAME)
        .ok_or_else(|| {
            IdentityError::MissingEndpoint(format!("no '{STORAGE_SERVICE_NAME}' service"))
        })?;

    let endpoint = region
        .and_then(|wanted| {
            service.endpoints.iter().find(|e| {
                e.region
                    .as_deref()
                    .is_some_and(|r| r.eq_ignore_ascii_case(wanted))
            })
        })
        .or_else(|| {
            if let Some(wanted) = region {
                warn!(region = wanted, "No storage endpoint in region, using the first one");
            }
            service.endpoints.first()
        })
        .ok_or_else(|| {
            IdentityError::MissingEndpoint(format!("'{STORAGE_SERVICE_NAME}' has no endpoints"))
        })?;

    let (preferred, fallback) = match kind {
        EndpointKind::Internal => (&endpoint.internal_url, &endpoint.public_url),
        EndpointKind::Public => (&endpoint.public_url, &endpoint.internal_url),
    };

    match (preferred, fallback) {
        (Some(url), _) => Ok(url.clone()),
        (None, Some(url)) => {
            warn!(kind = ?kind, url = %url, "Requested storage URL kind missing, using the other");
            Ok(url.clone())
        }
        (None, None) => Err(IdentityError::MissingEndpoint(
            "endpoint has neither internalURL nor publicURL".to_string(),
        )),
    }
}

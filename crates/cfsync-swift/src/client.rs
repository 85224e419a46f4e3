//! Swift object-store client
//!
//! Implements [`ObjectStore`] against one container of an OpenStack Swift /
//! Rackspace Cloud Files account. Every method performs exactly one request
//! and classifies the outcome; retry policy lives in the engine.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cfsync_core::ports::{Credentials, ListQuery, ObjectStore};
//! use cfsync_swift::client::SwiftClient;
//!
//! let client = SwiftClient::new("www-backup")?;
//! let creds = Credentials::new("token", "https://storage.example/v1/MossoCloudFS_123");
//! let page = client
//!     .list_objects(&creds, &ListQuery { limit: 10_000, ..Default::default() })
//!     .await?;
//! println!("{} objects", page.len());
//! ```

use std::time::Duration;

use async_trait::async_trait;
use cfsync_core::{
    domain::{entries::LocalEntry, newtypes::RelativeName},
    ports::{
        identity::{Credentials, AUTH_TOKEN_HEADER},
        object_store::{ListQuery, ObjectRecord, ObjectStore, StoreError},
    },
};
use reqwest::{
    header::{ACCEPT, CONTENT_LENGTH},
    Body, Client, Method, RequestBuilder, Response, StatusCode,
};
use tracing::debug;
use url::Url;

use crate::SwiftError;

/// Connect timeout for storage requests
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Header naming the target of a server-side copy
const DESTINATION_HEADER: &str = "Destination";

// ============================================================================
// SwiftClient
// ============================================================================

/// HTTP client bound to a single container
///
/// The storage endpoint comes from the [`Credentials`] passed to each call,
/// so a reauthentication that moves the account to a new endpoint takes
/// effect on the next request.
pub struct SwiftClient {
    /// The underlying HTTP client
    client: Client,
    /// Container every object lives in
    container: String,
}

impl SwiftClient {
    /// Creates a client for `container`
    ///
    /// # Errors
    /// Returns an error if the container name is empty or contains `/`, or if
    /// the HTTP client cannot be built
    pub fn new(container: impl Into<String>) -> Result<Self, SwiftError> {
        let container = container.into();
        if container.is_empty() || container.contains('/') {
            return Err(SwiftError::InvalidContainer(container));
        }

        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self { client, container })
    }

    /// Name of the container this client writes to
    pub fn container(&self) -> &str {
        &self.container
    }

    /// `{endpoint}/{container}` with the container percent-encoded
    fn container_url(&self, creds: &Credentials) -> Result<Url, StoreError> {
        let mut url = Url::parse(creds.endpoint())
            .map_err(|e| StoreError::Transport(format!("invalid storage endpoint: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Transport("storage endpoint cannot be a base URL".into()))?
            .pop_if_empty()
            .push(&self.container);
        Ok(url)
    }

    /// `{endpoint}/{container}/{name}`, encoding each name segment
    fn object_url(&self, creds: &Credentials, name: &RelativeName) -> Result<Url, StoreError> {
        let mut url = self.container_url(creds)?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Transport("storage endpoint cannot be a base URL".into()))?
            .extend(name.as_str().split('/'));
        Ok(url)
    }

    /// Value of the `Destination` header: `{container}/{name}`, percent-encoded
    fn destination(&self, name: &RelativeName) -> Result<String, StoreError> {
        let mut scratch = Url::parse("http://destination/")
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        scratch
            .path_segments_mut()
            .map_err(|_| StoreError::Transport("cannot encode destination".into()))?
            .pop_if_empty()
            .push(&self.container)
            .extend(name.as_str().split('/'));
        Ok(scratch.path().trim_start_matches('/').to_string())
    }

    /// Creates an authenticated request builder
    fn request(&self, method: Method, url: Url, creds: &Credentials) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(AUTH_TOKEN_HEADER, creds.token())
    }
}

/// Maps a response to `Ok` when it carries `expected`
fn expect_status(response: &Response, expected: StatusCode) -> Result<(), StoreError> {
    let status = response.status();
    if status == expected {
        Ok(())
    } else if status == StatusCode::UNAUTHORIZED {
        Err(StoreError::Unauthorized)
    } else {
        Err(StoreError::Status(status.as_u16()))
    }
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Transport(err.to_string())
}

#[async_trait]
impl ObjectStore for SwiftClient {
    async fn list_objects(
        &self,
        creds: &Credentials,
        query: &ListQuery,
    ) -> Result<Vec<ObjectRecord>, StoreError> {
        let mut url = self.container_url(creds)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("format", "json")
                .append_pair("limit", &query.limit.to_string());
            if let Some(marker) = &query.marker {
                pairs.append_pair("marker", marker);
            }
            if let Some(prefix) = &query.prefix {
                pairs.append_pair("prefix", prefix);
            }
        }

        debug!(url = %url, "Listing container page");

        let response = self
            .request(Method::GET, url, creds)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport)?;

        // An empty container answers 204 with no body
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        expect_status(&response, StatusCode::OK)?;

        let text = response.text().await.map_err(transport)?;
        serde_json::from_str(&text).map_err(|e| StoreError::Malformed(e.to_string()))
    }

    async fn upload_object(
        &self,
        creds: &Credentials,
        entry: &LocalEntry,
    ) -> Result<(), StoreError> {
        let url = self.object_url(creds, &entry.name)?;

        let file = tokio::fs::File::open(&entry.path)
            .await
            .map_err(|e| StoreError::LocalIo(format!("{}: {e}", entry.path.display())))?;
        let length = file
            .metadata()
            .await
            .map_err(|e| StoreError::LocalIo(format!("{}: {e}", entry.path.display())))?
            .len();

        debug!(name = %entry.name, bytes = length, "Uploading object");

        let response = self
            .request(Method::PUT, url, creds)
            .header(CONTENT_LENGTH, length)
            .body(Body::from(file))
            .send()
            .await
            .map_err(transport)?;

        expect_status(&response, StatusCode::CREATED)
    }

    async fn delete_object(
        &self,
        creds: &Credentials,
        name: &RelativeName,
    ) -> Result<(), StoreError> {
        let url = self.object_url(creds, name)?;
        debug!(name = %name, "Deleting object");

        let response = self
            .request(Method::DELETE, url, creds)
            .send()
            .await
            .map_err(transport)?;

        expect_status(&response, StatusCode::NO_CONTENT)
    }

    async fn copy_object(
        &self,
        creds: &Credentials,
        from: &RelativeName,
        to: &RelativeName,
    ) -> Result<(), StoreError> {
        let url = self.object_url(creds, from)?;
        let destination = self.destination(to)?;
        let method = Method::from_bytes(b"COPY")
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        debug!(from = %from, to = %to, "Copying object");

        let response = self
            .request(method, url, creds)
            .header(DESTINATION_HEADER, destination)
            .send()
            .await
            .map_err(transport)?;

        expect_status(&response, StatusCode::CREATED)
    }
}

//! Shared test helpers for Swift integration tests
//!
//! Provides wiremock-based mock server setup for the identity service and
//! a container endpoint. Each helper mounts the necessary mock endpoints and
//! returns clients pointing at the mock server.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cfsync_core::domain::newtypes::RelativeName;
use cfsync_core::ports::identity::Credentials;
use cfsync_swift::client::SwiftClient;

/// Account path of the mock storage endpoint
pub const ACCOUNT_PATH: &str = "/v1/MossoCloudFS_test";

/// Container used by every test
pub const CONTAINER: &str = "backup";

/// Token the mock storage endpoint expects
pub const TOKEN: &str = "test-token-001";

/// Starts a mock server and returns it with a client and credentials
/// pointing at `{server}/v1/MossoCloudFS_test`.
pub async fn setup_swift_mock() -> (MockServer, SwiftClient, Credentials) {
    let server = MockServer::start().await;
    let client = SwiftClient::new(CONTAINER).expect("client");
    let creds = Credentials::new(TOKEN, format!("{}{}", server.uri(), ACCOUNT_PATH));
    (server, client, creds)
}

/// Path of the container on the mock server
pub fn container_path() -> String {
    format!("{ACCOUNT_PATH}/{CONTAINER}")
}

/// Path of an object on the mock server (name must not need encoding)
pub fn object_path(name: &str) -> String {
    format!("{ACCOUNT_PATH}/{CONTAINER}/{name}")
}

pub fn name(s: &str) -> RelativeName {
    RelativeName::new(s.to_string()).expect("valid name")
}

/// A Keystone v2 token response with one cloudFiles service in two regions
pub fn identity_response(storage_base: &str) -> serde_json::Value {
    serde_json::json!({
        "access": {
            "token": {"id": "fresh-token", "expires": "2030-01-01T00:00:00Z"},
            "serviceCatalog": [
                {
                    "name": "cloudServersOpenStack",
                    "type": "compute",
                    "endpoints": [{"region": "DFW", "publicURL": "https://compute.example"}]
                },
                {
                    "name": "cloudFiles",
                    "type": "object-store",
                    "endpoints": [
                        {
                            "region": "DFW",
                            "publicURL": format!("{storage_base}/public/dfw"),
                            "internalURL": format!("{storage_base}/internal/dfw")
                        },
                        {
                            "region": "ORD",
                            "publicURL": format!("{storage_base}/public/ord"),
                            "internalURL": format!("{storage_base}/internal/ord")
                        }
                    ]
                }
            ]
        }
    })
}

/// Mounts `POST /v2.0/tokens` answering with [`identity_response`]
pub async fn mount_identity(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(identity_response(&server.uri())))
        .mount(server)
        .await;
}

/// A listing record as Swift reports it
pub fn record(name: &str, hash: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "bytes": 42,
        "content_type": "text/plain",
        "last_modified": "2024-03-01T12:30:45.123450",
        "hash": hash
    })
}

//! Integration tests for the API-key identity exchange

use cfsync_core::ports::identity::{IdentityError, IdentityProvider};
use cfsync_swift::identity::{EndpointKind, KeystoneIdentity};
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use crate::common;

fn identity(server: &MockServer) -> KeystoneIdentity {
    KeystoneIdentity::new(format!("{}/v2.0/tokens", server.uri()), "alice", "key-123")
        .expect("identity client")
}

#[tokio::test]
async fn test_authenticate_sends_api_key_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .and(header("content-type", "application/json"))
        .and(header("accept", "application/json"))
        .and(body_json(serde_json::json!({
            "auth": {"RAX-KSKEY:apiKeyCredentials": {"username": "alice", "apiKey": "key-123"}}
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(common::identity_response(&server.uri())),
        )
        .expect(1)
        .mount(&server)
        .await;

    let creds = identity(&server).authenticate().await.expect("authenticate");
    assert_eq!(creds.token(), "fresh-token");
    assert_eq!(creds.endpoint(), format!("{}/internal/dfw", server.uri()));
}

#[tokio::test]
async fn test_authenticate_public_url_in_region() {
    let server = MockServer::start().await;
    common::mount_identity(&server).await;

    let creds = identity(&server)
        .with_endpoint_kind(EndpointKind::Public)
        .with_region(Some("ORD".to_string()))
        .authenticate()
        .await
        .expect("authenticate");

    assert_eq!(creds.endpoint(), format!("{}/public/ord", server.uri()));
}

#[tokio::test]
async fn test_authenticate_rejected_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = identity(&server).authenticate().await.unwrap_err();
    assert_eq!(err, IdentityError::Rejected(401));
}

#[tokio::test]
async fn test_authenticate_malformed_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"access\": 7}"))
        .mount(&server)
        .await;

    let err = identity(&server).authenticate().await.unwrap_err();
    assert!(matches!(err, IdentityError::Malformed(_)), "{err:?}");
}

#[tokio::test]
async fn test_authenticate_without_storage_service() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access": {"token": {"id": "t"}, "serviceCatalog": []}
        })))
        .mount(&server)
        .await;

    let err = identity(&server).authenticate().await.unwrap_err();
    assert!(matches!(err, IdentityError::MissingEndpoint(_)), "{err:?}");
}

#[tokio::test]
async fn test_authenticate_unreachable_service() {
    // Bound and released, so nothing listens there
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client =
        KeystoneIdentity::new(format!("http://127.0.0.1:{port}/v2.0/tokens"), "alice", "k").unwrap();
    let err = client.authenticate().await.unwrap_err();
    assert!(matches!(err, IdentityError::Transport(_)), "{err:?}");
}

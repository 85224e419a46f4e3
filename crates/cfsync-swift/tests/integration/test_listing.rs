//! Integration tests for container listing

use cfsync_core::ports::object_store::{ListQuery, ObjectStore, StoreError};
use wiremock::{
    matchers::{header, method, path, query_param},
    Mock, ResponseTemplate,
};

use crate::common;

#[tokio::test]
async fn test_list_sends_token_and_paging_parameters() {
    let (server, client, creds) = common::setup_swift_mock().await;

    Mock::given(method("GET"))
        .and(path(common::container_path()))
        .and(header("X-Auth-Token", common::TOKEN))
        .and(header("accept", "application/json"))
        .and(query_param("format", "json"))
        .and(query_param("limit", "2"))
        .and(query_param("marker", "a.txt"))
        .and(query_param("prefix", "docs/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            common::record("docs/b.txt", "0cc175b9c0f1b6a831c399e269772661"),
            common::record("docs/c.txt", "92eb5ffee6ae2fec3ad71c777531578f")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let query = ListQuery {
        prefix: Some("docs/".to_string()),
        marker: Some("a.txt".to_string()),
        limit: 2,
    };
    let page = client.list_objects(&creds, &query).await.expect("list");

    assert_eq!(page.len(), 2);
    assert_eq!(page[0].name, "docs/b.txt");
    assert_eq!(page[0].bytes, 42);
    assert_eq!(page[0].content_type, "text/plain");
    assert_eq!(page[1].hash, "92eb5ffee6ae2fec3ad71c777531578f");
}

#[tokio::test]
async fn test_list_empty_container_no_content() {
    let (server, client, creds) = common::setup_swift_mock().await;

    Mock::given(method("GET"))
        .and(path(common::container_path()))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let page = client
        .list_objects(&creds, &ListQuery { limit: 10, ..Default::default() })
        .await
        .expect("list");
    assert!(page.is_empty());
}

#[tokio::test]
async fn test_list_unauthorized() {
    let (server, client, creds) = common::setup_swift_mock().await;

    Mock::given(method("GET"))
        .and(path(common::container_path()))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client
        .list_objects(&creds, &ListQuery { limit: 10, ..Default::default() })
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::Unauthorized);
}

#[tokio::test]
async fn test_list_missing_container_is_status_error() {
    let (server, client, creds) = common::setup_swift_mock().await;

    Mock::given(method("GET"))
        .and(path(common::container_path()))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client
        .list_objects(&creds, &ListQuery { limit: 10, ..Default::default() })
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::Status(404));
}

#[tokio::test]
async fn test_list_malformed_body() {
    let (server, client, creds) = common::setup_swift_mock().await;

    Mock::given(method("GET"))
        .and(path(common::container_path()))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client
        .list_objects(&creds, &ListQuery { limit: 10, ..Default::default() })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Malformed(_)), "{err:?}");
}

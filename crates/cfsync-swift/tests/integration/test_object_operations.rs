//! Integration tests for upload, delete and server-side copy

use std::path::Path;

use cfsync_core::domain::{
    entries::LocalEntry,
    newtypes::{ContentHash, RelativeName},
};
use cfsync_core::ports::object_store::{ObjectStore, StoreError};
use wiremock::{
    matchers::{body_bytes, header, method, path},
    Mock, ResponseTemplate,
};

use crate::common;

fn local_entry(dir: &Path, name: &str, content: &[u8]) -> LocalEntry {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    LocalEntry {
        path,
        name: RelativeName::new(name.to_string()).unwrap(),
        hash: ContentHash::from_digest([0u8; 16]),
        size: content.len() as u64,
        modified: None,
    }
}

// ============================================================================
// Upload
// ============================================================================

#[tokio::test]
async fn test_upload_streams_file_content() {
    let (server, client, creds) = common::setup_swift_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let entry = local_entry(dir.path(), "a.txt", b"hello swift");

    Mock::given(method("PUT"))
        .and(path(common::object_path("a.txt")))
        .and(header("X-Auth-Token", common::TOKEN))
        .and(header("content-length", "11"))
        .and(body_bytes(b"hello swift".to_vec()))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    client.upload_object(&creds, &entry).await.expect("upload");
}

#[tokio::test]
async fn test_upload_requires_created() {
    let (server, client, creds) = common::setup_swift_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let entry = local_entry(dir.path(), "a.txt", b"x");

    Mock::given(method("PUT"))
        .and(path(common::object_path("a.txt")))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let err = client.upload_object(&creds, &entry).await.unwrap_err();
    assert_eq!(err, StoreError::Status(200));
}

#[tokio::test]
async fn test_upload_unauthorized() {
    let (server, client, creds) = common::setup_swift_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let entry = local_entry(dir.path(), "a.txt", b"x");

    Mock::given(method("PUT"))
        .and(path(common::object_path("a.txt")))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.upload_object(&creds, &entry).await.unwrap_err();
    assert_eq!(err, StoreError::Unauthorized);
}

#[tokio::test]
async fn test_upload_vanished_file_is_local_error() {
    let (_server, client, creds) = common::setup_swift_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let entry = local_entry(dir.path(), "gone.txt", b"x");
    std::fs::remove_file(&entry.path).unwrap();

    let err = client.upload_object(&creds, &entry).await.unwrap_err();
    assert!(matches!(err, StoreError::LocalIo(_)), "{err:?}");
}

#[tokio::test]
async fn test_upload_nested_name_with_space() {
    let (server, client, creds) = common::setup_swift_mock().await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("my docs")).unwrap();
    let entry = local_entry(dir.path(), "my docs/a.txt", b"x");

    Mock::given(method("PUT"))
        .and(path(common::object_path("my%20docs/a.txt")))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    client.upload_object(&creds, &entry).await.expect("upload");
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_requires_no_content() {
    let (server, client, creds) = common::setup_swift_mock().await;

    Mock::given(method("DELETE"))
        .and(path(common::object_path("old.txt")))
        .and(header("X-Auth-Token", common::TOKEN))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client
        .delete_object(&creds, &common::name("old.txt"))
        .await
        .expect("delete");
}

#[tokio::test]
async fn test_delete_not_found_is_failure() {
    let (server, client, creds) = common::setup_swift_mock().await;

    Mock::given(method("DELETE"))
        .and(path(common::object_path("old.txt")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client
        .delete_object(&creds, &common::name("old.txt"))
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::Status(404));
}

// ============================================================================
// Copy
// ============================================================================

#[tokio::test]
async fn test_copy_sends_destination_header() {
    let (server, client, creds) = common::setup_swift_mock().await;

    Mock::given(method("COPY"))
        .and(path(common::object_path("docs/a.txt")))
        .and(header("X-Auth-Token", common::TOKEN))
        .and(header("Destination", "backup/papers/a.txt"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    client
        .copy_object(&creds, &common::name("docs/a.txt"), &common::name("papers/a.txt"))
        .await
        .expect("copy");
}

#[tokio::test]
async fn test_copy_server_error() {
    let (server, client, creds) = common::setup_swift_mock().await;

    Mock::given(method("COPY"))
        .and(path(common::object_path("docs/a.txt")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client
        .copy_object(&creds, &common::name("docs/a.txt"), &common::name("papers/a.txt"))
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::Status(503));
}

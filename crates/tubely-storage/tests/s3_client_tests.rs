//! S3 client tests against a mock S3-compatible endpoint.

use tubely_models::OrientationClass;
use tubely_storage::{ObjectKey, ObjectStore, S3Client, S3Config, StorageError};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client_for(server: &MockServer) -> S3Client {
    S3Client::new(S3Config {
        region: "us-east-1".to_string(),
        endpoint_url: Some(server.uri()),
        access_key_id: Some("test-access-key".to_string()),
        secret_access_key: Some("test-secret-key".to_string()),
        force_path_style: true,
    })
    .await
    .unwrap()
}

fn sample_file() -> tempfile::NamedTempFile {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), b"\x00\x00\x00\x20ftypisom fake mp4 payload").unwrap();
    file
}

#[tokio::test]
async fn test_put_object_sends_key_and_content_type() {
    let server = MockServer::start().await;
    let key = ObjectKey::generate(OrientationClass::Landscape);

    Mock::given(method("PUT"))
        .and(path(format!("/tubely-test/{}", key.as_str())))
        .and(header("content-type", "video/mp4"))
        .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"abc123\""))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let file = sample_file();

    client
        .put_object("tubely-test", &key, file.path(), "video/mp4")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_access_denied_is_not_retryable() {
    let server = MockServer::start().await;
    let key = ObjectKey::generate(OrientationClass::Portrait);

    Mock::given(method("PUT"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("content-type", "application/xml")
                .set_body_string(
                    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                     <Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>",
                ),
        )
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let file = sample_file();

    let err = client
        .put_object("tubely-test", &key, file.path(), "video/mp4")
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::UploadFailed { .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_missing_source_file() {
    let server = MockServer::start().await;
    let client = client_for(&server).await;
    let key = ObjectKey::generate(OrientationClass::Other);

    let err = client
        .put_object(
            "tubely-test",
            &key,
            std::path::Path::new("/nonexistent/upload.mp4"),
            "video/mp4",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::UploadFailed { .. }));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

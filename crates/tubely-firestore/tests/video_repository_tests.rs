//! Video repository tests against a mock Firestore emulator endpoint.

use std::time::Duration;

use serde_json::json;
use tubely_firestore::{
    FirestoreClient, FirestoreConfig, FirestoreError, RetryConfig, VideoRecordStore, VideoRepository,
};
use tubely_models::{UserId, VideoId};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROJECT: &str = "demo-tubely";

async fn repository_for(server: &MockServer) -> VideoRepository {
    let client = FirestoreClient::new(FirestoreConfig {
        project_id: PROJECT.to_string(),
        database_id: "(default)".to_string(),
        timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(2),
        retry: RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
        },
        emulator_host: Some(server.address().to_string()),
    })
    .await
    .unwrap();
    VideoRepository::new(client)
}

fn doc_path(id: &VideoId) -> String {
    format!(
        "/v1/projects/{}/databases/(default)/documents/videos/{}",
        PROJECT, id
    )
}

fn video_doc(id: &VideoId, video_url: Option<&str>, update_time: &str) -> serde_json::Value {
    let video_url = match video_url {
        Some(url) => json!({"stringValue": url}),
        None => json!({"nullValue": null}),
    };
    json!({
        "name": format!("projects/{}/databases/(default)/documents/videos/{}", PROJECT, id),
        "fields": {
            "user_id": {"stringValue": "user-1"},
            "title": {"stringValue": "Boots"},
            "description": {"stringValue": "A pair of boots"},
            "video_url": video_url,
            "created_at": {"timestampValue": "2024-05-01T12:00:00Z"},
            "updated_at": {"timestampValue": "2024-05-01T12:00:00Z"}
        },
        "createTime": "2024-05-01T12:00:00.000001Z",
        "updateTime": update_time
    })
}

#[tokio::test]
async fn test_get_existing_record() {
    let server = MockServer::start().await;
    let id = VideoId::new();

    Mock::given(method("GET"))
        .and(path(doc_path(&id)))
        .and(header("authorization", "Bearer owner"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(video_doc(&id, None, "2024-05-01T12:00:00.5Z")),
        )
        .mount(&server)
        .await;

    let repo = repository_for(&server).await;
    let record = repo.get(&id).await.unwrap().expect("record exists");

    assert_eq!(record.id, id);
    assert_eq!(record.user_id, UserId::from("user-1"));
    assert_eq!(record.title, "Boots");
    assert!(record.video_url.is_none());
    assert_eq!(record.version.as_deref(), Some("2024-05-01T12:00:00.5Z"));
}

#[tokio::test]
async fn test_get_missing_record() {
    let server = MockServer::start().await;
    let id = VideoId::new();

    Mock::given(method("GET"))
        .and(path(doc_path(&id)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "status": "NOT_FOUND"}
        })))
        .mount(&server)
        .await;

    let repo = repository_for(&server).await;
    assert!(repo.get(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_retries_server_errors() {
    let server = MockServer::start().await;
    let id = VideoId::new();

    Mock::given(method("GET"))
        .and(path(doc_path(&id)))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(doc_path(&id)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(video_doc(&id, None, "2024-05-01T12:00:00.5Z")),
        )
        .mount(&server)
        .await;

    let repo = repository_for(&server).await;
    assert!(repo.get(&id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_update_is_conditional_on_revision() {
    let server = MockServer::start().await;
    let id = VideoId::new();
    let url = "https://cdn.example.com/landscape/AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA.mp4";

    Mock::given(method("GET"))
        .and(path(doc_path(&id)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(video_doc(&id, None, "2024-05-01T12:00:00.5Z")),
        )
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(doc_path(&id)))
        .and(query_param("currentDocument.updateTime", "2024-05-01T12:00:00.5Z"))
        .and(query_param("updateMask.fieldPaths", "video_url"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(video_doc(&id, Some(url), "2024-05-01T12:05:00.25Z")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let repo = repository_for(&server).await;
    let mut record = repo.get(&id).await.unwrap().unwrap();
    record.set_video_url(url);

    let updated = repo.update(&record).await.unwrap();
    assert_eq!(updated.video_url.as_deref(), Some(url));
    assert_eq!(updated.version.as_deref(), Some("2024-05-01T12:05:00.25Z"));
}

#[tokio::test]
async fn test_update_with_stale_revision() {
    let server = MockServer::start().await;
    let id = VideoId::new();

    Mock::given(method("GET"))
        .and(path(doc_path(&id)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(video_doc(&id, None, "2024-05-01T12:00:00.5Z")),
        )
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(doc_path(&id)))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "the stored version does not match the required base version",
                "status": "FAILED_PRECONDITION"
            }
        })))
        .mount(&server)
        .await;

    let repo = repository_for(&server).await;
    let mut record = repo.get(&id).await.unwrap().unwrap();
    record.set_video_url("https://cdn.example.com/other/x.mp4");

    let err = repo.update(&record).await.unwrap_err();
    assert!(err.is_precondition_failed(), "unexpected error: {err}");
}

#[tokio::test]
async fn test_update_missing_document() {
    let server = MockServer::start().await;
    let id = VideoId::new();

    Mock::given(method("PATCH"))
        .and(path(doc_path(&id)))
        .and(query_param("currentDocument.exists", "true"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let repo = repository_for(&server).await;
    let mut record = tubely_models::VideoRecord::new(UserId::from("user-1"), "t");
    record.id = id;

    let err = repo.update(&record).await.unwrap_err();
    assert!(matches!(err, FirestoreError::NotFound(_)));
}

//! HTTP contract tests for KubrickClient


use kubrick_client::{ApiError, ChatRequest, KubrickApi, RemoteTaskStatus};
use kubrick_core::{Config, JobId};
use test_utils::{client_for, clip, MockResponseBuilder, RequestCounter};
use wiremock::matchers::{body_json, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn upload_sends_multipart_file_field() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload-video"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockResponseBuilder::upload("shared_media/clip.mp4")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let remote_path = client.upload_video(&clip("clip.mp4")).await.expect("upload ok");
    assert_eq!(remote_path, "shared_media/clip.mp4");

    let requests = mock_server.received_requests().await.expect("recording on");
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"file\""));
    assert!(body.contains("filename=\"clip.mp4\""));
    assert!(body.contains("video/mp4"));
}

#[tokio::test]
async fn upload_without_video_path_is_an_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload-video"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": "Video uploaded successfully"
        })))
        .mount(&mock_server)
        .await;

    let err = client_for(&mock_server)
        .upload_video(&clip("clip.mp4"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::MissingField { field: "video_path", .. }));
}

#[tokio::test]
async fn process_posts_video_path_json() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/process-video"))
        .and(body_json(serde_json::json!({ "video_path": "shared_media/clip.mp4" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockResponseBuilder::process("t1")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let job_id = client_for(&mock_server)
        .process_video("shared_media/clip.mp4")
        .await
        .expect("process ok");
    assert_eq!(job_id, JobId::new("t1"));
}

#[tokio::test]
async fn task_status_maps_service_values() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/task-status/t1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(MockResponseBuilder::status("t1", "in_progress")),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/task-status/gone"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(MockResponseBuilder::status("gone", "not_found")),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    assert_eq!(
        client.task_status(&JobId::new("t1")).await.unwrap(),
        RemoteTaskStatus::InProgress
    );
    assert_eq!(
        client.task_status(&JobId::new("gone")).await.unwrap(),
        RemoteTaskStatus::NotFound
    );
}

#[tokio::test]
async fn non_success_status_keeps_body() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string(r#"{"detail": "agent down"}"#))
        .mount(&mock_server)
        .await;

    let err = client_for(&mock_server)
        .chat(&ChatRequest {
            message: "hello".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    match err {
        ApiError::Status { status, body, .. } => {
            assert_eq!(status, 500);
            assert!(body.contains("agent down"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn media_is_fetched_by_file_name() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/clip_12.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"clip-bytes".to_vec()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    assert_eq!(
        client.media_url("shared_media/clips/clip_12.mp4"),
        format!("{}/media/clip_12.mp4", mock_server.uri())
    );
    let bytes = client
        .fetch_media("shared_media/clips/clip_12.mp4")
        .await
        .expect("media ok");
    assert_eq!(&bytes[..], b"clip-bytes");
}

#[tokio::test]
async fn reset_memory_returns_confirmation() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/reset-memory"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": "Memory reset successfully"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let message = client_for(&mock_server).reset_memory().await.expect("reset ok");
    assert_eq!(message, "Memory reset successfully");
}

/// Without configured retries a transient failure surfaces immediately.
#[tokio::test]
async fn no_retries_by_default() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/task-status/t1"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = client_for(&mock_server).task_status(&JobId::new("t1")).await;
    assert!(matches!(result, Err(ApiError::Status { status: 503, .. })));
}

#[tokio::test]
async fn configured_retries_recover_from_transient_errors() {
    let mock_server = MockServer::start().await;
    let counter = RequestCounter::new();
    let attempts = counter.clone();

    Mock::given(method("GET"))
        .and(path("/task-status/t1"))
        .respond_with(move |_req: &wiremock::Request| {
            if attempts.increment() < 1 {
                ResponseTemplate::new(503)
            } else {
                ResponseTemplate::new(200).set_body_json(MockResponseBuilder::status("t1", "completed"))
            }
        })
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = Config {
        api_base: mock_server.uri(),
        max_retries: 2,
        ..Config::default()
    };
    let client = kubrick_client::KubrickClient::new(&config).expect("client builds");
    let status = client.task_status(&JobId::new("t1")).await.expect("recovered");
    assert_eq!(status, RemoteTaskStatus::Completed);
    assert_eq!(counter.get(), 2);
}

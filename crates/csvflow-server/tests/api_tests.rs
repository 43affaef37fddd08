//! API integration tests for the csvflow server
//!
//! These tests drive the full router with `tower::ServiceExt::oneshot` over an
//! in-memory job store.
//!
//! Coverage includes:
//! - Multipart uploads and their validation errors
//! - Job records, progress snapshots and pagination
//! - The server-sent event progress stream
//! - Health endpoints

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::{fast_pipeline_config, memory_store, wait_for_terminal};
use csvflow_common::types::JobStatus;
use csvflow_server::{
    api::{self, AppState},
    config::Config,
    ingest::{JobStore, MemoryJobStore, UploadConfig},
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

const BOUNDARY: &str = "csvflow-test-boundary";

// ============================================================================
// Helper Functions
// ============================================================================

fn test_config() -> Config {
    Config {
        pipeline: fast_pipeline_config(),
        ..Config::default()
    }
}

fn create_test_app() -> (Router, Arc<MemoryJobStore>) {
    create_app_with(test_config())
}

fn create_app_with(config: Config) -> (Router, Arc<MemoryJobStore>) {
    let store = memory_store();
    let state = AppState::new(store.clone(), &config);
    (api::create_router(state, &config), store)
}

/// Encode `(filename, contents)` pairs as repeated `files` multipart fields
fn multipart_body(files: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (filename, contents) in files {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: text/csv\r\n\r\n");
        body.extend_from_slice(contents.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn upload(app: &Router, files: &[(&str, &str)]) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/uploads")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(files)))
        .unwrap();

    send(app, request).await
}

async fn get_request(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);

    (status, json)
}

fn job_ids(upload_response: &Value) -> Vec<Uuid> {
    upload_response["data"]["jobs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|job| job["id"].as_str().unwrap().parse().unwrap())
        .collect()
}

// ============================================================================
// Uploads
// ============================================================================

#[tokio::test]
async fn test_upload_creates_pending_jobs() {
    let (app, store) = create_test_app();

    let (status, body) = upload(
        &app,
        &[
            ("users.csv", "name,email,age\nJohn,john@example.com,30\nJane,jane@example.com\n"),
            ("orders.CSV", "id,total\n1,9.99\n"),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(
        body["data"]["message"],
        "Successfully uploaded 2 CSV files for processing"
    );

    let ids = job_ids(&body);
    assert_eq!(ids.len(), 2);

    for id in ids {
        let job = wait_for_terminal(store.as_ref(), id, Duration::from_secs(5)).await;
        assert_eq!(job.status, JobStatus::Completed);
    }
}

#[tokio::test]
async fn test_upload_rejects_too_many_files() {
    let (app, store) = create_test_app();

    let names: Vec<String> = (0..11).map(|i| format!("file{i}.csv")).collect();
    let files: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "a\n1\n")).collect();

    let (status, body) = upload(&app, &files).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(store.fetch_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_rejects_non_csv_file() {
    let (app, store) = create_test_app();

    let (status, body) = upload(&app, &[("good.csv", "a\n1\n"), ("notes.txt", "hello\n")]).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("notes.txt"));
    assert!(store.fetch_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_upload_is_rejected_while_streaming() {
    let (app, store) = create_app_with(Config {
        upload: UploadConfig {
            max_files: 10,
            max_file_size: 16,
        },
        ..test_config()
    });
    let big = "id,name\n".to_string() + &"1,someone\n".repeat(50);

    let (status, body) = upload(&app, &[("small.csv", "a\n1\n"), ("big.csv", &big)]).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"]["rejected"][0]["filename"], "big.csv");
    assert_eq!(body["error"]["details"]["created_jobs"], serde_json::json!([]));
    assert!(store.fetch_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_at_size_limit_is_accepted() {
    let (app, store) = create_app_with(Config {
        upload: UploadConfig {
            max_files: 10,
            max_file_size: 16,
        },
        ..test_config()
    });

    // Exactly 16 bytes
    let (status, body) = upload(&app, &[("edge.csv", "id,name\n1,abcde\n")]).await;

    assert_eq!(status, StatusCode::CREATED);
    let id = job_ids(&body)[0];
    let job = wait_for_terminal(store.as_ref(), id, Duration::from_secs(5)).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.total_rows, 1);
}

#[tokio::test]
async fn test_upload_without_files_is_rejected() {
    let (app, _store) = create_test_app();

    let (status, _body) = upload(&app, &[]).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Jobs and progress
// ============================================================================

#[tokio::test]
async fn test_progress_reports_final_counters() {
    let (app, store) = create_test_app();

    let (_, body) = upload(
        &app,
        &[(
            "users.csv",
            "name,email,age\nJohn,john@example.com,30\nJane,jane@example.com\nBob,bob@example.com,40\n",
        )],
    )
    .await;
    let id = job_ids(&body)[0];
    wait_for_terminal(store.as_ref(), id, Duration::from_secs(5)).await;

    let (status, body) = get_request(&app, &format!("/api/v1/jobs/{id}/progress")).await;

    assert_eq!(status, StatusCode::OK);
    let progress = &body["data"];
    assert_eq!(progress["job_id"], id.to_string());
    assert_eq!(progress["total_rows"], 3);
    assert_eq!(progress["processed_rows"], 2);
    assert_eq!(progress["failed_rows"], 1);
    assert_eq!(progress["status"], "completed");
    let rate = progress["success_rate"].as_f64().unwrap();
    assert!((rate - 33.33).abs() < 0.01);
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let (app, _store) = create_test_app();
    let id = Uuid::new_v4();

    let (status, body) = get_request(&app, &format!("/api/v1/jobs/{id}/progress")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = get_request(&app, &format!("/api/v1/jobs/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get_request(&app, &format!("/api/v1/jobs/{id}/stream")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_job_id_is_bad_request() {
    let (app, _store) = create_test_app();

    let (status, _) = get_request(&app, "/api/v1/jobs/not-a-uuid/progress").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_jobs_paginates_newest_first() {
    let (app, _store) = create_test_app();

    for name in ["first.csv", "second.csv", "third.csv"] {
        let (status, _) = upload(&app, &[(name, "a\n1\n")]).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = get_request(&app, "/api/v1/jobs?page=1&limit=2").await;

    assert_eq!(status, StatusCode::OK);
    let jobs = body["data"].as_array().unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0]["filename"], "third.csv");

    let pagination = &body["meta"]["pagination"];
    assert_eq!(pagination["total"], 3);
    assert_eq!(pagination["pages"], 2);
    assert_eq!(pagination["has_next"], true);
}

#[tokio::test]
async fn test_list_jobs_rejects_bad_limit() {
    let (app, _store) = create_test_app();

    let (status, _) = get_request(&app, "/api/v1/jobs?limit=101").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get_request(&app, "/api/v1/jobs?page=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stream_emits_progress_until_terminal() {
    let (app, store) = create_test_app();

    let (_, body) = upload(&app, &[("stream.csv", "a,b\n1,2\n3,4\n")]).await;
    let id = job_ids(&body)[0];
    wait_for_terminal(store.as_ref(), id, Duration::from_secs(5)).await;

    let request = Request::builder()
        .uri(format!("/api/v1/jobs/{id}/stream"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    // The stream closes itself after the terminal snapshot
    let body = tokio::time::timeout(
        Duration::from_secs(5),
        axum::body::to_bytes(response.into_body(), usize::MAX),
    )
    .await
    .expect("progress stream did not end")
    .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    assert!(text.contains("event: progress"));
    assert!(text.contains("\"status\":\"completed\""));
    assert!(text.contains("\"total_rows\":2"));
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let (app, _store) = create_test_app();

    for uri in ["/health", "/api/v1/health"] {
        let (status, body) = get_request(&app, uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["job_store"], "connected");
    }
}

#[tokio::test]
async fn test_root_reports_service_name() {
    let (app, _store) = create_test_app();

    let (status, body) = get_request(&app, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "csvflow");
}

//! Integration tests for the upload API, driving the full router
//! in-process with tower's `oneshot`.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use muelle_server::config::{Config, ServerConfig, StorageConfig};
use muelle_server::state::AppState;

const BOUNDARY: &str = "----muelle-test-boundary";

fn test_app() -> (Router, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        storage: StorageConfig {
            upload_dir: temp_dir.path().to_path_buf(),
            session_ttl_hours: 24,
        },
    };
    let state = AppState::new(config).unwrap();
    (muelle_server::app(state), temp_dir)
}

/// Build a multipart body with the given text fields and one file part.
fn multipart_body(fields: &[(&str, &str)], file_name: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n",
            BOUNDARY, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn part_request(
    guid: &str,
    chunk: Option<u32>,
    chunks: Option<u32>,
    file_name: &str,
    data: &[u8],
) -> Request<Body> {
    let mut fields: Vec<(&str, String)> = vec![("guid", guid.to_string())];
    if let Some(chunk) = chunk {
        fields.push(("chunk", chunk.to_string()));
    }
    if let Some(chunks) = chunks {
        fields.push(("chunks", chunks.to_string()));
    }
    fields.push(("fileName", file_name.to_string()));

    let borrowed: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
    let body = multipart_body(&borrowed, file_name, data);

    Request::builder()
        .method("POST")
        .uri("/api/upload/files/part")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn merge_request(guid: &str, encoded_file_name: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/upload/files/merge")
        .header(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .body(Body::from(format!(
            "guid={}&fileName={}",
            guid, encoded_file_name
        )))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (app, _dir) = test_app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_chunked_upload_roundtrip() {
    let (app, _dir) = test_app();
    let guid = Uuid::new_v4().to_string();

    for (index, data) in [&b"Hello, "[..], &b"World!"[..]].iter().enumerate() {
        let response = app
            .clone()
            .oneshot(part_request(&guid, Some(index as u32), Some(2), "hello.txt", data))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["code"], 200);
    }

    let response = app
        .clone()
        .oneshot(merge_request(&guid, "hello.txt"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["code"], 200);

    // The merged file shows up in the listing
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/upload/files")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["files"][0]["name"], "hello.txt");
    assert_eq!(json["files"][0]["size"], 13);

    // And downloads with the merged content
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/upload/files/hello.txt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("attachment"));
    assert!(disposition.contains("hello.txt"));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"Hello, World!");
}

#[tokio::test]
async fn test_merge_is_idempotent() {
    let (app, _dir) = test_app();
    let guid = Uuid::new_v4().to_string();

    app.clone()
        .oneshot(part_request(&guid, Some(0), Some(1), "once.txt", b"payload"))
        .await
        .unwrap();

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(merge_request(&guid, "once.txt"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["code"], 200);
    }

    // File content survived the repeat unchanged
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/upload/files/once.txt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"payload");
}

#[tokio::test]
async fn test_merge_unknown_session() {
    let (app, _dir) = test_app();

    let response = app
        .oneshot(merge_request(&Uuid::new_v4().to_string(), "ghost.txt"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = response_json(response).await;
    assert_eq!(json["code"], 404);
    assert!(json["message"].as_str().unwrap().contains("session"));
}

#[tokio::test]
async fn test_merge_incomplete_session() {
    let (app, _dir) = test_app();
    let guid = Uuid::new_v4().to_string();

    // 1 of 3 declared chunks
    app.clone()
        .oneshot(part_request(&guid, Some(0), Some(3), "partial.bin", b"only"))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(merge_request(&guid, "partial.bin"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = response_json(response).await;
    assert_eq!(json["code"], 409);

    // Nothing was merged
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/upload/files/partial.bin")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_part_with_invalid_guid() {
    let (app, _dir) = test_app();

    let response = app
        .oneshot(part_request("not-a-uuid", Some(0), Some(1), "a.txt", b"x"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = response_json(response).await;
    assert_eq!(json["code"], 400);
}

#[tokio::test]
async fn test_traversal_names_rejected() {
    let (app, _dir) = test_app();
    let guid = Uuid::new_v4().to_string();

    let response = app
        .clone()
        .oneshot(part_request(&guid, Some(0), Some(1), "../evil.txt", b"x"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Merge-time names are checked too ("..%2Fevil.txt" decodes to "../evil.txt")
    let guid = Uuid::new_v4().to_string();
    app.clone()
        .oneshot(part_request(&guid, Some(0), Some(1), "fine.txt", b"x"))
        .await
        .unwrap();
    let response = app
        .oneshot(merge_request(&guid, "..%2Fevil.txt"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checksum_mismatch() {
    let (app, _dir) = test_app();
    let guid = Uuid::new_v4().to_string();

    let fields = [
        ("guid", guid.as_str()),
        ("chunk", "0"),
        ("chunks", "1"),
        ("fileName", "sum.bin"),
        ("checksum", "deadbeef"),
    ];
    let body = multipart_body(&fields, "sum.bin", b"mismatching data");
    let request = Request::builder()
        .method("POST")
        .uri("/api/upload/files/part")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = response_json(response).await;
    assert_eq!(json["code"], 409);
}

#[tokio::test]
async fn test_single_chunk_defaults() {
    // Clients may omit chunk/chunks entirely for single-chunk files
    let (app, _dir) = test_app();
    let guid = Uuid::new_v4().to_string();

    let response = app
        .clone()
        .oneshot(part_request(&guid, None, None, "small.txt", b"tiny"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(merge_request(&guid, "small.txt"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/upload/files/small.txt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"tiny");
}

#[tokio::test]
async fn test_whole_file_upload() {
    let (app, _dir) = test_app();

    let body = multipart_body(&[], "whole.bin", b"one-shot content");
    let request = Request::builder()
        .method("POST")
        .uri("/api/upload/files/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["code"], 200);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/upload/files/whole.bin")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"one-shot content");
}

#[tokio::test]
async fn test_mismatched_chunk_total_rejected() {
    let (app, _dir) = test_app();
    let guid = Uuid::new_v4().to_string();

    app.clone()
        .oneshot(part_request(&guid, Some(0), Some(3), "drift.bin", b"a"))
        .await
        .unwrap();

    let response = app
        .oneshot(part_request(&guid, Some(1), Some(4), "drift.bin", b"b"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

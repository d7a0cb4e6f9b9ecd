//! Integration tests for HTTP API endpoints.

mod common;

use axum::http::StatusCode;
use common::TestServer;
use common::server::{multipart_chunk_body, multipart_probe_body};
use serde_json::json;

#[tokio::test]
async fn identify_allocates_a_fresh_user() {
    let server = TestServer::new().await;

    let (status, body) = server
        .request("POST", "/api/users/identify", Some(json!({})))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], true);
    let key = body["userKey"].as_str().unwrap();
    assert_eq!(key.len(), 16);
    assert!(body["uploads"]["active"].as_array().unwrap().is_empty());
    assert!(body["uploads"]["history"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn identify_recognizes_existing_key() {
    let server = TestServer::new().await;
    let key = server.identify().await;

    let (status, body) = server
        .request("POST", "/api/users/identify", Some(json!({ "userKey": key })))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], false);
    assert_eq!(body["userKey"], key.as_str());
}

#[tokio::test]
async fn identify_ignores_unknown_requested_key() {
    let server = TestServer::new().await;

    let (status, body) = server
        .request(
            "POST",
            "/api/users/identify",
            Some(json!({ "userKey": "NotARealKey123456" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], true);
    assert_ne!(body["userKey"], "NotARealKey123456");
}

#[tokio::test]
async fn identify_accepts_empty_body() {
    let server = TestServer::new().await;
    let (status, body) = server.request("POST", "/api/users/identify", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], true);
}

#[tokio::test]
async fn snapshot_requires_user_key() {
    let server = TestServer::new().await;
    let (status, body) = server.request("GET", "/api/uploads", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_user_key");
}

#[tokio::test]
async fn snapshot_unknown_user_is_404() {
    let server = TestServer::new().await;
    let (status, body) = server.snapshot("UnknownUser123456").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "user_not_found");
}

#[tokio::test]
async fn create_upload_validates_input() {
    let server = TestServer::new().await;
    let key = server.identify().await;

    // Missing user key.
    let (status, body) = server
        .request(
            "POST",
            "/api/uploads",
            Some(json!({ "fileName": "a.bin", "fileSize": 10, "chunkSize": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_user_key");

    // Missing fields.
    let (status, body) = server
        .request(
            "POST",
            "/api/uploads",
            Some(json!({ "userKey": key, "fileName": "a.bin" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_fields");

    // Non-positive sizes.
    let (status, body) = server
        .request(
            "POST",
            "/api/uploads",
            Some(json!({ "userKey": key, "fileName": "a.bin", "fileSize": 0, "chunkSize": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_sizes");

    let (status, body) = server
        .request(
            "POST",
            "/api/uploads",
            Some(json!({ "userKey": key, "fileName": "a.bin", "fileSize": 10, "chunkSize": -1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_sizes");
}

#[tokio::test]
async fn create_upload_computes_total_chunks() {
    let server = TestServer::new().await;
    let key = server.identify().await;

    let upload = server.create_upload(&key, "big file.dat", 100, 30, true).await;
    assert_eq!(upload["totalChunks"], 4);
    assert_eq!(upload["status"], "active");
    assert_eq!(upload["receivedCount"], 0);
    assert_eq!(upload["fileName"], "big file.dat");
    assert_eq!(
        upload["missingChunks"].as_array().unwrap().len(),
        4
    );
    assert_eq!(upload["id"].as_str().unwrap().len(), 20);
}

#[tokio::test]
async fn get_upload_reports_location() {
    let server = TestServer::new().await;
    let key = server.identify().await;

    let persistent = server.create_upload(&key, "p.bin", 4, 2, true).await;
    let ephemeral = server.create_upload(&key, "e.bin", 4, 2, false).await;

    let (status, body) = server
        .request(
            "GET",
            &format!("/api/uploads/{}?userKey={key}", persistent["id"].as_str().unwrap()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["location"], "persistent");

    let (status, body) = server
        .request(
            "GET",
            &format!("/api/uploads/{}?userKey={key}", ephemeral["id"].as_str().unwrap()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["location"], "memory");

    let (status, body) = server
        .request("GET", &format!("/api/uploads/nosuchupload?userKey={key}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "upload_not_found");
}

#[tokio::test]
async fn chunk_endpoint_validates_fields() {
    let server = TestServer::new().await;
    let key = server.identify().await;
    let upload = server.create_upload(&key, "a.bin", 10, 6, true).await;
    let upload_id = upload["id"].as_str().unwrap();

    // Missing userKey field.
    let body = multipart_chunk_body(None, Some("0"), Some(b"AAAAAA"));
    let (status, json) = server
        .send_multipart(&format!("/api/uploads/{upload_id}/chunk"), body)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "missing_user_key");

    // Unparsable index.
    let (status, json) = server.send_chunk(upload_id, &key, "zero", b"AAAAAA").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_chunk_index");

    // Out-of-range index.
    let (status, json) = server.send_chunk(upload_id, &key, "2", b"AAAA").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "chunk_out_of_range");

    // Missing chunk field.
    let body = multipart_chunk_body(Some(&key), Some("0"), None);
    let (status, json) = server
        .send_multipart(&format!("/api/uploads/{upload_id}/chunk"), body)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "missing_chunk");

    // Unknown upload.
    let (status, json) = server.send_chunk("nosuchupload", &key, "0", b"AAAAAA").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "upload_not_found");
}

#[tokio::test]
async fn state_endpoint_rejects_unknown_action() {
    let server = TestServer::new().await;
    let key = server.identify().await;
    let upload = server.create_upload(&key, "a.bin", 10, 6, true).await;

    let (status, body) = server
        .post_action(upload["id"].as_str().unwrap(), &key, "explode")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_action");
}

#[tokio::test]
async fn clear_history_requires_known_user() {
    let server = TestServer::new().await;

    let (status, body) = server
        .request(
            "DELETE",
            "/api/uploads/history",
            Some(json!({ "userKey": "UnknownUser123456" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "user_not_found");
}

#[tokio::test]
async fn network_probe_counts_bytes() {
    let server = TestServer::new().await;

    let sample = vec![7u8; 4096];
    let (status, body) = server
        .send_multipart("/api/network/probe", multipart_probe_body(&sample))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bytes"], 4096);
    assert!(body["elapsedMs"].as_u64().is_some());
}

#[tokio::test]
async fn network_probe_requires_sample() {
    let server = TestServer::new().await;

    let (status, body) = server
        .send_multipart("/api/network/probe", multipart_probe_body(b""))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bytes"], 0);

    // No sample field at all.
    let empty = multipart_chunk_body(Some("whoever"), None, None);
    let (status, body) = server.send_multipart("/api/network/probe", empty).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_sample");
}

#[tokio::test]
async fn download_unknown_file_is_404() {
    let server = TestServer::new().await;
    let (status, body) = server.request("GET", "/api/files/nope.bin", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "file_not_found");
}

//! Server test utilities.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use filedrop_core::AppConfig;
use filedrop_server::{AppState, create_router};
use serde_json::Value;
use std::path::PathBuf;
use tempfile::TempDir;
use tower::ServiceExt;

/// Multipart boundary used by the request builders.
const BOUNDARY: &str = "FiledropTestBoundary";

/// A test server over a temp data directory.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: Router,
    pub state: AppState,
    temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server rooted at a fresh temp directory.
    pub async fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp directory");
        Self::over(temp_dir).await
    }

    async fn over(temp_dir: TempDir) -> Self {
        let config = AppConfig::for_testing(temp_dir.path());
        let state = AppState::new(config)
            .await
            .expect("failed to build app state");
        let router = create_router(state.clone());
        Self {
            router,
            state,
            temp_dir,
        }
    }

    /// Rebuild state and router over the same data directory, simulating
    /// a process restart: ephemeral uploads drop, persistent state
    /// reloads from disk. Startup recovery is NOT run automatically.
    pub async fn restart(self) -> Self {
        let temp_dir = self.temp_dir;
        drop(self.state);
        drop(self.router);
        Self::over(temp_dir).await
    }

    /// The data directory backing this server.
    pub fn data_dir(&self) -> PathBuf {
        self.temp_dir.path().join("data")
    }

    /// Raw persisted state document.
    pub fn state_file(&self) -> String {
        std::fs::read_to_string(self.data_dir().join("state.json")).unwrap_or_default()
    }

    /// Issue a JSON request and decode the response body.
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(serde_json::to_vec(&value).unwrap())
            }
            None => Body::empty(),
        };
        let request = builder.body(body).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Issue a raw request and return status plus raw body bytes.
    pub async fn request_raw(&self, method: &str, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    /// Identify a fresh user and return the allocated key.
    pub async fn identify(&self) -> String {
        let (status, body) = self
            .request("POST", "/api/users/identify", Some(serde_json::json!({})))
            .await;
        assert_eq!(status, StatusCode::OK, "identify failed: {body}");
        body["userKey"].as_str().unwrap().to_string()
    }

    /// Create an upload and return the decorated upload object.
    pub async fn create_upload(
        &self,
        user_key: &str,
        file_name: &str,
        file_size: u64,
        chunk_size: u64,
        persist: bool,
    ) -> Value {
        let (status, body) = self
            .request(
                "POST",
                "/api/uploads",
                Some(serde_json::json!({
                    "userKey": user_key,
                    "fileName": file_name,
                    "fileSize": file_size,
                    "chunkSize": chunk_size,
                    "persist": persist,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create upload failed: {body}");
        body["upload"].clone()
    }

    /// Post one chunk as multipart form data.
    pub async fn send_chunk(
        &self,
        upload_id: &str,
        user_key: &str,
        index: &str,
        bytes: &[u8],
    ) -> (StatusCode, Value) {
        let body = multipart_chunk_body(Some(user_key), Some(index), Some(bytes));
        self.send_multipart(&format!("/api/uploads/{upload_id}/chunk"), body)
            .await
    }

    /// Post a multipart body to an endpoint.
    pub async fn send_multipart(&self, uri: &str, body: Vec<u8>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Post a state transition action for an upload.
    pub async fn post_action(
        &self,
        upload_id: &str,
        user_key: &str,
        action: &str,
    ) -> (StatusCode, Value) {
        self.request(
            "POST",
            &format!("/api/uploads/{upload_id}/state"),
            Some(serde_json::json!({ "userKey": user_key, "action": action })),
        )
        .await
    }

    /// Fetch the user's snapshot.
    pub async fn snapshot(&self, user_key: &str) -> (StatusCode, Value) {
        self.request("GET", &format!("/api/uploads?userKey={user_key}"), None)
            .await
    }
}

/// Build a multipart chunk body, omitting any field passed as `None`.
#[allow(dead_code)]
pub fn multipart_chunk_body(
    user_key: Option<&str>,
    index: Option<&str>,
    bytes: Option<&[u8]>,
) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(user_key) = user_key {
        push_text_field(&mut body, "userKey", user_key);
    }
    if let Some(index) = index {
        push_text_field(&mut body, "chunkIndex", index);
    }
    if let Some(bytes) = bytes {
        push_file_field(&mut body, "chunk", "blob", bytes);
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Build a multipart probe body.
#[allow(dead_code)]
pub fn multipart_probe_body(sample: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    push_file_field(&mut body, "sample", "sample.bin", sample);
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn push_text_field(body: &mut Vec<u8>, name: &str, value: &str) {
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        )
        .as_bytes(),
    );
}

fn push_file_field(body: &mut Vec<u8>, name: &str, file_name: &str, bytes: &[u8]) {
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(b"\r\n");
}

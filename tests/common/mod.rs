use std::sync::Arc;

use tempfile::TempDir;
use relaychat::config::GeminiConfig;
use relaychat::storage::{SessionStore, SqliteStorage};

pub const TEST_MODEL: &str = "gemini-test";
pub const TEST_API_KEY: &str = "test-key";

#[allow(dead_code)]
pub fn create_temp_store() -> (Arc<SessionStore>, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("chat.db");
    let storage =
        SqliteStorage::new_with_path(db_path).expect("failed to create sqlite storage with path");
    (Arc::new(SessionStore::new(Arc::new(storage))), tmp)
}

/// Gemini configuration pointing at a mock server
#[allow(dead_code)]
pub fn gemini_config(api_base: &str) -> GeminiConfig {
    GeminiConfig {
        api_key: Some(TEST_API_KEY.to_string()),
        model: TEST_MODEL.to_string(),
        api_base: Some(api_base.to_string()),
        request_timeout_seconds: 2,
        stream_idle_timeout_seconds: 2,
    }
}

/// Path of the streaming endpoint for [`TEST_MODEL`]
#[allow(dead_code)]
pub fn stream_path() -> String {
    format!("/v1beta/models/{}:streamGenerateContent", TEST_MODEL)
}

/// SSE body the way Gemini streams it: one JSON chunk per event
#[allow(dead_code)]
pub fn gemini_sse_body(fragments: &[&str]) -> String {
    let mut body = String::new();
    for fragment in fragments {
        let chunk = serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": fragment}]}
            }]
        });
        body.push_str(&format!("data: {}\r\n\r\n", chunk));
    }
    let last = serde_json::json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": ""}]},
            "finishReason": "STOP"
        }]
    });
    body.push_str(&format!("data: {}\r\n\r\n", last));
    body
}

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use relaychat::config::SupabaseConfig;
use relaychat::storage::{HistoryEntry, Role, SessionStore, SessionSummary, SupabaseStorage};

const KEY: &str = "service-key";

fn store_for(server: &MockServer) -> SessionStore {
    let storage = SupabaseStorage::new(SupabaseConfig {
        url: Some(server.uri()),
        key: Some(KEY.to_string()),
    })
    .unwrap();
    SessionStore::new(Arc::new(storage))
}

#[tokio::test]
async fn test_add_message_upserts_session_then_inserts_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/sessions"))
        .and(query_param("on_conflict", "session_id"))
        .and(header("apikey", KEY))
        .and(header("authorization", "Bearer service-key"))
        .and(header_exists("prefer"))
        .and(body_json(json!({"session_id": "s1", "title": "Hello"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/chat_history"))
        .and(body_json(
            json!({"session_id": "s1", "role": "user", "content": "Hello"}),
        ))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    store_for(&server)
        .add_message("s1", Role::User, "Hello")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_add_message_continues_when_session_upsert_fails() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/sessions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/chat_history"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    assert!(store_for(&server)
        .add_message("s1", Role::User, "Hello")
        .await
        .is_ok());
}

#[tokio::test]
async fn test_add_message_propagates_insert_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/sessions"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/chat_history"))
        .respond_with(ResponseTemplate::new(409).set_body_string("foreign key violation"))
        .mount(&server)
        .await;

    assert!(store_for(&server)
        .add_message("s1", Role::User, "Hello")
        .await
        .is_err());
}

#[tokio::test]
async fn test_get_all_sessions_maps_rows() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/sessions"))
        .and(query_param("order", "created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"session_id": "s2", "title": "Newer", "created_at": "2024-05-02T10:00:00+00:00"},
            {"session_id": "s1", "title": "Older", "created_at": "2024-05-01T10:00:00+00:00"}
        ])))
        .mount(&server)
        .await;

    let sessions = store_for(&server).get_all_sessions().await;
    assert_eq!(
        sessions,
        vec![
            SessionSummary {
                id: "s2".to_string(),
                title: "Newer".to_string()
            },
            SessionSummary {
                id: "s1".to_string(),
                title: "Older".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn test_get_chat_history_filters_and_orders() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/chat_history"))
        .and(query_param("session_id", "eq.s1"))
        .and(query_param("order", "created_at.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"role": "user", "content": "Hello", "created_at": "2024-05-01T10:00:00+00:00"},
            {"role": "model", "content": "Hi!", "created_at": "2024-05-01T10:00:01+00:00"}
        ])))
        .mount(&server)
        .await;

    assert_eq!(
        store_for(&server).get_chat_history("s1").await,
        vec![
            HistoryEntry::new(Role::User, "Hello"),
            HistoryEntry::new(Role::Model, "Hi!"),
        ]
    );
}

#[tokio::test]
async fn test_read_failures_degrade_to_empty() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = store_for(&server);
    assert!(store.get_all_sessions().await.is_empty());
    assert!(store.get_chat_history("s1").await.is_empty());
}

#[tokio::test]
async fn test_delete_session_removes_history_then_session() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/chat_history"))
        .and(query_param("session_id", "eq.s1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/sessions"))
        .and(query_param("session_id", "eq.s1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    assert!(store_for(&server).delete_session("s1").await);
}

#[tokio::test]
async fn test_delete_session_failure_is_false() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    assert!(!store_for(&server).delete_session("s1").await);
}

#[tokio::test]
async fn test_update_title_patches_session() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/sessions"))
        .and(query_param("session_id", "eq.s1"))
        .and(body_json(json!({"title": "Renamed"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    assert!(store_for(&server).update_title("s1", "Renamed").await);
}

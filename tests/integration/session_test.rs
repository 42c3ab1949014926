//! Session manager integration tests
//!
//! Login, registration, transparent refresh and logout against a mock
//! backend.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use xffeed::client::storage::keys;
use xffeed::client::{KeyValueStore, LogoutReason, MemoryStore, SessionEvent, SessionManager};
use xffeed::shared::{AuthError, RequestError};

use crate::common::*;

#[tokio::test]
async fn test_login_persists_credentials() {
    let server = backend().await;
    Mock::given(method("POST"))
        .and(path("/api/users/auth/login/"))
        .and(body_json(json!({"username": "alice", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("a1", "r1")))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let session = session_with(config_for(&server), store.clone());
    let mut events = session.subscribe();

    let credentials = assert_ok!(session.login("alice", "secret").await);

    assert_eq!(credentials.access, "a1");
    assert_eq!(credentials.refresh, "r1");
    assert!(session.is_authenticated().await);
    assert_eq!(store.get(keys::ACCESS_TOKEN).unwrap().as_deref(), Some("a1"));
    assert_eq!(store.get(keys::REFRESH_TOKEN).unwrap().as_deref(), Some("r1"));
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::LoggedIn { username: "alice".to_string() }
    );
}

#[tokio::test]
async fn test_login_rejected_stores_nothing() {
    let server = backend().await;
    Mock::given(method("POST"))
        .and(path("/api/users/auth/login/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid credentials"})))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let session = session_with(config_for(&server), store.clone());

    let result = session.login("alice", "wrong").await;

    assert_eq!(result, Err(AuthError::InvalidCredentials("Invalid credentials".to_string())));
    assert!(!session.is_authenticated().await);
    assert_eq!(store.get(keys::ACCESS_TOKEN).unwrap(), None);
}

#[tokio::test]
async fn test_login_without_detail_uses_generic_message() {
    let server = backend().await;
    Mock::given(method("POST"))
        .and(path("/api/users/auth/login/"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let session = session_with(config_for(&server), Arc::new(MemoryStore::new()));
    let error = session.login("alice", "x").await.unwrap_err();
    assert_eq!(error.user_message(), "Invalid credentials");
}

#[tokio::test]
async fn test_login_unreachable_backend() {
    // Nothing listens on the discard port.
    let config = xffeed::client::Config::with_builder(
        xffeed::shared::AppConfig::builder().api_base("http://127.0.0.1:9/api"),
    )
    .unwrap();

    let session = session_with(config, Arc::new(MemoryStore::new()));
    assert_err!(session.login("alice", "secret").await, AuthError::Unreachable(_));
}

#[tokio::test]
async fn test_register_mismatch_sends_nothing() {
    let server = backend().await;
    Mock::given(method("POST"))
        .and(path("/api/users/auth/register/"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let session = session_with(config_for(&server), Arc::new(MemoryStore::new()));
    let result = session.register("bob", "bob@example.com", "p1", "p2").await;

    assert_eq!(result, Err(AuthError::PasswordMismatch));
}

#[tokio::test]
async fn test_register_success_does_not_log_in() {
    let server = backend().await;
    Mock::given(method("POST"))
        .and(path("/api/users/auth/register/"))
        .and(body_json(json!({
            "username": "bob",
            "email": "bob@example.com",
            "password": "pw",
            "password_confirm": "pw"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"message": "created"})))
        .expect(1)
        .mount(&server)
        .await;

    let session = session_with(config_for(&server), Arc::new(MemoryStore::new()));
    assert_ok!(session.register("bob", "bob@example.com", "pw", "pw").await);
    assert!(!session.is_authenticated().await);
}

#[tokio::test]
async fn test_register_validation_errors_verbatim() {
    let server = backend().await;
    let body = r#"{"username":["A user with that username already exists."]}"#;
    Mock::given(method("POST"))
        .and(path("/api/users/auth/register/"))
        .respond_with(ResponseTemplate::new(400).set_body_string(body))
        .mount(&server)
        .await;

    let session = session_with(config_for(&server), Arc::new(MemoryStore::new()));
    let result = session.register("bob", "bob@example.com", "pw", "pw").await;

    assert_eq!(result, Err(AuthError::Validation(body.to_string())));
}

#[tokio::test]
async fn test_expired_access_is_refreshed_transparently() {
    let server = backend().await;
    reject_token(&server, "old").await;
    mount_refresh(&server, "r1", "new").await;
    mount_get(&server, "/posts/", "new", json!([])).await;

    let store = store_with_tokens("old", "r1");
    let session = session_with(config_for(&server), store.clone());
    let mut events = session.subscribe();

    let response = assert_ok!(session.get("/posts/").await);

    assert_eq!(response.status(), 200);
    assert_eq!(store.get(keys::ACCESS_TOKEN).unwrap().as_deref(), Some("new"));
    assert_eq!(store.get(keys::REFRESH_TOKEN).unwrap().as_deref(), Some("r1"));
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Refreshed);
}

#[tokio::test]
async fn test_rotated_refresh_token_is_kept() {
    let server = backend().await;
    reject_token(&server, "old").await;
    Mock::given(method("POST"))
        .and(path("/api/users/auth/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "a2", "refresh": "r2"})))
        .mount(&server)
        .await;
    mount_get(&server, "/chats/", "a2", json!([])).await;

    let store = store_with_tokens("old", "r1");
    let session = session_with(config_for(&server), store.clone());

    assert_ok!(session.get("/chats/").await);
    assert_eq!(store.get(keys::REFRESH_TOKEN).unwrap().as_deref(), Some("r2"));
}

#[tokio::test]
async fn test_refresh_failure_ends_session_once() {
    let server = backend().await;
    reject_token(&server, "old").await;
    Mock::given(method("POST"))
        .and(path("/api/users/auth/refresh/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token is blacklisted"})))
        .expect(1)
        .mount(&server)
        .await;
    mount_logout(&server).await;

    let store = store_with_tokens("old", "r1");
    let session = session_with(config_for(&server), store.clone());
    let mut events = session.subscribe();

    let result = session.get("/posts/").await;

    assert_eq!(result, Err(RequestError::SessionExpired));
    assert!(!session.is_authenticated().await);
    assert_eq!(store.get(keys::ACCESS_TOKEN).unwrap(), None);
    assert_eq!(store.get(keys::REFRESH_TOKEN).unwrap(), None);
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::LoggedOut(LogoutReason::SessionExpired)
    );
    assert!(events.try_recv().is_err());

    assert_eq!(session.get("/posts/").await, Err(RequestError::NotAuthenticated));
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let server = backend().await;
    reject_token(&server, "old").await;
    Mock::given(method("POST"))
        .and(path("/api/users/auth/refresh/"))
        .and(body_json(json!({"refresh": "r1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "new"})))
        .expect(1)
        .mount(&server)
        .await;
    mount_get(&server, "/posts/", "new", json!({"results": []})).await;

    let session = session_with(config_for(&server), store_with_tokens("old", "r1"));

    let requests = (0..5).map(|_| session.get("/posts/"));
    for result in join_all(requests).await {
        assert_eq!(assert_ok!(result).status(), 200);
    }
}

#[tokio::test]
async fn test_concurrent_refresh_failure_expires_once() {
    let server = backend().await;
    reject_token(&server, "old").await;
    Mock::given(method("POST"))
        .and(path("/api/users/auth/refresh/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    mount_logout(&server).await;

    let session = session_with(config_for(&server), store_with_tokens("old", "r1"));
    let mut events = session.subscribe();

    let results = join_all((0..3).map(|_| session.get("/chats/"))).await;

    for result in results {
        assert_eq!(result, Err(RequestError::SessionExpired));
    }
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::LoggedOut(LogoutReason::SessionExpired)
    );
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_retry_rejected_again_is_not_refreshed_twice() {
    let server = backend().await;
    reject_token(&server, "old").await;
    reject_token(&server, "new").await;
    Mock::given(method("POST"))
        .and(path("/api/users/auth/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "new"})))
        .expect(1)
        .mount(&server)
        .await;

    let session = session_with(config_for(&server), store_with_tokens("old", "r1"));
    let error = session.get("/posts/").await.unwrap_err();

    assert_eq!(error.status(), Some(401));
    assert!(session.is_authenticated().await);
}

#[tokio::test]
async fn test_server_error_detail_is_extracted() {
    let server = backend().await;
    Mock::given(method("GET"))
        .and(path("/api/posts/9/"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found."})))
        .mount(&server)
        .await;

    let session = session_with(config_for(&server), store_with_tokens("a", "r"));
    let result = session.get("/posts/9/").await;

    assert_eq!(
        result,
        Err(RequestError::ServerError { status: 404, detail: "Not found.".to_string() })
    );
}

#[tokio::test]
async fn test_logout_notifies_server_and_is_idempotent() {
    let server = backend().await;
    Mock::given(method("POST"))
        .and(path("/api/users/auth/logout/"))
        .and(body_json(json!({"refresh": "r1"})))
        .respond_with(ResponseTemplate::new(205))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with_tokens("a1", "r1");
    let session = session_with(config_for(&server), store.clone());
    let mut events = session.subscribe();

    session.logout().await;
    session.logout().await;

    assert!(!session.is_authenticated().await);
    assert_eq!(store.get(keys::REFRESH_TOKEN).unwrap(), None);
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::LoggedOut(LogoutReason::UserRequested)
    );
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_logout_clears_locally_when_server_fails() {
    let server = backend().await;
    Mock::given(method("POST"))
        .and(path("/api/users/auth/logout/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = store_with_tokens("a1", "r1");
    let session = session_with(config_for(&server), store.clone());
    session.logout().await;

    assert!(!session.is_authenticated().await);
    assert_eq!(store.get(keys::ACCESS_TOKEN).unwrap(), None);
}

#[tokio::test]
async fn test_cancelled_logout_still_clears_local_state() {
    let server = backend().await;
    Mock::given(method("POST"))
        .and(path("/api/users/auth/logout/"))
        .respond_with(ResponseTemplate::new(205).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let store = store_with_tokens("a1", "r1");
    let session = session_with(config_for(&server), store.clone());
    let mut events = session.subscribe();

    // Dropped while the server notification is still in flight.
    let cancelled = tokio::time::timeout(Duration::from_millis(200), session.logout()).await;
    assert!(cancelled.is_err());

    assert!(!session.is_authenticated().await);
    assert_eq!(store.get(keys::ACCESS_TOKEN).unwrap(), None);
    assert_eq!(store.get(keys::REFRESH_TOKEN).unwrap(), None);
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::LoggedOut(LogoutReason::UserRequested)
    );
}

#[tokio::test]
async fn test_new_session_resumes_from_store() {
    let server = backend().await;
    mount_get(&server, "/chats/", "a1", json!([])).await;

    let store = store_with_tokens("a1", "r1");
    let session = SessionManager::new(config_for(&server), store);

    assert!(session.is_authenticated().await);
    assert_ok!(session.get("/chats/").await);
}

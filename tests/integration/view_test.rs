//! View controller flows
//!
//! Serialized with the realtime tests because chat threads open channels.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use serial_test::serial;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use xffeed::client::storage::keys;
use xffeed::client::{
    active_channels, ChannelState, Config, KeyValueStore, MemoryStore, NavigationSnapshot,
    Screen, SessionManager, ViewController,
};

use xffeed::shared::RequestError;

use crate::common::*;

fn post_json(id: u64, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "content": format!("{} body", title),
        "author_username": "alice",
        "liked_count": 0,
        "comment_count": 0,
        "is_liked": false
    })
}

fn chat_json(id: u64) -> Value {
    json!({"id": id, "members_usernames": ["alice", "bob"], "timestamp": "2024-05-01T10:00:00Z"})
}

async fn mount_chat(server: &MockServer, id: u64, access: &str) {
    mount_get(server, &format!("/chats/{}/", id), access, chat_json(id)).await;
    mount_get(
        server,
        &format!("/chats/{}/messages/", id),
        access,
        json!([message_json("bob", &format!("hello from {}", id), "2024-05-01T10:00:00Z")]),
    )
    .await;
}

fn controller(config: Config, store: Arc<MemoryStore>) -> ViewController {
    let session = Arc::new(SessionManager::new(config, store.clone()));
    ViewController::new(session, store)
}

#[tokio::test]
#[serial]
async fn test_start_without_credentials_shows_login() {
    let server = backend().await;
    let mut views = controller(config_for(&server), Arc::new(MemoryStore::new()));

    assert_eq!(assert_ok!(views.start().await), Screen::Login);
    assert_eq!(views.channel_state(), ChannelState::Idle);
}

#[tokio::test]
#[serial]
async fn test_login_lands_on_posts() {
    let server = backend().await;
    mount_login(&server, "a1", "r1").await;
    mount_get(&server, "/posts/", "a1", json!({"results": [post_json(1, "Hello")]})).await;

    let store = Arc::new(MemoryStore::new());
    let mut views = controller(config_for(&server), store.clone());

    let screen = assert_ok!(views.login("alice", "secret").await);

    match screen {
        Screen::Posts { page, posts } => {
            assert_eq!(page, 1);
            assert_eq!(posts.len(), 1);
            assert_eq!(posts[0].title, "Hello");
        }
        other => panic!("expected posts, got {:?}", other),
    }
    assert_eq!(store.get(keys::CURRENT_VIEW).unwrap().as_deref(), Some("posts"));
}

#[tokio::test]
#[serial]
async fn test_start_restores_chat_thread() {
    let server = backend().await;
    mount_chat(&server, 42, "a1").await;

    let store = store_with_tokens("a1", "r1");
    store.set(keys::CURRENT_VIEW, "chats").unwrap();
    store.set(keys::CURRENT_CHAT_ID, "42").unwrap();
    let mut views = controller(config_for(&server), store);

    let screen = assert_ok!(views.start().await);

    match screen {
        Screen::ChatThread { chat, history } => {
            assert_eq!(chat.id, 42);
            assert_eq!(history[0].content, "hello from 42");
        }
        other => panic!("expected chat thread, got {:?}", other),
    }
    assert_eq!(views.navigation(), NavigationSnapshot::chat_thread(42));
    assert_eq!(active_channels(), 1);

    views.release().await;
    assert_eq!(active_channels(), 0);
}

#[tokio::test]
#[serial]
async fn test_switching_threads_closes_previous_channel() {
    let server = backend().await;
    mount_chat(&server, 1, "a1").await;
    mount_chat(&server, 2, "a1").await;
    let stream = StreamServer::start(Script::default()).await;

    let store = store_with_tokens("a1", "r1");
    let mut views = controller(config_with_stream(&server, stream.base()), store);

    assert_ok!(views.open_chat(1).await);
    within!(2000, stream.wait_for("connect /ws/chat/1/"));

    assert_ok!(views.open_chat(2).await);

    assert_eq!(active_channels(), 1);
    assert_eq!(views.channel_mut().map(|c| c.chat_id()), Some(2));
    within!(2000, stream.wait_for("closed /ws/chat/1/"));
    within!(2000, stream.wait_for("connect /ws/chat/2/"));

    views.release().await;
}

#[tokio::test]
#[serial]
async fn test_failed_thread_load_is_not_resumed() {
    let server = backend().await;
    Mock::given(method("GET"))
        .and(path("/api/chats/9/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store = store_with_tokens("a1", "r1");
    let mut views = controller(config_for(&server), store.clone());

    assert_err!(views.open_chat(9).await, RequestError::ServerError { status: 503, .. });

    assert_eq!(views.channel_state(), ChannelState::Idle);
    assert_eq!(active_channels(), 0);
    assert_eq!(views.navigation(), NavigationSnapshot::chats());
    assert_eq!(store.get(keys::CURRENT_CHAT_ID).unwrap(), None);
}

#[tokio::test]
#[serial]
async fn test_leaving_thread_goes_idle() {
    let server = backend().await;
    mount_chat(&server, 42, "a1").await;
    mount_get(&server, "/chats/", "a1", json!([chat_json(42)])).await;

    let mut views = controller(config_for(&server), store_with_tokens("a1", "r1"));
    assert_ok!(views.open_chat(42).await);

    let screen = assert_ok!(views.leave_chat().await);

    assert!(matches!(screen, Screen::Chats(ref chats) if chats.len() == 1));
    assert_eq!(views.channel_state(), ChannelState::Idle);
    assert_eq!(active_channels(), 0);
    assert_eq!(views.navigation(), NavigationSnapshot::chats());
}

#[tokio::test]
#[serial]
async fn test_session_expiry_returns_to_login() {
    let server = backend().await;
    reject_token(&server, "a1").await;
    Mock::given(method("POST"))
        .and(path("/api/users/auth/refresh/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let store = store_with_tokens("a1", "r1");
    store.set(keys::CURRENT_VIEW, "post-detail").unwrap();
    store.set(keys::CURRENT_POST_ID, "3").unwrap();
    let mut views = controller(config_for(&server), store.clone());

    let screen = assert_ok!(views.start().await);

    assert_eq!(screen, Screen::Login);
    assert_eq!(store.get(keys::CURRENT_VIEW).unwrap(), None);
    assert_eq!(store.get(keys::CURRENT_POST_ID).unwrap(), None);
    assert_eq!(store.get(keys::ACCESS_TOKEN).unwrap(), None);
}

#[tokio::test]
#[serial]
async fn test_comment_targets_open_post() {
    let server = backend().await;
    mount_get(&server, "/posts/3/", "a1", post_json(3, "Third")).await;
    mount_get(&server, "/posts/3/comments/", "a1", json!([])).await;
    Mock::given(method("POST"))
        .and(path("/api/posts/3/comment/"))
        .and(body_json(json!({"content": "nice"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let mut views = controller(config_for(&server), store_with_tokens("a1", "r1"));
    assert_ok!(views.open_post(3).await);

    let screen = assert_ok!(views.add_comment("nice").await);

    assert!(matches!(screen, Screen::PostDetail { ref post, .. } if post.id == 3));
}

#[tokio::test]
#[serial]
async fn test_logout_clears_session_and_navigation() {
    let server = backend().await;
    mount_chat(&server, 42, "a1").await;
    mount_logout(&server).await;

    let store = store_with_tokens("a1", "r1");
    let mut views = controller(config_for(&server), store.clone());
    assert_ok!(views.open_chat(42).await);

    let screen = views.logout().await;

    assert_eq!(screen, Screen::Login);
    assert_eq!(active_channels(), 0);
    assert_eq!(store.get(keys::ACCESS_TOKEN).unwrap(), None);
    assert_eq!(store.get(keys::CURRENT_VIEW).unwrap(), None);
    assert_eq!(store.get(keys::CURRENT_CHAT_ID).unwrap(), None);
}

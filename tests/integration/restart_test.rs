//! State that must survive a process restart, using the file-backed store

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use xffeed::client::{
    FileStore, KeyValueStore, NavigationSnapshot, NavigationState, SessionManager, View, ViewIds,
};

use crate::common::*;

fn open_store(dir: &TempDir) -> Arc<dyn KeyValueStore> {
    Arc::new(FileStore::open(dir.path().join("client_state.json")).expect("open file store"))
}

#[tokio::test]
async fn test_login_survives_restart() {
    let server = backend().await;
    mount_login(&server, "a1", "r1").await;
    let dir = TempDir::new().unwrap();

    {
        let session = SessionManager::new(config_for(&server), open_store(&dir));
        assert_ok!(session.login("alice", "secret").await);
    }

    let resumed = SessionManager::new(config_for(&server), open_store(&dir));
    assert!(resumed.is_authenticated().await);
    let url = assert_ok!(resumed.chat_stream_url(1).await);
    assert_eq!(url.query(), Some("token=a1"));
}

#[tokio::test]
async fn test_logout_survives_restart() {
    let server = backend().await;
    mount_login(&server, "a1", "r1").await;
    mount_logout(&server).await;
    let dir = TempDir::new().unwrap();

    {
        let session = SessionManager::new(config_for(&server), open_store(&dir));
        assert_ok!(session.login("alice", "secret").await);
        session.logout().await;
    }

    let resumed = SessionManager::new(config_for(&server), open_store(&dir));
    assert!(!resumed.is_authenticated().await);
}

#[test]
fn test_navigation_survives_restart() {
    let dir = TempDir::new().unwrap();

    {
        let mut navigation = NavigationState::new(open_store(&dir));
        assert_ok!(navigation.set_view(View::ChatThread, ViewIds::chat(42)));
    }

    let mut navigation = NavigationState::new(open_store(&dir));
    assert_eq!(navigation.restore(), NavigationSnapshot::chat_thread(42));
}

#[test]
fn test_corrupt_state_file_starts_fresh() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("client_state.json"), "{ not json").unwrap();

    let mut navigation = NavigationState::new(open_store(&dir));
    assert_eq!(navigation.restore(), NavigationSnapshot::posts());
}

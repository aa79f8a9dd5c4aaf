use tokio::sync::broadcast::error::TryRecvError;
use tutordesk_sdk::{
    store::{SessionStore, ALL_KEYS},
    SessionChange,
};

use crate::logged_in_manager;

#[tokio::test]
async fn test_logout_ends_the_session() {
    let (manager, _server, store) = logged_in_manager(|config| config).await;

    let mut changes = manager.subscribe_to_session_changes();
    let mut auth_status = manager.subscribe_to_auth_status();

    manager.logout().await.unwrap();

    assert!(!manager.is_authenticated());
    assert!(manager.access_token().is_none());
    assert!(manager.session_tokens().is_none());

    for key in ALL_KEYS {
        assert!(store.get(key).await.unwrap().is_none(), "{key} should be erased");
    }

    assert_eq!(changes.try_recv(), Ok(SessionChange::LoggedOut));
    assert_eq!(auth_status.next().await, Some(false));
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let (manager, _server, store) = logged_in_manager(|config| config).await;

    manager.logout().await.unwrap();

    let mut changes = manager.subscribe_to_session_changes();

    // A second logout must not broadcast another change.
    manager.logout().await.unwrap();

    assert!(!manager.is_authenticated());
    assert_eq!(changes.try_recv(), Err(TryRecvError::Empty));

    for key in ALL_KEYS {
        assert!(store.get(key).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn test_unauthorized_response_ends_the_session() {
    let (manager, _server, store) = logged_in_manager(|config| config).await;

    let mut changes = manager.subscribe_to_session_changes();

    manager.handle_unauthorized().await.unwrap();

    assert!(!manager.is_authenticated());
    assert!(store.get("token").await.unwrap().is_none());
    assert_eq!(changes.try_recv(), Ok(SessionChange::LoggedOut));
}

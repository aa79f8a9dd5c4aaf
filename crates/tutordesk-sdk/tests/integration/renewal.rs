use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;
use tokio::sync::broadcast::error::TryRecvError;
use tutordesk_sdk::{
    store::{SessionStore, KEY_ACCESS_EXPIRATION, KEY_ACCESS_TOKEN},
    HttpError, RefreshTokenError, SessionChange,
};
use wiremock::{
    matchers::{body_partial_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

use crate::{logged_in_manager, manager_with_store, test_config};

async fn mock_refresh_token_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/jwt/refresh"))
        .and(body_partial_json(json!({ "refresh": "R" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "A2" })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_renewal_replaces_the_access_token_only() {
    let (manager, server, _store) = logged_in_manager(|config| config).await;
    mock_refresh_token_ok(&server).await;

    let mut changes = manager.subscribe_to_session_changes();
    let tokens_before = manager.session_tokens().unwrap();

    let renewed = manager.renew_access_token().await.unwrap();
    assert_eq!(renewed.as_deref(), Some("A2"));

    let tokens = manager.session_tokens().unwrap();
    assert_eq!(tokens.access_token, "A2");
    assert_eq!(tokens.refresh_token, "R");
    assert_eq!(tokens.refresh_expiry, tokens_before.refresh_expiry);
    assert!(tokens.access_expiry >= tokens_before.access_expiry);

    assert!(manager.is_authenticated());
    assert_eq!(changes.try_recv(), Ok(SessionChange::TokensRenewed));
    assert_eq!(changes.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test]
async fn test_renewal_repersists_the_session() {
    let (manager, server, store) = logged_in_manager(|config| config).await;
    mock_refresh_token_ok(&server).await;

    let access_before = store.get(KEY_ACCESS_TOKEN).await.unwrap().unwrap();
    let expiration_before = store.get(KEY_ACCESS_EXPIRATION).await.unwrap().unwrap();

    manager.renew_access_token().await.unwrap();

    assert_ne!(store.get(KEY_ACCESS_TOKEN).await.unwrap().unwrap(), access_before);
    assert_ne!(store.get(KEY_ACCESS_EXPIRATION).await.unwrap().unwrap(), expiration_before);
}

#[tokio::test]
async fn test_renewal_failure_ends_the_session() {
    let (manager, server, store) = logged_in_manager(|config| config).await;

    Mock::given(method("POST"))
        .and(path("/auth/jwt/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let mut changes = manager.subscribe_to_session_changes();

    let error = manager.renew_access_token().await.unwrap_err();
    assert_matches!(error, HttpError::Api(status) if status.as_u16() == 401);

    // No partial or degraded state: a failed renewal is a full logout.
    assert!(!manager.is_authenticated());
    assert!(manager.access_token().is_none());
    assert!(store.get(KEY_ACCESS_TOKEN).await.unwrap().is_none());

    assert_eq!(changes.try_recv(), Ok(SessionChange::LoggedOut));
    assert_eq!(changes.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test]
async fn test_renewing_without_a_session_is_an_error() {
    let server = MockServer::start().await;
    let manager = manager_with_store(test_config(&server), std::sync::Arc::default());

    let error = manager.renew_access_token().await.unwrap_err();
    assert_matches!(
        error,
        HttpError::RefreshToken(RefreshTokenError::RefreshTokenRequired)
    );
}

#[tokio::test]
async fn test_expiring_access_token_is_renewed_on_resume() {
    // An access token living 30 s is already inside the 60 s renewal lead
    // time, so the first check after login renews it.
    let (manager, server, _store) =
        logged_in_manager(|config| config.access_token_lifetime(Duration::from_secs(30))).await;

    Mock::given(method("POST"))
        .and(path("/auth/jwt/refresh"))
        .and(body_partial_json(json!({ "refresh": "R" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "A2" })))
        .expect(1)
        .mount(&server)
        .await;

    manager.handle_resume().await;

    assert_eq!(manager.access_token().as_deref(), Some("A2"));
    assert!(manager.is_authenticated());
}

#[tokio::test]
async fn test_fresh_access_token_is_left_alone_on_resume() {
    let (manager, server, _store) = logged_in_manager(|config| config).await;

    Mock::given(method("POST"))
        .and(path("/auth/jwt/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "A2" })))
        .expect(0)
        .mount(&server)
        .await;

    manager.handle_resume().await;

    assert_eq!(manager.access_token().as_deref(), Some("A"));
}

#[tokio::test]
async fn test_expired_refresh_token_forces_logout_on_resume() {
    let (manager, server, store) =
        logged_in_manager(|config| config.refresh_token_lifetime(Duration::ZERO)).await;

    // The check must not even try to renew with an expired refresh token.
    Mock::given(method("POST"))
        .and(path("/auth/jwt/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "A2" })))
        .expect(0)
        .mount(&server)
        .await;

    let mut changes = manager.subscribe_to_session_changes();

    manager.handle_resume().await;

    assert!(!manager.is_authenticated());
    assert!(store.get(KEY_ACCESS_TOKEN).await.unwrap().is_none());
    assert_eq!(changes.try_recv(), Ok(SessionChange::LoggedOut));
}

#[tokio::test]
async fn test_periodic_check_renews_the_access_token() {
    let (manager, server, _store) = logged_in_manager(|config| {
        config
            .access_token_lifetime(Duration::from_secs(30))
            .renewal_check_interval(Duration::from_millis(100))
    })
    .await;

    Mock::given(method("POST"))
        .and(path("/auth/jwt/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "A2" })))
        .expect(1..)
        .mount(&server)
        .await;

    // Let the periodic task tick a few times without any manual check.
    tokio::time::sleep(Duration::from_millis(350)).await;

    assert_eq!(manager.access_token().as_deref(), Some("A2"));
}

#[tokio::test]
async fn test_concurrent_renewals_share_one_request() {
    let (manager, server, _store) = logged_in_manager(|config| config).await;

    Mock::given(method("POST"))
        .and(path("/auth/jwt/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access": "A2" }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (first, second) =
        tokio::join!(manager.renew_access_token(), manager.renew_access_token());

    // The first caller hits the endpoint, the second one waits on the lock
    // and observes that the token was already renewed.
    assert_eq!(first.unwrap().as_deref(), Some("A2"));
    assert_eq!(second.unwrap(), None);
    assert_eq!(manager.access_token().as_deref(), Some("A2"));
}

#[tokio::test]
async fn test_waiters_observe_a_failed_renewal() {
    let (manager, server, _store) = logged_in_manager(|config| config).await;

    Mock::given(method("POST"))
        .and(path("/auth/jwt/refresh"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(300)))
        .expect(1)
        .mount(&server)
        .await;

    let (first, second) =
        tokio::join!(manager.renew_access_token(), manager.renew_access_token());

    assert_matches!(first.unwrap_err(), HttpError::Api(_));
    assert_matches!(
        second.unwrap_err(),
        HttpError::RefreshToken(RefreshTokenError::Rejected(_))
    );
    assert!(!manager.is_authenticated());
}

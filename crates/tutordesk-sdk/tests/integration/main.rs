use std::sync::Arc;

use serde_json::json;
use tutordesk_sdk::{config::SessionConfig, store::MemoryStore, SessionManager};
use url::Url;
use wiremock::{
    matchers::{body_partial_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

mod logout;
mod renewal;

pub(crate) const STORE_SECRET: &str = "integration-test-secret";

pub(crate) fn test_config(server: &MockServer) -> SessionConfig {
    SessionConfig::new(Url::parse(&server.uri()).unwrap())
}

pub(crate) fn manager_with_store(config: SessionConfig, store: Arc<MemoryStore>) -> SessionManager {
    SessionManager::new(config, store, STORE_SECRET).unwrap()
}

/// Mount a successful `POST /auth/jwt/create` answering with the usual
/// `("A", "R")` token pair.
pub(crate) async fn mock_create_token_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/jwt/create"))
        .and(body_partial_json(json!({ "username": "u", "password": "p" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "access": "A", "refresh": "R" })),
        )
        .mount(server)
        .await;
}

/// A manager logged in against a fresh mock server, sharing its store with
/// the caller.
pub(crate) async fn logged_in_manager(
    config: impl FnOnce(SessionConfig) -> SessionConfig,
) -> (SessionManager, MockServer, Arc<MemoryStore>) {
    let server = MockServer::start().await;
    mock_create_token_ok(&server).await;

    let store = Arc::new(MemoryStore::new());
    let manager = manager_with_store(config(test_config(&server)), store.clone());
    manager.login("u", "p").await.unwrap();

    (manager, server, store)
}
